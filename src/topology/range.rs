//! Half-open index boxes in up to three dimensions.
//!
//! A [`Range`] always stores three dimensions; the ones beyond `num_dims` are
//! pinned to `[0, 1)` so that counts, containment and linear indexing work
//! the same regardless of dimension.

use serde::{Deserialize, Serialize};

pub const MAX_DIMS: usize = 3;

/// A grid index tuple. Unused trailing dimensions are zero.
pub type Tuple = [i32; MAX_DIMS];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    num_dims: usize,
    begin: Tuple,
    end: Tuple,
}

impl Range {
    /// Box `[begin, end)` in the first `num_dims` dimensions.
    pub fn new(num_dims: usize, begin: Tuple, end: Tuple) -> Self {
        debug_assert!(
            (1..=MAX_DIMS).contains(&num_dims),
            "dimension count {num_dims} outside 1..=3"
        );
        let mut r = Self {
            num_dims,
            begin,
            end,
        };
        for d in num_dims..MAX_DIMS {
            r.begin[d] = 0;
            r.end[d] = 1;
        }
        r
    }

    /// The canonical empty range.
    pub fn empty(num_dims: usize) -> Self {
        Self::new(num_dims, [0; MAX_DIMS], [0; MAX_DIMS])
    }

    /// The single-point range `[p, p + 1)`.
    pub fn from_point(num_dims: usize, p: &Tuple) -> Self {
        Self::new(num_dims, *p, p.map(|v| v + 1))
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }
    pub fn begin(&self) -> Tuple {
        self.begin
    }
    pub fn end(&self) -> Tuple {
        self.end
    }

    /// Extent along `dim`, clamped at zero.
    pub fn size(&self, dim: usize) -> usize {
        (self.end[dim] - self.begin[dim]).max(0) as usize
    }

    pub fn sizes(&self) -> [usize; MAX_DIMS] {
        [self.size(0), self.size(1), self.size(2)]
    }

    /// Number of points in the box.
    pub fn count(&self) -> usize {
        self.sizes().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        (0..MAX_DIMS).any(|d| self.end[d] <= self.begin[d])
    }

    pub fn contains(&self, p: &Tuple) -> bool {
        (0..MAX_DIMS).all(|d| p[d] >= self.begin[d] && p[d] < self.end[d])
    }

    /// `true` if every point of `other` lies in `self`. Empty ranges are
    /// included in everything.
    pub fn includes(&self, other: &Range) -> bool {
        other.is_empty()
            || (0..MAX_DIMS).all(|d| other.begin[d] >= self.begin[d] && other.end[d] <= self.end[d])
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn intersect(&self, other: &Range) -> Range {
        let mut begin = [0; MAX_DIMS];
        let mut end = [0; MAX_DIMS];
        for d in 0..MAX_DIMS {
            begin[d] = self.begin[d].max(other.begin[d]);
            end[d] = self.end[d].min(other.end[d]);
        }
        let r = Range::new(self.num_dims, begin, end);
        if r.is_empty() { Range::empty(self.num_dims) } else { r }
    }

    /// Smallest box containing both ranges.
    pub fn union(&self, other: &Range) -> Range {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut begin = [0; MAX_DIMS];
        let mut end = [0; MAX_DIMS];
        for d in 0..MAX_DIMS {
            begin[d] = self.begin[d].min(other.begin[d]);
            end[d] = self.end[d].max(other.end[d]);
        }
        Range::new(self.num_dims, begin, end)
    }

    /// Smallest box containing `self` and the point `p`.
    pub fn extend(&self, p: &Tuple) -> Range {
        self.union(&Range::from_point(self.num_dims, p))
    }

    /// Grow by `amount` on both sides of every used dimension.
    pub fn dilate(&self, amount: i32) -> Range {
        let mut begin = self.begin;
        let mut end = self.end;
        for d in 0..self.num_dims {
            begin[d] -= amount;
            end[d] += amount;
        }
        Range::new(self.num_dims, begin, end)
    }

    /// Shift by `delta`.
    pub fn translate(&self, delta: &Tuple) -> Range {
        let mut begin = self.begin;
        let mut end = self.end;
        for d in 0..self.num_dims {
            begin[d] += delta[d];
            end[d] += delta[d];
        }
        Range::new(self.num_dims, begin, end)
    }

    /// Points in column-major order (first index fastest).
    pub fn points(&self) -> RangePoints {
        RangePoints {
            range: *self,
            next: (!self.is_empty()).then_some(self.begin),
        }
    }
}

/// Iterator over the points of a [`Range`], first index fastest.
#[derive(Clone, Debug)]
pub struct RangePoints {
    range: Range,
    next: Option<Tuple>,
}

impl Iterator for RangePoints {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        let current = self.next?;
        let mut p = current;
        self.next = None;
        for d in 0..MAX_DIMS {
            p[d] += 1;
            if p[d] < self.range.end[d] {
                self.next = Some(p);
                break;
            }
            p[d] = self.range.begin[d];
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_dimensions_are_pinned() {
        let r = Range::new(1, [2, 7, -3], [5, 9, 4]);
        assert_eq!(r.begin(), [2, 0, 0]);
        assert_eq!(r.end(), [5, 1, 1]);
        assert_eq!(r.count(), 3);
    }

    #[test]
    fn set_operations() {
        let a = Range::new(2, [0, 0, 0], [4, 4, 0]);
        let b = Range::new(2, [2, 3, 0], [6, 8, 0]);
        assert_eq!(a.intersect(&b), Range::new(2, [2, 3, 0], [4, 4, 0]));
        assert_eq!(a.union(&b), Range::new(2, [0, 0, 0], [6, 8, 0]));
        assert!(a.overlaps(&b));
        assert!(!a.includes(&b));
        assert!(a.includes(&Range::empty(2)));

        let far = Range::new(2, [10, 10, 0], [11, 11, 0]);
        assert!(a.intersect(&far).is_empty());
        assert_eq!(Range::empty(2).union(&far), far);
        assert_eq!(Range::empty(2).extend(&[3, 4, 0]), Range::new(2, [3, 4, 0], [4, 5, 0]));
    }

    #[test]
    fn points_run_first_index_fastest() {
        let r = Range::new(2, [1, 5, 0], [3, 7, 0]);
        let pts: Vec<_> = r.points().collect();
        assert_eq!(pts, vec![[1, 5, 0], [2, 5, 0], [1, 6, 0], [2, 6, 0]]);
        assert_eq!(Range::empty(3).points().count(), 0);
    }

    #[test]
    fn dilate_and_translate_touch_used_dims_only() {
        let r = Range::new(2, [0, 0, 0], [2, 2, 0]);
        assert_eq!(r.dilate(1), Range::new(2, [-1, -1, 0], [3, 3, 1]));
        assert_eq!(r.translate(&[5, -1, 9]), Range::new(2, [5, -1, 0], [7, 1, 1]));
    }
}
