//! Linear index ↔ tuple mapping over a [`Range`].

use super::range::{MAX_DIMS, Range, Tuple};
use serde::{Deserialize, Serialize};

/// Memory order of multi-dimensional field storage.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayLayout {
    /// Last index fastest.
    RowMajor,
    /// First index fastest. This is also the canonical "grid" order used for
    /// every internal ordering.
    #[default]
    ColumnMajor,
}

/// Maps points of a range to offsets in a dense array with a given layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RangeIndexer {
    range: Range,
    layout: ArrayLayout,
    strides: [usize; MAX_DIMS],
}

impl RangeIndexer {
    pub fn new(range: Range, layout: ArrayLayout) -> Self {
        let [n0, n1, n2] = range.sizes();
        let strides = match layout {
            ArrayLayout::ColumnMajor => [1, n0, n0 * n1],
            ArrayLayout::RowMajor => [n1 * n2, n2, 1],
        };
        Self {
            range,
            layout,
            strides,
        }
    }

    /// Column-major indexer, the canonical grid order.
    pub fn grid(range: Range) -> Self {
        Self::new(range, ArrayLayout::ColumnMajor)
    }

    pub fn range(&self) -> &Range {
        &self.range
    }
    pub fn layout(&self) -> ArrayLayout {
        self.layout
    }

    /// Offset of `p`, which must lie in the range.
    #[inline]
    pub fn to_index(&self, p: &Tuple) -> usize {
        debug_assert!(self.range.contains(p), "{p:?} outside {:?}", self.range);
        let b = self.range.begin();
        (0..MAX_DIMS)
            .map(|d| (p[d] - b[d]) as usize * self.strides[d])
            .sum()
    }

    /// Offset of `p`, or `None` if it lies outside the range.
    pub fn try_index(&self, p: &Tuple) -> Option<usize> {
        self.range.contains(p).then(|| self.to_index(p))
    }

    /// Inverse of [`to_index`](Self::to_index).
    pub fn to_tuple(&self, index: usize) -> Tuple {
        let [n0, n1, n2] = self.range.sizes();
        let b = self.range.begin();
        let (i, j, k) = match self.layout {
            ArrayLayout::ColumnMajor => {
                let n0 = n0.max(1);
                let n1 = n1.max(1);
                (index % n0, (index / n0) % n1, index / (n0 * n1))
            }
            ArrayLayout::RowMajor => {
                let n2 = n2.max(1);
                let n1 = n1.max(1);
                (index / (n1 * n2), (index / n2) % n1, index % n2)
            }
        };
        [b[0] + i as i32, b[1] + j as i32, b[2] + k as i32]
    }
}
