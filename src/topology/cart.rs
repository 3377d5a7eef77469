//! Global index space of a grid, with optional periodic wrap.

use super::range::{MAX_DIMS, Range, Tuple};
use serde::{Deserialize, Serialize};

/// How the periodic seam is stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodicStorage {
    /// Every physical point appears once.
    #[default]
    Unique,
    /// The last point along a periodic dimension duplicates the first.
    Duplicated,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    range: Range,
    periodic: [bool; MAX_DIMS],
    periodic_storage: PeriodicStorage,
}

impl Cart {
    pub fn new(range: Range, periodic: [bool; MAX_DIMS], periodic_storage: PeriodicStorage) -> Self {
        let mut periodic = periodic;
        for flag in periodic.iter_mut().skip(range.num_dims()) {
            *flag = false;
        }
        Self {
            range,
            periodic,
            periodic_storage,
        }
    }

    pub fn non_periodic(range: Range) -> Self {
        Self::new(range, [false; MAX_DIMS], PeriodicStorage::Unique)
    }

    pub fn num_dims(&self) -> usize {
        self.range.num_dims()
    }
    pub fn range(&self) -> &Range {
        &self.range
    }
    pub fn periodic(&self) -> [bool; MAX_DIMS] {
        self.periodic
    }
    pub fn periodic_storage(&self) -> PeriodicStorage {
        self.periodic_storage
    }

    pub fn is_periodic(&self, dim: usize) -> bool {
        self.periodic[dim]
    }

    /// Number of distinct points along a periodic dimension.
    pub fn period(&self, dim: usize) -> i32 {
        let n = self.range.size(dim) as i32;
        match self.periodic_storage {
            PeriodicStorage::Unique => n,
            PeriodicStorage::Duplicated => n - 1,
        }
    }

    /// Wrap the periodic coordinates of `p` into the global range.
    /// Non-periodic coordinates are returned unchanged.
    pub fn periodic_adjust(&self, p: &Tuple) -> Tuple {
        let mut q = *p;
        let begin = self.range.begin();
        for d in 0..MAX_DIMS {
            let period = self.period(d);
            if self.periodic[d] && period > 0 {
                q[d] = begin[d] + (p[d] - begin[d]).rem_euclid(period);
            }
        }
        q
    }
}
