//! Receiver side of a connectivity: target points on the receiver grid.

use super::ConnectivityEdits;
use super::edit::Edit;
use crate::topology::grid::{Grid, GridInfo};
use crate::topology::range::{MAX_DIMS, Tuple};
use std::sync::Arc;

/// Receiver points held by this rank. The source of a receiver is only used
/// to find the rank that sends its value.
#[derive(Clone, Debug)]
pub struct ConnectivityN {
    grid: Arc<Grid>,
    source_grid: GridInfo,
    points: Vec<Tuple>,
    sources: Vec<Tuple>,
    source_ranks: Vec<Option<usize>>,
    pub(crate) edits: ConnectivityEdits,
}

fn before_begin(info: &GridInfo) -> Tuple {
    let nd = info.num_dims();
    let begin = info.global_range().begin();
    let mut t = [0; MAX_DIMS];
    for d in 0..nd {
        t[d] = begin[d] - 1;
    }
    t
}

impl ConnectivityN {
    pub fn new(grid: Arc<Grid>, source_grid: GridInfo) -> Self {
        Self {
            grid,
            source_grid,
            points: Vec::new(),
            sources: Vec::new(),
            source_ranks: Vec::new(),
            edits: ConnectivityEdits::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
    pub fn source_grid(&self) -> &GridInfo {
        &self.source_grid
    }
    pub fn num_receivers(&self) -> usize {
        self.points.len()
    }

    /// Reset to `num_receivers` receivers. Points and sources land one point
    /// before their grid's begin (resolving to no rank).
    pub fn resize(&mut self, num_receivers: usize) {
        self.points = vec![before_begin(self.grid.info()); num_receivers];
        self.sources = vec![before_begin(&self.source_grid); num_receivers];
        self.source_ranks = vec![None; num_receivers];
        self.edits.num_receivers = true;
    }

    pub fn points(&self) -> &[Tuple] {
        &self.points
    }
    pub fn edit_points(&mut self) -> Edit<'_, Tuple> {
        Edit::new(&mut self.points, Some(&mut self.edits.receiver_points))
    }

    pub fn sources(&self) -> &[Tuple] {
        &self.sources
    }
    pub fn edit_sources(&mut self) -> Edit<'_, Tuple> {
        Edit::new(&mut self.sources, Some(&mut self.edits.receiver_sources))
    }

    /// Known ranks of the sources. `None` entries are resolved through the
    /// partition hash.
    pub fn source_ranks(&self) -> &[Option<usize>] {
        &self.source_ranks
    }
    pub fn edit_source_ranks(&mut self) -> Edit<'_, Option<usize>> {
        Edit::new(
            &mut self.source_ranks,
            Some(&mut self.edits.receiver_source_ranks),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cart::Cart;
    use crate::topology::range::Range;

    #[test]
    fn resize_places_points_outside_both_grids() {
        let own = Range::new(1, [5, 0, 0], [10, 0, 0]);
        let info = GridInfo::new(1, "receiver", Cart::non_periodic(own));
        let src = GridInfo::new(0, "donor", Cart::non_periodic(Range::new(1, [0, 0, 0], [4, 0, 0])));
        let mut n = ConnectivityN::new(Arc::new(Grid::new(info, own, vec![])), src);
        n.resize(2);
        assert_eq!(n.points(), &[[4, 0, 0]; 2]);
        assert_eq!(n.sources(), &[[-1, 0, 0]; 2]);
        assert!(n.edits.num_receivers);
        assert!(!own.contains(&n.points()[0]));
    }
}
