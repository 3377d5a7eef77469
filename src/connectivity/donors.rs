//! Donor side of a connectivity: stencil cells on the donor grid.

use super::ConnectivityEdits;
use super::edit::Edit;
use crate::topology::grid::{Grid, GridInfo};
use crate::topology::range::{MAX_DIMS, Range, Tuple};
use std::sync::Arc;

/// Donor cells held by this rank.
///
/// A donor whose cell straddles a partition boundary is expected on every
/// rank whose local range overlaps the cell; only the rank owning the cell's
/// lower corner sends its value.
#[derive(Clone, Debug)]
pub struct ConnectivityM {
    grid: Arc<Grid>,
    destination_grid: GridInfo,
    max_stencil_size: usize,
    extents: Vec<Range>,
    interp_coefs: Vec<f64>,
    destinations: Vec<Tuple>,
    destination_ranks: Vec<Option<usize>>,
    pub(crate) edits: ConnectivityEdits,
}

impl ConnectivityM {
    /// Empty donor side on the local piece of `grid`, sending to points of
    /// `destination_grid`.
    pub fn new(grid: Arc<Grid>, destination_grid: GridInfo) -> Self {
        Self {
            grid,
            destination_grid,
            max_stencil_size: 0,
            extents: Vec::new(),
            interp_coefs: Vec::new(),
            destinations: Vec::new(),
            destination_ranks: Vec::new(),
            edits: ConnectivityEdits::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
    pub fn destination_grid(&self) -> &GridInfo {
        &self.destination_grid
    }
    pub fn num_dims(&self) -> usize {
        self.grid.num_dims()
    }
    pub fn num_donors(&self) -> usize {
        self.extents.len()
    }
    pub fn max_stencil_size(&self) -> usize {
        self.max_stencil_size
    }

    /// Largest number of points a donor cell can hold.
    pub fn max_points_in_cell(&self) -> usize {
        self.max_stencil_size.pow(self.num_dims() as u32)
    }

    /// Reset to `num_donors` donors. Extents become empty, coefficients
    /// zero, destinations one point before the destination grid's begin
    /// (which resolves to no rank) and destination ranks unset.
    pub fn resize(&mut self, num_donors: usize, max_stencil_size: usize) {
        let nd = self.num_dims();
        let unresolved = self.destination_grid.global_range().begin().map(|b| b - 1);
        let mut unresolved_dest = [0; MAX_DIMS];
        unresolved_dest[..nd].copy_from_slice(&unresolved[..nd]);

        self.max_stencil_size = max_stencil_size;
        self.extents = vec![Range::empty(nd); num_donors];
        self.interp_coefs = vec![0.0; num_donors * nd * max_stencil_size];
        self.destinations = vec![unresolved_dest; num_donors];
        self.destination_ranks = vec![None; num_donors];
        self.edits.num_donors = true;
    }

    pub fn extents(&self) -> &[Range] {
        &self.extents
    }
    pub fn edit_extents(&mut self) -> Edit<'_, Range> {
        Edit::new(&mut self.extents, Some(&mut self.edits.donor_extents))
    }

    /// Flat coefficient storage, laid out `[donor][dim][point]`.
    pub fn interp_coefs(&self) -> &[f64] {
        &self.interp_coefs
    }

    /// Coefficient block of one donor, laid out `[dim][point]`.
    pub fn donor_coefs(&self, donor: usize) -> &[f64] {
        let block = self.num_dims() * self.max_stencil_size;
        &self.interp_coefs[donor * block..(donor + 1) * block]
    }

    pub fn interp_coef(&self, donor: usize, dim: usize, point: usize) -> f64 {
        self.interp_coefs[self.coef_index(donor, dim, point)]
    }

    pub fn coef_index(&self, donor: usize, dim: usize, point: usize) -> usize {
        (donor * self.num_dims() + dim) * self.max_stencil_size + point
    }

    /// Coefficients do not shape the schedule, so this edit raises no flag.
    pub fn edit_interp_coefs(&mut self) -> Edit<'_, f64> {
        Edit::new(&mut self.interp_coefs, None)
    }

    pub fn destinations(&self) -> &[Tuple] {
        &self.destinations
    }
    pub fn edit_destinations(&mut self) -> Edit<'_, Tuple> {
        Edit::new(&mut self.destinations, Some(&mut self.edits.donor_destinations))
    }

    /// Known owning ranks of the destinations. `None` entries are resolved
    /// through the partition hash.
    pub fn destination_ranks(&self) -> &[Option<usize>] {
        &self.destination_ranks
    }
    pub fn edit_destination_ranks(&mut self) -> Edit<'_, Option<usize>> {
        Edit::new(
            &mut self.destination_ranks,
            Some(&mut self.edits.donor_destination_ranks),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cart::Cart;

    fn donor_side() -> ConnectivityM {
        let global = Range::new(2, [0, 0, 0], [8, 8, 0]);
        let info = GridInfo::new(0, "donor", Cart::non_periodic(global));
        let dest = GridInfo::new(1, "receiver", Cart::non_periodic(Range::new(2, [2, 3, 0], [9, 9, 0])));
        ConnectivityM::new(Arc::new(Grid::new(info, global, vec![])), dest)
    }

    #[test]
    fn resize_resets_to_unresolved_defaults() {
        let mut m = donor_side();
        m.resize(3, 2);
        assert_eq!(m.num_donors(), 3);
        assert_eq!(m.max_points_in_cell(), 4);
        assert_eq!(m.interp_coefs().len(), 3 * 2 * 2);
        assert!(m.extents().iter().all(Range::is_empty));
        assert_eq!(m.destinations()[2], [1, 2, 0]);
        assert!(m.destination_ranks().iter().all(Option::is_none));
        assert!(m.edits.num_donors);
    }

    #[test]
    fn coefficient_edits_do_not_dirty_the_schedule() {
        let mut m = donor_side();
        m.resize(2, 2);
        m.edits = ConnectivityEdits::default();
        {
            let mut c = m.edit_interp_coefs();
            c[5] = 0.25;
        }
        assert!(!m.edits.any());
        assert_eq!(m.interp_coef(1, 0, 1), 0.25);
        assert_eq!(m.donor_coefs(1), &[0.0, 0.25, 0.0, 0.0]);

        m.edit_extents()[0] = Range::new(2, [0, 0, 0], [2, 2, 0]);
        assert!(m.edits.donor_extents);
    }
}
