//! Ghost-point maps for the collect step.
//!
//! For every neighbour of the donor grid's local piece, find the local points
//! that neighbour's donor stencils need (collect sends) and the neighbour's
//! points our donor stencils need (collect receives). Cells lying inside the
//! global range go through range intersection; cells crossing the boundary
//! are walked point by point with periodic adjustment. Per neighbour, the
//! points are gathered in a bounding range plus occupancy mask and emitted in
//! column-major order, which is the same order on both sides of a pair.

use super::schedule::{CollectRecv, CollectSend, RemoteDonorPoints, RemotePoint};
use crate::topology::cart::Cart;
use crate::topology::grid::Grid;
use crate::topology::indexer::RangeIndexer;
use crate::topology::range::{Range, Tuple};

/// Collect maps of one donor grid piece.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectMaps {
    pub collect_sends: Vec<CollectSend>,
    pub collect_recvs: Vec<CollectRecv>,
    pub remote_donor_points: RemoteDonorPoints,
}

/// Stencil points of a cell crossing the global boundary, wrapped.
fn adjusted_points(cart: &Cart, extent: &Range) -> Vec<Tuple> {
    extent.points().map(|p| cart.periodic_adjust(&p)).collect()
}

/// Bounding range and occupancy mask of a point set.
struct MaskedRange {
    range: Range,
    mask: Vec<bool>,
}

impl MaskedRange {
    fn new(range: Range) -> Self {
        Self {
            mask: vec![false; range.count()],
            range,
        }
    }

    fn mark(&mut self, indexer: &RangeIndexer, p: &Tuple) {
        self.mask[indexer.to_index(p)] = true;
    }

    fn marked_points(&self) -> Vec<Tuple> {
        let indexer = RangeIndexer::grid(self.range);
        self.mask
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m)
            .map(|(i, _)| indexer.to_tuple(i))
            .collect()
    }
}

/// Visit, for every donor and every neighbour the donor touches, the donor
/// points owned locally and the donor points owned by that neighbour.
fn for_each_overlap<F>(grid: &Grid, extents: &[Range], mut visit: F)
where
    F: FnMut(usize, &mut dyn Iterator<Item = Tuple>, &mut dyn Iterator<Item = Tuple>),
{
    let cart = grid.cart();
    let global = cart.range();
    let local = grid.local_range();
    for extent in extents.iter().filter(|e| !e.is_empty()) {
        if global.includes(extent) {
            let local_part = local.intersect(extent);
            for (n, nb) in grid.neighbors().iter().enumerate() {
                let nb_part = nb.local_range.intersect(extent);
                if !nb_part.is_empty() {
                    visit(n, &mut local_part.points(), &mut nb_part.points());
                }
            }
        } else {
            let points = adjusted_points(cart, extent);
            for (n, nb) in grid.neighbors().iter().enumerate() {
                if points.iter().any(|p| nb.local_range.contains(p)) {
                    visit(
                        n,
                        &mut points.iter().copied().filter(|p| local.contains(p)),
                        &mut points.iter().copied().filter(|p| nb.local_range.contains(p)),
                    );
                }
            }
        }
    }
}

/// Build the collect send/receive records and the per-donor remote point
/// lists for the donors with the given cell `extents`.
pub fn build_collect_maps(grid: &Grid, extents: &[Range]) -> CollectMaps {
    let nd = grid.num_dims();
    let num_neighbors = grid.neighbors().len();

    // bounding ranges
    let mut send_ranges = vec![Range::empty(nd); num_neighbors];
    let mut recv_ranges = vec![Range::empty(nd); num_neighbors];
    for_each_overlap(grid, extents, |n, local_pts, nb_pts| {
        for p in local_pts {
            send_ranges[n] = send_ranges[n].extend(&p);
        }
        for p in nb_pts {
            recv_ranges[n] = recv_ranges[n].extend(&p);
        }
    });

    // occupancy masks
    let mut send_masks: Vec<MaskedRange> = send_ranges.into_iter().map(MaskedRange::new).collect();
    let mut recv_masks: Vec<MaskedRange> = recv_ranges.into_iter().map(MaskedRange::new).collect();
    let send_indexers: Vec<RangeIndexer> = send_masks.iter().map(|m| RangeIndexer::grid(m.range)).collect();
    let recv_indexers: Vec<RangeIndexer> = recv_masks.iter().map(|m| RangeIndexer::grid(m.range)).collect();
    for_each_overlap(grid, extents, |n, local_pts, nb_pts| {
        for p in local_pts {
            send_masks[n].mark(&send_indexers[n], &p);
        }
        for p in nb_pts {
            recv_masks[n].mark(&recv_indexers[n], &p);
        }
    });

    let collect_sends = grid
        .neighbors()
        .iter()
        .zip(&send_masks)
        .map(|(nb, mask)| CollectSend {
            rank: nb.rank,
            points: mask.marked_points(),
        })
        .filter(|s| !s.points.is_empty())
        .collect();

    // ghost slot of every masked receive point, per neighbour
    let mut collect_recvs = Vec::new();
    let mut recv_slots: Vec<Option<(usize, Vec<Option<usize>>)>> = Vec::with_capacity(num_neighbors);
    for (nb, mask) in grid.neighbors().iter().zip(&recv_masks) {
        let mut next = 0;
        let slots: Vec<Option<usize>> = mask
            .mask
            .iter()
            .map(|&m| {
                m.then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        if next > 0 {
            recv_slots.push(Some((collect_recvs.len(), slots)));
            collect_recvs.push(CollectRecv {
                rank: nb.rank,
                num_points: next,
            });
        } else {
            recv_slots.push(None);
        }
    }

    let remote_lists = extents
        .iter()
        .map(|extent| remote_points(grid, extent, &recv_indexers, &recv_slots))
        .collect();

    CollectMaps {
        collect_sends,
        collect_recvs,
        remote_donor_points: RemoteDonorPoints::from_lists(remote_lists),
    }
}

fn remote_points(
    grid: &Grid,
    extent: &Range,
    recv_indexers: &[RangeIndexer],
    recv_slots: &[Option<(usize, Vec<Option<usize>>)>],
) -> Vec<RemotePoint> {
    if extent.is_empty() {
        return Vec::new();
    }
    let cart = grid.cart();
    let local = grid.local_range();
    let cell = RangeIndexer::grid(*extent);
    let away_from_edge = cart.range().includes(extent);

    let mut list = Vec::new();
    let mut unowned = 0usize;
    for p in extent.points() {
        let q = if away_from_edge { p } else { cart.periodic_adjust(&p) };
        if local.contains(&q) {
            continue;
        }
        let source = grid
            .neighbors()
            .iter()
            .enumerate()
            .filter(|(_, nb)| nb.local_range.contains(&q))
            .find_map(|(n, _)| {
                let (recv, slots) = recv_slots[n].as_ref()?;
                let slot = recv_indexers[n].try_index(&q).and_then(|i| slots[i])?;
                Some((*recv, slot))
            });
        match source {
            Some((collect_recv, buffer_index)) => list.push(RemotePoint {
                point_in_cell: cell.to_index(&p),
                collect_recv,
                buffer_index,
            }),
            None => unowned += 1,
        }
    }
    if unowned > 0 {
        log::warn!(
            "donor cell {extent:?} on grid '{}' has {unowned} stencil point(s) owned by no neighbor",
            grid.name()
        );
    }
    list
}

/// Number of stencil points of `extent` outside the local range, counted
/// point by point.
pub fn count_nonlocal_points(grid: &Grid, extent: &Range) -> usize {
    extent
        .points()
        .map(|p| grid.cart().periodic_adjust(&p))
        .filter(|q| !grid.local_range().contains(q))
        .count()
}
