//! Canonical orderings and send/receive grouping.
//!
//! Donors are ordered by the global index of their destination point and
//! receivers by the global index of their own point, both on the receiver
//! grid and in column-major order. A sender walking its donors in that order
//! and a receiver walking its receivers in that order meet every value of a
//! (sender, receiver) pair in the same sequence, so no indices travel.

use super::schedule::{RecvRecord, SendRecord};
use crate::topology::grid::Grid;
use crate::topology::indexer::RangeIndexer;
use crate::topology::range::{Range, Tuple};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Stable permutation ordering `points` by global index in `global`.
/// Points outside the range sort first. Already ordered input yields the
/// identity.
pub(crate) fn sort_by_global_index(points: &[Tuple], global: &Range) -> Vec<usize> {
    let indexer = RangeIndexer::grid(*global);
    let keys: Vec<Option<usize>> = points.iter().map(|p| indexer.try_index(p)).collect();
    let mut order: Vec<usize> = (0..points.len()).collect();
    if !keys.iter().tuple_windows().all(|(a, b)| a <= b) {
        order.sort_by_key(|&i| keys[i]);
    }
    order
}

/// Does this rank send the value of a donor with cell `extent`? Only the rank
/// owning the cell's lower corner does.
pub(crate) fn donor_communicates(grid: &Grid, extent: &Range, dest_rank: Option<usize>) -> bool {
    dest_rank.is_some()
        && !extent.is_empty()
        && grid
            .local_range()
            .contains(&grid.cart().periodic_adjust(&extent.begin()))
}

/// Group participating items by rank. Returns the per-rank counts in rank
/// order and each item's group index.
fn group_by_rank(ranks: impl Iterator<Item = Option<usize>> + Clone) -> (Vec<(usize, usize)>, Vec<Option<usize>>) {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for rank in ranks.clone().flatten() {
        *counts.entry(rank).or_default() += 1;
    }
    let slot: BTreeMap<usize, usize> = counts.keys().enumerate().map(|(i, &r)| (r, i)).collect();
    let indices = ranks.map(|r| r.map(|r| slot[&r])).collect();
    (counts.into_iter().collect(), indices)
}

pub(crate) fn build_sends(
    grid: &Grid,
    extents: &[Range],
    dest_ranks: &[Option<usize>],
) -> (Vec<SendRecord>, Vec<Option<usize>>) {
    let ranks = extents
        .iter()
        .zip(dest_ranks)
        .map(|(extent, &rank)| rank.filter(|_| donor_communicates(grid, extent, rank)));
    let (groups, indices) = group_by_rank(ranks);
    let sends = groups
        .into_iter()
        .map(|(rank, count)| SendRecord { rank, count })
        .collect();
    (sends, indices)
}

pub(crate) fn build_recvs(source_ranks: &[Option<usize>]) -> (Vec<RecvRecord>, Vec<Option<usize>>) {
    let (groups, indices) = group_by_rank(source_ranks.iter().copied());
    let recvs = groups
        .into_iter()
        .map(|(rank, count)| RecvRecord { rank, count })
        .collect();
    (recvs, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cart::Cart;
    use crate::topology::grid::{GridInfo, GridNeighbor};

    #[test]
    fn sorted_input_gives_identity() {
        let global = Range::new(2, [0, 0, 0], [4, 4, 0]);
        let pts = [[3, 0, 0], [0, 1, 0], [2, 3, 0]];
        assert_eq!(sort_by_global_index(&pts, &global), vec![0, 1, 2]);
    }

    #[test]
    fn sorts_column_major_and_keeps_ties_stable() {
        let global = Range::new(2, [0, 0, 0], [4, 4, 0]);
        let pts = [[1, 2, 0], [3, 0, 0], [1, 2, 0], [0, 0, 0], [9, 9, 0]];
        assert_eq!(sort_by_global_index(&pts, &global), vec![4, 3, 1, 0, 2]);
    }

    #[test]
    fn only_the_corner_owner_sends() {
        let global = Range::new(1, [0, 0, 0], [10, 0, 0]);
        let info = GridInfo::new(0, "g", Cart::non_periodic(global));
        let grid = Grid::new(
            info,
            Range::new(1, [0, 0, 0], [5, 0, 0]),
            vec![GridNeighbor {
                rank: 1,
                local_range: Range::new(1, [5, 0, 0], [10, 0, 0]),
            }],
        );
        let extents = [
            Range::new(1, [4, 0, 0], [6, 0, 0]),
            Range::new(1, [5, 0, 0], [7, 0, 0]),
            Range::new(1, [0, 0, 0], [2, 0, 0]),
            Range::new(1, [1, 0, 0], [3, 0, 0]),
        ];
        let dests = [Some(3), Some(3), None, Some(1)];
        let (sends, idx) = build_sends(&grid, &extents, &dests);
        assert_eq!(
            sends,
            vec![SendRecord { rank: 1, count: 1 }, SendRecord { rank: 3, count: 1 }]
        );
        assert_eq!(idx, vec![Some(1), None, None, Some(0)]);
        let total: usize = sends.iter().map(|s| s.count).sum();
        assert_eq!(total, idx.iter().flatten().count());
    }

    #[test]
    fn receives_group_by_source() {
        let (recvs, idx) = build_recvs(&[Some(2), None, Some(0), Some(2)]);
        assert_eq!(
            recvs,
            vec![RecvRecord { rank: 0, count: 1 }, RecvRecord { rank: 2, count: 2 }]
        );
        assert_eq!(idx, vec![Some(1), None, Some(0), Some(1)]);
    }
}
