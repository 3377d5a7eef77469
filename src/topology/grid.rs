//! Structured grids partitioned into per-rank boxes.

use super::cart::Cart;
use super::range::{MAX_DIMS, Range};
use crate::algs::collective::all_gather;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::WireRange;
use crate::exchange_error::ExchangeError;
use serde::{Deserialize, Serialize};

pub type GridId = usize;

/// Globally known description of a grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridInfo {
    id: GridId,
    name: String,
    cart: Cart,
}

impl GridInfo {
    pub fn new(id: GridId, name: impl Into<String>, cart: Cart) -> Self {
        Self {
            id,
            name: name.into(),
            cart,
        }
    }

    pub fn id(&self) -> GridId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn num_dims(&self) -> usize {
        self.cart.num_dims()
    }
    pub fn cart(&self) -> &Cart {
        &self.cart
    }
    pub fn global_range(&self) -> &Range {
        self.cart.range()
    }
}

/// A rank owning part of the grid near the local partition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridNeighbor {
    pub rank: usize,
    pub local_range: Range,
}

/// The local piece of a partitioned grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    info: GridInfo,
    local_range: Range,
    neighbors: Vec<GridNeighbor>,
}

impl Grid {
    /// Grid piece with an explicit neighbour list (sorted by rank on entry).
    pub fn new(info: GridInfo, local_range: Range, mut neighbors: Vec<GridNeighbor>) -> Self {
        neighbors.sort_by_key(|n| n.rank);
        neighbors.dedup_by_key(|n| n.rank);
        Self {
            info,
            local_range,
            neighbors,
        }
    }

    /// Grid piece of `rank` given every rank's local range. Ranks whose range
    /// comes within `halo` points of the local range (across periodic seams
    /// too) become neighbours.
    pub fn from_partition(
        info: GridInfo,
        rank: usize,
        partition: &[Range],
        halo: usize,
    ) -> Result<Self, ExchangeError> {
        let local_range = *partition.get(rank).ok_or(ExchangeError::InvalidRank {
            rank,
            size: partition.len(),
        })?;
        let reach = local_range.dilate(halo as i32);
        let neighbors = partition
            .iter()
            .enumerate()
            .filter(|&(r, range)| r != rank && !range.is_empty() && !local_range.is_empty())
            .filter(|&(_, range)| touches(info.cart(), &reach, range))
            .map(|(r, range)| GridNeighbor {
                rank: r,
                local_range: *range,
            })
            .collect();
        Ok(Self::new(info, local_range, neighbors))
    }

    /// Collective: exchange local ranges and build the local grid piece.
    /// Ranks that do not hold the grid pass an empty `local_range`.
    pub fn gather_partition<C: Communicator>(
        comm: &C,
        tag: CommTag,
        info: GridInfo,
        local_range: Range,
        halo: usize,
    ) -> Result<Self, ExchangeError> {
        let gathered = all_gather(comm, tag, &[WireRange::of(&local_range)])?;
        let partition: Vec<Range> = gathered
            .iter()
            .map(|v| {
                v.first()
                    .map_or_else(|| Range::empty(info.num_dims()), WireRange::get)
            })
            .collect();
        Self::from_partition(info, comm.rank(), &partition, halo)
    }

    pub fn info(&self) -> &GridInfo {
        &self.info
    }
    pub fn id(&self) -> GridId {
        self.info.id()
    }
    pub fn name(&self) -> &str {
        self.info.name()
    }
    pub fn num_dims(&self) -> usize {
        self.info.num_dims()
    }
    pub fn cart(&self) -> &Cart {
        self.info.cart()
    }
    pub fn global_range(&self) -> &Range {
        self.info.global_range()
    }
    pub fn local_range(&self) -> &Range {
        &self.local_range
    }
    pub fn neighbors(&self) -> &[GridNeighbor] {
        &self.neighbors
    }
}

/// Does `reach` overlap `other`, or one of its periodic images?
fn touches(cart: &Cart, reach: &Range, other: &Range) -> bool {
    let mut shifts: Vec<[i32; MAX_DIMS]> = vec![[0; MAX_DIMS]];
    for d in (0..cart.num_dims()).filter(|&d| cart.is_periodic(d)) {
        let period = cart.period(d);
        shifts = shifts
            .into_iter()
            .flat_map(|s| {
                [-period, 0, period].map(|delta| {
                    let mut t = s;
                    t[d] = delta;
                    t
                })
            })
            .collect();
    }
    shifts
        .iter()
        .any(|shift| reach.overlaps(&other.translate(shift)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::run_local;
    use crate::topology::cart::PeriodicStorage;

    fn strip(n: i32, periodic: bool) -> GridInfo {
        let range = Range::new(1, [0, 0, 0], [n, 0, 0]);
        GridInfo::new(
            0,
            "strip",
            Cart::new(range, [periodic, false, false], PeriodicStorage::Unique),
        )
    }

    fn thirds() -> Vec<Range> {
        vec![
            Range::new(1, [0, 0, 0], [4, 0, 0]),
            Range::new(1, [4, 0, 0], [8, 0, 0]),
            Range::new(1, [8, 0, 0], [12, 0, 0]),
        ]
    }

    #[test]
    fn neighbors_are_adjacent_ranks() {
        let g = Grid::from_partition(strip(12, false), 0, &thirds(), 1).unwrap();
        let ranks: Vec<_> = g.neighbors().iter().map(|n| n.rank).collect();
        assert_eq!(ranks, vec![1]);
        assert_eq!(g.local_range().count(), 4);
    }

    #[test]
    fn periodic_seam_adds_wraparound_neighbor() {
        let g = Grid::from_partition(strip(12, true), 0, &thirds(), 1).unwrap();
        let ranks: Vec<_> = g.neighbors().iter().map(|n| n.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn missing_rank_is_an_error() {
        assert!(Grid::from_partition(strip(12, false), 5, &thirds(), 1).is_err());
    }

    #[test]
    fn gathered_partition_matches_local_construction() {
        let grids = run_local(3, |comm| {
            let local = thirds()[comm.rank()];
            Grid::gather_partition(&comm, CommTag::new(0x500), strip(12, true), local, 1).unwrap()
        });
        for (rank, g) in grids.into_iter().enumerate() {
            assert_eq!(g, Grid::from_partition(strip(12, true), rank, &thirds(), 1).unwrap());
        }
    }
}
