//! Distributed point → owning-rank lookup.
//!
//! The column-major linearised global index space is cut into one bin per
//! rank, bin `b` being stored on rank `b`. A bin records every
//! `(rank, local_range)` pair whose range touches the bin's index interval,
//! so resolving a point only needs the one bin it falls into. Lookups are
//! batched: map all points to bins locally, fetch the distinct bins in a
//! single collective round trip, then search locally.

use super::indexer::RangeIndexer;
use super::range::{Range, Tuple};
use crate::algs::collective::all_to_all_varcount;
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{WireBinEntry, WireCount};
use crate::exchange_error::ExchangeError;
use std::collections::{BTreeMap, BTreeSet};

/// One `(rank, range)` registration in a bin.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BinEntry {
    pub rank: usize,
    pub range: Range,
}

/// All partition ranges touching one bin, ordered by rank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionBin {
    entries: Vec<BinEntry>,
}

impl PartitionBin {
    pub fn entries(&self) -> &[BinEntry] {
        &self.entries
    }

    /// Rank whose range contains `p`, if any.
    pub fn find(&self, p: &Tuple) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.range.contains(p))
            .map(|e| e.rank)
    }
}

#[derive(Clone, Debug)]
pub struct PartitionHash {
    global_range: Range,
    indexer: RangeIndexer,
    num_bins: usize,
    bin_size: usize,
    local_bin: PartitionBin,
    tag: CommTag,
}

impl PartitionHash {
    /// Collective: every rank registers its local range (possibly empty) with
    /// the bins it touches. Uses `tag..tag+5`.
    pub fn create<C: Communicator>(
        comm: &C,
        tag: CommTag,
        global_range: Range,
        local_range: &Range,
    ) -> Result<Self, ExchangeError> {
        let num_bins = comm.size().max(1);
        let total = global_range.count();
        let bin_size = total.div_ceil(num_bins).max(1);
        let indexer = RangeIndexer::grid(global_range);

        let mut registrations: BTreeMap<usize, Vec<WireBinEntry>> = BTreeMap::new();
        let owned = global_range.intersect(local_range);
        if !owned.is_empty() {
            let first = indexer.to_index(&owned.begin()) / bin_size;
            let last = indexer.to_index(&owned.end().map(|e| e - 1)) / bin_size;
            for bin in first..=last.min(num_bins - 1) {
                registrations
                    .entry(bin)
                    .or_default()
                    .push(WireBinEntry::new(comm.rank(), &owned));
            }
        }
        let received = all_to_all_varcount(comm, tag, &registrations)?;
        let entries = received
            .values()
            .flatten()
            .map(|w| {
                let (rank, range) = w.decode();
                BinEntry { rank, range }
            })
            .collect();

        Ok(Self {
            global_range,
            indexer,
            num_bins,
            bin_size,
            local_bin: PartitionBin { entries },
            tag,
        })
    }

    pub fn global_range(&self) -> &Range {
        &self.global_range
    }
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// The bin stored on this rank.
    pub fn local_bin(&self) -> &PartitionBin {
        &self.local_bin
    }

    /// Local: bin index of each point, `None` for points outside the grid.
    pub fn map_to_bins(&self, points: &[Tuple]) -> Vec<Option<usize>> {
        points
            .iter()
            .map(|p| {
                self.indexer
                    .try_index(p)
                    .map(|i| (i / self.bin_size).min(self.num_bins - 1))
            })
            .collect()
    }

    /// Collective: fetch the requested bins from their owners. Every rank
    /// must call this, with an empty set if it needs nothing.
    pub fn retrieve_bins<C: Communicator>(
        &self,
        comm: &C,
        bin_indices: &BTreeSet<usize>,
    ) -> Result<BTreeMap<usize, PartitionBin>, ExchangeError> {
        let requests: BTreeMap<usize, Vec<WireCount>> = bin_indices
            .iter()
            .map(|&b| (b, vec![WireCount::new(1)]))
            .collect();
        let requesters = all_to_all_varcount(comm, self.tag.offset(2), &requests)?;

        let replies: BTreeMap<usize, Vec<WireBinEntry>> = requesters
            .keys()
            .map(|&r| {
                let entries = self
                    .local_bin
                    .entries
                    .iter()
                    .map(|e| WireBinEntry::new(e.rank, &e.range))
                    .collect();
                (r, entries)
            })
            .collect();
        let mut answers = all_to_all_varcount(comm, self.tag.offset(4), &replies)?;

        Ok(bin_indices
            .iter()
            .map(|&b| {
                let entries = answers
                    .remove(&b)
                    .unwrap_or_default()
                    .iter()
                    .map(|w| {
                        let (rank, range) = w.decode();
                        BinEntry { rank, range }
                    })
                    .collect();
                (b, PartitionBin { entries })
            })
            .collect())
    }

    /// Local: owning rank of each point, `None` when unresolved.
    pub fn find_ranks(
        &self,
        bins: &BTreeMap<usize, PartitionBin>,
        points: &[Tuple],
        bin_indices: &[Option<usize>],
    ) -> Vec<Option<usize>> {
        points
            .iter()
            .zip(bin_indices)
            .map(|(p, bin)| bins.get(&(*bin)?)?.find(p))
            .collect()
    }

    /// Collective convenience: resolve `points` in one batch.
    pub fn owning_ranks<C: Communicator>(
        &self,
        comm: &C,
        points: &[Tuple],
    ) -> Result<Vec<Option<usize>>, ExchangeError> {
        let bin_indices = self.map_to_bins(points);
        let needed: BTreeSet<usize> = bin_indices.iter().flatten().copied().collect();
        let bins = self.retrieve_bins(comm, &needed)?;
        Ok(self.find_ranks(&bins, points, &bin_indices))
    }
}
