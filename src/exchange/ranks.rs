//! Owning-rank resolution for donor destinations and receiver sources.

use crate::algs::communicator::Communicator;
use crate::exchange_error::ExchangeError;
use crate::topology::partition_hash::PartitionHash;
use crate::topology::range::Tuple;
use std::collections::BTreeSet;

/// Collective: owning rank of every point. A known rank in `known` wins over
/// the hash lookup; only the remaining points are looked up, in one batch.
/// Every rank must call this, even with no points.
pub(crate) fn resolve_ranks<C: Communicator>(
    comm: &C,
    hash: &PartitionHash,
    points: &[Tuple],
    known: &[Option<usize>],
) -> Result<Vec<Option<usize>>, ExchangeError> {
    // reported after the collective so that no rank leaves it early
    let invalid = known.iter().flatten().copied().find(|&r| r >= comm.size());

    let lookup: Vec<usize> = (0..points.len())
        .filter(|&i| known.get(i).copied().flatten().is_none())
        .collect();
    let lookup_points: Vec<Tuple> = lookup.iter().map(|&i| points[i]).collect();

    let bin_indices = hash.map_to_bins(&lookup_points);
    let needed: BTreeSet<usize> = bin_indices.iter().flatten().copied().collect();
    let bins = hash.retrieve_bins(comm, &needed)?;
    let found = hash.find_ranks(&bins, &lookup_points, &bin_indices);
    if let Some(rank) = invalid {
        return Err(ExchangeError::InvalidRank {
            rank,
            size: comm.size(),
        });
    }

    let mut ranks: Vec<Option<usize>> = (0..points.len())
        .map(|i| known.get(i).copied().flatten())
        .collect();
    for (i, rank) in lookup.into_iter().zip(found) {
        ranks[i] = rank;
    }
    Ok(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{CommTag, run_local};
    use crate::topology::range::Range;

    #[test]
    fn known_ranks_override_lookup() {
        let out = run_local(2, |comm| {
            let global = Range::new(1, [0, 0, 0], [8, 0, 0]);
            let local = if comm.rank() == 0 {
                Range::new(1, [0, 0, 0], [4, 0, 0])
            } else {
                Range::new(1, [4, 0, 0], [8, 0, 0])
            };
            let hash = PartitionHash::create(&comm, CommTag::new(0x700), global, &local).unwrap();
            let points = [[1, 0, 0], [6, 0, 0], [6, 0, 0], [-1, 0, 0]];
            let known = [None, None, Some(0), None];
            resolve_ranks(&comm, &hash, &points, &known).unwrap()
        });
        for ranks in out {
            assert_eq!(ranks, vec![Some(0), Some(1), Some(0), None]);
        }
    }

    #[test]
    fn out_of_range_known_rank_is_rejected() {
        let global = Range::new(1, [0, 0, 0], [4, 0, 0]);
        let comm = crate::algs::communicator::NoComm;
        let hash = PartitionHash::create(&comm, CommTag::new(0x710), global, &global).unwrap();
        let err = resolve_ranks(&comm, &hash, &[[0, 0, 0]], &[Some(3)]).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidRank { rank: 3, .. }));
    }
}
