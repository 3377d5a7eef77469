//! Collectives built from point-to-point messages.
//!
//! Every helper posts all receives first, then all sends, waits for every
//! receive without returning early, and drains all send handles before
//! reporting the first error. Sizes are always known to the receiver before
//! payloads are posted, either from the caller or from a count round.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, collect_from_bytes};
use crate::exchange_error::ExchangeError;
use bytemuck::Pod;
use std::collections::BTreeMap;

fn check_rank<C: Communicator>(comm: &C, rank: usize) -> Result<(), ExchangeError> {
    if rank < comm.size() {
        Ok(())
    } else {
        Err(ExchangeError::InvalidRank {
            rank,
            size: comm.size(),
        })
    }
}

/// Exchange payloads whose sizes are known on both sides.
///
/// `recv_counts[r]` is the number of `T` expected from rank `r`; `sends[r]`
/// goes to rank `r`. A payload addressed to the calling rank is moved across
/// locally. Returns the received payloads keyed by source rank.
pub fn exchange_payloads<C, T>(
    comm: &C,
    tag: CommTag,
    recv_counts: &BTreeMap<usize, usize>,
    sends: &BTreeMap<usize, Vec<T>>,
) -> Result<BTreeMap<usize, Vec<T>>, ExchangeError>
where
    C: Communicator,
    T: Pod,
{
    let me = comm.rank();
    let elem = std::mem::size_of::<T>();

    // Nothing is posted unless every peer and the local payload check out.
    for &r in recv_counts.keys().chain(sends.keys()) {
        check_rank(comm, r)?;
    }
    let local = match recv_counts.get(&me) {
        Some(&n) => {
            let local = sends.get(&me).cloned().unwrap_or_default();
            if local.len() != n {
                return Err(ExchangeError::BufferSizeMismatch {
                    neighbor: me,
                    expected: n * elem,
                    got: local.len() * elem,
                });
            }
            Some(local)
        }
        None => None,
    };

    let mut pending_recvs = Vec::with_capacity(recv_counts.len());
    for (&src, &n) in recv_counts.iter().filter(|&(&src, _)| src != me) {
        let mut buf = vec![0u8; n * elem];
        let h = comm.irecv(src, tag.as_u16(), &mut buf);
        pending_recvs.push((src, n * elem, h));
    }

    let pending_sends: Vec<_> = sends
        .iter()
        .filter(|&(&dst, _)| dst != me)
        .map(|(&dst, payload)| comm.isend(dst, tag.as_u16(), cast_slice(payload)))
        .collect();

    let mut out = BTreeMap::new();
    if let Some(local) = local {
        out.insert(me, local);
    }

    let mut maybe_err = None;
    for (src, expected, h) in pending_recvs {
        match h.wait() {
            Some(raw) if raw.len() == expected => {
                out.insert(src, collect_from_bytes(&raw));
            }
            Some(raw) => {
                maybe_err.get_or_insert(ExchangeError::BufferSizeMismatch {
                    neighbor: src,
                    expected,
                    got: raw.len(),
                });
            }
            None => {
                maybe_err.get_or_insert(ExchangeError::CommError {
                    neighbor: src,
                    source: format!("no payload received from rank {src}").into(),
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Personalized all-to-all with per-destination counts unknown to the
/// receivers. Uses `tag` for the count round and `tag + 1` for payloads.
///
/// Only non-empty payloads appear in the result.
pub fn all_to_all_varcount<C, T>(
    comm: &C,
    tag: CommTag,
    sends: &BTreeMap<usize, Vec<T>>,
) -> Result<BTreeMap<usize, Vec<T>>, ExchangeError>
where
    C: Communicator,
    T: Pod,
{
    let me = comm.rank();
    let size = comm.size();
    for &dst in sends.keys() {
        check_rank(comm, dst)?;
    }

    let counts: BTreeMap<usize, Vec<WireCount>> = (0..size)
        .filter(|&r| r != me)
        .map(|r| (r, vec![WireCount::new(sends.get(&r).map_or(0, Vec::len))]))
        .collect();
    let expect_one: BTreeMap<usize, usize> = counts.keys().map(|&r| (r, 1)).collect();
    let received = exchange_payloads(comm, tag, &expect_one, &counts)?;

    let mut recv_counts: BTreeMap<usize, usize> = received
        .into_iter()
        .filter_map(|(src, c)| c.first().map(WireCount::get).map(|n| (src, n)))
        .filter(|&(_, n)| n > 0)
        .collect();
    if let Some(local) = sends.get(&me).filter(|v| !v.is_empty()) {
        recv_counts.insert(me, local.len());
    }

    let nonempty: BTreeMap<usize, Vec<T>> = sends
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(&r, v)| (r, v.clone()))
        .collect();
    exchange_payloads(comm, tag.offset(1), &recv_counts, &nonempty)
}

/// Gather `value` from every rank, indexed by rank.
pub fn all_gather<C, T>(comm: &C, tag: CommTag, value: &[T]) -> Result<Vec<Vec<T>>, ExchangeError>
where
    C: Communicator,
    T: Pod,
{
    let size = comm.size();
    let sends: BTreeMap<usize, Vec<T>> = (0..size).map(|r| (r, value.to_vec())).collect();
    let mut received = all_to_all_varcount(comm, tag, &sends)?;
    Ok((0..size)
        .map(|r| received.remove(&r).unwrap_or_default())
        .collect())
}

/// Bitwise OR of `bits` across all ranks.
pub fn all_reduce_or<C: Communicator>(
    comm: &C,
    tag: CommTag,
    bits: u32,
) -> Result<u32, ExchangeError> {
    if comm.is_no_comm() {
        return Ok(bits);
    }
    let all = all_gather(comm, tag, &[bits])?;
    Ok(all.iter().flatten().fold(0, |acc, b| acc | b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, run_local};

    #[test]
    fn varcount_delivers_personalized_payloads() {
        let out = run_local(3, |comm| {
            let me = comm.rank() as u32;
            // rank r sends r+1 copies of (100*r + dst) to every rank dst != r+1 mod 3
            let sends: BTreeMap<usize, Vec<u32>> = (0..3usize)
                .filter(|&dst| dst != (comm.rank() + 1) % 3)
                .map(|dst| (dst, vec![100 * me + dst as u32; comm.rank() + 1]))
                .collect();
            all_to_all_varcount(&comm, CommTag::new(0x200), &sends).unwrap()
        });
        // rank 1 hears nothing from rank 0
        assert!(!out[1].contains_key(&0));
        assert_eq!(out[1][&1], vec![101, 101]);
        assert_eq!(out[1][&2], vec![201, 201, 201]);
        assert_eq!(out[0][&0], vec![0]);
        assert_eq!(out[0][&1], vec![100, 100]);
    }

    #[test]
    fn repeated_collectives_on_one_tag_stay_ordered() {
        let out = run_local(2, |comm| {
            (0..5u32)
                .map(|round| all_gather(&comm, CommTag::new(0x300), &[round + comm.rank() as u32 * 10]).unwrap())
                .collect::<Vec<_>>()
        });
        for (round, gathered) in out[0].iter().enumerate() {
            assert_eq!(gathered, &vec![vec![round as u32], vec![round as u32 + 10]]);
        }
    }

    #[test]
    fn or_reduce_combines_flags() {
        let out = run_local(3, |comm| {
            all_reduce_or(&comm, CommTag::new(0x400), 1 << comm.rank()).unwrap()
        });
        assert_eq!(out, vec![0b111; 3]);
        assert_eq!(all_reduce_or(&NoComm, CommTag::new(0), 0b10).unwrap(), 0b10);
    }

    #[test]
    fn serial_self_exchange() {
        let sends = BTreeMap::from([(0usize, vec![4u16, 5])]);
        let got = all_to_all_varcount(&NoComm, CommTag::new(1), &sends).unwrap();
        assert_eq!(got[&0], vec![4, 5]);
    }

    #[test]
    fn unknown_rank_is_rejected() {
        let sends = BTreeMap::from([(3usize, vec![1u8])]);
        let err = all_to_all_varcount(&NoComm, CommTag::new(1), &sends).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidRank { rank: 3, size: 1 }));
    }

    #[test]
    fn rejected_exchange_posts_nothing() {
        let tag = CommTag::new(0x500);
        let out = run_local(2, |comm| {
            if comm.rank() == 0 {
                let bad_peer = BTreeMap::from([(1usize, vec![7u32]), (5, vec![1])]);
                let err = exchange_payloads(&comm, tag, &BTreeMap::new(), &bad_peer).unwrap_err();
                assert!(matches!(err, ExchangeError::InvalidRank { rank: 5, size: 2 }));

                let short_local = BTreeMap::from([(0usize, vec![1u32]), (1, vec![8])]);
                let counts = BTreeMap::from([(0usize, 2usize)]);
                let err = exchange_payloads(&comm, tag, &counts, &short_local).unwrap_err();
                assert!(matches!(err, ExchangeError::BufferSizeMismatch { neighbor: 0, .. }));
            }
            comm.barrier();
            let sends = if comm.rank() == 0 {
                BTreeMap::from([(1usize, vec![9u32])])
            } else {
                BTreeMap::new()
            };
            let counts = if comm.rank() == 1 {
                BTreeMap::from([(0usize, 1usize)])
            } else {
                BTreeMap::new()
            };
            exchange_payloads(&comm, tag, &counts, &sends).unwrap()
        });
        // neither the 7 nor the 8 from the rejected calls is in the queue
        assert_eq!(out[1][&0], vec![9]);
        assert!(out[0].is_empty());
    }
}
