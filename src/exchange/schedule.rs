//! Derived communication schedule of an exchange.

use crate::debug_invariants::{DebugInvariants, ensure};
use crate::exchange_error::ExchangeError;
use crate::topology::range::Tuple;
use serde::Serialize;

/// Donor values sent to one rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendRecord {
    pub rank: usize,
    pub count: usize,
}

/// Receiver values expected from one rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecvRecord {
    pub rank: usize,
    pub count: usize,
}

/// Local grid points shipped to a neighbour during collect, in canonical
/// (column-major) order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollectSend {
    pub rank: usize,
    pub points: Vec<Tuple>,
}

/// Number of ghost points expected from a neighbour during collect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollectRecv {
    pub rank: usize,
    pub num_points: usize,
}

/// Where a non-local stencil point of a donor comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemotePoint {
    /// Column-major index of the point inside the donor cell.
    pub point_in_cell: usize,
    /// Index into the collect receive records.
    pub collect_recv: usize,
    /// Slot in that record's ghost buffer.
    pub buffer_index: usize,
}

/// Remote stencil points of every donor, stored contiguously per donor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemoteDonorPoints {
    offsets: Vec<usize>,
    points: Vec<RemotePoint>,
}

impl RemoteDonorPoints {
    pub(crate) fn from_lists(lists: Vec<Vec<RemotePoint>>) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        offsets.push(0);
        let mut points = Vec::new();
        for list in lists {
            points.extend(list);
            offsets.push(points.len());
        }
        Self { offsets, points }
    }

    pub fn num_donors(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn for_donor(&self, donor: usize) -> &[RemotePoint] {
        match (self.offsets.get(donor), self.offsets.get(donor + 1)) {
            (Some(&a), Some(&b)) => &self.points[a..b],
            _ => &[],
        }
    }

    /// Total number of remote points across donors.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Every field derived from the connectivity. Two schedules built from the
/// same connectivity compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub(crate) donor_dest_ranks: Vec<Option<usize>>,
    pub(crate) receiver_source_ranks: Vec<Option<usize>>,
    pub(crate) donors_sorted: Vec<usize>,
    pub(crate) receivers_sorted: Vec<usize>,
    pub(crate) sends: Vec<SendRecord>,
    pub(crate) recvs: Vec<RecvRecord>,
    pub(crate) donor_send_indices: Vec<Option<usize>>,
    pub(crate) receiver_recv_indices: Vec<Option<usize>>,
    pub(crate) collect_sends: Vec<CollectSend>,
    pub(crate) collect_recvs: Vec<CollectRecv>,
    pub(crate) remote_donor_points: RemoteDonorPoints,
}

impl Schedule {
    /// Owning rank of each donor's destination.
    pub fn donor_dest_ranks(&self) -> &[Option<usize>] {
        &self.donor_dest_ranks
    }
    /// Owning rank of each receiver's source cell.
    pub fn receiver_source_ranks(&self) -> &[Option<usize>] {
        &self.receiver_source_ranks
    }
    /// Donor ids ordered by destination global index.
    pub fn donors_sorted(&self) -> &[usize] {
        &self.donors_sorted
    }
    /// Receiver ids ordered by point global index.
    pub fn receivers_sorted(&self) -> &[usize] {
        &self.receivers_sorted
    }
    pub fn sends(&self) -> &[SendRecord] {
        &self.sends
    }
    pub fn recvs(&self) -> &[RecvRecord] {
        &self.recvs
    }
    /// Send record of each donor, `None` if the donor does not communicate.
    pub fn donor_send_indices(&self) -> &[Option<usize>] {
        &self.donor_send_indices
    }
    /// Receive record of each receiver, `None` if nothing arrives for it.
    pub fn receiver_recv_indices(&self) -> &[Option<usize>] {
        &self.receiver_recv_indices
    }
    pub fn collect_sends(&self) -> &[CollectSend] {
        &self.collect_sends
    }
    pub fn collect_recvs(&self) -> &[CollectRecv] {
        &self.collect_recvs
    }
    pub fn remote_donor_points(&self) -> &RemoteDonorPoints {
        &self.remote_donor_points
    }
}

fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    perm.iter()
        .all(|&i| i < seen.len() && !std::mem::replace(&mut seen[i], true))
}

fn check_membership(
    what: &str,
    ranks: impl Iterator<Item = usize>,
    counts: impl Iterator<Item = usize>,
    indices: &[Option<usize>],
) -> Result<(), ExchangeError> {
    let ranks: Vec<usize> = ranks.collect();
    ensure(ranks.windows(2).all(|w| w[0] < w[1]), || {
        format!("{what} records not strictly ordered by rank: {ranks:?}")
    })?;
    let mut tally = vec![0usize; ranks.len()];
    for idx in indices.iter().flatten() {
        ensure(*idx < tally.len(), || format!("{what} index {idx} out of range"))?;
        tally[*idx] += 1;
    }
    let counts: Vec<usize> = counts.collect();
    ensure(tally == counts, || {
        format!("{what} counts {counts:?} disagree with memberships {tally:?}")
    })
}

impl DebugInvariants for Schedule {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "exchange schedule");
    }

    fn validate_invariants(&self) -> Result<(), ExchangeError> {
        let n_donors = self.donor_send_indices.len();
        let n_receivers = self.receiver_recv_indices.len();
        ensure(
            self.donors_sorted.len() == n_donors && is_permutation(&self.donors_sorted),
            || "donors_sorted is not a permutation of the donors".into(),
        )?;
        ensure(
            self.receivers_sorted.len() == n_receivers && is_permutation(&self.receivers_sorted),
            || "receivers_sorted is not a permutation of the receivers".into(),
        )?;
        check_membership(
            "send",
            self.sends.iter().map(|s| s.rank),
            self.sends.iter().map(|s| s.count),
            &self.donor_send_indices,
        )?;
        check_membership(
            "recv",
            self.recvs.iter().map(|r| r.rank),
            self.recvs.iter().map(|r| r.count),
            &self.receiver_recv_indices,
        )?;
        ensure(
            self.remote_donor_points.num_donors() == n_donors,
            || "remote point lists do not cover every donor".into(),
        )?;
        for p in &self.remote_donor_points.points {
            let rec = self.collect_recvs.get(p.collect_recv);
            ensure(rec.is_some_and(|r| p.buffer_index < r.num_points), || {
                format!("remote point {p:?} addresses a missing ghost slot")
            })?;
        }
        Ok(())
    }
}
