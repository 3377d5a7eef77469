//! The exchange: a connectivity plus the communication schedule derived
//! from it.
//!
//! Creating an exchange builds partition hashes for both grids, resolves the
//! owning rank of every donor destination and receiver source, and derives
//! the collect maps and send/receive groupings ([`Schedule`]). Structural
//! edits to the connectivity are folded in by [`Exchange::update`], which
//! recomputes only what the edits invalidate.
//!
//! Create, update and destroy are collective over the exchange's
//! communicator.

pub mod collect_map;
pub mod options;
pub mod schedule;

mod ranks;
mod send_map;

pub use collect_map::{CollectMaps, build_collect_maps, count_nonlocal_points};
pub use options::{ExchangeCommTags, ExchangeOptions};
pub use schedule::{
    CollectRecv, CollectSend, RecvRecord, RemoteDonorPoints, RemotePoint, Schedule, SendRecord,
};

use crate::algs::collective::all_reduce_or;
use crate::algs::communicator::Communicator;
use crate::connectivity::{Connectivity, ConnectivityEdits, ConnectivityM};
use crate::debug_invariants::DebugInvariants;
use crate::exchange_error::ExchangeError;
use crate::profiler::Profiler;
use crate::topology::grid::GridId;
use crate::topology::partition_hash::PartitionHash;
use crate::topology::range::{Range, Tuple};
use log::{debug, info};
use ranks::resolve_ranks;
use send_map::{build_recvs, build_sends, sort_by_global_index};
use serde::Serialize;

/// Summary of an exchange as seen from one rank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExchangeInfo {
    pub name: String,
    pub donor_grid: GridId,
    pub receiver_grid: GridId,
    pub num_dims: usize,
    /// This rank holds donors of the connectivity.
    pub has_donor_side: bool,
    /// This rank holds receivers of the connectivity.
    pub has_receiver_side: bool,
}

/// Which schedule parts a set of edits invalidates.
#[derive(Copy, Clone, Debug, Default)]
struct Rebuild {
    donor_order: bool,
    destination_ranks: bool,
    collect_maps: bool,
    sends: bool,
    receiver_order: bool,
    source_ranks: bool,
}

impl Rebuild {
    fn from_edits(e: &ConnectivityEdits) -> Self {
        let destination_ranks = e.num_donors || e.donor_destinations || e.donor_destination_ranks;
        Self {
            donor_order: e.num_donors || e.donor_destinations,
            destination_ranks,
            collect_maps: e.num_donors || e.donor_extents,
            // corner ownership depends on the extents
            sends: destination_ranks || e.donor_extents,
            receiver_order: e.num_receivers || e.receiver_points,
            source_ranks: e.num_receivers || e.receiver_sources || e.receiver_source_ranks,
        }
    }
}

/// Communication schedule between the donor and receiver sides of one
/// connectivity.
pub struct Exchange<C: Communicator> {
    comm: C,
    options: ExchangeOptions,
    profiler: Profiler,
    connectivity: Connectivity,
    source_hash: PartitionHash,
    destination_hash: PartitionHash,
    schedule: Schedule,
}

impl<C: Communicator> Exchange<C> {
    /// Collective: build the exchange for `connectivity`.
    ///
    /// Every rank of `comm` must call this, including ranks that hold
    /// neither side. A rank holding a piece of a grid should attach the
    /// corresponding side, even with no entries, so that points on that
    /// piece can be located.
    pub fn create(
        connectivity: Connectivity,
        comm: C,
        options: ExchangeOptions,
        profiler: Profiler,
    ) -> Result<Self, ExchangeError> {
        comm.barrier();
        let nd = connectivity.num_dims();
        let donor_local = connectivity
            .donors()
            .map_or_else(|| Range::empty(nd), |m| *m.grid().local_range());
        let receiver_local = connectivity
            .receivers()
            .map_or_else(|| Range::empty(nd), |n| *n.grid().local_range());
        let source_hash = PartitionHash::create(
            &comm,
            options.tags.source_hash,
            *connectivity.donor_grid().global_range(),
            &donor_local,
        )?;
        let destination_hash = PartitionHash::create(
            &comm,
            options.tags.destination_hash,
            *connectivity.receiver_grid().global_range(),
            &receiver_local,
        )?;

        let mut exchange = Self {
            comm,
            options,
            profiler,
            connectivity,
            source_hash,
            destination_hash,
            schedule: Schedule::default(),
        };
        exchange.connectivity.take_edits();
        let built = exchange.rebuild(ConnectivityEdits::all());
        exchange.comm.barrier();
        built?;

        exchange.log_status(|name| format!("Created exchange {name}."));
        Ok(exchange)
    }

    /// Collective: fold pending connectivity edits into the schedule.
    ///
    /// Edits are combined across ranks first, so every rank recomputes the
    /// same parts even if only one of them edited. Without any pending edit
    /// this leaves the schedule untouched.
    pub fn update(&mut self) -> Result<(), ExchangeError> {
        self.comm.barrier();
        self.log_status(|name| format!("Updating exchange {name}..."));

        let local = self.connectivity.take_edits();
        let mut edits = local;
        let rebuilt = all_reduce_or(&self.comm, self.options.tags.fence, local.to_bits())
            .and_then(|bits| {
                edits = ConnectivityEdits::from_bits(bits);
                if edits.any() { self.rebuild(edits) } else { Ok(()) }
            });
        self.comm.barrier();
        if let Err(e) = rebuilt {
            // keep the schedule marked stale until an update succeeds
            self.connectivity.restore_edits(edits);
            return Err(e);
        }

        self.log_status(|name| format!("Done updating exchange {name}."));
        Ok(())
    }

    /// Collective: recompute the whole schedule regardless of edits.
    pub fn rebuild_all(&mut self) -> Result<(), ExchangeError> {
        self.comm.barrier();
        let local = self.connectivity.take_edits();
        let rebuilt = self.rebuild(ConnectivityEdits::all());
        self.comm.barrier();
        if rebuilt.is_err() {
            self.connectivity.restore_edits(local);
        }
        rebuilt
    }

    /// Collective: tear the exchange down and hand back its connectivity.
    pub fn destroy(self) -> Connectivity {
        self.comm.barrier();
        self.log_status(|name| format!("Destroyed exchange {name}."));
        self.connectivity
    }

    fn rebuild(&mut self, edits: ConnectivityEdits) -> Result<(), ExchangeError> {
        let todo = Rebuild::from_edits(&edits);
        debug!(
            "rank {}: rebuilding exchange '{}' for {edits:?}",
            self.comm.rank(),
            self.connectivity.name()
        );
        let Self {
            ref comm,
            ref connectivity,
            ref source_hash,
            ref destination_hash,
            ref mut schedule,
            ..
        } = *self;
        let donors = connectivity.donors();
        let receivers = connectivity.receivers();

        // Collective part first: a rank failing validation must not leave
        // the others waiting in a lookup.
        let mut destination_ranks = None;
        let mut source_ranks = None;
        if todo.destination_ranks {
            let (points, known): (&[Tuple], &[Option<usize>]) = match donors {
                Some(m) => (m.destinations(), m.destination_ranks()),
                None => (&[], &[]),
            };
            destination_ranks = Some(resolve_ranks(comm, destination_hash, points, known));
        }
        if todo.source_ranks {
            let (points, known): (&[Tuple], &[Option<usize>]) = match receivers {
                Some(n) => (n.sources(), n.source_ranks()),
                None => (&[], &[]),
            };
            source_ranks = Some(resolve_ranks(comm, source_hash, points, known));
        }
        // Fields are built into a copy and committed only once everything
        // succeeded, so a failed rebuild leaves the previous schedule intact.
        let mut next = schedule.clone();
        if let Some(ranks) = destination_ranks {
            next.donor_dest_ranks = ranks?;
        }
        if let Some(ranks) = source_ranks {
            next.receiver_source_ranks = ranks?;
        }

        if let Some(m) = donors.filter(|_| todo.collect_maps || todo.sends) {
            validate_extents(connectivity.name(), m)?;
        }

        let receiver_global = connectivity.receiver_grid().global_range();
        if todo.donor_order {
            next.donors_sorted = donors
                .map(|m| sort_by_global_index(m.destinations(), receiver_global))
                .unwrap_or_default();
        }
        if todo.collect_maps {
            let maps = donors
                .map(|m| build_collect_maps(m.grid(), m.extents()))
                .unwrap_or_default();
            next.collect_sends = maps.collect_sends;
            next.collect_recvs = maps.collect_recvs;
            next.remote_donor_points = maps.remote_donor_points;
        }
        if todo.sends {
            let (sends, indices) = donors
                .map(|m| build_sends(m.grid(), m.extents(), &next.donor_dest_ranks))
                .unwrap_or_default();
            next.sends = sends;
            next.donor_send_indices = indices;
        }
        if todo.receiver_order {
            next.receivers_sorted = receivers
                .map(|n| sort_by_global_index(n.points(), receiver_global))
                .unwrap_or_default();
        }
        if todo.source_ranks {
            let (recvs, indices) = build_recvs(&next.receiver_source_ranks);
            next.recvs = recvs;
            next.receiver_recv_indices = indices;
        }

        debug!(
            "rank {}: exchange '{}' has {} sends, {} recvs, {} collect neighbours",
            comm.rank(),
            connectivity.name(),
            next.sends.len(),
            next.recvs.len(),
            next.collect_recvs.len().max(next.collect_sends.len())
        );
        next.debug_assert_invariants();
        *schedule = next;
        Ok(())
    }

    fn log_status(&self, message: impl FnOnce(&str) -> String) {
        if self.options.log_status && self.comm.rank() == 0 {
            info!("{}", message(self.connectivity.name()));
        }
    }

    /// Fails if the connectivity carries edits the schedule does not reflect.
    pub(crate) fn ensure_current(&self) -> Result<(), ExchangeError> {
        if self.connectivity.pending_edits().any() {
            return Err(ExchangeError::ScheduleOutOfDate(self.name().to_string()));
        }
        Ok(())
    }

    pub fn info(&self) -> ExchangeInfo {
        ExchangeInfo {
            name: self.connectivity.name().to_string(),
            donor_grid: self.connectivity.donor_grid().id(),
            receiver_grid: self.connectivity.receiver_grid().id(),
            num_dims: self.connectivity.num_dims(),
            has_donor_side: self.connectivity.donors().is_some(),
            has_receiver_side: self.connectivity.receivers().is_some(),
        }
    }

    pub fn name(&self) -> &str {
        self.connectivity.name()
    }
    pub fn comm(&self) -> &C {
        &self.comm
    }
    pub fn options(&self) -> &ExchangeOptions {
        &self.options
    }
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }
    /// Edits made through this handle take effect at the next
    /// [`update`](Self::update).
    pub fn connectivity_mut(&mut self) -> &mut Connectivity {
        &mut self.connectivity
    }
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }
    pub fn source_hash(&self) -> &PartitionHash {
        &self.source_hash
    }
    pub fn destination_hash(&self) -> &PartitionHash {
        &self.destination_hash
    }
}

/// Donor cells must fit the stencil bound. Empty cells are allowed and
/// simply take no part in the exchange.
fn validate_extents(name: &str, m: &ConnectivityM) -> Result<(), ExchangeError> {
    let max = m.max_stencil_size();
    let nd = m.num_dims();
    for (donor, extent) in m.extents().iter().enumerate() {
        if !extent.is_empty() && (0..nd).any(|d| extent.size(d) > max) {
            log::error!("exchange '{name}': donor {donor} has extent {extent:?}");
            return Err(ExchangeError::InvalidDonorExtent {
                donor,
                extent: *extent,
                max_stencil_size: max,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::connectivity::{ConnectivityM, ConnectivityN};
    use crate::topology::cart::Cart;
    use crate::topology::grid::{Grid, GridInfo};
    use std::sync::Arc;

    fn serial_connectivity() -> Connectivity {
        let range = Range::new(1, [0, 0, 0], [6, 0, 0]);
        let a = GridInfo::new(0, "a", Cart::non_periodic(range));
        let b = GridInfo::new(1, "b", Cart::non_periodic(range));
        let ga = Arc::new(Grid::new(a.clone(), range, vec![]));
        let gb = Arc::new(Grid::new(b.clone(), range, vec![]));

        let mut m = ConnectivityM::new(ga, b.clone());
        m.resize(2, 2);
        m.edit_extents()
            .copy_from_slice(&[Range::new(1, [1, 0, 0], [3, 0, 0]), Range::new(1, [3, 0, 0], [5, 0, 0])]);
        m.edit_destinations().copy_from_slice(&[[4, 0, 0], [2, 0, 0]]);

        let mut n = ConnectivityN::new(gb, a.clone());
        n.resize(2);
        n.edit_points().copy_from_slice(&[[2, 0, 0], [4, 0, 0]]);
        n.edit_sources().copy_from_slice(&[[3, 0, 0], [1, 0, 0]]);

        Connectivity::new("a->b", a, b)
            .and_then(|c| c.with_donors(m))
            .and_then(|c| c.with_receivers(n))
            .unwrap()
    }

    fn quiet() -> ExchangeOptions {
        ExchangeOptions {
            log_status: false,
            ..ExchangeOptions::default()
        }
    }

    #[test]
    fn serial_exchange_sends_to_itself() {
        let ex = Exchange::create(serial_connectivity(), NoComm, quiet(), Profiler::default()).unwrap();
        let s = ex.schedule();
        assert_eq!(s.donors_sorted(), &[1, 0]);
        assert_eq!(s.sends(), &[SendRecord { rank: 0, count: 2 }]);
        assert_eq!(s.recvs(), &[RecvRecord { rank: 0, count: 2 }]);
        assert!(s.collect_sends().is_empty());
        assert!(ex.info().has_donor_side && ex.info().has_receiver_side);
    }

    #[test]
    fn oversized_extent_is_rejected() {
        let mut conn = serial_connectivity();
        conn.donors_mut().unwrap().edit_extents()[0] = Range::new(1, [0, 0, 0], [3, 0, 0]);
        let err = Exchange::create(conn, NoComm, quiet(), Profiler::default()).err().unwrap();
        assert!(matches!(err, ExchangeError::InvalidDonorExtent { donor: 0, .. }));
    }

    #[test]
    fn coefficient_edits_keep_schedule_current() {
        let mut ex = Exchange::create(serial_connectivity(), NoComm, quiet(), Profiler::default()).unwrap();
        ex.connectivity_mut().donors_mut().unwrap().edit_interp_coefs()[0] = 0.25;
        assert!(ex.ensure_current().is_ok());
        ex.connectivity_mut().receivers_mut().unwrap().edit_points()[0] = [5, 0, 0];
        assert!(matches!(ex.ensure_current(), Err(ExchangeError::ScheduleOutOfDate(_))));
        ex.update().unwrap();
        assert!(ex.ensure_current().is_ok());
        assert_eq!(ex.schedule().receivers_sorted(), &[1, 0]);
    }

    #[test]
    fn extent_edits_refresh_sends_but_not_ranks() {
        let r = Rebuild::from_edits(&ConnectivityEdits {
            donor_extents: true,
            ..ConnectivityEdits::default()
        });
        assert!(r.collect_maps && r.sends);
        assert!(!r.destination_ranks && !r.donor_order);
        assert!(!r.receiver_order && !r.source_ranks);

        let r = Rebuild::from_edits(&ConnectivityEdits {
            receiver_source_ranks: true,
            ..ConnectivityEdits::default()
        });
        assert!(r.source_ranks && !r.receiver_order && !r.sends);
    }

    #[test]
    fn failed_update_keeps_previous_schedule_and_stays_stale() {
        use crate::ops::Sender;
        use crate::algs::communicator::CommTag;

        let mut ex = Exchange::create(serial_connectivity(), NoComm, quiet(), Profiler::default()).unwrap();
        let before = ex.schedule().clone();

        let m = ex.connectivity_mut().donors_mut().unwrap();
        m.resize(1, 2);
        m.edit_extents()[0] = Range::new(1, [0, 0, 0], [3, 0, 0]);
        m.edit_destinations()[0] = [2, 0, 0];
        let err = ex.update().unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidDonorExtent { donor: 0, .. }));
        assert_eq!(ex.schedule(), &before);
        assert!(matches!(ex.ensure_current(), Err(ExchangeError::ScheduleOutOfDate(_))));

        // one donor now, the old schedule expects two
        let values = [1.0f64];
        let sent = Sender::<_, f64>::new(&ex, 1, CommTag::new(0x60)).send(&[&values[..]]);
        assert!(matches!(sent, Err(ExchangeError::ScheduleOutOfDate(_))));

        ex.connectivity_mut().donors_mut().unwrap().edit_extents()[0] = Range::new(1, [1, 0, 0], [3, 0, 0]);
        ex.update().unwrap();
        assert!(ex.ensure_current().is_ok());
        assert_eq!(ex.schedule().sends(), &[SendRecord { rank: 0, count: 1 }]);
        assert_eq!(ex.schedule().donors_sorted(), &[0]);
    }
}
