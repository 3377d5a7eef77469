//! Point-to-point communication backends.
//!
//! The exchange engines only need non-blocking byte transfers tagged with a
//! `u16`, a barrier, and the rank/size of the process group. Three backends
//! implement [`Communicator`]:
//!
//! - [`NoComm`]: a single rank talking only to itself.
//! - [`RayonComm`]: in-process ranks that exchange messages through a global
//!   mailbox. Used for tests and for running SPMD code on threads via
//!   [`run_local`].
//! - `MpiComm` (feature `mpi-support`): the real thing.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Message tag used to keep logically distinct transfers apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    /// Raw tag value of this base tag.
    pub const fn base(self) -> u16 {
        self.0
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `k` slots after this one (wrapping).
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Completion handle for a posted transfer.
pub trait Wait {
    /// Block until the transfer completes. Receives yield their payload,
    /// sends yield `None`.
    fn wait(self) -> Option<Vec<u8>>;

    /// Non-blocking completion check. Once this returns `true`, `wait`
    /// returns without blocking.
    fn test(&mut self) -> bool;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
    fn test(&mut self) -> bool {
        true
    }
}

/// Non-blocking point-to-point messaging within a fixed process group.
pub trait Communicator: 'static {
    type SendHandle: Wait + 'static;
    type RecvHandle: Wait + 'static;

    /// Post a send of `buf` to `peer`. The payload is captured on return.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;

    /// Post a receive from `peer`. At most `buf.len()` bytes are delivered.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank of the group has entered the barrier.
    fn barrier(&self);

    /// `true` for the serial backend, which never exchanges messages.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Serial backend: rank 0 of a group of one. Messages a rank sends to
/// itself are queued on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

thread_local! {
    static SELF_MAIL: RefCell<HashMap<u16, VecDeque<Bytes>>> = RefCell::new(HashMap::new());
}

/// Receive handle of [`NoComm`]. A serial receive completes immediately,
/// with `None` if nothing was sent to it.
#[derive(Debug)]
pub struct SelfRecvHandle {
    tag: u16,
    len: usize,
}

impl Wait for SelfRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let msg = SELF_MAIL.with(|m| m.borrow_mut().get_mut(&self.tag).and_then(VecDeque::pop_front))?;
        let n = msg.len().min(self.len);
        Some(msg[..n].to_vec())
    }

    fn test(&mut self) -> bool {
        true
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = SelfRecvHandle;

    fn isend(&self, _peer: usize, tag: u16, buf: &[u8]) {
        SELF_MAIL.with(|m| {
            m.borrow_mut()
                .entry(tag)
                .or_default()
                .push_back(Bytes::copy_from_slice(buf))
        });
    }

    fn irecv(&self, _peer: usize, tag: u16, buf: &mut [u8]) -> SelfRecvHandle {
        SelfRecvHandle { tag, len: buf.len() }
    }

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- in-process backend -----------------------------------------------------

/// (group, source, destination, tag)
type MailKey = (u64, usize, usize, u16);

static MAILBOX: Lazy<DashMap<MailKey, VecDeque<Bytes>>> = Lazy::new(DashMap::new);
static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);

const BARRIER_TAG: u16 = u16::MAX;

fn post(key: MailKey, msg: Bytes) {
    MAILBOX.entry(key).or_default().push_back(msg);
}

fn take(key: &MailKey) -> Option<Bytes> {
    MAILBOX.get_mut(key).and_then(|mut q| q.pop_front())
}

/// In-process communicator. Messages are delivered in FIFO order per
/// (source, destination, tag).
///
/// Ranks created with [`RayonComm::new`] share group 0; [`RayonComm::world`]
/// hands out a fresh group so concurrently running tests cannot see each
/// other's messages.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    group: u64,
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            group: 0,
        }
    }

    /// All ranks of a new, isolated group of `size` ranks.
    pub fn world(size: usize) -> Vec<Self> {
        let group = NEXT_GROUP.fetch_add(1, Ordering::Relaxed);
        (0..size)
            .map(|rank| Self { rank, size, group })
            .collect()
    }
}

/// Receive handle of [`RayonComm`]; polls the mailbox lazily.
#[derive(Debug)]
pub struct LocalRecvHandle {
    key: MailKey,
    len: usize,
    got: Option<Bytes>,
}

impl Wait for LocalRecvHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        while !self.test() {
            std::thread::yield_now();
        }
        self.got.map(|msg| {
            let n = msg.len().min(self.len);
            msg[..n].to_vec()
        })
    }

    fn test(&mut self) -> bool {
        if self.got.is_none() {
            self.got = take(&self.key);
        }
        self.got.is_some()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalRecvHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        post(
            (self.group, self.rank, peer, tag),
            Bytes::copy_from_slice(buf),
        );
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalRecvHandle {
        LocalRecvHandle {
            key: (self.group, peer, self.rank, tag),
            len: buf.len(),
            got: None,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        let peers = || (0..self.size).filter(|&p| p != self.rank);
        for peer in peers() {
            post((self.group, self.rank, peer, BARRIER_TAG), Bytes::new());
        }
        for peer in peers() {
            let _ = self.irecv(peer, BARRIER_TAG, &mut []).wait();
        }
    }
}

/// Run `f` once per rank of a fresh in-process group, each rank on its own
/// thread, and collect the per-rank results in rank order.
///
/// A panic on any rank is propagated to the caller.
pub fn run_local<R, F>(size: usize, f: F) -> Vec<R>
where
    F: Fn(RayonComm) -> R + Sync,
    R: Send,
{
    let comms = RayonComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

// --- MPI backend ------------------------------------------------------------

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};

#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::exchange_error::ExchangeError;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::traits::*;
    use std::sync::Arc;

    /// MPI communicator over `MPI_COMM_WORLD`.
    #[derive(Clone)]
    pub struct MpiComm {
        universe: Arc<Universe>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI. Fails if MPI was already initialized.
        pub fn new() -> Result<Self, ExchangeError> {
            let universe = mpi::initialize()
                .ok_or_else(|| ExchangeError::CommInit("MPI already initialized".into()))?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                universe: Arc::new(universe),
                rank,
                size,
            })
        }

        pub fn world(&self) -> mpi::topology::SimpleCommunicator {
            self.universe.world()
        }
    }

    /// Pending MPI transfer. The payload lives in a heap buffer that is handed
    /// to MPI for the lifetime of the request and reclaimed by `wait`.
    pub struct MpiHandle {
        req: Option<Request<'static, [u8]>>,
        data: *mut [u8],
        is_recv: bool,
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.req.take() {
                req.wait();
            }
            // SAFETY: `data` came from `Box::into_raw` and MPI no longer
            // references it once the request completed.
            let buf = unsafe { Box::from_raw(self.data) }.into_vec();
            self.is_recv.then_some(buf)
        }

        fn test(&mut self) -> bool {
            match self.req.take() {
                None => true,
                Some(req) => match req.test() {
                    Ok(_) => true,
                    Err(req) => {
                        self.req = Some(req);
                        false
                    }
                },
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let data = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the allocation outlives the request; see `MpiHandle::wait`.
            let slice: &'static [u8] = unsafe { &*data };
            let world = self.universe.world();
            let req = world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, slice, tag as i32);
            MpiHandle {
                req: Some(req),
                data,
                is_recv: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let data = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            // SAFETY: as in `isend`; the buffer is only read back after completion.
            let slice: &'static mut [u8] = unsafe { &mut *data };
            let world = self.universe.world();
            let req = world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, slice, tag as i32);
            MpiHandle {
                req: Some(req),
                data,
                is_recv: true,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
        fn barrier(&self) {
            self.universe.world().barrier();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_a_group_of_one() {
        let c = NoComm;
        assert_eq!((c.rank(), c.size()), (0, 1));
        assert!(c.is_no_comm());
        c.barrier();
        let mut h = c.irecv(0, 7, &mut [0u8; 4]);
        assert!(h.test());
        assert!(h.wait().is_none());
        c.isend(0, 7, &[1, 2, 3, 4, 5]);
        assert_eq!(c.irecv(0, 7, &mut [0u8; 4]).wait(), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn recv_handle_reports_readiness() {
        let comms = RayonComm::world(2);
        let mut h = comms[1].irecv(0, 3, &mut [0u8; 2]);
        assert!(!h.test());
        comms[0].isend(1, 3, &[9, 8]);
        assert!(h.test());
        assert_eq!(h.wait(), Some(vec![9, 8]));
    }

    #[test]
    fn groups_are_isolated() {
        let a = RayonComm::world(2);
        let b = RayonComm::world(2);
        a[0].isend(1, 11, &[1]);
        b[0].isend(1, 11, &[2]);
        assert_eq!(b[1].irecv(0, 11, &mut [0u8; 1]).wait(), Some(vec![2]));
        assert_eq!(a[1].irecv(0, 11, &mut [0u8; 1]).wait(), Some(vec![1]));
    }

    #[test]
    fn run_local_returns_results_in_rank_order() {
        let out = run_local(4, |comm| {
            comm.barrier();
            comm.rank() * 10
        });
        assert_eq!(out, vec![0, 10, 20, 30]);
    }

    #[test]
    fn tag_offsets_wrap() {
        assert_eq!(CommTag::new(u16::MAX).offset(2), CommTag(1));
        assert_eq!(CommTag(0x40).offset(3).as_u16(), 0x43);
    }
}
