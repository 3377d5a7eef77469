#![cfg_attr(docsrs, feature(doc_cfg))]
//! # overset-exchange
//!
//! overset-exchange moves field data between overlapping structured grids in
//! an SPMD program. Given the donor/receiver connectivity of two grids, it
//! builds a communication schedule once and then runs the four data movement
//! steps of an overset solve:
//!
//! 1. **Collect**: reduce each donor's stencil of grid values to one value,
//!    fetching stencil points owned by neighbouring ranks.
//! 2. **Send** and 3. **Receive**: ship donor values to the ranks owning the
//!    receiver points, asynchronously, completed with [`ops::Request`],
//!    [`ops::wait_all`] or [`ops::wait_any`].
//! 4. **Disperse**: write received values into the receiver grid's field.
//!
//! ## Features
//! - Partition hashing to locate the owner of any grid point without global
//!   replication of the partition
//! - Incremental schedule rebuilds driven by connectivity edit flags
//! - Typed engines ([`ops::Collector`], [`ops::Sender`], [`ops::Receiver`],
//!   [`ops::Disperser`]) and runtime-typed entry points on
//!   [`exchange::Exchange`]
//! - Pluggable communication backends: serial, in-process threads, and MPI
//!   (feature `mpi-support`)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! overset-exchange = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! Structural invariants of schedules are checked in debug builds; enable
//! the `check-invariants` feature to keep them in release builds.

pub mod algs;
pub mod connectivity;
pub mod debug_invariants;
pub mod exchange;
pub mod exchange_error;
pub mod exchanger;
pub mod ops;
pub mod profiler;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use exchange_error::ExchangeError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, RayonComm, run_local};
    pub use crate::connectivity::{Connectivity, ConnectivityEdits, ConnectivityM, ConnectivityN};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::exchange::{Exchange, ExchangeInfo, ExchangeOptions, Schedule};
    pub use crate::exchange_error::ExchangeError;
    pub use crate::exchanger::Exchanger;
    pub use crate::ops::{
        ArrayLayout, CollectOp, Collector, DataType, DisperseOp, Disperser, FieldSlices,
        FieldSlicesMut, Receiver, Request, Sender, wait_all, wait_any,
    };
    pub use crate::profiler::Profiler;
    pub use crate::topology::{Cart, Grid, GridInfo, PeriodicStorage, Range, Tuple};
}
