//! ExchangeError: unified error type for overset-exchange public APIs
//!
//! Every fallible operation in this crate reports failures through
//! [`ExchangeError`]; nothing in the library panics on bad input outside of
//! the opt-in invariant checks in [`crate::debug_invariants`].

use crate::ops::{CollectOp, DataType, DisperseOp};
use crate::topology::range::Range;
use thiserror::Error;

/// Unified error type for exchange construction and data transfer.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// A point-to-point operation with `neighbor` failed.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A message arrived with an unexpected payload size.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// The communication layer could not be brought up.
    #[error("communicator initialization failed: {0}")]
    CommInit(String),
    /// The number of field slices differs from the count the engine was built for.
    #[error("expected {expected} field slices, got {got}")]
    FieldCountMismatch { expected: usize, got: usize },
    /// A field slice is shorter than the index range it must cover.
    #[error("field {field} has {got} values, need at least {expected}")]
    FieldTooShort {
        field: usize,
        expected: usize,
        got: usize,
    },
    /// Input and output fields carry different value types.
    #[error("value type mismatch: expected {expected:?}, got {got:?}")]
    DataTypeMismatch { expected: DataType, got: DataType },
    /// The collect operator is not defined for the value type.
    #[error("collect operation {op:?} is not defined for {data_type:?} values")]
    InvalidCollectOp { op: CollectOp, data_type: DataType },
    /// The disperse operator is not defined for the value type.
    #[error("disperse operation {op:?} is not defined for {data_type:?} values")]
    InvalidDisperseOp { op: DisperseOp, data_type: DataType },
    /// The grid values range handed to an engine does not cover the local range.
    #[error("grid values range {values:?} does not include the local range {local:?}")]
    InvalidGridValuesRange { values: Range, local: Range },
    /// Dimension outside `1..=3`.
    #[error("invalid dimension count {0}")]
    InvalidDimension(usize),
    /// A rank index outside the communicator.
    #[error("rank {rank} is outside a communicator of size {size}")]
    InvalidRank { rank: usize, size: usize },
    /// A donor extent is larger than the maximum stencil size.
    #[error("donor {donor} has extent {extent:?}, which exceeds stencil size {max_stencil_size}")]
    InvalidDonorExtent {
        donor: usize,
        extent: Range,
        max_stencil_size: usize,
    },
    /// Connectivity data was edited but the exchange schedule has not been rebuilt.
    #[error("exchange '{0}' has pending connectivity edits; call update() first")]
    ScheduleOutOfDate(String),
    /// This rank does not hold the donor side of the connectivity.
    #[error("rank does not hold the donor side of '{0}'")]
    NoDonorSide(String),
    /// This rank does not hold the receiver side of the connectivity.
    #[error("rank does not hold the receiver side of '{0}'")]
    NoReceiverSide(String),
    /// Donor and receiver sides disagree about the grids they connect.
    #[error("connectivity '{name}' is inconsistent: {reason}")]
    InconsistentConnectivity { name: String, reason: String },
    /// An exchange for the grid pair is already bound.
    #[error("an exchange for grids ({donor_grid}, {receiver_grid}) is already bound")]
    AlreadyBound {
        donor_grid: usize,
        receiver_grid: usize,
    },
    /// No exchange is bound for the grid pair.
    #[error("no exchange bound for grids ({donor_grid}, {receiver_grid})")]
    NotBound {
        donor_grid: usize,
        receiver_grid: usize,
    },
    /// A structural invariant failed (only produced by invariant validation).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
