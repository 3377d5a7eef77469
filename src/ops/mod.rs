//! Data transfer engines: collect, send/receive and disperse.
//!
//! Each engine exists in a typed, monomorphic form ([`Collector`],
//! [`Sender`], [`Receiver`], [`Disperser`]) and behind the runtime-selected
//! entry points on [`Exchange`](crate::exchange::Exchange), which pick the
//! monomorphic engine from the value type and operator once per call.

pub mod collect;
pub mod delta;
pub mod dispatch;
pub mod disperse;
pub mod recv;
pub mod reduce;
pub mod request;
pub mod scalar;
pub mod send;

pub use crate::topology::indexer::ArrayLayout;
pub use collect::Collector;
pub use delta::{AddDelta, CopyDelta, DisperseDelta};
pub use dispatch::{FieldSlices, FieldSlicesMut};
pub use disperse::Disperser;
pub use recv::Receiver;
pub use reduce::{
    CollectAll, CollectAny, CollectInterp, CollectMax, CollectMin, CollectNone, CollectNotAll,
    CollectReducer,
};
pub use request::{Request, wait_all, wait_any};
pub use scalar::{Numeric, Real, Scalar};
pub use send::Sender;

use serde::{Deserialize, Serialize};

/// Runtime tag of a [`Scalar`] type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    I8,
    U8,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl DataType {
    pub fn is_floating(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Bytes per value on the wire.
    pub fn wire_size(self) -> usize {
        match self {
            DataType::Bool | DataType::I8 | DataType::U8 => 1,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }
}

/// Reduction applied to a donor stencil during collect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectOp {
    /// True only if every stencil value is false.
    None,
    /// True if any stencil value is true.
    Any,
    /// True unless every stencil value is true.
    NotAll,
    /// True if every stencil value is true.
    All,
    Min,
    Max,
    /// Weighted sum with per-dimension interpolation coefficients.
    Interpolate,
}

/// How received values are written into grid storage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisperseOp {
    Overwrite,
    Append,
}
