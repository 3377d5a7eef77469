//! Delta rules: how a received value is fused into a grid value.

use super::DisperseOp;
use super::scalar::{Numeric, Scalar};

/// Fusion of an incoming receiver value into the local grid value.
pub trait DisperseDelta<V> {
    const OP: DisperseOp;

    /// Merge `incoming` into `local`.
    fn fuse(local: &mut V, incoming: V);
}

/// Incoming value overwrites the local one.
#[derive(Copy, Clone, Debug, Default)]
pub struct CopyDelta;

impl<V: Scalar> DisperseDelta<V> for CopyDelta {
    const OP: DisperseOp = DisperseOp::Overwrite;
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local = incoming;
    }
}

/// Incoming value is added to the local one.
#[derive(Copy, Clone, Debug, Default)]
pub struct AddDelta;

impl<V: Numeric> DisperseDelta<V> for AddDelta {
    const OP: DisperseOp = DisperseOp::Append;
    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        local.accumulate(incoming);
    }
}
