//! Runtime-typed entry points.
//!
//! Callers that only know the value type at run time hand their fields over
//! as [`FieldSlices`]/[`FieldSlicesMut`]. Each entry point matches the value
//! type and operator once and runs the monomorphic engine; invalid
//! type/operator pairs are reported as errors rather than silently coerced.

use super::collect::Collector;
use super::delta::{AddDelta, CopyDelta};
use super::disperse::Disperser;
use super::recv::Receiver;
use super::reduce::{
    CollectAll, CollectAny, CollectInterp, CollectMax, CollectMin, CollectNone, CollectNotAll,
};
use super::request::Request;
use super::scalar::{Numeric, Real, Scalar};
use super::send::Sender;
use super::{CollectOp, DataType, DisperseOp};
use crate::algs::communicator::{CommTag, Communicator};
use crate::exchange::Exchange;
use crate::exchange_error::ExchangeError;
use crate::topology::indexer::ArrayLayout;
use crate::topology::range::Range;

macro_rules! field_slices {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Read-only fields of one runtime-selected value type.
        #[derive(Debug)]
        pub enum FieldSlices<'a> {
            $($variant(Vec<&'a [$ty]>),)*
        }

        /// Writable fields of one runtime-selected value type.
        #[derive(Debug)]
        pub enum FieldSlicesMut<'a> {
            $($variant(Vec<&'a mut [$ty]>),)*
        }

        impl FieldSlices<'_> {
            pub fn data_type(&self) -> DataType {
                match self {
                    $(Self::$variant(_) => DataType::$variant,)*
                }
            }
            /// Number of fields.
            pub fn count(&self) -> usize {
                match self {
                    $(Self::$variant(v) => v.len(),)*
                }
            }
        }

        impl FieldSlicesMut<'_> {
            pub fn data_type(&self) -> DataType {
                match self {
                    $(Self::$variant(_) => DataType::$variant,)*
                }
            }
            pub fn count(&self) -> usize {
                match self {
                    $(Self::$variant(v) => v.len(),)*
                }
            }
        }

        $(
            impl<'a> From<Vec<&'a [$ty]>> for FieldSlices<'a> {
                fn from(v: Vec<&'a [$ty]>) -> Self {
                    Self::$variant(v)
                }
            }

            impl<'a> From<Vec<&'a mut [$ty]>> for FieldSlicesMut<'a> {
                fn from(v: Vec<&'a mut [$ty]>) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

field_slices!(
    Bool(bool),
    I8(i8),
    U8(u8),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
);

/// Pair up a read-only and a writable field set of the same value type.
macro_rules! match_fields {
    ($a:expr, $b:expr, |$x:ident, $y:ident| { $($variant:ident => $body:expr),* $(,)? }) => {
        match ($a, $b) {
            $((FieldSlices::$variant($x), FieldSlicesMut::$variant(mut $y)) => $body,)*
            (a, b) => Err(ExchangeError::DataTypeMismatch {
                expected: a.data_type(),
                got: b.data_type(),
            }),
        }
    };
}

impl<C: Communicator> Exchange<C> {
    /// Collect with the value type of `grid_values` and operator `op`.
    /// `Interpolate` needs a floating-point type.
    pub fn collect(
        &self,
        op: CollectOp,
        grid_values_range: Range,
        layout: ArrayLayout,
        grid_values: FieldSlices<'_>,
        donor_values: FieldSlicesMut<'_>,
    ) -> Result<(), ExchangeError> {
        let at = (grid_values_range, layout);
        match_fields!(grid_values, donor_values, |g, d| {
            Bool => collect_scalar(self, op, at, &g[..], &mut d[..]),
            I8 => collect_scalar(self, op, at, &g[..], &mut d[..]),
            U8 => collect_scalar(self, op, at, &g[..], &mut d[..]),
            I32 => collect_scalar(self, op, at, &g[..], &mut d[..]),
            U32 => collect_scalar(self, op, at, &g[..], &mut d[..]),
            I64 => collect_scalar(self, op, at, &g[..], &mut d[..]),
            U64 => collect_scalar(self, op, at, &g[..], &mut d[..]),
            F32 => collect_real(self, op, at, &g[..], &mut d[..]),
            F64 => collect_real(self, op, at, &g[..], &mut d[..]),
        })
    }

    /// Send donor values of any value type.
    pub fn send(&self, tag: CommTag, donor_values: FieldSlices<'_>) -> Result<Request<'static>, ExchangeError> {
        match donor_values {
            FieldSlices::Bool(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::I8(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::U8(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::I32(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::U32(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::I64(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::U64(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::F32(v) => Sender::new(self, v.len(), tag).send(&v[..]),
            FieldSlices::F64(v) => Sender::new(self, v.len(), tag).send(&v[..]),
        }
    }

    /// Receive into receiver values of any value type.
    pub fn receive<'a>(
        &'a self,
        tag: CommTag,
        receiver_values: FieldSlicesMut<'a>,
    ) -> Result<Request<'a>, ExchangeError> {
        match receiver_values {
            FieldSlicesMut::Bool(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::I8(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::U8(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::I32(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::U32(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::I64(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::U64(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::F32(v) => Receiver::new(self, v.len(), tag).receive(v),
            FieldSlicesMut::F64(v) => Receiver::new(self, v.len(), tag).receive(v),
        }
    }

    /// Disperse with the value type of `receiver_values` and operator `op`.
    /// `Append` needs a numeric type.
    pub fn disperse(
        &self,
        op: DisperseOp,
        grid_values_range: Range,
        layout: ArrayLayout,
        receiver_values: FieldSlices<'_>,
        grid_values: FieldSlicesMut<'_>,
    ) -> Result<(), ExchangeError> {
        let at = (grid_values_range, layout);
        match_fields!(receiver_values, grid_values, |r, g| {
            Bool => disperse_scalar(self, op, at, &r[..], &mut g[..]),
            I8 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            U8 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            I32 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            U32 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            I64 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            U64 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            F32 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
            F64 => disperse_numeric(self, op, at, &r[..], &mut g[..]),
        })
    }
}

type ValuesAt = (Range, ArrayLayout);

fn collect_scalar<C: Communicator, T: Scalar>(
    ex: &Exchange<C>,
    op: CollectOp,
    (range, layout): ValuesAt,
    grid_values: &[&[T]],
    donor_values: &mut [&mut [T]],
) -> Result<(), ExchangeError> {
    let count = grid_values.len();
    match op {
        CollectOp::None => Collector::<C, T, CollectNone>::new(ex, count, range, layout)?.collect(grid_values, donor_values),
        CollectOp::Any => Collector::<C, T, CollectAny>::new(ex, count, range, layout)?.collect(grid_values, donor_values),
        CollectOp::NotAll => {
            Collector::<C, T, CollectNotAll>::new(ex, count, range, layout)?.collect(grid_values, donor_values)
        }
        CollectOp::All => Collector::<C, T, CollectAll>::new(ex, count, range, layout)?.collect(grid_values, donor_values),
        CollectOp::Min => Collector::<C, T, CollectMin>::new(ex, count, range, layout)?.collect(grid_values, donor_values),
        CollectOp::Max => Collector::<C, T, CollectMax>::new(ex, count, range, layout)?.collect(grid_values, donor_values),
        CollectOp::Interpolate => Err(ExchangeError::InvalidCollectOp {
            op,
            data_type: T::DATA_TYPE,
        }),
    }
}

fn collect_real<C: Communicator, T: Real>(
    ex: &Exchange<C>,
    op: CollectOp,
    at: ValuesAt,
    grid_values: &[&[T]],
    donor_values: &mut [&mut [T]],
) -> Result<(), ExchangeError> {
    match op {
        CollectOp::Interpolate => Collector::<C, T, CollectInterp>::new(ex, grid_values.len(), at.0, at.1)?
            .collect(grid_values, donor_values),
        _ => collect_scalar(ex, op, at, grid_values, donor_values),
    }
}

fn disperse_scalar<C: Communicator, T: Scalar>(
    ex: &Exchange<C>,
    op: DisperseOp,
    (range, layout): ValuesAt,
    receiver_values: &[&[T]],
    grid_values: &mut [&mut [T]],
) -> Result<(), ExchangeError> {
    match op {
        DisperseOp::Overwrite => Disperser::<C, T, CopyDelta>::new(ex, receiver_values.len(), range, layout)?
            .disperse(receiver_values, grid_values),
        DisperseOp::Append => Err(ExchangeError::InvalidDisperseOp {
            op,
            data_type: T::DATA_TYPE,
        }),
    }
}

fn disperse_numeric<C: Communicator, T: Numeric>(
    ex: &Exchange<C>,
    op: DisperseOp,
    at: ValuesAt,
    receiver_values: &[&[T]],
    grid_values: &mut [&mut [T]],
) -> Result<(), ExchangeError> {
    match op {
        DisperseOp::Append => Disperser::<C, T, AddDelta>::new(ex, receiver_values.len(), at.0, at.1)?
            .disperse(receiver_values, grid_values),
        DisperseOp::Overwrite => disperse_scalar(ex, op, at, receiver_values, grid_values),
    }
}
