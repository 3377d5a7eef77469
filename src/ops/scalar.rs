//! Scalar value types carried through exchanges.

use super::DataType;
use bytemuck::Pod;
use num_traits::{AsPrimitive, Bounded, Float, One, Zero};
use std::fmt::Debug;
use std::ops::AddAssign;

/// A value type that can be collected, sent and dispersed.
pub trait Scalar: Copy + Default + PartialEq + PartialOrd + Debug + Send + Sync + 'static {
    /// On-the-wire representation; one byte for `bool`.
    type Wire: Pod;

    const DATA_TYPE: DataType;

    fn to_wire(self) -> Self::Wire;
    fn from_wire(wire: Self::Wire) -> Self;

    /// Truth value used by the logical collect operators (non-zero is true).
    fn is_true(self) -> bool;
    fn from_bool(b: bool) -> Self;

    fn lowest() -> Self;
    fn highest() -> Self;
}

/// Scalars that can be accumulated.
pub trait Numeric: Scalar + AddAssign {
    /// `self + incoming`, wrapping on integer overflow.
    fn accumulate(&mut self, incoming: Self);
}

/// Floating-point scalars: the only valid interpolation targets.
pub trait Real: Numeric + Float + AsPrimitive<f64> {
    fn from_f64(v: f64) -> Self;
}

impl<T> Real for T
where
    T: Numeric + Float + AsPrimitive<f64>,
    f64: AsPrimitive<T>,
{
    #[inline]
    fn from_f64(v: f64) -> Self {
        v.as_()
    }
}

impl Scalar for bool {
    type Wire = u8;
    const DATA_TYPE: DataType = DataType::Bool;

    #[inline]
    fn to_wire(self) -> u8 {
        u8::from(self)
    }
    #[inline]
    fn from_wire(wire: u8) -> Self {
        wire != 0
    }
    #[inline]
    fn is_true(self) -> bool {
        self
    }
    #[inline]
    fn from_bool(b: bool) -> Self {
        b
    }
    fn lowest() -> Self {
        false
    }
    fn highest() -> Self {
        true
    }
}

macro_rules! impl_numeric_scalar {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                type Wire = $ty;
                const DATA_TYPE: DataType = DataType::$dt;

                #[inline]
                fn to_wire(self) -> $ty {
                    self
                }
                #[inline]
                fn from_wire(wire: $ty) -> Self {
                    wire
                }
                #[inline]
                fn is_true(self) -> bool {
                    !self.is_zero()
                }
                #[inline]
                fn from_bool(b: bool) -> Self {
                    if b { <$ty>::one() } else { <$ty>::zero() }
                }
                fn lowest() -> Self {
                    <$ty as Bounded>::min_value()
                }
                fn highest() -> Self {
                    <$ty as Bounded>::max_value()
                }
            }
        )*
    };
}

macro_rules! impl_wrapping_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn accumulate(&mut self, incoming: Self) {
                    *self = self.wrapping_add(incoming);
                }
            }
        )*
    };
}

macro_rules! impl_float_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn accumulate(&mut self, incoming: Self) {
                    *self += incoming;
                }
            }
        )*
    };
}

impl_numeric_scalar!(
    i8 => I8,
    u8 => U8,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);
impl_wrapping_numeric!(i8, u8, i32, u32, i64, u64);
impl_float_numeric!(f32, f64);
