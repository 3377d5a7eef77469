//! Stencil reductions for the collect step.
//!
//! A reducer turns the values of one donor stencil (in column-major cell
//! order) into the donor's value. Reducers are zero-sized types so the
//! collect loop is monomorphised per operator.

use super::CollectOp;
use super::scalar::{Real, Scalar};
use crate::topology::range::MAX_DIMS;

/// Interpolation weights of one donor cell.
#[derive(Copy, Clone, Debug)]
pub struct StencilWeights<'a> {
    num_dims: usize,
    sizes: [usize; MAX_DIMS],
    max_stencil_size: usize,
    coefs: &'a [f64],
}

impl<'a> StencilWeights<'a> {
    /// `coefs` is the donor's `[dim][point]` coefficient block.
    pub fn new(
        num_dims: usize,
        sizes: [usize; MAX_DIMS],
        max_stencil_size: usize,
        coefs: &'a [f64],
    ) -> Self {
        Self {
            num_dims,
            sizes,
            max_stencil_size,
            coefs,
        }
    }

    /// Weights for reducers that ignore coefficients.
    pub fn unweighted() -> Self {
        Self::new(0, [1; MAX_DIMS], 0, &[])
    }

    /// Product of the per-dimension coefficients at a cell point.
    #[inline]
    pub fn weight(&self, point_in_cell: usize) -> f64 {
        let mut rest = point_in_cell;
        let mut w = 1.0;
        for d in 0..self.num_dims {
            let n = self.sizes[d].max(1);
            w *= self.coefs[d * self.max_stencil_size + rest % n];
            rest /= n;
        }
        w
    }
}

/// Reduction of a donor stencil to a single value.
pub trait CollectReducer<T: Scalar> {
    const OP: CollectOp;
    fn reduce(values: &[T], weights: &StencilWeights<'_>) -> T;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct CollectNone;
#[derive(Copy, Clone, Debug, Default)]
pub struct CollectAny;
#[derive(Copy, Clone, Debug, Default)]
pub struct CollectNotAll;
#[derive(Copy, Clone, Debug, Default)]
pub struct CollectAll;
#[derive(Copy, Clone, Debug, Default)]
pub struct CollectMin;
#[derive(Copy, Clone, Debug, Default)]
pub struct CollectMax;
#[derive(Copy, Clone, Debug, Default)]
pub struct CollectInterp;

impl<T: Scalar> CollectReducer<T> for CollectNone {
    const OP: CollectOp = CollectOp::None;
    #[inline]
    fn reduce(values: &[T], _: &StencilWeights<'_>) -> T {
        T::from_bool(values.iter().all(|v| !v.is_true()))
    }
}

impl<T: Scalar> CollectReducer<T> for CollectAny {
    const OP: CollectOp = CollectOp::Any;
    #[inline]
    fn reduce(values: &[T], _: &StencilWeights<'_>) -> T {
        T::from_bool(values.iter().any(|v| v.is_true()))
    }
}

impl<T: Scalar> CollectReducer<T> for CollectNotAll {
    const OP: CollectOp = CollectOp::NotAll;
    #[inline]
    fn reduce(values: &[T], _: &StencilWeights<'_>) -> T {
        T::from_bool(values.iter().any(|v| !v.is_true()))
    }
}

impl<T: Scalar> CollectReducer<T> for CollectAll {
    const OP: CollectOp = CollectOp::All;
    #[inline]
    fn reduce(values: &[T], _: &StencilWeights<'_>) -> T {
        T::from_bool(values.iter().all(|v| v.is_true()))
    }
}

impl<T: Scalar> CollectReducer<T> for CollectMin {
    const OP: CollectOp = CollectOp::Min;
    #[inline]
    fn reduce(values: &[T], _: &StencilWeights<'_>) -> T {
        values
            .iter()
            .fold(T::highest(), |acc, &v| if v < acc { v } else { acc })
    }
}

impl<T: Scalar> CollectReducer<T> for CollectMax {
    const OP: CollectOp = CollectOp::Max;
    #[inline]
    fn reduce(values: &[T], _: &StencilWeights<'_>) -> T {
        values
            .iter()
            .fold(T::lowest(), |acc, &v| if v > acc { v } else { acc })
    }
}

impl<T: Real> CollectReducer<T> for CollectInterp {
    const OP: CollectOp = CollectOp::Interpolate;
    #[inline]
    fn reduce(values: &[T], weights: &StencilWeights<'_>) -> T {
        let sum = values
            .iter()
            .enumerate()
            .fold(0.0f64, |acc, (i, &v)| {
                let x: f64 = v.as_();
                acc + weights.weight(i) * x
            });
        T::from_f64(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<R: CollectReducer<bool>>(values: &[bool]) -> bool {
        R::reduce(values, &StencilWeights::unweighted())
    }

    #[test]
    fn logical_operators_on_single_true() {
        let stencil = [true, false, false, false];
        assert!(!run::<CollectNone>(&stencil));
        assert!(run::<CollectAny>(&stencil));
        assert!(!run::<CollectAll>(&stencil));
        assert!(run::<CollectNotAll>(&stencil));
    }

    #[test]
    fn logical_operators_on_integers() {
        let w = StencilWeights::unweighted();
        assert_eq!(<CollectAll as CollectReducer<i32>>::reduce(&[3, -1], &w), 1);
        assert_eq!(<CollectNone as CollectReducer<u8>>::reduce(&[0, 2], &w), 0);
    }

    #[test]
    fn min_and_max() {
        let w = StencilWeights::unweighted();
        assert_eq!(<CollectMin as CollectReducer<f64>>::reduce(&[2.0, -7.5, 1.0], &w), -7.5);
        assert_eq!(<CollectMax as CollectReducer<f64>>::reduce(&[-2.0, -7.5], &w), -2.0);
        assert_eq!(<CollectMax as CollectReducer<u64>>::reduce(&[4, 9, 1], &w), 9);
    }

    #[test]
    fn bilinear_weights_are_products() {
        // 2x2 cell, coefs x = [0.25, 0.75], y = [0.5, 0.5]
        let coefs = [0.25, 0.75, 0.5, 0.5];
        let w = StencilWeights::new(2, [2, 2, 1], 2, &coefs);
        assert_eq!(w.weight(0), 0.125);
        assert_eq!(w.weight(1), 0.375);
        assert_eq!(w.weight(3), 0.375);
        let v = [0.0f64, 4.0, 8.0, 12.0];
        assert_eq!(CollectInterp::reduce(&v, &w), 0.375 * 4.0 + 0.125 * 8.0 + 0.375 * 12.0);
    }
}
