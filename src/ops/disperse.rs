//! Disperse: write received values back into grid storage.

use super::collect::{check_fields, check_lengths};
use super::delta::DisperseDelta;
use super::scalar::Scalar;
use crate::algs::communicator::Communicator;
use crate::connectivity::ConnectivityN;
use crate::exchange::Exchange;
use crate::exchange_error::ExchangeError;
use crate::profiler::timers;
use crate::topology::indexer::{ArrayLayout, RangeIndexer};
use crate::topology::range::Range;
use std::marker::PhantomData;

/// Typed disperse engine for value type `T` and fusion rule `D`.
pub struct Disperser<'x, C: Communicator, T: Scalar, D: DisperseDelta<T>> {
    exchange: &'x Exchange<C>,
    receivers: &'x ConnectivityN,
    count: usize,
    indexer: RangeIndexer,
    _delta: PhantomData<fn() -> (T, D)>,
}

impl<'x, C, T, D> Disperser<'x, C, T, D>
where
    C: Communicator,
    T: Scalar,
    D: DisperseDelta<T>,
{
    /// `count` fields of grid values over `grid_values_range` in `layout`
    /// order; the range must cover the local piece of the receiver grid.
    pub fn new(
        exchange: &'x Exchange<C>,
        count: usize,
        grid_values_range: Range,
        layout: ArrayLayout,
    ) -> Result<Self, ExchangeError> {
        let receivers = exchange
            .connectivity()
            .receivers()
            .ok_or_else(|| ExchangeError::NoReceiverSide(exchange.name().to_string()))?;
        let local = *receivers.grid().local_range();
        if !grid_values_range.includes(&local) {
            return Err(ExchangeError::InvalidGridValuesRange {
                values: grid_values_range,
                local,
            });
        }
        Ok(Self {
            exchange,
            receivers,
            count,
            indexer: RangeIndexer::new(grid_values_range, layout),
            _delta: PhantomData,
        })
    }

    /// Local: fuse `receiver_values[f][r]` into the grid value at receiver
    /// `r`'s point. Receivers outside the local range are skipped.
    pub fn disperse(&self, receiver_values: &[&[T]], grid_values: &mut [&mut [T]]) -> Result<(), ExchangeError> {
        self.exchange.ensure_current()?;
        check_fields(self.count, receiver_values.len())?;
        check_fields(self.count, grid_values.len())?;
        let points = self.receivers.points();
        check_lengths(receiver_values.iter().map(|f| f.len()), points.len())?;
        check_lengths(grid_values.iter().map(|f| f.len()), self.indexer.range().count())?;

        let _t = self.exchange.profiler().scope(timers::DISPERSE);
        let local = self.receivers.grid().local_range();
        for (incoming, field) in receiver_values.iter().zip(grid_values.iter_mut()) {
            for (r, p) in points.iter().enumerate().filter(|(_, p)| local.contains(p)) {
                D::fuse(&mut field[self.indexer.to_index(p)], incoming[r]);
            }
        }
        Ok(())
    }
}
