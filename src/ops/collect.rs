//! Collect: reduce every donor's stencil of grid values to one value.
//!
//! Stencil points owned by a neighbour are fetched first in a single ghost
//! round (pack, exchange, unpack), then each donor cell is assembled from
//! local and ghost values and handed to the reducer.

use super::reduce::{CollectReducer, StencilWeights};
use super::scalar::Scalar;
use crate::algs::collective::exchange_payloads;
use crate::algs::communicator::Communicator;
use crate::connectivity::ConnectivityM;
use crate::exchange::Exchange;
use crate::exchange_error::ExchangeError;
use crate::profiler::timers;
use crate::topology::indexer::{ArrayLayout, RangeIndexer};
use crate::topology::range::Range;
use bytemuck::Zeroable;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Typed collect engine for value type `T` and reducer `R`.
pub struct Collector<'x, C: Communicator, T: Scalar, R: CollectReducer<T>> {
    exchange: &'x Exchange<C>,
    donors: &'x ConnectivityM,
    count: usize,
    indexer: RangeIndexer,
    _reduce: PhantomData<fn() -> (T, R)>,
}

impl<'x, C, T, R> Collector<'x, C, T, R>
where
    C: Communicator,
    T: Scalar,
    R: CollectReducer<T>,
{
    /// `count` fields of grid values, each stored over `grid_values_range`
    /// in `layout` order. The range must cover the local grid piece.
    pub fn new(
        exchange: &'x Exchange<C>,
        count: usize,
        grid_values_range: Range,
        layout: ArrayLayout,
    ) -> Result<Self, ExchangeError> {
        let donors = exchange
            .connectivity()
            .donors()
            .ok_or_else(|| ExchangeError::NoDonorSide(exchange.name().to_string()))?;
        let local = *donors.grid().local_range();
        if !grid_values_range.includes(&local) {
            return Err(ExchangeError::InvalidGridValuesRange {
                values: grid_values_range,
                local,
            });
        }
        Ok(Self {
            exchange,
            donors,
            count,
            indexer: RangeIndexer::new(grid_values_range, layout),
            _reduce: PhantomData,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Collective over the donor grid's ranks: fill `donor_values[f][d]` for
    /// every field `f` and donor `d`. Donors with an empty cell get
    /// `T::default()`.
    pub fn collect(&self, grid_values: &[&[T]], donor_values: &mut [&mut [T]]) -> Result<(), ExchangeError> {
        let ex = self.exchange;
        ex.ensure_current()?;
        check_fields(self.count, grid_values.len())?;
        check_fields(self.count, donor_values.len())?;
        check_lengths(grid_values.iter().map(|f| f.len()), self.indexer.range().count())?;
        check_lengths(donor_values.iter().map(|f| f.len()), self.donors.num_donors())?;

        let profiler = ex.profiler();
        let _total = profiler.scope(timers::COLLECT);
        let schedule = ex.schedule();

        let (mut sends, recv_counts) = {
            let _t = profiler.scope(timers::COLLECT_MEM_ALLOC);
            let sends: BTreeMap<usize, Vec<T::Wire>> = schedule
                .collect_sends()
                .iter()
                .map(|s| (s.rank, vec![T::Wire::zeroed(); self.count * s.points.len()]))
                .collect();
            let recv_counts: BTreeMap<usize, usize> = schedule
                .collect_recvs()
                .iter()
                .map(|r| (r.rank, self.count * r.num_points))
                .collect();
            (sends, recv_counts)
        };

        {
            let _t = profiler.scope(timers::COLLECT_PACK);
            for s in schedule.collect_sends() {
                let Some(buf) = sends.get_mut(&s.rank) else { continue };
                let n = s.points.len();
                for (f, field) in grid_values.iter().enumerate() {
                    for (p, point) in s.points.iter().enumerate() {
                        buf[f * n + p] = field[self.indexer.to_index(point)].to_wire();
                    }
                }
            }
        }

        let mut received = {
            let _t = profiler.scope(timers::COLLECT_MPI);
            exchange_payloads(ex.comm(), ex.options().tags.collect, &recv_counts, &sends)?
        };

        let ghosts = schedule
            .collect_recvs()
            .iter()
            .map(|r| {
                let raw = received.remove(&r.rank).unwrap_or_default();
                if raw.len() != self.count * r.num_points {
                    return Err(ExchangeError::BufferSizeMismatch {
                        neighbor: r.rank,
                        expected: self.count * r.num_points,
                        got: raw.len(),
                    });
                }
                Ok(raw.into_iter().map(T::from_wire).collect::<Vec<T>>())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let _t = profiler.scope(timers::COLLECT_REDUCE);
        self.reduce(grid_values, &ghosts, donor_values);
        Ok(())
    }

    fn reduce(&self, grid_values: &[&[T]], ghosts: &[Vec<T>], donor_values: &mut [&mut [T]]) {
        let m = self.donors;
        let schedule = self.exchange.schedule();
        let grid = m.grid();
        let cart = grid.cart();
        let local = grid.local_range();
        let nd = m.num_dims();

        let mut cell: Vec<T> = Vec::with_capacity(m.max_points_in_cell());
        for (donor, extent) in m.extents().iter().enumerate() {
            if extent.is_empty() {
                for field in donor_values.iter_mut() {
                    field[donor] = T::default();
                }
                continue;
            }
            let in_cell = RangeIndexer::grid(*extent);
            let weights = StencilWeights::new(nd, extent.sizes(), m.max_stencil_size(), m.donor_coefs(donor));
            let remote = schedule.remote_donor_points().for_donor(donor);
            let away_from_edge = cart.range().includes(extent);

            for (f, field) in grid_values.iter().enumerate() {
                cell.clear();
                cell.resize(extent.count(), T::default());
                if away_from_edge {
                    for p in local.intersect(extent).points() {
                        cell[in_cell.to_index(&p)] = field[self.indexer.to_index(&p)];
                    }
                } else {
                    for (i, p) in extent.points().enumerate() {
                        let q = cart.periodic_adjust(&p);
                        if local.contains(&q) {
                            cell[i] = field[self.indexer.to_index(&q)];
                        }
                    }
                }
                for r in remote {
                    let n = schedule.collect_recvs()[r.collect_recv].num_points;
                    cell[r.point_in_cell] = ghosts[r.collect_recv][f * n + r.buffer_index];
                }
                donor_values[f][donor] = R::reduce(&cell, &weights);
            }
        }
    }
}

pub(crate) fn check_fields(expected: usize, got: usize) -> Result<(), ExchangeError> {
    if expected != got {
        return Err(ExchangeError::FieldCountMismatch { expected, got });
    }
    Ok(())
}

/// Every field must hold at least `expected` values.
pub(crate) fn check_lengths(lens: impl Iterator<Item = usize>, expected: usize) -> Result<(), ExchangeError> {
    for (field, got) in lens.enumerate() {
        if got < expected {
            return Err(ExchangeError::FieldTooShort { field, expected, got });
        }
    }
    Ok(())
}
