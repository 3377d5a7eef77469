//! Registry of exchanges keyed by grid pair.
//!
//! An [`Exchanger`] creates every exchange with the same communicator,
//! options and profiler, so that all exchanges of one overset assembly share
//! timers and tag layout. Binding, unbinding and [`Exchanger::update_all`]
//! are collective: every rank must bind and unbind the same pairs in the
//! same order.

use crate::algs::communicator::Communicator;
use crate::connectivity::Connectivity;
use crate::exchange::{Exchange, ExchangeOptions};
use crate::exchange_error::ExchangeError;
use crate::profiler::Profiler;
use crate::topology::grid::GridId;
use std::collections::BTreeMap;

/// (donor grid, receiver grid)
pub type GridPair = (GridId, GridId);

pub struct Exchanger<C: Communicator + Clone> {
    comm: C,
    options: ExchangeOptions,
    profiler: Profiler,
    exchanges: BTreeMap<GridPair, Exchange<C>>,
}

impl<C: Communicator + Clone> Exchanger<C> {
    /// Exchanger with a disabled profiler.
    pub fn new(comm: C, options: ExchangeOptions) -> Self {
        Self::with_profiler(comm, options, Profiler::default())
    }

    pub fn with_profiler(comm: C, options: ExchangeOptions, profiler: Profiler) -> Self {
        Self {
            comm,
            options,
            profiler,
            exchanges: BTreeMap::new(),
        }
    }

    /// Collective: create the exchange for `connectivity`.
    pub fn bind(&mut self, connectivity: Connectivity) -> Result<&mut Exchange<C>, ExchangeError> {
        let key = (connectivity.donor_grid().id(), connectivity.receiver_grid().id());
        if self.exchanges.contains_key(&key) {
            return Err(ExchangeError::AlreadyBound {
                donor_grid: key.0,
                receiver_grid: key.1,
            });
        }
        let exchange = Exchange::create(
            connectivity,
            self.comm.clone(),
            self.options.clone(),
            self.profiler.clone(),
        )?;
        Ok(self.exchanges.entry(key).or_insert(exchange))
    }

    /// Collective: destroy the exchange of a grid pair and return its
    /// connectivity.
    pub fn unbind(&mut self, donor_grid: GridId, receiver_grid: GridId) -> Result<Connectivity, ExchangeError> {
        self.exchanges
            .remove(&(donor_grid, receiver_grid))
            .map(Exchange::destroy)
            .ok_or(ExchangeError::NotBound {
                donor_grid,
                receiver_grid,
            })
    }

    pub fn exchange(&self, donor_grid: GridId, receiver_grid: GridId) -> Option<&Exchange<C>> {
        self.exchanges.get(&(donor_grid, receiver_grid))
    }

    pub fn exchange_mut(&mut self, donor_grid: GridId, receiver_grid: GridId) -> Option<&mut Exchange<C>> {
        self.exchanges.get_mut(&(donor_grid, receiver_grid))
    }

    /// Collective: update every bound exchange, in grid-pair order. All
    /// exchanges are updated even if one fails; the first error is returned.
    pub fn update_all(&mut self) -> Result<(), ExchangeError> {
        let mut first_err = None;
        for exchange in self.exchanges.values_mut() {
            if let Err(e) = exchange.update() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Bound grid pairs in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = GridPair> + '_ {
        self.exchanges.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}
