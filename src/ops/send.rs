//! Send: ship donor values to the ranks owning their destinations.

use super::collect::{check_fields, check_lengths};
use super::request::{PendingRequest, Request};
use super::scalar::Scalar;
use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::cast_slice;
use crate::exchange::Exchange;
use crate::exchange_error::ExchangeError;
use crate::profiler::timers;
use bytemuck::Zeroable;
use std::marker::PhantomData;

/// Typed send engine for value type `T`.
pub struct Sender<'x, C: Communicator, T: Scalar> {
    exchange: &'x Exchange<C>,
    count: usize,
    tag: CommTag,
    _value: PhantomData<fn() -> T>,
}

impl<'x, C: Communicator, T: Scalar> Sender<'x, C, T> {
    /// Sends `count` fields per donor with message tag `tag`. The matching
    /// [`Receiver`](super::Receiver) must use the same count and tag.
    pub fn new(exchange: &'x Exchange<C>, count: usize, tag: CommTag) -> Self {
        Self {
            exchange,
            count,
            tag,
            _value: PhantomData,
        }
    }

    /// Post one message per destination rank. Values of each message are
    /// laid out field by field, donors in destination order. Ranks without
    /// a donor side send nothing.
    pub fn send(&self, donor_values: &[&[T]]) -> Result<Request<'static>, ExchangeError> {
        let ex = self.exchange;
        ex.ensure_current()?;
        check_fields(self.count, donor_values.len())?;
        let num_donors = ex.connectivity().donors().map_or(0, |m| m.num_donors());
        check_lengths(donor_values.iter().map(|f| f.len()), num_donors)?;

        let profiler = ex.profiler();
        let _total = profiler.scope(timers::SEND_RECV);
        let schedule = ex.schedule();
        let sends = schedule.sends();

        let mut buffers: Vec<Vec<T::Wire>> = {
            let _t = profiler.scope(timers::SEND_RECV_MEM_ALLOC);
            sends
                .iter()
                .map(|s| vec![T::Wire::zeroed(); self.count * s.count])
                .collect()
        };

        {
            let _t = profiler.scope(timers::SEND_RECV_PACK);
            let mut cursors = vec![0usize; sends.len()];
            for &donor in schedule.donors_sorted() {
                let Some(k) = schedule.donor_send_indices()[donor] else { continue };
                let n = sends[k].count;
                for (f, field) in donor_values.iter().enumerate() {
                    buffers[k][f * n + cursors[k]] = field[donor].to_wire();
                }
                cursors[k] += 1;
            }
        }

        let _t = profiler.scope(timers::SEND_RECV_MPI);
        let handles = sends
            .iter()
            .zip(&buffers)
            .map(|(s, buf)| ex.comm().isend(s.rank, self.tag.as_u16(), cast_slice(buf)))
            .collect();
        if sends.is_empty() {
            return Ok(Request::empty());
        }
        Ok(Request::new(SendRequest::<C> { handles }))
    }
}

struct SendRequest<C: Communicator> {
    handles: Vec<C::SendHandle>,
}

impl<C: Communicator> PendingRequest for SendRequest<C> {
    fn test(&mut self) -> bool {
        self.handles.iter_mut().all(Wait::test)
    }

    fn finish(self: Box<Self>) -> Result<(), ExchangeError> {
        for h in self.handles {
            let _ = h.wait();
        }
        Ok(())
    }
}
