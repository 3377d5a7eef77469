//! Receive: accept donor values into receiver storage.

use super::collect::{check_fields, check_lengths};
use super::request::{PendingRequest, Request};
use super::scalar::Scalar;
use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::collect_from_bytes;
use crate::exchange::{Exchange, RecvRecord, Schedule};
use crate::exchange_error::ExchangeError;
use crate::profiler::{Profiler, timers};
use std::marker::PhantomData;

/// Typed receive engine for value type `T`.
pub struct Receiver<'x, C: Communicator, T: Scalar> {
    exchange: &'x Exchange<C>,
    count: usize,
    tag: CommTag,
    _value: PhantomData<fn() -> T>,
}

impl<'x, C: Communicator, T: Scalar> Receiver<'x, C, T> {
    pub fn new(exchange: &'x Exchange<C>, count: usize, tag: CommTag) -> Self {
        Self {
            exchange,
            count,
            tag,
            _value: PhantomData,
        }
    }

    /// Post one receive per source rank. `receiver_values[f][r]` is written
    /// when the returned request completes; receivers whose source has no
    /// owner keep their value.
    pub fn receive<'a>(&self, receiver_values: Vec<&'a mut [T]>) -> Result<Request<'a>, ExchangeError>
    where
        'x: 'a,
    {
        let ex = self.exchange;
        ex.ensure_current()?;
        check_fields(self.count, receiver_values.len())?;
        let num_receivers = ex.connectivity().receivers().map_or(0, |n| n.num_receivers());
        check_lengths(receiver_values.iter().map(|f| f.len()), num_receivers)?;

        let profiler = ex.profiler();
        let _total = profiler.scope(timers::SEND_RECV);
        let schedule = ex.schedule();
        if schedule.recvs().is_empty() {
            return Ok(Request::empty());
        }

        let wire = std::mem::size_of::<T::Wire>();
        let _t = profiler.scope(timers::SEND_RECV_MPI);
        let handles = schedule
            .recvs()
            .iter()
            .map(|r| {
                let mut buf = vec![0u8; self.count * r.count * wire];
                (*r, ex.comm().irecv(r.rank, self.tag.as_u16(), &mut buf))
            })
            .collect();
        Ok(Request::new(RecvRequest::<'a, C, T> {
            schedule,
            profiler: profiler.clone(),
            count: self.count,
            values: receiver_values,
            handles,
        }))
    }
}

struct RecvRequest<'a, C: Communicator, T: Scalar> {
    schedule: &'a Schedule,
    profiler: Profiler,
    count: usize,
    values: Vec<&'a mut [T]>,
    handles: Vec<(RecvRecord, C::RecvHandle)>,
}

impl<C: Communicator, T: Scalar> PendingRequest for RecvRequest<'_, C, T> {
    fn test(&mut self) -> bool {
        self.handles.iter_mut().all(|(_, h)| h.test())
    }

    fn finish(self: Box<Self>) -> Result<(), ExchangeError> {
        let RecvRequest {
            schedule,
            profiler,
            count,
            mut values,
            handles,
        } = *self;
        let wire = std::mem::size_of::<T::Wire>();

        let mut maybe_err = None;
        let mut buffers: Vec<Vec<T::Wire>> = Vec::with_capacity(handles.len());
        for (r, h) in handles {
            let expected = count * r.count * wire;
            match h.wait() {
                Some(raw) if raw.len() == expected => buffers.push(collect_from_bytes(&raw)),
                Some(raw) => {
                    maybe_err.get_or_insert(ExchangeError::BufferSizeMismatch {
                        neighbor: r.rank,
                        expected,
                        got: raw.len(),
                    });
                }
                None => {
                    maybe_err.get_or_insert(ExchangeError::CommError {
                        neighbor: r.rank,
                        source: format!("no payload received from rank {}", r.rank).into(),
                    });
                }
            }
        }
        if let Some(err) = maybe_err {
            return Err(err);
        }

        let _t = profiler.scope(timers::SEND_RECV_UNPACK);
        let recvs = schedule.recvs();
        let mut cursors = vec![0usize; recvs.len()];
        for &receiver in schedule.receivers_sorted() {
            let Some(k) = schedule.receiver_recv_indices()[receiver] else { continue };
            let n = recvs[k].count;
            for (f, field) in values.iter_mut().enumerate() {
                field[receiver] = T::from_wire(buffers[k][f * n + cursors[k]]);
            }
            cursors[k] += 1;
        }
        Ok(())
    }
}
