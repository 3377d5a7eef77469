//! Handles for in-flight sends and receives.
//!
//! A [`Request`] owns the packing buffers and transport handles of one
//! `send` or `receive` call. It completes when all of its own messages have
//! completed; [`wait_all`] and [`wait_any`] poll a set of requests and finish
//! each one as soon as it is ready, never ahead of its messages.

use crate::exchange_error::ExchangeError;
use std::fmt;

/// Operation-specific completion logic behind a [`Request`].
pub(crate) trait PendingRequest {
    /// `true` once every message of the request has completed.
    fn test(&mut self) -> bool;

    /// Wait for the remaining messages and run the completion step
    /// (unpacking, for receives).
    fn finish(self: Box<Self>) -> Result<(), ExchangeError>;
}

/// Pending `send` or `receive`. May be empty, in which case waiting on it
/// does nothing.
#[derive(Default)]
pub struct Request<'a> {
    pending: Option<Box<dyn PendingRequest + 'a>>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(pending: impl PendingRequest + 'a) -> Self {
        Self {
            pending: Some(Box::new(pending)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` until the request has been waited on.
    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    /// Non-blocking: can [`wait`](Self::wait) complete without blocking?
    pub fn test(&mut self) -> bool {
        self.pending.as_mut().is_none_or(|p| p.test())
    }

    /// Block until the request completes. The request is empty afterwards.
    pub fn wait(&mut self) -> Result<(), ExchangeError> {
        match self.pending.take() {
            Some(p) => p.finish(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Request<'_> {
    fn drop(&mut self) {
        if let Some(p) = self.pending.take() {
            log::warn!("request dropped while active; waiting on it");
            if let Err(e) = p.finish() {
                log::error!("request dropped while active failed: {e}");
            }
        }
    }
}

/// Wait for every request. Requests are finished in completion order; the
/// first error is returned once all of them are done.
pub fn wait_all(requests: &mut [Request<'_>]) -> Result<(), ExchangeError> {
    let mut first_err = None;
    while requests.iter().any(Request::is_active) {
        let mut progressed = false;
        for r in requests.iter_mut().filter(|r| r.is_active()) {
            if r.test() {
                progressed = true;
                if let Err(e) = r.wait() {
                    first_err.get_or_insert(e);
                }
            }
        }
        if !progressed {
            std::thread::yield_now();
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Wait for one request to complete and finish it. Returns its index, or
/// `None` if no request is active.
pub fn wait_any(requests: &mut [Request<'_>]) -> Result<Option<usize>, ExchangeError> {
    if !requests.iter().any(Request::is_active) {
        return Ok(None);
    }
    loop {
        for (i, r) in requests.iter_mut().enumerate() {
            if r.is_active() && r.test() {
                r.wait()?;
                return Ok(Some(i));
            }
        }
        std::thread::yield_now();
    }
}
