//! Named wall-clock timers shared through a cloneable handle.
//!
//! A [`Profiler`] is handed to each exchange at creation; clones share the
//! same timers, so one handle can aggregate every exchange of a context.
//! A default-constructed profiler is disabled and costs one lock per scope.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timer names used by the exchange engines.
pub mod timers {
    pub const COLLECT: &str = "Collect";
    pub const COLLECT_MEM_ALLOC: &str = "Collect::MemAlloc";
    pub const COLLECT_MPI: &str = "Collect::MPI";
    pub const COLLECT_PACK: &str = "Collect::Pack";
    pub const COLLECT_REDUCE: &str = "Collect::Reduce";
    pub const SEND_RECV: &str = "SendRecv";
    pub const SEND_RECV_MEM_ALLOC: &str = "SendRecv::MemAlloc";
    pub const SEND_RECV_PACK: &str = "SendRecv::Pack";
    pub const SEND_RECV_MPI: &str = "SendRecv::MPI";
    pub const SEND_RECV_UNPACK: &str = "SendRecv::Unpack";
    pub const DISPERSE: &str = "Disperse";
}

#[derive(Debug, Default)]
struct TimerState {
    total: Duration,
    calls: u64,
    depth: u32,
    started: Option<Instant>,
}

#[derive(Debug, Default)]
struct ProfilerState {
    enabled: bool,
    timers: BTreeMap<&'static str, TimerState>,
}

/// Accumulated time of one timer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerReport {
    pub name: &'static str,
    pub total: Duration,
    pub calls: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Profiler {
    state: Arc<Mutex<ProfilerState>>,
}

impl Profiler {
    /// An enabled profiler.
    pub fn new() -> Self {
        let p = Self::default();
        p.set_enabled(true);
        p
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Start `name`. Nested starts of the same timer are counted once.
    pub fn start(&self, name: &'static str) {
        let mut st = self.state.lock();
        if !st.enabled {
            return;
        }
        let t = st.timers.entry(name).or_default();
        if t.depth == 0 {
            t.started = Some(Instant::now());
        }
        t.depth += 1;
    }

    pub fn stop(&self, name: &'static str) {
        let mut st = self.state.lock();
        if !st.enabled {
            return;
        }
        if let Some(t) = st.timers.get_mut(name).filter(|t| t.depth > 0) {
            t.depth -= 1;
            if t.depth == 0 {
                if let Some(start) = t.started.take() {
                    t.total += start.elapsed();
                    t.calls += 1;
                }
            }
        }
    }

    /// Time the enclosing scope under `name`.
    pub fn scope(&self, name: &'static str) -> TimerScope<'_> {
        self.start(name);
        TimerScope {
            profiler: self,
            name,
        }
    }

    pub fn elapsed(&self, name: &str) -> Option<Duration> {
        self.state.lock().timers.get(name).map(|t| t.total)
    }

    pub fn calls(&self, name: &str) -> u64 {
        self.state.lock().timers.get(name).map_or(0, |t| t.calls)
    }

    /// All timers in name order.
    pub fn report(&self) -> Vec<TimerReport> {
        self.state
            .lock()
            .timers
            .iter()
            .map(|(&name, t)| TimerReport {
                name,
                total: t.total,
                calls: t.calls,
            })
            .collect()
    }

    pub fn reset(&self) {
        self.state.lock().timers.clear();
    }
}

/// Stops its timer when dropped.
#[must_use = "the timer stops as soon as the scope guard is dropped"]
pub struct TimerScope<'a> {
    profiler: &'a Profiler,
    name: &'static str,
}

impl Drop for TimerScope<'_> {
    fn drop(&mut self) {
        self.profiler.stop(self.name);
    }
}
