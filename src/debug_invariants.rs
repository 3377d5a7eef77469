//! Opt-in structural checks for schedules and ranges.
//!
//! Checks run in debug builds, or in release builds with the
//! `check-invariants` feature. They are too expensive for every call in
//! production runs, which is why they are not plain `Result` paths.

use crate::exchange_error::ExchangeError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first violation encountered.
    fn validate_invariants(&self) -> Result<(), ExchangeError>;
}

/// Turn a failed condition into an [`ExchangeError::InvariantViolation`].
#[inline]
pub fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), ExchangeError> {
    if cond {
        Ok(())
    } else {
        Err(ExchangeError::InvariantViolation(msg()))
    }
}

/// Run a fallible check and panic with context on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
