//! Monotonic time source for token expiry
//!
//! Expiry is computed against a [`Clock`] instead of `Instant::now()` so the
//! refresh margin can be exercised without waiting. Production code uses
//! [`SystemClock`]; tests use `MockClock` (feature `test-utils`).

use std::sync::Arc;
use std::time::Instant;

/// Source of monotonic instants
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The process's monotonic clock
///
/// # Examples
///
/// ```
/// use restbatch_common::{Clock, SystemClock};
///
/// let issued = SystemClock.now();
/// assert!(SystemClock.now() >= issued);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
