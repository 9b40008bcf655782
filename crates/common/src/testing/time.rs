//! Manually advanced clock
//!
//! ```
//! use std::time::Duration;
//!
//! use restbatch_common::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let issued = clock.now();
//! clock.advance(Duration::from_secs(3000));
//! assert_eq!(clock.now() - issued, Duration::from_secs(3000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::time::Clock;

/// Clock frozen at its creation instant until [`MockClock::advance`] moves it
///
/// Clones share the offset, so a clone handed to a token cache observes every
/// advance made through the original.
#[derive(Debug, Clone)]
pub struct MockClock {
    origin: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), offset_nanos: Arc::new(AtomicU64::new(0)) }
    }

    /// Move every clone of this clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let step = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self.offset_nanos.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
            Some(offset.saturating_add(step))
        });
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
