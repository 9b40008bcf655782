//! Test doubles shared with downstream test suites
//!
//! - **[`time`]**: `MockClock`, a manually advanced [`crate::Clock`]

pub mod time;

pub use time::MockClock;
