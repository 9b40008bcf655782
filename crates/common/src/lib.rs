//! Modular common utilities shared across restbatch crates.
//!
//! # Modules
//!
//! - [`error`]: the `ErrorClassification` vocabulary every error type in the
//!   workspace implements
//! - [`time`]: the `Clock` abstraction used for token expiry
//! - `testing` (feature `test-utils`): `MockClock` for deterministic time

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use error::{ErrorClassification, ErrorSeverity};
#[cfg(any(feature = "test-utils", test))]
pub use testing::MockClock;
pub use time::{Clock, SystemClock};
