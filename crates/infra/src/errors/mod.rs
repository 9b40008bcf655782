//! Conversions from transport errors into [`RestError`](restbatch_domain::RestError).

pub mod conversions;

pub use conversions::{InfraError, IntoRestError};
