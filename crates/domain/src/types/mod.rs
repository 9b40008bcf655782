//! Domain types and models

pub mod batch;
pub mod credentials;
pub mod outcome;

pub use batch::{BatchMap, BatchPolicy, BatchResult};
pub use credentials::{CredentialKey, LegacyAuth};
pub use outcome::Outcome;
