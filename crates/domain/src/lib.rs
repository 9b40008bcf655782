//! # Restbatch Domain
//!
//! Domain types shared by the Restbatch client.
//!
//! This crate contains:
//! - Credential identity and the legacy login payload
//! - The REST error taxonomy and batch failure type
//! - Per-request outcomes and insertion-ordered batch results
//! - Client configuration structures and constants
//!
//! ## Architecture
//! - Depends only on `restbatch-common` and external crates
//! - No I/O; everything here is plain data

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
