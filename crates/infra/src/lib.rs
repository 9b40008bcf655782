//! # restbatch infrastructure
//!
//! I/O side of the batch REST engine.
//!
//! This crate contains:
//! - The pooled HTTP transport (`reqwest`, rustls)
//! - OAuth token acquisition and the process-wide token cache
//! - The rate-limited [`RestClient`] with collect, fail-fast and
//!   fail-fast-any batch execution
//! - Offset pagination and per-resource listing/item access
//! - Configuration loading from environment variables and files
//!
//! ## Architecture
//! - Value types, errors and configuration live in `restbatch-domain`
//! - Clock and error-classification traits come from `restbatch-common`

pub mod api;
pub mod config;
pub mod errors;
pub mod http;

pub use api::{
    classify, decode_response, AccessTokenProvider, BatchRequests, JsonObject, OAuthAuthenticator,
    OAuthTokenEndpoint, Page, RequestDescriptor, RestClient, RestClientBuilder, RestResource,
    TokenCache, TokenResponse, TokenSource,
};
pub use errors::{InfraError, IntoRestError};
pub use http::{HttpClient, HttpClientBuilder};
