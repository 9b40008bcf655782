//! REST client core
//!
//! - [`auth`]: token cache, OAuth token endpoint and the `AccessTokenProvider` seam
//! - [`client`]: authenticated single requests under a shared concurrency ceiling
//! - [`batch`]: concurrent batches under the three failure policies
//! - [`pagination`]: offset pagination built on a fail-fast batch
//! - [`resource`]: list/get helpers for one resource path
//! - [`errors`]: problem-envelope classification and response decoding

pub mod auth;
pub mod batch;
pub mod client;
pub mod errors;
pub mod pagination;
pub mod resource;

pub use auth::{
    AccessTokenProvider, OAuthAuthenticator, OAuthTokenEndpoint, TokenCache, TokenResponse,
    TokenSource,
};
pub use batch::{BatchRequests, RequestDescriptor};
pub use client::{RestClient, RestClientBuilder};
pub use errors::{classify, decode_response};
pub use pagination::{JsonObject, Page};
pub use resource::RestResource;
