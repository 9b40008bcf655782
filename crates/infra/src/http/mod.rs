//! HTTP transport shared by every client.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
