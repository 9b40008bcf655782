//! Shared fixtures for the infra integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use reqwest::Method;
use restbatch_common::MockClock;
use restbatch_domain::constants::TOKEN_SERVICE_PATH;
use restbatch_domain::{ClientConfig, CredentialKey};
use restbatch_infra::{BatchRequests, RestClient, TokenCache};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness once per binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn credentials() -> CredentialKey {
    CredentialKey::new("jdoe", "s3cret", "acme")
}

/// `Basic base64("jdoe@acme:s3cret")`
pub const BASIC_HEADER: &str = "Basic amRvZUBhY21lOnMzY3JldA==";

/// Mount a token endpoint answering exactly `times` requests with `token`.
///
/// Mocks mounted earlier win, so mounting `token-1` then `token-2` with
/// `times = 1` each hands out a new token per refresh.
pub async fn mount_token(server: &MockServer, token: &str, expires_in: u64, times: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_SERVICE_PATH))
        .and(header("authorization", BASIC_HEADER))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "token_type": "bearer",
            "expires_in": expires_in
        })))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

/// Client against `server` with its own token cache driven by `clock`.
pub fn client_with_clock(server: &MockServer, clock: &MockClock) -> (RestClient, Arc<TokenCache>) {
    client_with(server, clock, 10)
}

pub fn client_with(
    server: &MockServer,
    clock: &MockClock,
    max_concurrent_requests: usize,
) -> (RestClient, Arc<TokenCache>) {
    init_tracing();
    let cache = Arc::new(TokenCache::with_clock(clock.clone()));
    let mut config = ClientConfig::new(server.uri(), credentials());
    config.max_concurrent_requests = max_concurrent_requests;
    let client = RestClient::builder()
        .config(config)
        .token_cache(Arc::clone(&cache))
        .build()
        .expect("client should build");
    (client, cache)
}

/// Mount `GET {route}` answering `status` with `body` after `delay`.
pub async fn mount_get(
    server: &MockServer,
    route: &str,
    status: u16,
    body: Value,
    delay: Duration,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body).set_delay(delay))
        .mount(server)
        .await;
}

/// One GET per id against `/items/{id}`.
pub fn item_batch(client: &RestClient, ids: &[&str]) -> BatchRequests {
    let mut batch = BatchRequests::with_capacity(ids.len());
    for id in ids {
        let request =
            client.request(Method::GET, &format!("items/{id}")).expect("request should build");
        batch.push(*id, request).expect("ids are unique");
    }
    batch
}
