//! Token acquisition against a mock token endpoint
//!
//! Time is driven by a `MockClock`, so expiry checks do not depend on the
//! wall clock.

mod support;

use std::time::Duration;

use restbatch_common::MockClock;
use restbatch_domain::RestError;
use serde_json::{json, Value};
use support::{client_with_clock, credentials, mount_token};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_whoami(server: &MockServer, token: &str, who: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/whoami"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": who })))
        .mount(server)
        .await;
}

async fn whoami(client: &restbatch_infra::RestClient) -> String {
    let body: Value = client.get_json("rest/whoami").await.expect("whoami succeeds");
    body["token"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_token_reused_until_margin_then_refreshed() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600, 1).await;
    mount_token(&server, "token-2", 3600, 1).await;
    mount_whoami(&server, "token-1", "first").await;
    mount_whoami(&server, "token-2", "second").await;

    let clock = MockClock::new();
    let (client, cache) = client_with_clock(&server, &clock);

    assert_eq!(whoami(&client).await, "first");
    assert!(cache.contains_fresh(&credentials()));

    clock.advance(Duration::from_secs(2999));
    assert_eq!(whoami(&client).await, "first", "token still inside its reuse window");

    clock.advance(Duration::from_secs(1));
    assert!(!cache.contains_fresh(&credentials()));
    assert_eq!(whoami(&client).await, "second", "token refreshed at issue + 3000s");
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_cold_batch_requests_one_token() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600, 1).await;
    for i in 0..8 {
        Mock::given(method("GET"))
            .and(path(format!("/items/{i}")))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "n": i }))
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;
    }

    let clock = MockClock::new();
    let (client, _cache) = client_with_clock(&server, &clock);
    let ids: Vec<String> = (0..8).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let batch = support::item_batch(&client, &id_refs);

    let result = client.execute_collect(batch, |body: Value| body["n"].as_u64()).await;

    assert_eq!(result.success_count(), 8);
    // `mount_token` expects exactly one call; verified when the server drops.
}

#[tokio::test]
async fn test_rejected_credentials_surface_as_domain_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(restbatch_domain::constants::TOKEN_SERVICE_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "https://example.com/unauthorized",
            "title": "Unauthorized",
            "detail": "Invalid client credentials"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let clock = MockClock::new();
    let (client, cache) = client_with_clock(&server, &clock);

    let err = client.get_json::<Value>("rest/whoami").await.unwrap_err();

    assert_eq!(err, RestError::domain(401, "Unauthorized - Invalid client credentials"));
    assert!(cache.is_empty(), "failed fetch leaves nothing cached");
}
