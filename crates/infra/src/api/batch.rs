//! Concurrent batch execution
//!
//! A batch is a list of uniquely identified requests resolved under one
//! [`BatchPolicy`]. Every request runs in its own task, all of them share the
//! client's concurrency ceiling, and the call returns only once every task
//! has terminated. Results come back in submission order regardless of
//! completion order.
//!
//! Fail-fast policies record the first aborting failure in a set-once slot;
//! the task that wins the slot cancels the batch's token, which stops the
//! remaining requests whether they are in flight or still queued for a
//! permit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use reqwest::Request;
use restbatch_common::{ErrorClassification, ErrorSeverity};
use restbatch_domain::{BatchFailure, BatchMap, BatchPolicy, BatchResult, Outcome, RestError};
use serde::de::DeserializeOwned;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::client::RestClient;

/// One request of a batch, identified by a caller-chosen id
#[derive(Debug)]
pub struct RequestDescriptor {
    id: String,
    request: Request,
}

impl RequestDescriptor {
    pub fn new(id: impl Into<String>, request: Request) -> Self {
        Self { id: id.into(), request }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_parts(self) -> (String, Request) {
        (self.id, self.request)
    }
}

/// Ordered set of requests with unique ids
#[derive(Debug, Default)]
pub struct BatchRequests {
    requests: Vec<RequestDescriptor>,
    ids: HashSet<String>,
}

impl BatchRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { requests: Vec::with_capacity(capacity), ids: HashSet::with_capacity(capacity) }
    }

    /// Append a request.
    ///
    /// # Errors
    /// Returns `RestError::InvalidRequest` if `id` is already in the batch.
    pub fn push(&mut self, id: impl Into<String>, request: Request) -> Result<(), RestError> {
        let id = id.into();
        if !self.ids.insert(id.clone()) {
            return Err(RestError::InvalidRequest(format!("duplicate request id '{id}'")));
        }
        self.requests.push(RequestDescriptor::new(id, request));
        Ok(())
    }

    /// Chaining form of [`BatchRequests::push`].
    pub fn with(mut self, id: impl Into<String>, request: Request) -> Result<Self, RestError> {
        self.push(id, request)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(RequestDescriptor::id)
    }
}

impl IntoIterator for BatchRequests {
    type Item = RequestDescriptor;
    type IntoIter = std::vec::IntoIter<RequestDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

/// Every request's result in submission order, plus the failure that
/// aborted the batch, if any.
struct BatchRun<R> {
    results: Vec<(String, Result<R, RestError>)>,
    fault: Option<BatchFailure>,
}

/// Log a failed request at the level its severity calls for.
fn log_failure(id: &str, err: &RestError, message: &str) {
    let retryable = err.is_retryable();
    match err.severity() {
        ErrorSeverity::Critical | ErrorSeverity::Error => {
            error!(request_id = %id, error = %err, retryable, "{message}");
        }
        ErrorSeverity::Warning => warn!(request_id = %id, error = %err, retryable, "{message}"),
        ErrorSeverity::Info => info!(request_id = %id, error = %err, retryable, "{message}"),
    }
}

/// Set-once record of the failure that aborts a batch
#[derive(Clone)]
struct FaultSlot {
    fault: Arc<OnceCell<BatchFailure>>,
    cancel: CancellationToken,
    policy: BatchPolicy,
}

impl FaultSlot {
    fn new(policy: BatchPolicy, cancel: CancellationToken) -> Self {
        Self { fault: Arc::new(OnceCell::new()), cancel, policy }
    }

    /// Record `err` if the policy aborts on it and no failure was recorded
    /// yet. Only the winning caller cancels the batch.
    fn record(&self, id: &str, err: &RestError) {
        if !self.policy.aborts_on(err) {
            return;
        }
        if self.fault.set(BatchFailure::new(id, err.clone())).is_ok() {
            log_failure(id, err, "batch aborted, cancelling remaining requests");
            self.cancel.cancel();
        }
    }

    fn take(self) -> Option<BatchFailure> {
        self.fault.get().cloned()
    }
}

impl RestClient {
    /// Run every request and report each one's outcome. Never fails.
    #[instrument(skip_all, fields(batch_size = batch.len()))]
    pub async fn execute_collect<T, R, F>(
        &self,
        batch: BatchRequests,
        transform: F,
    ) -> BatchResult<R>
    where
        T: DeserializeOwned + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let run = self.run_batch(batch, BatchPolicy::CollectIgnoringErrors, transform).await;

        let result: BatchResult<R> =
            run.results.into_iter().map(|(id, result)| (id, Outcome::from(result))).collect();

        info!(
            succeeded = result.success_count(),
            failed = result.error_count(),
            "batch completed"
        );
        result
    }

    /// Run every request, aborting on the first transport failure.
    ///
    /// Requests the server rejects do not abort the batch; they are left
    /// out of the returned map.
    ///
    /// # Errors
    /// The first transport-category failure (including timeouts, undecodable
    /// bodies and cancellation), tagged with its request id.
    #[instrument(skip_all, fields(batch_size = batch.len()))]
    pub async fn execute_fail_fast<T, R, F>(
        &self,
        batch: BatchRequests,
        transform: F,
    ) -> Result<BatchMap<R>, BatchFailure>
    where
        T: DeserializeOwned + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let run = self.run_batch(batch, BatchPolicy::FailFast, transform).await;
        Self::values_or_fault(run)
    }

    /// Run every request, aborting on the first failure of any kind.
    ///
    /// # Errors
    /// The first failure observed, domain or transport, tagged with its
    /// request id.
    #[instrument(skip_all, fields(batch_size = batch.len()))]
    pub async fn execute_fail_fast_any<T, R, F>(
        &self,
        batch: BatchRequests,
        transform: F,
    ) -> Result<BatchMap<R>, BatchFailure>
    where
        T: DeserializeOwned + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let run = self.run_batch(batch, BatchPolicy::FailFastAny, transform).await;
        Self::values_or_fault(run)
    }

    fn values_or_fault<R>(run: BatchRun<R>) -> Result<BatchMap<R>, BatchFailure> {
        if let Some(fault) = run.fault {
            return Err(fault);
        }

        let mut values = BatchMap::with_capacity(run.results.len());
        for (id, result) in run.results {
            match result {
                Ok(value) => values.push(id, value),
                Err(err) => log_failure(&id, &err, "request rejected, omitted from batch"),
            }
        }
        info!(succeeded = values.len(), "batch completed");
        Ok(values)
    }

    async fn run_batch<T, R, F>(
        &self,
        batch: BatchRequests,
        policy: BatchPolicy,
        transform: F,
    ) -> BatchRun<R>
    where
        T: DeserializeOwned + Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        if batch.is_empty() {
            return BatchRun { results: Vec::new(), fault: None };
        }

        let cancel = self.batch_token();
        // Dropping the caller's future cancels queued requests and the
        // JoinSet aborts whatever is still running.
        let _abort_on_drop = cancel.clone().drop_guard();
        let slot = FaultSlot::new(policy, cancel.clone());
        let transform = Arc::new(transform);

        let mut tasks: JoinSet<Result<R, RestError>> = JoinSet::new();
        let mut positions: HashMap<task::Id, usize> = HashMap::with_capacity(batch.len());
        let mut ids: Vec<String> = Vec::with_capacity(batch.len());

        for (position, descriptor) in batch.into_iter().enumerate() {
            let (id, request) = descriptor.into_parts();
            let client = self.clone();
            let cancel = cancel.clone();
            let slot = slot.clone();
            let transform = Arc::clone(&transform);
            let task_id = id.clone();

            let handle = tasks.spawn(async move {
                let result = client
                    .execute_cancellable::<T>(request, &cancel)
                    .await
                    .map(|value| transform(value));
                if let Err(err) = &result {
                    debug!(request_id = %task_id, error = %err, "request failed");
                    slot.record(&task_id, err);
                }
                result
            });
            positions.insert(handle.id(), position);
            ids.push(id);
        }

        let mut slots: Vec<Option<Result<R, RestError>>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok(done) => done,
                Err(join_err) => {
                    let err = RestError::Transport(format!("request task failed: {join_err}"));
                    if let Some(&position) = positions.get(&join_err.id()) {
                        slot.record(&ids[position], &err);
                    }
                    (join_err.id(), Err(err))
                }
            };
            if let Some(&position) = positions.get(&task_id) {
                slots[position] = Some(result);
            }
        }

        let results = ids
            .into_iter()
            .zip(slots)
            .map(|(id, result)| (id, result.unwrap_or(Err(RestError::Cancelled))))
            .collect();

        BatchRun { results, fault: slot.take() }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use reqwest::Method;
    use restbatch_domain::{ClientConfig, CredentialKey};
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::auth::AccessTokenProvider;

    struct StaticAuth;

    #[async_trait]
    impl AccessTokenProvider for StaticAuth {
        async fn authorization_header(&self) -> Result<String, RestError> {
            Ok("Bearer test-token".to_string())
        }
    }

    fn client_for(server: &MockServer) -> RestClient {
        let config = ClientConfig::new(server.uri(), CredentialKey::new("jdoe", "pw", "acme"));
        RestClient::builder().config(config).auth(Arc::new(StaticAuth)).build().unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let client = reqwest::Client::new();
        let mut batch = BatchRequests::new();
        batch.push("a", client.get("http://localhost/a").build().unwrap()).unwrap();

        let err = batch.push("a", client.get("http://localhost/b").build().unwrap()).unwrap_err();

        assert!(matches!(err, RestError::InvalidRequest(_)));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[tokio::test]
    async fn empty_batch_returns_immediately() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let collected = client.execute_collect(BatchRequests::new(), |v: Value| v).await;
        let strict =
            client.execute_fail_fast_any(BatchRequests::new(), |v: Value| v).await.unwrap();

        assert!(collected.is_empty());
        assert!(strict.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transform_runs_on_each_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"n": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"n": 2})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let batch = BatchRequests::new()
            .with("1", client.request(Method::GET, "items/1").unwrap())
            .unwrap()
            .with("2", client.request(Method::GET, "items/2").unwrap())
            .unwrap();

        let doubled = client
            .execute_fail_fast(batch, |v: Value| v["n"].as_i64().unwrap_or_default() * 2)
            .await
            .unwrap();

        assert_eq!(doubled.get("1"), Some(&2));
        assert_eq!(doubled.get("2"), Some(&4));
    }

    #[tokio::test]
    async fn fail_fast_tolerates_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "ok"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let batch = BatchRequests::new()
            .with("ok", client.request(Method::GET, "items/ok").unwrap())
            .unwrap()
            .with("missing", client.request(Method::GET, "items/missing").unwrap())
            .unwrap();

        let values = client.execute_fail_fast(batch, |v: Value| v).await.unwrap();

        assert_eq!(values.len(), 1);
        assert!(values.contains_key("ok"));
        assert!(!values.contains_key("missing"));
    }

    #[tokio::test]
    async fn fail_fast_any_reports_rejection_with_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let batch = BatchRequests::new()
            .with("missing", client.request(Method::GET, "items/missing").unwrap())
            .unwrap();

        let failure = client.execute_fail_fast_any(batch, |v: Value| v).await.unwrap_err();

        assert_eq!(failure.request_id, "missing");
        assert_eq!(failure.error, RestError::domain(404, "Not Found"));
    }

    #[tokio::test]
    async fn permits_are_released_after_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut batch = BatchRequests::with_capacity(25);
        for i in 0..25 {
            let request = client.request(Method::GET, &format!("items/{i}")).unwrap();
            batch.push(i.to_string(), request).unwrap();
        }

        let result = client.execute_collect(batch, |v: Value| v).await;

        assert_eq!(result.success_count(), 25);
        assert_eq!(client.available_permits(), client.max_concurrent_requests());
    }

    #[tokio::test]
    async fn dropping_batch_future_aborts_its_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut batch = BatchRequests::with_capacity(3);
        for i in 0..3 {
            let request = client.request(Method::GET, &format!("items/{i}")).unwrap();
            batch.push(i.to_string(), request).unwrap();
        }

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            client.execute_collect(batch, |v: Value| v),
        )
        .await;
        assert!(abandoned.is_err());

        // Aborted tasks hand their permits back without waiting for the server.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(client.available_permits(), client.max_concurrent_requests());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn rejections_are_logged_at_their_severity() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/locked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let batch = BatchRequests::new()
            .with("locked", client.request(Method::GET, "items/locked").unwrap())
            .unwrap();

        let values = client.execute_fail_fast(batch, |v: Value| v).await.unwrap();
        assert!(values.is_empty());

        let rejected = logs
            .text()
            .lines()
            .find(|line| line.contains("request rejected"))
            .map(str::to_string)
            .expect("rejection should be logged");
        assert!(rejected.contains("ERROR"), "403 is critical, got: {rejected}");
        assert!(rejected.contains("retryable=false"));
    }
}
