//! REST client: authenticated single requests under a shared concurrency
//! ceiling
//!
//! Every request issued through a [`RestClient`] (and its clones) first takes
//! a permit from one semaphore sized to `max_concurrent_requests`, then gets
//! an `Authorization` header from the configured [`AccessTokenProvider`].

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, Url};
use restbatch_domain::{ClientConfig, RestError};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::auth::{AccessTokenProvider, OAuthAuthenticator, OAuthTokenEndpoint, TokenCache};
use super::errors::decode_response;
use super::resource::RestResource;
use crate::http::HttpClient;

/// Client for one base URL and one set of credentials
///
/// Cloning is cheap; clones share the HTTP pool, the token provider, the
/// concurrency ceiling and the cancellation scope.
#[derive(Clone)]
pub struct RestClient {
    http: HttpClient,
    base_url: String,
    auth: Arc<dyn AccessTokenProvider>,
    permits: Arc<Semaphore>,
    max_concurrent_requests: usize,
    shutdown: Arc<Mutex<CancellationToken>>,
}

impl RestClient {
    /// Client with default OAuth authentication and the shared token cache.
    ///
    /// # Errors
    /// Returns `RestError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, RestError> {
        Self::builder().config(config).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Permits currently free under the concurrency ceiling.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> Result<Url, RestError> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined)
            .map_err(|err| RestError::InvalidRequest(format!("invalid URL {joined}: {err}")))
    }

    /// Request template for `path`, without authentication.
    pub fn request(&self, method: Method, path: &str) -> Result<Request, RestError> {
        let url = self.url(path)?;
        self.http
            .request(method, url)
            .build()
            .map_err(|err| RestError::InvalidRequest(err.to_string()))
    }

    /// Resource bound to `path` on this client.
    pub fn resource(&self, path: impl Into<String>) -> RestResource {
        RestResource::new(self.clone(), path)
    }

    /// Execute one request and decode its JSON body.
    ///
    /// # Errors
    /// - `RestError::Domain` when the server answers with a non-2xx status
    /// - `RestError::Decode` when a 2xx body does not decode into `T`
    /// - `RestError::Transport`/`Timeout` when the exchange fails
    /// - `RestError::Cancelled` when [`RestClient::cancel_all`] interrupts it
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    pub async fn execute<T>(&self, request: Request) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let cancel = self.batch_token();
        self.execute_cancellable(request, &cancel).await
    }

    /// `GET {base}/{path}` decoded as `T`.
    pub async fn get_json<T>(&self, path: &str) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let request = self.request(Method::GET, path)?;
        self.execute(request).await
    }

    /// Cancel every request in flight or queued on this client, across all
    /// batches. Requests started afterwards run normally.
    pub fn cancel_all(&self) {
        let mut shutdown = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner);
        shutdown.cancel();
        *shutdown = CancellationToken::new();
        debug!("all in-flight requests cancelled");
    }

    /// Fresh cancellation scope, cancelled by [`RestClient::cancel_all`].
    pub(crate) fn batch_token(&self) -> CancellationToken {
        self.shutdown.lock().unwrap_or_else(PoisonError::into_inner).child_token()
    }

    /// Run one request unless `cancel` fires first, including while it is
    /// still waiting for a permit.
    pub(crate) async fn execute_cancellable<T>(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RestError::Cancelled),
            result = self.acquire_and_send(request) => result,
        }
    }

    async fn acquire_and_send<T>(&self, request: Request) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let _permit = self.permits.acquire().await.map_err(|_| RestError::Cancelled)?;
        self.send_authorized(request).await
    }

    async fn send_authorized<T>(&self, mut request: Request) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let header = self.auth.authorization_header().await?;
        let mut value = HeaderValue::from_str(&header)
            .map_err(|err| {
                RestError::InvalidRequest(format!("invalid authorization header: {err}"))
            })?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);

        let response = self.http.execute(request).await?;
        decode_response(&self.http, response).await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish_non_exhaustive()
    }
}

/// Builder for REST client
#[derive(Default)]
pub struct RestClientBuilder {
    config: Option<ClientConfig>,
    http: Option<HttpClient>,
    token_cache: Option<Arc<TokenCache>>,
    auth: Option<Arc<dyn AccessTokenProvider>>,
}

impl RestClientBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing HTTP client (and its pool) instead of building one
    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Use a dedicated token cache instead of the process-wide one
    pub fn token_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// Replace OAuth authentication with a custom provider
    pub fn auth(mut self, auth: Arc<dyn AccessTokenProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Build the REST client
    ///
    /// # Errors
    ///
    /// Returns `RestError::Config` if no configuration was set, it fails
    /// validation, or the HTTP client cannot be created
    pub fn build(self) -> Result<RestClient, RestError> {
        let config =
            self.config.ok_or_else(|| RestError::Config("client configuration not set".into()))?;
        config.validate()?;

        if config.retry_count > 0 {
            debug!(retry_count = config.retry_count, "retry_count is accepted but not applied");
        }

        let http = match self.http {
            Some(http) => http,
            None => HttpClient::from_config(&config)?,
        };
        let base_url = config.normalized_base_url().to_string();

        let auth = match self.auth {
            Some(auth) => auth,
            None => {
                let cache = self.token_cache.unwrap_or_else(TokenCache::shared);
                let source = Arc::new(OAuthTokenEndpoint::new(http.clone(), &base_url));
                Arc::new(OAuthAuthenticator::new(cache, source, config.credentials.clone()))
            }
        };

        Ok(RestClient {
            http,
            base_url,
            auth,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            max_concurrent_requests: config.max_concurrent_requests,
            shutdown: Arc::new(Mutex::new(CancellationToken::new())),
        })
    }
}
