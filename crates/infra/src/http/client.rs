use std::time::Duration;

use reqwest::{Client as ReqwestClient, IntoUrl, Method, Request, RequestBuilder, Response};
use restbatch_domain::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_RESPONSE_TIMEOUT_MS,
    POOL_IDLE_TIMEOUT, USER_AGENT,
};
use restbatch_domain::{ClientConfig, ProxyConfig, RestError};
use tracing::debug;

use crate::errors::{InfraError, IntoRestError};

/// HTTP client with connect/response timeouts and a bounded idle pool.
///
/// Cloning is cheap and clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
    response_timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, RestError> {
        Self::builder().build()
    }

    /// Build a client from the transport part of a [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, RestError> {
        let mut builder = Self::builder()
            .connect_timeout(config.connect_timeout())
            .response_timeout(config.response_timeout())
            .pool_max_idle_per_host(config.max_concurrent_requests);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(proxy.clone());
        }

        builder.build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: IntoUrl,
    {
        self.client.request(method, url)
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Build and execute the provided request builder.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, RestError> {
        let request = builder.build().map_err(|err| RestError::from(InfraError::from(err)))?;
        self.execute(request).await
    }

    /// Execute a prepared request. Non-2xx statuses are returned as
    /// responses, not errors.
    pub async fn execute(&self, request: Request) -> Result<Response, RestError> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, %url, %status, "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(self.map_error(err))
            }
        }
    }

    /// Map a reqwest failure (including body reads) into a [`RestError`].
    pub fn map_error(&self, err: reqwest::Error) -> RestError {
        err.into_rest_error(self.response_timeout)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    connect_timeout: Duration,
    response_timeout: Duration,
    pool_max_idle_per_host: usize,
    proxy: Option<ProxyConfig>,
    user_agent: String,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            pool_max_idle_per_host: DEFAULT_MAX_CONCURRENT_REQUESTS,
            proxy: None,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HttpClientBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Total time allowed for one exchange, body included.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn build(self) -> Result<HttpClient, RestError> {
        let mut builder = ReqwestClient::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.response_timeout)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .user_agent(self.user_agent);

        builder = match &self.proxy {
            Some(proxy) => builder.proxy(build_proxy(proxy)?),
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|err| RestError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, response_timeout: self.response_timeout })
    }
}

fn build_proxy(config: &ProxyConfig) -> Result<reqwest::Proxy, RestError> {
    let proxy = reqwest::Proxy::all(config.url())
        .map_err(|err| RestError::Config(format!("invalid proxy {}: {err}", config.url())))?;

    Ok(match (&config.user, &config.password) {
        (Some(user), Some(password)) => proxy.basic_auth(user, password),
        (Some(user), None) => proxy.basic_auth(user, ""),
        _ => proxy,
    })
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};
    use restbatch_domain::CredentialKey;
    use wiremock::matchers::{header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn returns_non_success_responses_without_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("http client");
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().user_agent("restbatch-test").build().unwrap();
        let response = client.send(client.request(Method::GET, server.uri())).await.unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let timeout = Duration::from_millis(50);
        let client = HttpClient::builder().response_timeout(timeout).build().unwrap();

        let result = client.send(client.request(Method::GET, server.uri())).await;
        assert_eq!(result.unwrap_err(), RestError::Timeout(timeout));
    }

    #[test]
    fn builds_from_config_with_proxy() {
        let mut config =
            ClientConfig::new("https://api.example.com", CredentialKey::new("jdoe", "pw", "acme"));
        config.proxy = Some(ProxyConfig::new("proxy.local", 3128).with_credentials("svc", "pw"));

        let client = HttpClient::from_config(&config).expect("client with proxy");
        assert_eq!(client.response_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn invalid_proxy_is_a_config_error() {
        let result = HttpClient::builder().proxy(ProxyConfig::new("bad host name", 3128)).build();
        assert!(matches!(result, Err(RestError::Config(_))));
    }
}
