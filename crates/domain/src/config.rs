//! Client configuration structures

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_RESPONSE_TIMEOUT_MS,
    DEFAULT_RETRY_COUNT,
};
use crate::errors::{RestError, Result};
use crate::types::CredentialKey;

/// Settings for one REST endpoint and one account on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub credentials: CredentialKey,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Accepted for compatibility; requests are never retried.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl ClientConfig {
    /// Configuration with default timeouts and concurrency.
    pub fn new(base_url: impl Into<String>, credentials: CredentialKey) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            proxy: None,
        }
    }

    /// Base URL without trailing slashes.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Check the settings a client cannot run without.
    ///
    /// # Errors
    /// Returns `RestError::Config` for an empty base URL, an empty login or
    /// tenant, or a concurrency limit of zero.
    pub fn validate(&self) -> Result<()> {
        if self.normalized_base_url().trim().is_empty() {
            return Err(RestError::Config("base_url must not be empty".to_string()));
        }
        if self.credentials.login().trim().is_empty() {
            return Err(RestError::Config("credentials.login must not be empty".to_string()));
        }
        if self.credentials.tenant().trim().is_empty() {
            return Err(RestError::Config("credentials.tenant must not be empty".to_string()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RestError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        Ok(())
    }
}

/// Outbound HTTP proxy
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, user: None, password: None }
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RestError::Config("proxy.host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(RestError::Config("proxy.port must not be 0".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_response_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}
