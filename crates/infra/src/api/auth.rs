//! API authentication with cached OAuth tokens
//!
//! Tokens come from the client-credentials endpoint and are cached per
//! [`CredentialKey`] until shortly before they expire. A cold cache hit by a
//! whole batch at once triggers a single token request: refreshes for the
//! same key are serialised, and every waiter re-checks the cache once it gets
//! the lock.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Method;
use restbatch_common::{Clock, SystemClock};
use restbatch_domain::constants::{
    GRANT_TYPE_CLIENT_CREDENTIALS, TOKEN_EXPIRY_MARGIN, TOKEN_SERVICE_PATH,
};
use restbatch_domain::{CredentialKey, RestError};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::errors::decode_response;
use crate::http::HttpClient;

/// Trait for providing the `Authorization` header value
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Header value for the next request, e.g. `Bearer eyJ0eX...`.
    ///
    /// Implementations refresh the underlying token when needed.
    async fn authorization_header(&self) -> Result<String, RestError>;
}

/// Body returned by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
}

/// Where fresh tokens come from
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self, key: &CredentialKey) -> Result<TokenResponse, RestError>;
}

/// Client-credentials grant against `{base}/rest/oauthTokenService/v1/token`
#[derive(Debug, Clone)]
pub struct OAuthTokenEndpoint {
    http: HttpClient,
    url: String,
}

impl OAuthTokenEndpoint {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        let url = format!("{}{}", base_url.trim_end_matches('/'), TOKEN_SERVICE_PATH);
        Self { http, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenSource for OAuthTokenEndpoint {
    #[instrument(skip_all, fields(login = key.login(), tenant = key.tenant()))]
    async fn fetch_token(&self, key: &CredentialKey) -> Result<TokenResponse, RestError> {
        let mut basic = HeaderValue::from_str(&key.basic_auth_header())
            .map_err(|err| RestError::InvalidRequest(format!("invalid credentials: {err}")))?;
        basic.set_sensitive(true);

        let request = self
            .http
            .request(Method::POST, &self.url)
            .header(AUTHORIZATION, basic)
            .form(&[("grant_type", GRANT_TYPE_CLIENT_CREDENTIALS)]);

        let response = self.http.send(request).await?;
        decode_response(&self.http, response).await
    }
}

/// A bearer token and the instant it stops being reused
#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    /// `expires_in` minus the safety margin, counted from `issued_at`.
    fn issued(response: TokenResponse, issued_at: Instant) -> Self {
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        Self { value: response.token, expires_at: issued_at + lifetime }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

static SHARED_CACHE: Lazy<Arc<TokenCache>> = Lazy::new(|| Arc::new(TokenCache::new()));

/// Bearer tokens keyed by credential
///
/// Entries are created on first use, replaced wholesale on refresh, and
/// expired entries are swept whenever any entry is refreshed.
pub struct TokenCache {
    entries: DashMap<CredentialKey, CachedToken>,
    refresh_locks: DashMap<CredentialKey, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Cache driven by a custom clock (use `MockClock` in tests).
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self { entries: DashMap::new(), refresh_locks: DashMap::new(), clock: Arc::new(clock) }
    }

    /// Process-wide cache shared by every client that is not given its own.
    pub fn shared() -> Arc<TokenCache> {
        Arc::clone(&SHARED_CACHE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a non-stale token is cached for `key`.
    pub fn contains_fresh(&self, key: &CredentialKey) -> bool {
        self.fresh_token(key, self.clock.now()).is_some()
    }

    /// Drop the token for `key`, forcing the next call to fetch a new one.
    pub fn invalidate(&self, key: &CredentialKey) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.refresh_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// `Bearer` header for `key`, fetching a token from `source` if the cached
    /// one is missing or stale.
    ///
    /// # Errors
    /// Whatever `source` fails with: a domain error when the token endpoint
    /// rejects the credentials, a transport error when it cannot be reached.
    #[instrument(skip_all, fields(login = key.login(), tenant = key.tenant()))]
    pub async fn authorization_header(
        &self,
        key: &CredentialKey,
        source: &dyn TokenSource,
    ) -> Result<String, RestError> {
        if let Some(token) = self.fresh_token(key, self.clock.now()) {
            return Ok(bearer(&token));
        }

        let lock = self.refresh_lock(key);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        if let Some(token) = self.fresh_token(key, now) {
            debug!("token refreshed by a concurrent caller");
            return Ok(bearer(&token));
        }

        let response = source.fetch_token(key).await?;
        let expires_in = response.expires_in;
        let token = CachedToken::issued(response, now);
        let header = bearer(&token.value);

        self.sweep(now, key);
        self.entries.insert(key.clone(), token);
        info!(expires_in, "new access token issued");

        Ok(header)
    }

    fn fresh_token(&self, key: &CredentialKey, now: Instant) -> Option<String> {
        self.entries.get(key).filter(|token| !token.is_stale(now)).map(|token| token.value.clone())
    }

    fn refresh_lock(&self, key: &CredentialKey) -> Arc<Mutex<()>> {
        let entry = self.refresh_locks.entry(key.clone()).or_default();
        Arc::clone(entry.value())
    }

    /// Drop stale tokens along with their refresh locks.
    ///
    /// A lock some caller still holds or waits on is kept, as is the lock of
    /// `refreshing`, the key whose refresh is running.
    fn sweep(&self, now: Instant, refreshing: &CredentialKey) {
        let mut swept = Vec::new();
        self.entries.retain(|key, token| {
            let stale = token.is_stale(now);
            if stale {
                swept.push(key.clone());
            }
            !stale
        });

        for key in swept.iter().filter(|key| *key != refreshing) {
            self.refresh_locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
        if !swept.is_empty() {
            debug!(swept = swept.len(), "expired tokens removed");
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache").field("entries", &self.entries.len()).finish()
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Binds a credential to a token cache and a token source
#[derive(Clone)]
pub struct OAuthAuthenticator {
    cache: Arc<TokenCache>,
    source: Arc<dyn TokenSource>,
    key: CredentialKey,
}

impl OAuthAuthenticator {
    pub fn new(cache: Arc<TokenCache>, source: Arc<dyn TokenSource>, key: CredentialKey) -> Self {
        Self { cache, source, key }
    }

    pub fn credentials(&self) -> &CredentialKey {
        &self.key
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }
}

impl fmt::Debug for OAuthAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthAuthenticator").field("key", &self.key).finish_non_exhaustive()
    }
}

#[async_trait]
impl AccessTokenProvider for OAuthAuthenticator {
    async fn authorization_header(&self) -> Result<String, RestError> {
        self.cache.authorization_header(&self.key, self.source.as_ref()).await
    }
}
