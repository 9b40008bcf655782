//! Credential identity and login payloads

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Login, password and tenant identifying one account on one tenant
///
/// Two keys are equal when all three fields match, which makes the key
/// suitable for indexing the token cache. The password never appears in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    login: String,
    password: String,
    tenant: String,
}

impl CredentialKey {
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self { login: login.into(), password: password.into(), tenant: tenant.into() }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// `Basic` authorization value for the token endpoint.
    ///
    /// The user part is `login@tenant`.
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}@{}:{}", self.login, self.tenant, self.password);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Build the legacy login payload stamped with `now`.
    pub fn legacy_auth(&self, now: DateTime<Utc>) -> LegacyAuth {
        LegacyAuth::new(self, now)
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialKey")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// Payload for the legacy digest login
///
/// `auth_string` is `md5_hex(now + md5_hex(password))`, where `now` is the
/// exact timestamp string sent alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuth {
    pub now: String,
    pub login: String,
    pub company: String,
    pub auth_string: String,
}

impl LegacyAuth {
    pub fn new(key: &CredentialKey, now: DateTime<Utc>) -> Self {
        let now = now.to_rfc3339_opts(SecondsFormat::Millis, false);
        let password_hash = md5_hex(key.password.as_bytes());
        let auth_string = md5_hex(format!("{now}{password_hash}").as_bytes());

        Self { now, login: key.login.clone(), company: key.tenant.clone(), auth_string }
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}
