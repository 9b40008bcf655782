//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use reqwest::Error as HttpError;
use restbatch_domain::RestError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RestError);

impl From<InfraError> for RestError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RestError> for InfraError {
    fn from(value: RestError) -> Self {
        InfraError(value)
    }
}

/// Conversion into [`RestError`] given the response timeout that was in
/// force, so timeouts can report it.
pub trait IntoRestError {
    fn into_rest_error(self, timeout: Duration) -> RestError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RestError */
/* -------------------------------------------------------------------------- */

impl IntoRestError for HttpError {
    fn into_rest_error(self, timeout: Duration) -> RestError {
        if self.is_timeout() {
            return RestError::Timeout(timeout);
        }

        if self.is_decode() {
            return RestError::Decode(self.to_string());
        }

        if self.is_builder() {
            return RestError::InvalidRequest(self.to_string());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return RestError::Transport(format!("connection failure: {self}"));
        }

        RestError::Transport(self.to_string())
    }
}

/// Timeout-less conversion, used where no response timeout applies (client
/// construction).
impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_rest_error(Duration::ZERO))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
