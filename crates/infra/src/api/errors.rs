//! Error classification for API responses
//!
//! Failed responses carry a problem envelope:
//!
//! ```json
//! {"type": "...", "title": "Conflict", "status": "409", "detail": "Cannot execute"}
//! ```
//!
//! [`classify`] turns that envelope into a single human-readable message.
//! Responses that do not carry one fall back to the HTTP reason phrase.

use reqwest::{Response, StatusCode};
use restbatch_domain::RestError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct ProblemEnvelope {
    title: String,
    #[serde(default)]
    detail: Option<Value>,
}

impl ProblemEnvelope {
    /// `detail` as text; numbers and booleans are rendered, other shapes
    /// are ignored.
    fn detail(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Extract a message from a problem envelope.
///
/// Returns `"{title} - {detail}"` when a detail differing from the title is
/// present, the title alone otherwise, and `None` when the body is not an
/// envelope with a string `title`. Never fails.
pub fn classify(body: &[u8]) -> Option<String> {
    let envelope: ProblemEnvelope = serde_json::from_slice(body).ok()?;

    match envelope.detail() {
        Some(detail) if detail != envelope.title => {
            Some(format!("{} - {}", envelope.title, detail))
        }
        _ => Some(envelope.title),
    }
}

/// Reason phrase used when the body carries no envelope.
pub fn status_line(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(|| status.as_str().to_string(), str::to_string)
}

/// Build the domain error for a rejected response body.
pub fn rejection(status: StatusCode, body: &[u8]) -> RestError {
    let message = classify(body).unwrap_or_else(|| status_line(status));
    RestError::domain(status.as_u16(), message)
}

/// Drain the response body and decode it.
///
/// The body is always read to the end, even for rejected responses, so the
/// connection goes back to the pool. Non-2xx statuses become
/// [`RestError::Domain`]; a 2xx body that does not decode becomes
/// [`RestError::Decode`]. An empty 2xx body decodes as JSON `null`.
pub async fn decode_response<T: DeserializeOwned>(
    http: &HttpClient,
    response: Response,
) -> Result<T, RestError> {
    let status = response.status();
    let body = response.bytes().await.map_err(|err| http.map_error(err))?;
    trace!(%status, bytes = body.len(), "response body drained");

    if !status.is_success() {
        let err = rejection(status, &body);
        debug!(status = status.as_u16(), error = %err, "request rejected");
        return Err(err);
    }

    if body.is_empty() {
        return serde_json::from_value(Value::Null).map_err(|_| {
            let status = status.as_u16();
            RestError::Decode(format!("empty response body ({status}) cannot be decoded"))
        });
    }

    serde_json::from_slice(&body).map_err(|err| RestError::Decode(err.to_string()))
}
