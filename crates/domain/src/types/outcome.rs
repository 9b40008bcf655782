//! Per-request outcome of a batch

use crate::errors::RestError;

/// Either the transformed value of a successful request or the error that
/// request produced
///
/// Exactly one side is populated. Converting back into a `Result` with
/// [`Outcome::into_result`] lets callers keep using `?`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Error(RestError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Borrow the value, or the error that replaced it.
    pub fn get(&self) -> Result<&T, &RestError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Error(err) => Err(err),
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.get().ok()
    }

    pub fn error(&self) -> Option<&RestError> {
        self.get().err()
    }

    /// The value, or `default` when the request failed.
    pub fn or_else(self, default: T) -> T {
        match self {
            Self::Success(value) => value,
            Self::Error(_) => default,
        }
    }

    /// The value, or one computed from the error.
    pub fn or_else_with(self, f: impl FnOnce(RestError) -> T) -> T {
        match self {
            Self::Success(value) => value,
            Self::Error(err) => f(err),
        }
    }

    /// Run `f` on the value if the request succeeded.
    pub fn if_success(&self, f: impl FnOnce(&T)) {
        if let Self::Success(value) = self {
            f(value);
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Error(err) => Outcome::Error(err),
        }
    }

    pub fn into_result(self) -> Result<T, RestError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Error(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, RestError>> for Outcome<T> {
    fn from(result: Result<T, RestError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Error(err),
        }
    }
}
