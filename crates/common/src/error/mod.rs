//! Error classification shared by every error type in the workspace
//!
//! Module-specific errors stay module-specific (they carry the domain
//! context), but all of them answer the same questions through
//! [`ErrorClassification`]:
//!
//! - **`is_retryable()`**: could the same call succeed if attempted again?
//! - **`severity()`**: how loudly should this be logged?
//! - **`is_critical()`**: does this indicate a broken invariant?
//! - **`retry_after()`**: suggested delay, if the failure carries one
//!
//! ## Severity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Cancelled work, resource not found |
//! | **Warning** | Degraded but operational | Rate limiting, transient transport failures |
//! | **Error** | Failure requiring attention | Rejected requests, invalid configuration |
//! | **Critical** | System integrity at risk | Internal invariant violations |

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are typically transient issues that may succeed if
    /// attempted again, such as:
    /// - Network timeouts
    /// - Rate limiting
    /// - Temporary service unavailability
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when a specific delay is recommended, or
    /// `None` if no specific delay is suggested.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky;

    impl ErrorClassification for Flaky {
        fn is_retryable(&self) -> bool {
            true
        }

        fn severity(&self) -> ErrorSeverity {
            ErrorSeverity::Warning
        }

        fn retry_after(&self) -> Option<Duration> {
            Some(Duration::from_secs(1))
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_default_is_critical_follows_severity() {
        assert!(!Flaky.is_critical());
        assert!(Flaky.is_retryable());
        assert_eq!(Flaky.retry_after(), Some(Duration::from_secs(1)));
    }
}
