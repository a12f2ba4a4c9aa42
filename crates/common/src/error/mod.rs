//! Shared error vocabulary
//!
//! Two pieces live here:
//!
//! 1. **`ConfigError`**: the single construction-time failure of the
//!    resilience primitives. A limiter or a retry policy built from invalid
//!    parameters is rejected before it can be used and never recovers.
//!
//! 2. **`ErrorClassification`**: the contract between a failure and the code
//!    that decides what to do about it. Transports classify their own
//!    failures; [`RetryPolicy`](crate::resilience::RetryPolicy) only reads
//!    the classification.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use apiq_common::error::{ErrorClassification, ErrorSeverity};
//!
//! #[derive(Debug)]
//! struct Busy;
//!
//! impl ErrorClassification for Busy {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(1))
//!     }
//! }
//!
//! assert!(Busy.is_retryable());
//! assert!(!Busy.is_critical());
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Invalid construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: timeouts, connection resets, server
    /// side failures, rate limiting by the remote end.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the remote end asked for a specific
    /// delay (e.g. a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
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
