//! Transport failures
//!
//! A [`Failure`] is produced by a transport and carries its own retry
//! classification. The retry policy reads that classification through
//! [`ErrorClassification`]; it never inspects status codes itself.

use std::fmt;
use std::time::Duration;

use apiq_common::error::{ErrorClassification, ErrorSeverity};
use apiq_common::option_duration_millis;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of one transport invocation
pub type CallOutcome<P> = Result<P, Failure>;

/// What went wrong during an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum FailureKind {
    /// The request did not complete in time
    Timeout,
    /// No connection could be established or it was dropped
    Connection,
    /// The server answered with a 5xx status
    Server(u16),
    /// The server answered with a 4xx status
    Client(u16),
    /// The response body could not be decoded
    Decode,
    /// The transport is not open
    Unavailable,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connection => write!(f, "connection"),
            FailureKind::Server(status) => write!(f, "server error {status}"),
            FailureKind::Client(status) => write!(f, "client error {status}"),
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::Unavailable => write!(f, "unavailable"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// A failed invocation, classified by the transport that produced it
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Whether another attempt may succeed
    pub retriable: bool,
    /// Delay requested by the remote end, if any
    #[serde(default, with = "option_duration_millis", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>, retriable: bool) -> Self {
        Self { kind, message: message.into(), retriable, retry_after: None }
    }

    /// A failure worth another attempt
    pub fn retriable(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, true)
    }

    /// A failure that ends the dispatch
    pub fn terminal(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::retriable(FailureKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::retriable(FailureKind::Connection, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::terminal(FailureKind::Decode, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::terminal(FailureKind::Unavailable, message)
    }

    /// Classify a non-success HTTP status
    ///
    /// 5xx and 429 are retriable; every other status is terminal.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            500..=599 => Self::retriable(FailureKind::Server(status), message),
            429 => Self::retriable(FailureKind::Client(status), message),
            400..=499 => Self::terminal(FailureKind::Client(status), message),
            _ => Self::terminal(FailureKind::Other, message),
        }
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// HTTP status carried by the kind, if any
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::Server(status) | FailureKind::Client(status) => Some(status),
            _ => None,
        }
    }
}

impl ErrorClassification for Failure {
    fn is_retryable(&self) -> bool {
        self.retriable
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            _ if self.retriable => ErrorSeverity::Warning,
            FailureKind::Unavailable => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_status_classification() {
        let cases = [
            (500, FailureKind::Server(500), true),
            (503, FailureKind::Server(503), true),
            (429, FailureKind::Client(429), true),
            (404, FailureKind::Client(404), false),
            (400, FailureKind::Client(400), false),
            (302, FailureKind::Other, false),
        ];

        for (status, kind, retriable) in cases {
            let failure = Failure::from_status(status, "boom");
            assert_eq!(failure.kind, kind, "status {status}");
            assert_eq!(failure.retriable, retriable, "status {status}");
        }
    }

    #[test]
    fn test_classification_reads_failure_fields() {
        let busy = Failure::from_status(503, "busy").with_retry_after(Duration::from_secs(2));
        assert!(busy.is_retryable());
        assert_eq!(busy.severity(), ErrorSeverity::Warning);
        assert_eq!(ErrorClassification::retry_after(&busy), Some(Duration::from_secs(2)));

        let closed = Failure::unavailable("session closed");
        assert!(!closed.is_retryable());
        assert!(closed.is_critical());

        assert_eq!(Failure::decode("bad json").severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_display_and_status() {
        let failure = Failure::from_status(502, "bad gateway");
        assert_eq!(failure.to_string(), "server error 502: bad gateway");
        assert_eq!(failure.status(), Some(502));
        assert_eq!(Failure::timeout("slow").status(), None);
    }

    #[test]
    fn test_serde_shape() {
        let failure = Failure::from_status(429, "slow down").with_retry_after(Duration::from_secs(1));
        let value = serde_json::to_value(&failure).expect("serialize");
        assert_eq!(
            value,
            json!({
                "kind": {"kind": "client", "status": 429},
                "message": "slow down",
                "retriable": true,
                "retry_after": 1000
            })
        );

        let parsed: Failure = serde_json::from_value(json!({
            "kind": {"kind": "timeout"},
            "message": "slow",
            "retriable": true
        }))
        .expect("deserialize");
        assert_eq!(parsed, Failure::timeout("slow"));
    }
}
