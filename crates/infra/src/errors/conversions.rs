//! Conversions from external infrastructure errors into domain errors.
//!
//! Two targets exist. Construction-time problems (bad URLs, bad headers, a
//! client that cannot be built) become [`ApiqError`]. Errors raised while a
//! call is in flight become a classified [`Failure`] so the dispatcher can
//! decide whether to retry.

use apiq_domain::{ApiqError, Failure, FailureKind};
use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};
use reqwest::Error as HttpError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ApiqError);

impl From<InfraError> for ApiqError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ApiqError> for InfraError {
    fn from(value: ApiqError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* construction errors → ApiqError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(ApiqError::Config(format!("invalid HTTP client settings: {value}")));
        }
        InfraError(ApiqError::Network(value.to_string()))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(ApiqError::Config(format!("invalid base_url: {value}")))
    }
}

impl From<InvalidHeaderName> for InfraError {
    fn from(value: InvalidHeaderName) -> Self {
        InfraError(ApiqError::InvalidInput(format!("invalid header name: {value}")))
    }
}

impl From<InvalidHeaderValue> for InfraError {
    fn from(value: InvalidHeaderValue) -> Self {
        InfraError(ApiqError::InvalidInput(format!("invalid header value: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* in-flight errors → Failure */
/* -------------------------------------------------------------------------- */

/// Classify an error raised during an invocation
pub trait IntoFailure {
    fn into_failure(self) -> Failure;
}

impl IntoFailure for HttpError {
    fn into_failure(self) -> Failure {
        if self.is_timeout() {
            return Failure::timeout(format!("HTTP request timed out: {self}"));
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return Failure::connection(format!("HTTP connection failure: {self}"));
        }

        if self.is_decode() {
            return Failure::decode(format!("HTTP response could not be decoded: {self}"));
        }

        if self.is_request() || self.is_body() {
            return Failure::retriable(FailureKind::Connection, format!("HTTP request failed: {self}"));
        }

        if let Some(status) = self.status() {
            return Failure::from_status(status.as_u16(), self.to_string());
        }

        Failure::terminal(FailureKind::Other, self.to_string())
    }
}
