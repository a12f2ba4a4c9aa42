//! Session lifecycle errors

use apiq_common::ConfigError;
use apiq_domain::Failure;
use thiserror::Error;

/// Misuse of the session lifecycle or failure to set it up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is already running")]
    AlreadyRunning,

    #[error("session is not running")]
    NotRunning,

    /// The transport could not acquire its resource
    #[error("failed to open transport: {0}")]
    Open(#[source] Failure),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

pub type SessionResult<T> = Result<T, SessionError>;
