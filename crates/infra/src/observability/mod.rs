//! Logging and tracing setup
//!
//! Library code in every apiq crate only emits `tracing` events. Binaries
//! (and the `paced_client` demo) call [`init_tracing`] once at startup to
//! install a `tracing-subscriber` stack:
//!
//! - an [`EnvFilter`] read from `RUST_LOG`, falling back to
//!   [`ObservabilityConfig::log_level`]
//! - a `fmt` layer, human readable or JSON
//!
//! ## Environment Variables
//! - `APIQ_LOG_LEVEL`: Filter used when `RUST_LOG` is unset (default `info`)
//! - `APIQ_LOG_JSON`: Emit JSON lines (true/false)

use apiq_domain::{ApiqError, Result};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::loader::env_bool;

/// Configuration for log output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "apiq_core=debug")
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logs: false }
    }
}

impl ObservabilityConfig {
    /// Read `APIQ_LOG_LEVEL` and `APIQ_LOG_JSON`, defaulting unset values
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("APIQ_LOG_LEVEL")
                .ok()
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.log_level),
            json_logs: env_bool("APIQ_LOG_JSON", defaults.json_logs),
        }
    }
}

/// Install the global tracing subscriber
///
/// # Errors
/// Returns `ApiqError::Config` for an invalid filter directive and
/// `ApiqError::Internal` if a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ApiqError::Config(format!("Invalid log filter {:?}: {e}", config.log_level)))?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ApiqError::Internal(format!("Tracing subscriber already installed: {e}")))
}
