//! # apiq Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The reqwest-backed [`HttpTransport`]
//! - Configuration loading from environment variables and TOML/JSON files
//! - Tracing subscriber setup
//! - Conversions from third-party errors into domain errors and failures
//!
//! ## Architecture
//! - Implements traits defined in `apiq-core`
//! - Contains all "impure" code (network, filesystem, process environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpTransport, HttpTransportBuilder};
pub use observability::{init_tracing, ObservabilityConfig};
