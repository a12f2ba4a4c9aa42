//! Error conversions between infrastructure crates and the domain

pub mod conversions;

pub use conversions::{InfraError, IntoFailure};
