//! Common utility functions
//!
//! - **[`serde`]**: Serialization helpers for configuration types

pub mod serde;

pub use self::serde::{duration_millis, option_duration_millis};
