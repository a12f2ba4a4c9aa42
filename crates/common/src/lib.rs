//! Resilience utilities shared across apiq crates.
//!
//! - `error`: construction errors and the `ErrorClassification` contract
//! - `resilience`: clocks, cancellable pauses, the sliding-window limiter and
//!   the retry policy
//! - `utils`: serde helpers for configuration types

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod resilience;
pub mod utils;

pub use error::{ConfigError, ConfigResult, ErrorClassification, ErrorSeverity};
pub use resilience::{
    BackoffStrategy, Cancelled, Clock, MockClock, RateLimiterConfig, RetryAction, RetryPolicy,
    RetryPolicyConfig, SlidingWindowLimiter, SystemClock, TokioClock,
};
pub use utils::serde::{duration_millis, option_duration_millis};
