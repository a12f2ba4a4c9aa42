//! Pacing and retry primitives for outgoing calls
//!
//! This module provides the two generic building blocks every dispatched
//! call passes through:
//! - **Sliding-window limiter**: at most `max_calls` admissions in any
//!   trailing `time_period`
//! - **Retry policy**: bounded, deterministic retry decisions driven by
//!   [`ErrorClassification`](crate::error::ErrorClassification)
//!
//! Both are scheduling-model agnostic. Waiting is delegated to the
//! [`pause`] backends (tokio task or OS thread), and time is read through a
//! [`Clock`] so tests can control it.

pub mod clock;
pub mod pause;
pub mod rate_limiter;
pub mod retry;

pub use clock::{Clock, MockClock, SystemClock, TokioClock};
pub use pause::{pause, pause_blocking, Cancelled};
pub use rate_limiter::{RateLimiterConfig, RateLimiterConfigBuilder, SlidingWindowLimiter};
pub use retry::{
    BackoffStrategy, RetryAction, RetryPolicy, RetryPolicyConfig, RetryPolicyConfigBuilder,
};
