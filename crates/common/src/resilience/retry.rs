//! Bounded retry decisions
//!
//! [`RetryPolicy`] answers one question: given the index of the attempt that
//! just finished and its outcome, stop or retry after how long? It never
//! sleeps and never calls anything; the dispatchers own the loop.
//!
//! Delays are deterministic in the attempt index (no jitter) and always
//! capped by [`RetryPolicyConfig::max_delay`]. The default growth is
//! [`BackoffStrategy::Fixed`]; linear and exponential growth are opt-in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, ErrorClassification};
use crate::utils::serde::duration_millis;

/// Decision returned by [`RetryPolicy::next_action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Surface the outcome to the caller
    Stop,
    /// Try again once the delay has elapsed
    RetryAfter(Duration),
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed {
        #[serde(with = "duration_millis")]
        delay: Duration,
    },
    /// Linear backoff: initial_delay + (attempt * increment)
    Linear {
        #[serde(with = "duration_millis")]
        initial_delay: Duration,
        #[serde(with = "duration_millis")]
        increment: Duration,
    },
    /// Exponential backoff: initial_delay * base^attempt
    Exponential {
        #[serde(with = "duration_millis")]
        initial_delay: Duration,
        base: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Fixed { delay: Duration::from_millis(500) }
    }
}

impl BackoffStrategy {
    /// Uncapped delay before the retry that follows `attempt`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed { delay } => *delay,
            BackoffStrategy::Linear { initial_delay, increment } => {
                initial_delay.saturating_add(increment.saturating_mul(attempt))
            }
            BackoffStrategy::Exponential { initial_delay, base } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let millis = initial_delay.as_millis() as f64 * base.powi(exponent);
                if millis.is_finite() && millis < u64::MAX as f64 {
                    Duration::from_millis(millis as u64)
                } else {
                    Duration::MAX
                }
            }
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        match self {
            BackoffStrategy::Exponential { base, .. } if !(base.is_finite() && *base >= 1.0) => {
                Err(ConfigError::invalid("exponential base must be a finite number >= 1.0"))
            }
            _ => Ok(()),
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Retries allowed after the first attempt
    pub max_attempts: u32,
    /// Delay growth between attempts
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Ceiling applied to every delay, including server-suggested ones
    #[serde(with = "duration_millis", default = "default_max_delay")]
    pub max_delay: Duration,
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: BackoffStrategy::default(), max_delay: default_max_delay() }
    }
}

impl RetryPolicyConfig {
    /// Configuration with `max_attempts` retries and default backoff
    pub fn with_retries(max_attempts: u32) -> Self {
        Self { max_attempts, ..Self::default() }
    }

    /// Create a configuration builder
    pub fn builder() -> RetryPolicyConfigBuilder {
        RetryPolicyConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.backoff.validate()
    }
}

/// Builder for RetryPolicyConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryPolicyConfigBuilder {
    config: RetryPolicyConfig,
}

impl RetryPolicyConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryPolicyConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed { delay };
        self
    }

    pub fn linear_backoff(mut self, initial_delay: Duration, increment: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Linear { initial_delay, increment };
        self
    }

    pub fn exponential_backoff(mut self, initial_delay: Duration, base: f64) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base };
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.max_delay = max_delay;
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Retry/stop decisions for a bounded number of attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    config: RetryPolicyConfig,
}

impl RetryPolicy {
    /// Create a policy from a configuration
    pub fn new(config: RetryPolicyConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Policy configuration
    pub fn config(&self) -> &RetryPolicyConfig {
        &self.config
    }

    /// Upper bound on invocations for one dispatch
    pub fn max_invocations(&self) -> u32 {
        self.config.max_attempts.saturating_add(1)
    }

    /// Capped backoff delay following `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.config.backoff.calculate_delay(attempt).min(self.config.max_delay)
    }

    /// Decide what follows attempt `attempt` (0-based) ending in `outcome`
    ///
    /// Successes and non-retryable failures stop immediately. A retryable
    /// failure is retried while `attempt < max_attempts`, after the delay the
    /// failure suggests or, failing that, the backoff delay. Either is capped
    /// by `max_delay`.
    pub fn next_action<T, E>(&self, attempt: u32, outcome: &Result<T, E>) -> RetryAction
    where
        E: ErrorClassification,
    {
        let error = match outcome {
            Ok(_) => return RetryAction::Stop,
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= self.config.max_attempts {
            return RetryAction::Stop;
        }

        let delay = match error.retry_after() {
            Some(hint) => hint.min(self.config.max_delay),
            None => self.delay_for(attempt),
        };
        RetryAction::RetryAfter(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { config: RetryPolicyConfig::default() }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for backoff strategies and retry decisions

    use super::*;
    use crate::error::ErrorSeverity;

    #[derive(Debug)]
    struct TestFailure {
        retryable: bool,
        retry_after: Option<Duration>,
    }

    impl TestFailure {
        fn transient() -> Self {
            Self { retryable: true, retry_after: None }
        }

        fn permanent() -> Self {
            Self { retryable: false, retry_after: None }
        }
    }

    impl ErrorClassification for TestFailure {
        fn is_retryable(&self) -> bool {
            self.retryable
        }

        fn severity(&self) -> ErrorSeverity {
            ErrorSeverity::Warning
        }

        fn retry_after(&self) -> Option<Duration> {
            self.retry_after
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        let config = RetryPolicyConfig::builder()
            .max_attempts(max_attempts)
            .fixed_backoff(Duration::from_millis(100))
            .build()
            .expect("config");
        RetryPolicy::new(config).expect("policy")
    }

    #[test]
    fn test_backoff_strategy_fixed() {
        let strategy = BackoffStrategy::Fixed { delay: Duration::from_millis(100) };

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(5), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_strategy_linear() {
        let strategy = BackoffStrategy::Linear {
            initial_delay: Duration::from_millis(100),
            increment: Duration::from_millis(50),
        };

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(10), Duration::from_millis(600));
    }

    #[test]
    fn test_backoff_strategy_exponential() {
        let strategy =
            BackoffStrategy::Exponential { initial_delay: Duration::from_millis(100), base: 2.0 };

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(strategy.calculate_delay(4000), Duration::MAX);
    }

    #[test]
    fn test_exponential_base_validation() {
        let invalid = RetryPolicyConfig::builder()
            .exponential_backoff(Duration::from_millis(10), 0.5)
            .build();
        assert!(invalid.is_err());

        let nan = RetryPolicyConfig::builder()
            .exponential_backoff(Duration::from_millis(10), f64::NAN)
            .build();
        assert!(nan.is_err());
    }

    #[test]
    fn test_success_always_stops() {
        let policy = policy(3);
        let outcome: Result<&str, TestFailure> = Ok("payload");

        assert_eq!(policy.next_action(0, &outcome), RetryAction::Stop);
    }

    #[test]
    fn test_non_retryable_failure_stops_with_budget_left() {
        let policy = policy(5);
        let outcome: Result<(), _> = Err(TestFailure::permanent());

        assert_eq!(policy.next_action(0, &outcome), RetryAction::Stop);
    }

    #[test]
    fn test_retryable_failure_until_budget_exhausted() {
        let policy = policy(2);
        let outcome: Result<(), _> = Err(TestFailure::transient());

        assert_eq!(policy.next_action(0, &outcome), RetryAction::RetryAfter(Duration::from_millis(100)));
        assert_eq!(policy.next_action(1, &outcome), RetryAction::RetryAfter(Duration::from_millis(100)));
        assert_eq!(policy.next_action(2, &outcome), RetryAction::Stop);
        assert_eq!(policy.max_invocations(), 3);
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = policy(0);
        let outcome: Result<(), _> = Err(TestFailure::transient());

        assert_eq!(policy.next_action(0, &outcome), RetryAction::Stop);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryPolicyConfig::builder()
            .max_attempts(10)
            .exponential_backoff(Duration::from_millis(100), 10.0)
            .max_delay(Duration::from_secs(2))
            .build()
            .expect("config");
        let policy = RetryPolicy::new(config).expect("policy");
        let outcome: Result<(), _> = Err(TestFailure::transient());

        assert_eq!(policy.next_action(1, &outcome), RetryAction::RetryAfter(Duration::from_secs(1)));
        assert_eq!(policy.next_action(5, &outcome), RetryAction::RetryAfter(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(9), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_retry_matches_delay_for() {
        let config = RetryPolicyConfig::builder()
            .max_attempts(u32::MAX)
            .exponential_backoff(Duration::from_millis(100), 10.0)
            .max_delay(Duration::MAX)
            .build()
            .expect("config");
        let policy = RetryPolicy::new(config).expect("policy");
        let outcome: Result<(), _> = Err(TestFailure::transient());

        for attempt in [0, 3, 60] {
            assert_eq!(
                policy.next_action(attempt, &outcome),
                RetryAction::RetryAfter(policy.delay_for(attempt))
            );
        }
        assert_eq!(policy.delay_for(60), Duration::MAX);
        assert_eq!(policy.max_invocations(), u32::MAX);
    }

    #[test]
    fn test_server_hint_overrides_backoff_within_ceiling() {
        let policy = policy(3);
        let hinted: Result<(), _> =
            Err(TestFailure { retryable: true, retry_after: Some(Duration::from_secs(3)) });
        let excessive: Result<(), _> =
            Err(TestFailure { retryable: true, retry_after: Some(Duration::from_secs(3600)) });

        assert_eq!(policy.next_action(0, &hinted), RetryAction::RetryAfter(Duration::from_secs(3)));
        assert_eq!(policy.next_action(0, &excessive), RetryAction::RetryAfter(Duration::from_secs(30)));
    }

    #[test]
    fn test_decisions_are_deterministic() {
        let config = RetryPolicyConfig::builder()
            .max_attempts(4)
            .linear_backoff(Duration::from_millis(10), Duration::from_millis(10))
            .build()
            .expect("config");
        let policy = RetryPolicy::new(config).expect("policy");
        let outcome: Result<(), _> = Err(TestFailure::transient());

        for attempt in 0..4 {
            assert_eq!(policy.next_action(attempt, &outcome), policy.next_action(attempt, &outcome));
        }
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RetryPolicyConfig =
            serde_json::from_str(r#"{"max_attempts": 2}"#).expect("deserialize");

        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.backoff, BackoffStrategy::default());
        assert_eq!(config.max_delay, Duration::from_secs(30));

        let exponential: RetryPolicyConfig = serde_json::from_str(
            r#"{"max_attempts": 1, "backoff": {"kind": "exponential", "initial_delay": 50, "base": 2.0}}"#,
        )
        .expect("deserialize");
        assert_eq!(
            exponential.backoff,
            BackoffStrategy::Exponential { initial_delay: Duration::from_millis(50), base: 2.0 }
        );
    }

    #[test]
    fn test_negative_max_attempts_rejected_by_deserialization() {
        let result: Result<RetryPolicyConfig, _> = serde_json::from_str(r#"{"max_attempts": -1}"#);
        assert!(result.is_err());
    }
}
