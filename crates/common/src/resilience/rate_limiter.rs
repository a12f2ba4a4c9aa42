//! Sliding-window rate limiting
//!
//! [`SlidingWindowLimiter`] admits at most `max_calls` calls within any
//! trailing `time_period`. Each admission records its instant; instants
//! older than the window are evicted from the front of a bounded deque
//! before every decision.
//!
//! The window is guarded by one mutex which is held only for the
//! purge/check/append sequence. Waiting for capacity happens outside the
//! guard through one of the [`pause`](super::pause) backends, so the same
//! algorithm serves tokio tasks ([`SlidingWindowLimiter::acquire`]) and
//! plain threads ([`SlidingWindowLimiter::acquire_blocking`]).
//!
//! Waiters are not queued. A caller arriving while another is asleep may
//! take the freed slot first; the rate bound holds regardless.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::pause::{pause, pause_blocking, Cancelled};
use crate::error::{ConfigError, ConfigResult};
use crate::utils::serde::duration_millis;

/// Configuration for a sliding-window limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum number of admissions inside one window
    pub max_calls: u32,
    /// Width of the trailing window
    #[serde(with = "duration_millis")]
    pub time_period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { max_calls: 1, time_period: Duration::from_secs(1) }
    }
}

impl RateLimiterConfig {
    /// Create a validated configuration
    pub fn new(max_calls: u32, time_period: Duration) -> ConfigResult<Self> {
        let config = Self { max_calls, time_period };
        config.validate()?;
        Ok(config)
    }

    /// `rps` calls per second
    pub fn per_second(rps: u32) -> ConfigResult<Self> {
        Self::new(rps, Duration::from_secs(1))
    }

    /// Create a new configuration builder
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_calls == 0 {
            return Err(ConfigError::invalid("max_calls must be greater than 0"));
        }
        if self.time_period.is_zero() {
            return Err(ConfigError::invalid("time_period must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for RateLimiterConfig
#[derive(Debug, Default)]
pub struct RateLimiterConfigBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterConfigBuilder {
    pub fn new() -> Self {
        Self { config: RateLimiterConfig::default() }
    }

    pub fn max_calls(mut self, max_calls: u32) -> Self {
        self.config.max_calls = max_calls;
        self
    }

    pub fn time_period(mut self, time_period: Duration) -> Self {
        self.config.time_period = time_period;
        self
    }

    pub fn build(self) -> ConfigResult<RateLimiterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Upper bound on the window's up-front allocation
const PREALLOCATED_STAMPS: usize = 1024;

/// Admission timestamps, oldest first
#[derive(Debug)]
struct Window {
    stamps: VecDeque<Instant>,
}

impl Window {
    fn with_capacity(max_calls: u32) -> Self {
        Self { stamps: VecDeque::with_capacity((max_calls as usize).min(PREALLOCATED_STAMPS)) }
    }

    /// Number of leading stamps that have left the window at `now`
    fn expired(&self, now: Instant, period: Duration) -> usize {
        self.stamps.partition_point(|&stamp| now.saturating_duration_since(stamp) >= period)
    }

    fn purge(&mut self, now: Instant, period: Duration) {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) < period {
                break;
            }
            self.stamps.pop_front();
        }
    }

    /// Wait until the stamp at `oldest` leaves the window
    fn wait_for(&self, oldest: usize, now: Instant, period: Duration) -> Duration {
        self.stamps
            .get(oldest)
            .map(|&stamp| period.saturating_sub(now.saturating_duration_since(stamp)))
            .unwrap_or(Duration::ZERO)
    }
}

/// Sliding-window rate limiter
///
/// Clones share the same window, so one limiter can pace every caller of a
/// client.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use apiq_common::resilience::{RateLimiterConfig, SlidingWindowLimiter};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = SlidingWindowLimiter::new(RateLimiterConfig::new(2, Duration::from_secs(1))?);
///
/// assert!(limiter.try_acquire().is_ok());
/// assert!(limiter.try_acquire().is_ok());
/// // Third call inside the same second has to wait
/// assert!(limiter.try_acquire().is_err());
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    window: Arc<Mutex<Window>>,
    clock: Arc<C>,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter on the system monotonic clock
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Validate raw parameters and create a limiter on the system clock
    pub fn try_new(max_calls: u32, time_period: Duration) -> ConfigResult<Self> {
        Ok(Self::new(RateLimiterConfig::new(max_calls, time_period)?))
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter reading time from `clock`
    ///
    /// `config` is expected to be validated; [`RateLimiterConfig::new`] and
    /// the builder both do so.
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Self {
        Self {
            window: Arc::new(Mutex::new(Window::with_capacity(config.max_calls))),
            clock: Arc::new(clock),
            config,
        }
    }

    /// Limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn lock_window(&self) -> MutexGuard<'_, Window> {
        match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Sliding window lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// How long a caller would have to wait right now
    ///
    /// Pure query: nothing is purged or recorded. Returns zero while fewer
    /// than `max_calls` admissions lie inside the window.
    pub fn time_until_ready(&self) -> Duration {
        let window = self.lock_window();
        let now = self.clock.now();
        let period = self.config.time_period;

        let expired = window.expired(now, period);
        let live = window.stamps.len() - expired;
        if live < self.config.max_calls as usize {
            return Duration::ZERO;
        }
        window.wait_for(expired, now, period)
    }

    /// Number of admissions currently inside the window
    pub fn in_flight_window(&self) -> usize {
        let window = self.lock_window();
        let now = self.clock.now();
        window.stamps.len() - window.expired(now, self.config.time_period)
    }

    /// Single check-and-record step
    ///
    /// Records an admission and returns `Ok(())` when capacity is free,
    /// otherwise returns the time until the oldest admission leaves the
    /// window. Never suspends.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut window = self.lock_window();
        let now = self.clock.now();
        let period = self.config.time_period;

        window.purge(now, period);
        if window.stamps.len() < self.config.max_calls as usize {
            window.stamps.push_back(now);
            trace!(in_window = window.stamps.len(), "admission recorded");
            return Ok(());
        }

        Err(window.wait_for(0, now, period))
    }

    /// Wait (tokio) until admission is recorded
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Wait (tokio) until admission is recorded or `token` is cancelled
    ///
    /// A cancelled wait records nothing.
    pub async fn acquire_cancellable(&self, token: &CancellationToken) -> Result<(), Cancelled> {
        loop {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
                    pause(wait, token).await?;
                }
            }
        }
    }

    /// Block the calling thread until admission is recorded
    pub fn acquire_blocking(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, blocking");
                    std::thread::sleep(wait);
                }
            }
        }
    }

    /// Block the calling thread until admission is recorded or `token` is
    /// cancelled
    pub fn acquire_blocking_cancellable(&self, token: &CancellationToken) -> Result<(), Cancelled> {
        loop {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, blocking");
                    pause_blocking(wait, token)?;
                }
            }
        }
    }
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            window: Arc::clone(&self.window),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> std::fmt::Debug for SlidingWindowLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter").field("config", &self.config).finish_non_exhaustive()
    }
}
