//! Async dispatcher
//!
//! Every attempt, retries included, first waits for limiter admission, then
//! invokes the transport, then asks the retry policy what to do with the
//! outcome. The limiter guard is never held across the invocation or any
//! sleep.

use std::sync::Arc;

use apiq_common::resilience::pause;
use apiq_common::{
    Clock, ConfigResult, RateLimiterConfig, RetryPolicy, RetryPolicyConfig, SlidingWindowLimiter,
    SystemClock,
};
use apiq_domain::CallDescriptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::state::{DispatchError, DispatchState, Step};
use crate::transport::Transport;

/// Rate-limited, retrying executor for one [`Transport`]
pub struct Dispatcher<T, C: Clock = SystemClock> {
    transport: Arc<T>,
    limiter: SlidingWindowLimiter<C>,
    policy: RetryPolicy,
}

impl<T: Transport> Dispatcher<T> {
    /// Create a dispatcher on the system clock
    pub fn new(
        transport: T,
        limiter_config: RateLimiterConfig,
        retry_config: RetryPolicyConfig,
    ) -> ConfigResult<Self> {
        Self::with_clock(transport, limiter_config, retry_config, SystemClock)
    }
}

impl<T: Transport, C: Clock> Dispatcher<T, C> {
    /// Create a dispatcher whose limiter reads time from `clock`
    pub fn with_clock(
        transport: T,
        limiter_config: RateLimiterConfig,
        retry_config: RetryPolicyConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        limiter_config.validate()?;
        let policy = RetryPolicy::new(retry_config)?;
        let limiter = SlidingWindowLimiter::with_clock(limiter_config, clock);
        Ok(Self::from_parts(Arc::new(transport), limiter, policy))
    }

    /// Assemble a dispatcher from existing parts
    ///
    /// Dispatchers built from clones of one limiter share its rate bound.
    pub fn from_parts(
        transport: Arc<T>,
        limiter: SlidingWindowLimiter<C>,
        policy: RetryPolicy,
    ) -> Self {
        Self { transport, limiter, policy }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn limiter(&self) -> &SlidingWindowLimiter<C> {
        &self.limiter
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` to exactly one terminal outcome
    pub async fn dispatch(&self, call: &CallDescriptor) -> Result<T::Payload, DispatchError> {
        self.dispatch_cancellable(call, &CancellationToken::new()).await
    }

    /// Run `call` to exactly one terminal outcome, aborting when `token`
    /// fires
    ///
    /// Cancellation interrupts limiter waits, retry delays and an in-flight
    /// invocation alike. No invocation starts after the token has fired.
    #[instrument(skip_all, fields(method = %call.method, path = %call.path))]
    pub async fn dispatch_cancellable(
        &self,
        call: &CallDescriptor,
        token: &CancellationToken,
    ) -> Result<T::Payload, DispatchError> {
        let mut state = DispatchState::new();

        loop {
            if self.limiter.acquire_cancellable(token).await.is_err() {
                return Err(state.cancelled_waiting());
            }
            // Admission can race the token; never start an invocation after it fired.
            if token.is_cancelled() {
                return Err(state.cancelled_waiting());
            }
            debug!(
                attempt = state.attempt(),
                max_invocations = self.policy.max_invocations(),
                "admitted"
            );

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(state.cancelled_invoking()),
                outcome = self.transport.invoke(call) => outcome,
            };

            match state.advance(&self.policy, outcome) {
                Step::Done(result) => return result,
                Step::Retry(delay) => {
                    if pause(delay, token).await.is_err() {
                        return Err(state.cancelled_waiting());
                    }
                }
            }
        }
    }
}

impl<T, C: Clock> std::fmt::Debug for Dispatcher<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
