//! Thread-blocking dispatcher
//!
//! Same admission, retry and cancellation rules as the async
//! [`Dispatcher`](super::Dispatcher), with waits served by parking the
//! calling thread. An invocation in progress cannot be interrupted; the
//! token is observed at every wait and before every invocation.
//!
//! The thread model has no session: [`BlockingDispatcher::scoped`] is its
//! lifecycle, opening the transport around one body and closing it on every
//! exit path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use apiq_common::resilience::pause_blocking;
use apiq_common::{
    Clock, ConfigResult, RateLimiterConfig, RetryPolicy, RetryPolicyConfig, SlidingWindowLimiter,
    SystemClock,
};
use apiq_domain::{CallDescriptor, Failure};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info};

use super::state::{DispatchError, DispatchState, Step};
use crate::transport::BlockingTransport;

/// Rate-limited, retrying executor for one [`BlockingTransport`]
pub struct BlockingDispatcher<T, C: Clock = SystemClock> {
    transport: Arc<T>,
    limiter: SlidingWindowLimiter<C>,
    policy: RetryPolicy,
}

impl<T: BlockingTransport> BlockingDispatcher<T> {
    pub fn new(
        transport: T,
        limiter_config: RateLimiterConfig,
        retry_config: RetryPolicyConfig,
    ) -> ConfigResult<Self> {
        Self::with_clock(transport, limiter_config, retry_config, SystemClock)
    }
}

impl<T: BlockingTransport, C: Clock> BlockingDispatcher<T, C> {
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

    /// Open the transport's resource
    pub fn open(&self) -> Result<(), Failure> {
        self.transport.open()
    }

    /// Close the transport's resource
    pub fn close(&self) {
        self.transport.close();
    }

    /// Open the transport, run `body`, then close the transport
    ///
    /// The transport is closed however `body` ends, including by panic
    /// (which is resumed after closing). `body` does not run if opening
    /// fails.
    pub fn scoped<R>(&self, body: impl FnOnce(&Self) -> R) -> Result<R, Failure> {
        self.open()?;
        info!("blocking dispatcher opened");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(self)));
        self.close();
        info!("blocking dispatcher closed");

        match outcome {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run `call` to exactly one terminal outcome
    pub fn dispatch(&self, call: &CallDescriptor) -> Result<T::Payload, DispatchError> {
        self.dispatch_cancellable(call, &CancellationToken::new())
    }

    /// Run `call` to exactly one terminal outcome, aborting at the next wait
    /// once `token` fires
    pub fn dispatch_cancellable(
        &self,
        call: &CallDescriptor,
        token: &CancellationToken,
    ) -> Result<T::Payload, DispatchError> {
        let span = debug_span!("dispatch_blocking", method = %call.method, path = %call.path);
        let _entered = span.enter();
        let mut state = DispatchState::new();

        loop {
            if self.limiter.acquire_blocking_cancellable(token).is_err() {
                return Err(state.cancelled_waiting());
            }
            if token.is_cancelled() {
                return Err(state.cancelled_waiting());
            }
            debug!(
                attempt = state.attempt(),
                max_invocations = self.policy.max_invocations(),
                "admitted"
            );

            let outcome = self.transport.invoke(call);

            match state.advance(&self.policy, outcome) {
                Step::Done(result) => return result,
                Step::Retry(delay) => {
                    if pause_blocking(delay, token).is_err() {
                        return Err(state.cancelled_waiting());
                    }
                }
            }
        }
    }
}

impl<T, C: Clock> std::fmt::Debug for BlockingDispatcher<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingDispatcher")
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
