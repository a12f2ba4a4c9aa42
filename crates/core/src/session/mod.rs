//! Client sessions
//!
//! A [`ClientSession`] owns the dispatcher of one logical API client and the
//! lifecycle of its transport. Calls are accepted only between
//! [`start`](ClientSession::start) and [`stop`](ClientSession::stop);
//! stopping cancels every dispatch still in flight and then releases the
//! transport's resource.
//!
//! # Example
//!
//! ```no_run
//! use apiq_core::{ClientSession, SessionError, Transport};
//! use apiq_domain::{CallDescriptor, ClientConfig};
//!
//! # async fn example<T: Transport>(transport: T) -> Result<(), SessionError> {
//! let config = ClientConfig::new("https://api.example.com").with_rps(1).with_retries(2);
//! let session = ClientSession::from_config(transport, &config)?;
//!
//! let result = session
//!     .scoped(|session| async move { session.dispatch(&CallDescriptor::get("/status")).await })
//!     .await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

mod error;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use apiq_common::{Clock, RateLimiterConfig, RetryPolicyConfig, SystemClock};
use apiq_domain::{CallDescriptor, ClientConfig};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use self::error::{SessionError, SessionResult};
use crate::dispatch::{DispatchError, Dispatcher};
use crate::transport::Transport;

/// Lifecycle stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Stopped => write!(f, "stopped"),
        }
    }
}

struct State {
    status: SessionStatus,
    cancellation: CancellationToken,
}

struct Inner<T, C: Clock> {
    dispatcher: Dispatcher<T, C>,
    /// Serialises start/stop, which await the transport
    lifecycle: tokio::sync::Mutex<()>,
    state: Mutex<State>,
}

/// Scoped owner of one dispatcher and its transport
///
/// Cloning is cheap; clones share the dispatcher, the rate limit and the
/// lifecycle.
pub struct ClientSession<T, C: Clock = SystemClock> {
    inner: Arc<Inner<T, C>>,
}

impl<T: Transport> ClientSession<T> {
    /// Create a session on the system clock
    pub fn new(
        transport: T,
        limiter_config: RateLimiterConfig,
        retry_config: RetryPolicyConfig,
    ) -> SessionResult<Self> {
        Ok(Self::from_dispatcher(Dispatcher::new(transport, limiter_config, retry_config)?))
    }

    /// Create a session from the rate limit and retry sections of `config`
    pub fn from_config(transport: T, config: &ClientConfig) -> SessionResult<Self> {
        Self::new(transport, config.rate_limit, config.retry)
    }
}

impl<T: Transport, C: Clock> ClientSession<T, C> {
    pub fn with_clock(
        transport: T,
        limiter_config: RateLimiterConfig,
        retry_config: RetryPolicyConfig,
        clock: C,
    ) -> SessionResult<Self> {
        let dispatcher = Dispatcher::with_clock(transport, limiter_config, retry_config, clock)?;
        Ok(Self::from_dispatcher(dispatcher))
    }

    pub fn from_dispatcher(dispatcher: Dispatcher<T, C>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher,
                lifecycle: tokio::sync::Mutex::new(()),
                state: Mutex::new(State {
                    status: SessionStatus::Created,
                    cancellation: CancellationToken::new(),
                }),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T, C> {
        &self.inner.dispatcher
    }

    pub fn transport(&self) -> &Arc<T> {
        self.inner.dispatcher.transport()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    /// Time until the limiter would admit another call
    pub fn time_until_ready(&self) -> Duration {
        self.inner.dispatcher.limiter().time_until_ready()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Open the transport and begin accepting calls
    ///
    /// A stopped session may be started again.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyRunning`] if the session is running,
    /// [`SessionError::Open`] if the transport cannot open. The status is
    /// unchanged on error.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SessionResult<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.status() == SessionStatus::Running {
            return Err(SessionError::AlreadyRunning);
        }

        self.transport().open().await.map_err(SessionError::Open)?;

        let mut state = self.lock_state();
        state.cancellation = CancellationToken::new();
        state.status = SessionStatus::Running;
        info!("session started");
        Ok(())
    }

    /// Cancel in-flight dispatches, then close the transport
    ///
    /// # Errors
    ///
    /// [`SessionError::NotRunning`] if the session is not running.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SessionResult<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        {
            let mut state = self.lock_state();
            if state.status != SessionStatus::Running {
                return Err(SessionError::NotRunning);
            }
            state.cancellation.cancel();
            state.status = SessionStatus::Stopped;
        }

        self.transport().close().await;
        info!("session stopped");
        Ok(())
    }

    /// Start the session, run `body`, then stop the session
    ///
    /// The session is stopped however `body` ends, including by panic
    /// (which is resumed after the transport is closed). `body`'s own
    /// result is returned untouched.
    pub async fn scoped<F, Fut, R>(&self, body: F) -> SessionResult<R>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = R>,
    {
        self.start().await?;
        let outcome = AssertUnwindSafe(body(self.clone())).catch_unwind().await;

        if let Err(err) = self.stop().await {
            debug!(error = %err, "session already stopped inside scope");
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Dispatch one call through the session's limiter and retry policy
    ///
    /// # Errors
    ///
    /// [`DispatchError::SessionNotRunning`] outside `start`/`stop`, and
    /// [`DispatchError::Cancelled`] if the session stops mid-dispatch.
    pub async fn dispatch(&self, call: &CallDescriptor) -> Result<T::Payload, DispatchError> {
        let token = {
            let state = self.lock_state();
            if state.status != SessionStatus::Running {
                return Err(DispatchError::SessionNotRunning);
            }
            state.cancellation.child_token()
        };

        self.inner.dispatcher.dispatch_cancellable(call, &token).await
    }
}

impl<T, C: Clock> Clone for ClientSession<T, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T, C: Clock> fmt::Debug for ClientSession<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("dispatcher", &self.inner.dispatcher)
            .finish_non_exhaustive()
    }
}
