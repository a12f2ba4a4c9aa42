//! Per-dispatch state machine shared by both dispatchers

use std::time::Duration;

use apiq_common::{RetryAction, RetryPolicy};
use apiq_domain::{CallOutcome, Failure};
use thiserror::Error;
use tracing::{debug, warn};

/// Terminal outcome of a dispatch that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The last failure, after the retry budget or a terminal classification
    #[error("call failed after {attempts} attempt(s): {failure}")]
    Failed {
        #[source]
        failure: Failure,
        attempts: u32,
    },

    /// A cancellation token fired while waiting or invoking
    #[error("call cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("session is not running")]
    SessionNotRunning,
}

impl DispatchError {
    /// The surfaced failure, for [`DispatchError::Failed`]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            DispatchError::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn into_failure(self) -> Option<Failure> {
        match self {
            DispatchError::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Invocations started before the dispatch ended
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchError::Failed { attempts, .. } | DispatchError::Cancelled { attempts } => {
                *attempts
            }
            DispatchError::SessionNotRunning => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DispatchError::Cancelled { .. })
    }
}

/// What the dispatch loop does next
#[derive(Debug)]
pub(crate) enum Step<P> {
    Done(Result<P, DispatchError>),
    Retry(Duration),
}

/// Attempt counter and last failure of one dispatch
#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    attempt: u32,
    last_failure: Option<Failure>,
}

impl DispatchState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Index of the attempt about to be (or being) made, 0-based
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Fold the outcome of the current attempt into the state
    pub(crate) fn advance<P>(&mut self, policy: &RetryPolicy, outcome: CallOutcome<P>) -> Step<P> {
        let action = policy.next_action(self.attempt, &outcome);
        let failure = match outcome {
            Ok(payload) => {
                debug!(attempt = self.attempt, "call succeeded");
                return Step::Done(Ok(payload));
            }
            Err(failure) => failure,
        };

        match action {
            RetryAction::Stop => {
                debug!(attempt = self.attempt, error = %failure, "call failed, giving up");
                Step::Done(Err(DispatchError::Failed { failure, attempts: self.attempt + 1 }))
            }
            RetryAction::RetryAfter(delay) => {
                warn!(
                    attempt = self.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure,
                    "call failed, retrying"
                );
                self.last_failure = Some(failure);
                self.attempt += 1;
                Step::Retry(delay)
            }
        }
    }

    /// Cancelled before the current attempt was invoked, including after an
    /// admission that the token raced (the admission slot stays spent)
    pub(crate) fn cancelled_waiting(&self) -> DispatchError {
        self.log_cancel();
        DispatchError::Cancelled { attempts: self.attempt }
    }

    /// Cancelled while the current attempt was in flight; callers check the
    /// token before starting the invocation
    pub(crate) fn cancelled_invoking(&self) -> DispatchError {
        self.log_cancel();
        DispatchError::Cancelled { attempts: self.attempt + 1 }
    }

    fn log_cancel(&self) {
        match &self.last_failure {
            Some(failure) => debug!(attempt = self.attempt, last_error = %failure, "dispatch cancelled"),
            None => debug!(attempt = self.attempt, "dispatch cancelled"),
        }
    }
}
