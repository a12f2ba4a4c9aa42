//! Suspend-for-duration backends
//!
//! The limiter and the dispatchers are written once against "wait this long,
//! unless cancelled". Two backends implement that wait: [`pause`] suspends a
//! tokio task, [`pause_blocking`] parks the calling thread. Both observe a
//! [`CancellationToken`].

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Longest uninterrupted thread sleep taken by [`pause_blocking`]
///
/// A parked thread cannot be woken by the token, so the wait is sliced and
/// the token is re-checked between slices.
pub const BLOCKING_SLICE: Duration = Duration::from_millis(10);

/// A wait was aborted by its cancellation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait cancelled")]
pub struct Cancelled;

/// Suspend the current task for `duration` or until `token` is cancelled
///
/// Returns immediately with `Err(Cancelled)` if the token was already
/// cancelled, even for a zero duration.
pub async fn pause(duration: Duration, token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Block the current thread for `duration` or until `token` is cancelled
///
/// Cancellation is noticed within [`BLOCKING_SLICE`]. A duration too large
/// to form a deadline (e.g. `Duration::MAX`) waits until cancelled.
pub fn pause_blocking(duration: Duration, token: &CancellationToken) -> Result<(), Cancelled> {
    let deadline = Instant::now().checked_add(duration);

    loop {
        if token.is_cancelled() {
            return Err(Cancelled);
        }
        let slice = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(());
                }
                remaining.min(BLOCKING_SLICE)
            }
            None => BLOCKING_SLICE,
        };
        std::thread::sleep(slice);
    }
}
