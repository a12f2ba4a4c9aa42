//! Shared test helpers for `apiq-core` integration tests.
//!
//! [`ScriptedTransport`] replays a queue of outcomes and records when each
//! invocation started, so tests can check pacing against the rate bound.

use std::collections::VecDeque;
use std::sync::Mutex;

use apiq_core::Transport;
use apiq_domain::{CallDescriptor, CallOutcome};
use async_trait::async_trait;
use tokio::time::Instant;

/// Replays scripted outcomes; once the script runs out every call succeeds
/// with its path
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<CallOutcome<String>>>,
    started: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<CallOutcome<String>>) -> Self {
        Self { script: Mutex::new(script.into()), started: Mutex::default() }
    }

    /// Start instants of every invocation so far
    pub fn started(&self) -> Vec<Instant> {
        self.started.lock().expect("started lock").clone()
    }

    pub fn invocations(&self) -> usize {
        self.started.lock().expect("started lock").len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Payload = String;

    async fn invoke(&self, call: &CallDescriptor) -> CallOutcome<String> {
        self.started.lock().expect("started lock").push(Instant::now());
        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| Ok(call.path.clone()))
    }
}

/// Panics if more than `max` of `instants` fall in any window of `period`
pub fn assert_paced(mut instants: Vec<Instant>, max: usize, period: std::time::Duration) {
    instants.sort();
    for (i, start) in instants.iter().enumerate() {
        let in_window =
            instants[i..].iter().take_while(|&&t| t.duration_since(*start) < period).count();
        assert!(in_window <= max, "{in_window} invocations within {period:?} (max {max})");
    }
}
