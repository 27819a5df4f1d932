//! Scripted poll transport for testing.
//!
//! Returns queued responses in order; once the queue is empty every poll
//! yields an empty batch.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{PollError, PollResponse, PollTransport};

/// Poll transport returning pre-configured responses.
#[derive(Clone, Default)]
pub struct ScriptedPollTransport {
    responses: Arc<Mutex<VecDeque<Result<PollResponse, PollError>>>>,
    roles: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedPollTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful poll returning `events`.
    pub fn with_events(self, events: Vec<JsonValue>) -> Self {
        self.push(Ok(PollResponse::new(events)));
        self
    }

    /// Queues a failed poll.
    pub fn with_error(self, error: PollError) -> Self {
        self.push(Err(error));
        self
    }

    /// Simulated latency per poll.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues a response after construction.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn push(&self, response: Result<PollResponse, PollError>) {
        self.responses
            .lock()
            .expect("ScriptedPollTransport: responses lock poisoned")
            .push_back(response);
    }

    /// Polls started so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Roles requested, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn roles(&self) -> Vec<String> {
        self.roles
            .lock()
            .expect("ScriptedPollTransport: roles lock poisoned")
            .clone()
    }
}

#[async_trait]
impl PollTransport for ScriptedPollTransport {
    async fn poll(&self, role: &str) -> Result<PollResponse, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.roles
            .lock()
            .expect("ScriptedPollTransport: roles lock poisoned")
            .push(role.to_string());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        self.responses
            .lock()
            .expect("ScriptedPollTransport: responses lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(PollResponse::default()))
    }
}
