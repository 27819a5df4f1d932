//! PollTransport port - Interface for the polling fallback endpoint.
//!
//! One call fetches the events queued for a role since the backend last
//! trimmed its queue. The client calls it on a timer while the real-time
//! channel is unavailable.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Body of a successful poll.
///
/// Events stay as raw JSON so that one malformed entry can be dropped
/// without discarding the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub eventos: Vec<JsonValue>,
}

impl PollResponse {
    pub fn new(eventos: Vec<JsonValue>) -> Self {
        Self { eventos }
    }

    pub fn is_empty(&self) -> bool {
        self.eventos.is_empty()
    }
}

/// Errors from a poll request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The session is invalid or expired. Fatal for the client.
    #[error("Not authorized to receive notifications")]
    Unauthorized,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Poll request timed out")]
    Timeout,

    #[error("Invalid poll response: {0}")]
    Decode(String),
}

impl PollError {
    /// Whether the client must stop polling altogether.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PollError::Unauthorized)
    }
}

/// Port for fetching pending events over HTTP.
#[async_trait]
pub trait PollTransport: Send + Sync {
    /// Fetch pending events for `role`.
    async fn poll(&self, role: &str) -> Result<PollResponse, PollError>;
}
