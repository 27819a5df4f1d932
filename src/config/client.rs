//! Notification client configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Identity and timing for one notification client.
///
/// Immutable once handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Role the events are scoped to (`mesero`, `cocinero`, `cajero`, `manager`)
    #[serde(default = "default_role")]
    pub role: String,

    /// Backend user id, if known
    #[serde(default)]
    pub user_id: Option<i64>,

    /// Display name announced to the server
    #[serde(default = "default_username")]
    pub username: String,

    /// Interval between poll requests while polling is the transport
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request poll timeout; defaults to the poll interval
    #[serde(default)]
    pub poll_timeout_ms: Option<u64>,

    /// Interval between keep-alive pings on the real-time channel
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// Promote lifecycle logs from debug to info
    #[serde(default)]
    pub debug: bool,
}

impl ClientConfig {
    /// Configuration for `role` with every other field defaulted.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }

    /// Sets the user identity announced on connect.
    pub fn with_user(mut self, user_id: i64, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = username.into();
        self
    }

    /// Sets the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = millis(interval);
        self
    }

    /// Sets the per-request poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = Some(millis(timeout));
        self
    }

    /// Sets the keep-alive interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval_ms = millis(interval);
        self
    }

    /// Enables verbose lifecycle logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Timeout applied to each poll request.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.unwrap_or(self.poll_interval_ms))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Validate client configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.role.trim().is_empty() {
            return Err(ValidationError::EmptyRole);
        }
        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.poll_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidPollTimeout);
        }
        if self.keepalive_interval_ms == 0 {
            return Err(ValidationError::InvalidKeepaliveInterval);
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            user_id: None,
            username: default_username(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: None,
            keepalive_interval_ms: default_keepalive_interval_ms(),
            debug: false,
        }
    }
}

fn default_role() -> String {
    "mesero".to_string()
}

fn default_username() -> String {
    "Usuario".to_string()
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_keepalive_interval_ms() -> u64 {
    30_000
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
