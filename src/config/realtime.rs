//! Real-time channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::ports::ReconnectPolicy;

/// Socket.IO channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealtimeConfig {
    /// Use the real-time channel at all; `false` means polling only
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Delay before the first reconnect attempt
    #[serde(default = "default_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,

    /// Cap on the reconnect delay
    #[serde(default = "default_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Reconnect attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub reconnect_max_attempts: u32,
}

impl RealtimeConfig {
    /// Reconnect policy handed to the channel adapter.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }

    /// Validate real-time configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reconnect_initial_delay_ms == 0
            || self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms
        {
            return Err(ValidationError::InvalidReconnectDelays);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reconnect_initial_delay_ms: default_initial_delay_ms(),
            reconnect_max_delay_ms: default_max_delay_ms(),
            reconnect_max_attempts: default_max_attempts(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    10
}
