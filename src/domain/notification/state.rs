//! Connection state of a notification client.

use serde::Serialize;
use std::fmt;

/// Transport the client is currently using.
///
/// Exactly one state holds at a time. A short overlap of real-time and
/// polling is tolerated while failing over; [`ClientState::connection_state`]
/// reports real-time in that window since it supersedes polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport active.
    Disconnected,
    /// Real-time channel opened, waiting for the handshake.
    ConnectingRealtime,
    /// Events arrive over the real-time channel.
    RealtimeActive,
    /// Events arrive via periodic HTTP polling.
    PollingActive,
}

impl ConnectionState {
    /// Whether any transport delivers events in this state.
    pub fn is_receiving(&self) -> bool {
        matches!(
            self,
            ConnectionState::RealtimeActive | ConnectionState::PollingActive
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::ConnectingRealtime => "connecting_realtime",
            ConnectionState::RealtimeActive => "realtime_active",
            ConnectionState::PollingActive => "polling_active",
        };
        f.write_str(s)
    }
}

/// Read-only snapshot returned by `NotificationClient::state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientState {
    pub realtime_active: bool,
    pub polling_active: bool,
    /// Real-time channel opened but not yet confirmed.
    #[serde(skip)]
    pub connecting: bool,
    pub role: String,
    pub user_id: Option<i64>,
}

impl ClientState {
    /// Collapses the flags into a single [`ConnectionState`].
    pub fn connection_state(&self) -> ConnectionState {
        if self.realtime_active {
            ConnectionState::RealtimeActive
        } else if self.polling_active {
            ConnectionState::PollingActive
        } else if self.connecting {
            ConnectionState::ConnectingRealtime
        } else {
            ConnectionState::Disconnected
        }
    }
}
