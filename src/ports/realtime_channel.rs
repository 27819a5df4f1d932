//! RealtimeChannel port - Interface for the bidirectional event channel.
//!
//! The notification client never talks to a socket directly. It asks a
//! [`RealtimeConnector`] to open a channel, then:
//! - sends [`ClientEvent`]s through the returned [`RealtimeChannel`]
//! - observes [`ChannelEvent`]s on the returned receiver
//!
//! Reconnection belongs to the channel implementation. The client only
//! watches the `Connected` / `Disconnected` transitions it reports.
//!
//! A client built without a connector behaves like a runtime that has no
//! real-time capability and goes straight to polling.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================
// Client → Server
// ============================================

/// Messages the client emits over the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Announces who is listening so the server can join role rooms.
    RegisterUser {
        user_id: Option<i64>,
        role: String,
        username: String,
    },
    /// Application keep-alive.
    Ping,
    /// Start receiving updates for one order.
    SubscribeOrder { order_id: i64 },
    /// Stop receiving updates for one order.
    UnsubscribeOrder { order_id: i64 },
}

// ============================================
// Server → Client
// ============================================

/// Application messages pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Registration acknowledged.
    ConnectionConfirmed(JsonValue),
    /// Order lifecycle event.
    OrderEvent(JsonValue),
    /// Stock alert.
    AlertEvent(JsonValue),
    /// Keep-alive answer.
    Pong(JsonValue),
    /// Order subscription acknowledged.
    OrderSubscribed(JsonValue),
    /// Order unsubscription acknowledged.
    OrderUnsubscribed(JsonValue),
    /// Error emitted by the server as an application event.
    Error(JsonValue),
    /// Event name the client does not know.
    Unknown { name: String, data: JsonValue },
}

/// Lifecycle and data notifications produced by an open channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Handshake completed (first connection or successful reconnect).
    Connected,
    /// A connection attempt failed.
    ConnectError(String),
    /// An established connection dropped.
    Disconnected(String),
    /// The channel will retry after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// The reconnection policy is exhausted; the channel is done.
    ReconnectFailed { attempts: u32 },
    /// The server rejected the session; the channel is done.
    Unauthorized,
    /// Application message.
    Message(ServerEvent),
    /// Transport-level error that did not close the channel.
    Error(String),
}

// ============================================
// Errors
// ============================================

/// Errors reported by real-time transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Real-time transport unavailable: {0}")]
    Unavailable(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Session rejected by server")]
    Unauthorized,

    #[error("Channel closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

// ============================================
// Reconnection Policy
// ============================================

/// Backoff applied by channel implementations between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    ///
    /// Default: 1 second
    pub initial_delay: Duration,

    /// Upper bound for any single delay.
    ///
    /// Default: 5 seconds
    pub max_delay: Duration,

    /// Attempts before giving up.
    ///
    /// Default: 10
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling then capped.
    /// Returns `None` once the attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

// ============================================
// Ports
// ============================================

/// Sending half of an open channel.
///
/// Sends are fire-and-forget: they queue the message and return.
pub trait RealtimeChannel: Send + Sync {
    /// Queue a message for the server.
    fn emit(&self, event: ClientEvent) -> Result<(), TransportError>;

    /// Close the channel and stop reconnecting. Idempotent.
    fn close(&self);
}

/// A freshly opened channel: its sender and its event stream.
pub struct OpenedChannel {
    pub channel: Arc<dyn RealtimeChannel>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Capability to open a real-time channel.
///
/// `open` returns immediately; the handshake happens in the background
/// and is reported as [`ChannelEvent::Connected`] or
/// [`ChannelEvent::ConnectError`].
pub trait RealtimeConnector: Send + Sync {
    fn open(&self) -> Result<OpenedChannel, TransportError>;
}
