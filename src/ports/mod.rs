//! Ports - Interfaces for the client's transports.
//!
//! The notification client depends only on these contracts. Adapters
//! implement them for Socket.IO, HTTP, and in-memory fakes.
//!
//! - `RealtimeConnector` / `RealtimeChannel` - bidirectional event channel
//! - `PollTransport` - periodic HTTP polling fallback

mod poll_transport;
mod realtime_channel;

pub use poll_transport::{PollError, PollResponse, PollTransport};
pub use realtime_channel::{
    ChannelEvent, ClientEvent, OpenedChannel, RealtimeChannel, RealtimeConnector,
    ReconnectPolicy, ServerEvent, TransportError,
};
