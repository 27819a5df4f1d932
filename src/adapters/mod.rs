//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the client to the POS backend:
//! - `websocket` - Socket.IO real-time channel over `tokio-tungstenite`
//! - `http` - polling endpoint over `reqwest`
//! - `testing` - in-memory transports for tests

pub mod http;
pub mod testing;
pub mod websocket;

pub use http::HttpPollTransport;
pub use testing::{FakeChannelHandle, FakeRealtimeConnector, ScriptedPollTransport};
pub use websocket::{SocketIoConfig, SocketIoConnector};
