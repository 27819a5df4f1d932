//! WebSocket adapters for the real-time notification channel.
//!
//! The POS backend speaks Socket.IO, so the channel is layered:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      NotificationClient                              │
//! │   ClientEvent ──emit──▶            ◀──ChannelEvent── events rx       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  SocketIoConnector (background task)                 │
//! │   - handshake, heartbeats, reconnect with backoff                   │
//! │   - messages: ClientEvent/ServerEvent ⇄ Socket.IO event names       │
//! │   - protocol: Engine.IO / Socket.IO packet codec                    │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     ▼
//!                        tokio-tungstenite WebSocket
//! ```
//!
//! # Components
//!
//! - [`protocol`] - Engine.IO v4 / Socket.IO packet codec
//! - [`messages`] - POS event names and payloads
//! - [`connector`] - `RealtimeConnector` implementation

pub mod connector;
pub mod messages;
pub mod protocol;

pub use connector::{SocketIoConfig, SocketIoConnector};
pub use protocol::{EnginePacket, Handshake, ProtocolError, SocketPacket};
