//! Application layer - the notification client.
//!
//! Coordinates the real-time and polling ports and dispatches classified
//! events to the listeners registered by the UI.

pub mod notification_client;

pub use notification_client::{ClientError, NotificationClient, NotificationClientBuilder};
