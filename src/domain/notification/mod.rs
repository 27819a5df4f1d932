//! Notification domain - events, listeners and connection state.
//!
//! Contains the vocabulary shared by the client and its transports:
//! - `EventKind` / `EventCategory` - classification of backend events
//! - `NotificationEvent` - a classified event ready for dispatch
//! - `ListenerRegistry` - ordered, failure-isolated listeners per category
//! - `ConnectionState` / `ClientState` - transport status snapshot

mod event;
mod listeners;
mod state;

pub use event::{EventCategory, EventKind, NotificationEvent, TYPE_FIELD, TYPE_FIELD_ALIAS};
pub use listeners::{
    listener, DispatchReport, Listener, ListenerError, ListenerRegistry, ListenerResult,
};
pub use state::{ClientState, ConnectionState};

use thiserror::Error;

/// Reasons a raw backend payload cannot be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Event payload is not a JSON object")]
    NotAnObject,

    #[error("Event payload has no string 'tipo' field")]
    MissingType,
}
