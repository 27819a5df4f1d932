//! Notification event vocabulary.
//!
//! The POS backend pushes loosely-typed JSON objects whose `tipo` field
//! names what happened. This module classifies those objects into the
//! fixed categories that listeners subscribe to:
//!
//! | Raw type                                   | Category               |
//! |--------------------------------------------|------------------------|
//! | `nuevo_pedido`, `cambio_estado`,           | `order_event`          |
//! | `item_modificado`, `pedido_listo`,         |                        |
//! | `pedido_cancelado`                         |                        |
//! | `alerta_stock`                             | `alert_event`          |
//! | `conexion_confirmada` (channel lifecycle)  | `connection_confirmed` |
//! | `error` (channel lifecycle)                | `error`                |
//!
//! English aliases (`new_order`, `stock_alert`, ...) classify the same way.

use serde_json::Value as JsonValue;
use std::fmt;

use super::NotificationError;

/// Field carrying the event type in backend payloads.
pub const TYPE_FIELD: &str = "tipo";

/// Alternate type field accepted from newer producers.
pub const TYPE_FIELD_ALIAS: &str = "type";

// ============================================
// EventKind
// ============================================

/// What happened, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new order reached the kitchen.
    NewOrder,
    /// An order moved to another status.
    StatusChange,
    /// An item inside an order was edited.
    ItemModified,
    /// Items of an order are ready to be served.
    OrderReady,
    /// An order was cancelled.
    OrderCancelled,
    /// A product dropped below its stock threshold.
    StockAlert,
    /// Anything the client does not know how to classify.
    Other(String),
}

impl EventKind {
    /// Parses a raw type string. Unknown strings become [`EventKind::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "nuevo_pedido" | "new_order" => EventKind::NewOrder,
            "cambio_estado" | "status_change" => EventKind::StatusChange,
            "item_modificado" | "item_modified" => EventKind::ItemModified,
            "pedido_listo" | "order_ready" => EventKind::OrderReady,
            "pedido_cancelado" | "order_cancelled" => EventKind::OrderCancelled,
            "alerta_stock" | "stock_alert" => EventKind::StockAlert,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Wire name used by the backend.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::NewOrder => "nuevo_pedido",
            EventKind::StatusChange => "cambio_estado",
            EventKind::ItemModified => "item_modificado",
            EventKind::OrderReady => "pedido_listo",
            EventKind::OrderCancelled => "pedido_cancelado",
            EventKind::StockAlert => "alerta_stock",
            EventKind::Other(raw) => raw,
        }
    }

    /// Category this kind dispatches to, if it has a fixed one.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            EventKind::NewOrder
            | EventKind::StatusChange
            | EventKind::ItemModified
            | EventKind::OrderReady
            | EventKind::OrderCancelled => Some(EventCategory::Order),
            EventKind::StockAlert => Some(EventCategory::Alert),
            EventKind::Other(_) => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// EventCategory
// ============================================

/// Bucket that listeners subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Order lifecycle events.
    Order,
    /// Stock alerts.
    Alert,
    /// The server acknowledged the user registration on the channel.
    ConnectionConfirmed,
    /// Errors reported by the real-time channel.
    Error,
    /// Category registered dynamically by a consumer.
    Custom(String),
}

impl EventCategory {
    /// Categories that always exist on a fresh client.
    pub const BUILTIN: [EventCategory; 4] = [
        EventCategory::Order,
        EventCategory::Alert,
        EventCategory::ConnectionConfirmed,
        EventCategory::Error,
    ];

    /// Registry key for this category.
    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::Order => "order_event",
            EventCategory::Alert => "alert_event",
            EventCategory::ConnectionConfirmed => "connection_confirmed",
            EventCategory::Error => "error",
            EventCategory::Custom(name) => name,
        }
    }

    /// Inverse of [`EventCategory::as_str`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "order_event" => EventCategory::Order,
            "alert_event" => EventCategory::Alert,
            "connection_confirmed" => EventCategory::ConnectionConfirmed,
            "error" => EventCategory::Error,
            other => EventCategory::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventCategory {
    fn from(name: &str) -> Self {
        EventCategory::from_name(name)
    }
}

// ============================================
// NotificationEvent
// ============================================

/// A classified event ready for dispatch.
///
/// `payload` is the full object as received, including the type field.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub category: EventCategory,
    pub payload: JsonValue,
}

impl NotificationEvent {
    /// Classifies a raw backend object.
    ///
    /// Returns `Ok(None)` when the object is well formed but its type has
    /// no category, and an error when it is not an object or lacks a
    /// string type field.
    pub fn classify(payload: JsonValue) -> Result<Option<Self>, NotificationError> {
        let kind = EventKind::parse(raw_type(&payload)?);
        Ok(kind.category().map(|category| Self {
            kind,
            category,
            payload,
        }))
    }

    /// Classifies an object received under a channel event name that
    /// already implies a category. Unknown types keep the fallback.
    pub fn classify_with_fallback(
        payload: JsonValue,
        fallback: EventCategory,
    ) -> Self {
        let kind = match raw_type(&payload) {
            Ok(raw) => EventKind::parse(raw),
            Err(_) => EventKind::Other(String::new()),
        };
        let category = kind.category().unwrap_or(fallback);
        Self {
            kind,
            category,
            payload,
        }
    }

    /// Builds a lifecycle event (confirmation, error) that bypasses
    /// type classification.
    pub fn lifecycle(category: EventCategory, payload: JsonValue) -> Self {
        let kind = EventKind::Other(category.as_str().to_string());
        Self {
            kind,
            category,
            payload,
        }
    }

    /// Order identifier, from `pedido_id` or the nested `pedido.id`.
    pub fn order_id(&self) -> Option<i64> {
        self.payload
            .get("pedido_id")
            .and_then(JsonValue::as_i64)
            .or_else(|| {
                self.payload
                    .get("pedido")
                    .and_then(|p| p.get("id"))
                    .and_then(JsonValue::as_i64)
            })
    }

    /// Server timestamp, as sent (ISO-8601 without zone).
    pub fn timestamp(&self) -> Option<&str> {
        self.payload.get("timestamp").and_then(JsonValue::as_str)
    }
}

fn raw_type(payload: &JsonValue) -> Result<&str, NotificationError> {
    let object = payload
        .as_object()
        .ok_or(NotificationError::NotAnObject)?;
    object
        .get(TYPE_FIELD)
        .or_else(|| object.get(TYPE_FIELD_ALIAS))
        .and_then(JsonValue::as_str)
        .ok_or(NotificationError::MissingType)
}
