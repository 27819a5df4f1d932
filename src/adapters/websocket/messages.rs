//! Socket.IO event names exchanged with the POS backend.
//!
//! - Client → Server: `conectar_usuario`, `ping`, `suscribir_pedido`,
//!   `desuscribir_pedido`
//! - Server → Client: `conexion_confirmada`, `evento_pedido`,
//!   `evento_alerta`, `pong`, `suscripcion_confirmada`,
//!   `desuscripcion_confirmada`, `error`

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::ports::{ClientEvent, ServerEvent};

use super::protocol::SocketPacket;

// ============================================
// Client → Server
// ============================================

/// Payload of `conectar_usuario`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterUserPayload<'a> {
    pub usuario_id: Option<i64>,
    pub rol: &'a str,
    pub username: &'a str,
}

/// Payload of `suscribir_pedido` / `desuscribir_pedido`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrderPayload {
    pub pedido_id: i64,
}

/// Wire name of a client event.
pub fn client_event_name(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::RegisterUser { .. } => "conectar_usuario",
        ClientEvent::Ping => "ping",
        ClientEvent::SubscribeOrder { .. } => "suscribir_pedido",
        ClientEvent::UnsubscribeOrder { .. } => "desuscribir_pedido",
    }
}

/// Converts a client event into the Socket.IO packet to send.
pub fn to_packet(event: &ClientEvent) -> Result<SocketPacket, serde_json::Error> {
    let data = match event {
        ClientEvent::RegisterUser {
            user_id,
            role,
            username,
        } => Some(serde_json::to_value(RegisterUserPayload {
            usuario_id: *user_id,
            rol: role,
            username,
        })?),
        ClientEvent::Ping => None,
        ClientEvent::SubscribeOrder { order_id } | ClientEvent::UnsubscribeOrder { order_id } => {
            Some(serde_json::to_value(OrderPayload {
                pedido_id: *order_id,
            })?)
        }
    };
    Ok(SocketPacket::event(client_event_name(event), data))
}

// ============================================
// Server → Client
// ============================================

/// Maps a received event name and its first argument to a [`ServerEvent`].
pub fn from_event(name: &str, mut args: Vec<JsonValue>) -> ServerEvent {
    let data = if args.is_empty() {
        JsonValue::Null
    } else {
        args.swap_remove(0)
    };
    match name {
        "conexion_confirmada" => ServerEvent::ConnectionConfirmed(data),
        "evento_pedido" => ServerEvent::OrderEvent(data),
        "evento_alerta" => ServerEvent::AlertEvent(data),
        "pong" => ServerEvent::Pong(data),
        "suscripcion_confirmada" => ServerEvent::OrderSubscribed(data),
        "desuscripcion_confirmada" => ServerEvent::OrderUnsubscribed(data),
        "error" => ServerEvent::Error(data),
        other => ServerEvent::Unknown {
            name: other.to_string(),
            data,
        },
    }
}
