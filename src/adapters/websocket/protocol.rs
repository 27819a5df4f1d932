//! Engine.IO v4 / Socket.IO v5 framing over WebSocket text frames.
//!
//! Each WebSocket text frame carries one Engine.IO packet:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                  ping / pong
//! 4<socket.io packet>                                    message
//! ```
//!
//! A Socket.IO packet is a type digit, an optional `/namespace,`, an
//! optional numeric ack id and an optional JSON body:
//!
//! ```text
//! 40                         connect to "/"
//! 42["evento_pedido",{..}]   event
//! 44{"message":"denied"}     connect error
//! ```
//!
//! Binary attachments are not used by the POS backend and are rejected.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Default Socket.IO namespace.
pub const ROOT_NAMESPACE: &str = "/";

/// Errors decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty frame")]
    Empty,

    #[error("Unknown Engine.IO packet type '{0}'")]
    UnknownEngineType(char),

    #[error("Unknown Socket.IO packet type '{0}'")]
    UnknownSocketType(char),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Event packet without a name")]
    MissingEventName,

    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("Binary packets are not supported")]
    BinaryUnsupported,
}

/// Server handshake carried by the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<JsonValue>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<JsonValue>,
    },
    Ack {
        namespace: String,
        ack_id: Option<u64>,
        args: Vec<JsonValue>,
    },
    ConnectError {
        namespace: String,
        data: JsonValue,
    },
}

impl SocketPacket {
    /// `CONNECT` to the root namespace.
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: ROOT_NAMESPACE.to_string(),
            data: None,
        }
    }

    /// Event on the root namespace with at most one argument.
    pub fn event(name: impl Into<String>, data: Option<JsonValue>) -> Self {
        SocketPacket::Event {
            namespace: ROOT_NAMESPACE.to_string(),
            ack_id: None,
            name: name.into(),
            args: data.into_iter().collect(),
        }
    }
}

// ============================================
// Encoding
// ============================================

impl EnginePacket {
    /// Encodes into the text of a WebSocket frame.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }

    /// Decodes the text of a WebSocket frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => serde_json::from_str(rest)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::InvalidHandshake(e.to_string())),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => SocketPacket::decode(rest).map(EnginePacket::Message),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }
}

impl SocketPacket {
    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect { namespace, data } => {
                let mut out = format!("0{}", namespace_prefix(namespace));
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
            SocketPacket::Disconnect { namespace } => format!("1{}", namespace_prefix(namespace)),
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                let mut body = Vec::with_capacity(args.len() + 1);
                body.push(JsonValue::String(name.clone()));
                body.extend(args.iter().cloned());
                format!(
                    "2{}{}{}",
                    namespace_prefix(namespace),
                    ack_id.map(|id| id.to_string()).unwrap_or_default(),
                    JsonValue::Array(body)
                )
            }
            SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            } => format!(
                "3{}{}{}",
                namespace_prefix(namespace),
                ack_id.map(|id| id.to_string()).unwrap_or_default(),
                JsonValue::Array(args.clone())
            ),
            SocketPacket::ConnectError { namespace, data } => {
                format!("4{}{}", namespace_prefix(namespace), data)
            }
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::BinaryUnsupported);
        }

        let (namespace, rest) = split_namespace(rest);
        let (ack_id, body) = split_ack_id(rest);
        let json = parse_body(body)?;

        match kind {
            '0' => Ok(SocketPacket::Connect {
                namespace,
                data: json,
            }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut items = match json {
                    Some(JsonValue::Array(items)) => items.into_iter(),
                    _ => return Err(ProtocolError::MissingEventName),
                };
                let name = match items.next() {
                    Some(JsonValue::String(name)) => name,
                    _ => return Err(ProtocolError::MissingEventName),
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    args: items.collect(),
                })
            }
            '3' => Ok(SocketPacket::Ack {
                namespace,
                ack_id,
                args: match json {
                    Some(JsonValue::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                },
            }),
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: json.unwrap_or(JsonValue::Null),
            }),
            other => Err(ProtocolError::UnknownSocketType(other)),
        }
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == ROOT_NAMESPACE || namespace.is_empty() {
        String::new()
    } else {
        format!("{namespace},")
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(idx) => (rest[..idx].to_string(), &rest[idx + 1..]),
            None => (rest.to_string(), ""),
        }
    } else {
        (ROOT_NAMESPACE.to_string(), rest)
    }
}

fn split_ack_id(rest: &str) -> (Option<u64>, &str) {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, rest);
    }
    // Overlong ids are treated as absent rather than rejected
    (rest[..digits].parse().ok(), &rest[digits..])
}

fn parse_body(body: &str) -> Result<Option<JsonValue>, ProtocolError> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}
