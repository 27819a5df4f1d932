//! Socket.IO connector - `RealtimeConnector` over `tokio-tungstenite`.
//!
//! `open()` spawns one background task per channel that:
//! 1. Connects to `{base}/socket.io/?EIO=4&transport=websocket`
//! 2. Completes the Engine.IO open and Socket.IO namespace handshake
//! 3. Pumps frames both ways, answering server heartbeats
//! 4. Reconnects with the configured [`ReconnectPolicy`] when the
//!    connection drops or an attempt fails
//!
//! Messages emitted before the first handshake are buffered and flushed
//! once it completes. After that, messages emitted while the connection
//! is down are dropped; the session a reconnect opens starts clean.

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use secrecy::{ExposeSecret, Secret};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::ports::{
    ChannelEvent, ClientEvent, OpenedChannel, RealtimeChannel, RealtimeConnector,
    ReconnectPolicy, TransportError,
};

use super::messages;
use super::protocol::{EnginePacket, Handshake, SocketPacket, ROOT_NAMESPACE};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Engine.IO path on the backend.
const SOCKET_IO_PATH: &str = "/socket.io/";

/// Configuration for [`SocketIoConnector`].
#[derive(Debug, Clone)]
pub struct SocketIoConfig {
    /// HTTP(S) base URL of the backend.
    pub base_url: Url,
    /// Session cookie sent on the upgrade request.
    session_cookie: Option<Secret<String>>,
    /// Retry behaviour after failures.
    pub reconnect: ReconnectPolicy,
    /// Bound on the WebSocket plus Socket.IO handshake.
    pub handshake_timeout: Duration,
}

impl SocketIoConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session_cookie: None,
            reconnect: ReconnectPolicy::default(),
            handshake_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the session cookie (`name=value`).
    pub fn with_session_cookie(mut self, cookie: Secret<String>) -> Self {
        self.session_cookie = Some(cookie);
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// WebSocket URL of the Engine.IO endpoint.
    pub fn endpoint(&self) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::Unavailable(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::Unavailable("cannot derive WebSocket URL".into()))?;
        url.set_path(SOCKET_IO_PATH);
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }
}

/// Opens Socket.IO channels to the POS backend.
pub struct SocketIoConnector {
    config: SocketIoConfig,
}

impl SocketIoConnector {
    pub fn new(config: SocketIoConfig) -> Self {
        Self { config }
    }
}

impl RealtimeConnector for SocketIoConnector {
    fn open(&self) -> Result<OpenedChannel, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TransportError::Unavailable("no Tokio runtime".into()))?;
        let endpoint = self.config.endpoint()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = ChannelTask {
            endpoint,
            session_cookie: self.config.session_cookie.clone(),
            reconnect: self.config.reconnect.clone(),
            handshake_timeout: self.config.handshake_timeout,
            commands: cmd_rx,
            events: event_tx,
            pending: VecDeque::new(),
            connected_once: false,
        };
        runtime.spawn(task.run());

        Ok(OpenedChannel {
            channel: Arc::new(SocketIoChannel {
                commands: cmd_tx,
                closed: AtomicBool::new(false),
            }),
            events: event_rx,
        })
    }
}

// ============================================
// Channel handle
// ============================================

enum Command {
    Send(String),
    Close,
}

struct SocketIoChannel {
    commands: mpsc::UnboundedSender<Command>,
    closed: AtomicBool,
}

impl RealtimeChannel for SocketIoChannel {
    fn emit(&self, event: ClientEvent) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let packet =
            messages::to_packet(&event).map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.commands
            .send(Command::Send(EnginePacket::Message(packet).encode()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Close);
        }
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================
// Background task
// ============================================

enum SessionEnd {
    /// Closed on request, or nobody listens anymore.
    Closed,
    /// Connection lost; reconnect per policy.
    Dropped(String),
}

struct ChannelTask {
    endpoint: Url,
    session_cookie: Option<Secret<String>>,
    reconnect: ReconnectPolicy,
    handshake_timeout: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    pending: VecDeque<String>,
    connected_once: bool,
}

impl ChannelTask {
    async fn run(mut self) {
        let mut attempt = 0u32;
        loop {
            let Some(result) = self.connect_or_close().await else {
                tracing::debug!("Socket.IO channel closed before connecting");
                return;
            };

            match result {
                Ok((ws, handshake)) => {
                    attempt = 0;
                    self.connected_once = true;
                    tracing::debug!(sid = %handshake.sid, "Socket.IO connected");
                    if !self.notify(ChannelEvent::Connected) {
                        return;
                    }
                    match self.run_session(ws, &handshake).await {
                        SessionEnd::Closed => return,
                        SessionEnd::Dropped(reason) => {
                            tracing::warn!("Socket.IO connection lost: {}", reason);
                            if !self.notify(ChannelEvent::Disconnected(reason)) {
                                return;
                            }
                        }
                    }
                }
                Err(TransportError::Unauthorized) => {
                    tracing::error!("Socket.IO handshake rejected: session unauthorized");
                    self.notify(ChannelEvent::Unauthorized);
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, "Socket.IO connect failed: {}", e);
                    if !self.notify(ChannelEvent::ConnectError(e.to_string())) {
                        return;
                    }
                }
            }

            attempt += 1;
            let Some(delay) = self.reconnect.delay_for(attempt) else {
                self.notify(ChannelEvent::ReconnectFailed {
                    attempts: attempt - 1,
                });
                return;
            };
            if !self.notify(ChannelEvent::Reconnecting { attempt, delay }) {
                return;
            }
            if !self.backoff(delay).await {
                return;
            }
        }
    }

    /// Returns false when the receiving side is gone.
    fn notify(&self, event: ChannelEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Keeps `text` for the first session; drops it while reconnecting.
    fn hold(&mut self, text: String) {
        if self.connected_once {
            tracing::debug!("Dropping Socket.IO message emitted while disconnected");
        } else {
            self.pending.push_back(text);
        }
    }

    /// Runs one connection attempt while honouring `close()`.
    async fn connect_or_close(
        &mut self,
    ) -> Option<Result<(WsStream, Handshake), TransportError>> {
        let endpoint = self.endpoint.clone();
        let session_cookie = self.session_cookie.clone();
        let connect = time::timeout(
            self.handshake_timeout,
            establish(&endpoint, session_cookie.as_ref()),
        );
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => {
                    return Some(result.unwrap_or_else(|_| {
                        Err(TransportError::Connect("handshake timed out".into()))
                    }));
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => self.hold(text),
                    Some(Command::Close) | None => return None,
                },
            }
        }
    }

    /// Sleeps for `delay`; returns false if closed meanwhile.
    async fn backoff(&mut self, delay: Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => self.hold(text),
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    async fn run_session(&mut self, ws: WsStream, handshake: &Handshake) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        while let Some(text) = self.pending.pop_front() {
            if let Err(e) = sink.send(Message::Text(text)).await {
                return SessionEnd::Dropped(e.to_string());
            }
        }

        // Server pings every ping_interval; silence past interval + timeout means dead
        let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
        let check_liveness = !liveness.is_zero();
        let mut deadline = Instant::now() + liveness;

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .unwrap_or_else(|| "closed by server".to_string());
                            return SessionEnd::Dropped(reason);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                        None => return SessionEnd::Dropped("stream ended".to_string()),
                    };
                    deadline = Instant::now() + liveness;

                    match EnginePacket::decode(&text) {
                        Ok(EnginePacket::Ping(data)) => {
                            if let Err(e) = sink.send(Message::Text(EnginePacket::Pong(data).encode())).await {
                                return SessionEnd::Dropped(e.to_string());
                            }
                        }
                        Ok(EnginePacket::Message(SocketPacket::Event { name, args, .. })) => {
                            let event = messages::from_event(&name, args);
                            if !self.notify(ChannelEvent::Message(event)) {
                                return SessionEnd::Closed;
                            }
                        }
                        Ok(EnginePacket::Message(SocketPacket::Disconnect { .. })) => {
                            return SessionEnd::Dropped("server disconnected namespace".to_string());
                        }
                        Ok(EnginePacket::Close) => {
                            return SessionEnd::Dropped("server closed transport".to_string());
                        }
                        Ok(EnginePacket::Message(SocketPacket::ConnectError { data, .. })) => {
                            if !self.notify(ChannelEvent::Error(data.to_string())) {
                                return SessionEnd::Closed;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Dropping malformed Socket.IO frame: {}", e);
                            if !self.notify(ChannelEvent::Error(e.to_string())) {
                                return SessionEnd::Closed;
                            }
                        }
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            return SessionEnd::Dropped(e.to_string());
                        }
                    }
                    Some(Command::Close) | None => {
                        let goodbye = EnginePacket::Message(SocketPacket::Disconnect {
                            namespace: ROOT_NAMESPACE.to_string(),
                        });
                        let _ = sink.send(Message::Text(goodbye.encode())).await;
                        let _ = sink.close().await;
                        return SessionEnd::Closed;
                    }
                },
                _ = time::sleep_until(deadline), if check_liveness => {
                    return SessionEnd::Dropped("heartbeat timeout".to_string());
                }
            }
        }
    }
}

/// WebSocket connect plus Engine.IO open plus namespace connect.
async fn establish(
    endpoint: &Url,
    session_cookie: Option<&Secret<String>>,
) -> Result<(WsStream, Handshake), TransportError> {
    let mut request = endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    if let Some(cookie) = session_cookie {
        let value = http::HeaderValue::from_str(cookie.expose_secret())
            .map_err(|_| TransportError::Connect("invalid session cookie".into()))?;
        request.headers_mut().insert(http::header::COOKIE, value);
    }

    let (mut ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(map_connect_error)?;

    let handshake = loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Open(handshake) => break handshake,
            EnginePacket::Noop => continue,
            other => {
                return Err(TransportError::Protocol(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
        }
    };

    send_text(&mut ws, EnginePacket::Message(SocketPacket::connect()).encode()).await?;

    loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Message(SocketPacket::Connect { .. }) => break,
            EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                return Err(if is_unauthorized(&data) {
                    TransportError::Unauthorized
                } else {
                    TransportError::Connect(format!("namespace rejected: {data}"))
                });
            }
            EnginePacket::Ping(data) => {
                send_text(&mut ws, EnginePacket::Pong(data).encode()).await?;
            }
            _ => continue,
        }
    }

    Ok((ws, handshake))
}

async fn next_packet(ws: &mut WsStream) -> Result<EnginePacket, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return EnginePacket::decode(&text)
                    .map_err(|e| TransportError::Protocol(e.to_string()))
            }
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}

async fn send_text(ws: &mut WsStream, text: String) -> Result<(), TransportError> {
    ws.send(Message::Text(text))
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))
}

fn map_connect_error(error: tungstenite::Error) -> TransportError {
    match error {
        tungstenite::Error::Http(response)
            if response.status() == http::StatusCode::UNAUTHORIZED =>
        {
            TransportError::Unauthorized
        }
        other => TransportError::Connect(other.to_string()),
    }
}

fn is_unauthorized(data: &serde_json::Value) -> bool {
    data.get("message")
        .and_then(serde_json::Value::as_str)
        .map(|m| {
            let m = m.to_ascii_lowercase();
            m.contains("unauthorized") || m.contains("no autorizado")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(base: &str) -> SocketIoConfig {
        SocketIoConfig::new(Url::parse(base).unwrap())
    }

    #[test]
    fn endpoint_switches_to_ws_scheme() {
        let url = config("http://localhost:5000").endpoint().unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn endpoint_uses_wss_for_https() {
        let url = config("https://pos.example.com/app").endpoint().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/socket.io/");
    }

    #[test]
    fn default_config_uses_default_policy() {
        let config = config("http://localhost:5000");
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn unauthorized_connect_errors_are_recognised() {
        assert!(is_unauthorized(&json!({"message": "Unauthorized"})));
        assert!(is_unauthorized(&json!({"message": "No autorizado"})));
        assert!(!is_unauthorized(&json!({"message": "Invalid namespace"})));
        assert!(!is_unauthorized(&json!(null)));
    }

    #[test]
    fn open_outside_runtime_is_unavailable() {
        let connector = SocketIoConnector::new(config("http://localhost:5000"));
        assert!(matches!(
            connector.open(),
            Err(TransportError::Unavailable(_))
        ));
    }

    #[test]
    fn only_messages_before_first_connect_are_held() {
        let (_cmd_tx, commands) = mpsc::unbounded_channel();
        let (events, _event_rx) = mpsc::unbounded_channel();
        let mut task = ChannelTask {
            endpoint: config("http://localhost:5000").endpoint().unwrap(),
            session_cookie: None,
            reconnect: ReconnectPolicy::default(),
            handshake_timeout: Duration::from_secs(1),
            commands,
            events,
            pending: VecDeque::new(),
            connected_once: false,
        };

        task.hold("42[\"suscribir_pedido\",{\"pedido_id\":1}]".to_string());
        assert_eq!(task.pending.len(), 1);

        task.pending.clear();
        task.connected_once = true;
        task.hold("42[\"suscribir_pedido\",{\"pedido_id\":2}]".to_string());
        assert!(task.pending.is_empty());
    }

    #[tokio::test]
    async fn emit_after_close_fails() {
        let connector = SocketIoConnector::new(
            config("http://127.0.0.1:9").with_reconnect_policy(ReconnectPolicy::disabled()),
        );
        let opened = connector.open().unwrap();
        opened.channel.close();
        assert_eq!(
            opened.channel.emit(ClientEvent::Ping),
            Err(TransportError::Closed)
        );
    }
}
