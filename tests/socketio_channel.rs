//! Integration tests for the Socket.IO connector.
//!
//! Each test runs a minimal Engine.IO v4 server on a local port with
//! `tokio-tungstenite` and scripts its side of the conversation.

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use comanda_notify::adapters::{ScriptedPollTransport, SocketIoConfig, SocketIoConnector};
use comanda_notify::config::ClientConfig;
use comanda_notify::domain::notification::{listener, EventCategory};
use comanda_notify::ports::{
    ChannelEvent, ClientEvent, RealtimeConnector, ReconnectPolicy, ServerEvent,
};
use comanda_notify::NotificationClient;

type ServerWs = WebSocketStream<TcpStream>;

const OPEN: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

// =============================================================================
// Test Infrastructure
// =============================================================================

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, Url::parse(&format!("http://{addr}")).unwrap())
}

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(50),
        max_attempts,
    }
}

/// Accepts one client and completes the Engine.IO and namespace handshake.
async fn accept_socketio(listener: &TcpListener) -> ServerWs {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(tcp).await.unwrap();

    ws.send(Message::Text(OPEN.to_string())).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "40");
    ws.send(Message::Text(r#"40{"sid":"sio-1"}"#.to_string()))
        .await
        .unwrap();
    ws
}

async fn next_text(ws: &mut ServerWs) -> String {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for client frame")
            .expect("client closed the stream")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

/// Parses a `42[...]` frame into its event name and payload.
fn parse_event(frame: &str) -> (String, JsonValue) {
    let body = frame.strip_prefix("42").expect("not an event frame");
    let mut array: Vec<JsonValue> = serde_json::from_str(body).unwrap();
    let data = if array.len() > 1 { array.remove(1) } else { JsonValue::Null };
    (array[0].as_str().unwrap().to_string(), data)
}

async fn next_event(events: &mut UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel event stream ended")
}

// =============================================================================
// Connector
// =============================================================================

#[tokio::test]
async fn handshake_then_events_both_ways() {
    let (listener, url) = bind().await;
    let connector = SocketIoConnector::new(SocketIoConfig::new(url));
    let mut opened = connector.open().unwrap();

    let mut server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);

    opened
        .channel
        .emit(ClientEvent::RegisterUser {
            user_id: Some(3),
            role: "cocinero".to_string(),
            username: "marta".to_string(),
        })
        .unwrap();
    let (name, data) = parse_event(&next_text(&mut server).await);
    assert_eq!(name, "conectar_usuario");
    assert_eq!(
        data,
        json!({"usuario_id": 3, "rol": "cocinero", "username": "marta"})
    );

    server
        .send(Message::Text(
            r#"42["evento_pedido",{"tipo":"nuevo_pedido","pedido_id":9}]"#.to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut opened.events).await,
        ChannelEvent::Message(ServerEvent::OrderEvent(
            json!({"tipo": "nuevo_pedido", "pedido_id": 9})
        ))
    );
}

#[tokio::test]
async fn server_ping_is_answered() {
    let (listener, url) = bind().await;
    let connector = SocketIoConnector::new(SocketIoConfig::new(url));
    let mut opened = connector.open().unwrap();

    let mut server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);

    server.send(Message::Text("2".to_string())).await.unwrap();
    assert_eq!(next_text(&mut server).await, "3");
}

#[tokio::test]
async fn messages_emitted_before_connect_are_flushed() {
    let (listener, url) = bind().await;
    let connector = SocketIoConnector::new(SocketIoConfig::new(url));
    let mut opened = connector.open().unwrap();

    opened
        .channel
        .emit(ClientEvent::SubscribeOrder { order_id: 4 })
        .unwrap();

    let mut server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);
    assert_eq!(
        parse_event(&next_text(&mut server).await),
        ("suscribir_pedido".to_string(), json!({"pedido_id": 4}))
    );
}

#[tokio::test]
async fn reconnects_after_server_drop() {
    let (listener, url) = bind().await;
    let connector =
        SocketIoConnector::new(SocketIoConfig::new(url).with_reconnect_policy(fast_policy(5)));
    let mut opened = connector.open().unwrap();

    let mut server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);

    server.close(None).await.unwrap();
    assert!(matches!(
        next_event(&mut opened.events).await,
        ChannelEvent::Disconnected(_)
    ));
    assert!(matches!(
        next_event(&mut opened.events).await,
        ChannelEvent::Reconnecting { attempt: 1, .. }
    ));

    let _server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);
}

#[tokio::test]
async fn messages_emitted_while_reconnecting_are_dropped() {
    let (listener, url) = bind().await;
    let connector =
        SocketIoConnector::new(SocketIoConfig::new(url).with_reconnect_policy(fast_policy(5)));
    let mut opened = connector.open().unwrap();

    let mut server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);

    server.close(None).await.unwrap();
    assert!(matches!(
        next_event(&mut opened.events).await,
        ChannelEvent::Disconnected(_)
    ));
    opened
        .channel
        .emit(ClientEvent::SubscribeOrder { order_id: 7 })
        .unwrap();

    let mut server = accept_socketio(&listener).await;
    loop {
        if next_event(&mut opened.events).await == ChannelEvent::Connected {
            break;
        }
    }

    // The stale subscription must not precede the new session's first frame
    opened.channel.emit(ClientEvent::Ping).unwrap();
    assert_eq!(
        parse_event(&next_text(&mut server).await),
        ("ping".to_string(), JsonValue::Null)
    );
}

#[tokio::test]
async fn gives_up_after_policy_is_exhausted() {
    let (listener, url) = bind().await;
    drop(listener);

    let connector =
        SocketIoConnector::new(SocketIoConfig::new(url).with_reconnect_policy(fast_policy(2)));
    let mut opened = connector.open().unwrap();

    let mut connect_errors = 0;
    loop {
        match next_event(&mut opened.events).await {
            ChannelEvent::ConnectError(_) => connect_errors += 1,
            ChannelEvent::Reconnecting { .. } => {}
            ChannelEvent::ReconnectFailed { attempts } => {
                assert_eq!(attempts, 2);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(connect_errors, 3);
}

#[tokio::test]
async fn rejected_namespace_reports_unauthorized() {
    let (listener, url) = bind().await;
    let connector = SocketIoConnector::new(SocketIoConfig::new(url));
    let mut opened = connector.open().unwrap();

    let (tcp, _) = listener.accept().await.unwrap();
    let mut server = accept_async(tcp).await.unwrap();
    server.send(Message::Text(OPEN.to_string())).await.unwrap();
    assert_eq!(next_text(&mut server).await, "40");
    server
        .send(Message::Text(r#"44{"message":"Unauthorized"}"#.to_string()))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut opened.events).await,
        ChannelEvent::Unauthorized
    );
}

#[tokio::test]
async fn close_sends_namespace_disconnect() {
    let (listener, url) = bind().await;
    let connector = SocketIoConnector::new(SocketIoConfig::new(url));
    let mut opened = connector.open().unwrap();

    let mut server = accept_socketio(&listener).await;
    assert_eq!(next_event(&mut opened.events).await, ChannelEvent::Connected);

    opened.channel.close();
    assert_eq!(next_text(&mut server).await, "41");
    assert!(opened.channel.emit(ClientEvent::Ping).is_err());
}

// =============================================================================
// Client over Socket.IO
// =============================================================================

#[tokio::test]
async fn client_registers_and_dispatches_alerts() {
    let (tcp, url) = bind().await;
    let poller = ScriptedPollTransport::new();
    let client = NotificationClient::builder(ClientConfig::new("manager").with_user(1, "ana"))
        .realtime(Arc::new(SocketIoConnector::new(SocketIoConfig::new(url))))
        .polling(Arc::new(poller.clone()))
        .build()
        .unwrap();

    let alerts = Arc::new(AtomicUsize::new(0));
    let a = alerts.clone();
    client.on(
        &EventCategory::Alert,
        listener(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    client.connect();
    let mut server = accept_socketio(&tcp).await;

    let (name, data) = parse_event(&next_text(&mut server).await);
    assert_eq!(name, "conectar_usuario");
    assert_eq!(data["rol"], "manager");
    assert!(client.state().realtime_active);

    server
        .send(Message::Text(
            r#"42["evento_alerta",{"tipo":"alerta_stock","producto":"queso"}]"#.to_string(),
        ))
        .await
        .unwrap();

    for _ in 0..200 {
        if alerts.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
    assert_eq!(poller.call_count(), 0);

    client.disconnect();
    assert_eq!(next_text(&mut server).await, "41");
}
