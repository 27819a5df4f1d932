//! Integration tests for the HTTP polling transport.
//!
//! A `wiremock` server stands in for the POS backend's
//! `/api/notificaciones/polling/{role}` endpoint.

use reqwest::Url;
use secrecy::Secret;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use comanda_notify::adapters::HttpPollTransport;
use comanda_notify::config::ClientConfig;
use comanda_notify::domain::notification::{listener, EventCategory};
use comanda_notify::ports::{PollError, PollTransport};
use comanda_notify::NotificationClient;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn transport(server: &MockServer) -> HttpPollTransport {
    HttpPollTransport::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(2)).unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

// =============================================================================
// Transport
// =============================================================================

#[tokio::test]
async fn poll_returns_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notificaciones/polling/cocinero"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "eventos": [
                {"tipo": "nuevo_pedido", "pedido_id": 41},
                {"tipo": "alerta_stock", "producto": "tomate"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server).poll("cocinero").await.unwrap();

    assert_eq!(response.eventos.len(), 2);
    assert_eq!(response.eventos[0]["pedido_id"], 41);
}

#[tokio::test]
async fn poll_sends_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notificaciones/polling/mesero"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"eventos": []})))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(&server)
        .with_session_cookie(Secret::new("session=abc123".to_string()))
        .poll("mesero")
        .await
        .unwrap();

    assert!(response.is_empty());
}

#[tokio::test]
async fn unauthorized_status_maps_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "No autorizado"})))
        .mount(&server)
        .await;

    let result = transport(&server).poll("cajero").await;
    assert_eq!(result, Err(PollError::Unauthorized));
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = transport(&server).poll("cajero").await;
    assert_eq!(result, Err(PollError::Status(500)));
}

#[tokio::test]
async fn malformed_body_maps_to_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = transport(&server).poll("cajero").await;
    assert!(matches!(result, Err(PollError::Decode(_))));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"eventos": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let transport =
        HttpPollTransport::new(Url::parse(&server.uri()).unwrap(), Duration::from_millis(50))
            .unwrap();
    assert_eq!(transport.poll("cajero").await, Err(PollError::Timeout));
}

// =============================================================================
// Client over HTTP
// =============================================================================

#[tokio::test]
async fn client_dispatches_polled_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notificaciones/polling/cocinero"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "eventos": [{"tipo": "nuevo_pedido", "pedido_id": 5}]
        })))
        .mount(&server)
        .await;

    let client = NotificationClient::builder(
        ClientConfig::new("cocinero").with_poll_interval(Duration::from_secs(60)),
    )
    .polling(Arc::new(transport(&server)))
    .build()
    .unwrap();

    let orders = Arc::new(AtomicUsize::new(0));
    let o = orders.clone();
    client.on(
        &EventCategory::Order,
        listener(move |event| {
            assert_eq!(event.order_id(), Some(5));
            o.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    client.connect();
    wait_until(|| orders.load(Ordering::SeqCst) == 1).await;
    client.disconnect();
}

#[tokio::test]
async fn client_stops_after_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = NotificationClient::builder(
        ClientConfig::new("cocinero")
            .with_poll_interval(Duration::from_millis(20))
            .with_poll_timeout(Duration::from_secs(2)),
    )
    .polling(Arc::new(transport(&server)))
    .build()
    .unwrap();

    client.connect();
    wait_until(|| !client.state().polling_active).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    // MockServer verifies `expect(1)` on drop
}
