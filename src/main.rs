//! comanda-notify: console listener for the Comanda POS notification stream
//!
//! Connects as the configured role, prints every order and alert event as
//! one JSON line on stdout, and disconnects on Ctrl-C.
//!
//! Usage: `comanda-notify [CONFIG_FILE]`. Without a file, configuration
//! comes from `COMANDA_NOTIFY__*` environment variables and `.env`.

use std::error::Error;
use std::sync::Arc;

use serde_json::json;

use comanda_notify::adapters::{HttpPollTransport, SocketIoConfig, SocketIoConnector};
use comanda_notify::config::{AppConfig, LoggingConfig};
use comanda_notify::domain::notification::{
    listener, EventCategory, ListenerResult, NotificationEvent,
};
use comanda_notify::NotificationClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.validate()?;
    init_tracing(&config.logging);

    let base_url = config.server.url()?;

    let mut poller = HttpPollTransport::new(base_url.clone(), config.client.poll_timeout())?;
    if let Some(cookie) = &config.server.session_cookie {
        poller = poller.with_session_cookie(cookie.clone());
    }

    let mut builder = NotificationClient::builder(config.client.clone()).polling(Arc::new(poller));
    if config.realtime.enabled {
        let mut socket = SocketIoConfig::new(base_url)
            .with_reconnect_policy(config.realtime.reconnect_policy());
        if let Some(cookie) = &config.server.session_cookie {
            socket = socket.with_session_cookie(cookie.clone());
        }
        builder = builder.realtime(Arc::new(SocketIoConnector::new(socket)));
    }
    let client = builder.build()?;

    for category in EventCategory::BUILTIN {
        client.on(&category, listener(print_event));
    }

    tracing::info!(
        role = %config.client.role,
        server = %config.server.base_url,
        realtime = config.realtime.enabled,
        "Listening for notifications"
    );
    client.connect();

    tokio::signal::ctrl_c().await?;

    tracing::info!(state = %client.state().connection_state(), "Shutting down");
    client.disconnect();
    Ok(())
}

fn print_event(event: &NotificationEvent) -> ListenerResult {
    let line = json!({
        "category": event.category.as_str(),
        "tipo": event.kind.as_str(),
        "payload": event.payload,
    });
    println!("{}", line);
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(logging.env_filter())
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
