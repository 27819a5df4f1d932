//! Fake real-time connector for testing.
//!
//! The test decides when the channel connects, drops or delivers
//! messages by pushing [`ChannelEvent`]s through a [`FakeChannelHandle`].
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.
//!
//! # Example
//!
//! ```ignore
//! let connector = Arc::new(FakeRealtimeConnector::new());
//! client.connect();
//!
//! let channel = connector.last_channel().unwrap();
//! channel.connect();
//! channel.deliver(ServerEvent::OrderEvent(json!({"tipo": "nuevo_pedido"})));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::ports::{
    ChannelEvent, ClientEvent, OpenedChannel, RealtimeChannel, RealtimeConnector, ServerEvent,
    TransportError,
};

/// Connector that hands out test-controlled channels.
#[derive(Clone, Default)]
pub struct FakeRealtimeConnector {
    fail_open: bool,
    channels: Arc<Mutex<Vec<FakeChannelHandle>>>,
}

impl FakeRealtimeConnector {
    /// Connector whose `open` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose `open` fails, as if the transport were unusable.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Number of channels opened so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn open_count(&self) -> usize {
        self.channels
            .lock()
            .expect("FakeRealtimeConnector: channels lock poisoned")
            .len()
    }

    /// Handle to the most recently opened channel.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn last_channel(&self) -> Option<FakeChannelHandle> {
        self.channels
            .lock()
            .expect("FakeRealtimeConnector: channels lock poisoned")
            .last()
            .cloned()
    }
}

impl RealtimeConnector for FakeRealtimeConnector {
    fn open(&self) -> Result<OpenedChannel, TransportError> {
        if self.fail_open {
            return Err(TransportError::Unavailable("fake connector disabled".into()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = FakeChannelHandle {
            events: Arc::new(Mutex::new(Some(events_tx))),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        self.channels
            .lock()
            .expect("FakeRealtimeConnector: channels lock poisoned")
            .push(handle.clone());

        Ok(OpenedChannel {
            channel: Arc::new(FakeChannel {
                sent: handle.sent.clone(),
                closed: handle.closed.clone(),
            }),
            events: events_rx,
        })
    }
}

/// Test-side view of one fake channel.
#[derive(Clone)]
pub struct FakeChannelHandle {
    events: Arc<Mutex<Option<mpsc::UnboundedSender<ChannelEvent>>>>,
    sent: Arc<Mutex<Vec<ClientEvent>>>,
    closed: Arc<AtomicBool>,
}

impl FakeChannelHandle {
    /// Pushes a raw lifecycle or data event to the client.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn push(&self, event: ChannelEvent) {
        if let Some(events) = self
            .events
            .lock()
            .expect("FakeChannelHandle: events lock poisoned")
            .as_ref()
        {
            let _ = events.send(event);
        }
    }

    /// Ends the event stream without a final lifecycle event.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn end_stream(&self) {
        self.events
            .lock()
            .expect("FakeChannelHandle: events lock poisoned")
            .take();
    }

    /// Simulates a completed handshake.
    pub fn connect(&self) {
        self.push(ChannelEvent::Connected);
    }

    /// Simulates a failed connection attempt.
    pub fn fail(&self, reason: &str) {
        self.push(ChannelEvent::ConnectError(reason.to_string()));
    }

    /// Simulates an established connection dropping.
    pub fn drop_connection(&self, reason: &str) {
        self.push(ChannelEvent::Disconnected(reason.to_string()));
    }

    /// Simulates a server message.
    pub fn deliver(&self, event: ServerEvent) {
        self.push(ChannelEvent::Message(event));
    }

    /// Everything the client emitted on this channel.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent
            .lock()
            .expect("FakeChannelHandle: sent lock poisoned")
            .clone()
    }

    /// Whether the client closed the channel.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeChannel {
    sent: Arc<Mutex<Vec<ClientEvent>>>,
    closed: Arc<AtomicBool>,
}

impl RealtimeChannel for FakeChannel {
    fn emit(&self, event: ClientEvent) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent
            .lock()
            .expect("FakeChannel: sent lock poisoned")
            .push(event);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_records_channel() {
        let connector = FakeRealtimeConnector::new();
        let mut opened = connector.open().unwrap();

        assert_eq!(connector.open_count(), 1);
        let handle = connector.last_channel().unwrap();
        handle.connect();
        assert_eq!(opened.events.recv().await, Some(ChannelEvent::Connected));
    }

    #[test]
    fn emit_is_recorded_until_close() {
        let connector = FakeRealtimeConnector::new();
        let opened = connector.open().unwrap();
        let handle = connector.last_channel().unwrap();

        opened.channel.emit(ClientEvent::Ping).unwrap();
        opened.channel.close();

        assert!(handle.is_closed());
        assert_eq!(handle.sent(), vec![ClientEvent::Ping]);
        assert_eq!(
            opened.channel.emit(ClientEvent::Ping),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn failing_connector_refuses_to_open() {
        let connector = FakeRealtimeConnector::failing();
        assert!(connector.open().is_err());
        assert_eq!(connector.open_count(), 0);
    }
}
