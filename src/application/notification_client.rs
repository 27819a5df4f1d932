//! NotificationClient - one logical event stream per role.
//!
//! Prefers the real-time channel and falls back to HTTP polling whenever
//! the channel is unavailable, fails to connect or drops. When the channel
//! (re)connects, polling stops. Every event that arrives through either
//! transport is classified and dispatched to the listeners registered for
//! its category.
//!
//! # Example
//!
//! ```ignore
//! let client = NotificationClient::builder(ClientConfig::new("cocinero"))
//!     .realtime(Arc::new(SocketIoConnector::new(socket_config)))
//!     .polling(Arc::new(poll_transport))
//!     .build()?;
//!
//! client.on(&EventCategory::Order, listener(|event| {
//!     println!("{}", event.payload);
//!     Ok(())
//! }));
//! client.connect();
//! ```

use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{ClientConfig, ValidationError};
use crate::domain::notification::{
    ClientState, EventCategory, Listener, ListenerRegistry, NotificationEvent,
};
use crate::ports::{
    ChannelEvent, ClientEvent, OpenedChannel, PollError, PollTransport, RealtimeChannel,
    RealtimeConnector, ServerEvent, TransportError,
};

/// Lifecycle messages: `info` with `debug` enabled, `debug` otherwise.
macro_rules! lifecycle {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Errors raised while building a client. Runtime conditions never
/// surface as errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("A poll transport is required")]
    MissingPollTransport,

    #[error("NotificationClient must be built inside a Tokio runtime")]
    NoRuntime,
}

// ============================================
// Builder
// ============================================

/// Builder for [`NotificationClient`].
pub struct NotificationClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn RealtimeConnector>>,
    poller: Option<Arc<dyn PollTransport>>,
    runtime: Option<Handle>,
}

impl NotificationClientBuilder {
    /// Real-time capability. Without it the client only polls.
    pub fn realtime(mut self, connector: Arc<dyn RealtimeConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Polling transport (required).
    pub fn polling(mut self, poller: Arc<dyn PollTransport>) -> Self {
        self.poller = Some(poller);
        self
    }

    /// Runtime the client spawns its tasks on. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<NotificationClient, ClientError> {
        self.config.validate()?;
        let poller = self.poller.ok_or(ClientError::MissingPollTransport)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ClientError::NoRuntime)?,
        };

        lifecycle!(
            self.config.debug,
            role = %self.config.role,
            realtime = self.connector.is_some(),
            "Notification client created"
        );

        Ok(NotificationClient {
            inner: Arc::new(Inner {
                config: self.config,
                connector: self.connector,
                poller,
                listeners: ListenerRegistry::new(),
                runtime,
                shared: Mutex::new(Shared::default()),
            }),
        })
    }
}

// ============================================
// Client
// ============================================

/// Dual-transport notification client.
///
/// Dropping the client disconnects it.
pub struct NotificationClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    connector: Option<Arc<dyn RealtimeConnector>>,
    poller: Arc<dyn PollTransport>,
    listeners: ListenerRegistry,
    runtime: Handle,
    shared: Mutex<Shared>,
}

/// Mutable state. The lock is never held across an `.await` or while
/// listeners run.
#[derive(Default)]
struct Shared {
    /// Advanced by every disconnect; tasks from older epochs go quiet.
    epoch: u64,
    /// Advanced whenever polling starts or stops.
    poll_generation: u64,
    connected: bool,
    connecting: bool,
    realtime_active: bool,
    polling_active: bool,
    channel: Option<Arc<dyn RealtimeChannel>>,
    pump_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    keepalive_task: Option<JoinHandle<()>>,
}

impl NotificationClient {
    pub fn builder(config: ClientConfig) -> NotificationClientBuilder {
        NotificationClientBuilder {
            config,
            connector: None,
            poller: None,
            runtime: None,
        }
    }

    /// Starts receiving events.
    ///
    /// Opens the real-time channel when the capability is present and
    /// falls back to polling otherwise. Calling it while already connected
    /// does nothing.
    pub fn connect(&self) {
        Inner::connect(&self.inner);
    }

    /// Closes the channel, cancels polling and keep-alive, and drops any
    /// work still in flight. Safe to call at any time.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Registers `listener` for `category`.
    pub fn on(&self, category: &EventCategory, listener: Listener) {
        self.inner.listeners.on(category, listener);
    }

    /// Removes the first registration of `listener` for `category`.
    /// Returns whether one was removed.
    pub fn off(&self, category: &EventCategory, listener: &Listener) -> bool {
        self.inner.listeners.off(category, listener)
    }

    /// Asks the server for updates on one order. Only possible over the
    /// real-time channel; a logged no-op otherwise.
    pub fn subscribe_to_order(&self, order_id: i64) {
        self.inner
            .emit_if_realtime(ClientEvent::SubscribeOrder { order_id }, "subscribe");
    }

    /// Stops updates for one order. Same constraints as
    /// [`subscribe_to_order`](Self::subscribe_to_order).
    pub fn unsubscribe_from_order(&self, order_id: i64) {
        self.inner
            .emit_if_realtime(ClientEvent::UnsubscribeOrder { order_id }, "unsubscribe");
    }

    /// Read-only snapshot of the transport flags and identity.
    pub fn state(&self) -> ClientState {
        let shared = self.inner.lock();
        ClientState {
            realtime_active: shared.realtime_active,
            polling_active: shared.polling_active,
            connecting: shared.connecting,
            role: self.inner.config.role.clone(),
            user_id: self.inner.config.user_id,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

impl Drop for NotificationClient {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn debug(&self) -> bool {
        self.config.debug
    }

    fn connect(this: &Arc<Self>) {
        let mut shared = this.lock();
        if shared.connected {
            lifecycle!(this.debug(), role = %this.config.role, "Already connected");
            return;
        }
        shared.connected = true;

        let Some(connector) = &this.connector else {
            lifecycle!(
                this.debug(),
                role = %this.config.role,
                "No real-time capability, using polling"
            );
            Self::start_polling(this, &mut shared);
            return;
        };

        match connector.open() {
            Ok(OpenedChannel { channel, events }) => {
                lifecycle!(this.debug(), role = %this.config.role, "Opening real-time channel");
                shared.connecting = true;
                shared.channel = Some(channel);
                let epoch = shared.epoch;
                shared.pump_task = Some(this.runtime.spawn(pump_channel(
                    Arc::downgrade(this),
                    epoch,
                    events,
                )));
            }
            Err(TransportError::Unavailable(reason)) => {
                lifecycle!(
                    this.debug(),
                    role = %this.config.role,
                    reason = %reason,
                    "Real-time channel unavailable, using polling"
                );
                Self::start_polling(this, &mut shared);
            }
            Err(e) => {
                tracing::warn!(
                    role = %this.config.role,
                    error = %e,
                    "Could not open real-time channel, falling back to polling"
                );
                Self::start_polling(this, &mut shared);
            }
        }
    }

    fn disconnect(&self) {
        let (channel, tasks, was_connected) = {
            let mut shared = self.lock();
            shared.epoch += 1;
            shared.poll_generation += 1;
            let was_connected = shared.connected;
            shared.connected = false;
            shared.connecting = false;
            shared.realtime_active = false;
            shared.polling_active = false;
            let tasks = [
                shared.pump_task.take(),
                shared.poll_task.take(),
                shared.keepalive_task.take(),
            ];
            (shared.channel.take(), tasks, was_connected)
        };

        for task in tasks.into_iter().flatten() {
            task.abort();
        }
        if let Some(channel) = channel {
            channel.close();
        }
        if was_connected {
            lifecycle!(self.debug(), role = %self.config.role, "Disconnected");
        }
    }

    // ============================================
    // Polling
    // ============================================

    fn start_polling(this: &Arc<Self>, shared: &mut Shared) {
        if shared.polling_active {
            return;
        }
        shared.polling_active = true;
        shared.poll_generation += 1;
        let generation = shared.poll_generation;
        shared.poll_task = Some(
            this.runtime
                .spawn(poll_loop(Arc::downgrade(this), generation)),
        );
        lifecycle!(
            this.debug(),
            role = %this.config.role,
            interval_ms = this.config.poll_interval_ms,
            "Polling started"
        );
    }

    fn stop_polling(&self, shared: &mut Shared) {
        if !shared.polling_active {
            return;
        }
        shared.polling_active = false;
        shared.poll_generation += 1;
        if let Some(task) = shared.poll_task.take() {
            task.abort();
        }
        lifecycle!(self.debug(), role = %self.config.role, "Polling stopped");
    }

    fn is_current_poll(&self, generation: u64) -> bool {
        let shared = self.lock();
        shared.polling_active && shared.poll_generation == generation
    }

    fn handle_poll_result(&self, generation: u64, result: Result<Vec<JsonValue>, PollError>) {
        match result {
            Ok(events) => {
                for raw in events {
                    if !self.is_current_poll(generation) {
                        return;
                    }
                    match NotificationEvent::classify(raw) {
                        Ok(Some(event)) => self.dispatch(&event),
                        Ok(None) => {
                            tracing::debug!(role = %self.config.role, "Dropping polled event of unknown type")
                        }
                        Err(e) => {
                            tracing::warn!(role = %self.config.role, error = %e, "Dropping malformed polled event")
                        }
                    }
                }
            }
            Err(e) if e.is_fatal() => {
                tracing::warn!(
                    role = %self.config.role,
                    "Session rejected while polling, disconnecting"
                );
                self.disconnect();
            }
            Err(e) => {
                tracing::warn!(role = %self.config.role, error = %e, "Poll failed, retrying on next tick");
            }
        }
    }

    // ============================================
    // Real-time channel
    // ============================================

    fn handle_channel_event(this: &Arc<Self>, epoch: u64, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => Self::on_connected(this, epoch),
            ChannelEvent::ConnectError(reason) => {
                tracing::warn!(role = %this.config.role, reason = %reason, "Real-time connection failed");
                Self::fall_back(this, epoch);
            }
            ChannelEvent::Disconnected(reason) => {
                tracing::warn!(role = %this.config.role, reason = %reason, "Real-time channel dropped");
                Self::fall_back(this, epoch);
            }
            ChannelEvent::Reconnecting { attempt, delay } => {
                lifecycle!(
                    this.debug(),
                    role = %this.config.role,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Real-time channel reconnecting"
                );
            }
            ChannelEvent::ReconnectFailed { attempts } => {
                tracing::warn!(
                    role = %this.config.role,
                    attempts,
                    "Real-time reconnection gave up, staying on polling"
                );
                Self::fall_back(this, epoch);
            }
            ChannelEvent::Unauthorized => {
                tracing::warn!(
                    role = %this.config.role,
                    "Session rejected by real-time channel, disconnecting"
                );
                this.disconnect();
            }
            ChannelEvent::Message(message) => this.handle_server_event(epoch, message),
            ChannelEvent::Error(message) => {
                tracing::warn!(role = %this.config.role, error = %message, "Real-time channel error");
                this.dispatch_current(
                    epoch,
                    NotificationEvent::lifecycle(EventCategory::Error, json!({ "mensaje": message })),
                );
            }
        }
    }

    fn on_connected(this: &Arc<Self>, epoch: u64) {
        let channel = {
            let mut shared = this.lock();
            if shared.epoch != epoch {
                return;
            }
            shared.connecting = false;
            shared.realtime_active = true;
            this.stop_polling(&mut shared);
            if shared.keepalive_task.is_none() {
                shared.keepalive_task = Some(this.runtime.spawn(keepalive_loop(
                    Arc::downgrade(this),
                    epoch,
                    this.config.keepalive_interval(),
                )));
            }
            shared.channel.clone()
        };

        lifecycle!(this.debug(), role = %this.config.role, "Real-time channel active");

        if let Some(channel) = channel {
            let register = ClientEvent::RegisterUser {
                user_id: this.config.user_id,
                role: this.config.role.clone(),
                username: this.config.username.clone(),
            };
            if let Err(e) = channel.emit(register) {
                tracing::warn!(role = %this.config.role, error = %e, "Failed to register user");
            }
        }
    }

    fn fall_back(this: &Arc<Self>, epoch: u64) {
        let mut shared = this.lock();
        if shared.epoch != epoch {
            return;
        }
        shared.connecting = false;
        shared.realtime_active = false;
        if let Some(task) = shared.keepalive_task.take() {
            task.abort();
        }
        Self::start_polling(this, &mut shared);
    }

    fn handle_server_event(&self, epoch: u64, message: ServerEvent) {
        match message {
            ServerEvent::ConnectionConfirmed(data) => {
                lifecycle!(self.debug(), role = %self.config.role, "Server confirmed connection");
                self.dispatch_current(
                    epoch,
                    NotificationEvent::lifecycle(EventCategory::ConnectionConfirmed, data),
                );
            }
            ServerEvent::OrderEvent(data) => self.dispatch_pushed(epoch, data, EventCategory::Order),
            ServerEvent::AlertEvent(data) => self.dispatch_pushed(epoch, data, EventCategory::Alert),
            ServerEvent::Pong(_) => tracing::trace!(role = %self.config.role, "pong"),
            ServerEvent::OrderSubscribed(data) => {
                lifecycle!(self.debug(), role = %self.config.role, payload = %data, "Order subscription confirmed");
            }
            ServerEvent::OrderUnsubscribed(data) => {
                lifecycle!(self.debug(), role = %self.config.role, payload = %data, "Order unsubscription confirmed");
            }
            ServerEvent::Error(data) => {
                tracing::warn!(role = %self.config.role, payload = %data, "Server reported an error");
                self.dispatch_current(epoch, NotificationEvent::lifecycle(EventCategory::Error, data));
            }
            ServerEvent::Unknown { name, data } => {
                let category = EventCategory::from_name(&name);
                if matches!(category, EventCategory::Custom(_))
                    && self.listeners.has_category(&category)
                {
                    self.dispatch_current(epoch, NotificationEvent::lifecycle(category, data));
                } else {
                    tracing::debug!(role = %self.config.role, event = %name, "Ignoring unknown server event");
                }
            }
        }
    }

    fn dispatch_pushed(&self, epoch: u64, data: JsonValue, fallback: EventCategory) {
        if !data.is_object() {
            tracing::warn!(
                role = %self.config.role,
                category = %fallback,
                "Dropping malformed real-time event"
            );
            return;
        }
        self.dispatch_current(epoch, NotificationEvent::classify_with_fallback(data, fallback));
    }

    fn emit_if_realtime(&self, event: ClientEvent, action: &str) {
        let channel = {
            let shared = self.lock();
            if shared.realtime_active {
                shared.channel.clone()
            } else {
                None
            }
        };

        match channel {
            Some(channel) => {
                if let Err(e) = channel.emit(event) {
                    tracing::warn!(role = %self.config.role, action, error = %e, "Order subscription not sent");
                }
            }
            None => {
                lifecycle!(
                    self.debug(),
                    role = %self.config.role,
                    action,
                    "Real-time channel inactive, order subscription skipped"
                );
            }
        }
    }

    fn send_ping(&self, epoch: u64) {
        let channel = {
            let shared = self.lock();
            if shared.epoch != epoch || !shared.realtime_active {
                return;
            }
            shared.channel.clone()
        };
        if let Some(channel) = channel {
            if let Err(e) = channel.emit(ClientEvent::Ping) {
                tracing::debug!(role = %self.config.role, error = %e, "Keep-alive not sent");
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    fn dispatch_current(&self, epoch: u64, event: NotificationEvent) {
        if self.is_current(epoch) {
            self.dispatch(&event);
        }
    }

    fn dispatch(&self, event: &NotificationEvent) {
        let report = self.listeners.dispatch(event);
        tracing::trace!(
            category = %event.category,
            kind = %event.kind,
            invoked = report.invoked,
            failed = report.failed,
            "Event dispatched"
        );
    }
}

// ============================================
// Tasks
// ============================================

async fn pump_channel(
    inner: Weak<Inner>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(client) = inner.upgrade() else {
            return;
        };
        if !client.is_current(epoch) {
            return;
        }
        Inner::handle_channel_event(&client, epoch, event);
    }

    // Channel task ended without reporting why
    if let Some(client) = inner.upgrade() {
        tracing::debug!(role = %client.config.role, "Real-time event stream ended");
        Inner::fall_back(&client, epoch);
    }
}

async fn poll_loop(inner: Weak<Inner>, generation: u64) {
    let (period, timeout) = match inner.upgrade() {
        Some(client) => (client.config.poll_interval(), client.config.poll_timeout()),
        None => return,
    };

    // First tick completes immediately
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(client) = inner.upgrade() else {
            return;
        };
        if !client.is_current_poll(generation) {
            return;
        }

        let result = match time::timeout(timeout, client.poller.poll(&client.config.role)).await {
            Ok(result) => result.map(|response| response.eventos),
            Err(_) => Err(PollError::Timeout),
        };

        if !client.is_current_poll(generation) {
            return;
        }
        client.handle_poll_result(generation, result);
    }
}

async fn keepalive_loop(inner: Weak<Inner>, epoch: u64, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(client) = inner.upgrade() else {
            return;
        };
        client.send_ping(epoch);
    }
}
