//! Correlated channel implementation.
//!
//! A [`Channel`] layers request/response correlation and push fan-out over
//! one [`Connection`] at a time. The connection can be replaced (reconnect)
//! without replacing the channel; each replacement bumps a generation
//! counter so notifications from an older socket are recognised and
//! ignored.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::identifiers::{RequestId, RequestIdGenerator, SubscriptionId};
use crate::protocol::{HelloData, IncomingMessage, Push, Request, decode_frame};
use crate::transport::{CloseInfo, Connection, TransportHandler};

use super::builder::{ChannelBuilder, ChannelOptions};
use super::listeners::{ListenerRegistry, panic_message};
use super::pending::{PendingRequests, ResponseFuture};
use super::state::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// Callback run when the device completes the `hello` handshake.
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback run when the owned socket closes.
pub type DisconnectCallback = Arc<dyn Fn(&CloseInfo) + Send + Sync>;

/// Socket ownership and readiness, guarded together.
#[derive(Default)]
struct Link {
    /// Owned socket, if any.
    connection: Option<Connection>,
    /// Generation of the most recent socket.
    generation: u64,
    /// Set by `hello`, cleared on every connect and close.
    ready: bool,
    /// Payload of the last `hello` on the current socket.
    hello: Option<HelloData>,
    /// Set by `disconnect()`; suppresses reconnection.
    manual_close: bool,
    /// Consecutive reconnect attempts since the last `hello`.
    reconnect_attempt: u32,
    /// Scheduled reconnect, if any.
    reconnect_task: Option<JoinHandle<()>>,
}

impl Link {
    fn cancel_reconnect(&mut self) {
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
    }
}

/// Internal shared state for a channel.
pub(crate) struct ChannelInner {
    /// Self reference handed to connections and timers.
    me: Weak<ChannelInner>,
    /// Validated configuration.
    options: ChannelOptions,
    /// Request id source.
    ids: RequestIdGenerator,
    /// Socket ownership.
    link: Mutex<Link>,
    /// Outstanding requests.
    pending: PendingRequests,
    /// Push listeners.
    listeners: ListenerRegistry,
    /// Single-slot connect callback.
    on_connect: Mutex<Option<ConnectCallback>>,
    /// Single-slot disconnect callback.
    on_disconnect: Mutex<Option<DisconnectCallback>>,
}

// ============================================================================
// Channel
// ============================================================================

/// Reliable request/response channel and event bus over one WebSocket.
///
/// Cloning yields another handle to the same channel.
///
/// All methods that may touch the socket or start timers ([`connect`],
/// [`request`], [`request_with_timeout`]) must be called from within a
/// tokio runtime.
///
/// # Example
///
/// ```no_run
/// use panel_channel::Channel;
/// use serde_json::json;
///
/// # async fn example() -> panel_channel::Result<()> {
/// let channel = Channel::new("ws://10.0.0.5:2026/ws")?;
///
/// channel.on_connect(|| println!("device ready"));
/// channel.on("log_tail_line", |data, _push| println!("{data}"));
/// channel.connect();
///
/// let response = channel.request("take_image", Some(json!({"camera": "top"}))).await?;
/// println!("{:?}", response.data);
///
/// channel.disconnect();
/// # Ok(())
/// # }
/// ```
///
/// [`connect`]: Channel::connect
/// [`request`]: Channel::request
/// [`request_with_timeout`]: Channel::request_with_timeout
#[derive(Clone)]
pub struct Channel {
    /// Shared inner state.
    pub(crate) inner: Arc<ChannelInner>,
}

// ============================================================================
// Channel - Display
// ============================================================================

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("url", &self.inner.options.url.as_str())
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel - Constructors
// ============================================================================

impl Channel {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    /// Creates a disconnected channel for `url` with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid `ws`/`wss` URL.
    pub fn new(url: impl Into<String>) -> crate::Result<Self> {
        ChannelBuilder::new().url(url).build()
    }

    /// Creates a disconnected channel from validated options.
    #[must_use]
    pub fn with_options(options: ChannelOptions) -> Self {
        let inner = Arc::new_cyclic(|me| ChannelInner {
            me: me.clone(),
            options,
            ids: RequestIdGenerator::new(),
            link: Mutex::new(Link::default()),
            pending: PendingRequests::new(),
            listeners: ListenerRegistry::new(),
            on_connect: Mutex::new(None),
            on_disconnect: Mutex::new(None),
        });
        Self { inner }
    }
}

// ============================================================================
// Channel - Lifecycle
// ============================================================================

impl Channel {
    /// Opens a socket. Does nothing if one is already owned.
    ///
    /// Returns immediately; the channel is [`Ready`](ConnectionState::Ready)
    /// once the device sends `hello`.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Closes the owned socket, if any, and stops automatic reconnection.
    ///
    /// Pending requests are rejected with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) when the
    /// close notification arrives, followed by the disconnect callback.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Returns `true` once the socket is open and the device said `hello`.
    #[inline]
    #[must_use]
    pub fn connected(&self) -> bool {
        self.state().is_ready()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        let link = self.inner.link.lock();
        match &link.connection {
            None => ConnectionState::Disconnected,
            Some(connection) if connection.is_open() && link.ready => ConnectionState::Ready,
            Some(_) => ConnectionState::Connecting,
        }
    }

    /// Returns the `hello` payload of the current socket, once received.
    #[must_use]
    pub fn hello(&self) -> Option<HelloData> {
        self.inner.link.lock().hello.clone()
    }

    /// Sets the connect callback, replacing any previous one.
    ///
    /// Runs once per socket, when its first `hello` arrives.
    pub fn on_connect<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_connect.lock() = Some(Arc::new(callback));
    }

    /// Sets the disconnect callback, replacing any previous one.
    ///
    /// Runs when the owned socket closes, with the close code and reason.
    pub fn on_disconnect<F>(&self, callback: F)
    where
        F: Fn(&CloseInfo) + Send + Sync + 'static,
    {
        *self.inner.on_disconnect.lock() = Some(Arc::new(callback));
    }

    /// Returns the socket URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.options.url
    }
}

// ============================================================================
// Channel - Requests
// ============================================================================

impl Channel {
    /// Sends a request with the default timeout.
    ///
    /// The request is registered and sent before this returns. If the socket
    /// is not open the frame is dropped without error; the returned future
    /// then completes with a timeout or connection-closed error.
    ///
    /// # Errors
    ///
    /// The future resolves to:
    ///
    /// - [`Error::RequestFailed`](crate::Error::RequestFailed) if the device answered `success: false`
    /// - [`Error::RequestTimeout`](crate::Error::RequestTimeout) if no answer came in time
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the socket closed first
    /// - [`Error::WebSocket`](crate::Error::WebSocket) if writing the request frame failed
    pub fn request(&self, event: &str, data: Option<Value>) -> ResponseFuture {
        self.request_with_timeout(event, data, self.inner.options.request_timeout)
    }

    /// Sends a request with a custom timeout.
    ///
    /// See [`request`](Self::request).
    pub fn request_with_timeout(
        &self,
        event: &str,
        data: Option<Value>,
        timeout: Duration,
    ) -> ResponseFuture {
        self.inner.request(event, data, timeout)
    }

    /// Returns the number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Returns the default request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.inner.options.request_timeout
    }
}

// ============================================================================
// Channel - Listeners
// ============================================================================

impl Channel {
    /// Registers a listener for pushes named `event`.
    ///
    /// Listeners run in registration order with the push data (`null` when
    /// absent) and the whole message. A panicking listener is logged and
    /// does not stop the others.
    pub fn on<F>(&self, event: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value, &Push) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(event, Arc::new(handler));
        trace!(event, subscription = %id, "Listener added");
        id
    }

    /// Removes listeners for `event`.
    ///
    /// `Some(id)` removes that registration; `None` removes all of them.
    /// Returns how many were removed.
    pub fn off(&self, event: &str, subscription: Option<SubscriptionId>) -> usize {
        let removed = self.inner.listeners.remove(event, subscription);
        trace!(event, removed, "Listeners removed");
        removed
    }

    /// Returns the number of listeners for `event`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.listeners.count(event)
    }
}

// ============================================================================
// ChannelInner - Lifecycle
// ============================================================================

impl ChannelInner {
    fn connect(&self) {
        let mut link = self.link.lock();
        if link.connection.is_some() {
            trace!(generation = link.generation, "Already connected");
            return;
        }

        link.cancel_reconnect();
        link.generation += 1;
        link.ready = false;
        link.hello = None;
        link.manual_close = false;

        let handler: Weak<dyn TransportHandler> = self.me.clone();
        let connection = Connection::spawn(self.options.url.to_string(), link.generation, handler);
        link.connection = Some(connection);

        info!(generation = link.generation, url = %self.options.url, "Connecting");
    }

    fn disconnect(&self) {
        let connection = {
            let mut link = self.link.lock();
            link.manual_close = true;
            link.ready = false;
            link.cancel_reconnect();
            link.connection.take()
        };

        if let Some(connection) = connection {
            info!(generation = connection.generation(), "Disconnecting");
            connection.shutdown();
        }
    }

    fn schedule_reconnect(&self, link: &mut Link) {
        let attempt = link.reconnect_attempt + 1;
        if !self.options.reconnect.allows(attempt) {
            if self.options.reconnect.is_enabled() {
                warn!(attempts = link.reconnect_attempt, "Giving up reconnecting");
            }
            return;
        }

        link.reconnect_attempt = attempt;
        let delay = self.options.reconnect.delay_for(attempt);
        info!(attempt, delay = ?delay, "Scheduling reconnect");

        let me = self.me.clone();
        link.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = me.upgrade() {
                inner.reconnect_due();
            }
        }));
    }

    fn reconnect_due(&self) {
        {
            let mut link = self.link.lock();
            link.reconnect_task = None;
            if link.manual_close || link.connection.is_some() {
                return;
            }
        }
        self.connect();
    }
}

// ============================================================================
// ChannelInner - Requests
// ============================================================================

impl ChannelInner {
    fn request(&self, event: &str, data: Option<Value>, timeout: Duration) -> ResponseFuture {
        let id = self.ids.next_id();
        let request = Request::new(id, event, data);

        // Registered under the link lock so a concurrent close either sees
        // this request in its sweep or leaves no socket to send on.
        let (future, connection) = {
            let link = self.link.lock();
            let future = self.pending.register(id, event, link.generation, timeout);
            (future, link.connection.clone())
        };

        let frame = match request.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.pending.reject(id, e);
                return future;
            }
        };

        match connection {
            Some(connection) if connection.send_frame(id, frame) => {
                trace!(request_id = %id, event, "Request sent");
            }
            _ => {
                debug!(request_id = %id, event, "Socket not open, request not sent");
            }
        }

        future
    }
}

// ============================================================================
// ChannelInner - Incoming
// ============================================================================

impl ChannelInner {
    fn is_current(&self, generation: u64) -> bool {
        self.link.lock().generation == generation
    }

    fn route(&self, generation: u64, message: IncomingMessage) {
        match message {
            IncomingMessage::Response(response) => {
                let id = response.id;
                if let Err(unmatched) = self.pending.settle(response) {
                    match unmatched.into_push() {
                        Some(push) => self.dispatch(generation, &push),
                        None => debug!(request_id = %id, "Dropping response for unknown request"),
                    }
                }
            }
            IncomingMessage::Push(push) => self.dispatch(generation, &push),
        }
    }

    fn dispatch(&self, generation: u64, push: &Push) {
        if push.is_hello() {
            self.handle_hello(generation, push);
        }

        let invoked = self.listeners.dispatch(push);
        trace!(event = %push.event, invoked, "Push dispatched");
    }

    fn handle_hello(&self, generation: u64, push: &Push) {
        let first = {
            let mut link = self.link.lock();
            if link.generation != generation {
                return;
            }
            let first = !link.ready;
            link.ready = true;
            link.hello = push.hello_data();
            link.reconnect_attempt = 0;
            first
        };

        if !first {
            debug!(generation, "Repeated hello");
            return;
        }

        info!(generation, "Channel ready");

        let callback = self.on_connect.lock().clone();
        if let Some(callback) = callback
            && let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback()))
        {
            error!(panic = %panic_message(payload.as_ref()), "Connect callback panicked");
        }
    }
}

// ============================================================================
// ChannelInner - TransportHandler
// ============================================================================

impl TransportHandler for ChannelInner {
    fn on_open(&self, generation: u64) {
        debug!(generation, "Socket open, waiting for hello");
    }

    fn on_message(&self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            trace!(generation, "Ignoring frame from replaced socket");
            return;
        }

        match decode_frame(text) {
            Ok(Some(message)) => self.route(generation, message),
            Ok(None) => {}
            Err(e) => warn!(generation, error = %e, "Discarding frame"),
        }
    }

    fn on_send_failed(&self, generation: u64, request_id: RequestId, error: Error) {
        debug!(generation, %request_id, error = %error, "Request frame not written");
        self.pending.reject(request_id, error);
    }

    fn on_close(&self, generation: u64, close: CloseInfo) {
        let current = {
            let mut link = self.link.lock();
            let current = link.generation == generation;
            if current {
                link.connection = None;
                link.ready = false;
                if !link.manual_close {
                    self.schedule_reconnect(&mut link);
                }
            }
            current
        };

        let rejected = self.pending.reject_through(generation);
        if rejected > 0 {
            debug!(generation, rejected, "Rejected pending requests");
        }

        if !current {
            debug!(generation, "Replaced socket closed");
            return;
        }

        info!(generation, code = ?close.code, reason = %close.reason, "Disconnected");

        let callback = self.on_disconnect.lock().clone();
        if let Some(callback) = callback
            && let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&close)))
        {
            error!(panic = %panic_message(payload.as_ref()), "Disconnect callback panicked");
        }
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        let link = self.link.get_mut();
        link.cancel_reconnect();
        if let Some(connection) = link.connection.take() {
            connection.shutdown();
        }
        self.pending.reject_through(u64::MAX);
    }
}

// ============================================================================
// Tests
// ============================================================================
