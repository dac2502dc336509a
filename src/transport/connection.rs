//! WebSocket connection and event loop.
//!
//! A [`Connection`] owns one client socket to the control panel. Opening,
//! reading, and writing all happen on a spawned tokio task; the owner
//! learns about the socket through [`TransportHandler`] notifications.
//!
//! # Event Loop
//!
//! The spawned task:
//!
//! - Opens the socket (abandoning the attempt if shut down first)
//! - Forwards incoming text frames to the handler
//! - Writes outgoing frames queued by [`Connection::send_frame`], reporting
//!   a failed write against the request that frame carried
//! - Reports exactly one close per connection, whatever ended it
//!
//! Every notification carries the connection's generation so the owner can
//! ignore a socket it has already replaced.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, trace, warn};

use crate::error::Error;
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Close code for a normal, client-requested close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code the cloud proxy uses when a deployment gate refuses the session.
pub const CLOSE_GATE_REFUSED: u16 = 4403;

/// Close code the cloud proxy uses when it has no device key.
pub const CLOSE_DEVICE_KEY_MISSING: u16 = 4500;

// ============================================================================
// CloseInfo
// ============================================================================

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseInfo {
    /// WebSocket close code, when the peer or client sent one.
    pub code: Option<u16>,
    /// Close reason or error description.
    pub reason: String,
}

impl CloseInfo {
    /// Creates close info with a code.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Creates close info for a connection that ended without a close frame.
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }

    /// Returns `true` for a normal close.
    #[inline]
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == Some(CLOSE_NORMAL)
    }

    fn from_frame(frame: Option<CloseFrame>) -> Self {
        match frame {
            Some(frame) => Self::new(u16::from(frame.code), frame.reason.as_str()),
            None => Self::abnormal("closed without status"),
        }
    }
}

// ============================================================================
// TransportHandler
// ============================================================================

/// Receives socket notifications for a [`Connection`].
///
/// Calls arrive on the connection's task, one at a time, in socket order.
pub trait TransportHandler: Send + Sync + 'static {
    /// The socket finished its opening handshake.
    fn on_open(&self, generation: u64);

    /// A text frame arrived.
    fn on_message(&self, generation: u64, text: &str);

    /// Writing the frame for `request_id` failed; the frame was not sent.
    fn on_send_failed(&self, generation: u64, request_id: RequestId, error: Error);

    /// The socket closed or failed. Called exactly once per connection.
    fn on_close(&self, generation: u64, close: CloseInfo);
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one request frame.
    Send {
        /// Request the frame belongs to.
        request_id: RequestId,
        /// Serialized frame.
        text: String,
    },
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one client WebSocket.
///
/// Cloning the handle does not clone the socket. The socket closes on
/// [`shutdown`](Self::shutdown), when every handle is dropped, or when the
/// peer goes away.
#[derive(Clone)]
pub struct Connection {
    /// Generation tag passed to every notification.
    generation: u64,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Set while the socket is open.
    open: Arc<AtomicBool>,
}

impl Connection {
    /// Starts connecting to `url` on a new task.
    ///
    /// Must be called within a tokio runtime.
    pub(crate) fn spawn(url: String, generation: u64, handler: Weak<dyn TransportHandler>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_event_loop(
            url,
            generation,
            command_rx,
            Arc::clone(&open),
            handler,
        ));

        Self {
            generation,
            command_tx,
            open,
        }
    }

    /// Returns the generation tag of this connection.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` while the socket is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queues the frame for `request_id`.
    ///
    /// Returns `false` and drops the frame if the socket is not open. A
    /// queued frame that fails to write is reported through
    /// [`TransportHandler::on_send_failed`].
    pub fn send_frame(&self, request_id: RequestId, text: String) -> bool {
        if !self.is_open() {
            return false;
        }
        self.command_tx
            .send(ConnectionCommand::Send { request_id, text })
            .is_ok()
    }

    /// Closes the socket. The close notification follows asynchronously.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        url: String,
        generation: u64,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        open: Arc<AtomicBool>,
        handler: Weak<dyn TransportHandler>,
    ) {
        debug!(generation, %url, "Opening WebSocket");

        let ws_stream = tokio::select! {
            result = connect_async(url.as_str()) => match result {
                Ok((ws_stream, response)) => {
                    debug!(generation, status = %response.status(), "WebSocket handshake complete");
                    ws_stream
                }
                Err(e) => {
                    warn!(generation, error = %e, "WebSocket connect failed");
                    Self::notify(&handler, |h| h.on_close(generation, CloseInfo::abnormal(e.to_string())));
                    return;
                }
            },

            () = Self::wait_for_shutdown(&mut command_rx) => {
                debug!(generation, "Shutdown before WebSocket opened");
                Self::notify(&handler, |h| {
                    h.on_close(generation, CloseInfo::abnormal("closed before open"));
                });
                return;
            }
        };

        open.store(true, Ordering::Release);
        Self::notify(&handler, |h| h.on_open(generation));

        let (mut ws_write, mut ws_read) = ws_stream.split();

        let close = loop {
            tokio::select! {
                // Incoming frames from the control panel
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::notify(&handler, |h| h.on_message(generation, text.as_str()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            let close = CloseInfo::from_frame(frame);
                            debug!(generation, code = ?close.code, reason = %close.reason, "WebSocket closed by remote");
                            break close;
                        }

                        Some(Ok(Message::Binary(data))) => {
                            trace!(generation, len = data.len(), "Ignoring binary frame");
                        }

                        Some(Err(e)) => {
                            error!(generation, error = %e, "WebSocket error");
                            break CloseInfo::abnormal(e.to_string());
                        }

                        None => {
                            debug!(generation, "WebSocket stream ended");
                            break CloseInfo::abnormal("stream ended");
                        }

                        // Ping/Pong are answered by tungstenite
                        _ => {}
                    }
                }

                // Commands from the channel
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request_id, text }) => {
                            Self::write_frame(&mut ws_write, generation, request_id, text, &handler).await;
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(generation, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break CloseInfo::new(CLOSE_NORMAL, "closed by client");
                        }

                        None => {
                            debug!(generation, "Connection handle dropped");
                            let _ = ws_write.close().await;
                            break CloseInfo::new(CLOSE_NORMAL, "connection dropped");
                        }
                    }
                }
            }
        };

        open.store(false, Ordering::Release);
        Self::notify(&handler, |h| h.on_close(generation, close));

        debug!(generation, "Event loop terminated");
    }

    /// Writes one request frame, reporting a failure to the handler.
    async fn write_frame<S>(
        ws_write: &mut S,
        generation: u64,
        request_id: RequestId,
        text: String,
        handler: &Weak<dyn TransportHandler>,
    ) where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        match ws_write.send(Message::Text(text.into())).await {
            Ok(()) => trace!(generation, %request_id, "Frame written"),
            Err(e) => {
                warn!(generation, %request_id, error = %e, "Failed to write frame");
                Self::notify(handler, |h| {
                    h.on_send_failed(generation, request_id, Error::WebSocket(e));
                });
            }
        }
    }

    /// Resolves once a shutdown is requested or every handle is gone.
    ///
    /// Frames queued before the socket opens are discarded.
    async fn wait_for_shutdown(command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>) {
        loop {
            match command_rx.recv().await {
                Some(ConnectionCommand::Shutdown) | None => return,
                Some(ConnectionCommand::Send { request_id, .. }) => {
                    trace!(%request_id, "Dropping frame queued before open");
                }
            }
        }
    }

    /// Invokes the handler if its owner is still alive.
    fn notify(handler: &Weak<dyn TransportHandler>, f: impl FnOnce(&dyn TransportHandler)) {
        if let Some(handler) = handler.upgrade() {
            f(handler.as_ref());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
