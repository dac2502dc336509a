//! Panel channel - request/response and push events over a device WebSocket.
//!
//! This library is the client side of the control-panel socket exposed by a
//! kiosk device. One WebSocket carries two kinds of traffic: requests the
//! client sends and the device answers, and pushes the device sends on its
//! own (log lines, progress updates, completion of long operations).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐                  ┌─────────────────┐
//! │  Channel                     │                  │  Control panel  │
//! │   ├─ PendingRequests (id ──► │    {"id":7,      │  (device)       │
//! │   │    oneshot + timer)      │     "event":..}  │                 │
//! │   ├─ ListenerRegistry        │ ───────────────► │                 │
//! │   │    (event ──► handlers)  │ ◄─────────────── │  responses      │
//! │   └─ Connection (task)       │   hello, pushes  │  pushes         │
//! └──────────────────────────────┘                  └─────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - The channel counts as connected only after the device says `hello`
//! - Every request settles exactly once: response, refusal, timeout, or close
//! - Malformed frames are logged and dropped, never fatal
//! - A panicking listener never stops the other listeners
//!
//! # Quick Start
//!
//! ```no_run
//! use panel_channel::{Channel, Endpoint, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let channel = Channel::builder()
//!         .endpoint(Endpoint::new("10.0.0.5"))
//!         .build()?;
//!
//!     channel.on("log_tail_line", |line, _| println!("log: {line}"));
//!     channel.on_connect(|| println!("device ready"));
//!     channel.connect();
//!
//!     let usage = channel.request("get_data_usage", Some(json!({"days": 7}))).await?;
//!     println!("{:?}", usage.data);
//!
//!     channel.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | [`Channel`], builder, reconnection |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | JSON message types and frame decoding |
//! | [`transport`] | WebSocket connection and endpoint addressing |

// ============================================================================
// Modules
// ============================================================================

/// Correlated request/response channel.
///
/// Use [`Channel::builder()`] or [`Channel::new()`] to create a channel.
pub mod channel;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for requests and subscriptions.
pub mod identifiers;

/// WebSocket protocol message types.
///
/// Defines the request/response/push structures and frame decoding.
pub mod protocol;

/// WebSocket transport layer.
///
/// Socket ownership and endpoint addressing; no correlation logic.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Channel types
pub use channel::{
    Channel, ChannelBuilder, ChannelOptions, ConnectionState, DEFAULT_REQUEST_TIMEOUT,
    PushHandler, ReconnectPolicy, ResponseFuture,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SubscriptionId};

// Protocol types
pub use protocol::{HelloData, Push, Request, Response};

// Transport types
pub use transport::{CloseInfo, Endpoint, TokenSource};
