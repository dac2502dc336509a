//! Correlated request/response channel.
//!
//! This module turns one socket into an RPC channel and event bus:
//! requests carry an id and are answered by a response with the same id,
//! everything else is a push routed to listeners by event name.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Channel`] | Cloneable handle; requests, listeners, lifecycle |
//! | [`ChannelBuilder`] | Fluent configuration builder |
//! | [`ResponseFuture`] | Pending outcome of one request |
//! | [`ReconnectPolicy`] | Optional automatic reconnection |
//! | [`ConnectionState`] | Disconnected / connecting / ready |
//!
//! # Request Lifecycle
//!
//! ```text
//! request() ──► registered ──► response, success ──────► Ok(Response)
//!                   │      ──► response, success:false ► Err(RequestFailed)
//!                   │      ──► timer fires ────────────► Err(RequestTimeout)
//!                   └────────► socket closes ──────────► Err(ConnectionClosed)
//! ```
//!
//! Each request settles exactly once; whatever arrives afterwards for the
//! same id is dropped.
//!
//! # Example
//!
//! ```no_run
//! use panel_channel::{Channel, ConnectionState};
//!
//! # async fn example() -> panel_channel::Result<()> {
//! let channel = Channel::new("ws://10.0.0.5:2026/ws")?;
//! channel.connect();
//!
//! let status = channel.request("get_status", None).await?;
//! assert_eq!(channel.state(), ConnectionState::Ready);
//! println!("{:?}", status.data);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for channel configuration.
pub mod builder;

/// Core channel implementation.
pub mod core;

/// Push listener registry.
mod listeners;

/// Outstanding request tracking.
mod pending;

/// Automatic reconnection policy.
pub mod reconnect;

/// Connection state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Channel, ConnectCallback, DisconnectCallback};
pub use builder::{ChannelBuilder, ChannelOptions, DEFAULT_REQUEST_TIMEOUT};
pub use listeners::PushHandler;
pub use pending::ResponseFuture;
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;
