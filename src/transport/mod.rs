//! WebSocket transport layer.
//!
//! This module owns the physical socket between the client and the device
//! control panel. It does no correlation: it opens the socket, writes frames
//! tagged with the request id they belong to, and reports incoming frames,
//! failed writes, and how the socket ended.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Channel        │                              │  Control panel  │
//! │                 │         WebSocket            │  (device)       │
//! │  Connection ────┼─────────────────────────────►│                 │
//! │  (task)         │◄─────────────────────────────┼── hello, pushes │
//! │                 │     wss://host:2026/ws       │   responses     │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Endpoint::to_url` - Build the socket URL
//! 2. `Connection::spawn` - Open the socket on a new task
//! 3. `TransportHandler::on_open` / `on_message` / `on_send_failed` - Socket traffic
//! 4. `TransportHandler::on_close` - Exactly once, however it ended
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `endpoint` | Socket URL construction |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Control panel endpoint addressing.
pub mod endpoint;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CloseInfo, Connection, TransportHandler};
pub use endpoint::{Endpoint, TokenSource};
