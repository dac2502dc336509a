//! WebSocket protocol message types.
//!
//! This module defines the JSON messages exchanged with the device control
//! panel. Every WebSocket text frame carries exactly one message.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Request`] | Client → Server | Named request with a numeric id |
//! | [`Response`] | Server → Client | Outcome for one request id |
//! | [`Push`] | Server → Client | Uncorrelated notification, routed by event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Push messages and well-known event names |
//! | `frame` | Frame decoding and salvage |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Push message types.
pub mod event;

/// Incoming frame decoding.
pub mod frame;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{HelloData, Push};
pub use frame::{IncomingMessage, decode_frame};
pub use request::{Request, Response};
