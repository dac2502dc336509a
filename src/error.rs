//! Error types for the panel channel.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use panel_channel::{Channel, Result};
//!
//! async fn example(channel: &Channel) -> Result<()> {
//!     let response = channel.request("get_status", None).await?;
//!     println!("{:?}", response.data);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Reaches callers via |
//! |----------|----------|---------------------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] | `build()` |
//! | Request | [`Error::RequestFailed`], [`Error::RequestTimeout`] | request future |
//! | Connection | [`Error::ConnectionClosed`], [`Error::WebSocket`] | request future |
//! | Frame | [`Error::MalformedFrame`] | logged only |
//! | Serialization | [`Error::Json`] | request future, [`Response::data_as`](crate::Response::data_as) |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when channel configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The server answered with `success: false`.
    ///
    /// `message` is the server's error list joined with `", "`, or
    /// `"Request failed"` when the server sent none.
    #[error("{message}")]
    RequestFailed {
        /// The request that was refused.
        request_id: RequestId,
        /// Joined server error strings.
        message: String,
    },

    /// No response arrived within the request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request that timed out.
        request_id: RequestId,
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The transport closed while the request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Frame Errors
    // ========================================================================
    /// An incoming frame was not a usable JSON message.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Why the frame was rejected.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error, such as a request frame that failed to write.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a request-failed error.
    #[inline]
    pub fn request_failed(request_id: RequestId, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            request_id,
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the server never answered in time.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if the server explicitly refused the request.
    #[inline]
    #[must_use]
    pub fn is_request_failed(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::WebSocket(_))
    }

    /// Returns `true` if retrying the same request may succeed.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
