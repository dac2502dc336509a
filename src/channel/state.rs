//! Channel connection state.

use std::fmt;

/// Externally observable state of a [`Channel`](crate::Channel).
///
/// ```text
/// Disconnected ──connect()──► Connecting ──hello──► Ready
///      ▲                          │                   │
///      └──── close / error / disconnect() ◄───────────┘
/// ```
///
/// Requests can be sent in `Connecting` once the socket is open, but only
/// `Ready` counts as connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket is owned.
    Disconnected,
    /// A socket is owned but the device has not said `hello` yet.
    Connecting,
    /// The socket is open and the handshake completed.
    Ready,
}

impl ConnectionState {
    /// Returns `true` only in [`ConnectionState::Ready`].
    #[inline]
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_readiness() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert!(ConnectionState::Ready.is_ready());
        assert!(!ConnectionState::Connecting.is_ready());
        assert!(!ConnectionState::Disconnected.is_ready());
    }
}
