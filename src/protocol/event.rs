//! Push message types.
//!
//! Pushes are notifications the control panel sends without a matching
//! request. They are routed to listeners by exact event name.
//!
//! # Well-known Events
//!
//! | Event | Meaning |
//! |-------|---------|
//! | `hello` | Device finished initializing; the channel becomes ready |
//! | `wellness_progress` | Progress update for a running wellness check |
//! | `log_tail_line` | One line from an active log tail |
//! | `async.<action>` | Broadcast of an inter-process request on the device |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Readiness handshake pushed once per connection.
pub const HELLO: &str = "hello";

/// Wellness check progress.
pub const WELLNESS_PROGRESS: &str = "wellness_progress";

/// Log tail output line.
pub const LOG_TAIL_LINE: &str = "log_tail_line";

/// Prefix of broadcast pushes mirrored from device IPC.
pub const ASYNC_PREFIX: &str = "async.";

// ============================================================================
// Push
// ============================================================================

/// A server-originated message with no request correlation.
///
/// # Format
///
/// ```json
/// { "event": "async.SCAN_DONE", "data": { ... }, "from": "SCANNER" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Push {
    /// Event name used for routing.
    pub event: String,

    /// Event payload.
    #[serde(default)]
    pub data: Option<Value>,

    /// Originating service, for broadcast pushes.
    #[serde(default)]
    pub from: Option<Value>,
}

impl Push {
    /// Returns `true` for the readiness handshake.
    #[inline]
    #[must_use]
    pub fn is_hello(&self) -> bool {
        self.event == HELLO
    }

    /// Returns `true` for broadcast `async.*` pushes.
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.event.starts_with(ASYNC_PREFIX)
    }

    /// Returns the action name of an `async.*` push.
    #[inline]
    #[must_use]
    pub fn async_action(&self) -> Option<&str> {
        self.event.strip_prefix(ASYNC_PREFIX)
    }

    /// Returns the payload, or `null` when absent.
    #[inline]
    #[must_use]
    pub fn data_or_null(&self) -> &Value {
        self.data.as_ref().unwrap_or(&Value::Null)
    }

    /// Parses the payload of a `hello` push.
    ///
    /// Returns `None` for any other event.
    #[must_use]
    pub fn hello_data(&self) -> Option<HelloData> {
        if !self.is_hello() {
            return None;
        }
        Some(HelloData::from_value(self.data_or_null()))
    }
}

// ============================================================================
// HelloData
// ============================================================================

/// Payload of the `hello` handshake.
///
/// Every field is optional on the wire; missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HelloData {
    /// Device-side connection flag.
    #[serde(default)]
    pub connected: bool,

    /// Name of the service that answered.
    #[serde(default)]
    pub service: String,

    /// Kiosk the service runs on.
    #[serde(default)]
    pub kiosk_name: String,
}

impl HelloData {
    /// Builds hello data from a raw payload, tolerating unexpected shapes.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_push_parsing() {
        let push: Push = serde_json::from_str(
            r#"{"event":"async.SCAN_DONE","data":{"ok":true},"from":"SCANNER"}"#,
        )
        .expect("parse");

        assert!(push.is_async());
        assert_eq!(push.async_action(), Some("SCAN_DONE"));
        assert_eq!(push.from, Some(json!("SCANNER")));
        assert!(!push.is_hello());
    }

    #[test]
    fn test_push_without_data() {
        let push: Push = serde_json::from_str(r#"{"event":"hello"}"#).expect("parse");
        assert!(push.is_hello());
        assert_eq!(push.data_or_null(), &Value::Null);
        assert_eq!(push.hello_data(), Some(HelloData::default()));
    }

    #[test]
    fn test_hello_data() {
        let push: Push = serde_json::from_str(
            r#"{"event":"hello","data":{"connected":true,"service":"CONTROL_PANEL","kiosk_name":"ns9999"}}"#,
        )
        .expect("parse");

        let hello = push.hello_data().expect("hello");
        assert!(hello.connected);
        assert_eq!(hello.service, "CONTROL_PANEL");
        assert_eq!(hello.kiosk_name, "ns9999");
    }

    #[test]
    fn test_hello_data_tolerates_bad_shape() {
        assert_eq!(HelloData::from_value(&json!("oops")), HelloData::default());
    }

    #[test]
    fn test_hello_data_only_for_hello() {
        let push: Push = serde_json::from_str(r#"{"event":"log_tail_line","data":"x"}"#)
            .expect("parse");
        assert!(push.hello_data().is_none());
    }
}
