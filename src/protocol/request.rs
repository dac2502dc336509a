//! Request and Response message types.
//!
//! Defines the message format for requests sent to the control panel
//! and the correlated responses it sends back.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Push;

// ============================================================================
// Constants
// ============================================================================

/// Message used when a refused response carries no error strings.
pub const GENERIC_FAILURE: &str = "Request failed";

// ============================================================================
// Request
// ============================================================================

/// A request from the client to the control panel.
///
/// # Format
///
/// ```json
/// { "id": 1, "event": "take_image", "data": { "camera": "top" } }
/// ```
///
/// `data` is left out entirely when there is nothing to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Request event name, e.g. `get_status_snapshot`.
    pub event: String,

    /// Optional payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Request {
    /// Creates a new request.
    ///
    /// `null` and empty-object payloads are dropped so they are omitted on the wire.
    #[must_use]
    pub fn new(id: RequestId, event: impl Into<String>, data: Option<Value>) -> Self {
        let data = data.filter(|value| match value {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            _ => true,
        });

        Self {
            id,
            event: event.into(),
            data,
        }
    }

    /// Serializes the request into frame text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Response
// ============================================================================

/// A message from the control panel carrying a request id.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1, "success": true, "data": { "ok": true } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "success": false, "errors": ["Unknown event"] }
/// ```
///
/// A frame may carry both an `id` and an `event`. It is treated as a response
/// when the id is pending, and as a push otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Explicit outcome. Only `Some(false)` counts as a refusal.
    #[serde(default)]
    pub success: Option<bool>,

    /// Result data.
    #[serde(default)]
    pub data: Option<Value>,

    /// Server error strings (if refused).
    #[serde(default)]
    pub errors: Option<Vec<Value>>,

    /// Event name, when the server tagged the response with one.
    #[serde(default)]
    pub event: Option<String>,

    /// Originating service, when present.
    #[serde(default)]
    pub from: Option<Value>,
}

impl Response {
    /// Returns `true` unless the server sent `success: false`.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success != Some(false)
    }

    /// Returns the server error strings, stringifying non-string entries.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flatten()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    /// Converts the response into the caller-facing outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestFailed`] if the server sent `success: false`.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let messages = self.error_messages();
        let message = if messages.is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            messages.join(", ")
        };
        Err(Error::request_failed(self.id, message))
    }

    /// Reinterprets an uncorrelated response as a push, if it names an event.
    #[must_use]
    pub fn into_push(self) -> Option<Push> {
        let event = self.event?;
        Some(Push {
            event,
            data: self.data,
            from: self.from,
        })
    }

    /// Deserializes `data` into a typed value.
    ///
    /// A missing `data` field is treated as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `data` does not match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.data.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Gets a string value from the data.
    ///
    /// Returns empty string if key not found or not a string.
    #[inline]
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.data
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Gets a u64 value from the data.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.data
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    /// Gets a boolean value from the data.
    ///
    /// Returns false if key not found or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.data
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
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
    fn test_request_serialization() {
        let request = Request::new(RequestId::new(1), "take_image", Some(json!({"camera": "top"})));
        let json = request.to_frame().expect("serialize");
        assert_eq!(json, r#"{"id":1,"event":"take_image","data":{"camera":"top"}}"#);
    }

    #[test]
    fn test_request_omits_empty_data() {
        let empty = Request::new(RequestId::new(1), "get_status", Some(json!({})));
        assert_eq!(empty.to_frame().expect("serialize"), r#"{"id":1,"event":"get_status"}"#);

        let null = Request::new(RequestId::new(2), "get_status", Some(Value::Null));
        assert!(null.data.is_none());

        let none = Request::new(RequestId::new(3), "get_status", None);
        assert!(none.data.is_none());
    }

    #[test]
    fn test_request_keeps_scalar_data() {
        let request = Request::new(RequestId::new(4), "log_tail_start", Some(json!(0)));
        assert_eq!(request.data, Some(json!(0)));
    }

    #[test]
    fn test_success_response() {
        let response: Response =
            serde_json::from_str(r#"{"id":1,"success":true,"data":{"ok":true}}"#).expect("parse");
        assert!(response.is_success());
        assert!(response.get_bool("ok"));

        let response = response.into_result().expect("should succeed");
        assert_eq!(response.id, RequestId::new(1));
    }

    #[test]
    fn test_missing_success_is_not_a_refusal() {
        let response: Response = serde_json::from_str(r#"{"id":2,"data":5}"#).expect("parse");
        assert!(response.is_success());
        assert!(response.into_result().is_ok());
    }

    #[test]
    fn test_failure_joins_errors() {
        let response: Response = serde_json::from_str(
            r#"{"id":3,"success":false,"errors":["Unknown event","retry later"]}"#,
        )
        .expect("parse");

        let err = response.into_result().expect_err("should fail");
        match err {
            Error::RequestFailed {
                request_id,
                message,
            } => {
                assert_eq!(request_id, RequestId::new(3));
                assert_eq!(message, "Unknown event, retry later");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_failure_without_errors_uses_generic_message() {
        for text in [
            r#"{"id":4,"success":false}"#,
            r#"{"id":4,"success":false,"errors":[]}"#,
        ] {
            let response: Response = serde_json::from_str(text).expect("parse");
            let err = response.into_result().expect_err("should fail");
            assert_eq!(err.to_string(), GENERIC_FAILURE);
        }
    }

    #[test]
    fn test_non_string_errors_are_stringified() {
        let response: Response =
            serde_json::from_str(r#"{"id":5,"success":false,"errors":["bad",7]}"#).expect("parse");
        assert_eq!(response.error_messages(), vec!["bad".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_into_push_requires_event() {
        let tagged: Response =
            serde_json::from_str(r#"{"id":9,"event":"log_tail_line","data":"x"}"#).expect("parse");
        let push = tagged.into_push().expect("has event");
        assert_eq!(push.event, "log_tail_line");
        assert_eq!(push.data, Some(json!("x")));

        let untagged: Response = serde_json::from_str(r#"{"id":9,"success":true}"#).expect("parse");
        assert!(untagged.into_push().is_none());
    }

    #[test]
    fn test_data_as() {
        #[derive(Deserialize)]
        struct Count {
            connection_count: u32,
        }

        let response: Response =
            serde_json::from_str(r#"{"id":1,"success":true,"data":{"connection_count":2}}"#)
                .expect("parse");
        let count: Count = response.data_as().expect("typed data");
        assert_eq!(count.connection_count, 2);
        assert_eq!(response.get_u64("connection_count"), 2);
        assert_eq!(response.get_string("missing"), "");
    }
}
