//! Incoming frame decoding.
//!
//! Each text frame is decoded once into an [`IncomingMessage`] before it is
//! routed. Frames that are not clean JSON get one salvage attempt: the text
//! between the first `{` and the last `}` is parsed on its own, which recovers
//! payloads that logging or proxy layers padded with trailing junk.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::{Push, Response};

// ============================================================================
// IncomingMessage
// ============================================================================

/// A decoded server message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Carries a numeric id; may also carry an event name.
    Response(Response),
    /// Has no usable id; routed by event name.
    Push(Push),
}

impl IncomingMessage {
    /// Returns the event name, if any.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        match self {
            Self::Response(response) => response.event.as_deref(),
            Self::Push(push) => Some(&push.event),
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one text frame.
///
/// Returns `Ok(None)` for empty or whitespace-only frames.
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] when the text holds no JSON object, or
/// when the object has neither a usable id nor an event name.
///
/// A usable id always yields a [`IncomingMessage::Response`]: other fields
/// of the wrong type are read as absent rather than failing the frame.
pub fn decode_frame(text: &str) -> Result<Option<IncomingMessage>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let object = parse_object(text)?;
    classify(object).map(Some)
}

/// Parses frame text into a JSON object, salvaging embedded JSON if needed.
fn parse_object(text: &str) -> Result<Map<String, Value>> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(direct) => salvage(text).ok_or_else(|| {
            Error::malformed_frame(format!("invalid JSON ({direct}), nothing to salvage"))
        })?,
    };

    match value {
        Value::Object(object) => Ok(object),
        other => Err(Error::malformed_frame(format!(
            "expected JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

/// Parses the outermost `{...}` span of the text.
fn salvage(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Routes a JSON object to its message shape.
fn classify(object: Map<String, Value>) -> Result<IncomingMessage> {
    if let Some(id) = object.get("id").and_then(request_id_of) {
        return Ok(IncomingMessage::Response(response_from(id, object)));
    }

    if object.get("event").is_some_and(Value::is_string) {
        let push = serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::malformed_frame(format!("bad push: {e}")))?;
        return Ok(IncomingMessage::Push(push));
    }

    let errors = object
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|joined| !joined.is_empty());

    Err(match errors {
        Some(errors) => Error::malformed_frame(format!("uncorrelated server error: {errors}")),
        None => Error::malformed_frame("message has neither id nor event"),
    })
}

/// Reads a request id: a non-negative integer, or a float with no fraction.
fn request_id_of(value: &Value) -> Option<RequestId> {
    if let Some(id) = value.as_u64() {
        return Some(RequestId::new(id));
    }

    let float = value.as_f64()?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = (float >= 0.0 && float.fract() == 0.0 && float < u64::MAX as f64)
        .then_some(float as u64)?;
    Some(RequestId::new(whole))
}

/// Builds a response field by field, dropping values of the wrong type.
fn response_from(id: RequestId, mut object: Map<String, Value>) -> Response {
    let errors = match object.remove("errors") {
        None | Some(Value::Null) => None,
        Some(Value::Array(errors)) => Some(errors),
        Some(single) => Some(vec![single]),
    };

    Response {
        id,
        success: object.get("success").and_then(Value::as_bool),
        data: object.remove("data").filter(|data| !data.is_null()),
        errors,
        event: match object.remove("event") {
            Some(Value::String(event)) => Some(event),
            _ => None,
        },
        from: object.remove("from").filter(|from| !from.is_null()),
    }
}

/// Short JSON type name for log messages.
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
