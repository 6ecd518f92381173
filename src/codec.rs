//! Encoding of outgoing commands and validated decoding of incoming events.
//!
//! Decoding happens once, at the boundary. Everything past [`decode`] works
//! with the closed [`ServerEvent`] enum and never checks field presence.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{Command, ServerEvent};

/// Why an incoming frame could not be turned into a [`ServerEvent`].
///
/// Both variants are recoverable: the frame is discarded and the session
/// carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame is not a JSON object, or a known event is missing fields.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The `type` discriminator is missing or not one this client knows.
    #[error("unknown event type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnknownType(Option<String>),
}

/// Serialize a command into a single text frame.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`] if serialization fails.
pub fn encode(command: &Command) -> Result<String, serde_json::Error> {
    serde_json::to_string(command)
}

/// Parse and validate one incoming text frame.
///
/// # Errors
///
/// - [`DecodeError::Malformed`] if the frame is not a JSON object, or the
///   event's required fields are missing or have the wrong type.
/// - [`DecodeError::UnknownType`] if `type` is absent, not a string, or
///   unrecognized.
pub fn decode(frame: &str) -> Result<ServerEvent, DecodeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(map) = &value else {
        return Err(DecodeError::Malformed("frame is not a JSON object".into()));
    };

    match map.get("type") {
        Some(Value::String(kind)) if ServerEvent::is_known_type(kind) => {}
        Some(Value::String(kind)) => return Err(DecodeError::UnknownType(Some(kind.clone()))),
        Some(other) => return Err(DecodeError::UnknownType(Some(other.to_string()))),
        None => return Err(DecodeError::UnknownType(None)),
    }

    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_invalid_json() {
        let err = decode("{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(matches!(
            decode("[1, 2, 3]").unwrap_err(),
            DecodeError::Malformed(_)
        ));
        assert!(matches!(
            decode("\"LOBBY_CREATED\"").unwrap_err(),
            DecodeError::Malformed(_)
        ));
    }

    #[test]
    fn decode_missing_type_is_unknown() {
        assert_eq!(
            decode(r#"{"code":"1234"}"#).unwrap_err(),
            DecodeError::UnknownType(None)
        );
    }

    #[test]
    fn decode_unrecognized_type_is_unknown() {
        assert_eq!(
            decode(r#"{"type":"UNKNOWN_EVENT"}"#).unwrap_err(),
            DecodeError::UnknownType(Some("UNKNOWN_EVENT".into()))
        );
    }

    #[test]
    fn decode_non_string_type_is_unknown() {
        assert!(matches!(
            decode(r#"{"type":7}"#).unwrap_err(),
            DecodeError::UnknownType(Some(_))
        ));
    }

    #[test]
    fn decode_known_type_with_missing_field_is_malformed() {
        assert!(matches!(
            decode(r#"{"type":"ROUND_START","round":2}"#).unwrap_err(),
            DecodeError::Malformed(_)
        ));
    }

    #[test]
    fn decode_is_case_sensitive_for_gamestate() {
        assert!(decode(r#"{"type":"gamestate","msg":"Correct!"}"#).is_ok());
        assert!(matches!(
            decode(r#"{"type":"GAMESTATE","msg":"Correct!"}"#).unwrap_err(),
            DecodeError::UnknownType(_)
        ));
    }

    #[test]
    fn unknown_type_display_mentions_missing() {
        let err = DecodeError::UnknownType(None);
        assert_eq!(err.to_string(), "unknown event type: <missing>");
    }

    #[test]
    fn encode_produces_flat_object() {
        let frame = encode(&Command::Join {
            code: "4821".into(),
            username: "Ada".into(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["command"], "JOIN");
        assert_eq!(value["code"], "4821");
        assert_eq!(value["username"], "Ada");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }
}
