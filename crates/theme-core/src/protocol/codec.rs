//! JSON codec for theme messages and transport envelopes.
//!
//! Posted payloads arrive as loosely typed JSON values.  [`decode_message`]
//! classifies them without ever failing on *unknown* content; it only fails
//! when a payload claims to be a known message type but its fields do not
//! match.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::messages::{
    Envelope, InboundMessage, ThemeMessage, LOADING_TYPE, THEME_CHANGED_TYPE,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A payload carried a known `"type"` but its fields were invalid.
    #[error("malformed {message_type} payload: {source}")]
    MalformedPayload {
        message_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A transport frame was not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// A value could not be serialized to JSON.
    #[error("failed to serialize message: {0}")]
    Serialize(#[source] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`ThemeMessage`] into the JSON value that gets posted.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use theme_core::{encode_message, ThemeMessage};
///
/// let value = encode_message(&ThemeMessage::loading(true)).unwrap();
/// assert_eq!(value["type"], "loading");
/// ```
pub fn encode_message(message: &ThemeMessage) -> Result<Value, ProtocolError> {
    serde_json::to_value(message).map_err(ProtocolError::Serialize)
}

/// Classifies a posted payload.
///
/// - Objects whose `"type"` is `"loading"` or `"theme-changed"` are parsed
///   into [`InboundMessage::Known`].
/// - Everything else (other types, no type, non-objects) becomes
///   [`InboundMessage::Unknown`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] when a known type is missing
/// a field or has a field of the wrong JSON type.
pub fn decode_message(data: &Value) -> Result<InboundMessage, ProtocolError> {
    let message_type = match data.get("type") {
        Some(Value::String(t)) => t.as_str(),
        _ => return Ok(InboundMessage::Unknown { message_type: None }),
    };

    let known_type = match message_type {
        LOADING_TYPE => LOADING_TYPE,
        THEME_CHANGED_TYPE => THEME_CHANGED_TYPE,
        other => {
            return Ok(InboundMessage::Unknown {
                message_type: Some(other.to_string()),
            })
        }
    };

    serde_json::from_value::<ThemeMessage>(data.clone())
        .map(InboundMessage::Known)
        .map_err(|source| ProtocolError::MalformedPayload {
            message_type: known_type,
            source,
        })
}

/// Serializes an [`Envelope`] to a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if serialization fails.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(ProtocolError::Serialize)
}

/// Parses a JSON text frame into an [`Envelope`].
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedEnvelope`] if the frame is not valid
/// JSON or lacks `origin` / `targetOrigin` / `data`.
pub fn decode_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::MalformedEnvelope)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_theme_changed_is_known() {
        // Arrange
        let data = json!({"type": "theme-changed", "themeId": "dark"});

        // Act
        let decoded = decode_message(&data).unwrap();

        // Assert
        assert_eq!(
            decoded,
            InboundMessage::Known(ThemeMessage::theme_changed("dark"))
        );
    }

    #[test]
    fn test_decode_loading_is_known() {
        let decoded = decode_message(&json!({"type": "loading", "loading": true})).unwrap();
        assert_eq!(decoded, InboundMessage::Known(ThemeMessage::loading(true)));
    }

    #[test]
    fn test_decode_unknown_type_is_not_an_error() {
        let decoded = decode_message(&json!({"type": "resize", "height": 300})).unwrap();
        assert_eq!(
            decoded,
            InboundMessage::Unknown {
                message_type: Some("resize".to_string())
            }
        );
    }

    #[test]
    fn test_decode_missing_type_is_unknown() {
        let decoded = decode_message(&json!({"themeId": "dark"})).unwrap();
        assert_eq!(decoded, InboundMessage::Unknown { message_type: None });
    }

    #[test]
    fn test_decode_non_string_type_is_unknown() {
        let decoded = decode_message(&json!({"type": 7})).unwrap();
        assert_eq!(decoded, InboundMessage::Unknown { message_type: None });
    }

    #[test]
    fn test_decode_non_object_payload_is_unknown() {
        // Frameworks post plain strings across windows all the time.
        let decoded = decode_message(&json!("webpackHotUpdate")).unwrap();
        assert_eq!(decoded, InboundMessage::Unknown { message_type: None });
    }

    #[test]
    fn test_decode_theme_changed_without_theme_id_is_malformed() {
        let err = decode_message(&json!({"type": "theme-changed"})).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPayload {
                message_type: "theme-changed",
                ..
            }
        ));
    }

    #[test]
    fn test_decode_loading_with_string_flag_is_malformed() {
        let err = decode_message(&json!({"type": "loading", "loading": "yes"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPayload { .. }));
    }

    #[test]
    fn test_decode_ignores_extra_fields_on_known_type() {
        let decoded =
            decode_message(&json!({"type": "theme-changed", "themeId": "ocean", "extra": 1}))
                .unwrap();
        assert_eq!(
            decoded,
            InboundMessage::Known(ThemeMessage::theme_changed("ocean"))
        );
    }

    #[test]
    fn test_envelope_text_frame_decodes() {
        let text = concat!(
            r#"{"origin":"http://localhost:8000","targetOrigin":"https://localhost:7170","#,
            r#""data":{"type":"loading","loading":false}}"#
        );
        let env = decode_envelope(text).unwrap();
        assert_eq!(env.origin, "http://localhost:8000");
        assert_eq!(env.target_origin, "https://localhost:7170");
    }

    #[test]
    fn test_envelope_without_target_origin_is_rejected() {
        let text = r#"{"origin":"http://localhost:8000","data":{}}"#;
        assert!(matches!(
            decode_envelope(text),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_encode_envelope_produces_single_line_json() {
        let env = Envelope {
            origin: "https://localhost:7170".to_string(),
            target_origin: "http://localhost:8000".to_string(),
            data: encode_message(&ThemeMessage::loading(false)).unwrap(),
        };
        let text = encode_envelope(&env).unwrap();
        assert!(!text.contains('\n'));
        assert!(text.contains(r#""targetOrigin":"http://localhost:8000""#));
    }
}
