//! Framing codec — one named event plus a JSON payload per text frame.
//!
//! Wire form: `"2" + [eventName, payload]`.  The leading `2` marks an event
//! packet; every other packet type (pings, handshakes, acks) is reported as
//! [`Decoded::NotAnEvent`] so callers can ignore it without treating it as
//! an error.

use serde_json::Value;
use thiserror::Error;

/// Packet-type marker for event packets.
pub const EVENT_PACKET: char = '2';

/// A decoded `(event name, payload)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: String,
    /// `Value::Null` when the sender passed no payload.
    pub payload: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.event, &self.payload)
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(Envelope),
    /// Frame does not carry the event marker; not an error.
    NotAnEvent,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an event frame.
pub fn encode(event: &str, payload: &Value) -> String {
    // A two-element array of a string and an already-valid Value always
    // serializes, so the fallback never fires in practice.
    let body = serde_json::to_string(&(event, payload)).unwrap_or_else(|_| "[]".to_string());
    let mut frame = String::with_capacity(body.len() + 1);
    frame.push(EVENT_PACKET);
    frame.push_str(&body);
    frame
}

/// Decode an inbound frame.
pub fn decode(frame: &str) -> Result<Decoded, CodecError> {
    let Some(body) = frame.strip_prefix(EVENT_PACKET) else {
        return Ok(Decoded::NotAnEvent);
    };

    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut parts) = value else {
        return Err(CodecError::Malformed("expected a JSON array".to_string()));
    };
    if parts.is_empty() || parts.len() > 2 {
        return Err(CodecError::Malformed(format!(
            "expected [event, payload], got {} elements",
            parts.len()
        )));
    }
    let payload = if parts.len() == 2 {
        parts.pop().unwrap_or(Value::Null)
    } else {
        Value::Null
    };
    match parts.pop() {
        Some(Value::String(event)) => Ok(Decoded::Event(Envelope { event, payload })),
        _ => Err(CodecError::Malformed(
            "event name is not a string".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_query_bootstrap() {
        assert_eq!(encode("query", &Value::Null), r#"2["query",null]"#);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let cases = [
            Envelope::new("stop", Value::Null),
            Envelope::new("progress", json!({"elapsed": 12, "duration": 240})),
            Envelope::new("action", json!("playback.toggle")),
            Envelope::new("stations", json!([{"id": "1", "name": "Jazz \"Hot\" Club"}])),
        ];
        for env in cases {
            let decoded = decode(&env.encode()).unwrap();
            assert_eq!(decoded, Decoded::Event(env));
        }
    }

    #[test]
    fn test_non_event_frames_are_ignored() {
        for frame in ["", "3", "0{\"sid\":\"x\"}", "40", "probe", "[\"start\",null]"] {
            assert_eq!(decode(frame).unwrap(), Decoded::NotAnEvent, "{frame:?}");
        }
    }

    #[test]
    fn test_malformed_event_frames_error() {
        assert!(matches!(decode("2{not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode("2{}"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode("2[]"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode("2[1,2]"), Err(CodecError::Malformed(_))));
        assert!(matches!(decode("2[\"a\",1,2]"), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_missing_payload_decodes_as_null() {
        assert_eq!(
            decode(r#"2["stop"]"#).unwrap(),
            Decoded::Event(Envelope::new("stop", Value::Null))
        );
    }
}
