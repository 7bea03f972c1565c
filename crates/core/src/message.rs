//! Control-channel message parsing
//!
//! The realtime service multiplexes a JSON text channel alongside the media
//! transport. The only shape this client acts on is
//! `{"type": "text", "text": {"value": ...}}`; everything else is ignored.
//! Control traffic is best-effort, so malformed payloads are discarded rather
//! than surfaced as errors.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ControlMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<TextPayload>,
}

#[derive(Debug, Deserialize)]
struct TextPayload {
    value: String,
}

/// Extract the transcript text from a control-channel payload.
///
/// Returns `None` for non-UTF-8 payloads, invalid JSON, and any recognized
/// JSON that is not a text event. Never panics on garbled input.
pub fn transcript_text(payload: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(payload).ok()?;
    let message: ControlMessage = serde_json::from_str(text).ok()?;
    if message.kind != "text" {
        return None;
    }
    message.text.map(|t| t.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_extracted() {
        let payload = br#"{"type":"text","text":{"value":"hello"}}"#;
        assert_eq!(transcript_text(payload), Some("hello".to_string()));
    }

    #[test]
    fn test_other_type_ignored() {
        assert_eq!(transcript_text(br#"{"type":"other"}"#), None);
    }

    #[test]
    fn test_text_type_without_payload_ignored() {
        assert_eq!(transcript_text(br#"{"type":"text"}"#), None);
    }

    #[test]
    fn test_invalid_json_ignored() {
        assert_eq!(transcript_text(b"{not json"), None);
    }

    #[test]
    fn test_non_utf8_ignored() {
        assert_eq!(transcript_text(&[0xff, 0xfe, 0x00]), None);
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let payload = br#"{"type":"text","text":{"value":"hi"},"id":"evt_1"}"#;
        assert_eq!(transcript_text(payload), Some("hi".to_string()));
    }
}
