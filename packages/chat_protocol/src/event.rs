//! Chat events: the single unit of wire communication.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::identity::Identity;

/// One frame on a chat channel. All fields are flat; optional fields are
/// omitted from the encoding when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sender_id: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing: Option<bool>,
    /// RFC 3339 send time, stamped by the sending client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// What an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
    Message(&'a str),
    Typing,
    /// Neither `msg` nor `typing: true`. Routed like any other event.
    Empty,
}

impl Event {
    pub fn message(sender: Identity, receiver: Identity, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender,
            receiver_id: Some(receiver),
            msg: Some(text.into()),
            typing: None,
            timestamp: None,
        }
    }

    pub fn typing(sender: Identity, receiver: Identity) -> Self {
        Self {
            sender_id: sender,
            receiver_id: Some(receiver),
            msg: None,
            typing: Some(true),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// A present `msg` wins over the typing flag.
    pub fn kind(&self) -> EventKind<'_> {
        match (&self.msg, self.typing) {
            (Some(text), _) => EventKind::Message(text),
            (None, Some(true)) => EventKind::Typing,
            _ => EventKind::Empty,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Read only the routing destination of a raw frame, leaving the rest of the
/// payload untouched so it can be forwarded byte-for-byte.
///
/// Returns `Err` when the frame is not a JSON object, and `Ok(None)` when it
/// names no usable receiver.
pub fn peek_receiver(raw: &str) -> Result<Option<Identity>, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| ProtocolError::Malformed("event is not a JSON object".to_string()))?;
    Ok(object
        .get("receiver_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Identity::new(s).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    #[test]
    fn message_event_encoding_omits_absent_fields() {
        let event = Event::message(id("u1"), id("u2"), "hi");
        let json: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(json["sender_id"], "u1");
        assert_eq!(json["receiver_id"], "u2");
        assert_eq!(json["msg"], "hi");
        assert!(json.get("typing").is_none());
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn typing_event_encoding() {
        let event = Event::typing(id("u1"), id("u2"));
        let json: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(json["typing"], true);
        assert!(json.get("msg").is_none());
        assert_eq!(event.kind(), EventKind::Typing);
    }

    #[test]
    fn decode_message_with_explicit_false_typing() {
        let event =
            Event::decode(r#"{"sender_id":"u1","receiver_id":"u2","msg":"hi","typing":false}"#)
                .unwrap();
        assert_eq!(event.kind(), EventKind::Message("hi"));
        assert_eq!(event.typing, Some(false));
    }

    #[test]
    fn decode_typing_without_receiver() {
        // The original server relayed typing notices as {"typing": true, "sender_id": ...}
        let event = Event::decode(r#"{"typing":true,"sender_id":"u1"}"#).unwrap();
        assert_eq!(event.kind(), EventKind::Typing);
        assert!(event.receiver_id.is_none());
    }

    #[test]
    fn kind_empty_when_neither_field_is_set() {
        let event = Event::decode(r#"{"sender_id":"u1","receiver_id":"u2"}"#).unwrap();
        assert_eq!(event.kind(), EventKind::Empty);
        let event = Event::decode(r#"{"sender_id":"u1","typing":false}"#).unwrap();
        assert_eq!(event.kind(), EventKind::Empty);
    }

    #[test]
    fn decode_rejects_missing_sender() {
        let err = Event::decode(r#"{"receiver_id":"u2","msg":"hi"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn decode_rejects_empty_sender() {
        assert!(Event::decode(r#"{"sender_id":"","msg":"hi"}"#).is_err());
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(
            Event::decode("hello there"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let event =
            Event::decode(r#"{"sender_id":"u1","receiver_id":"u2","msg":"hi","_id":"abc"}"#)
                .unwrap();
        assert_eq!(event.msg.as_deref(), Some("hi"));
    }

    #[test]
    fn with_timestamp_sets_field() {
        let event = Event::message(id("u1"), id("u2"), "hi").with_timestamp("2026-01-01T00:00:00Z");
        let json: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(json["timestamp"], "2026-01-01T00:00:00Z");
    }

    #[test]
    fn peek_receiver_reads_destination_only() {
        let raw = r#"{"receiver_id":"u2","whatever":[1,2,3]}"#;
        assert_eq!(peek_receiver(raw).unwrap(), Some(id("u2")));
    }

    #[test]
    fn peek_receiver_none_when_missing_or_unusable() {
        assert_eq!(peek_receiver(r#"{"sender_id":"u1"}"#).unwrap(), None);
        assert_eq!(peek_receiver(r#"{"receiver_id":""}"#).unwrap(), None);
        assert_eq!(peek_receiver(r#"{"receiver_id":42}"#).unwrap(), None);
    }

    #[test]
    fn peek_receiver_rejects_non_objects() {
        assert!(peek_receiver("not json").is_err());
        assert!(peek_receiver("[1,2]").is_err());
        assert!(peek_receiver("\"u2\"").is_err());
    }
}
