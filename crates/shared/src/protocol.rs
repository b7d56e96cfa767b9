use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportFault;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub agent_id: String,
}

#[derive(Debug, Clone)]
pub enum TransportSignal {
    Connected,
    Disconnected,
    Message(Value),
    Error(TransportFault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    AgentResponseChunk { text: String },
    TranscriptionChunk { text: String },
    AgentResponseFinished,
    RawMessage { text: String },
    Connected,
    Disconnected,
    Unrecognized(UnrecognizedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedEvent {
    pub kind: Option<String>,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "agentResponse", alias = "agent_response")]
    AgentResponse { text: String },
    #[serde(rename = "transcription", alias = "user_transcript")]
    Transcription { text: String },
    #[serde(rename = "agentResponseFinished", alias = "agent_response_finished")]
    AgentResponseFinished,
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "disconnected")]
    Disconnected,
}

impl From<WireMessage> for TransportEvent {
    fn from(value: WireMessage) -> Self {
        match value {
            WireMessage::AgentResponse { text } => Self::AgentResponseChunk { text },
            WireMessage::Transcription { text } => Self::TranscriptionChunk { text },
            WireMessage::AgentResponseFinished => Self::AgentResponseFinished,
            WireMessage::Connected => Self::Connected,
            WireMessage::Disconnected => Self::Disconnected,
        }
    }
}

impl TransportEvent {
    fn unrecognized(kind: Option<&str>, reason: impl Into<String>) -> Self {
        Self::Unrecognized(UnrecognizedEvent {
            kind: kind.map(str::to_string),
            reason: reason.into(),
        })
    }

    /// Decodes a transport message payload. A `type` field selects the event
    /// kind; an untyped object with a string `message` is a raw caption.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::unrecognized(None, "payload is not an object");
        };

        if let Some(kind) = object.get("type") {
            let kind_name = kind.as_str();
            return match WireMessage::deserialize(value) {
                Ok(message) => message.into(),
                Err(err) => Self::unrecognized(kind_name, err.to_string()),
            };
        }

        match object.get("message") {
            Some(Value::String(text)) => Self::RawMessage { text: text.clone() },
            Some(_) => Self::unrecognized(None, "message field is not a string"),
            None => Self::unrecognized(None, "payload has neither type nor message"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentResponseChunk { .. } => "agent_response_chunk",
            Self::TranscriptionChunk { .. } => "transcription_chunk",
            Self::AgentResponseFinished => "agent_response_finished",
            Self::RawMessage { .. } => "raw_message",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_agent_response_chunk() {
        let event = TransportEvent::from_value(&json!({"type": "agentResponse", "text": "Hi"}));
        assert_eq!(
            event,
            TransportEvent::AgentResponseChunk {
                text: "Hi".to_string()
            }
        );
    }

    #[test]
    fn accepts_snake_case_aliases() {
        let event =
            TransportEvent::from_value(&json!({"type": "user_transcript", "text": "hello"}));
        assert_eq!(
            event,
            TransportEvent::TranscriptionChunk {
                text: "hello".to_string()
            }
        );

        let event = TransportEvent::from_value(&json!({"type": "agent_response_finished"}));
        assert_eq!(event, TransportEvent::AgentResponseFinished);
    }

    #[test]
    fn finished_ignores_extra_fields() {
        let event =
            TransportEvent::from_value(&json!({"type": "agentResponseFinished", "id": 4}));
        assert_eq!(event, TransportEvent::AgentResponseFinished);
    }

    #[test]
    fn untyped_message_is_raw_caption() {
        let event = TransportEvent::from_value(&json!({"message": "Thinking"}));
        assert_eq!(
            event,
            TransportEvent::RawMessage {
                text: "Thinking".to_string()
            }
        );
    }

    #[test]
    fn missing_text_is_unrecognized() {
        let event = TransportEvent::from_value(&json!({"type": "agentResponse"}));
        match event {
            TransportEvent::Unrecognized(unrecognized) => {
                assert_eq!(unrecognized.kind.as_deref(), Some("agentResponse"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_and_odd_shapes_are_unrecognized() {
        for payload in [
            json!({"type": "ping"}),
            json!({"type": 7}),
            json!({"message": 12}),
            json!({}),
            json!("plain"),
            json!(null),
        ] {
            assert!(
                matches!(
                    TransportEvent::from_value(&payload),
                    TransportEvent::Unrecognized(_)
                ),
                "payload should be unrecognized: {payload}"
            );
        }
        assert_eq!(
            TransportEvent::from_value(&json!([1])).kind(),
            "unrecognized"
        );
    }
}
