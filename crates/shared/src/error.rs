use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    PermissionDenied,
    TransportConnect,
    TransportTeardown,
    TransportRuntime,
    MalformedEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("Could not access the microphone")]
    PermissionDenied,
    #[error("Could not start the conversation: {0}")]
    TransportConnect(String),
    #[error("Could not end the conversation: {0}")]
    TransportTeardown(String),
    #[error("{0}")]
    TransportRuntime(String),
    #[error("malformed transport event: {0}")]
    MalformedEvent(String),
}

impl AssistantError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PermissionDenied => ErrorCode::PermissionDenied,
            Self::TransportConnect(_) => ErrorCode::TransportConnect,
            Self::TransportTeardown(_) => ErrorCode::TransportTeardown,
            Self::TransportRuntime(_) => ErrorCode::TransportRuntime,
            Self::MalformedEvent(_) => ErrorCode::MalformedEvent,
        }
    }
}

/// An error value of arbitrary shape as reported by the transport or raised
/// locally by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFault {
    Value(Value),
    Error(String),
}

impl TransportFault {
    /// Human-readable message: a non-empty `message` field first, then the
    /// value's own string form, then [`FALLBACK_ERROR_MESSAGE`].
    pub fn normalized_message(&self) -> String {
        let message = match self {
            Self::Value(value) => message_from_value(value),
            Self::Error(text) => non_empty(text),
        };
        message.unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
    }
}

fn message_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => non_empty(text),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Object(object) => match object.get("message") {
            Some(Value::String(text)) => non_empty(text),
            Some(scalar @ (Value::Bool(_) | Value::Number(_))) => Some(scalar.to_string()),
            _ => None,
        },
        Value::Array(_) => None,
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

impl From<Value> for TransportFault {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for TransportFault {
    fn from(value: Option<Value>) -> Self {
        Self::Value(value.unwrap_or(Value::Null))
    }
}

impl From<&str> for TransportFault {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

impl From<String> for TransportFault {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<AssistantError> for TransportFault {
    fn from(value: AssistantError) -> Self {
        Self::Error(value.to_string())
    }
}

impl From<anyhow::Error> for TransportFault {
    fn from(value: anyhow::Error) -> Self {
        Self::Error(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_embedded_message() {
        let fault = TransportFault::from(json!({"message": "socket closed", "code": 1006}));
        assert_eq!(fault.normalized_message(), "socket closed");
    }

    #[test]
    fn empty_or_missing_message_falls_back() {
        for fault in [
            TransportFault::from(json!({"message": ""})),
            TransportFault::from(json!({})),
            TransportFault::from(json!(null)),
            TransportFault::from(None::<Value>),
            TransportFault::from(""),
            TransportFault::from(json!([1, 2])),
        ] {
            assert_eq!(fault.normalized_message(), FALLBACK_ERROR_MESSAGE);
        }
    }

    #[test]
    fn bare_strings_and_scalars_use_their_text() {
        assert_eq!(
            TransportFault::from("plain string").normalized_message(),
            "plain string"
        );
        assert_eq!(TransportFault::from(json!(503)).normalized_message(), "503");
        assert_eq!(
            TransportFault::from(json!({"message": 42})).normalized_message(),
            "42"
        );
    }

    #[test]
    fn message_text_is_kept_verbatim() {
        assert_eq!(
            TransportFault::from("  x  ").normalized_message(),
            "  x  "
        );
        assert_eq!(
            TransportFault::from(json!({"message": "  "})).normalized_message(),
            "  "
        );
    }

    #[test]
    fn local_errors_keep_their_display_text() {
        let fault = TransportFault::from(AssistantError::PermissionDenied);
        assert_eq!(fault.normalized_message(), "Could not access the microphone");
        assert_eq!(
            AssistantError::TransportConnect("refused".into()).code(),
            ErrorCode::TransportConnect
        );
    }
}
