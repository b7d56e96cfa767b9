use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

impl ConnectionState {
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected)
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Sad,
    Excited,
    #[default]
    Neutral,
    Thoughtful,
    Caring,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Excited,
        Emotion::Neutral,
        Emotion::Thoughtful,
        Emotion::Caring,
        Emotion::Surprised,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Excited => "excited",
            Self::Neutral => "neutral",
            Self::Thoughtful => "thoughtful",
            Self::Caring => "caring",
            Self::Surprised => "surprised",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Happy => "😊",
            Self::Sad => "😢",
            Self::Excited => "😃",
            Self::Neutral => "😐",
            Self::Thoughtful => "🤔",
            Self::Caring => "🥰",
            Self::Surprised => "😮",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Emotion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|emotion| emotion.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown emotion '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            timestamp: Utc::now(),
            emotion: None,
        }
    }

    pub fn assistant(text: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            emotion: Some(emotion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idle_and_disconnected_can_start() {
        assert!(ConnectionState::Idle.can_start());
        assert!(ConnectionState::Disconnected.can_start());
        assert!(!ConnectionState::Connecting.can_start());
        assert!(!ConnectionState::Connected.can_start());
        assert!(!ConnectionState::Disconnecting.can_start());
    }

    #[test]
    fn emotion_serializes_as_lowercase_name() {
        let encoded = serde_json::to_string(&Emotion::Thoughtful).expect("encode");
        assert_eq!(encoded, "\"thoughtful\"");
        assert_eq!(Emotion::Caring.to_string(), "caring");
        assert_eq!(Emotion::default(), Emotion::Neutral);
    }

    #[test]
    fn emotion_parses_case_insensitively() {
        assert_eq!("Happy".parse::<Emotion>(), Ok(Emotion::Happy));
        assert!("furious".parse::<Emotion>().is_err());
    }

    #[test]
    fn user_turns_carry_no_emotion() {
        let turn = Turn::user("hello");
        assert_eq!(turn.speaker, Speaker::User);
        assert_eq!(turn.emotion, None);

        let reply = Turn::assistant("hi", Emotion::Happy);
        assert_eq!(reply.speaker, Speaker::Assistant);
        assert_eq!(reply.emotion, Some(Emotion::Happy));
    }
}
