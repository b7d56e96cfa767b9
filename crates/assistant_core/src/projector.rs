//! Pure mapping from a session snapshot to display primitives.

use serde::Serialize;
use shared::domain::{ConnectionState, Emotion, TransportStatus};

use crate::controller::SessionSnapshot;

pub const POWERED_OFF_CAPTION: &str = "Powered Off";
pub const PLACEHOLDER_CAPTION: &str = "Tap to speak";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvatarCue {
    pub is_speaking: bool,
    pub emotion: Emotion,
    pub emoji: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlsEnabled {
    pub power: bool,
    pub mute: bool,
    pub stop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_caption: Option<String>,
    pub avatar: AvatarCue,
    pub controls_enabled: ControlsEnabled,
    pub powered_indicator: bool,
    pub active: bool,
    pub muted: bool,
    pub power_label: &'static str,
    pub mute_label: &'static str,
    pub history_len: usize,
}

pub fn project(snapshot: &SessionSnapshot) -> ViewModel {
    let session = &snapshot.session;
    let connected = session.connection_state == ConnectionState::Connected;
    let is_speaking = connected
        && snapshot.transport_status == TransportStatus::Connected
        && snapshot.transport_speaking;

    let emotion = snapshot
        .buffer
        .as_ref()
        .map(|buffer| buffer.emotion())
        .or_else(|| snapshot.history.last_assistant_emotion())
        .unwrap_or_default();

    let subtitle = if !session.powered_on {
        POWERED_OFF_CAPTION.to_string()
    } else if session.subtitle.is_empty() {
        PLACEHOLDER_CAPTION.to_string()
    } else {
        session.subtitle.clone()
    };

    let streaming_caption = snapshot
        .buffer
        .as_ref()
        .filter(|buffer| is_speaking && !buffer.text().is_empty())
        .map(|buffer| buffer.text().to_string());

    let session_controls = session.powered_on && connected;

    ViewModel {
        subtitle,
        streaming_caption,
        avatar: AvatarCue {
            is_speaking,
            emotion,
            emoji: emotion.emoji(),
        },
        controls_enabled: ControlsEnabled {
            power: true,
            mute: session_controls,
            stop: session_controls,
        },
        powered_indicator: session.powered_on,
        active: connected,
        muted: session.muted,
        power_label: if session.powered_on {
            "Shut down"
        } else {
            "Power on"
        },
        mute_label: if session.muted { "Unmute" } else { "Mute" },
        history_len: snapshot.history.len(),
    }
}

#[cfg(test)]
#[path = "tests/projector_tests.rs"]
mod tests;
