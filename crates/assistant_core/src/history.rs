//! Committed chat history and the in-flight assistant utterance.

use shared::domain::{Emotion, Speaker, Turn};

#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<Turn>,
}

impl ChatHistory {
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_assistant_emotion(&self) -> Option<Emotion> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Assistant)
            .and_then(|turn| turn.emotion)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingBuffer {
    text: String,
    emotion: Emotion,
}

impl StreamingBuffer {
    pub fn open(emotion: Emotion) -> Self {
        Self {
            text: String::new(),
            emotion,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_turn(self) -> Option<Turn> {
        if self.is_empty() {
            return None;
        }
        Some(Turn::assistant(self.text, self.emotion))
    }
}
