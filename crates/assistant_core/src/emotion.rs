use rand::seq::SliceRandom;
use shared::domain::Emotion;

/// Chooses the emotion attached to a newly opened assistant turn.
pub trait EmotionPicker: Send + Sync {
    fn pick(&self) -> Emotion;
}

pub struct RandomEmotionPicker;

impl EmotionPicker for RandomEmotionPicker {
    fn pick(&self) -> Emotion {
        Emotion::ALL
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
    }
}

pub struct FixedEmotion(pub Emotion);

impl EmotionPicker for FixedEmotion {
    fn pick(&self) -> Emotion {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_picker_stays_inside_the_set() {
        let picker = RandomEmotionPicker;
        for _ in 0..64 {
            assert!(Emotion::ALL.contains(&picker.pick()));
        }
    }

    #[test]
    fn fixed_picker_is_deterministic() {
        let picker = FixedEmotion(Emotion::Surprised);
        assert_eq!(picker.pick(), Emotion::Surprised);
        assert_eq!(picker.pick(), Emotion::Surprised);
    }
}
