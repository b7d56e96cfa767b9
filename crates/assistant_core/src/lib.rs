pub mod controller;
pub mod emotion;
pub mod history;
pub mod projector;

pub use controller::{
    Captions, ControllerEvent, ControllerOptions, Session, SessionController, SessionSnapshot,
};
pub use emotion::{EmotionPicker, FixedEmotion, RandomEmotionPicker};
pub use history::{ChatHistory, StreamingBuffer};
pub use projector::{project, AvatarCue, ControlsEnabled, ViewModel};
