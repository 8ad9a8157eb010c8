//! Voice-command classification.
//!
//! Speech-to-text is an external capability ([`Transcriber`]); this module
//! only maps a transcript onto an [`Action`] by keyword.  The first keyword
//! found in the transcript wins, so "go left, no, stop" drives left.

use teleop_types::{Action, TeleopError};

use crate::sensor::{Classifier, Sensor};

/// External speech-to-text capability.
pub trait Transcriber: Send {
    /// Block until one utterance has been transcribed.
    ///
    /// # Errors
    ///
    /// Returns [`TeleopError::Sensor`] when nothing intelligible was heard
    /// and [`TeleopError::SensorExhausted`] when the audio source is gone.
    fn transcribe(&mut self) -> Result<String, TeleopError>;
}

/// Adapts any [`Transcriber`] into a [`Sensor`] of transcripts.
pub struct TranscriptSensor<T> {
    transcriber: T,
}

impl<T: Transcriber> TranscriptSensor<T> {
    pub fn new(transcriber: T) -> Self {
        Self { transcriber }
    }
}

impl<T: Transcriber> Sensor for TranscriptSensor<T> {
    type Observation = String;

    fn acquire(&mut self) -> Result<String, TeleopError> {
        self.transcriber.transcribe()
    }
}

/// Map a transcript to an [`Action`]; `None` when no keyword is present.
pub fn parse_voice_command(text: &str) -> Option<Action> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .find_map(|word| keyword(&word.to_lowercase()))
}

fn keyword(word: &str) -> Option<Action> {
    match word {
        "forward" | "forwards" | "go" | "ahead" => Some(Action::Forward),
        "back" | "backward" | "backwards" | "reverse" => Some(Action::Back),
        "left" => Some(Action::Left),
        "right" => Some(Action::Right),
        "stop" | "halt" => Some(Action::Stop),
        _ => None,
    }
}

/// Classifier over speech transcripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoiceClassifier;

impl Classifier<String> for VoiceClassifier {
    fn classify(&mut self, transcript: &String) -> Option<Action> {
        parse_voice_command(transcript)
    }
}
