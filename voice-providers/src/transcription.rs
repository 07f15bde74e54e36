use crate::capability::{Language, LanguageHint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options passed to speech-to-text
#[derive(Debug, Clone, Default)]
pub struct SttOptions {
    pub language: LanguageHint,
    pub timestamps: bool,
}

/// Word-level timing from speech-to-text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Speech-to-text result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub language: Language,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<WordTimestamp>>,
}

impl Transcription {
    pub fn empty(language: Language) -> Self {
        Self {
            text: String::new(),
            language,
            confidence: 0.0,
            timestamps: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Text-to-speech request
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub language: Language,
    /// Vendor voice id; the adapter picks a per-language default when absent
    pub voice_id: Option<String>,
    pub speed: f32,
}

/// Text-to-speech output
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// One utterance in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub language: Language,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, language: Language) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            language,
            timestamp: Utc::now(),
        }
    }

    pub fn agent(text: impl Into<String>, language: Language) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
            language,
            timestamp: Utc::now(),
        }
    }
}
