/// ElevenLabs speech-to-text and text-to-speech
///
/// Synthesis requests longer than [`LONG_TEXT_CHARS`] are split at sentence
/// boundaries into chunks of at most [`CHUNK_CHARS`], synthesised one after
/// another and concatenated. MP3 frames concatenate cleanly.
use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::capability::{Capability, Language, LanguageHint, ProviderName};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{http, SttAdapter, TtsAdapter};
use crate::transcription::{SttOptions, SynthesisRequest, SynthesizedAudio, Transcription, WordTimestamp};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";
pub const DEFAULT_STT_MODEL: &str = "scribe_v1";
pub const DEFAULT_VOICE_TA: &str = "eh0hAHy3N3C9DE0uyHHD";
pub const DEFAULT_VOICE_EN: &str = "EXAVITQu4vr4xnSDxMaL";

pub const LONG_TEXT_CHARS: usize = 2500;
pub const CHUNK_CHARS: usize = 2000;

const MPEG: &str = "audio/mpeg";

// ===== SPEECH-TO-TEXT =====

#[derive(Debug, Deserialize)]
struct SpeechToTextResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    language_probability: Option<f32>,
    #[serde(default)]
    words: Vec<SpeechToTextWord>,
}

#[derive(Debug, Deserialize)]
struct SpeechToTextWord {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

pub struct ElevenLabsSttProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ElevenLabsSttProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SttAdapter for ElevenLabsSttProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::ElevenLabs
    }

    async fn transcribe(&self, audio: &[u8], options: &SttOptions) -> ProviderResult<Transcription> {
        let (provider, capability) = (ProviderName::ElevenLabs, Capability::Stt);
        if audio.is_empty() {
            return Err(ProviderError::invalid_input(provider, capability, "audio is empty"));
        }

        info!(
            provider = %provider,
            audio_bytes = audio.len(),
            language = %options.language,
            "Starting transcription"
        );

        let mut form = Form::new()
            .part("file", http::audio_part(provider, capability, audio)?)
            .text("model_id", self.model.clone());
        if let LanguageHint::Fixed(lang) = options.language {
            form = form.text("language_code", lang.code());
        }
        if options.timestamps {
            form = form.text("timestamps_granularity", "word");
        }

        let request = self
            .client
            .post(format!("{}/v1/speech-to-text", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form);

        let body: SpeechToTextResponse = http::send_json(provider, capability, request).await?;

        let language = body
            .language_code
            .as_deref()
            .and_then(|code| code.parse().ok())
            .or(options.language.language())
            .unwrap_or(Language::En);

        let timestamps = options.timestamps.then(|| {
            body.words
                .iter()
                .filter(|w| w.kind.as_deref().map_or(true, |k| k == "word"))
                .map(|w| WordTimestamp { text: w.text.clone(), start: w.start, end: w.end })
                .collect()
        });

        Ok(Transcription {
            text: body.text.trim().to_string(),
            language,
            confidence: body.language_probability.unwrap_or(0.9),
            timestamps,
        })
    }
}

// ===== TEXT-TO-SPEECH =====

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

#[derive(Debug, Serialize)]
struct TextToSpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

pub struct ElevenLabsTtsProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice_ta: String,
    voice_en: String,
}

impl ElevenLabsTtsProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        voice_ta: impl Into<String>,
        voice_en: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            voice_ta: voice_ta.into(),
            voice_en: voice_en.into(),
        }
    }

    /// Tamil voice for Tamil text, English voice for everything else
    fn default_voice(&self, language: Language) -> &str {
        match language {
            Language::Ta => &self.voice_ta,
            _ => &self.voice_en,
        }
    }

    async fn synthesize_chunk(&self, text: &str, voice_id: &str, speed: f32) -> ProviderResult<Vec<u8>> {
        let body = TextToSpeechBody {
            text,
            model_id: &self.model,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
                style: 0.0,
                use_speaker_boost: true,
                speed: ((speed - 1.0).abs() > f32::EPSILON).then_some(speed),
            },
        };

        let request = self
            .client
            .post(format!("{}/v1/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, MPEG)
            .json(&body);

        http::send_bytes(ProviderName::ElevenLabs, Capability::Tts, request).await
    }
}

#[async_trait]
impl TtsAdapter for ElevenLabsTtsProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::ElevenLabs
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> ProviderResult<SynthesizedAudio> {
        let (provider, capability) = (ProviderName::ElevenLabs, Capability::Tts);
        if request.text.trim().is_empty() {
            return Err(ProviderError::invalid_input(provider, capability, "text is empty"));
        }

        let voice_id = request
            .voice_id
            .as_deref()
            .unwrap_or_else(|| self.default_voice(request.language));
        let text_chars = request.text.chars().count();

        info!(
            provider = %provider,
            language = %request.language,
            voice_id = voice_id,
            speed = request.speed,
            text_chars = text_chars,
            "Starting synthesis"
        );

        let chunks = if text_chars > LONG_TEXT_CHARS {
            split_into_chunks(&request.text, CHUNK_CHARS)
        } else {
            vec![request.text.clone()]
        };

        let mut bytes = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            debug!(chunk = index, chunk_chars = chunk.chars().count(), total = chunks.len(), "Synthesising chunk");
            bytes.extend(self.synthesize_chunk(chunk, voice_id, request.speed).await?);
        }

        if bytes.is_empty() {
            return Err(ProviderError::empty_result(provider, capability, "no audio returned"));
        }

        info!(provider = %provider, audio_bytes = bytes.len(), chunks = chunks.len(), "Synthesis completed");
        Ok(SynthesizedAudio { bytes, mime_type: MPEG })
    }
}

fn sentence_boundary() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?।]+\s+").ok()).as_ref()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` into chunks of at most `max_chars`, preferring sentence then word boundaries
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut sentences = Vec::new();
    match sentence_boundary() {
        Some(pattern) => {
            let mut start = 0;
            for boundary in pattern.find_iter(text) {
                sentences.push(text.get(start..boundary.end()).unwrap_or_default());
                start = boundary.end();
            }
            sentences.push(text.get(start..).unwrap_or_default());
        }
        None => sentences.push(text),
    }

    let mut pieces = Vec::new();
    for sentence in sentences.into_iter().map(str::trim).filter(|s| !s.is_empty()) {
        if char_len(sentence) <= max_chars {
            pieces.push(sentence.to_string());
            continue;
        }
        for word in sentence.split_whitespace() {
            if char_len(word) <= max_chars {
                pieces.push(word.to_string());
            } else {
                let chars: Vec<char> = word.chars().collect();
                pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            }
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if current.is_empty() {
            current = piece;
        } else if char_len(&current) + 1 + char_len(&piece) <= max_chars {
            current.push(' ');
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = piece;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
