/// Sarvam AI speech-to-text
///
/// Sarvam's `saarika` models are tuned for Indian languages and are the
/// default first hop for speech-to-text.
use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::info;

use crate::capability::{Capability, Language, LanguageHint, ProviderName};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{http, SttAdapter};
use crate::transcription::{SttOptions, Transcription, WordTimestamp};

pub const DEFAULT_BASE_URL: &str = "https://api.sarvam.ai";
pub const DEFAULT_MODEL: &str = "saarika:v2.5";

/// Sarvam reports no confidence score
const ASSUMED_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Deserialize)]
struct SarvamResponse {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    timestamps: Option<Vec<SarvamTimestamp>>,
}

#[derive(Debug, Deserialize)]
struct SarvamTimestamp {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
}

pub struct SarvamSttProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl SarvamSttProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    fn language_code(hint: LanguageHint) -> &'static str {
        match hint {
            LanguageHint::Auto => "unknown",
            LanguageHint::Fixed(lang) => lang.code(),
        }
    }

    /// Sarvam returns BCP-47 tags; only Tamil is distinguished, everything else reads as English
    fn detected_language(code: Option<&str>) -> Language {
        match code.and_then(|c| c.parse::<Language>().ok()) {
            Some(Language::Ta) => Language::Ta,
            _ => Language::En,
        }
    }
}

#[async_trait]
impl SttAdapter for SarvamSttProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::Sarvam
    }

    async fn transcribe(&self, audio: &[u8], options: &SttOptions) -> ProviderResult<Transcription> {
        let (provider, capability) = (ProviderName::Sarvam, Capability::Stt);
        if audio.is_empty() {
            return Err(ProviderError::invalid_input(provider, capability, "audio is empty"));
        }

        info!(
            provider = %provider,
            audio_bytes = audio.len(),
            language = %options.language,
            timestamps = options.timestamps,
            "Starting transcription"
        );

        let mut form = Form::new()
            .part("file", http::audio_part(provider, capability, audio)?)
            .text("model", self.model.clone())
            .text("language_code", Self::language_code(options.language));
        if options.timestamps {
            form = form.text("with_timestamps", "true");
        }

        let request = self
            .client
            .post(format!("{}/speech-to-text/transcribe", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form);

        let body: SarvamResponse = http::send_json(provider, capability, request).await?;
        if body.transcript.trim().is_empty() {
            return Err(ProviderError::empty_result(provider, capability, "no transcript returned"));
        }

        let language = Self::detected_language(body.language_code.as_deref());
        let timestamps = if options.timestamps {
            body.timestamps.map(|items| {
                items
                    .into_iter()
                    .map(|ts| WordTimestamp { text: ts.text, start: ts.start, end: ts.end })
                    .collect()
            })
        } else {
            None
        };

        info!(
            provider = %provider,
            detected_language = %language,
            text_chars = body.transcript.chars().count(),
            "Transcription completed"
        );

        Ok(Transcription {
            text: body.transcript,
            language,
            confidence: ASSUMED_CONFIDENCE,
            timestamps,
        })
    }
}
