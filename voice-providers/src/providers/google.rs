/// Google Cloud Speech-to-Text and Cloud Translation (v2) over REST
///
/// Both adapters authenticate with an API key passed as the `key` query
/// parameter.
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::capability::{Capability, Language, LanguageHint, ProviderName};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{http, SttAdapter, TranslateAdapter};
use crate::transcription::{SttOptions, Transcription, WordTimestamp};

pub const DEFAULT_SPEECH_BASE_URL: &str = "https://speech.googleapis.com";
pub const DEFAULT_TRANSLATE_BASE_URL: &str = "https://translation.googleapis.com";

/// Clips shorter than this cannot contain speech
const MIN_AUDIO_BYTES: usize = 10;

// ===== SPEECH-TO-TEXT =====

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
    #[serde(default)]
    language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    words: Vec<RecognizedWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecognizedWord {
    word: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

/// Parse a protobuf Duration rendered as JSON, e.g. `"1.300s"`
fn parse_offset(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.trim_end_matches('s').parse::<f64>().ok())
        .unwrap_or(0.0)
}

pub struct GoogleSttProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    /// Primary recognition language when the hint is `auto`
    auto_language: String,
    /// Extra candidates Google may detect when the hint is `auto`
    alternative_languages: Vec<String>,
}

impl GoogleSttProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        auto_language: impl Into<String>,
        alternative_languages: Vec<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            auto_language: auto_language.into(),
            alternative_languages,
        }
    }

    fn recognition_config(&self, options: &SttOptions) -> serde_json::Value {
        let (language_code, alternatives) = match options.language {
            LanguageHint::Auto => (self.auto_language.clone(), self.alternative_languages.clone()),
            LanguageHint::Fixed(lang) => (lang.regional_tag(), Vec::new()),
        };
        json!({
            "languageCode": language_code,
            "alternativeLanguageCodes": alternatives,
            "enableWordTimeOffsets": options.timestamps,
            "enableAutomaticPunctuation": true,
            "maxAlternatives": 1,
        })
    }

    fn fallback_language(&self, options: &SttOptions) -> Language {
        options
            .language
            .language()
            .or_else(|| self.auto_language.parse().ok())
            .unwrap_or(Language::En)
    }
}

#[async_trait]
impl SttAdapter for GoogleSttProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::Google
    }

    async fn transcribe(&self, audio: &[u8], options: &SttOptions) -> ProviderResult<Transcription> {
        let (provider, capability) = (ProviderName::Google, Capability::Stt);
        if audio.len() < MIN_AUDIO_BYTES {
            info!(provider = %provider, audio_bytes = audio.len(), "Audio too short, returning empty transcript");
            return Ok(Transcription::empty(self.fallback_language(options)));
        }

        info!(
            provider = %provider,
            audio_bytes = audio.len(),
            language = %options.language,
            timestamps = options.timestamps,
            "Starting transcription"
        );

        let payload = json!({
            "config": self.recognition_config(options),
            "audio": { "content": BASE64.encode(audio) },
        });
        let request = self
            .client
            .post(format!("{}/v1/speech:recognize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload);

        let body: RecognizeResponse = http::send_json(provider, capability, request).await?;

        let Some(result) = body.results.into_iter().next() else {
            info!(provider = %provider, "No speech detected");
            return Ok(Transcription::empty(self.fallback_language(options)));
        };
        let language = result
            .language_code
            .as_deref()
            .and_then(|code| code.parse().ok())
            .unwrap_or_else(|| self.fallback_language(options));
        let Some(best) = result.alternatives.into_iter().next() else {
            return Ok(Transcription::empty(language));
        };

        let timestamps = (options.timestamps && !best.words.is_empty()).then(|| {
            best.words
                .iter()
                .map(|w| WordTimestamp {
                    text: w.word.clone(),
                    start: parse_offset(w.start_time.as_deref()),
                    end: parse_offset(w.end_time.as_deref()),
                })
                .collect()
        });

        info!(
            provider = %provider,
            detected_language = %language,
            text_chars = best.transcript.chars().count(),
            confidence = best.confidence,
            "Transcription completed"
        );

        Ok(Transcription {
            text: best.transcript,
            language,
            confidence: best.confidence,
            timestamps,
        })
    }
}

// ===== TRANSLATION =====

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
}

pub struct GoogleTranslateProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleTranslateProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TranslateAdapter for GoogleTranslateProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::Google
    }

    async fn translate(&self, text: &str, source: Language, target: Language) -> ProviderResult<String> {
        let (provider, capability) = (ProviderName::Google, Capability::Translate);
        if text.trim().is_empty() {
            return Err(ProviderError::invalid_input(provider, capability, "text is empty"));
        }

        info!(
            provider = %provider,
            source = %source,
            target = %target,
            text_chars = text.chars().count(),
            "Starting translation"
        );

        let payload = json!({
            "q": text,
            "source": source.code(),
            "target": target.code(),
            "format": "text",
        });
        let request = self
            .client
            .post(format!("{}/language/translate/v2", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload);

        let body: TranslateResponse = http::send_json(provider, capability, request).await?;
        let translated = body
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::empty_result(provider, capability, "no translation returned"))?;

        Ok(translated)
    }
}
