use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::capability::{Capability, ProviderName};
use crate::error::ProviderConfigError;
use crate::providers::{elevenlabs, gemini, google, http, openai, sarvam};
use crate::registry::ProviderRegistry;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly voice assistant who speaks natural, \
colloquial Tamil mixed with the English words Tamil speakers use every day. Keep replies short \
enough to be spoken aloud, remember what the user already told you, greet only once, and ask \
at most two questions per reply. Respond with the reply only.";

/// Vendor credentials and settings
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub sarvam_api_key: Option<String>,
    pub sarvam_base_url: String,

    /// Shared by Google Speech, Google Translate and Gemini
    pub google_api_key: Option<String>,
    pub google_speech_base_url: String,
    pub google_translate_base_url: String,
    pub google_stt_language: String,
    pub google_stt_alt_languages: Vec<String>,

    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_base_url: String,
    pub elevenlabs_tts_model: String,
    pub elevenlabs_stt_model: String,
    pub elevenlabs_voice_ta: String,
    pub elevenlabs_voice_en: String,

    pub gemini_base_url: String,
    pub gemini_model: String,

    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,

    pub llm_system_prompt: String,
    /// Speech-to-text providers tried after the requested one
    pub stt_fallback: Vec<ProviderName>,
    pub request_timeout: Duration,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sarvam_api_key: None,
            sarvam_base_url: sarvam::DEFAULT_BASE_URL.to_string(),
            google_api_key: None,
            google_speech_base_url: google::DEFAULT_SPEECH_BASE_URL.to_string(),
            google_translate_base_url: google::DEFAULT_TRANSLATE_BASE_URL.to_string(),
            google_stt_language: "ta-IN".to_string(),
            google_stt_alt_languages: vec!["en-IN".to_string()],
            elevenlabs_api_key: None,
            elevenlabs_base_url: elevenlabs::DEFAULT_BASE_URL.to_string(),
            elevenlabs_tts_model: elevenlabs::DEFAULT_TTS_MODEL.to_string(),
            elevenlabs_stt_model: elevenlabs::DEFAULT_STT_MODEL.to_string(),
            elevenlabs_voice_ta: elevenlabs::DEFAULT_VOICE_TA.to_string(),
            elevenlabs_voice_en: elevenlabs::DEFAULT_VOICE_EN.to_string(),
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            openai_api_key: None,
            openai_base_url: openai::DEFAULT_BASE_URL.to_string(),
            openai_model: openai::DEFAULT_MODEL.to_string(),
            llm_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            stt_fallback: vec![ProviderName::Google],
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: String) -> String {
    env_string(key).unwrap_or(default)
}

/// Parse a comma-separated provider list such as `google,elevenlabs`
pub fn parse_provider_list(raw: &str) -> Result<Vec<ProviderName>, ProviderConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ProviderName>()
                .map_err(|e| ProviderConfigError::Config(e.to_string()))
        })
        .collect()
}

impl ProvidersConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ProviderConfigError> {
        let defaults = Self::default();

        let stt_fallback = match env_string("STT_FALLBACK") {
            Some(raw) if raw.eq_ignore_ascii_case("none") => Vec::new(),
            Some(raw) => parse_provider_list(&raw)?,
            None => defaults.stt_fallback.clone(),
        };

        let google_stt_alt_languages = env_string("GOOGLE_STT_ALT_LANGS")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_else(|| defaults.google_stt_alt_languages.clone());

        let request_timeout = std::env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            sarvam_api_key: env_string("SARVAM_API_KEY"),
            sarvam_base_url: env_or("SARVAM_BASE_URL", defaults.sarvam_base_url),
            google_api_key: env_string("GOOGLE_API_KEY"),
            google_speech_base_url: env_or("GOOGLE_SPEECH_BASE_URL", defaults.google_speech_base_url),
            google_translate_base_url: env_or("GOOGLE_TRANSLATE_BASE_URL", defaults.google_translate_base_url),
            google_stt_language: env_or("GOOGLE_STT_LANGUAGE", defaults.google_stt_language),
            google_stt_alt_languages,
            elevenlabs_api_key: env_string("ELEVENLABS_API_KEY"),
            elevenlabs_base_url: env_or("ELEVENLABS_BASE_URL", defaults.elevenlabs_base_url),
            elevenlabs_tts_model: env_or("ELEVENLABS_TTS_MODEL", defaults.elevenlabs_tts_model),
            elevenlabs_stt_model: env_or("ELEVENLABS_STT_MODEL", defaults.elevenlabs_stt_model),
            elevenlabs_voice_ta: env_or("ELEVENLABS_VOICE_ID_TA", defaults.elevenlabs_voice_ta),
            elevenlabs_voice_en: env_or("ELEVENLABS_VOICE_ID_EN", defaults.elevenlabs_voice_en),
            gemini_base_url: env_or("GEMINI_BASE_URL", defaults.gemini_base_url),
            gemini_model: env_or("GEMINI_MODEL", defaults.gemini_model),
            openai_api_key: env_string("OPENAI_API_KEY"),
            openai_base_url: env_or("OPENAI_BASE_URL", defaults.openai_base_url),
            openai_model: env_or("OPENAI_MODEL", defaults.openai_model),
            llm_system_prompt: env_or("LLM_SYSTEM_PROMPT", defaults.llm_system_prompt),
            stt_fallback,
            request_timeout,
        })
    }

    /// Register an adapter for every vendor whose credentials are present
    pub fn build_registry(&self) -> Result<ProviderRegistry, ProviderConfigError> {
        let client = http::build_client(self.request_timeout)?;
        let mut builder = ProviderRegistry::builder();

        if let Some(key) = &self.sarvam_api_key {
            builder = builder.stt(Arc::new(sarvam::SarvamSttProvider::new(
                client.clone(),
                key.clone(),
                self.sarvam_base_url.clone(),
            )));
        } else {
            warn!("SARVAM_API_KEY not set, Sarvam speech-to-text disabled");
        }

        if let Some(key) = &self.google_api_key {
            builder = builder
                .stt(Arc::new(google::GoogleSttProvider::new(
                    client.clone(),
                    key.clone(),
                    self.google_speech_base_url.clone(),
                    self.google_stt_language.clone(),
                    self.google_stt_alt_languages.clone(),
                )))
                .translate(Arc::new(google::GoogleTranslateProvider::new(
                    client.clone(),
                    key.clone(),
                    self.google_translate_base_url.clone(),
                )))
                .translate(Arc::new(gemini::GeminiTranslateProvider::new(
                    client.clone(),
                    key.clone(),
                    self.gemini_base_url.clone(),
                    self.gemini_model.clone(),
                )))
                .llm(Arc::new(gemini::GeminiLlmProvider::new(
                    client.clone(),
                    key.clone(),
                    self.gemini_base_url.clone(),
                    self.gemini_model.clone(),
                    self.llm_system_prompt.clone(),
                )));
        } else {
            warn!("GOOGLE_API_KEY not set, Google and Gemini providers disabled");
        }

        if let Some(key) = &self.elevenlabs_api_key {
            builder = builder
                .stt(Arc::new(elevenlabs::ElevenLabsSttProvider::new(
                    client.clone(),
                    key.clone(),
                    self.elevenlabs_base_url.clone(),
                    self.elevenlabs_stt_model.clone(),
                )))
                .tts(Arc::new(elevenlabs::ElevenLabsTtsProvider::new(
                    client.clone(),
                    key.clone(),
                    self.elevenlabs_base_url.clone(),
                    self.elevenlabs_tts_model.clone(),
                    self.elevenlabs_voice_ta.clone(),
                    self.elevenlabs_voice_en.clone(),
                )));
        } else {
            warn!("ELEVENLABS_API_KEY not set, ElevenLabs providers disabled");
        }

        if let Some(key) = &self.openai_api_key {
            builder = builder.llm(Arc::new(openai::OpenAiLlmProvider::new(
                client,
                key.clone(),
                self.openai_base_url.clone(),
                self.openai_model.clone(),
                self.llm_system_prompt.clone(),
            )));
        }

        // Only keep fallbacks that are actually registered
        let registered_stt: Vec<ProviderName> = self
            .stt_fallback
            .iter()
            .copied()
            .filter(|name| {
                let keep = match name {
                    ProviderName::Sarvam => self.sarvam_api_key.is_some(),
                    ProviderName::Google => self.google_api_key.is_some(),
                    ProviderName::ElevenLabs => self.elevenlabs_api_key.is_some(),
                    ProviderName::Gemini | ProviderName::OpenAi => false,
                };
                if !keep {
                    warn!(provider = %name, "Speech-to-text fallback provider is not configured, skipping");
                }
                keep
            })
            .collect();

        let registry = builder.fallback(Capability::Stt, registered_stt).build()?;

        for capability in Capability::ALL {
            let names: Vec<&str> = registry.registered(capability).iter().map(|n| n.as_str()).collect();
            info!(capability = %capability, providers = ?names, "Registered providers");
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_lists_parse_and_reject_typos() {
        assert_eq!(
            parse_provider_list("google, elevenlabs").unwrap(),
            vec![ProviderName::Google, ProviderName::ElevenLabs]
        );
        assert!(parse_provider_list("google,gogle").is_err());
        assert!(parse_provider_list("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn registry_only_contains_configured_vendors() {
        let config = ProvidersConfig {
            sarvam_api_key: Some("s".to_string()),
            google_api_key: Some("g".to_string()),
            ..ProvidersConfig::default()
        };
        let registry = config.build_registry().unwrap();

        assert_eq!(registry.registered(Capability::Stt), vec![ProviderName::Sarvam, ProviderName::Google]);
        assert_eq!(registry.registered(Capability::Translate), vec![ProviderName::Google, ProviderName::Gemini]);
        assert!(registry.registered(Capability::Tts).is_empty());
        assert_eq!(registry.registered(Capability::Llm), vec![ProviderName::Gemini]);
        assert_eq!(registry.stt().fallback_order(), &[ProviderName::Google]);
    }

    #[tokio::test]
    async fn unconfigured_fallbacks_are_dropped() {
        let config = ProvidersConfig {
            sarvam_api_key: Some("s".to_string()),
            ..ProvidersConfig::default()
        };
        let registry = config.build_registry().unwrap();
        assert!(registry.stt().fallback_order().is_empty());
    }
}
