//! Speak: English text in, speech in the target language out
use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use voice_providers::{
    Language, ProviderError, ProviderName, ProviderRegistry, SynthesisRequest, SynthesizedAudio, TranslateAdapter,
    TtsAdapter, UnknownProviderError,
};

use crate::config::PipelineConfig;
use crate::pipeline::{pick, validate_speed};

/// Longest text accepted for synthesis
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakStage {
    Translating,
    Synthesizing,
    Done,
}

impl SpeakStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakStage::Translating => "translating",
            SpeakStage::Synthesizing => "synthesizing",
            SpeakStage::Done => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeakRequest {
    pub english_text: String,
    pub target_language: String,
    pub voice_speed: f32,
    pub voice_provider: Option<String>,
    pub voice_id: Option<String>,
}

impl Default for SpeakRequest {
    fn default() -> Self {
        Self {
            english_text: String::new(),
            target_language: Language::Ta.code().to_string(),
            voice_speed: 1.0,
            voice_provider: None,
            voice_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeakOutcome {
    pub audio: SynthesizedAudio,
    pub original_text: String,
    pub final_text: String,
    pub final_language: Language,
    pub tts_provider: ProviderName,
    pub translate_provider: Option<ProviderName>,
}

#[derive(Error, Debug)]
pub enum SpeakError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),

    #[error("Translation failed: {0}")]
    TranslationFailed(ProviderError),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(ProviderError),
}

/// Validated request with every adapter already resolved
struct SpeakPlan {
    text: String,
    target: Language,
    speed: f32,
    voice_id: Option<String>,
    tts: (ProviderName, Arc<dyn TtsAdapter>),
    translate: Option<(ProviderName, Arc<dyn TranslateAdapter>)>,
}

pub struct SpeakPipeline<'a> {
    registry: &'a ProviderRegistry,
    config: &'a PipelineConfig,
}

impl<'a> SpeakPipeline<'a> {
    pub fn new(registry: &'a ProviderRegistry, config: &'a PipelineConfig) -> Self {
        Self { registry, config }
    }

    fn plan(&self, request: SpeakRequest) -> Result<SpeakPlan, SpeakError> {
        let text = request.english_text.trim().to_string();
        if text.is_empty() {
            return Err(SpeakError::Validation("english_text must not be empty".to_string()));
        }
        if text.chars().count() > MAX_TEXT_CHARS {
            return Err(SpeakError::Validation(format!(
                "english_text must be at most {MAX_TEXT_CHARS} characters"
            )));
        }
        let speed = validate_speed(request.voice_speed).map_err(SpeakError::Validation)?;
        let target: Language = request
            .target_language
            .parse()
            .map_err(|e: voice_providers::UnsupportedLanguage| SpeakError::Validation(e.to_string()))?;

        let tts = pick(self.registry.tts(), request.voice_provider.as_deref(), self.config.default_tts)?;
        let translate = if target.is_english() {
            None
        } else {
            let name = self.config.translation.for_target(target);
            Some((name, self.registry.translate().resolve(name)?))
        };

        Ok(SpeakPlan {
            text,
            target,
            speed,
            voice_id: request.voice_id.filter(|id| !id.trim().is_empty()),
            tts,
            translate,
        })
    }

    pub async fn run(&self, request: SpeakRequest) -> Result<SpeakOutcome, SpeakError> {
        let plan = self.plan(request)?;
        let (tts_name, tts) = plan.tts;

        let final_text = match &plan.translate {
            Some((name, translator)) => {
                info!(
                    pipeline = "speak",
                    stage = SpeakStage::Translating.as_str(),
                    provider = %name,
                    target = %plan.target,
                    text_chars = plan.text.chars().count(),
                    "Pipeline stage started"
                );
                translator
                    .translate(&plan.text, Language::En, plan.target)
                    .await
                    .map_err(SpeakError::TranslationFailed)?
            }
            None => plan.text.clone(),
        };

        info!(
            pipeline = "speak",
            stage = SpeakStage::Synthesizing.as_str(),
            provider = %tts_name,
            language = %plan.target,
            speed = plan.speed,
            text_chars = final_text.chars().count(),
            "Pipeline stage started"
        );
        let audio = tts
            .synthesize(&SynthesisRequest {
                text: final_text.clone(),
                language: plan.target,
                voice_id: plan.voice_id,
                speed: plan.speed,
            })
            .await
            .map_err(SpeakError::SynthesisFailed)?;

        info!(
            pipeline = "speak",
            stage = SpeakStage::Done.as_str(),
            provider = %tts_name,
            audio_bytes = audio.bytes.len(),
            "Pipeline finished"
        );

        Ok(SpeakOutcome {
            audio,
            original_text: plan.text,
            final_text,
            final_language: plan.target,
            tts_provider: tts_name,
            translate_provider: plan.translate.map(|(name, _)| name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_providers::fakes::{FakeTranslate, FakeTts};
    use voice_providers::ProviderErrorKind;

    struct Fixture {
        registry: ProviderRegistry,
        google: Arc<FakeTranslate>,
        gemini: Arc<FakeTranslate>,
        tts: Arc<FakeTts>,
    }

    fn fixture(tts: FakeTts) -> Fixture {
        let google = Arc::new(FakeTranslate::new(ProviderName::Google));
        let gemini = Arc::new(FakeTranslate::new(ProviderName::Gemini));
        let tts = Arc::new(tts);
        let registry = ProviderRegistry::builder()
            .translate(google.clone())
            .translate(gemini.clone())
            .tts(tts.clone())
            .build()
            .unwrap();
        Fixture { registry, google, gemini, tts }
    }

    fn request(text: &str, target: &str) -> SpeakRequest {
        SpeakRequest {
            english_text: text.to_string(),
            target_language: target.to_string(),
            ..SpeakRequest::default()
        }
    }

    #[tokio::test]
    async fn tamil_goes_through_gemini_then_tts() {
        let f = fixture(FakeTts::new(ProviderName::ElevenLabs));
        let config = PipelineConfig::default();

        let outcome = SpeakPipeline::new(&f.registry, &config)
            .run(request("Take your tablets after food", "ta"))
            .await
            .unwrap();

        assert_eq!(outcome.final_text, "[ta] Take your tablets after food");
        assert_eq!(outcome.final_language, Language::Ta);
        assert_eq!(outcome.translate_provider, Some(ProviderName::Gemini));
        assert_eq!(f.gemini.calls().len(), 1);
        assert!(f.google.calls().is_empty());

        let requests = f.tts.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].text, outcome.final_text);
        assert_eq!(requests[0].language, Language::Ta);
        assert!(outcome.audio.bytes.starts_with(b"ID3"));
    }

    #[tokio::test]
    async fn english_target_skips_translation() {
        let f = fixture(FakeTts::new(ProviderName::ElevenLabs));
        let config = PipelineConfig::default();

        let outcome = SpeakPipeline::new(&f.registry, &config).run(request("Hello", "en")).await.unwrap();

        assert_eq!(outcome.final_text, "Hello");
        assert!(outcome.translate_provider.is_none());
        assert!(f.google.calls().is_empty() && f.gemini.calls().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_speed_fails_before_any_adapter_call() {
        let f = fixture(FakeTts::new(ProviderName::ElevenLabs));
        let config = PipelineConfig::default();

        let err = SpeakPipeline::new(&f.registry, &config)
            .run(SpeakRequest { voice_speed: 0.3, ..request("Hello", "ta") })
            .await
            .unwrap_err();

        assert!(matches!(err, SpeakError::Validation(_)));
        assert!(f.gemini.calls().is_empty());
        assert_eq!(f.tts.calls(), 0);
    }

    #[tokio::test]
    async fn blank_text_unknown_language_and_provider_are_rejected() {
        let f = fixture(FakeTts::new(ProviderName::ElevenLabs));
        let config = PipelineConfig::default();
        let pipeline = SpeakPipeline::new(&f.registry, &config);

        assert!(matches!(pipeline.run(request("   ", "ta")).await.unwrap_err(), SpeakError::Validation(_)));
        assert!(matches!(pipeline.run(request("Hi", "xx")).await.unwrap_err(), SpeakError::Validation(_)));

        let typo = SpeakRequest { voice_provider: Some("elevenlab".into()), ..request("Hi", "ta") };
        assert!(matches!(pipeline.run(typo).await.unwrap_err(), SpeakError::UnknownProvider(_)));

        assert!(f.gemini.calls().is_empty());
        assert_eq!(f.tts.calls(), 0);
    }

    #[tokio::test]
    async fn unroutable_target_fails_before_tts() {
        let registry = ProviderRegistry::builder()
            .tts(Arc::new(FakeTts::new(ProviderName::ElevenLabs)))
            .build()
            .unwrap();
        let config = PipelineConfig::default();

        let err = SpeakPipeline::new(&registry, &config).run(request("Hi", "ta")).await.unwrap_err();
        assert!(matches!(err, SpeakError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported() {
        let f = fixture(FakeTts::failing(ProviderName::ElevenLabs, ProviderErrorKind::QuotaExceeded));
        let config = PipelineConfig::default();

        let err = SpeakPipeline::new(&f.registry, &config).run(request("Hi", "en")).await.unwrap_err();
        assert!(matches!(err, SpeakError::SynthesisFailed(ref e) if e.is_quota_exceeded()));
    }
}
