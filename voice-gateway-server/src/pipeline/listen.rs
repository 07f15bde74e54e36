//! Listen: speech in, original transcript plus English transcript out
use thiserror::Error;
use tracing::{info, warn};
use voice_providers::{
    Language, LanguageHint, ProviderError, ProviderName, ProviderRegistry, RegistryError, SttOptions,
    Transcription, UnknownProviderError,
};

use crate::config::{PartialPolicy, PipelineConfig};
use crate::pipeline::{pick, transcribe, validate_audio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenStage {
    Transcribing,
    Translating,
    Done,
}

impl ListenStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenStage::Transcribing => "transcribing",
            ListenStage::Translating => "translating",
            ListenStage::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListenRequest {
    pub audio: Vec<u8>,
    pub stt_provider: Option<String>,
    /// `auto` or a language code
    pub language: Option<String>,
    pub timestamps: bool,
}

#[derive(Debug, Clone)]
pub struct ListenOutcome {
    pub transcription: Transcription,
    /// `None` only when translation failed and partial results are allowed
    pub english_transcript: Option<String>,
    pub stt_provider: ProviderName,
    pub fallback_used: bool,
    pub translate_provider: Option<ProviderName>,
    pub translation_error: Option<String>,
}

impl ListenOutcome {
    pub fn degraded(&self) -> bool {
        self.translation_error.is_some()
    }
}

#[derive(Error, Debug)]
pub enum ListenError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(ProviderError),

    #[error("Translation failed: {0}")]
    TranslationFailed(ProviderError),

    #[error(transparent)]
    Registry(RegistryError),
}

pub struct ListenPipeline<'a> {
    registry: &'a ProviderRegistry,
    config: &'a PipelineConfig,
}

impl<'a> ListenPipeline<'a> {
    pub fn new(registry: &'a ProviderRegistry, config: &'a PipelineConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(&self, request: ListenRequest) -> Result<ListenOutcome, ListenError> {
        validate_audio(&request.audio, self.config.max_audio_bytes).map_err(ListenError::Validation)?;
        let language: LanguageHint = request
            .language
            .as_deref()
            .unwrap_or("auto")
            .parse()
            .map_err(|e: voice_providers::UnsupportedLanguage| ListenError::Validation(e.to_string()))?;
        let (stt_name, _) = pick(self.registry.stt(), request.stt_provider.as_deref(), self.config.default_stt)?;

        info!(
            pipeline = "listen",
            stage = ListenStage::Transcribing.as_str(),
            provider = %stt_name,
            language = %language,
            audio_bytes = request.audio.len(),
            "Pipeline stage started"
        );

        let options = SttOptions { language, timestamps: request.timestamps };
        let outcome = transcribe(self.registry, stt_name, &request.audio, &options)
            .await
            .map_err(|err| match err {
                RegistryError::Provider(e) => ListenError::TranscriptionFailed(e),
                RegistryError::UnknownProvider(e) => ListenError::UnknownProvider(e),
                other => ListenError::Registry(other),
            })?;

        let fallback_used = outcome.fallback_used();
        let stt_provider = outcome.provider;
        let transcription = outcome.value;

        let mut result = ListenOutcome {
            english_transcript: Some(String::new()),
            transcription,
            stt_provider,
            fallback_used,
            translate_provider: None,
            translation_error: None,
        };

        if result.transcription.is_empty() {
            info!(pipeline = "listen", provider = %stt_provider, "Empty transcript, skipping translation");
        } else if result.transcription.language.is_english() {
            result.english_transcript = Some(result.transcription.text.clone());
        } else {
            let source = result.transcription.language;
            let translate_name = self.config.translation.for_target(Language::En);
            let translator = self.registry.translate().resolve(translate_name)?;

            info!(
                pipeline = "listen",
                stage = ListenStage::Translating.as_str(),
                provider = %translate_name,
                source = %source,
                text_chars = result.transcription.text.chars().count(),
                "Pipeline stage started"
            );
            result.translate_provider = Some(translate_name);

            match translator.translate(&result.transcription.text, source, Language::En).await {
                Ok(english) => result.english_transcript = Some(english),
                Err(err) => match self.config.listen_partial {
                    PartialPolicy::Reject => return Err(ListenError::TranslationFailed(err)),
                    PartialPolicy::ReturnOriginal => {
                        warn!(
                            pipeline = "listen",
                            provider = %translate_name,
                            error = %err,
                            "Translation failed, returning original transcript only"
                        );
                        result.english_transcript = None;
                        result.translation_error = Some(err.to_string());
                    }
                },
            }
        }

        info!(
            pipeline = "listen",
            stage = ListenStage::Done.as_str(),
            provider = %result.stt_provider,
            fallback_used = result.fallback_used,
            language = %result.transcription.language,
            transcript_chars = result.transcription.text.chars().count(),
            degraded = result.degraded(),
            "Pipeline finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use voice_providers::fakes::{FakeStt, FakeTranslate, TranslateCall};
    use voice_providers::{Capability, ProviderErrorKind};

    struct Fixture {
        registry: ProviderRegistry,
        sarvam: Arc<FakeStt>,
        google_stt: Arc<FakeStt>,
        google_translate: Arc<FakeTranslate>,
    }

    fn fixture(sarvam: FakeStt, translate: FakeTranslate) -> Fixture {
        let sarvam = Arc::new(sarvam);
        let google_stt = Arc::new(FakeStt::echo(ProviderName::Google, Language::Ta));
        let google_translate = Arc::new(translate);
        let registry = ProviderRegistry::builder()
            .stt(sarvam.clone())
            .stt(google_stt.clone())
            .translate(google_translate.clone())
            .fallback(Capability::Stt, vec![ProviderName::Google])
            .build()
            .unwrap();
        Fixture { registry, sarvam, google_stt, google_translate }
    }

    fn request(audio: &str) -> ListenRequest {
        ListenRequest { audio: audio.as_bytes().to_vec(), ..ListenRequest::default() }
    }

    #[tokio::test]
    async fn english_audio_skips_translation() {
        let f = fixture(FakeStt::echo(ProviderName::Sarvam, Language::En), FakeTranslate::new(ProviderName::Google));
        let config = PipelineConfig::default();

        let outcome = ListenPipeline::new(&f.registry, &config).run(request("book a cab")).await.unwrap();

        assert_eq!(outcome.english_transcript.as_deref(), Some("book a cab"));
        assert_eq!(outcome.transcription.text, "book a cab");
        assert!(f.google_translate.calls().is_empty());
        assert!(!outcome.fallback_used);
    }

    #[tokio::test]
    async fn tamil_audio_is_translated_exactly_once() {
        let f = fixture(FakeStt::echo(ProviderName::Sarvam, Language::Ta), FakeTranslate::new(ProviderName::Google));
        let config = PipelineConfig::default();

        let outcome = ListenPipeline::new(&f.registry, &config).run(request("தலை வலிக்குது")).await.unwrap();

        assert_eq!(
            f.google_translate.calls(),
            vec![TranslateCall { text: "தலை வலிக்குது".into(), source: Language::Ta, target: Language::En }]
        );
        assert_eq!(outcome.english_transcript.as_deref(), Some("[en] தலை வலிக்குது"));
        assert_eq!(outcome.translate_provider, Some(ProviderName::Google));
    }

    #[tokio::test]
    async fn empty_transcript_skips_translation() {
        let f = fixture(
            FakeStt::new(ProviderName::Sarvam, Transcription::empty(Language::Ta)),
            FakeTranslate::new(ProviderName::Google),
        );
        let config = PipelineConfig::default();

        let outcome = ListenPipeline::new(&f.registry, &config).run(request("...")).await.unwrap();
        assert_eq!(outcome.english_transcript.as_deref(), Some(""));
        assert!(f.google_translate.calls().is_empty());
    }

    #[tokio::test]
    async fn sarvam_failure_falls_back_to_google() {
        let f = fixture(
            FakeStt::failing(ProviderName::Sarvam, ProviderErrorKind::Network),
            FakeTranslate::new(ProviderName::Google),
        );
        let config = PipelineConfig::default();

        let outcome = ListenPipeline::new(&f.registry, &config).run(request("வணக்கம்")).await.unwrap();
        assert_eq!(outcome.stt_provider, ProviderName::Google);
        assert!(outcome.fallback_used);
        assert_eq!(f.sarvam.calls(), 1);
        assert_eq!(f.google_stt.calls(), 1);
    }

    #[tokio::test]
    async fn translation_failure_follows_partial_policy() {
        let f = fixture(
            FakeStt::echo(ProviderName::Sarvam, Language::Ta),
            FakeTranslate::failing(ProviderName::Google, ProviderErrorKind::Network),
        );

        let strict = PipelineConfig::default();
        let err = ListenPipeline::new(&f.registry, &strict).run(request("வணக்கம்")).await.unwrap_err();
        assert!(matches!(err, ListenError::TranslationFailed(_)));

        let lenient = PipelineConfig { listen_partial: PartialPolicy::ReturnOriginal, ..PipelineConfig::default() };
        let outcome = ListenPipeline::new(&f.registry, &lenient).run(request("வணக்கம்")).await.unwrap();
        assert!(outcome.degraded());
        assert_eq!(outcome.english_transcript, None);
        assert_eq!(outcome.transcription.text, "வணக்கம்");
    }

    #[tokio::test]
    async fn bad_input_is_rejected_before_any_vendor_call() {
        let f = fixture(FakeStt::echo(ProviderName::Sarvam, Language::Ta), FakeTranslate::new(ProviderName::Google));
        let config = PipelineConfig { max_audio_bytes: 8, ..PipelineConfig::default() };
        let pipeline = ListenPipeline::new(&f.registry, &config);

        let empty = pipeline.run(request("")).await.unwrap_err();
        assert!(matches!(empty, ListenError::Validation(_)));

        let too_big = pipeline.run(request("much too long")).await.unwrap_err();
        assert!(matches!(too_big, ListenError::Validation(_)));

        let bad_language = ListenRequest { language: Some("klingon".into()), ..request("ok") };
        assert!(matches!(pipeline.run(bad_language).await.unwrap_err(), ListenError::Validation(_)));

        let typo = ListenRequest { stt_provider: Some("sarvm".into()), ..request("ok") };
        assert!(matches!(pipeline.run(typo).await.unwrap_err(), ListenError::UnknownProvider(_)));

        assert_eq!(f.sarvam.calls(), 0);
        assert_eq!(f.google_stt.calls(), 0);
    }
}
