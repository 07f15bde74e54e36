//! Conversational turn: listen, think, speak
//!
//! The session mutex is taken only between vendor calls: once to append the
//! user turn and snapshot history, once to append the agent turn. No lock is
//! held across an `.await`. A TTS quota failure still completes the turn as
//! text only; history is already updated by then.
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use voice_providers::{
    contains_tamil_script, ready_for_closure, Language, LanguageHint, LlmAdapter, ProviderError, ProviderName, ProviderRegistry,
    RegistryError, SttAdapter, SttOptions, SynthesisRequest, SynthesizedAudio, TtsAdapter, Turn,
    UnknownProviderError, CLOSURE_MESSAGE,
};

use crate::config::PipelineConfig;
use crate::pipeline::{pick, transcribe, validate_audio, validate_speed};
use crate::sessions::{SessionError, SessionHandle, SessionStore, TurnPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStage {
    Listening,
    Thinking,
    Speaking,
    Done,
}

impl ConversationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStage::Listening => "listening",
            ConversationStage::Thinking => "thinking",
            ConversationStage::Speaking => "speaking",
            ConversationStage::Done => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub audio: Vec<u8>,
    pub session_id: Option<String>,
    pub stt_provider: Option<String>,
    pub llm_provider: Option<String>,
    pub tts_provider: Option<String>,
    pub voice_speed: f32,
    pub reset_conversation: bool,
}

impl Default for TurnRequest {
    fn default() -> Self {
        Self {
            audio: Vec::new(),
            session_id: None,
            stt_provider: None,
            llm_provider: None,
            tts_provider: None,
            voice_speed: 1.0,
            reset_conversation: false,
        }
    }
}

/// Audio for a finished turn, or why the turn ended as text only
#[derive(Debug, Clone)]
pub enum TurnAudio {
    Spoken(SynthesizedAudio),
    QuotaExceeded(ProviderError),
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub user_text: String,
    pub user_language: Language,
    /// Reply as produced by the LLM and stored in history
    pub reply_text: String,
    /// Text handed to TTS, translated when the user spoke Tamil
    pub spoken_text: String,
    pub spoken_language: Language,
    pub message_count: usize,
    pub stt_provider: ProviderName,
    pub fallback_used: bool,
    pub translation_error: Option<String>,
    /// Set when this turn closed the pre-screening
    pub screening: Option<ScreeningClosure>,
    pub audio: TurnAudio,
}

/// A pre-screening that ended with a hand-over to the senior doctor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningClosure {
    /// `None` when the summary request failed; the closure is still spoken
    pub doctor_summary: Option<String>,
}

impl TurnOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self.audio, TurnAudio::QuotaExceeded(_))
    }
}

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("No speech detected in audio")]
    NoSpeech { session_id: String },

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(ProviderError),

    #[error("Reply generation failed: {0}")]
    ReplyFailed(ProviderError),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(ProviderError),

    #[error(transparent)]
    Registry(RegistryError),
}

struct TurnPlan {
    audio: Vec<u8>,
    speed: f32,
    stt: ProviderName,
    llm: (ProviderName, Arc<dyn LlmAdapter>),
    tts: (ProviderName, Arc<dyn TtsAdapter>),
}

/// Language the LLM actually replied in
fn reply_language(reply: &str, user_language: Language) -> Language {
    if contains_tamil_script(reply) {
        Language::Ta
    } else if user_language == Language::Ta {
        Language::En
    } else {
        user_language
    }
}

pub struct ConversationPipeline<'a> {
    registry: &'a ProviderRegistry,
    sessions: &'a SessionStore,
    config: &'a PipelineConfig,
}

impl<'a> ConversationPipeline<'a> {
    pub fn new(registry: &'a ProviderRegistry, sessions: &'a SessionStore, config: &'a PipelineConfig) -> Self {
        Self { registry, sessions, config }
    }

    fn plan(&self, request: TurnRequest) -> Result<TurnPlan, ConversationError> {
        validate_audio(&request.audio, self.config.max_audio_bytes).map_err(ConversationError::Validation)?;
        let speed = validate_speed(request.voice_speed).map_err(ConversationError::Validation)?;
        let (stt, _): (ProviderName, Arc<dyn SttAdapter>) =
            pick(self.registry.stt(), request.stt_provider.as_deref(), self.config.default_stt)?;
        let llm = pick(self.registry.llm(), request.llm_provider.as_deref(), self.config.default_llm)?;
        let tts = pick(self.registry.tts(), request.tts_provider.as_deref(), self.config.default_tts)?;

        Ok(TurnPlan { audio: request.audio, speed, stt, llm, tts })
    }

    pub async fn run(&self, request: TurnRequest) -> Result<TurnOutcome, ConversationError> {
        let requested_id = request.session_id.clone();
        let reset = request.reset_conversation;
        let plan = self.plan(request)?;

        let handle = self.sessions.get_or_create(requested_id.as_deref())?;
        if reset {
            let cleared = handle.session.lock().clear();
            info!(session_id = %handle.id, cleared_turns = cleared, "Conversation reset requested");
        }

        let result = self.turn(&handle, plan).await;
        if result.is_err() {
            handle.session.lock().set_phase(TurnPhase::Listening);
        }
        result
    }

    async fn turn(&self, handle: &SessionHandle, plan: TurnPlan) -> Result<TurnOutcome, ConversationError> {
        let session_id = handle.id.clone();

        // Listening
        handle.session.lock().set_phase(TurnPhase::Listening);
        info!(
            pipeline = "conversation",
            stage = ConversationStage::Listening.as_str(),
            session_id = %session_id,
            provider = %plan.stt,
            audio_bytes = plan.audio.len(),
            "Pipeline stage started"
        );
        let options = SttOptions { language: LanguageHint::Auto, timestamps: false };
        let heard = transcribe(self.registry, plan.stt, &plan.audio, &options)
            .await
            .map_err(|err| match err {
                RegistryError::Provider(e) => ConversationError::TranscriptionFailed(e),
                RegistryError::UnknownProvider(e) => ConversationError::UnknownProvider(e),
                other => ConversationError::Registry(other),
            })?;

        if heard.value.is_empty() {
            return Err(ConversationError::NoSpeech { session_id });
        }
        let stt_provider = heard.provider;
        let fallback_used = heard.fallback_used();
        let user_text = heard.value.text.trim().to_string();
        let user_language = heard.value.language;

        let (context, screened) = {
            let mut session = handle.session.lock();
            session.append(Turn::user(user_text.clone(), user_language));
            session.set_phase(TurnPhase::Thinking);
            let history = session.history();
            let screened = (self.config.screening_closure && ready_for_closure(&history)).then_some(history);
            (session.recent(self.config.llm_context_turns), screened)
        };

        // Thinking
        let (llm_name, llm) = plan.llm;
        info!(
            pipeline = "conversation",
            stage = ConversationStage::Thinking.as_str(),
            session_id = %session_id,
            provider = %llm_name,
            user_language = %user_language,
            transcript_chars = user_text.chars().count(),
            context_turns = context.len(),
            "Pipeline stage started"
        );
        let (reply_text, screening) = match screened {
            Some(history) => {
                let closure = self.close_screening(&session_id, llm.as_ref(), &history).await;
                (CLOSURE_MESSAGE.to_string(), Some(closure))
            }
            None => {
                let reply = llm
                    .reply(&context, user_language)
                    .await
                    .map_err(ConversationError::ReplyFailed)?;
                (reply, None)
            }
        };
        let reply_lang = reply_language(&reply_text, user_language);

        let message_count = {
            let mut session = handle.session.lock();
            session.append(Turn::agent(reply_text.clone(), reply_lang));
            if let Some(summary) = screening.as_ref().and_then(|closure| closure.doctor_summary.clone()) {
                session.set_doctor_summary(summary);
            }
            session.set_phase(TurnPhase::Speaking);
            session.message_count()
        };

        // Speaking
        let (spoken_text, spoken_language, translation_error) =
            self.speakable_reply(&session_id, &reply_text, reply_lang, user_language).await;

        let (tts_name, tts) = plan.tts;
        info!(
            pipeline = "conversation",
            stage = ConversationStage::Speaking.as_str(),
            session_id = %session_id,
            provider = %tts_name,
            language = %spoken_language,
            text_chars = spoken_text.chars().count(),
            "Pipeline stage started"
        );
        let synthesis = tts
            .synthesize(&SynthesisRequest {
                text: spoken_text.clone(),
                language: spoken_language,
                voice_id: None,
                speed: plan.speed,
            })
            .await;

        let audio = match synthesis {
            Ok(audio) => TurnAudio::Spoken(audio),
            Err(err) if err.is_quota_exceeded() => {
                warn!(
                    session_id = %session_id,
                    provider = %tts_name,
                    "TTS quota exceeded, returning text-only reply"
                );
                TurnAudio::QuotaExceeded(err)
            }
            Err(err) => return Err(ConversationError::SynthesisFailed(err)),
        };

        handle.session.lock().set_phase(TurnPhase::Listening);
        info!(
            pipeline = "conversation",
            stage = ConversationStage::Done.as_str(),
            session_id = %session_id,
            message_count,
            degraded = matches!(audio, TurnAudio::QuotaExceeded(_)),
            "Pipeline finished"
        );

        Ok(TurnOutcome {
            session_id,
            user_text,
            user_language,
            reply_text,
            spoken_text,
            spoken_language,
            message_count,
            stt_provider,
            fallback_used,
            translation_error,
            screening,
            audio,
        })
    }

    /// Ask for the senior doctor's summary instead of another question
    async fn close_screening(&self, session_id: &str, llm: &dyn LlmAdapter, history: &[Turn]) -> ScreeningClosure {
        info!(
            session_id = %session_id,
            provider = %llm.provider(),
            history_turns = history.len(),
            "Screening complete, handing over to senior doctor"
        );
        match llm.summarize(history).await {
            Ok(summary) => {
                info!(session_id = %session_id, summary_chars = summary.chars().count(), "Doctor summary generated");
                ScreeningClosure { doctor_summary: Some(summary) }
            }
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "Doctor summary failed, closing without one");
                ScreeningClosure { doctor_summary: None }
            }
        }
    }

    /// Translate the reply into Tamil when the user spoke Tamil but the LLM did not.
    ///
    /// A translation failure speaks the untranslated reply instead of failing
    /// the turn.
    async fn speakable_reply(
        &self,
        session_id: &str,
        reply: &str,
        reply_lang: Language,
        user_language: Language,
    ) -> (String, Language, Option<String>) {
        if user_language != Language::Ta || reply_lang == Language::Ta {
            return (reply.to_string(), reply_lang, None);
        }

        let name = self.config.translation.for_target(Language::Ta);
        let translated = match self.registry.translate().resolve(name) {
            Ok(translator) => translator.translate(reply, reply_lang, Language::Ta).await,
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "Reply translator unavailable");
                return (reply.to_string(), reply_lang, Some(err.to_string()));
            }
        };

        match translated {
            Ok(text) => (text, Language::Ta, None),
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    provider = %name,
                    error = %err,
                    "Reply translation failed, speaking untranslated reply"
                );
                (reply.to_string(), reply_lang, Some(err.to_string()))
            }
        }
    }
}
