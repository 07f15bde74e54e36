pub mod elevenlabs;
pub mod gemini;
pub mod google;
pub mod http;
pub mod openai;
pub mod sarvam;

use crate::capability::{Language, ProviderName};
use crate::error::ProviderResult;
use crate::transcription::{SttOptions, SynthesisRequest, SynthesizedAudio, Transcription, Turn};
use async_trait::async_trait;

/// Speech-to-text vendor
#[async_trait]
pub trait SttAdapter: Send + Sync {
    fn provider(&self) -> ProviderName;

    /// Transcribe audio bytes in one vendor call
    async fn transcribe(&self, audio: &[u8], options: &SttOptions) -> ProviderResult<Transcription>;
}

/// Text translation vendor
#[async_trait]
pub trait TranslateAdapter: Send + Sync {
    fn provider(&self) -> ProviderName;

    async fn translate(&self, text: &str, source: Language, target: Language) -> ProviderResult<String>;
}

/// Text-to-speech vendor
#[async_trait]
pub trait TtsAdapter: Send + Sync {
    fn provider(&self) -> ProviderName;

    async fn synthesize(&self, request: &SynthesisRequest) -> ProviderResult<SynthesizedAudio>;
}

/// Conversational LLM vendor
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    fn provider(&self) -> ProviderName;

    /// Produce the next agent reply; `history` ends with the latest user turn
    async fn reply(&self, history: &[Turn], language: Language) -> ProviderResult<String>;

    /// Hand-over summary of a finished pre-screening for the senior doctor
    async fn summarize(&self, history: &[Turn]) -> ProviderResult<String>;
}
