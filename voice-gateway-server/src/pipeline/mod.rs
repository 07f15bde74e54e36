//! Request orchestration
//!
//! Each pipeline is a fixed sequence of stages over adapters resolved from the
//! [`ProviderRegistry`]. Provider names arrive as client strings and are
//! resolved before any vendor is called, so a typo never costs a vendor
//! request.

pub mod conversation;
pub mod listen;
pub mod speak;

pub use conversation::{ConversationError, ConversationPipeline, ConversationStage, ScreeningClosure, TurnAudio, TurnOutcome, TurnRequest};
pub use listen::{ListenError, ListenOutcome, ListenPipeline, ListenRequest, ListenStage};
pub use speak::{SpeakError, SpeakOutcome, SpeakPipeline, SpeakRequest, SpeakStage};

use std::sync::Arc;

use voice_providers::{
    FallbackOutcome, ProviderName, ProviderRegistry, ProviderTable, RegistryError, SttOptions, Transcription,
    UnknownProviderError,
};

pub const MIN_VOICE_SPEED: f32 = 0.5;
pub const MAX_VOICE_SPEED: f32 = 2.0;

/// Resolve the provider a client asked for, or `default` when the field was omitted
pub(crate) fn pick<A>(
    table: &ProviderTable<A>,
    requested: Option<&str>,
    default: ProviderName,
) -> Result<(ProviderName, Arc<A>), UnknownProviderError>
where
    A: ?Sized + Send + Sync,
{
    match requested.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => table.resolve_named(name),
        None => table.resolve(default).map(|adapter| (default, adapter)),
    }
}

pub(crate) fn validate_speed(speed: f32) -> Result<f32, String> {
    if speed.is_finite() && (MIN_VOICE_SPEED..=MAX_VOICE_SPEED).contains(&speed) {
        Ok(speed)
    } else {
        Err(format!(
            "voice_speed must be between {MIN_VOICE_SPEED} and {MAX_VOICE_SPEED}, got {speed}"
        ))
    }
}

pub(crate) fn validate_audio(audio: &[u8], max_bytes: usize) -> Result<(), String> {
    if audio.is_empty() {
        return Err("audio is empty".to_string());
    }
    if audio.len() > max_bytes {
        return Err(format!(
            "audio is {} bytes, larger than the {} byte limit",
            audio.len(),
            max_bytes
        ));
    }
    Ok(())
}

/// Transcribe through `requested` and then the configured STT fallbacks
pub(crate) async fn transcribe(
    registry: &ProviderRegistry,
    requested: ProviderName,
    audio: &[u8],
    options: &SttOptions,
) -> Result<FallbackOutcome<Transcription>, RegistryError> {
    let chain = registry.stt().chain(requested);
    registry
        .stt()
        .resolve_with_fallback(&chain, |stt| async move { stt.transcribe(audio, options).await })
        .await
}
