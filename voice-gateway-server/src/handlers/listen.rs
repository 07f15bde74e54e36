use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::time::Instant;
use voice_providers::WordTimestamp;

use crate::error::{ApiError, ApiResult};
use crate::handlers::seconds;
use crate::pipeline::{ListenPipeline, ListenRequest};
use crate::server::GatewayServer;

#[derive(Debug, Serialize)]
pub struct ListenResponse {
    pub success: bool,
    pub original_text: String,
    pub original_language: String,
    pub language_name: &'static str,
    pub english_transcript: Option<String>,
    pub stt_provider: String,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_provider: Option<String>,
    pub confidence: f32,
    pub processing_time_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<WordTimestamp>>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_error: Option<String>,
}

fn multipart_error(err: impl std::fmt::Display) -> ApiError {
    ApiError::validation(format!("Invalid multipart body: {err}"))
}

fn parse_flag(raw: &str) -> ApiResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(ApiError::validation(format!("timestamps must be a boolean, got '{other}'"))),
    }
}

/// Read the multipart form into a [`ListenRequest`]
///
/// Audio comes from an `audio` (or `file`) part, or from `audio_base64`.
async fn read_form(mut form: Multipart) -> ApiResult<ListenRequest> {
    let mut request = ListenRequest::default();
    let mut audio: Option<Vec<u8>> = None;

    while let Some(field) = form.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" | "file" => {
                audio = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            "audio_base64" => {
                let text = field.text().await.map_err(multipart_error)?;
                if audio.is_none() && !text.trim().is_empty() {
                    let decoded = STANDARD
                        .decode(text.trim())
                        .map_err(|e| ApiError::validation(format!("audio_base64 is not valid base64: {e}")))?;
                    audio = Some(decoded);
                }
            }
            "stt_provider" => {
                let text = field.text().await.map_err(multipart_error)?;
                request.stt_provider = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            "language" => {
                let text = field.text().await.map_err(multipart_error)?;
                request.language = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            "timestamps" => {
                request.timestamps = parse_flag(&field.text().await.map_err(multipart_error)?)?;
            }
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    request.audio = audio.ok_or_else(|| ApiError::validation("Audio is required (audio file or audio_base64)"))?;
    Ok(request)
}

/// Speech to original and English transcript
pub async fn listen(
    State(server): State<GatewayServer>,
    form: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ListenResponse>> {
    let started = Instant::now();
    let form = form.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let request = read_form(form).await?;

    let outcome = ListenPipeline::new(&server.registry, &server.config.pipeline)
        .run(request)
        .await?;

    let degraded = outcome.degraded();
    let transcription = outcome.transcription;
    tracing::info!(
        stt_provider = %outcome.stt_provider,
        language = %transcription.language,
        transcript_chars = transcription.text.chars().count(),
        degraded,
        "Listen completed"
    );

    Ok(Json(ListenResponse {
        success: true,
        original_text: transcription.text,
        original_language: transcription.language.code().to_string(),
        language_name: transcription.language.english_name(),
        english_transcript: outcome.english_transcript,
        stt_provider: outcome.stt_provider.to_string(),
        fallback_used: outcome.fallback_used,
        translate_provider: outcome.translate_provider.map(|p| p.to_string()),
        confidence: transcription.confidence,
        processing_time_sec: seconds(started.elapsed()),
        timestamps: transcription.timestamps,
        degraded,
        translation_error: outcome.translation_error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_flag_accepts_common_spellings() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag(" On ").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
