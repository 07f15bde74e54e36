use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ApiResult;
use crate::handlers::{json_body, seconds, seconds_header};
use crate::pipeline::{SpeakOutcome, SpeakPipeline, SpeakRequest};
use crate::server::GatewayServer;

fn default_target() -> String {
    "ta".to_string()
}

fn default_speed() -> f32 {
    1.0
}

/// Speak request body, shared by `/v1/speak` and `/v1/speak/preview`
#[derive(Debug, Deserialize)]
pub struct SpeakBody {
    pub english_text: String,
    #[serde(default = "default_target")]
    pub target_language: String,
    #[serde(default = "default_speed")]
    pub voice_speed: f32,
    #[serde(default)]
    pub voice_provider: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

impl From<SpeakBody> for SpeakRequest {
    fn from(body: SpeakBody) -> Self {
        Self {
            english_text: body.english_text,
            target_language: body.target_language,
            voice_speed: body.voice_speed,
            voice_provider: body.voice_provider,
            voice_id: body.voice_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpeakPreviewResponse {
    pub success: bool,
    pub audio_base64: String,
    pub mime_type: &'static str,
    pub audio_size_bytes: usize,
    pub original_text: String,
    pub final_text: String,
    pub final_language: String,
    pub tts_provider: String,
    pub processing_time_sec: f64,
}

async fn synthesize(server: &GatewayServer, body: SpeakBody) -> ApiResult<SpeakOutcome> {
    let outcome = SpeakPipeline::new(&server.registry, &server.config.pipeline)
        .run(body.into())
        .await?;
    tracing::info!(
        tts_provider = %outcome.tts_provider,
        language = %outcome.final_language,
        audio_bytes = outcome.audio.bytes.len(),
        "Speak completed"
    );
    Ok(outcome)
}

/// English text to spoken audio in the target language
pub async fn speak(
    State(server): State<GatewayServer>,
    payload: Result<Json<SpeakBody>, JsonRejection>,
) -> ApiResult<Response> {
    let started = Instant::now();
    let body = json_body(payload)?;
    let outcome = synthesize(&server, body).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(outcome.audio.mime_type));
    headers.insert("x-final-language", HeaderValue::from_static(outcome.final_language.code()));
    headers.insert(
        "x-original-text-length",
        HeaderValue::from(outcome.original_text.chars().count()),
    );
    headers.insert("x-final-text-length", HeaderValue::from(outcome.final_text.chars().count()));
    headers.insert("x-processing-time", seconds_header(started.elapsed()));

    Ok((headers, outcome.audio.bytes).into_response())
}

/// Same as [`speak`], with the audio base64-encoded in a JSON envelope
pub async fn speak_preview(
    State(server): State<GatewayServer>,
    payload: Result<Json<SpeakBody>, JsonRejection>,
) -> ApiResult<Json<SpeakPreviewResponse>> {
    let started = Instant::now();
    let body = json_body(payload)?;
    let outcome = synthesize(&server, body).await?;

    Ok(Json(SpeakPreviewResponse {
        success: true,
        audio_size_bytes: outcome.audio.bytes.len(),
        audio_base64: STANDARD.encode(&outcome.audio.bytes),
        mime_type: outcome.audio.mime_type,
        original_text: outcome.original_text,
        final_text: outcome.final_text,
        final_language: outcome.final_language.code().to_string(),
        tts_provider: outcome.tts_provider.to_string(),
        processing_time_sec: seconds(started.elapsed()),
    }))
}
