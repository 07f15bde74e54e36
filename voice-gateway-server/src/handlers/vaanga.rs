//! "Vaanga pesalam" (come, let's talk): voice conversation endpoints
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{json_body, seconds_header};
use crate::pipeline::{ConversationPipeline, TurnAudio, TurnOutcome, TurnRequest};
use crate::server::GatewayServer;
use crate::sessions::SessionSummary;

fn default_speed() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct VaangaBody {
    /// Base64 audio, optionally as a `data:` URL
    pub audio_data: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub stt_provider: Option<String>,
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub tts_provider: Option<String>,
    #[serde(default = "default_speed")]
    pub voice_speed: f32,
    #[serde(default)]
    pub reset_conversation: bool,
}

/// Text-only turn returned when the voice quota is exhausted
#[derive(Debug, Serialize)]
pub struct DegradedResponse {
    pub message: String,
    pub error_type: &'static str,
    pub text_response: String,
    pub session_id: String,
    pub user_transcript: String,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub session_id: String,
    pub cleared_messages: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
    pub success: bool,
    pub session_id: String,
}

/// Decode `audio_data`, accepting a `data:<mime>;base64,` prefix
pub fn decode_audio(raw: &str) -> ApiResult<Vec<u8>> {
    let payload = match raw.trim().split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw.trim(),
    };
    let audio = STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::validation(format!("audio_data is not valid base64: {e}")))?;
    if audio.is_empty() {
        return Err(ApiError::validation("audio_data must not be empty"));
    }
    Ok(audio)
}

fn text_header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or(HeaderValue::from_static("invalid"))
}

fn encoded_header(text: &str) -> HeaderValue {
    text_header(&STANDARD.encode(text.as_bytes()))
}

/// Headers shared by spoken and degraded turns
fn turn_headers(outcome: &TurnOutcome, started: Instant) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-session-id", text_header(&outcome.session_id));
    headers.insert("x-user-transcript", encoded_header(&outcome.user_text));
    headers.insert("x-user-language", HeaderValue::from_static(outcome.user_language.code()));
    headers.insert("x-ai-response", encoded_header(&outcome.reply_text));
    headers.insert("x-ai-language", HeaderValue::from_static(outcome.spoken_language.code()));
    headers.insert("x-message-count", HeaderValue::from(outcome.message_count));
    headers.insert("x-stt-provider", HeaderValue::from_static(outcome.stt_provider.as_str()));
    headers.insert("x-processing-time", seconds_header(started.elapsed()));
    if let Some(closure) = &outcome.screening {
        headers.insert("x-screening-complete", HeaderValue::from_static("true"));
        if let Some(summary) = &closure.doctor_summary {
            headers.insert("x-doctor-summary", encoded_header(summary));
        }
    }
    headers
}

/// One conversational turn: speech in, spoken reply out
pub async fn converse(
    State(server): State<GatewayServer>,
    payload: Result<Json<VaangaBody>, JsonRejection>,
) -> ApiResult<Response> {
    let started = Instant::now();
    let body = json_body(payload)?;
    let request = TurnRequest {
        audio: decode_audio(&body.audio_data)?,
        session_id: body.session_id.filter(|id| !id.trim().is_empty()),
        stt_provider: body.stt_provider,
        llm_provider: body.llm_provider,
        tts_provider: body.tts_provider,
        voice_speed: body.voice_speed,
        reset_conversation: body.reset_conversation,
    };

    let outcome = ConversationPipeline::new(&server.registry, &server.sessions, &server.config.pipeline)
        .run(request)
        .await?;
    let mut headers = turn_headers(&outcome, started);

    match outcome.audio {
        TurnAudio::Spoken(audio) => {
            tracing::info!(
                session_id = %outcome.session_id,
                message_count = outcome.message_count,
                audio_bytes = audio.bytes.len(),
                "Conversation turn completed"
            );
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(audio.mime_type));
            Ok((headers, audio.bytes).into_response())
        }
        TurnAudio::QuotaExceeded(err) => {
            tracing::warn!(
                session_id = %outcome.session_id,
                provider = %err.provider,
                "Voice quota exhausted, returning text-only turn"
            );
            headers.insert("x-error-type", HeaderValue::from_static("quota_exceeded"));
            let body = DegradedResponse {
                message: "Voice quota exceeded; returning the reply as text".to_string(),
                error_type: "quota_exceeded",
                text_response: outcome.reply_text,
                session_id: outcome.session_id,
                user_transcript: outcome.user_text,
                message_count: outcome.message_count,
                doctor_summary: outcome.screening.and_then(|closure| closure.doctor_summary),
            };
            Ok((headers, Json(body)).into_response())
        }
    }
}

/// Clear a conversation's history
pub async fn reset_session(
    State(server): State<GatewayServer>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<ResetResponse>> {
    let cleared_messages = server.sessions.reset(&session_id)?;
    Ok(Json(ResetResponse {
        success: true,
        session_id,
        cleared_messages,
    }))
}

pub async fn list_sessions(State(server): State<GatewayServer>) -> Json<SessionListResponse> {
    let sessions = server.sessions.list();
    Json(SessionListResponse {
        active_sessions: sessions.len(),
        sessions,
    })
}

/// End a conversation; its id is rejected afterwards
pub async fn end_session(
    State(server): State<GatewayServer>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<EndResponse>> {
    server.sessions.end(&session_id)?;
    Ok(Json(EndResponse {
        success: true,
        session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_and_data_url_audio() {
        assert_eq!(decode_audio("UklGRg==").unwrap(), b"RIFF");
        assert_eq!(decode_audio("data:audio/webm;base64,UklGRg==").unwrap(), b"RIFF");
    }

    #[test]
    fn rejects_invalid_or_empty_audio() {
        assert!(matches!(decode_audio("not base64!"), Err(ApiError::Validation { .. })));
        assert!(matches!(decode_audio(""), Err(ApiError::Validation { .. })));
        assert!(matches!(decode_audio("data:audio/wav;base64,"), Err(ApiError::Validation { .. })));
    }
}
