use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use error_common::codes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;
use voice_providers::{ProviderError, RegistryError, UnknownProviderError};

use crate::auth::tokens::TokenError;
use crate::pipeline::{ConversationError, ListenError, SpeakError};
use crate::sessions::SessionError;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type
    pub error_type: String,
    /// Stable machine-readable code
    pub error_code: String,
    /// Human-readable error message
    pub message: String,
    /// Failure kind reported by the vendor, for provider errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("Unknown provider: {0}")]
    UnknownProvider(#[from] UnknownProviderError),

    #[error("{message}")]
    Authentication { message: String, code: &'static str },

    #[error("Session expired: {session_id}")]
    SessionExpired { session_id: String },

    #[error("Resource not found: {resource_type}")]
    NotFound { resource_type: String },

    #[error("No speech detected in audio")]
    NoSpeech,

    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String, retry_after_secs: u64 },

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(ProviderError),

    #[error("Translation failed: {0}")]
    TranslationFailed(ProviderError),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(ProviderError),

    #[error("Reply generation failed: {0}")]
    ReplyFailed(ProviderError),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },
}

impl ApiError {
    /// Create a validation error with field-specific errors
    pub fn validation_with_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, Vec<String>>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            code: codes::authentication::INVALID_CREDENTIALS,
        }
    }

    pub fn token_expired() -> Self {
        Self::Authentication {
            message: "Token has expired".to_string(),
            code: codes::authentication::TOKEN_EXPIRED,
        }
    }

    pub fn token_invalid() -> Self {
        Self::Authentication {
            message: "Invalid token".to_string(),
            code: codes::authentication::TOKEN_INVALID,
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after_secs,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::UnknownProvider(_) | ApiError::NoSpeech => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::SessionExpired { .. } => StatusCode::GONE,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Provider(_)
            | ApiError::TranscriptionFailed(_)
            | ApiError::TranslationFailed(_)
            | ApiError::SynthesisFailed(_)
            | ApiError::ReplyFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::UnknownProvider(_) => "unknown_provider",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::SessionExpired { .. } => "session_expired",
            ApiError::NotFound { .. } => "not_found",
            ApiError::NoSpeech => "no_speech_detected",
            ApiError::RateLimit { .. } => "rate_limit_exceeded",
            ApiError::Provider(_) => "provider_error",
            ApiError::TranscriptionFailed(_) => "transcription_failed",
            ApiError::TranslationFailed(_) => "translation_failed",
            ApiError::SynthesisFailed(_) => "synthesis_failed",
            ApiError::ReplyFailed(_) => "reply_failed",
            ApiError::Internal { .. } => "internal_error",
            ApiError::ServiceUnavailable { .. } => "service_unavailable",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => codes::validation::INVALID_INPUT,
            ApiError::UnknownProvider(_) => codes::provider::UNKNOWN_PROVIDER,
            ApiError::Authentication { code, .. } => *code,
            ApiError::SessionExpired { .. } => codes::session::SESSION_EXPIRED,
            ApiError::NotFound { .. } => codes::session::SESSION_NOT_FOUND,
            ApiError::NoSpeech => codes::validation::NO_SPEECH_DETECTED,
            ApiError::RateLimit { .. } => codes::system::RATE_LIMITED,
            ApiError::Provider(_) => codes::provider::VENDOR_FAILURE,
            ApiError::TranscriptionFailed(_) => codes::provider::TRANSCRIPTION_FAILED,
            ApiError::TranslationFailed(_) => codes::provider::TRANSLATION_FAILED,
            ApiError::SynthesisFailed(_) => codes::provider::SYNTHESIS_FAILED,
            ApiError::ReplyFailed(_) => codes::provider::REPLY_FAILED,
            ApiError::Internal { .. } | ApiError::ServiceUnavailable { .. } => codes::system::INTERNAL,
        }
    }

    fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ApiError::Provider(e)
            | ApiError::TranscriptionFailed(e)
            | ApiError::TranslationFailed(e)
            | ApiError::SynthesisFailed(e)
            | ApiError::ReplyFailed(e) => Some(e),
            _ => None,
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } => Some(vec![
                "Check the request payload for invalid fields".to_string(),
                "Ensure audio is present and under the size limit".to_string(),
            ]),
            ApiError::UnknownProvider(e) => Some(vec![format!(
                "Use one of the {} providers listed at /health/detailed",
                e.capability
            )]),
            ApiError::Authentication { .. } => Some(vec![
                "Send a bearer token obtained from /v1/auth/token".to_string(),
                "Check if your token has expired".to_string(),
            ]),
            ApiError::SessionExpired { .. } => Some(vec![
                "Start a new conversation without a session_id".to_string(),
            ]),
            ApiError::NoSpeech => Some(vec![
                "Speak closer to the microphone and try again".to_string(),
            ]),
            ApiError::RateLimit { .. } => Some(vec![
                "Wait before making additional requests".to_string(),
            ]),
            ApiError::TranscriptionFailed(_) | ApiError::TranslationFailed(_) | ApiError::ReplyFailed(_) => {
                Some(vec!["Try again or choose a different provider".to_string()])
            }
            ApiError::SynthesisFailed(e) if e.is_quota_exceeded() => Some(vec![
                "Voice quota is exhausted; use /v1/speak/preview later or another voice provider".to_string(),
            ]),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %self,
                "API request rejected"
            );
        }

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };
        let details = self
            .provider_error()
            .map(|e| format!("{}: {}", e.provider, e.kind.as_str()));
        let retry_after = match &self {
            ApiError::RateLimit { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            details,
            field_errors,
            timestamp: chrono::Utc::now(),
            suggestions: self.suggestions(),
        };

        let mut response = (status_code, Json(error_response)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Expired(session_id) => ApiError::SessionExpired { session_id },
            SessionError::NotFound(id) => ApiError::not_found(format!("session '{id}'")),
            SessionError::InvalidId(message) => ApiError::validation(format!("session_id {message}")),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::token_expired(),
            TokenError::Invalid(_) => ApiError::token_invalid(),
            TokenError::Signing(message) => ApiError::internal(message),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownProvider(e) => ApiError::UnknownProvider(e),
            RegistryError::Provider(e) => ApiError::Provider(e),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<ListenError> for ApiError {
    fn from(err: ListenError) -> Self {
        match err {
            ListenError::Validation(message) => ApiError::validation(message),
            ListenError::UnknownProvider(e) => ApiError::UnknownProvider(e),
            ListenError::TranscriptionFailed(e) => ApiError::TranscriptionFailed(e),
            ListenError::TranslationFailed(e) => ApiError::TranslationFailed(e),
            ListenError::Registry(e) => e.into(),
        }
    }
}

impl From<SpeakError> for ApiError {
    fn from(err: SpeakError) -> Self {
        match err {
            SpeakError::Validation(message) => ApiError::validation(message),
            SpeakError::UnknownProvider(e) => ApiError::UnknownProvider(e),
            SpeakError::TranslationFailed(e) => ApiError::TranslationFailed(e),
            SpeakError::SynthesisFailed(e) => ApiError::SynthesisFailed(e),
        }
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Validation(message) => ApiError::validation(message),
            ConversationError::UnknownProvider(e) => ApiError::UnknownProvider(e),
            ConversationError::Session(e) => e.into(),
            ConversationError::NoSpeech { .. } => ApiError::NoSpeech,
            ConversationError::TranscriptionFailed(e) => ApiError::TranscriptionFailed(e),
            ConversationError::ReplyFailed(e) => ApiError::ReplyFailed(e),
            ConversationError::SynthesisFailed(e) => ApiError::SynthesisFailed(e),
            ConversationError::Registry(e) => e.into(),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use voice_providers::{Capability, ProviderErrorKind, ProviderName};

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value, Option<HeaderValue>) {
        let response = error.into_response();
        let status = response.status();
        let retry = response.headers().get(header::RETRY_AFTER).cloned();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap(), retry)
    }

    #[tokio::test]
    async fn taxonomy_maps_to_status_and_type() {
        let quota = ProviderError::new(
            ProviderName::ElevenLabs,
            Capability::Tts,
            ProviderErrorKind::QuotaExceeded,
            "credits exhausted",
        );
        let cases = vec![
            (ApiError::validation("bad"), StatusCode::BAD_REQUEST, "validation_error"),
            (
                ApiError::UnknownProvider(UnknownProviderError::new(Capability::Stt, "sarvm")),
                StatusCode::BAD_REQUEST,
                "unknown_provider",
            ),
            (ApiError::token_invalid(), StatusCode::UNAUTHORIZED, "authentication_error"),
            (ApiError::SessionExpired { session_id: "s".into() }, StatusCode::GONE, "session_expired"),
            (ApiError::NoSpeech, StatusCode::BAD_REQUEST, "no_speech_detected"),
            (ApiError::SynthesisFailed(quota.clone()), StatusCode::BAD_GATEWAY, "synthesis_failed"),
            (ApiError::Provider(quota), StatusCode::BAD_GATEWAY, "provider_error"),
            (ApiError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        ];

        for (error, status, error_type) in cases {
            let (got_status, body, _) = body_json(error).await;
            assert_eq!(got_status, status);
            assert_eq!(body["error_type"], error_type);
            assert!(body["error_id"].as_str().is_some());
            assert!(body["timestamp"].as_str().is_some());
        }
    }

    #[tokio::test]
    async fn provider_errors_carry_vendor_kind() {
        let err = ProviderError::new(ProviderName::Sarvam, Capability::Stt, ProviderErrorKind::Network, "timeout");
        let (_, body, _) = body_json(ApiError::TranscriptionFailed(err)).await;
        assert_eq!(body["details"], "sarvam: network");
        assert_eq!(body["error_code"], codes::provider::TRANSCRIPTION_FAILED);
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let (status, body, retry) = body_json(ApiError::rate_limit("slow down", 42)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error_type"], "rate_limit_exceeded");
        assert_eq!(retry, Some(HeaderValue::from(42u64)));
    }

    #[test]
    fn token_errors_use_fixed_messages() {
        assert_eq!(ApiError::from(TokenError::Expired).to_string(), "Token has expired");
        assert_eq!(ApiError::from(TokenError::Invalid("bad sig".into())).to_string(), "Invalid token");
    }
}
