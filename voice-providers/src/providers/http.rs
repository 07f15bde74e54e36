//! Shared HTTP plumbing for vendor adapters

use crate::capability::{Capability, ProviderName};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use serde::de::DeserializeOwned;
use std::time::Duration;

const QUOTA_MARKERS: &[&str] = &[
    "quota_exceeded",
    "quota exceeded",
    "insufficient_quota",
    "resource_exhausted",
    "insufficient credits",
    "insufficient_credits",
    "credits exhausted",
    "out of credits",
    "not enough credits",
];

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("voice-providers/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Map a non-success vendor response to a [`ProviderError`]
pub fn classify_failure(
    provider: ProviderName,
    capability: Capability,
    status: u16,
    body: &str,
) -> ProviderError {
    let lowered = body.to_ascii_lowercase();
    let kind = if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ProviderErrorKind::QuotaExceeded
    } else {
        match status {
            429 => ProviderErrorKind::RateLimited,
            401 | 403 => ProviderErrorKind::CredentialsRejected,
            _ => ProviderErrorKind::Rejected { status },
        }
    };

    let message = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };
    ProviderError::new(provider, capability, kind, message)
}

/// Send a request and turn transport errors and non-2xx statuses into provider errors
pub async fn send(
    provider: ProviderName,
    capability: Capability,
    request: reqwest::RequestBuilder,
) -> ProviderResult<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::transport(provider, capability, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = classify_failure(provider, capability, status.as_u16(), &body);
    tracing::warn!(
        provider = %provider,
        capability = %capability,
        status = status.as_u16(),
        kind = error.kind.as_str(),
        "Vendor call rejected"
    );
    Err(error)
}

pub async fn send_json<T: DeserializeOwned>(
    provider: ProviderName,
    capability: Capability,
    request: reqwest::RequestBuilder,
) -> ProviderResult<T> {
    let response = send(provider, capability, request).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::invalid_response(provider, capability, e.without_url().to_string()))
}

pub async fn send_bytes(
    provider: ProviderName,
    capability: Capability,
    request: reqwest::RequestBuilder,
) -> ProviderResult<Vec<u8>> {
    let response = send(provider, capability, request).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProviderError::transport(provider, capability, e))?;
    Ok(bytes.to_vec())
}

/// Multipart part holding the uploaded audio
pub fn audio_part(
    provider: ProviderName,
    capability: Capability,
    audio: &[u8],
) -> ProviderResult<reqwest::multipart::Part> {
    reqwest::multipart::Part::bytes(audio.to_vec())
        .file_name("audio.wav")
        .mime_str("audio/wav")
        .map_err(|e| ProviderError::invalid_input(provider, capability, e.to_string()))
}
