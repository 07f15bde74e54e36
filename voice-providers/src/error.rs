use crate::capability::{Capability, ProviderName};
use error_common::DataSanitizer;
use std::fmt;
use thiserror::Error;

/// Why a vendor call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection, TLS or timeout failure
    Network,
    /// Account quota or credits exhausted
    QuotaExceeded,
    /// Vendor throttled the request (HTTP 429)
    RateLimited,
    /// Gateway credentials refused by the vendor
    CredentialsRejected,
    /// Any other non-success HTTP status
    Rejected { status: u16 },
    /// Response body did not match the expected shape
    InvalidResponse,
    /// Vendor answered but produced nothing usable
    EmptyResult,
    /// Request rejected before reaching the vendor
    InvalidInput,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::QuotaExceeded => "quota_exceeded",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::CredentialsRejected => "credentials_rejected",
            ProviderErrorKind::Rejected { .. } => "rejected",
            ProviderErrorKind::InvalidResponse => "invalid_response",
            ProviderErrorKind::EmptyResult => "empty_result",
            ProviderErrorKind::InvalidInput => "invalid_input",
        }
    }

    /// Whether a fallback chain may try the next provider
    pub fn falls_through(&self) -> bool {
        !matches!(self, ProviderErrorKind::InvalidInput)
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Rejected { status } => write!(f, "rejected with HTTP {status}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A single vendor call failed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{provider} {capability} call failed ({kind}): {message}")]
pub struct ProviderError {
    pub provider: ProviderName,
    pub capability: Capability,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: ProviderName,
        capability: Capability,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            capability,
            kind,
            message: DataSanitizer::sanitize_for_logging(&message.into()),
        }
    }

    pub fn invalid_input(provider: ProviderName, capability: Capability, message: impl Into<String>) -> Self {
        Self::new(provider, capability, ProviderErrorKind::InvalidInput, message)
    }

    pub fn invalid_response(provider: ProviderName, capability: Capability, message: impl Into<String>) -> Self {
        Self::new(provider, capability, ProviderErrorKind::InvalidResponse, message)
    }

    pub fn empty_result(provider: ProviderName, capability: Capability, message: impl Into<String>) -> Self {
        Self::new(provider, capability, ProviderErrorKind::EmptyResult, message)
    }

    /// Transport-level failure from reqwest, with the request URL stripped
    pub fn transport(provider: ProviderName, capability: Capability, err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ProviderErrorKind::InvalidResponse
        } else {
            ProviderErrorKind::Network
        };
        Self::new(provider, capability, kind, err.without_url().to_string())
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::QuotaExceeded)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// An unregistered `(capability, provider)` pair was requested
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no {capability} provider registered as '{name}'")]
pub struct UnknownProviderError {
    pub capability: Capability,
    pub name: String,
}

impl UnknownProviderError {
    pub fn new(capability: Capability, name: impl Into<String>) -> Self {
        Self {
            capability,
            name: name.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("fallback chain for {0} is empty")]
    EmptyChain(Capability),

    #[error("fallback order for {capability} names unregistered provider '{name}'")]
    InvalidFallback {
        capability: Capability,
        name: ProviderName,
    },
}

/// Provider configuration and construction errors
#[derive(Error, Debug)]
pub enum ProviderConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_input_stops_a_fallback_chain() {
        assert!(!ProviderErrorKind::InvalidInput.falls_through());
        assert!(ProviderErrorKind::Network.falls_through());
        assert!(ProviderErrorKind::QuotaExceeded.falls_through());
        assert!(ProviderErrorKind::CredentialsRejected.falls_through());
        assert!(ProviderErrorKind::EmptyResult.falls_through());
        assert!(ProviderErrorKind::Rejected { status: 500 }.falls_through());
    }

    #[test]
    fn messages_are_sanitized_on_construction() {
        let err = ProviderError::new(
            ProviderName::Google,
            Capability::Translate,
            ProviderErrorKind::Rejected { status: 400 },
            "bad request for key=AIzaSecret",
        );
        assert!(!err.message.contains("AIzaSecret"));
        assert_eq!(
            err.to_string(),
            "google translate call failed (rejected with HTTP 400): bad request for key=[REDACTED]"
        );
    }

    #[test]
    fn unknown_provider_names_capability_and_name() {
        let err = UnknownProviderError::new(Capability::Tts, "gemini");
        assert_eq!(err.to_string(), "no tts provider registered as 'gemini'");
    }
}
