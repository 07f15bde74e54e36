//! Gateway settings loaded from environment variables
//!
//! Vendor credentials live in [`voice_providers::ProvidersConfig`]; this module
//! covers everything the HTTP layer decides on its own: auth, sessions, rate
//! limiting, CORS and the per-request provider defaults.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use error_common::GatewayError;
use jsonwebtoken::Algorithm;
use voice_providers::{Language, ProviderName};

/// Default request body limit (8 MiB)
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 8 * 1024 * 1024;
/// Default decoded audio limit (5 MiB)
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// When false every route is public
    pub enabled: bool,
    pub jwt_secret: Option<String>,
    pub algorithm: Algorithm,
    pub issuer: String,
    /// Header that lets trusted internal callers skip verification
    pub bypass_header: Option<String>,
    /// Shared key required by `POST /v1/auth/token` when set
    pub issuer_key: Option<String>,
    pub speak_preview_public: bool,
    pub default_expiry_secs: i64,
    pub min_expiry_secs: i64,
    pub max_expiry_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: None,
            algorithm: Algorithm::HS256,
            issuer: "tamil-voice-gateway".to_string(),
            bypass_header: None,
            issuer_key: None,
            speak_preview_public: false,
            default_expiry_secs: 3600,
            min_expiry_secs: 60,
            max_expiry_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity after which a session expires
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub max_sessions: usize,
    /// How long expired or ended ids are remembered
    pub tombstone_ttl: Duration,
    /// Count bound on remembered ids; the oldest are forgotten first
    pub max_tombstones: usize,
    /// History bound per session; oldest turns are dropped first
    pub max_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(1800),
            sweep_interval: Duration::from_secs(60),
            max_sessions: 10_000,
            tombstone_ttl: Duration::from_secs(86_400),
            max_tombstones: 50_000,
            max_turns: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Maximum requests per window
    pub max_requests: u32,
    /// Time window in seconds
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_seconds: 60,
        }
    }
}

/// What Listen does when the transcript cannot be translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialPolicy {
    /// Fail the request with `TranslationFailed`
    #[default]
    Reject,
    /// Return the original transcript flagged as degraded
    ReturnOriginal,
}

/// Translate provider per target language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRoutes {
    pub default: ProviderName,
    pub overrides: HashMap<Language, ProviderName>,
}

impl Default for TranslationRoutes {
    fn default() -> Self {
        Self {
            default: ProviderName::Google,
            overrides: HashMap::from([(Language::Ta, ProviderName::Gemini)]),
        }
    }
}

impl TranslationRoutes {
    pub fn for_target(&self, target: Language) -> ProviderName {
        self.overrides.get(&target).copied().unwrap_or(self.default)
    }

    /// Parse `ta=gemini,hi=google`
    pub fn parse_overrides(raw: &str) -> Result<HashMap<Language, ProviderName>, GatewayError> {
        raw.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (lang, provider) = pair.split_once('=').ok_or_else(|| {
                    GatewayError::ConfigError(format!("TRANSLATE_ROUTES entry '{pair}' is not lang=provider"))
                })?;
                let lang = Language::from_str(lang).map_err(|e| GatewayError::ConfigError(e.to_string()))?;
                let provider =
                    ProviderName::from_str(provider.trim()).map_err(|e| GatewayError::ConfigError(e.to_string()))?;
                Ok((lang, provider))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub default_stt: ProviderName,
    pub default_llm: ProviderName,
    pub default_tts: ProviderName,
    pub translation: TranslationRoutes,
    pub listen_partial: PartialPolicy,
    /// Most recent turns sent to the LLM
    pub llm_context_turns: usize,
    pub max_audio_bytes: usize,
    /// Close the conversation with a doctor hand-over once screening is complete
    pub screening_closure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_stt: ProviderName::Sarvam,
            default_llm: ProviderName::Gemini,
            default_tts: ProviderName::ElevenLabs,
            translation: TranslationRoutes::default(),
            listen_partial: PartialPolicy::Reject,
            llm_context_turns: 10,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            screening_closure: true,
        }
    }
}

/// Everything the gateway needs besides vendor credentials
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub name: String,
    pub auth: AuthConfig,
    pub sessions: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub pipeline: PipelineConfig,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "Tamil Voice Gateway".to_string(),
            auth: AuthConfig::default(),
            sessions: SessionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            pipeline: PipelineConfig::default(),
            cors_allowed_origins: Vec::new(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> Result<bool, GatewayError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(GatewayError::ConfigError(format!("{key} must be a boolean, got '{raw}'"))),
        },
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, GatewayError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| GatewayError::ConfigError(format!("{key} has invalid value '{raw}'"))),
    }
}

fn env_provider(key: &str, default: ProviderName) -> Result<ProviderName, GatewayError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: voice_providers::ParseProviderError| GatewayError::ConfigError(format!("{key}: {e}"))),
    }
}

pub fn parse_algorithm(raw: &str) -> Result<Algorithm, GatewayError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(GatewayError::ConfigError(format!(
            "JWT_ALGORITHM '{other}' is not supported (use HS256, HS384 or HS512)"
        ))),
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, GatewayError> {
        let defaults = Self::default();

        let auth = AuthConfig {
            enabled: env_bool("AUTH_ENABLED", defaults.auth.enabled)?,
            jwt_secret: env_string("JWT_SECRET"),
            algorithm: match env_string("JWT_ALGORITHM") {
                Some(raw) => parse_algorithm(&raw)?,
                None => defaults.auth.algorithm,
            },
            issuer: env_string("JWT_ISSUER").unwrap_or(defaults.auth.issuer),
            bypass_header: env_string("AUTH_BYPASS_HEADER"),
            issuer_key: env_string("AUTH_ISSUER_KEY"),
            speak_preview_public: env_bool("SPEAK_PREVIEW_PUBLIC", defaults.auth.speak_preview_public)?,
            ..defaults.auth
        };

        let sessions = SessionConfig {
            ttl: Duration::from_secs(env_parse("SESSION_TTL_SECS", defaults.sessions.ttl.as_secs())?),
            sweep_interval: Duration::from_secs(env_parse(
                "SESSION_SWEEP_SECS",
                defaults.sessions.sweep_interval.as_secs(),
            )?),
            max_sessions: env_parse("SESSION_MAX", defaults.sessions.max_sessions)?,
            tombstone_ttl: Duration::from_secs(env_parse(
                "SESSION_TOMBSTONE_SECS",
                defaults.sessions.tombstone_ttl.as_secs(),
            )?),
            max_tombstones: env_parse("SESSION_MAX_TOMBSTONES", defaults.sessions.max_tombstones)?,
            max_turns: env_parse("SESSION_MAX_TURNS", defaults.sessions.max_turns)?,
        };

        let rate_limit = RateLimitConfig {
            enabled: env_bool("RATE_LIMIT_ENABLED", defaults.rate_limit.enabled)?,
            max_requests: env_parse("RATE_LIMIT_REQUESTS", defaults.rate_limit.max_requests)?,
            window_seconds: env_parse("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window_seconds)?,
        };

        let mut translation = TranslationRoutes {
            default: env_provider("TRANSLATE_PROVIDER", defaults.pipeline.translation.default)?,
            ..defaults.pipeline.translation.clone()
        };
        if let Some(raw) = env_string("TRANSLATE_ROUTES") {
            translation.overrides = TranslationRoutes::parse_overrides(&raw)?;
        }

        let pipeline = PipelineConfig {
            default_stt: env_provider("DEFAULT_STT_PROVIDER", defaults.pipeline.default_stt)?,
            default_llm: env_provider("DEFAULT_LLM_PROVIDER", defaults.pipeline.default_llm)?,
            default_tts: env_provider("DEFAULT_TTS_PROVIDER", defaults.pipeline.default_tts)?,
            translation,
            listen_partial: if env_bool("LISTEN_ALLOW_PARTIAL", false)? {
                PartialPolicy::ReturnOriginal
            } else {
                PartialPolicy::Reject
            },
            llm_context_turns: env_parse("LLM_CONTEXT_TURNS", defaults.pipeline.llm_context_turns)?,
            max_audio_bytes: env_parse("MAX_AUDIO_BYTES", defaults.pipeline.max_audio_bytes)?,
            screening_closure: env_bool("SCREENING_CLOSURE_ENABLED", defaults.pipeline.screening_closure)?,
        };

        let cors_allowed_origins = match env_string("CORS_ALLOWED_ORIGINS") {
            Some(raw) if raw != "*" => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let config = Self {
            name: env_string("GATEWAY_NAME").unwrap_or(defaults.name),
            auth,
            sessions,
            rate_limit,
            pipeline,
            cors_allowed_origins,
            body_limit_bytes: env_parse("MAX_BODY_BYTES", defaults.body_limit_bytes)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the server cannot run with
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.auth.enabled && self.auth.jwt_secret.is_none() {
            return Err(GatewayError::ConfigError(
                "JWT_SECRET is required when AUTH_ENABLED is true".to_string(),
            ));
        }
        if let Some(secret) = &self.auth.jwt_secret {
            if secret.len() < 32 {
                return Err(GatewayError::ConfigError(
                    "JWT_SECRET must be at least 32 characters".to_string(),
                ));
            }
        }
        if self.sessions.max_sessions == 0 || self.sessions.max_turns == 0 || self.sessions.max_tombstones == 0 {
            return Err(GatewayError::ConfigError(
                "SESSION_MAX, SESSION_MAX_TURNS and SESSION_MAX_TOMBSTONES must be positive".to_string(),
            ));
        }
        if self.rate_limit.enabled && (self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0) {
            return Err(GatewayError::ConfigError(
                "RATE_LIMIT_REQUESTS and RATE_LIMIT_WINDOW_SECS must be positive".to_string(),
            ));
        }
        if self.pipeline.llm_context_turns == 0 {
            return Err(GatewayError::ConfigError("LLM_CONTEXT_TURNS must be positive".to_string()));
        }
        Ok(())
    }
}
