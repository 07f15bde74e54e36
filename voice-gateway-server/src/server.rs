use std::sync::Arc;
use std::time::Instant;

use error_common::{GatewayError, Result};
use tracing::warn;
use voice_providers::{Capability, Language, ProviderName, ProviderRegistry};

use crate::auth::JwtService;
use crate::config::GatewayConfig;
use crate::rate_limit::RateLimiter;
use crate::sessions::SessionStore;

/// Shared gateway state handed to every handler
#[derive(Clone)]
pub struct GatewayServer {
    /// Gateway configuration
    pub config: Arc<GatewayConfig>,
    /// Adapters per capability, immutable after start-up
    pub registry: Arc<ProviderRegistry>,
    /// Live conversation sessions
    pub sessions: Arc<SessionStore>,
    /// Present whenever a JWT secret is configured
    pub jwt: Option<Arc<JwtService>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl GatewayServer {
    /// Build server state from validated configuration and a provider registry
    pub fn new(config: GatewayConfig, registry: ProviderRegistry) -> Result<Self> {
        config.validate()?;

        let jwt = config
            .auth
            .jwt_secret
            .as_deref()
            .map(|secret| Arc::new(JwtService::new(secret, config.auth.algorithm, config.auth.issuer.clone())));
        if config.auth.enabled && jwt.is_none() {
            return Err(GatewayError::ConfigError("auth is enabled but no JWT secret is set".to_string()));
        }

        warn_unroutable_defaults(&config, &registry);

        Ok(Self {
            sessions: Arc::new(SessionStore::new(config.sessions.clone())),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            config: Arc::new(config),
            registry: Arc::new(registry),
            jwt,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Start the background session sweeper
    pub fn spawn_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.sessions.spawn_sweeper()
    }
}

/// Log defaults that point at providers without credentials
fn warn_unroutable_defaults(config: &GatewayConfig, registry: &ProviderRegistry) {
    let pipeline = &config.pipeline;
    let mut expected: Vec<(Capability, ProviderName, String)> = vec![
        (Capability::Stt, pipeline.default_stt, "DEFAULT_STT_PROVIDER".to_string()),
        (Capability::Llm, pipeline.default_llm, "DEFAULT_LLM_PROVIDER".to_string()),
        (Capability::Tts, pipeline.default_tts, "DEFAULT_TTS_PROVIDER".to_string()),
        (Capability::Translate, pipeline.translation.default, "TRANSLATE_PROVIDER".to_string()),
    ];
    let mut routes: Vec<(&Language, &ProviderName)> = pipeline.translation.overrides.iter().collect();
    routes.sort_by_key(|(lang, _)| lang.code());
    expected.extend(
        routes
            .into_iter()
            .map(|(lang, name)| (Capability::Translate, *name, format!("TRANSLATE_ROUTES {lang}"))),
    );

    for (capability, name, setting) in expected {
        if !registry.registered(capability).contains(&name) {
            warn!(
                capability = %capability,
                provider = %name,
                setting = %setting,
                "Configured provider is not registered; requests relying on it will fail"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use tokio_test::assert_ok;

    #[test]
    fn auth_requires_a_secret() {
        let registry = ProviderRegistry::builder().build().unwrap();
        assert!(GatewayServer::new(GatewayConfig::default(), registry).is_err());
    }

    #[test]
    fn open_gateway_starts_without_secret() {
        let registry = ProviderRegistry::builder().build().unwrap();
        let config = GatewayConfig {
            auth: AuthConfig { enabled: false, ..AuthConfig::default() },
            ..GatewayConfig::default()
        };
        let server = assert_ok!(GatewayServer::new(config, registry));
        assert!(server.jwt.is_none());
        assert!(server.sessions.is_empty());
    }
}
