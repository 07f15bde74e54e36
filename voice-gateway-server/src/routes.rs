use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, MethodRouter},
    Router,
};
use serde::Serialize;

use crate::{
    auth::require_bearer,
    config::AuthConfig,
    handlers::{auth, health, listen, speak, vaanga},
    server::GatewayServer,
};

/// Whether a route sits behind the bearer token gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Protected,
}

pub const SPEAK_PREVIEW_PATH: &str = "/v1/speak/preview";

/// One row of the route table
pub struct RouteEntry {
    pub method: &'static str,
    pub path: &'static str,
    pub access: Access,
    pub handler: MethodRouter<GatewayServer>,
}

impl RouteEntry {
    fn new(method: &'static str, path: &'static str, access: Access, handler: MethodRouter<GatewayServer>) -> Self {
        Self { method, path, access, handler }
    }

    /// Access after applying the auth toggles
    pub fn effective_access(&self, auth: &AuthConfig) -> Access {
        if !auth.enabled || (self.path == SPEAK_PREVIEW_PATH && auth.speak_preview_public) {
            Access::Public
        } else {
            self.access
        }
    }
}

/// Every route the gateway serves
pub fn route_table() -> Vec<RouteEntry> {
    use Access::{Protected, Public};

    vec![
        // Service info and health
        RouteEntry::new("GET", "/", Public, get(health::service_info)),
        RouteEntry::new("GET", "/health", Public, get(health::health_check)),
        RouteEntry::new("GET", "/health/detailed", Public, get(health::detailed_health)),
        // Voice pipelines
        RouteEntry::new("POST", "/v1/listen", Protected, post(listen::listen)),
        RouteEntry::new("POST", "/v1/speak", Protected, post(speak::speak)),
        RouteEntry::new("POST", SPEAK_PREVIEW_PATH, Protected, post(speak::speak_preview)),
        // Conversations
        RouteEntry::new("POST", "/v1/vaanga-pesalam", Protected, post(vaanga::converse)),
        RouteEntry::new("POST", "/v1/vaanga-pesalam/reset/:session_id", Protected, post(vaanga::reset_session)),
        RouteEntry::new("GET", "/v1/vaanga-pesalam/sessions", Protected, get(vaanga::list_sessions)),
        RouteEntry::new("DELETE", "/v1/vaanga-pesalam/sessions/:session_id", Protected, delete(vaanga::end_session)),
        // Tokens; verify checks its own bearer
        RouteEntry::new("POST", "/v1/auth/token", Public, post(auth::issue_token)),
        RouteEntry::new("POST", "/v1/auth/verify", Public, post(auth::verify_token)),
    ]
}

/// Create the router, gating protected routes behind [`require_bearer`]
pub fn create_routes(server: &GatewayServer) -> Router<GatewayServer> {
    let mut public = Router::new();
    let mut protected = Router::new();
    let mut protected_count = 0usize;

    for entry in route_table() {
        match entry.effective_access(&server.config.auth) {
            Access::Public => public = public.route(entry.path, entry.handler),
            Access::Protected => {
                protected = protected.route(entry.path, entry.handler);
                protected_count += 1;
            }
        }
    }

    if protected_count == 0 {
        tracing::warn!("Authentication is disabled; every route is public");
        return public;
    }

    public.merge(protected.route_layer(from_fn_with_state(server.clone(), require_bearer)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_of(path: &str, auth: &AuthConfig) -> Option<Access> {
        route_table()
            .into_iter()
            .find(|entry| entry.path == path)
            .map(|entry| entry.effective_access(auth))
    }

    #[test]
    fn health_is_public_and_pipelines_are_protected() {
        let auth = AuthConfig::default();
        assert_eq!(access_of("/health", &auth), Some(Access::Public));
        assert_eq!(access_of("/health/detailed", &auth), Some(Access::Public));
        assert_eq!(access_of("/v1/listen", &auth), Some(Access::Protected));
        assert_eq!(access_of("/v1/vaanga-pesalam", &auth), Some(Access::Protected));
        assert_eq!(access_of(SPEAK_PREVIEW_PATH, &auth), Some(Access::Protected));
    }

    #[test]
    fn toggles_open_routes() {
        let preview_public = AuthConfig { speak_preview_public: true, ..AuthConfig::default() };
        assert_eq!(access_of(SPEAK_PREVIEW_PATH, &preview_public), Some(Access::Public));
        assert_eq!(access_of("/v1/speak", &preview_public), Some(Access::Protected));

        let disabled = AuthConfig { enabled: false, ..AuthConfig::default() };
        assert!(route_table().iter().all(|entry| entry.effective_access(&disabled) == Access::Public));
    }
}
