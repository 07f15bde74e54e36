/// Authentication middleware for Axum
///
/// Verifies the bearer token before any protected handler runs, and injects
/// the caller's [`AuthContext`] into request extensions.
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::GatewayServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer,
    /// Trusted internal caller using the configured bypass header
    Bypass,
}

/// Authentication context injected into request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub method: AuthMethod,
}

/// Bearer token from the `Authorization` header, if any
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Gate for protected routes
///
/// Rejects with 401 before the handler runs, so a failed check never reaches
/// an adapter.
pub async fn require_bearer(
    State(server): State<GatewayServer>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = &server.config.auth;

    let context = match auth.bypass_header.as_deref() {
        Some(name) if request.headers().contains_key(name) => {
            tracing::debug!(header = name, path = %request.uri().path(), "Auth bypass header accepted");
            AuthContext {
                user_id: "internal".to_string(),
                token_id: None,
                method: AuthMethod::Bypass,
            }
        }
        _ => {
            let token = extract_bearer(request.headers())
                .ok_or_else(|| ApiError::authentication("Missing bearer token"))?;
            let jwt = server
                .jwt
                .as_ref()
                .ok_or_else(|| ApiError::service_unavailable("Token verification is not configured"))?;
            let claims = jwt.verify(token)?;
            AuthContext {
                user_id: claims.sub,
                token_id: Some(claims.jti),
                method: AuthMethod::Bearer,
            }
        }
    };

    tracing::debug!(
        user_id = %context.user_id,
        method = ?context.method,
        "Request authenticated"
    );

    request.extensions_mut().insert(context.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(context);
    Ok(response)
}
