use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use subtle::ConstantTimeEq;

use crate::auth::{extract_bearer, JwtService, TokenClaims};
use crate::error::{ApiError, ApiResult};
use crate::handlers::json_body;
use crate::server::GatewayServer;

pub const ISSUER_KEY_HEADER: &str = "x-issuer-key";

/// Token issue request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub user_id: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Token verification response
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: String,
    pub claims: TokenClaims,
    pub expires_in: i64,
}

fn jwt_service(server: &GatewayServer) -> ApiResult<&JwtService> {
    server
        .jwt
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Token signing is not configured"))
}

fn check_issuer_key(server: &GatewayServer, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = server.config.auth.issuer_key.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(ISSUER_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::authentication("Invalid issuer key"))
    }
}

/// Issue a bearer token
pub async fn issue_token(
    State(server): State<GatewayServer>,
    headers: HeaderMap,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    check_issuer_key(&server, &headers)?;
    let request = json_body(payload)?;
    let auth = &server.config.auth;

    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::validation_with_fields(
            "user_id is required",
            HashMap::from([("user_id".to_string(), vec!["must not be blank".to_string()])]),
        ));
    }
    let expires_in = request.expires_in.unwrap_or(auth.default_expiry_secs);
    if !(auth.min_expiry_secs..=auth.max_expiry_secs).contains(&expires_in) {
        return Err(ApiError::validation_with_fields(
            "expires_in is out of range",
            HashMap::from([(
                "expires_in".to_string(),
                vec![format!(
                    "must be between {} and {} seconds",
                    auth.min_expiry_secs, auth.max_expiry_secs
                )],
            )]),
        ));
    }

    let (access_token, claims) = jwt_service(&server)?.issue(user_id, expires_in)?;
    tracing::info!(user_id = %claims.sub, token_id = %claims.jti, expires_in, "Issued access token");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in,
    }))
}

/// Verify the bearer token sent with this request
pub async fn verify_token(State(server): State<GatewayServer>, headers: HeaderMap) -> ApiResult<Json<VerifyResponse>> {
    let token = extract_bearer(&headers).ok_or_else(|| ApiError::authentication("Missing bearer token"))?;
    let claims = jwt_service(&server)?.verify(token)?;
    let expires_in = (claims.exp - chrono::Utc::now().timestamp()).max(0);

    Ok(Json(VerifyResponse {
        valid: true,
        user_id: claims.sub.clone(),
        claims,
        expires_in,
    }))
}
