use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::AuthContext;
use crate::server::GatewayServer;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Headers browsers are allowed to read from gateway responses
const EXPOSED_HEADERS: [&str; 18] = [
    "x-process-time",
    "x-processing-time",
    "x-session-id",
    "x-user-transcript",
    "x-user-language",
    "x-ai-response",
    "x-ai-language",
    "x-message-count",
    "x-error-type",
    "x-final-language",
    "x-original-text-length",
    "x-final-text-length",
    "x-stt-provider",
    "x-screening-complete",
    "x-doctor-summary",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-ratelimit-reset",
];

/// Request timing middleware
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let mut response = next.run(request).await;

    let elapsed = start.elapsed();
    if let Ok(value) = HeaderValue::from_str(&format!("{:.3}", elapsed.as_secs_f64())) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = elapsed.as_millis(),
        status = response.status().as_u16(),
        "Request processed"
    );

    response
}

/// Audit logging middleware
///
/// The caller is taken from the [`AuthContext`] the auth gate leaves on the
/// response; credentials are never logged.
pub async fn audit_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(method = %method, path = %path, "Audit log: Request received");

    let response = next.run(request).await;

    let user_id = response
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.user_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    tracing::info!(
        method = %method,
        path = %path,
        user_id = %user_id,
        status = response.status().as_u16(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Audit log: Response sent"
    );

    response
}

/// Client key for rate limiting: first forwarded hop, then the real-IP header
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(State(server): State<GatewayServer>, request: Request, next: Next) -> Response {
    if !server.rate_limiter.config().enabled || request.uri().path().starts_with("/health") {
        return next.run(request).await;
    }

    let key = client_key(request.headers());
    let status = match server.rate_limiter.check(&key) {
        Ok(status) => status,
        Err(err) => {
            tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            return err.into_response();
        }
    };

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(status.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(status.reset_secs));
    response
}

/// Create CORS layer for the application
///
/// An empty origin list allows any origin.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-issuer-key"),
        ])
        .expose_headers(EXPOSED_HEADERS.map(HeaderName::from_static))
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn client_key_prefers_first_forwarded_hop() {
        let map = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("x-real-ip", "10.0.0.9")]);
        assert_eq!(client_key(&map), "203.0.113.7");
    }

    #[test]
    fn client_key_falls_back_to_real_ip_then_unknown() {
        assert_eq!(client_key(&headers(&[("x-real-ip", "10.0.0.9")])), "10.0.0.9");
        assert_eq!(client_key(&HeaderMap::new()), "unknown");
    }
}
