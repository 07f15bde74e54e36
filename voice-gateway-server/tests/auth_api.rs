mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;

use voice_gateway_server::auth::TokenClaims;
use voice_gateway_server::config::{AuthConfig, RateLimitConfig};

use common::{multipart_body, TestGateway, TestOptions, BOUNDARY, TEST_SECRET};

fn unauthenticated_listen() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/listen")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(Some(b"hello"), &[])))
        .unwrap()
}

fn with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(json!({"english_text": "Hi", "target_language": "en"}).to_string()))
        .unwrap()
}

fn token_request(body: serde_json::Value, issuer_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/auth/token")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = issuer_key {
        builder = builder.header("x-issuer-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn missing_bearer_is_rejected_without_adapter_calls() {
    let gateway = TestGateway::new();

    let response = gateway.send(unauthenticated_listen()).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error_type"], "authentication_error");
    assert!(gateway.adapters_untouched());
}

#[tokio::test]
async fn forged_and_expired_tokens_are_rejected() {
    let gateway = TestGateway::new();

    let forged = gateway.send(with_bearer("/v1/speak", "not.a.jwt")).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.json()["message"], "Invalid token");

    let jwt = gateway.server.jwt.as_ref().unwrap();
    let now = chrono::Utc::now().timestamp();
    let stale = TokenClaims {
        iat: now - 7200,
        nbf: now - 7200,
        exp: now - 3600,
        ..TokenClaims::new("old-user", "tamil-voice-gateway", 60)
    };
    let expired_token = jwt.encode(&stale).unwrap();
    let expired = gateway.send(with_bearer("/v1/speak", &expired_token)).await;
    assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
    assert_eq!(expired.json()["message"], "Token has expired");

    assert!(gateway.adapters_untouched());
}

#[tokio::test]
async fn health_routes_stay_public() {
    let gateway = TestGateway::new();

    let health = gateway
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(health.status, StatusCode::OK);
    let body = health.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "healthy");

    let detailed = gateway
        .send(Request::builder().uri("/health/detailed").body(Body::empty()).unwrap())
        .await;
    assert_eq!(detailed.status, StatusCode::OK);
    let body = detailed.json();
    assert_eq!(body["services"]["stt"]["providers"], json!(["sarvam"]));
    assert_eq!(body["services"]["translate"]["providers"], json!(["google", "gemini"]));
    assert_eq!(body["active_sessions"], 0);

    let root = gateway.send(Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(root.status, StatusCode::OK);
    assert!(root.json()["endpoints"].as_array().unwrap().len() >= 12);
}

#[tokio::test]
async fn issued_token_verifies_and_unlocks_protected_routes() {
    let gateway = TestGateway::new();

    let issued = gateway
        .send(token_request(json!({"user_id": "kiosk-7", "expires_in": 600}), None))
        .await;
    assert_eq!(issued.status, StatusCode::OK);
    let body = issued.json();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 600);
    let token = body["access_token"].as_str().unwrap().to_string();

    let verified = gateway.send(with_bearer("/v1/auth/verify", &token)).await;
    assert_eq!(verified.status, StatusCode::OK);
    let claims = verified.json();
    assert_eq!(claims["valid"], true);
    assert_eq!(claims["user_id"], "kiosk-7");
    assert_eq!(claims["claims"]["iss"], "tamil-voice-gateway");

    let speak = gateway.send(with_bearer("/v1/speak/preview", &token)).await;
    assert_eq!(speak.status, StatusCode::OK);
}

#[tokio::test]
async fn token_lifetime_must_be_in_range() {
    let gateway = TestGateway::new();

    for expires_in in [30, 86_401] {
        let response = gateway
            .send(token_request(json!({"user_id": "u", "expires_in": expires_in}), None))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(response.json()["field_errors"]["expires_in"].is_array());
    }

    let default = gateway.send(token_request(json!({"user_id": "u"}), None)).await;
    assert_eq!(default.json()["expires_in"], 3600);
}

#[tokio::test]
async fn issuer_key_guards_token_issue_when_configured() {
    let gateway = TestGateway::with_options(TestOptions {
        auth: AuthConfig {
            jwt_secret: Some(TEST_SECRET.to_string()),
            issuer_key: Some("issuer-key-123".to_string()),
            ..AuthConfig::default()
        },
        ..TestOptions::default()
    });

    let without = gateway.send(token_request(json!({"user_id": "u"}), None)).await;
    assert_eq!(without.status, StatusCode::UNAUTHORIZED);

    let wrong = gateway.send(token_request(json!({"user_id": "u"}), Some("issuer-key-12"))).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let right = gateway.send(token_request(json!({"user_id": "u"}), Some("issuer-key-123"))).await;
    assert_eq!(right.status, StatusCode::OK);
}

#[tokio::test]
async fn bypass_header_and_public_preview_toggles() {
    let gateway = TestGateway::with_options(TestOptions {
        auth: AuthConfig {
            jwt_secret: Some(TEST_SECRET.to_string()),
            bypass_header: Some("x-internal-caller".to_string()),
            speak_preview_public: true,
            ..AuthConfig::default()
        },
        ..TestOptions::default()
    });

    let bypass = Request::builder()
        .method("POST")
        .uri("/v1/speak")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-internal-caller", "1")
        .body(Body::from(json!({"english_text": "Hi", "target_language": "en"}).to_string()))
        .unwrap();
    assert_eq!(gateway.send(bypass).await.status, StatusCode::OK);

    let preview = Request::builder()
        .method("POST")
        .uri("/v1/speak/preview")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"english_text": "Hi", "target_language": "en"}).to_string()))
        .unwrap();
    assert_eq!(gateway.send(preview).await.status, StatusCode::OK);

    let speak = Request::builder()
        .method("POST")
        .uri("/v1/speak")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"english_text": "Hi"}).to_string()))
        .unwrap();
    assert_eq!(gateway.send(speak).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn disabled_auth_opens_every_route() {
    let gateway = TestGateway::with_options(TestOptions {
        auth: AuthConfig { enabled: false, jwt_secret: None, ..AuthConfig::default() },
        ..TestOptions::default()
    });

    let response = gateway.send(unauthenticated_listen()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["original_text"], "hello");
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests_but_not_health() {
    let gateway = TestGateway::with_options(TestOptions {
        rate_limit: RateLimitConfig { enabled: true, max_requests: 2, window_seconds: 60 },
        ..TestOptions::default()
    });
    let token = gateway.token("busy-client");
    let request = || {
        let mut request = with_bearer("/v1/speak/preview", &token);
        request
            .headers_mut()
            .insert("x-forwarded-for", "198.51.100.4, 10.0.0.1".parse().unwrap());
        request
    };

    let first = gateway.send(request()).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("x-ratelimit-limit"), Some("2"));
    assert_eq!(first.header("x-ratelimit-remaining"), Some("1"));

    assert_eq!(gateway.send(request()).await.status, StatusCode::OK);

    let limited = gateway.send(request()).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json()["error_type"], "rate_limit_exceeded");
    assert!(limited.header("retry-after").is_some());

    let health = gateway
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn audio_headers_are_exposed_to_browsers() {
    let gateway = TestGateway::new();
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/v1/vaanga-pesalam")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = gateway.send(preflight).await;
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));

    let spoken = gateway
        .send({
            let mut request = with_bearer("/v1/speak", &gateway.token("browser"));
            request
                .headers_mut()
                .insert(header::ORIGIN, "https://app.example.com".parse().unwrap());
            request
        })
        .await;
    let exposed = spoken.header("access-control-expose-headers").unwrap_or_default().to_string();
    assert!(exposed.contains("x-final-language"));
    assert!(exposed.contains("x-session-id"));
}
