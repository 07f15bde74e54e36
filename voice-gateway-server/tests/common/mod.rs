#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use voice_providers::fakes::{FakeLlm, FakeStt, FakeTranslate, FakeTts};
use voice_providers::{Language, ProviderErrorKind, ProviderName, ProviderRegistry};

use voice_gateway_server::config::{AuthConfig, RateLimitConfig};
use voice_gateway_server::{create_app, GatewayConfig, GatewayServer};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const BOUNDARY: &str = "voice-gateway-test-boundary";

/// Knobs for building a gateway backed by fakes
pub struct TestOptions {
    pub speech_language: Language,
    pub tts_failure: Option<ProviderErrorKind>,
    pub llm_delay: Option<Duration>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            speech_language: Language::En,
            tts_failure: None,
            llm_delay: None,
            auth: AuthConfig {
                jwt_secret: Some(TEST_SECRET.to_string()),
                ..AuthConfig::default()
            },
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Gateway router plus handles on every fake behind it
pub struct TestGateway {
    pub server: GatewayServer,
    pub app: Router,
    pub stt: Arc<FakeStt>,
    pub google_translate: Arc<FakeTranslate>,
    pub gemini_translate: Arc<FakeTranslate>,
    pub tts: Arc<FakeTts>,
    pub llm: Arc<FakeLlm>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        // Echo STT reads the uploaded bytes back as the transcript
        let stt = Arc::new(FakeStt::echo(ProviderName::Sarvam, options.speech_language));
        let google_translate = Arc::new(FakeTranslate::new(ProviderName::Google));
        let gemini_translate = Arc::new(FakeTranslate::new(ProviderName::Gemini));
        let tts = Arc::new(match options.tts_failure {
            Some(kind) => FakeTts::failing(ProviderName::ElevenLabs, kind),
            None => FakeTts::new(ProviderName::ElevenLabs),
        });
        let llm = FakeLlm::new(ProviderName::Gemini);
        let llm = Arc::new(match options.llm_delay {
            Some(delay) => llm.with_delay(delay),
            None => llm,
        });

        let registry = ProviderRegistry::builder()
            .stt(stt.clone())
            .translate(google_translate.clone())
            .translate(gemini_translate.clone())
            .tts(tts.clone())
            .llm(llm.clone())
            .build()
            .unwrap();

        let config = GatewayConfig {
            auth: options.auth,
            rate_limit: options.rate_limit,
            ..GatewayConfig::default()
        };
        let server = GatewayServer::new(config, registry).unwrap();
        let app = create_app(server.clone());

        Self { server, app, stt, google_translate, gemini_translate, tts, llm }
    }

    pub fn token(&self, subject: &str) -> String {
        self.server.jwt.as_ref().unwrap().issue(subject, 3600).unwrap().0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token("test-user"))
    }

    /// No adapter has been called yet
    pub fn adapters_untouched(&self) -> bool {
        self.stt.calls() == 0
            && self.google_translate.calls().is_empty()
            && self.gemini_translate.calls().is_empty()
            && self.tts.calls() == 0
            && self.llm.calls() == 0
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        TestResponse { status, headers, body }
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, self.bearer())
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, self.bearer())
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::AUTHORIZATION, self.bearer())
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Multipart upload; `audio` goes in as a file part
    pub async fn post_listen(&self, audio: Option<&[u8]>, fields: &[(&str, &str)]) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/listen")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::AUTHORIZATION, self.bearer())
            .body(Body::from(multipart_body(audio, fields)))
            .unwrap();
        self.send(request).await
    }
}

pub fn multipart_body(audio: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"speech.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
