mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine};
use voice_providers::Language;

use common::{TestGateway, TestOptions};

#[tokio::test]
async fn english_audio_is_returned_without_translation() {
    let gateway = TestGateway::new();

    let response = gateway.post_listen(Some(b"hello there"), &[("language", "en")]).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["original_text"], "hello there");
    assert_eq!(body["original_language"], "en");
    assert_eq!(body["english_transcript"], "hello there");
    assert_eq!(body["stt_provider"], "sarvam");
    assert_eq!(body["fallback_used"], false);
    assert_eq!(body["degraded"], false);
    assert!(gateway.google_translate.calls().is_empty());
    assert!(gateway.gemini_translate.calls().is_empty());
    assert!(response.header("x-process-time").is_some());
}

#[tokio::test]
async fn tamil_audio_is_translated_once_to_english() {
    let gateway = TestGateway::with_options(TestOptions {
        speech_language: Language::Ta,
        ..TestOptions::default()
    });

    let response = gateway.post_listen(Some("வணக்கம்".as_bytes()), &[]).await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["original_text"], "வணக்கம்");
    assert_eq!(body["original_language"], "ta");
    assert_eq!(body["english_transcript"], "[en] வணக்கம்");

    let calls = gateway.google_translate.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source, Language::Ta);
    assert_eq!(calls[0].target, Language::En);
    assert!(gateway.gemini_translate.calls().is_empty());
}

#[tokio::test]
async fn base64_field_is_accepted_as_audio() {
    let gateway = TestGateway::new();
    let encoded = STANDARD.encode("good morning");

    let response = gateway.post_listen(None, &[("audio_base64", encoded.as_str())]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["original_text"], "good morning");
}

#[tokio::test]
async fn missing_audio_fails_validation_without_vendor_calls() {
    let gateway = TestGateway::new();

    let response = gateway.post_listen(None, &[("language", "ta")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error_type"], "validation_error");
    assert!(gateway.adapters_untouched());
}

#[tokio::test]
async fn unknown_provider_is_rejected_before_transcription() {
    let gateway = TestGateway::new();

    let response = gateway.post_listen(Some(b"hello"), &[("stt_provider", "whisper")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error_type"], "unknown_provider");
    assert_eq!(gateway.stt.calls(), 0);
}

#[tokio::test]
async fn unsupported_language_hint_is_rejected() {
    let gateway = TestGateway::new();

    let response = gateway.post_listen(Some(b"hello"), &[("language", "xx")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(gateway.stt.calls(), 0);
}
