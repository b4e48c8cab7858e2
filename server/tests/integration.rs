//! Integration tests for the TTS server

mod common;

use std::io::Cursor;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tower::ServiceExt;

use common::*;

async fn post_tts(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tts")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_api_prefix() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_voices() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/voices").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let voices: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(voices, vec!["F1".to_string(), "M1".to_string()]);
}

#[tokio::test]
async fn test_tts_endpoint_success() {
    let (status, body) = post_tts(
        create_test_app(),
        json!({ "text": "Hello world", "voice": "F1", "speed": 1.0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sample_rate"], SAMPLE_RATE);
    assert_eq!(body["duration_ms"], 500);
    assert_eq!(body["chunks"], 1);

    let wav = general_purpose::STANDARD
        .decode(body["audio_base64"].as_str().unwrap())
        .unwrap();
    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 500);
}

#[tokio::test]
async fn test_tts_endpoint_paragraphs_add_silence() {
    let (status, body) = post_tts(
        create_test_app(),
        json!({
            "text": "First paragraph.\n\nSecond paragraph.",
            "speed": 1.0,
            "silence_duration": 0.3
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["chunks"], 2);
    assert_eq!(body["duration_ms"], 1300);
}

#[tokio::test]
async fn test_tts_endpoint_validation_empty_text() {
    let (status, body) = post_tts(create_test_app(), json!({ "text": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_tts_endpoint_validation_long_text() {
    let (status, _) = post_tts(create_test_app(), json!({ "text": "a".repeat(6000) })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tts_endpoint_invalid_options() {
    let (status, _) = post_tts(create_test_app(), json!({ "text": "Hi", "speed": 9.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_tts(create_test_app(), json!({ "text": "Hi", "total_step": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tts_endpoint_unknown_voice() {
    let (status, body) = post_tts(create_test_app(), json!({ "text": "Hi", "voice": "Z9" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Z9"));
}

#[tokio::test]
async fn test_tts_endpoint_engine_failure() {
    let app = create_app_with(MockEngine {
        duration_secs: 0.5,
        fail_vocoder: true,
    });
    let (status, body) = post_tts(app, json!({ "text": "Hello" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("vocoder"));
}

#[tokio::test]
async fn test_not_found_endpoint() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

async fn spawn_server() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_test_app();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn collect_messages(url: &str) -> Vec<Value> {
    let (mut ws, _) = connect_async(url).await.unwrap();
    let mut messages = Vec::new();
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => messages.push(serde_json::from_str(&text).unwrap()),
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    messages
}

#[tokio::test]
async fn test_websocket_streams_progress_then_audio() {
    let addr = spawn_server().await;
    let messages = collect_messages(&format!("ws://{addr}/stream/M1/Hello%20there.")).await;

    assert_eq!(messages.first().unwrap()["status"], "synthesizing");

    // configured default of two steps, one chunk
    let progress: Vec<&Value> = messages.iter().filter(|m| m["type"] == "denoising").collect();
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0]["step"], 1);
    assert_eq!(progress[1]["progress"], 1.0);

    let audio = messages.iter().find(|m| m["type"] == "audio").unwrap();
    assert_eq!(audio["sample_rate"], SAMPLE_RATE);
    assert_eq!(audio["chunks"], 1);
    assert!(!audio["audio_base64"].as_str().unwrap().is_empty());

    assert_eq!(messages.last().unwrap()["status"], "complete");
}

#[tokio::test]
async fn test_websocket_unknown_voice_reports_error() {
    let addr = spawn_server().await;
    let messages = collect_messages(&format!("ws://{addr}/stream/Nobody/Hello")).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["code"], 404);
}
