//! Integration tests for the reqwest transport.
//!
//! These tests start a real axum server on a random port and drive the
//! client against it end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use chatwire::api::streaming::collect_text;
use chatwire::{ApiError, ApiVariant, Client, ClientConfig};
use futures::StreamExt;
use serde_json::{Value, json};

/// Helper: serve `app` on port 0 and return a client pointed at it.
async fn spawn_test_server(app: Router) -> Client {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ClientConfig::new(ApiVariant::OpenRouter, "sk-integration")
        .with_base_url(format!("http://{addr}/api/v1"))
        .with_retry_delay(Duration::from_millis(20));
    Client::new(config).unwrap()
}

fn sse_response(chunks: &[&'static [u8]]) -> Response {
    let body = futures::stream::iter(chunks.to_vec()).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, std::io::Error>(Bytes::from_static(chunk))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(body))
        .unwrap()
}

// ── Buffered calls ───────────────────────────────────────────────────

#[tokio::test]
async fn rate_limited_then_success() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(
                    headers.get(header::AUTHORIZATION).unwrap(),
                    "Bearer sk-integration"
                );
                assert_eq!(headers.get("x-title").unwrap(), "chatwire");
                assert_eq!(body["model"], "test/model");
                if n == 0 {
                    (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()
                } else {
                    Json(json!({"choices": [{"message": {"content": "ok"}}]})).into_response()
                }
            }
        }),
    );
    let client = spawn_test_server(app).await;

    let out = client
        .generate_content("test/model", json!({"messages": []}))
        .await
        .unwrap();
    assert_eq!(out["choices"][0]["message"]["content"], "ok");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { (StatusCode::UNAUTHORIZED, "bad key") }
        }),
    );
    let client = spawn_test_server(app).await;

    let err = client
        .generate_content("m", json!({"messages": []}))
        .await
        .unwrap_err();
    match err {
        ApiError::Auth { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("expected auth error, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_exhaust_budget() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { (StatusCode::BAD_GATEWAY, "upstream down") }
        }),
    );
    let client = spawn_test_server(app).await;

    let err = client.generate_content("m", json!({})).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.body(), Some("upstream down"));
    // Initial attempt plus three retries.
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(|| async { "definitely not json" }),
    );
    let client = spawn_test_server(app).await;

    let err = client.generate_content("m", json!({})).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
}

// ── Streaming ────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_decodes_split_multibyte_character() {
    // "é" is 0xC3 0xA9; split it across chunks, along with a JSON object.
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["stream"], true);
            sse_response(&[
                b": keep-alive\n\n",
                b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xc3",
                b"\xa9\"}}]}\n\ndata: {\"choices\":[{\"delta\":",
                b"{\"content\":\"!\"}}]}\n\n",
                b"data: [DONE]\n\n",
            ])
        }),
    );
    let client = spawn_test_server(app).await;

    let events: Vec<Value> = client
        .generate_content_stream("m", json!({"messages": []}))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;
    assert_eq!(events.len(), 2);
    assert_eq!(collect_text(&events), "café!");
}

#[tokio::test]
async fn stream_without_trailing_newline_yields_last_event() {
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(|| async { sse_response(&[b"data: {\"x\":1}\n\n", b"data: {\"x\":2}"]) }),
    );
    let client = spawn_test_server(app).await;

    let events: Vec<Value> = client
        .generate_content_stream("m", json!({}))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;
    assert_eq!(events, vec![json!({"x": 1}), json!({"x": 2})]);
}

#[tokio::test]
async fn stream_handshake_retries_on_503() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response()
                } else {
                    sse_response(&[b"data: {\"ok\":true}\n\ndata: [DONE]\n\n"])
                }
            }
        }),
    );
    let client = spawn_test_server(app).await;

    let events: Vec<Value> = client
        .generate_content_stream("m", json!({}))
        .await
        .unwrap()
        .map(|e| e.unwrap())
        .collect()
        .await;
    assert_eq!(events, vec![json!({"ok": true})]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

// ── Models ───────────────────────────────────────────────────────────

#[tokio::test]
async fn list_models_round_trip() {
    let app = Router::new().route(
        "/api/v1/models",
        get(|headers: HeaderMap| async move {
            assert!(headers.get(header::AUTHORIZATION).is_some());
            Json(json!({"data": [{"id": "a/one"}, {"id": "b/two"}]}))
        }),
    );
    let client = spawn_test_server(app).await;

    let models = client.list_models().await.unwrap();
    let ids: Vec<&str> = models["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["a/one", "b/two"]);
}

#[tokio::test]
async fn connection_refused_is_fatal_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(ApiVariant::OpenAi, "k")
        .with_base_url(format!("http://{addr}/v1"))
        .with_retry_delay(Duration::from_millis(1));
    let client = Client::new(config).unwrap();

    let err = client.generate_content("m", json!({})).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport { status: None, .. }), "got {err:?}");
}
