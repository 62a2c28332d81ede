//! Shared helpers for driving the full router in integration tests.

#![allow(dead_code)]

use axum::{
    body::{Body, BodyDataStream},
    http::{Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use recipe_saver_mcp::{
    config::Config,
    database::create_pool,
    server::{build_router, AppState},
};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config {
            database_path: dir.path().join("recipes.db").display().to_string(),
            ..Config::default()
        };
        let db = create_pool(&config.database_url())
            .await
            .expect("create database");
        let state = AppState::new(config, db);

        Self {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Sends a request and decodes the body as JSON (`Value::Null` when empty or not JSON).
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(build_request(method, uri, body))
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Like [`TestApp::request`] but returns the raw body text.
    pub async fn request_text(&self, method: &str, uri: &str, body: Body) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .expect("valid request");
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Opens `GET /sse` and returns a reader over its event stream.
    pub async fn connect_sse(&self) -> SseReader {
        let response = self
            .router
            .clone()
            .oneshot(build_request("GET", "/sse", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        SseReader {
            stream: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }
}

pub fn build_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("valid request"),
        None => builder.body(Body::empty()).expect("valid request"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

pub struct SseReader {
    stream: BodyDataStream,
    buffer: String,
}

impl SseReader {
    /// Next named event; keep-alive comments are skipped. `None` once the stream ends.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
                continue;
            }

            let chunk = tokio::time::timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("timed out waiting for an SSE event")?
                .expect("read SSE chunk");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Next `message` event decoded as JSON
    pub async fn next_message(&mut self) -> Value {
        let event = self.next_event().await.expect("stream still open");
        assert_eq!(event.event, "message");
        serde_json::from_str(&event.data).expect("message data is JSON")
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data = Vec::new();
    for line in block.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}
