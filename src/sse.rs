//! MCP over HTTP+SSE.
//!
//! `GET /sse` opens a push channel and registers a session; the first event
//! tells the agent where to post. `POST /messages?sessionId=` routes one
//! JSON-RPC message to that session's engine and the reply travels back over
//! the push channel, never in the POST response.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    database::DbPool,
    error::{AppError, Result},
    mcp::{
        constants::JsonRpcEnvelopes,
        server::ProtocolEngine,
        tools::ToolRegistry,
        types::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR},
    },
    server::AppState,
};

/// Frames pushed to an agent over its SSE channel
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Relative URL the agent posts its requests to
    Endpoint(String),
    /// A serialized JSON-RPC response
    Message(Value),
}

impl SessionEvent {
    pub fn into_event(self) -> Event {
        match self {
            SessionEvent::Endpoint(url) => Event::default().event("endpoint").data(url),
            SessionEvent::Message(message) => {
                Event::default().event("message").data(message.to_string())
            }
        }
    }
}

pub type PushChannel = mpsc::UnboundedSender<SessionEvent>;

struct Session {
    id: String,
    sender: PushChannel,
    /// Serializes requests within one session; sessions never wait on each other.
    engine: Mutex<ProtocolEngine>,
    created_at: DateTime<Utc>,
    closed: AtomicBool,
}

/// Routing table from session id to live protocol engine.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    tools: Arc<ToolRegistry>,
    db: DbPool,
}

impl SessionManager {
    pub fn new(tools: Arc<ToolRegistry>, db: DbPool) -> Self {
        Self {
            sessions: DashMap::new(),
            tools,
            db,
        }
    }

    /// Registers a fresh engine bound to `channel` and announces the post URL on it.
    pub fn open(&self, channel: PushChannel) -> Result<String> {
        loop {
            let id = Uuid::new_v4().to_string();
            let entry = match self.sessions.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(entry) => entry,
            };

            channel
                .send(SessionEvent::Endpoint(JsonRpcEnvelopes::endpoint(&id)))
                .map_err(|_| AppError::ChannelClosed(id.clone()))?;

            entry.insert(Arc::new(Session {
                id: id.clone(),
                sender: channel,
                engine: Mutex::new(ProtocolEngine::new(self.tools.clone(), self.db.clone())),
                created_at: Utc::now(),
                closed: AtomicBool::new(false),
            }));

            info!(
                "Session {} opened ({} active)",
                id,
                self.sessions.len()
            );
            return Ok(id);
        }
    }

    /// Hands one message to the session's engine and pushes any reply onto its
    /// channel. A failed push tears the session down.
    pub async fn route(
        &self,
        session_id: &str,
        request: JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>> {
        // Clone out of the map so no shard lock is held across an await.
        let session = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        let mut engine = session.engine.lock().await;
        if session.closed.load(Ordering::Acquire) {
            return Err(AppError::SessionNotFound(session_id.to_string()));
        }

        let Some(response) = engine.handle_request(request).await else {
            return Ok(None);
        };

        // Still holding the engine lock, so replies keep request order.
        let frame = serde_json::to_value(&response)?;
        if session.sender.send(SessionEvent::Message(frame)).is_err() {
            warn!("Push channel for session {} is gone, closing", session.id);
            self.close(session_id);
            return Err(AppError::ChannelClosed(session_id.to_string()));
        }

        Ok(Some(response))
    }

    /// Idempotent. Returns whether a live session was removed.
    pub fn close(&self, session_id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return false;
        };

        session.closed.store(true, Ordering::Release);
        // A request in flight holds the lock; it sees the flag on its next route.
        if let Ok(mut engine) = session.engine.try_lock() {
            engine.close();
        }

        let lifetime = Utc::now() - session.created_at;
        info!(
            "Session {} closed after {}s ({} active)",
            session.id,
            lifetime.num_seconds(),
            self.sessions.len()
        );
        true
    }

    /// Closes every session, ending their SSE streams.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.close(id)).count()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Closes its session when the SSE stream holding it is dropped.
pub struct SessionGuard {
    manager: Arc<SessionManager>,
    session_id: String,
}

impl SessionGuard {
    pub fn new(manager: Arc<SessionManager>, session_id: String) -> Self {
        Self {
            manager,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.manager.close(&self.session_id) {
            debug!("SSE stream for session {} dropped", self.session_id);
        }
    }
}

/// Push channel for one agent
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session_id = state.sessions.open(tx)?;
    let guard = SessionGuard::new(state.sessions.clone(), session_id);

    let stream = async_stream::stream! {
        let guard = guard;
        while let Some(event) = rx.recv().await {
            yield Ok(event.into_event());
        }
        debug!("Push channel for session {} ended", guard.session_id());
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.config.keep_alive_interval())))
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Accepts one JSON-RPC message for an open session
pub async fn sse_message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| state.sessions.contains(id)) else {
        return AppError::SessionNotFound(String::new()).into_response();
    };

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return parse_error(&rejection.body_text(), None),
    };
    debug!("Received message for session {}: {}", session_id, payload);

    let request: JsonRpcRequest = match serde_json::from_value(payload.clone()) {
        Ok(request) => request,
        Err(e) => return parse_error(&e.to_string(), payload.get("id").cloned()),
    };

    match state.sessions.route(&session_id, request).await {
        Ok(_) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(e) => e.into_response(),
    }
}

fn parse_error(detail: &str, id: Option<Value>) -> Response {
    let body = JsonRpcEnvelopes::error_response(PARSE_ERROR, &format!("Parse error: {}", detail), id);
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use assert_matches::assert_matches;
    use serde_json::json;

    async fn manager() -> (tempfile::TempDir, Arc<SessionManager>) {
        let (dir, pool) = test_pool().await;
        let manager = SessionManager::new(Arc::new(ToolRegistry::with_recipe_tools()), pool);
        (dir, Arc::new(manager))
    }

    fn request(id: i64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_open_announces_endpoint_first() {
        let (_dir, manager) = manager().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = manager.open(tx).unwrap();

        assert!(manager.contains(&id));
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Endpoint(format!("/messages?sessionId={}", id))
        );
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_ids() {
        let (_dir, manager) = manager().await;
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let first = manager.open(tx1).unwrap();
        let second = manager.open(tx2).unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.session_count(), 2);
    }

    #[tokio::test]
    async fn test_route_unknown_session() {
        let (_dir, manager) = manager().await;

        let result = manager.route("nope", request(1, "ping", None)).await;

        assert_matches!(result, Err(AppError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_route_pushes_reply_onto_channel() {
        let (_dir, manager) = manager().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).unwrap();
        rx.recv().await.unwrap();

        let response = manager
            .route(&id, request(7, "ping", None))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.id, Some(json!(7)));
        match rx.recv().await.unwrap() {
            SessionEvent::Message(frame) => {
                assert_eq!(frame["id"], 7);
                assert_eq!(frame["result"], json!({}));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_notification_pushes_nothing() {
        let (_dir, manager) = manager().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).unwrap();
        rx.recv().await.unwrap();

        let notification = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(manager.route(&id, notification).await.unwrap().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (_dir, manager) = manager().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).unwrap();

        assert!(manager.close(&id));
        assert!(!manager.close(&id));

        let result = manager.route(&id, request(1, "ping", None)).await;
        assert_matches!(result, Err(AppError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_dropped_receiver_tears_session_down() {
        let (_dir, manager) = manager().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).unwrap();
        drop(rx);

        let result = manager.route(&id, request(1, "ping", None)).await;

        assert_matches!(result, Err(AppError::ChannelClosed(_)));
        assert!(!manager.contains(&id));
    }

    #[tokio::test]
    async fn test_guard_closes_on_drop() {
        let (_dir, manager) = manager().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).unwrap();

        drop(SessionGuard::new(manager.clone(), id.clone()));

        assert!(!manager.contains(&id));
    }

    #[tokio::test]
    async fn test_close_all_ends_channels() {
        let (_dir, manager) = manager().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.open(tx).unwrap();
        rx.recv().await.unwrap();

        assert_eq!(manager.close_all(), 1);
        assert_eq!(manager.session_count(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (_dir, manager) = manager().await;
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let first = manager.open(tx1).unwrap();
        let second = manager.open(tx2).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();

        let init = json!({ "protocolVersion": "2025-03-26", "capabilities": {} });
        manager
            .route(&first, request(1, "initialize", Some(init)))
            .await
            .unwrap();
        let listed = manager
            .route(&second, request(2, "tools/list", None))
            .await
            .unwrap()
            .unwrap();

        // second session never negotiated
        assert!(listed.error.is_some());
        manager.close(&first);
        assert!(manager.contains(&second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sessions_stay_isolated() {
        let (_dir, manager) = manager().await;

        let tasks: Vec<_> = (0..32i64)
            .map(|i| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    let (tx, mut rx) = mpsc::unbounded_channel();
                    let id = manager.open(tx).unwrap();
                    assert_matches!(rx.recv().await, Some(SessionEvent::Endpoint(_)));

                    let response = manager.route(&id, request(i, "ping", None)).await.unwrap();
                    assert_eq!(response.unwrap().id, Some(json!(i)));
                    match rx.recv().await {
                        Some(SessionEvent::Message(frame)) => assert_eq!(frame["id"], i),
                        other => panic!("expected a message frame, got {:?}", other),
                    }

                    assert!(manager.close(&id));
                    id
                })
            })
            .collect();

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }

        assert_eq!(ids.len(), 32);
        assert_eq!(manager.session_count(), 0);
    }
}
