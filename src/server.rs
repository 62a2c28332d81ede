use axum::{
    extract::State,
    http::Method,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    api::create_api_router,
    config::Config,
    database::{recipes::Recipe, DbPool},
    error::Result,
    mcp::{build_mcp_config, tools::ToolRegistry, MCP_PROTOCOL_VERSION},
    sse::{sse_handler, sse_message_handler, SessionManager},
};

const SERVICE_NAME: &str = "recipe-saver-mcp";

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tools: Arc<ToolRegistry>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let tools = Arc::new(ToolRegistry::with_recipe_tools());
        let sessions = Arc::new(SessionManager::new(tools.clone(), db.clone()));
        Self {
            config,
            db,
            tools,
            sessions,
        }
    }
}

/// Full HTTP surface: MCP transport, REST API, health and info.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::CACHE_CONTROL,
            axum::http::header::HeaderName::from_static("last-event-id"),
            axum::http::header::HeaderName::from_static("mcp-protocol-version"),
        ])
        .allow_origin(axum::http::header::HeaderValue::from_static("*"));

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/sse", get(sse_handler))
        .route("/messages", post(sse_message_handler))
        .nest("/api", create_api_router())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MiB
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let db = crate::database::create_pool(&config.database_url()).await?;

    let state = AppState::new(config.clone(), db.clone());
    let sessions = state.sessions.clone();
    info!("Registered {} MCP tools", state.tools.len());

    let app = build_router(state);

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Server listening on {}", address);
    info!("MCP SSE endpoint: http://{}/sse", address);
    info!("REST API: http://{}/api/recipes", address);

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        let closed = sessions.close_all();
        info!("Shutdown requested, closed {} MCP session(s)", closed);
    };

    match axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => error!("Server error: {}", e),
    }

    crate::database::close_pool(db).await;
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match Recipe::count(&state.db).await {
        Ok(recipes) => Json(json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": timestamp,
            "database": {
                "status": "connected",
                "recipes": recipes
            },
            "sessions": state.sessions.session_count()
        })),
        Err(e) => {
            warn!("Database health check failed: {}", e);
            Json(json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": timestamp,
                "error": "Database connection failed"
            }))
        }
    }
}

async fn service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Save and retrieve recipes from AI assistants over MCP, or directly over REST",
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "endpoints": {
            "mcp": {
                "sse": "GET /sse",
                "messages": "POST /messages?sessionId=<id>"
            },
            "rest": {
                "list": "GET /api/recipes?q=&limit=&offset=",
                "get": "GET /api/recipes/:id",
                "create": "POST /api/recipes",
                "update": "PUT /api/recipes/:id",
                "delete": "DELETE /api/recipes/:id"
            },
            "health": "GET /health"
        },
        "tools": state.tools.list_tools().into_iter().map(|t| t.name).collect::<Vec<_>>(),
        "clientConfig": build_mcp_config(&state.config.host, state.config.port)
    }))
}
