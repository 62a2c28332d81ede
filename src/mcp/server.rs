use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    constants::{negotiate_protocol_version, SERVER_NAME},
    tools::ToolRegistry,
    types::*,
};
use crate::database::DbPool;

type RpcResult = std::result::Result<Value, JsonRpcError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Capabilities not yet exchanged
    Negotiating,
    Ready,
    /// Terminal; the push channel is gone
    Closed,
}

/// Protocol state machine for one agent session.
pub struct ProtocolEngine {
    state: EngineState,
    tools: Arc<ToolRegistry>,
    db: DbPool,
}

impl ProtocolEngine {
    pub fn new(tools: Arc<ToolRegistry>, db: DbPool) -> Self {
        Self {
            state: EngineState::Negotiating,
            tools,
            db,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn close(&mut self) {
        self.state = EngineState::Closed;
    }

    /// Returns `None` for notifications, which never get a reply.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(
            "Handling MCP request: method={}, id={:?}",
            request.method, request.id
        );

        if request.is_notification() {
            if request.method == "notifications/initialized" {
                info!("Client completed initialization");
            } else {
                debug!("Ignoring notification {}", request.method);
            }
            return None;
        }

        let response = match (self.state, request.method.as_str()) {
            (EngineState::Closed, _) => Err(JsonRpcError::new(
                INVALID_REQUEST,
                "Session is closed",
            )),
            (_, "ping") => Ok(Value::Object(Default::default())),
            (_, "initialize") => self.handle_initialize(request.params),
            (EngineState::Negotiating, "tools/list" | "tools/call") => {
                warn!("{} received before initialize", request.method);
                Err(JsonRpcError::new(INVALID_REQUEST, "Server not initialized"))
            }
            (EngineState::Ready, "tools/list") => self.handle_list_tools(),
            (EngineState::Ready, "tools/call") => self.handle_call_tool(request.params).await,
            (_, method) => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method '{}' not found", method),
            )),
        };

        Some(match response {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::failure(request.id, error),
        })
    }

    fn handle_initialize(&mut self, params: Option<Value>) -> RpcResult {
        let request: Option<InitializeRequest> = match params {
            Some(params) => Some(serde_json::from_value(params).map_err(|e| {
                JsonRpcError::new(INVALID_PARAMS, format!("Invalid initialize params: {}", e))
            })?),
            None => None,
        };

        let requested = request
            .as_ref()
            .map(|r| r.protocol_version.as_str())
            .unwrap_or_default();
        let protocol_version = negotiate_protocol_version(requested);

        info!(
            "Protocol version negotiation - Client requested: {}, answering with: {}",
            requested, protocol_version
        );
        if let Some(client) = request.as_ref().and_then(|r| r.client_info.as_ref()) {
            info!("Client: {} {}", client.name, client.version);
        }

        let response = InitializeResponse {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result = serde_json::to_value(response).map_err(|e| {
            JsonRpcError::new(INTERNAL_ERROR, format!("Failed to serialize response: {}", e))
        })?;

        self.state = EngineState::Ready;
        Ok(result)
    }

    fn handle_list_tools(&self) -> RpcResult {
        let response = ListToolsResponse {
            tools: self.tools.list_tools(),
        };

        serde_json::to_value(response).map_err(|e| {
            JsonRpcError::new(INTERNAL_ERROR, format!("Failed to serialize tools: {}", e))
        })
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> RpcResult {
        let request: CallToolRequest = match params {
            Some(params) => serde_json::from_value(params).map_err(|e| {
                JsonRpcError::new(INVALID_PARAMS, format!("Invalid call_tool params: {}", e))
            })?,
            None => {
                return Err(JsonRpcError::new(
                    INVALID_PARAMS,
                    "Missing call_tool parameters",
                ))
            }
        };

        info!("Calling tool: {}", request.name);

        if let Some(ref args) = request.arguments {
            let should_log = match args {
                Value::Null => false,
                Value::Object(map) => !map.is_empty(),
                _ => true,
            };
            if should_log {
                debug!("Tool parameters: {}", args);
            }
        }

        let response = self
            .tools
            .call_tool(&self.db, request)
            .await
            .map_err(|e| {
                error!("Tool execution error: {}", e);
                JsonRpcError::new(INTERNAL_ERROR, format!("Tool execution failed: {}", e))
            })?;

        serde_json::to_value(response).map_err(|e| {
            JsonRpcError::new(
                INTERNAL_ERROR,
                format!("Failed to serialize tool response: {}", e),
            )
        })
    }
}
