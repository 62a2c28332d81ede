/// Centralized constants and helpers for MCP protocol
use serde_json::{json, Value};

/// Latest MCP protocol revision this server speaks
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Revisions accepted during capability exchange, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Name announced in `serverInfo`
pub const SERVER_NAME: &str = "recipe-saver";

/// Path the agent posts request messages to, with `?sessionId=` appended
pub const MESSAGES_PATH: &str = "/messages";

/// Pick the revision to answer `initialize` with
pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|supported| *supported == requested)
        .unwrap_or(MCP_PROTOCOL_VERSION)
}

/// JSON-RPC envelope builders to ensure consistency
pub struct JsonRpcEnvelopes;

impl JsonRpcEnvelopes {
    /// Create JSON-RPC error response
    pub fn error_response(code: i32, message: &str, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": code,
                "message": message
            },
            "id": id
        })
    }

    /// Relative URL the agent must post its request messages to
    pub fn endpoint(session_id: &str) -> String {
        format!("{}?sessionId={}", MESSAGES_PATH, session_id)
    }
}

/// Build MCP client config JSON for the SSE endpoint
pub fn build_mcp_config(host: &str, port: u16) -> Value {
    json!({
        "mcpServers": {
            SERVER_NAME: {
                "type": "sse",
                "url": format!("http://{}:{}/sse", host, port),
                "protocol_version": MCP_PROTOCOL_VERSION
            }
        }
    })
}
