pub mod constants;
pub mod recipe_tools;
pub mod schema;
pub mod server;
pub mod tools;
pub mod types;

// Re-export commonly used constants and helpers
pub use constants::{build_mcp_config, JsonRpcEnvelopes, MCP_PROTOCOL_VERSION};
pub use server::{EngineState, ProtocolEngine};
pub use tools::ToolRegistry;
