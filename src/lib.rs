pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod mcp;
pub mod server;
pub mod sse;
