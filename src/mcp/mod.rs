//! MCP (Model Context Protocol) server over stdio.
//!
//! Exposes the research tools and one session prompt to an MCP client
//! speaking newline-delimited JSON-RPC 2.0.

mod protocol;
mod server;

pub use protocol::*;
pub use server::{McpServer, PROTOCOL_VERSION, SERVER_NAME};
