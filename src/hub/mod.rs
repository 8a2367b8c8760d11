//! Browser-facing chat hub
//!
//! - `events`: inbound/outbound wire events
//! - `tools`: the `ToolSource` seam and its MCP-backed implementation
//! - `relay`: the completion/tool-invocation loop
//! - `ws`: axum websocket routes

pub mod events;
pub mod relay;
pub mod tools;
pub mod ws;

pub use events::{ClientMessage, ServerEvent, SENDER_AI, SENDER_SYSTEM, SENDER_YOU};
pub use relay::{ChatRelay, NO_RESPONSE};
pub use tools::{McpToolSource, ToolSource};
pub use ws::{router, HubState};
