//! Tool source seam between the relay and the directory sidecar
//!
//! [`ToolSource`] abstracts where tool descriptors and invocations come
//! from, so the relay can be tested with an in-memory implementation. The
//! production implementation, [`McpToolSource`], wraps an initialized MCP
//! session to the directory server.

use async_trait::async_trait;

use crate::error::Result;
use crate::mcp::protocol::InitializedMcpProtocol;
use crate::mcp::types::{McpTool, ToolResponseContent};

/// Where the relay gets its tools from.
///
/// Injected into the relay explicitly; there is no process-global tool
/// registry.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// The tools currently available.
    async fn list_tools(&self) -> Result<Vec<McpTool>>;

    /// Invoke a tool and return its text output.
    async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<String>;
}

/// [`ToolSource`] backed by an MCP session to the directory sidecar.
#[derive(Debug)]
pub struct McpToolSource {
    session: InitializedMcpProtocol,
}

impl McpToolSource {
    /// Wrap an already-initialized MCP session.
    pub fn new(session: InitializedMcpProtocol) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ToolSource for McpToolSource {
    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.session.list_tools().await
    }

    async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<String> {
        let response = self.session.call_tool(name, Some(args)).await?;

        // Flatten all text content items into one string.
        let text = response
            .content
            .into_iter()
            .map(|item| match item {
                ToolResponseContent::Text { text } => text,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}
