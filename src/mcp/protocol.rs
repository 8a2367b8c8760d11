//! Typed MCP lifecycle wrapper over [`JsonRpcClient`]
//!
//! This module provides two types that represent the two phases of an MCP
//! client session:
//!
//! - [`McpProtocol`] -- an uninitialized client. Call [`McpProtocol::initialize`]
//!   to perform the JSON-RPC `initialize` / `notifications/initialized`
//!   handshake and receive an [`InitializedMcpProtocol`].
//! - [`InitializedMcpProtocol`] -- a fully negotiated session. The tool-facing
//!   MCP methods (`tools/list`, `tools/call`, `ping`) are available as typed
//!   async methods.
//!
//! # Design
//!
//! Pagination is handled internally: `list_tools` follows `nextCursor` until
//! the server returns `null`, accumulating results before returning.
//!
//! Neither type owns a transport; callers wire up channels externally and pass
//! the resulting [`JsonRpcClient`] into [`McpProtocol::new`].

use crate::error::{CampushubError, Result};
use crate::mcp::client::JsonRpcClient;
use crate::mcp::types::{
    CallToolParams, CallToolResponse, ClientCapabilities, Implementation, InitializeParams,
    InitializeResponse, ListToolsResponse, McpTool, PaginatedParams, LATEST_PROTOCOL_VERSION,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    SUPPORTED_PROTOCOL_VERSIONS,
};

// ---------------------------------------------------------------------------
// Capability flag enum
// ---------------------------------------------------------------------------

/// Identifies a specific capability that may be advertised by a server.
///
/// Used with [`InitializedMcpProtocol::capable`] to check whether the
/// negotiated server supports a given feature before issuing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCapabilityFlag {
    /// Server exposes tools via `tools/list` and `tools/call`.
    Tools,
    /// Server supports log notifications.
    Logging,
    /// Server advertises experimental capabilities.
    Experimental,
}

// ---------------------------------------------------------------------------
// McpProtocol -- uninitialized
// ---------------------------------------------------------------------------

/// An uninitialized MCP client session.
///
/// Wraps a [`JsonRpcClient`] and provides a single method,
/// [`McpProtocol::initialize`], which performs the MCP handshake and returns
/// an [`InitializedMcpProtocol`] ready for use.
///
/// # Examples
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use campushub::mcp::client::JsonRpcClient;
/// use campushub::mcp::protocol::McpProtocol;
/// use campushub::mcp::types::{ClientCapabilities, Implementation};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let (tx, _rx) = mpsc::unbounded_channel::<String>();
///     let client = JsonRpcClient::new(tx);
///     let proto = McpProtocol::new(client);
///
///     // In practice you would also start_read_loop and connect a transport.
///     let _session = proto.initialize(
///         Implementation { name: "campushub".into(), version: "0.1.0".into() },
///         ClientCapabilities::default(),
///     );
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct McpProtocol {
    client: JsonRpcClient,
}

impl McpProtocol {
    /// Create a new uninitialized MCP protocol session.
    ///
    /// # Arguments
    ///
    /// * `client` - A connected (channel-wired) [`JsonRpcClient`]. The caller
    ///   must have already called [`crate::mcp::client::start_read_loop`].
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }

    /// Perform the MCP `initialize` / `notifications/initialized` handshake.
    ///
    /// Sends an `initialize` request with the given client capabilities and
    /// identity, verifies that the server's chosen protocol version is in
    /// [`SUPPORTED_PROTOCOL_VERSIONS`], sends the `notifications/initialized`
    /// notification, and returns an [`InitializedMcpProtocol`].
    ///
    /// # Arguments
    ///
    /// * `client_info` - Name and version of this client implementation.
    /// * `capabilities` - Capabilities this client wishes to advertise.
    ///
    /// # Errors
    ///
    /// Returns [`CampushubError::McpProtocolVersion`] if the server returns a
    /// protocol version that is not in [`SUPPORTED_PROTOCOL_VERSIONS`].
    ///
    /// Returns [`CampushubError::McpTransport`] if the outbound channel is closed.
    ///
    /// Returns [`CampushubError::McpTimeout`] if the server does not respond in
    /// time (default 30 s).
    pub async fn initialize(
        self,
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<InitializedMcpProtocol> {
        let response: InitializeResponse = self
            .client
            .request(
                METHOD_INITIALIZE,
                InitializeParams {
                    protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                    capabilities,
                    client_info,
                },
                None,
            )
            .await?;

        // Verify the server selected a version we support.
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(CampushubError::McpProtocolVersion {
                expected: SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                got: response.protocol_version,
            }
            .into());
        }

        // Fire-and-forget the initialized notification; errors are not fatal.
        let _ = self
            .client
            .notify(METHOD_INITIALIZED, serde_json::json!({}));

        Ok(InitializedMcpProtocol {
            client: self.client,
            initialize_response: response,
        })
    }
}

// ---------------------------------------------------------------------------
// InitializedMcpProtocol -- fully negotiated session
// ---------------------------------------------------------------------------

/// A fully negotiated MCP client session.
///
/// Created by [`McpProtocol::initialize`]. Provides typed async methods for
/// the tool-facing MCP operations.
#[derive(Debug)]
pub struct InitializedMcpProtocol {
    /// The underlying JSON-RPC client.
    pub client: JsonRpcClient,
    /// The server's response to the `initialize` request.
    pub initialize_response: InitializeResponse,
}

impl InitializedMcpProtocol {
    /// Check whether the server advertises a specific capability.
    ///
    /// Inspects the capability fields on the [`InitializeResponse`] that was
    /// received during the handshake.
    pub fn capable(&self, capability: ServerCapabilityFlag) -> bool {
        let caps = &self.initialize_response.capabilities;
        match capability {
            ServerCapabilityFlag::Tools => caps.tools.is_some(),
            ServerCapabilityFlag::Logging => caps.logging.is_some(),
            ServerCapabilityFlag::Experimental => caps.experimental.is_some(),
        }
    }

    /// List all tools advertised by the server, following pagination automatically.
    ///
    /// Issues one or more `tools/list` requests, following `nextCursor` until
    /// the server returns `null`, and returns the complete accumulated list.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let resp: ListToolsResponse = self
                .client
                .request(METHOD_TOOLS_LIST, PaginatedParams { cursor }, None)
                .await?;

            tools.extend(resp.tools);

            match resp.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a named tool on the server.
    ///
    /// # Arguments
    ///
    /// * `name` - The tool name as returned by `tools/list`.
    /// * `arguments` - Optional JSON arguments matching the tool's `inputSchema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns a JSON-RPC error.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResponse> {
        self.client
            .request(
                METHOD_TOOLS_CALL,
                CallToolParams {
                    name: name.to_string(),
                    arguments,
                },
                None,
            )
            .await
    }

    /// Send a `ping` request and verify the server responds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request times out or the channel is closed.
    pub async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .request(METHOD_PING, serde_json::json!({}), None)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::start_read_loop;
    use crate::mcp::types::ServerCapabilities;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    /// Build a wired `McpProtocol` whose underlying `JsonRpcClient` shares its
    /// pending map with the read loop via `clone_shared`.
    ///
    /// Returns `(protocol, server_outbound_rx, server_inbound_tx, cancel_token)`.
    fn wired_protocol() -> (
        McpProtocol,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
        CancellationToken,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let token = CancellationToken::new();
        let shared = Arc::new(JsonRpcClient::new(out_tx));
        start_read_loop(in_rx, token.clone(), Arc::clone(&shared));
        (
            McpProtocol::new(shared.clone_shared()),
            out_rx,
            in_tx,
            token,
        )
    }

    /// Build a wired `InitializedMcpProtocol` whose `JsonRpcClient` is shared
    /// with the read loop. Returns `(session, out_rx, in_tx, token)`.
    fn wired_session(
        capabilities: ServerCapabilities,
    ) -> (
        InitializedMcpProtocol,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
        CancellationToken,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let token = CancellationToken::new();
        let shared = Arc::new(JsonRpcClient::new(out_tx));
        start_read_loop(in_rx, token.clone(), Arc::clone(&shared));
        let session = InitializedMcpProtocol {
            client: shared.clone_shared(),
            initialize_response: InitializeResponse {
                protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                capabilities,
                server_info: Implementation {
                    name: "mock".to_string(),
                    version: "1.0".to_string(),
                },
                instructions: None,
            },
        };
        (session, out_rx, in_tx, token)
    }

    #[test]
    fn test_server_capability_flag_tools_absent_by_default() {
        let resp = InitializeResponse {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: Implementation {
                name: "mock".to_string(),
                version: "0.1".to_string(),
            },
            instructions: None,
        };
        let session = InitializedMcpProtocol {
            client: {
                let (tx, _rx) = mpsc::unbounded_channel::<String>();
                JsonRpcClient::new(tx)
            },
            initialize_response: resp,
        };
        assert!(!session.capable(ServerCapabilityFlag::Tools));
        assert!(!session.capable(ServerCapabilityFlag::Logging));
    }

    #[test]
    fn test_server_capability_flag_tools_present() {
        let caps = ServerCapabilities {
            tools: Some(serde_json::json!({})),
            ..Default::default()
        };
        let resp = InitializeResponse {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: caps,
            server_info: Implementation {
                name: "mock".to_string(),
                version: "0.1".to_string(),
            },
            instructions: None,
        };
        let session = InitializedMcpProtocol {
            client: {
                let (tx, _rx) = mpsc::unbounded_channel::<String>();
                JsonRpcClient::new(tx)
            },
            initialize_response: resp,
        };
        assert!(session.capable(ServerCapabilityFlag::Tools));
        assert!(!session.capable(ServerCapabilityFlag::Logging));
    }

    #[tokio::test]
    async fn test_initialize_rejects_unsupported_protocol_version() {
        let (proto, mut out_rx, in_tx, ct) = wired_protocol();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let raw = out_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            let id = req["id"].clone();
            let resp = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "1999-01-01",
                    "capabilities": {},
                    "serverInfo": { "name": "old-server", "version": "0.0.1" }
                }
            });
            in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
        });

        let result = proto
            .initialize(
                Implementation {
                    name: "campushub".to_string(),
                    version: "0.1.0".to_string(),
                },
                ClientCapabilities::default(),
            )
            .await;

        assert!(result.is_err());
        let err_str = result.unwrap_err().to_string();
        assert!(
            err_str.contains("1999-01-01") || err_str.contains("version"),
            "unexpected error: {err_str}"
        );
        ct.cancel();
    }

    #[tokio::test]
    async fn test_initialize_succeeds_with_supported_version() {
        let (proto, mut out_rx, in_tx, ct) = wired_protocol();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let raw = out_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            let id = req["id"].clone();
            let resp = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": LATEST_PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "test-server", "version": "1.0.0" }
                }
            });
            in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
        });

        let result = proto
            .initialize(
                Implementation {
                    name: "campushub".to_string(),
                    version: "0.1.0".to_string(),
                },
                ClientCapabilities::default(),
            )
            .await;

        assert!(result.is_ok(), "expected Ok, got: {:?}", result.err());
        let session = result.unwrap();
        assert_eq!(
            session.initialize_response.protocol_version,
            LATEST_PROTOCOL_VERSION
        );
        assert!(session.capable(ServerCapabilityFlag::Tools));
        ct.cancel();
    }

    #[tokio::test]
    async fn test_initialize_sends_initialized_notification() {
        let (proto, mut out_rx, in_tx, ct) = wired_protocol();

        let responder = tokio::spawn(async move {
            let raw = out_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            let id = req["id"].clone();
            let resp = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": LATEST_PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "test-server", "version": "1.0.0" }
                }
            });
            in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();

            // The next outbound message must be the initialized notification.
            let raw2 = out_rx.recv().await.unwrap();
            let notif: serde_json::Value = serde_json::from_str(&raw2).unwrap();
            assert_eq!(notif["method"], METHOD_INITIALIZED);
            assert!(notif.get("id").is_none());
        });

        let result = proto
            .initialize(
                Implementation {
                    name: "campushub".to_string(),
                    version: "0.1.0".to_string(),
                },
                ClientCapabilities::default(),
            )
            .await;
        assert!(result.is_ok());
        responder.await.unwrap();
        ct.cancel();
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor_pagination() {
        let (session, mut out_rx, in_tx, ct) = wired_session(ServerCapabilities::default());

        tokio::spawn(async move {
            // First page: returns one tool and a cursor.
            tokio::time::sleep(Duration::from_millis(5)).await;
            let raw = out_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            let id1 = req["id"].clone();
            let resp1 = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id1,
                "result": {
                    "tools": [{ "name": "get_students", "inputSchema": {} }],
                    "nextCursor": "page2"
                }
            });
            in_tx.send(serde_json::to_string(&resp1).unwrap()).unwrap();

            // Second page: returns one tool and no cursor; the cursor must echo.
            tokio::time::sleep(Duration::from_millis(5)).await;
            let raw2 = out_rx.recv().await.unwrap();
            let req2: serde_json::Value = serde_json::from_str(&raw2).unwrap();
            assert_eq!(req2["params"]["cursor"], "page2");
            let id2 = req2["id"].clone();
            let resp2 = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id2,
                "result": {
                    "tools": [{ "name": "get_student_count", "inputSchema": {} }],
                    "nextCursor": null
                }
            });
            in_tx.send(serde_json::to_string(&resp2).unwrap()).unwrap();
        });

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "get_students");
        assert_eq!(tools[1].name, "get_student_count");
        ct.cancel();
    }

    #[tokio::test]
    async fn test_call_tool_sends_name_and_arguments() {
        let (session, mut out_rx, in_tx, ct) = wired_session(ServerCapabilities::default());

        tokio::spawn(async move {
            let raw = out_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(req["method"], METHOD_TOOLS_CALL);
            assert_eq!(req["params"]["name"], "get_student_by_id");
            assert_eq!(req["params"]["arguments"]["id"], 7);
            let id = req["id"].clone();
            let resp = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{ "type": "text", "text": "{\"id\":7}" }],
                    "isError": false
                }
            });
            in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
        });

        let resp = session
            .call_tool("get_student_by_id", Some(serde_json::json!({ "id": 7 })))
            .await
            .unwrap();
        assert_eq!(resp.is_error, Some(false));
        assert_eq!(resp.content.len(), 1);
        ct.cancel();
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let (session, mut out_rx, in_tx, ct) = wired_session(ServerCapabilities::default());

        tokio::spawn(async move {
            let raw = out_rx.recv().await.unwrap();
            let req: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(req["method"], METHOD_PING);
            let id = req["id"].clone();
            let resp = serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": {} });
            in_tx.send(serde_json::to_string(&resp).unwrap()).unwrap();
        });

        session.ping().await.unwrap();
        ct.cancel();
    }
}
