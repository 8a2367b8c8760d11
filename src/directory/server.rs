//! Stdio JSON-RPC server for the student directory
//!
//! [`DirectoryServer`] implements the server half of the MCP handshake over
//! newline-delimited JSON on stdin/stdout. It answers `initialize`, `ping`,
//! `tools/list`, and `tools/call`, swallows `notifications/initialized`, and
//! returns `-32601` for everything else. Malformed JSON gets `-32700`.
//!
//! Stdout carries JSON-RPC messages exclusively; all logging goes through
//! `tracing` (stderr and the rolling file configured by the `directory`
//! subcommand).

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::directory::service::DirectoryService;
use crate::directory::tools;
use crate::error::Result;
use crate::mcp::types::{
    CallToolParams, CallToolResponse, Implementation, InitializeResponse, JsonRpcError,
    JsonRpcResponse, ListToolsResponse, ServerCapabilities, ToolResponseContent, ERROR_INTERNAL,
    ERROR_INVALID_PARAMS, ERROR_METHOD_NOT_FOUND, ERROR_PARSE, LATEST_PROTOCOL_VERSION,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    SUPPORTED_PROTOCOL_VERSIONS,
};

/// MCP stdio server exposing the student directory tools.
#[derive(Debug)]
pub struct DirectoryServer {
    service: Arc<DirectoryService>,
}

impl DirectoryServer {
    /// Create a server backed by the given directory service.
    pub fn new(service: Arc<DirectoryService>) -> Self {
        Self { service }
    }

    /// Serve requests from stdin until the peer closes the pipe.
    ///
    /// # Errors
    ///
    /// Returns an error only when writing to stdout fails; per-request
    /// failures are answered with JSON-RPC error responses instead.
    pub async fn run(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        tracing::info!("directory MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                stdout.write_all(response.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, directory MCP server shutting down");
        Ok(())
    }

    /// Process one inbound line and produce the serialized response, if any.
    ///
    /// Notifications return `None`; everything else (including malformed
    /// input) produces a response string.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let message: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("failed to parse inbound JSON-RPC message: {e}");
                return Some(serialize_response(error_response(
                    serde_json::Value::Null,
                    ERROR_PARSE,
                    "Parse error",
                )));
            }
        };

        let method = message
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        let params = message
            .get("params")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let Some(id) = message.get("id").filter(|id| !id.is_null()).cloned() else {
            // Notification: nothing to answer.
            if method != METHOD_INITIALIZED {
                tracing::debug!(method, "ignoring notification");
            }
            return None;
        };

        let response = match method.as_str() {
            METHOD_INITIALIZE => self.handle_initialize(id, &params),
            METHOD_PING => ok_response(id, serde_json::json!({})),
            METHOD_TOOLS_LIST => self.handle_tools_list(id),
            METHOD_TOOLS_CALL => self.handle_tools_call(id, params).await,
            other => {
                tracing::warn!(method = other, "method not found");
                error_response(id, ERROR_METHOD_NOT_FOUND, "Method not found")
            }
        };

        Some(serialize_response(response))
    }

    fn handle_initialize(&self, id: serde_json::Value, params: &serde_json::Value) -> JsonRpcResponse {
        // Echo the client's requested version when we support it, otherwise
        // answer with the latest we speak and let the client decide.
        let requested = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(LATEST_PROTOCOL_VERSION);
        let version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
            requested
        } else {
            LATEST_PROTOCOL_VERSION
        };

        tracing::info!(protocol_version = version, "initialize handshake");

        let result = InitializeResponse {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(serde_json::json!({})),
                ..Default::default()
            },
            server_info: Implementation {
                name: "campushub-directory".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: None,
        };

        match serde_json::to_value(&result) {
            Ok(value) => ok_response(id, value),
            Err(e) => error_response(id, ERROR_INTERNAL, &e.to_string()),
        }
    }

    fn handle_tools_list(&self, id: serde_json::Value) -> JsonRpcResponse {
        let result = ListToolsResponse {
            tools: tools::tool_descriptors(),
            next_cursor: None,
        };
        match serde_json::to_value(&result) {
            Ok(value) => ok_response(id, value),
            Err(e) => error_response(id, ERROR_INTERNAL, &e.to_string()),
        }
    }

    async fn handle_tools_call(
        &self,
        id: serde_json::Value,
        params: serde_json::Value,
    ) -> JsonRpcResponse {
        let call: CallToolParams = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => {
                return error_response(id, ERROR_INVALID_PARAMS, &format!("Invalid params: {e}"));
            }
        };

        let args = call.arguments.unwrap_or(serde_json::json!({}));
        let text = tools::dispatch(&self.service, &call.name, &args).await;

        let result = CallToolResponse {
            content: vec![ToolResponseContent::Text { text }],
            is_error: Some(false),
        };
        match serde_json::to_value(&result) {
            Ok(value) => ok_response(id, value),
            Err(e) => error_response(id, ERROR_INTERNAL, &e.to_string()),
        }
    }
}

fn ok_response(id: serde_json::Value, result: serde_json::Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: Some(id),
        result: Some(result),
        error: None,
    }
}

fn error_response(id: serde_json::Value, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: Some(id),
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
            data: None,
        }),
    }
}

fn serialize_response(response: JsonRpcResponse) -> String {
    serde_json::to_string(&response).unwrap_or_else(|e| {
        // A JsonRpcResponse built from owned values always serializes; this
        // branch exists to keep stdout flowing if that ever changes.
        tracing::error!("failed to serialize JSON-RPC response: {e}");
        format!(
            r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{ERROR_INTERNAL},"message":"serialization failure"}}}}"#
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::student::Student;
    use std::time::Duration;

    async fn server_with_students() -> DirectoryServer {
        let service = Arc::new(DirectoryService::new(
            "http://127.0.0.1:1",
            Duration::from_secs(3600),
        ));
        service
            .prime_cache(vec![Student::new(5, "Grace", "Hopper", "Navy")])
            .await;
        DirectoryServer::new(service)
    }

    #[tokio::test]
    async fn test_initialize_echoes_supported_version() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "campushub", "version": "0.1.0" }
            }
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
        assert_eq!(resp["result"]["serverInfo"]["name"], "campushub-directory");
    }

    #[tokio::test]
    async fn test_initialize_falls_back_to_latest_version() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "initialize",
            "params": { "protocolVersion": "1999-01-01" }
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["result"]["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_initialized_notification_gets_no_reply() {
        let server = server_with_students().await;
        let notif = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        assert!(server.handle_line(&notif.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_returns_all_descriptors() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/list",
            "params": {}
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 7);
        assert!(resp["result"].get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_returns_text_content() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "get_student_count", "arguments": {} }
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["result"]["content"][0]["type"], "text");
        assert_eq!(resp["result"]["content"][0]["text"], "1");
        assert_eq!(resp["result"]["isError"], false);
    }

    #[tokio::test]
    async fn test_tools_call_miss_carries_sentinel() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": { "name": "get_student_by_id", "arguments": { "id": 404 } }
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["result"]["content"][0]["text"], "Student not found");
    }

    #[tokio::test]
    async fn test_unknown_method_returns_method_not_found() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "resources/list",
            "params": {}
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["error"]["code"], ERROR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_returns_parse_error() {
        let server = server_with_students().await;
        let raw = server.handle_line("{not json").await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["error"]["code"], ERROR_PARSE);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn test_ping_returns_empty_result() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "ping"
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_tools_call_invalid_params_rejected() {
        let server = server_with_students().await;
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 8,
            "method": "tools/call",
            "params": { "no_name_field": true }
        });

        let raw = server.handle_line(&req.to_string()).await.unwrap();
        let resp: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["error"]["code"], ERROR_INVALID_PARAMS);
    }
}
