//! Error types for campushub
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for campushub operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, provider interactions, MCP tool invocation,
/// and hub request handling.
#[derive(Error, Debug)]
pub enum CampushubError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Chat hub errors (connection handling, event encoding)
    #[error("Hub error: {0}")]
    Hub(String),

    /// Directory service errors (upstream fetch, lookup dispatch)
    #[error("Directory error: {0}")]
    Directory(String),

    /// MCP protocol-level errors (JSON-RPC error responses, bad payloads)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// MCP transport failures (closed channels, spawn failures, broken pipes)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// An MCP request did not receive a response in time
    #[error("MCP timeout: server={server}, method={method}")]
    McpTimeout {
        /// Name of the server that failed to respond
        server: String,
        /// The JSON-RPC method that timed out
        method: String,
    },

    /// The server negotiated a protocol version this client does not support
    #[error("MCP protocol version mismatch: expected one of {expected:?}, got {got}")]
    McpProtocolVersion {
        /// The versions this client accepts
        expected: Vec<String>,
        /// The version the server selected
        got: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for campushub operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
