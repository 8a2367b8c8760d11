//! MCP (Model Context Protocol) support for campushub
//!
//! This module provides the MCP plumbing shared by both sides of the hub:
//! the hub process acts as an MCP *client* of its directory sidecar, and the
//! `directory` subcommand implements the matching stdio *server*.
//!
//! The implementation targets protocol revision **2025-03-26** with
//! **2024-11-05** as a backwards-compatibility fallback.
//!
//! # Module Layout
//!
//! - `types`     -- MCP protocol types and JSON-RPC primitives
//! - `client`    -- Transport-agnostic async JSON-RPC 2.0 client
//! - `protocol`  -- Typed MCP lifecycle wrapper over `JsonRpcClient`
//! - `transport` -- `Transport` trait and concrete implementations (stdio,
//!   fake)

pub mod client;
pub mod protocol;
pub mod transport;
pub mod types;

pub use types::*;
