//! campushub - chat relay with a student directory tool sidecar
//!
//! This library provides the components behind the `campushub` binary: a
//! browser-facing websocket chat hub that relays messages to an Ollama
//! completion provider with tool calling, and a student directory cache
//! service exposed to the hub as an MCP tool server over stdio.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `hub`: websocket routes, wire events, and the completion/tool relay
//! - `directory`: the cached student directory and its MCP server surface
//! - `providers`: completion provider abstraction and the Ollama implementation
//! - `mcp`: JSON-RPC client, MCP lifecycle, and transports
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use campushub::config::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml")?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod directory;
pub mod error;
pub mod hub;
pub mod mcp;
pub mod providers;

pub use config::Config;
pub use error::{CampushubError, Result};
