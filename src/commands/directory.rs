//! `directory` command handler
//!
//! Runs the student directory MCP server on stdio. Stdout is reserved for
//! JSON-RPC, so tracing output from this subcommand goes to stderr and a
//! daily-rolling log file (configured in `main.rs`).

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::directory::{DirectoryServer, DirectoryService};
use crate::error::Result;

/// Run the directory MCP server until stdin closes.
///
/// # Errors
///
/// Returns an error only on stdio I/O failures; lookup and upstream
/// failures are contained per-request.
pub async fn run_directory(config: Config) -> Result<()> {
    let service = Arc::new(DirectoryService::new(
        config.directory.api_url.clone(),
        Duration::from_secs(config.directory.cache_ttl_seconds),
    ));
    tracing::info!(
        api_url = %service.api_url(),
        ttl_seconds = config.directory.cache_ttl_seconds,
        "starting directory MCP server"
    );

    DirectoryServer::new(service).run().await
}
