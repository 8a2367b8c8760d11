//! `hub` command handler
//!
//! Boots the websocket chat hub: creates the completion provider, spawns the
//! directory sidecar over stdio, performs the MCP handshake, and serves the
//! axum router until the process is stopped.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::hub::{ChatRelay, HubState, McpToolSource};
use crate::mcp::client::connect_transport;
use crate::mcp::protocol::McpProtocol;
use crate::mcp::transport::stdio::StdioTransport;
use crate::mcp::transport::Transport;
use crate::mcp::types::{ClientCapabilities, Implementation};
use crate::providers::OllamaProvider;

/// Run the chat hub until terminated.
///
/// # Arguments
///
/// * `config` - Validated application configuration.
/// * `listen_override` - Optional listen address from the CLI, taking
///   precedence over `hub.listen_addr`.
///
/// # Errors
///
/// Returns an error if the provider cannot be created, the directory
/// sidecar fails to spawn or complete the MCP handshake, or the listen
/// address cannot be bound.
pub async fn run_hub(config: Config, listen_override: Option<String>) -> Result<()> {
    let listen_addr = listen_override.unwrap_or_else(|| config.hub.listen_addr.clone());

    let provider = Arc::new(OllamaProvider::new(config.provider.ollama.clone())?);

    // The sidecar inherits our environment plus the launch overrides, with
    // the directory API URL passed down so both processes agree on it.
    let mut env = config.mcp.env.clone();
    env.entry("CAMPUSHUB_DIRECTORY_API_URL".to_string())
        .or_insert_with(|| config.directory.api_url.clone());

    // The default launch command re-executes this binary with the
    // `directory` subcommand; resolve it to the running executable so the
    // hub works without being on PATH.
    let executable = if config.mcp.command == "campushub" {
        std::env::current_exe().unwrap_or_else(|_| PathBuf::from(&config.mcp.command))
    } else {
        PathBuf::from(&config.mcp.command)
    };

    tracing::info!(
        command = %executable.display(),
        args = ?config.mcp.args,
        "spawning directory sidecar"
    );
    let transport = Arc::new(StdioTransport::spawn(
        executable,
        config.mcp.args.clone(),
        env,
        None,
    )?);

    let cancellation = CancellationToken::new();
    let client = connect_transport(
        Arc::clone(&transport) as Arc<dyn Transport>,
        cancellation.clone(),
    );

    let session = McpProtocol::new(client.clone_shared())
        .initialize(
            Implementation {
                name: "campushub".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            ClientCapabilities::default(),
        )
        .await?;
    tracing::info!(
        server = %session.initialize_response.server_info.name,
        version = %session.initialize_response.server_info.version,
        "directory sidecar connected"
    );

    let relay = ChatRelay::new(
        provider,
        Arc::new(McpToolSource::new(session)),
        config.hub.system_prompt.clone(),
        config.hub.max_tool_rounds,
    );
    let app = crate::hub::router(Arc::new(HubState { relay }));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(%listen_addr, "chat hub listening");
    axum::serve(listener, app).await?;

    cancellation.cancel();
    Ok(())
}
