//! campushub - chat relay with a student directory tool sidecar
//!
#![doc = "Main entry point for the campushub binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campushub::cli::{Cli, Commands};
use campushub::commands;
use campushub::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load and validate configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path)?;
    config.validate()?;

    // Initialize tracing. The directory subcommand reserves stdout for
    // JSON-RPC, so its console output goes to stderr plus a daily-rolling
    // file; the guard must live for the life of the process.
    let _guard = match &cli.command {
        Commands::Directory => Some(init_directory_tracing(&cli, &config)),
        Commands::Hub { .. } => {
            init_hub_tracing(&cli);
            None
        }
    };

    // Execute command
    match cli.command {
        Commands::Hub { listen } => {
            tracing::info!("Starting chat hub");
            commands::hub::run_hub(config, listen).await?;
            Ok(())
        }
        Commands::Directory => {
            tracing::info!("Starting directory MCP server");
            commands::directory::run_directory(config).await?;
            Ok(())
        }
    }
}

/// Build the environment filter, honoring `--verbose` and `RUST_LOG`.
fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("campushub=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("campushub=info"))
    }
}

/// Initialize tracing subscriber for the hub (stdout is fine here).
fn init_hub_tracing(cli: &Cli) {
    tracing_subscriber::registry()
        .with(env_filter(cli.verbose))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize tracing for the directory server: stderr console output plus
/// a daily-rolling file in `directory.log_dir`. Stdout stays untouched.
fn init_directory_tracing(cli: &Cli, config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender =
        tracing_appender::rolling::daily(&config.directory.log_dir, "campushub-directory.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(cli.verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    guard
}
