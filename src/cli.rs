//! Command-line interface definition for campushub
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the `hub` and `directory` subcommands.

use clap::{Parser, Subcommand};

/// campushub - chat relay with a student directory tool sidecar
///
/// Run the browser-facing websocket hub, or the student directory MCP
/// server it talks to over stdio.
#[derive(Parser, Debug, Clone)]
#[command(name = "campushub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for campushub
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the websocket chat hub
    Hub {
        /// Override the listen address from config (e.g. 0.0.0.0:8080)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run the student directory MCP server on stdio
    Directory,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Hub { listen: None },
        }
    }
}
