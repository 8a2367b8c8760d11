/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `hub`       — Run the websocket chat hub
- `directory` — Run the student directory MCP server on stdio

These handlers are intentionally small and use the library components:
providers, the MCP plumbing, the relay, and the directory service.
*/

pub mod directory;
pub mod hub;
