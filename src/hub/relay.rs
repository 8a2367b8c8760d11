//! Chat relay between browser clients and the completion provider
//!
//! [`ChatRelay`] turns one inbound chat message into a prompt, runs the
//! function-invocation loop against the provider, and emits [`ServerEvent`]s
//! on a channel. Tool invocation failures degrade to an error payload fed
//! back to the model; provider failures produce exactly one `System` error
//! event and never terminate the connection.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::hub::events::{ServerEvent, SENDER_AI, SENDER_SYSTEM, SENDER_YOU};
use crate::hub::tools::ToolSource;
use crate::providers::{Message, Provider, ToolCall};

/// Placeholder emitted when the model produced no assistant reply at all.
/// An assistant reply with empty content is relayed verbatim.
pub const NO_RESPONSE: &str = "(no response)";

/// Relays chat messages to the completion provider, invoking directory
/// tools on the model's behalf.
pub struct ChatRelay {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolSource>,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl ChatRelay {
    /// Create a relay.
    ///
    /// # Arguments
    ///
    /// * `provider` - The completion provider.
    /// * `tools` - Source of tool descriptors and invocations.
    /// * `system_prompt` - Prepended to every conversation.
    /// * `max_tool_rounds` - Upper bound on completion rounds per message.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolSource>,
        system_prompt: impl Into<String>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt: system_prompt.into(),
            max_tool_rounds,
        }
    }

    /// Handle one message in batch mode.
    ///
    /// Emits a single `ReceiveMessage` from "AI" with the reply (or the
    /// `(no response)` placeholder), or one `ReceiveMessage` from "System"
    /// when the provider fails.
    pub async fn handle_message(&self, text: &str, events: &mpsc::Sender<ServerEvent>) {
        if let Err(e) = self.run_batch(text, events).await {
            tracing::error!("chat relay failed: {e}");
            let _ = events
                .send(ServerEvent::message(SENDER_SYSTEM, format!("Error: {e}")))
                .await;
        }
    }

    /// Handle one message in streaming mode.
    ///
    /// Every non-empty delta is emitted immediately as `ReceiveStreamChunk`
    /// from "AI"; when the final round completes a `ReceiveStreamComplete`
    /// carries the accumulated text, followed by a `ReceiveMessage` from
    /// "You" echoing the original input.
    pub async fn handle_message_streaming(&self, text: &str, events: &mpsc::Sender<ServerEvent>) {
        if let Err(e) = self.run_streaming(text, events).await {
            tracing::error!("streaming chat relay failed: {e}");
            let _ = events
                .send(ServerEvent::message(SENDER_SYSTEM, format!("Error: {e}")))
                .await;
        }
    }

    async fn run_batch(&self, text: &str, events: &mpsc::Sender<ServerEvent>) -> Result<()> {
        let tools = self.tool_schemas().await;
        let mut messages = vec![
            Message::system(&self.system_prompt),
            Message::user(text),
        ];

        let mut reply: Option<String> = None;

        for round in 0..self.max_tool_rounds {
            let response = self.provider.complete(&messages, &tools).await?;
            let assistant = response.message;

            match assistant.tool_calls.clone() {
                Some(calls) if !calls.is_empty() => {
                    tracing::debug!(round, count = calls.len(), "model requested tool calls");
                    messages.push(assistant);
                    for call in &calls {
                        let output = self.invoke_tool(call).await;
                        messages.push(Message::tool_result(&call.id, output));
                    }
                }
                _ => {
                    reply = assistant.content;
                    break;
                }
            }
        }

        let reply = reply.unwrap_or_else(|| NO_RESPONSE.to_string());
        let _ = events.send(ServerEvent::message(SENDER_AI, reply)).await;
        Ok(())
    }

    async fn run_streaming(&self, text: &str, events: &mpsc::Sender<ServerEvent>) -> Result<()> {
        let tools = self.tool_schemas().await;
        let mut messages = vec![
            Message::system(&self.system_prompt),
            Message::user(text),
        ];

        let mut accumulated = String::new();

        for round in 0..self.max_tool_rounds {
            let mut stream = self.provider.complete_stream(&messages, &tools).await?;
            let mut round_calls: Vec<ToolCall> = Vec::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if let Some(delta) = chunk.delta {
                    if !delta.is_empty() {
                        accumulated.push_str(&delta);
                        let _ = events.send(ServerEvent::chunk(SENDER_AI, delta)).await;
                    }
                }
                if let Some(calls) = chunk.tool_calls {
                    round_calls.extend(calls);
                }
            }

            if round_calls.is_empty() {
                break;
            }

            tracing::debug!(round, count = round_calls.len(), "model requested tool calls");
            messages.push(Message::assistant_with_tools(round_calls.clone()));
            for call in &round_calls {
                let output = self.invoke_tool(call).await;
                messages.push(Message::tool_result(&call.id, output));
            }
        }

        let _ = events
            .send(ServerEvent::complete(SENDER_AI, accumulated))
            .await;
        let _ = events.send(ServerEvent::message(SENDER_YOU, text)).await;
        Ok(())
    }

    /// Fetch the current tool descriptors, converted to provider schemas.
    ///
    /// The list is fetched before every request so the relay always sees the
    /// sidecar's latest contract. A failed listing degrades to no tools.
    async fn tool_schemas(&self) -> Vec<serde_json::Value> {
        match self.tools.list_tools().await {
            Ok(tools) => tools
                .into_iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description.unwrap_or_default(),
                        "parameters": t.input_schema,
                    })
                })
                .collect(),
            Err(e) => {
                tracing::warn!("failed to list tools, continuing without: {e}");
                Vec::new()
            }
        }
    }

    /// Invoke one tool call, degrading failures to an error payload string.
    async fn invoke_tool(&self, call: &ToolCall) -> String {
        let args: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::json!({}));

        tracing::info!(tool = %call.function.name, "invoking tool");
        match self.tools.call_tool(&call.function.name, args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %call.function.name, "tool invocation failed: {e}");
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}
