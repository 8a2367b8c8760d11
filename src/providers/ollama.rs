//! Ollama provider implementation for campushub
//!
//! This module implements the Provider trait for Ollama, connecting to a local
//! or remote Ollama server to generate completions with tool calling support
//! in both batch and streaming modes.

use crate::config::OllamaConfig;
use crate::error::{CampushubError, Result};
use crate::providers::{
    CompletionResponse, CompletionStream, FunctionCall, Message, Provider, StreamChunk, TokenUsage,
    ToolCall,
};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama API provider
///
/// Connects to an Ollama server (local or remote) to generate completions
/// against `/api/chat`. Batch requests set `stream: false` and read a single
/// JSON body; streaming requests set `stream: true` and parse the
/// newline-delimited JSON objects Ollama emits.
///
/// # Examples
///
/// ```no_run
/// use campushub::config::OllamaConfig;
/// use campushub::providers::{OllamaProvider, Provider, Message};
///
/// # async fn example() -> campushub::error::Result<()> {
/// let config = OllamaConfig {
///     host: "http://localhost:11434".to_string(),
///     model: "llama3.2:latest".to_string(),
/// };
/// let provider = OllamaProvider::new(config)?;
/// let messages = vec![Message::user("Hello!")];
/// let completion = provider.complete(&messages, &[]).await?;
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

/// Tool definition for Ollama API
#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: String,
    function: OllamaFunction,
}

/// Function definition for Ollama tools
#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Tool call in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: OllamaFunctionCall,
}

/// Function call details in Ollama format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Default type for tool calls (used when field is missing)
fn default_tool_type() -> String {
    "function".to_string()
}

/// Response structure from Ollama API
///
/// Both the single batch body and each streamed NDJSON line use this shape.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("campushub/0.1.0")
            .build()
            .map_err(|e| {
                CampushubError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Convert campushub messages to Ollama format
    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        let validated_messages = crate::providers::validate_message_sequence(messages);
        validated_messages
            .iter()
            .filter_map(|m| {
                // Skip messages without content (unless they have tool calls)
                if m.content.is_none() && m.tool_calls.is_none() {
                    return None;
                }

                let tool_calls = m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| OllamaToolCall {
                            id: tc.id.clone(),
                            r#type: "function".to_string(),
                            function: OllamaFunctionCall {
                                name: tc.function.name.clone(),
                                arguments: serde_json::from_str(&tc.function.arguments)
                                    .unwrap_or(serde_json::Value::Object(serde_json::Map::new())),
                            },
                        })
                        .collect()
                });

                Some(OllamaMessage {
                    role: m.role.clone(),
                    content: m.content.clone().unwrap_or_default(),
                    tool_calls,
                })
            })
            .collect()
    }

    /// Convert tool schemas to Ollama format
    fn convert_tools(&self, tools: &[serde_json::Value]) -> Vec<OllamaTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                let name = obj.get("name")?.as_str()?.to_string();
                let description = obj.get("description")?.as_str()?.to_string();
                let parameters = obj.get("parameters")?.clone();

                Some(OllamaTool {
                    r#type: "function".to_string(),
                    function: OllamaFunction {
                        name,
                        description,
                        parameters,
                    },
                })
            })
            .collect()
    }

    /// Convert Ollama response message back to campushub format
    fn convert_response_message(ollama_msg: OllamaMessage) -> Message {
        if let Some(tool_calls) = ollama_msg.tool_calls {
            let converted_calls = convert_tool_calls(tool_calls);
            Message::assistant_with_tools(converted_calls)
        } else {
            Message::assistant(ollama_msg.content)
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
        stream: bool,
    ) -> OllamaRequest {
        OllamaRequest {
            model: self.config.model.clone(),
            messages: self.convert_messages(messages),
            tools: self.convert_tools(tools),
            stream,
        }
    }
}

/// Convert Ollama tool calls to campushub format, synthesizing IDs when absent
fn convert_tool_calls(tool_calls: Vec<OllamaToolCall>) -> Vec<ToolCall> {
    tool_calls
        .into_iter()
        .enumerate()
        .map(|(idx, tc)| ToolCall {
            id: if tc.id.is_empty() {
                format!(
                    "call_{}_{}",
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis(),
                    idx
                )
            } else {
                tc.id
            },
            function: FunctionCall {
                name: tc.function.name,
                arguments: serde_json::to_string(&tc.function.arguments)
                    .unwrap_or_else(|_| "{}".to_string()),
            },
        })
        .collect()
}

/// Convert a parsed NDJSON line into a stream chunk
fn chunk_from_response(response: OllamaResponse) -> StreamChunk {
    let delta = if response.message.content.is_empty() {
        None
    } else {
        Some(response.message.content)
    };
    let tool_calls = response
        .message
        .tool_calls
        .map(convert_tool_calls)
        .filter(|calls| !calls.is_empty());

    StreamChunk {
        delta,
        tool_calls,
        done: response.done,
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let url = format!("{}/api/chat", self.config.host);
        let ollama_request = self.build_request(messages, tools, false);

        tracing::debug!(
            "Sending Ollama request: {} messages, {} tools",
            ollama_request.messages.len(),
            ollama_request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                CampushubError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(CampushubError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            CampushubError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let usage = if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0 {
            Some(TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            ))
        } else {
            None
        };

        let message = Self::convert_response_message(ollama_response.message);

        Ok(CompletionResponse {
            message,
            usage,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionStream> {
        let url = format!("{}/api/chat", self.config.host);
        let ollama_request = self.build_request(messages, tools, true);

        tracing::debug!(
            "Sending streaming Ollama request: {} messages, {} tools",
            ollama_request.messages.len(),
            ollama_request.tools.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama streaming request failed: {}", e);
                CampushubError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(CampushubError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        // Ollama streams one JSON object per line. Bytes arrive in arbitrary
        // chunks, so carry the trailing partial line over between reads.
        let stream = async_stream_chunks(response.bytes_stream());
        Ok(Box::pin(stream))
    }
}

/// Parse an NDJSON byte stream into completion chunks
fn async_stream_chunks<S>(bytes: S) -> impl Stream<Item = Result<StreamChunk>> + Send
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    use futures::stream;

    let buffer = BytesMut::with_capacity(8 * 1024);

    stream::unfold(
        (bytes, buffer, false),
        |(mut bytes, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // Emit any complete line already buffered
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line = buffer.split_to(pos + 1);
                    let text = String::from_utf8_lossy(&line[..pos]);
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<OllamaResponse>(trimmed) {
                        Ok(response) => {
                            let done = response.done;
                            let chunk = chunk_from_response(response);
                            return Some((Ok(chunk), (bytes, buffer, done)));
                        }
                        Err(e) => {
                            tracing::error!("Failed to parse Ollama stream line: {}", e);
                            let err = CampushubError::Provider(format!(
                                "Failed to parse Ollama stream line: {}",
                                e
                            ));
                            return Some((Err(err.into()), (bytes, buffer, true)));
                        }
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        tracing::error!("Ollama stream read failed: {}", e);
                        let err =
                            CampushubError::Provider(format!("Ollama stream read failed: {}", e));
                        return Some((Err(err.into()), (bytes, buffer, true)));
                    }
                    None => return None,
                }
            }
        },
    )
}
