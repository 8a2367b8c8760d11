//! Base provider trait and common types for campushub
//!
//! This module defines the Provider trait that completion providers must
//! implement, along with common message types and response structures.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json;
use std::pin::Pin;

/// Message structure for conversation
///
/// Represents a message in the conversation with the completion provider.
/// Messages can be from the user, assistant, system, or tool results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: String,
    /// Content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Optional tool calls in the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Optional tool call ID (for tool result messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use campushub::providers::Message;
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new tool result message
    ///
    /// # Arguments
    ///
    /// * `tool_call_id` - The ID of the tool call this result corresponds to
    /// * `content` - The tool execution result content
    ///
    /// # Examples
    ///
    /// ```
    /// use campushub::providers::Message;
    ///
    /// let msg = Message::tool_result("call_123", "{\"count\": 42}");
    /// assert_eq!(msg.role, "tool");
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Creates an assistant message with tool calls
    ///
    /// # Examples
    ///
    /// ```
    /// use campushub::providers::{Message, ToolCall, FunctionCall};
    ///
    /// let tool_call = ToolCall {
    ///     id: "call_123".to_string(),
    ///     function: FunctionCall {
    ///         name: "get_student_count".to_string(),
    ///         arguments: "{}".to_string(),
    ///     },
    /// };
    /// let msg = Message::assistant_with_tools(vec![tool_call]);
    /// assert_eq!(msg.role, "assistant");
    /// assert!(msg.tool_calls.is_some());
    /// ```
    pub fn assistant_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }
}

/// Function call information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function/tool to call
    pub name: String,
    /// Arguments for the function (as JSON string)
    pub arguments: String,
}

/// Tool call structure
///
/// Represents a request from the model to execute a tool with specific arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Function call details
    pub function: FunctionCall,
}

/// Token usage information from a completion
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use campushub::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        let total_tokens = prompt_tokens + completion_tokens;
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// Completion response with message and optional token usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The response message from the model
    pub message: Message,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a new CompletionResponse
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Create a new CompletionResponse with token usage
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }
}

/// An incremental piece of a streaming completion
///
/// A chunk carries either a text delta, a batch of tool calls the model
/// decided to make, or just the terminal `done` marker.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// Incremental text content, if any
    pub delta: Option<String>,
    /// Tool calls the model requested, if any
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Whether this is the final chunk of the response
    pub done: bool,
}

/// A pinned, boxed stream of completion chunks
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Provider trait for completion providers
///
/// The trait provides a common interface for completing conversations
/// with tool support, in both batch and streaming modes.
///
/// # Examples
///
/// ```no_run
/// use campushub::providers::{Provider, Message, CompletionResponse, CompletionStream};
/// use campushub::error::Result;
/// use async_trait::async_trait;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl Provider for MyProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         tools: &[serde_json::Value],
///     ) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::new(Message::assistant("Response")))
///     }
///
///     async fn complete_stream(
///         &self,
///         _messages: &[Message],
///         _tools: &[serde_json::Value],
///     ) -> Result<CompletionStream> {
///         Ok(Box::pin(futures::stream::empty()))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation with the given messages and available tools
    ///
    /// # Arguments
    ///
    /// * `messages` - Conversation history
    /// * `tools` - Available tools for the model to use (as JSON schemas)
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or response is invalid
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse>;

    /// Completes a conversation, streaming the response incrementally
    ///
    /// The returned stream yields text deltas as they arrive; a chunk with
    /// `done = true` terminates the response. Tool calls, when the model
    /// makes them, arrive on a chunk before the terminal one.
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails before the stream is established
    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionStream>;
}

/// Validates message sequence and removes orphan tool messages
///
/// Orphan tool messages are those that don't have a corresponding preceding
/// assistant message with matching tool_calls. Leaving them in place triggers
/// 400-style rejections from provider APIs.
///
/// # Examples
///
/// ```
/// use campushub::providers::{Message, validate_message_sequence};
///
/// let messages = vec![
///     Message::user("Do something"),
///     Message::tool_result("call_123", "Result"),
/// ];
/// let validated = validate_message_sequence(&messages);
/// assert_eq!(validated.len(), 1); // Orphan tool removed, only user remains
/// ```
pub fn validate_message_sequence(messages: &[Message]) -> Vec<Message> {
    use std::collections::HashSet;

    // First pass: collect all tool_call IDs from assistant messages with tool_calls
    let mut valid_tool_ids: HashSet<String> = HashSet::new();
    for message in messages {
        if message.role == "assistant" {
            if let Some(tool_calls) = &message.tool_calls {
                for tool_call in tool_calls {
                    valid_tool_ids.insert(tool_call.id.clone());
                }
            }
        }
    }

    // Second pass: filter out orphan tool messages
    messages
        .iter()
        .filter_map(|message| {
            if message.role == "tool" {
                if let Some(tool_call_id) = &message.tool_call_id {
                    if !valid_tool_ids.contains(tool_call_id) {
                        tracing::warn!(
                            "Dropping orphan tool message with tool_call_id: {}",
                            tool_call_id
                        );
                        return None;
                    }
                } else {
                    tracing::warn!("Dropping tool message without tool_call_id");
                    return None;
                }
            }

            Some(message.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, Some("Hello".to_string()));
        assert!(msg.tool_calls.is_none());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn test_message_assistant() {
        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, "assistant");
        assert_eq!(msg.content, Some("Hi there".to_string()));
    }

    #[test]
    fn test_message_system() {
        let msg = Message::system("System prompt");
        assert_eq!(msg.role, "system");
        assert_eq!(msg.content, Some("System prompt".to_string()));
    }

    #[test]
    fn test_message_tool_result() {
        let msg = Message::tool_result("call_123", "result");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.content, Some("result".to_string()));
        assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_message_assistant_with_tools() {
        let tool_call = ToolCall {
            id: "call_123".to_string(),
            function: FunctionCall {
                name: "get_students".to_string(),
                arguments: "{}".to_string(),
            },
        };
        let msg = Message::assistant_with_tools(vec![tool_call]);
        assert_eq!(msg.role, "assistant");
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::user("Test");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Test\""));
        // None fields are skipped entirely
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn test_tool_call_serialization() {
        let tool_call = ToolCall {
            id: "call_123".to_string(),
            function: FunctionCall {
                name: "get_student_by_id".to_string(),
                arguments: r#"{"id":7}"#.to_string(),
            },
        };
        let json = serde_json::to_string(&tool_call).unwrap();
        assert!(json.contains("\"id\":\"call_123\""));
        assert!(json.contains("\"name\":\"get_student_by_id\""));
        assert!(json.contains("\"arguments\""));
    }

    #[test]
    fn test_token_usage_new() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_completion_response_new() {
        let response = CompletionResponse::new(Message::assistant("Hello!"));
        assert_eq!(response.message.role, "assistant");
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_completion_response_with_usage() {
        let usage = TokenUsage::new(100, 50);
        let response = CompletionResponse::with_usage(Message::assistant("Hello!"), usage);
        assert!(response.usage.is_some());
        assert_eq!(response.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_stream_chunk_default() {
        let chunk = StreamChunk::default();
        assert!(chunk.delta.is_none());
        assert!(chunk.tool_calls.is_none());
        assert!(!chunk.done);
    }

    #[test]
    fn test_validate_message_sequence_drops_orphan_tool() {
        let messages = vec![
            Message::user("Do something"),
            Message::tool_result("call_123", "Result"),
        ];

        let validated = validate_message_sequence(&messages);

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].role, "user");
    }

    #[test]
    fn test_validate_message_sequence_preserves_valid_pair() {
        let tool_call = ToolCall {
            id: "call_123".to_string(),
            function: FunctionCall {
                name: "get_students".to_string(),
                arguments: "{}".to_string(),
            },
        };

        let messages = vec![
            Message::user("Do something"),
            Message::assistant_with_tools(vec![tool_call]),
            Message::tool_result("call_123", "Result"),
        ];

        let validated = validate_message_sequence(&messages);

        assert_eq!(validated.len(), 3);
        assert_eq!(validated[2].role, "tool");
        assert_eq!(validated[2].tool_call_id, Some("call_123".to_string()));
    }

    #[test]
    fn test_validate_message_sequence_allows_user_and_system() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("Question"),
            Message::assistant("Answer"),
        ];

        let validated = validate_message_sequence(&messages);
        assert_eq!(validated.len(), 3);
    }

    #[test]
    fn test_validate_message_sequence_drops_tool_without_id() {
        let messages = vec![
            Message::user("Do something"),
            Message {
                role: "tool".to_string(),
                content: Some("Result".to_string()),
                tool_calls: None,
                tool_call_id: None,
            },
        ];

        let validated = validate_message_sequence(&messages);
        assert_eq!(validated.len(), 1);
    }
}
