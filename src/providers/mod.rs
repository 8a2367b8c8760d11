//! Completion providers for campushub
//!
//! This module contains the Provider trait and its implementations.

pub mod base;
pub mod ollama;

pub use base::{
    validate_message_sequence, CompletionResponse, CompletionStream, FunctionCall, Message,
    Provider, StreamChunk, TokenUsage, ToolCall,
};
pub use ollama::OllamaProvider;
