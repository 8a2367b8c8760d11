//! Wire events exchanged with browser chat clients
//!
//! Inbound frames deserialize to [`ClientMessage`]; outbound frames are
//! [`ServerEvent`] values tagged by an `"event"` discriminator. The event
//! names (`ReceiveMessage`, `ReceiveStreamChunk`, `ReceiveStreamComplete`)
//! are part of the client contract and must not change.

use serde::{Deserialize, Serialize};

/// The label used for assistant-originated events.
pub const SENDER_AI: &str = "AI";
/// The label used for relay-originated error events.
pub const SENDER_SYSTEM: &str = "System";
/// The label used when echoing the user's own text back.
pub const SENDER_YOU: &str = "You";

/// A chat message sent by a browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Display name chosen by the client.
    pub sender: String,
    /// The message body.
    pub text: String,
}

/// An event pushed to a browser client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    /// A complete chat message.
    ReceiveMessage {
        /// Who the message is from.
        sender: String,
        /// The message body.
        text: String,
    },
    /// One incremental fragment of a streamed reply.
    ReceiveStreamChunk {
        /// Who the fragment is from.
        sender: String,
        /// The fragment text.
        text: String,
    },
    /// Marks the end of a streamed reply, carrying the full text.
    ReceiveStreamComplete {
        /// Who the reply is from.
        sender: String,
        /// The accumulated reply text.
        text: String,
    },
}

impl ServerEvent {
    /// A `ReceiveMessage` event.
    pub fn message(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ReceiveMessage {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// A `ReceiveStreamChunk` event.
    pub fn chunk(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ReceiveStreamChunk {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// A `ReceiveStreamComplete` event.
    pub fn complete(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ReceiveStreamComplete {
            sender: sender.into(),
            text: text.into(),
        }
    }
}
