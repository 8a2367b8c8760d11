//! Websocket routes for the chat hub
//!
//! Exposes three routes:
//!
//! - `GET /` -- liveness text
//! - `GET /chat` -- batch websocket: one `ReceiveMessage` per inbound message
//! - `GET /chat/stream` -- streaming websocket: chunk events, a completion
//!   event, and a "You" echo per inbound message
//!
//! Each websocket frame is a JSON-encoded [`ClientMessage`]; each outbound
//! frame is a JSON-encoded [`ServerEvent`]. Malformed frames are logged and
//! answered with a `System` error event; the connection stays open.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::hub::events::{ClientMessage, ServerEvent, SENDER_SYSTEM};
use crate::hub::relay::ChatRelay;

/// Shared state for the hub routes.
pub struct HubState {
    /// The relay every connection dispatches into.
    pub relay: ChatRelay,
}

/// Whether a connection streams its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatMode {
    Batch,
    Streaming,
}

/// Build the hub router.
pub fn router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/chat", get(chat_handler))
        .route("/chat/stream", get(chat_stream_handler))
        .with_state(state)
}

async fn liveness() -> &'static str {
    "campushub is running"
}

async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HubState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, ChatMode::Batch))
}

async fn chat_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HubState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, ChatMode::Streaming))
}

async fn handle_socket(socket: WebSocket, state: Arc<HubState>, mode: ChatMode) {
    tracing::info!(?mode, "websocket client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<ServerEvent>(32);

    // Forward relay events to the client as JSON text frames.
    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to serialize server event: {e}");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!("websocket read error: {e}");
                break;
            }
        };

        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            // Pings and pongs are handled by axum; ignore binary frames.
            _ => continue,
        };

        let message: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("malformed client frame: {e}");
                let _ = events_tx
                    .send(ServerEvent::message(
                        SENDER_SYSTEM,
                        format!("Error: malformed message: {e}"),
                    ))
                    .await;
                continue;
            }
        };

        tracing::info!(sender = %message.sender, "chat message received");
        match mode {
            ChatMode::Batch => state.relay.handle_message(&message.text, &events_tx).await,
            ChatMode::Streaming => {
                state
                    .relay
                    .handle_message_streaming(&message.text, &events_tx)
                    .await
            }
        }
    }

    drop(events_tx);
    let _ = writer.await;
    tracing::info!("websocket client disconnected");
}
