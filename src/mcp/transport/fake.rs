//! Channel-backed in-process transport for client tests
//!
//! [`FakeTransport::new`] returns the transport together with a [`FakePeer`].
//! The transport side is handed to [`crate::mcp::client::connect_transport`];
//! the peer side lets the test read framed outbound messages (`sent_rx`) and
//! answer them (`reply`). No process is spawned and nothing touches the
//! network.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::mcp::transport::Transport;

/// In-process [`Transport`] backed by a pair of unbounded channels.
#[derive(Debug)]
pub struct FakeTransport {
    sent_tx: mpsc::UnboundedSender<String>,
    reply_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

/// Test-side counterpart of a [`FakeTransport`]: acts as the remote peer.
#[derive(Debug)]
pub struct FakePeer {
    /// Messages the client sent, in send order.
    pub sent_rx: mpsc::UnboundedReceiver<String>,
    /// Raw-string channel into the client's [`Transport::receive`] stream.
    pub reply_tx: mpsc::UnboundedSender<String>,
}

impl FakeTransport {
    /// Create a connected `(FakeTransport, FakePeer)` pair.
    pub fn new() -> (Self, FakePeer) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let transport = Self {
            sent_tx,
            reply_rx: Arc::new(Mutex::new(reply_rx)),
        };
        let peer = FakePeer { sent_rx, reply_tx };

        (transport, peer)
    }
}

impl FakePeer {
    /// Serialize `value` and deliver it to the client's receive stream.
    ///
    /// # Panics
    ///
    /// Panics if the transport side has been dropped.
    pub fn reply(&self, value: serde_json::Value) {
        self.reply_tx
            .send(value.to_string())
            .expect("fake transport dropped before reply");
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        self.sent_tx.send(message).map_err(|_| {
            anyhow::anyhow!(crate::error::CampushubError::McpTransport(
                "fake transport peer dropped".to_string()
            ))
        })
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        let rx = Arc::clone(&self.reply_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let item = rx.lock().await.recv().await?;
            Some((item, rx))
        }))
    }

    /// The fake has no stderr; the diagnostic stream is always empty.
    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        Box::pin(futures::stream::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_send_is_observable_on_the_peer() {
        let (transport, mut peer) = FakeTransport::new();

        transport
            .send(r#"{"jsonrpc":"2.0","method":"ping"}"#.to_string())
            .await
            .unwrap();

        assert_eq!(
            peer.sent_rx.recv().await.unwrap(),
            r#"{"jsonrpc":"2.0","method":"ping"}"#
        );
    }

    #[tokio::test]
    async fn test_reply_appears_on_the_receive_stream() {
        let (transport, peer) = FakeTransport::new();

        peer.reply(serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": {} }));

        let msg = transport.receive().next().await.expect("stream ended");
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["id"], 1);
    }

    #[tokio::test]
    async fn test_send_fails_once_the_peer_is_dropped() {
        let (transport, peer) = FakeTransport::new();
        drop(peer);

        assert!(transport.send("test".to_string()).await.is_err());
    }
}
