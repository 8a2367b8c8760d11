//! Transport-agnostic async JSON-RPC 2.0 client
//!
//! This module provides [`JsonRpcClient`], a channel-backed JSON-RPC 2.0 client
//! that is completely decoupled from the underlying transport. Callers wire up
//! two [`tokio::sync::mpsc`] channels (one for outbound serialized messages, one
//! for inbound serialized messages) and then call [`start_read_loop`] to process
//! responses and notifications concurrently. [`connect_transport`] performs that
//! wiring against any [`Transport`] in one call.
//!
//! # Design
//!
//! - Outbound messages are written to `outbound_tx` as newline-free JSON strings.
//!   The transport layer is responsible for framing (newline-delimited for stdio).
//! - Inbound messages arrive on `inbound_rx` as JSON strings. The read loop
//!   classifies each message as a response or a notification and dispatches
//!   accordingly. The directory server never initiates requests, so there is no
//!   server-request path.
//! - In-flight requests are tracked in a `pending` map keyed by `u64` request ID.
//!   Each entry is a `oneshot::Sender` that receives the `result` or `error` value
//!   when the matching response arrives.
//! - A [`tokio_util::sync::CancellationToken`] stops the read loop cleanly and
//!   drops all pending senders so that awaiting callers receive an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{CampushubError, Result};
use crate::mcp::transport::Transport;
use crate::mcp::types::{JsonRpcError, JsonRpcRequest};

/// Default timeout applied to every request when the caller does not specify one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A notification handler: called with the raw `params` value when a matching
/// server notification arrives.
type NotificationHandler = Box<dyn Fn(serde_json::Value) + Send + Sync + 'static>;

/// The pending-response map type: maps request ID to the oneshot sender.
type PendingMap =
    HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, JsonRpcError>>>;

/// Transport-agnostic async JSON-RPC 2.0 client.
///
/// Create one with [`JsonRpcClient::new`], passing the outbound channel sender.
/// Then call [`start_read_loop`] to process incoming messages. Issue requests
/// with [`JsonRpcClient::request`] and fire-and-forget notifications with
/// [`JsonRpcClient::notify`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use campushub::mcp::client::{JsonRpcClient, start_read_loop};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let (out_tx, _out_rx) = mpsc::unbounded_channel::<String>();
///     let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
///     let token = CancellationToken::new();
///     let client = Arc::new(JsonRpcClient::new(out_tx));
///     let _handle = start_read_loop(in_rx, token, Arc::clone(&client));
///     Ok(())
/// }
/// ```
pub struct JsonRpcClient {
    /// Monotonically increasing request ID counter.
    pub(crate) next_id: Arc<AtomicU64>,
    /// In-flight requests waiting for a response.
    pub(crate) pending: Arc<Mutex<PendingMap>>,
    /// Channel used to send serialized JSON-RPC messages to the transport.
    pub(crate) outbound_tx: mpsc::UnboundedSender<String>,
    /// Registered handlers for server-sent notifications (method -> handler).
    pub(crate) notification_handlers: Arc<Mutex<HashMap<String, NotificationHandler>>>,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a new `JsonRpcClient`.
    ///
    /// The caller is responsible for:
    /// 1. Wiring `outbound_rx` to a transport writer.
    /// 2. Calling [`start_read_loop`] with the corresponding inbound receiver.
    pub fn new(outbound_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound_tx,
            notification_handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a new [`JsonRpcClient`] that shares all internal state with `self`.
    ///
    /// The returned client shares the same `pending` map, `next_id` counter, and
    /// `notification_handlers` as the original. This allows a read loop started
    /// with an `Arc<JsonRpcClient>` to resolve responses issued by a second
    /// client that owns the value, since both clients operate on the same
    /// pending map. This is the canonical pattern for wiring `McpProtocol`
    /// (which takes `JsonRpcClient` by value) with `start_read_loop` (which
    /// takes `Arc<JsonRpcClient>`).
    pub fn clone_shared(&self) -> Self {
        Self {
            next_id: Arc::clone(&self.next_id),
            pending: Arc::clone(&self.pending),
            outbound_tx: self.outbound_tx.clone(),
            notification_handlers: Arc::clone(&self.notification_handlers),
        }
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// Assigns the next monotonic ID, serializes the request, sends it on the
    /// outbound channel, and waits for the matching response with an optional
    /// timeout.
    ///
    /// # Arguments
    ///
    /// * `method` - The JSON-RPC method name.
    /// * `params` - Parameters to serialize into the `params` field.
    /// * `timeout` - Optional timeout; defaults to [`DEFAULT_REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`CampushubError::McpTransport`] if the outbound channel is closed.
    /// Returns [`CampushubError::McpTimeout`] if no response arrives within the timeout.
    /// Returns [`CampushubError::Mcp`] if the server returns an error response.
    /// Returns [`CampushubError::Serialization`] if serialization or deserialization fails.
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register the pending slot before sending so the response can never
        // arrive before we are ready to receive it.
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        // Serialize and send the request.
        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        self.outbound_tx
            .send(message)
            .map_err(|_| CampushubError::McpTransport("outbound channel closed".to_string()))?;

        // Await the response with a timeout.
        let deadline = timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let outcome =
            tokio::time::timeout(deadline, rx)
                .await
                .map_err(|_| CampushubError::McpTimeout {
                    server: "(unknown)".to_string(),
                    method: method.to_string(),
                })?;

        // The oneshot was dropped (read loop exited) before a response arrived.
        let rpc_result = outcome.map_err(|_| {
            CampushubError::McpTransport("read loop exited before response arrived".to_string())
        })?;

        // Promote a JSON-RPC error into a CampushubError.
        let value = rpc_result.map_err(|e| CampushubError::Mcp(e.message))?;

        // Deserialize the result into the caller's expected type.
        serde_json::from_value(value).map_err(|e| CampushubError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// Notifications have no `id` field and the server MUST NOT reply.
    ///
    /// # Errors
    ///
    /// Returns [`CampushubError::McpTransport`] if the outbound channel is closed.
    /// Returns [`CampushubError::Serialization`] if serialization fails.
    pub fn notify<P: serde::Serialize + Send>(&self, method: &str, params: P) -> Result<()> {
        let message = serde_json::to_string(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": serde_json::to_value(params)?
        }))?;

        self.outbound_tx
            .send(message)
            .map_err(|_| CampushubError::McpTransport("outbound channel closed".to_string()))?;

        Ok(())
    }

    /// Register a handler for a server-sent notification.
    ///
    /// When the read loop receives a JSON-RPC message with a matching `method`
    /// and no `id` field, it calls `f` with the raw `params` value
    /// (`serde_json::Value::Null` when absent).
    ///
    /// Registering a second handler for the same method replaces the first.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use campushub::mcp::client::JsonRpcClient;
    /// use campushub::mcp::types::NOTIF_TOOLS_LIST_CHANGED;
    ///
    /// # let rt = tokio::runtime::Runtime::new().unwrap();
    /// # let _guard = rt.enter();
    /// let (tx, _rx) = mpsc::unbounded_channel::<String>();
    /// let client = JsonRpcClient::new(tx);
    /// client.on_notification(NOTIF_TOOLS_LIST_CHANGED, |_params| {
    ///     // refresh tool list
    /// });
    /// ```
    pub fn on_notification(
        &self,
        method: impl Into<String>,
        f: impl Fn(serde_json::Value) + Send + Sync + 'static,
    ) {
        let method = method.into();
        let handlers = Arc::clone(&self.notification_handlers);
        // Registration happens before `start_read_loop` in practice; the spawn
        // keeps this method sync without blocking on the async lock.
        tokio::spawn(async move {
            handlers.lock().await.insert(method, Box::new(f));
        });
    }
}

/// Wire a [`Transport`] to a new [`JsonRpcClient`].
///
/// Creates the outbound/inbound channel pair, starts the read loop, and
/// spawns two pump tasks: one drains the client's outbound channel into
/// [`Transport::send`], the other feeds [`Transport::receive`] into the read
/// loop. The pumps exit when their channel or the transport closes; the read
/// loop exits on `cancellation`.
pub fn connect_transport(
    transport: Arc<dyn Transport>,
    cancellation: CancellationToken,
) -> Arc<JsonRpcClient> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
    let client = Arc::new(JsonRpcClient::new(out_tx));
    start_read_loop(in_rx, cancellation, Arc::clone(&client));

    {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if transport.send(msg).await.is_err() {
                    break;
                }
            }
        });
    }
    tokio::spawn(async move {
        let mut inbound = transport.receive();
        while let Some(msg) = inbound.next().await {
            if in_tx.send(msg).is_err() {
                break;
            }
        }
    });

    client
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// The loop reads serialized JSON strings from `inbound_rx`, classifies each
/// message, and dispatches it:
///
/// - **Response** (has `"id"` and `"result"` or `"error"`): resolves the
///   matching pending [`oneshot`] sender.
/// - **Notification** (has `"method"` but no `"id"`): calls the registered
///   handler, if any. Unknown notifications are silently ignored.
///
/// On cancellation, all pending senders are dropped so that any in-flight
/// `request()` call receives a channel-closed error rather than blocking
/// indefinitely.
///
/// # Returns
///
/// A [`tokio::task::JoinHandle`] for the background task.
pub fn start_read_loop(
    mut inbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
    client: Arc<JsonRpcClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    // Drop all pending senders so that callers receive a
                    // channel-closed error instead of waiting forever.
                    let mut pending = client.pending.lock().await;
                    pending.clear();
                    break;
                }

                maybe_msg = inbound_rx.recv() => {
                    let raw = match maybe_msg {
                        Some(s) => s,
                        None => {
                            // Inbound channel was closed; treat as cancellation.
                            let mut pending = client.pending.lock().await;
                            pending.clear();
                            break;
                        }
                    };

                    dispatch_message(&raw, &client).await;
                }
            }
        }
    })
}

/// Classify and dispatch a single inbound JSON string.
///
/// This is extracted from the loop body to keep `start_read_loop` readable and
/// to allow direct unit testing of the dispatch logic.
async fn dispatch_message(raw: &str, client: &Arc<JsonRpcClient>) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("MCP read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").is_some() && !value["id"].is_null();
    let has_method = value.get("method").is_some();
    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();

    if has_id && (has_result || has_error) && !has_method {
        // --- Response to a client-originated request ---
        handle_response(value, client).await;
    } else if has_method && !has_id {
        // --- Server-sent notification ---
        handle_notification(value, client).await;
    } else {
        tracing::debug!(
            "MCP read loop: received unclassifiable message; ignoring. \
             has_id={has_id} has_method={has_method} has_result={has_result} has_error={has_error}"
        );
    }
}

/// Resolve a pending request sender with the response value or error.
async fn handle_response(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    // Extract the numeric ID.
    let id_val = &value["id"];
    let id: u64 = if let Some(n) = id_val.as_u64() {
        n
    } else if let Some(s) = id_val.as_str() {
        match s.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!("MCP read loop: response has non-integer id: {id_val}");
                return;
            }
        }
    } else {
        tracing::warn!("MCP read loop: response has non-integer id: {id_val}");
        return;
    };

    let tx = {
        let mut pending = client.pending.lock().await;
        pending.remove(&id)
    };

    let Some(tx) = tx else {
        tracing::debug!("MCP read loop: received response for unknown id {id}; ignoring");
        return;
    };

    let outcome: std::result::Result<serde_json::Value, JsonRpcError> =
        if let Some(error_val) = value.get("error") {
            match serde_json::from_value::<JsonRpcError>(error_val.clone()) {
                Ok(e) => Err(e),
                Err(_) => Err(JsonRpcError {
                    code: crate::mcp::types::ERROR_INTERNAL,
                    message: format!("malformed error object: {error_val}"),
                    data: None,
                }),
            }
        } else {
            Ok(value
                .get("result")
                .cloned()
                .unwrap_or(serde_json::Value::Null))
        };

    // Ignore send errors: the caller may have already timed out.
    let _ = tx.send(outcome);
}

/// Call the registered notification handler.
async fn handle_notification(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let method = match value.get("method").and_then(|m| m.as_str()) {
        Some(m) => m.to_string(),
        None => return,
    };
    let params = value
        .get("params")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    let handlers = client.notification_handlers.lock().await;
    if let Some(handler) = handlers.get(&method) {
        handler(params);
    } else {
        tracing::debug!("MCP read loop: no handler for notification '{method}'; ignoring");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
