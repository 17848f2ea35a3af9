//! Push-channel JSON-RPC client
//!
//! Requests go out over an outbound leg (HTTP POST); responses arrive on a
//! separate long-lived push feed and are correlated back to the issuing
//! caller by id. Every dispatched request terminates exactly once: by a
//! correlated response, by its deadline, or by channel close.

use async_trait::async_trait;
use futures_util::StreamExt;
use mb_types::{BridgeError, BridgeResult, JsonRpcMessage, JsonRpcRequest};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound leg of the push channel.
///
/// The production implementation POSTs the envelope to the server's request
/// endpoint; tests substitute a recording implementation.
#[async_trait]
pub trait OutboundLeg: Send + Sync {
    async fn dispatch(&self, request: &JsonRpcRequest) -> BridgeResult<()>;
}

/// Outbound leg that POSTs envelopes over HTTP.
pub struct HttpOutbound {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpOutbound {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> BridgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BridgeError::Connection(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            headers,
        })
    }
}

#[async_trait]
impl OutboundLeg for HttpOutbound {
    async fn dispatch(&self, request: &JsonRpcRequest) -> BridgeResult<()> {
        let mut builder = self.client.post(&self.url).json(request);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::Connection(format!("Failed to dispatch request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::from_status(status.as_u16(), body));
        }
        Ok(())
    }
}

/// One in-flight request.
///
/// Lives in the pending map between dispatch and its single terminator; the
/// map's lock is the arbiter that makes termination exactly-once.
struct PendingRequest {
    method: String,
    tx: oneshot::Sender<BridgeResult<Value>>,
}

/// Push-channel connection to one server.
pub struct RpcChannel {
    /// Server name, for diagnostics
    server: String,

    /// Where request envelopes are dispatched
    outbound: Arc<dyn OutboundLeg>,

    /// URL of the push feed (ws:// or wss://)
    feed_url: String,

    /// Pending requests awaiting correlated responses, keyed by request id
    pending: Arc<RwLock<HashMap<u64, PendingRequest>>>,

    /// Next correlation id; never reused while an id is still pending
    next_id: AtomicU64,

    /// Whether the channel is closed
    closed: Arc<RwLock<bool>>,

    /// Background feed reader
    feed_task: RwLock<Option<JoinHandle<()>>>,
}

impl RpcChannel {
    /// Create a channel. No connection is made until `open`.
    pub fn new(
        server: impl Into<String>,
        outbound: Arc<dyn OutboundLeg>,
        feed_url: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            outbound,
            feed_url: feed_url.into(),
            pending: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            closed: Arc::new(RwLock::new(false)),
            feed_task: RwLock::new(None),
        }
    }

    /// Open the push feed. Idempotent: a no-op success while already open.
    ///
    /// A terminal feed error later closes the channel and fails every pending
    /// request with a connection error.
    pub async fn open(self: &Arc<Self>) -> BridgeResult<()> {
        if self.is_open() {
            return Ok(());
        }

        tracing::info!(server = %self.server, url = %self.feed_url, "Opening push feed");

        let (ws_stream, _) = connect_async(&self.feed_url).await.map_err(|e| {
            BridgeError::Connection(format!("Failed to open push feed: {e}"))
        })?;

        *self.closed.write() = false;

        let (_, mut read) = ws_stream.split();
        let channel = Arc::clone(self);

        let task = tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => channel.handle_frame(&text),
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(server = %channel.server, "Push feed closed by server");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ignore ping/pong/binary frames
                    }
                    Some(Err(e)) => {
                        tracing::error!(server = %channel.server, "Push feed error: {e}");
                        break;
                    }
                    None => {
                        tracing::info!(server = %channel.server, "Push feed ended");
                        break;
                    }
                }
            }

            // Terminal feed event: the channel closes itself and every
            // pending request fails with a connection error.
            *channel.closed.write() = true;
            channel.fail_all(|method| {
                BridgeError::Connection(format!("Connection lost while awaiting '{method}'"))
            });
        });

        *self.feed_task.write() = Some(task);

        tracing::info!(server = %self.server, "Push channel open");
        Ok(())
    }

    /// Whether the channel is open and its feed task is running.
    pub fn is_open(&self) -> bool {
        !*self.closed.read() && self.feed_task.read().is_some()
    }

    /// Send a request with the default deadline.
    pub async fn send(&self, method: &str, params: Option<Value>) -> BridgeResult<Value> {
        self.send_with_timeout(method, params, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    /// Send a request and await its correlated response.
    ///
    /// Allocates a fresh correlation id, registers the pending entry, and
    /// dispatches the envelope on the outbound leg. The administrative
    /// `initialize` and `shutdown` methods resolve immediately on successful
    /// dispatch; the remote side is not obligated to answer them over the
    /// push feed.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        if *self.closed.read() {
            return Err(BridgeError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::with_id(id, method, params);

        if matches!(method, "initialize" | "shutdown") {
            self.outbound.dispatch(&request).await?;
            return Ok(Value::Null);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.write().insert(
            id,
            PendingRequest {
                method: method.to_string(),
                tx,
            },
        );

        if let Err(e) = self.outbound.dispatch(&request).await {
            self.pending.write().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(verdict)) => verdict,
            // Sender dropped without a verdict; only close paths do that.
            Ok(Err(_)) => Err(BridgeError::Closed),
            Err(_) => {
                // Deadline fired first; removing the entry here is what
                // disarms a response that might arrive later.
                self.pending.write().remove(&id);
                tracing::warn!(server = %self.server, method, id, "Request timed out");
                Err(BridgeError::Timeout {
                    method: method.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Process one inbound feed payload.
    ///
    /// Responses with a matching pending id resolve or reject the original
    /// caller; unmatched ids and malformed payloads are logged and dropped so
    /// one bad message cannot take the channel down.
    pub fn handle_frame(&self, payload: &str) {
        match serde_json::from_str::<JsonRpcMessage>(payload) {
            Ok(JsonRpcMessage::Response(response)) => {
                let Some(id) = response.id.as_u64() else {
                    tracing::warn!(server = %self.server, "Dropping response with non-numeric id: {}", response.id);
                    return;
                };

                let Some(entry) = self.pending.write().remove(&id) else {
                    tracing::warn!(server = %self.server, id, "Dropping response for unknown request id");
                    return;
                };

                let verdict = match response.error {
                    Some(err) => Err(BridgeError::Protocol {
                        code: err.code,
                        message: err.message,
                    }),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };

                if entry.tx.send(verdict).is_err() {
                    // Caller already gone; its deadline fired first.
                    tracing::debug!(server = %self.server, id, method = %entry.method, "Response arrived after caller gave up");
                }
            }
            Ok(JsonRpcMessage::Notification(notification)) => {
                tracing::debug!(server = %self.server, method = %notification.method, "Push notification");
            }
            Ok(JsonRpcMessage::Request(_)) => {
                tracing::warn!(server = %self.server, "Dropping unexpected request from server");
            }
            Err(e) => {
                tracing::warn!(server = %self.server, "Dropping malformed push message: {e}");
            }
        }
    }

    /// Close the channel.
    ///
    /// Rejects every still-pending request with `Closed` and releases the
    /// feed subscription. Safe to call repeatedly and from error paths; the
    /// rejection happens synchronously, no pending request survives.
    pub fn close(&self) {
        let already_closed = {
            let mut closed = self.closed.write();
            std::mem::replace(&mut *closed, true)
        };

        if let Some(task) = self.feed_task.write().take() {
            task.abort();
        }

        self.fail_all(|_| BridgeError::Closed);

        if !already_closed {
            tracing::info!(server = %self.server, "Push channel closed");
        }
    }

    /// Drain the pending map, rejecting every entry.
    fn fail_all(&self, error_for: impl Fn(&str) -> BridgeError) {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.write();
            pending.drain().map(|(_, entry)| entry).collect()
        };

        for entry in drained {
            let error = error_for(&entry.method);
            let _ = entry.tx.send(Err(error));
        }
    }

    /// Number of requests still awaiting a terminator.
    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        if let Some(task) = self.feed_task.write().take() {
            task.abort();
        }
    }
}
