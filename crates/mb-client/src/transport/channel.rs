//! Push-channel transport

use crate::channel::RpcChannel;
use crate::transport::ServerTransport;
use async_trait::async_trait;
use mb_types::{BridgeError, BridgeResult, ToolDescriptor};
use serde_json::{json, Value};
use std::sync::Arc;

/// Transport backed by an `RpcChannel`.
pub struct ChannelTransport {
    channel: Arc<RpcChannel>,
}

impl ChannelTransport {
    pub fn new(channel: Arc<RpcChannel>) -> Self {
        Self { channel }
    }

    /// The underlying channel, for callers that need its lifecycle directly.
    pub fn channel(&self) -> &Arc<RpcChannel> {
        &self.channel
    }
}

#[async_trait]
impl ServerTransport for ChannelTransport {
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        let value = self.channel.send("tools/list", None).await?;
        let tools = value
            .get("tools")
            .cloned()
            .ok_or_else(|| BridgeError::Connection("tools/list result missing 'tools'".to_string()))?;
        serde_json::from_value(tools).map_err(BridgeError::from)
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> BridgeResult<Value> {
        self.channel
            .send("tools/call", Some(json!({ "name": tool, "arguments": arguments })))
            .await
    }

    async fn close(&self) -> BridgeResult<()> {
        // Graceful teardown is best-effort; the local close is what
        // guarantees no pending request survives.
        let farewell = self.channel.send("shutdown", None).await;
        self.channel.close();
        farewell.map(|_| ())
    }
}
