//! Request/response transport through the companion plugin

use crate::gateway::HttpGateway;
use crate::transport::ServerTransport;
use async_trait::async_trait;
use mb_types::{BridgeResult, ToolDescriptor};
use serde_json::Value;
use std::sync::Arc;

/// Companion-proxied transport: one HTTP round trip per operation.
pub struct HttpTransport {
    gateway: Arc<HttpGateway>,
    server: String,
}

impl HttpTransport {
    pub fn new(gateway: Arc<HttpGateway>, server: impl Into<String>) -> Self {
        Self {
            gateway,
            server: server.into(),
        }
    }
}

#[async_trait]
impl ServerTransport for HttpTransport {
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        self.gateway.list_tools(&self.server).await
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> BridgeResult<Value> {
        self.gateway.call_tool(&self.server, tool, arguments).await
    }

    async fn close(&self) -> BridgeResult<()> {
        self.gateway.stop_server(&self.server).await
    }
}
