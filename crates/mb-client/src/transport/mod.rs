//! Transport layer
//!
//! Two families: request/response per call through the companion plugin's
//! HTTP surface (process-stdio and streaming-http servers), and the push
//! channel (outbound HTTP leg, responses over the long-lived feed).

mod channel;
mod http;

pub use channel::ChannelTransport;
pub use http::HttpTransport;

use crate::channel::{HttpOutbound, RpcChannel};
use crate::gateway::HttpGateway;
use async_trait::async_trait;
use mb_types::{BridgeError, BridgeResult, ServerConfig, ToolDescriptor, TransportConfig, TransportKind};
use serde_json::Value;
use std::sync::Arc;

/// A live transport to one connected server.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Fetch the server's tool descriptors.
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>>;

    /// Invoke one tool with structured arguments.
    async fn call_tool(&self, tool: &str, arguments: Value) -> BridgeResult<Value>;

    /// Tear the transport down. Best-effort on the remote side; local
    /// resources are always released.
    async fn close(&self) -> BridgeResult<()>;
}

/// Selects and instantiates the right transport per server configuration.
pub struct TransportRegistry {
    gateway: Arc<HttpGateway>,
}

impl TransportRegistry {
    pub fn new(gateway: Arc<HttpGateway>) -> Self {
        Self { gateway }
    }

    /// Open a transport for `config`.
    ///
    /// Process-stdio and streaming-http servers are companion-managed: the
    /// companion is asked to start them and every call goes request/response
    /// through its HTTP surface. Push-channel servers get an `RpcChannel`
    /// that is opened and sent the `initialize` handshake here.
    pub async fn open(&self, config: &ServerConfig) -> BridgeResult<Arc<dyn ServerTransport>> {
        match config.transport {
            TransportKind::ProcessStdio | TransportKind::StreamingHttp => {
                self.gateway.start_server(&config.name).await?;
                Ok(Arc::new(HttpTransport::new(
                    Arc::clone(&self.gateway),
                    &config.name,
                )))
            }
            TransportKind::PushChannel => {
                let TransportConfig::PushChannel {
                    feed_url,
                    request_url,
                    headers,
                } = &config.transport_config
                else {
                    return Err(BridgeError::Config(format!(
                        "Server '{}' has push_channel kind but no push_channel config",
                        config.name
                    )));
                };

                let outbound = HttpOutbound::new(request_url.clone(), headers.clone())?;
                let channel = Arc::new(RpcChannel::new(
                    &config.name,
                    Arc::new(outbound),
                    feed_url.clone(),
                ));
                channel.open().await?;
                channel
                    .send("initialize", Some(serde_json::json!({ "client": "mcp-bridge" })))
                    .await?;

                Ok(Arc::new(ChannelTransport::new(channel)))
            }
        }
    }
}
