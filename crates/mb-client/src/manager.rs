//! Server connection lifecycle management
//!
//! Owns the set of currently connected servers, their configs, and their live
//! transport handles. State moves Disconnected -> Connecting -> Connected
//! only through `connect`, and back to Disconnected only through
//! `disconnect` (or a failed open). Disconnect cascades tool unregistration
//! so no orphaned tool stays registered with the host.

use crate::gateway::HttpGateway;
use crate::tools::ToolCache;
use crate::transport::{ServerTransport, TransportRegistry};
use dashmap::DashMap;
use mb_types::{BridgeError, BridgeResult, ServerConfig};
use std::sync::Arc;

/// Connection lifecycle state for one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ServerConnection {
    config: ServerConfig,
    state: ConnectionState,
    transport: Option<Arc<dyn ServerTransport>>,
}

/// Manages connect/disconnect for all servers.
pub struct ConnectionManager {
    transports: TransportRegistry,
    cache: Arc<ToolCache>,

    /// Live connections keyed by server name; at most one entry per name
    connections: DashMap<String, ServerConnection>,
}

impl ConnectionManager {
    pub fn new(gateway: Arc<HttpGateway>, cache: Arc<ToolCache>) -> Self {
        Self {
            transports: TransportRegistry::new(gateway),
            cache,
            connections: DashMap::new(),
        }
    }

    /// Current state for a server.
    pub fn state(&self, name: &str) -> ConnectionState {
        self.connections
            .get(name)
            .map_or(ConnectionState::Disconnected, |c| c.state)
    }

    /// Whether a server is fully connected.
    pub fn is_connected(&self, name: &str) -> bool {
        self.state(name) == ConnectionState::Connected
    }

    /// The live transport for a connected server.
    pub fn transport(&self, name: &str) -> Option<Arc<dyn ServerTransport>> {
        self.connections
            .get(name)
            .and_then(|c| c.transport.clone())
    }

    /// Names of all connected servers.
    pub fn connected_servers(&self) -> Vec<String> {
        self.connections
            .iter()
            .filter(|entry| entry.value().state == ConnectionState::Connected)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Connect a server.
    ///
    /// Idempotent: a no-op success while the server is already Connected (or
    /// a connect is in flight). A failed transport open rolls the entry back
    /// to Disconnected.
    pub async fn connect(&self, config: &ServerConfig) -> BridgeResult<()> {
        let name = config.name.clone();

        match self.state(&name) {
            ConnectionState::Connected | ConnectionState::Connecting => return Ok(()),
            ConnectionState::Disconnected => {}
        }

        tracing::info!(server = %name, kind = ?config.transport, "Connecting server");
        self.connections.insert(
            name.clone(),
            ServerConnection {
                config: config.clone(),
                state: ConnectionState::Connecting,
                transport: None,
            },
        );

        let transport = match self.transports.open(config).await {
            Ok(transport) => transport,
            Err(e) => {
                self.connections.remove(&name);
                tracing::error!(server = %name, "Connect failed: {e}");
                return Err(e);
            }
        };

        // A disconnect may have claimed the entry while the open was in
        // flight; in that case the fresh transport must not leak a running
        // remote side, and the caller must not be told the connect succeeded.
        let claimed = if let Some(mut entry) = self.connections.get_mut(&name) {
            entry.state = ConnectionState::Connected;
            entry.transport = Some(Arc::clone(&transport));
            true
        } else {
            false
        };

        if !claimed {
            tracing::warn!(server = %name, "Disconnected while the transport was opening");
            if let Err(e) = transport.close().await {
                tracing::warn!(server = %name, "Failed to close orphaned transport: {e}");
            }
            return Err(BridgeError::Connection(format!(
                "Server '{name}' was disconnected while connecting"
            )));
        }

        tracing::info!(server = %name, "Server connected");
        Ok(())
    }

    /// Connect a server and bring the host's registered tools in line:
    /// fetch descriptors, then register the enabled subset. This is the
    /// per-server atomic step that establishes the registration invariant.
    pub async fn connect_and_register(
        &self,
        config: &ServerConfig,
        remote_disabled: &[String],
    ) -> BridgeResult<usize> {
        self.connect(config).await?;

        let transport = self.transport(&config.name).ok_or_else(|| {
            BridgeError::Connection(format!("Server '{}' has no live transport", config.name))
        })?;

        self.cache
            .fetch_tools(&config.name, &transport, remote_disabled)
            .await?;
        self.cache.register_enabled_tools(&config.name).await
    }

    /// Disconnect a server.
    ///
    /// The remote stop is best-effort; unregistering the server's tools from
    /// the host and dropping local state always happen, so the manager can
    /// never get stuck holding a dead connection.
    pub async fn disconnect(&self, name: &str) -> BridgeResult<()> {
        let Some((_, connection)) = self.connections.remove(name) else {
            return Ok(());
        };

        tracing::info!(server = %name, "Disconnecting server");

        if let Some(transport) = connection.transport {
            if let Err(e) = transport.close().await {
                tracing::warn!(server = %name, "Remote stop failed, cleaning up locally: {e}");
            }
        }

        self.cache.unregister_all(name).await;

        tracing::info!(server = %name, "Server disconnected");
        Ok(())
    }

    /// The config a server was connected with.
    pub fn config(&self, name: &str) -> Option<ServerConfig> {
        self.connections.get(name).map(|c| c.config.clone())
    }

    /// Disconnect every server. Used at service shutdown.
    pub async fn shutdown_all(&self) {
        let names: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for name in names {
            if let Err(e) = self.disconnect(&name).await {
                tracing::error!(server = %name, "Failed to disconnect: {e}");
            }
        }
    }
}
