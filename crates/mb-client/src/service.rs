//! Composition root for the bridge runtime
//!
//! Wires the gateway, tool cache, connection manager, and server registry
//! together. Hosts construct one `BridgeService` per companion endpoint and
//! hold it for the lifetime of the feature; nothing here is global.

use crate::gateway::HttpGateway;
use crate::manager::ConnectionManager;
use crate::registry::ServerRegistry;
use crate::tools::{ToolCache, ToolHost};
use mb_types::{BridgeError, BridgeResult, ServerConfig, ServerFailure};
use std::collections::HashMap;
use std::sync::Arc;

/// The assembled bridge runtime.
pub struct BridgeService {
    gateway: Arc<HttpGateway>,
    cache: Arc<ToolCache>,
    manager: Arc<ConnectionManager>,
    registry: ServerRegistry,
}

impl BridgeService {
    /// Build a service talking to the companion plugin at `base_url`,
    /// registering tools into `host`.
    pub fn new(
        base_url: impl Into<String>,
        auth_headers: HashMap<String, String>,
        host: Arc<dyn ToolHost>,
    ) -> BridgeResult<Self> {
        let gateway = Arc::new(HttpGateway::new(base_url, auth_headers)?);
        let cache = Arc::new(ToolCache::new(host));
        let manager = Arc::new(ConnectionManager::new(gateway.clone(), cache.clone()));
        let registry = ServerRegistry::new(gateway.clone(), manager.clone(), cache.clone());

        Ok(Self {
            gateway,
            cache,
            manager,
            registry,
        })
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn cache(&self) -> &Arc<ToolCache> {
        &self.cache
    }

    /// Connect one server and register its enabled tools with the host.
    /// Returns how many tools were registered.
    pub async fn connect_and_register(
        &self,
        config: &ServerConfig,
        remote_disabled: &[String],
    ) -> BridgeResult<usize> {
        self.manager.connect_and_register(config, remote_disabled).await
    }

    /// Toggle the global feature flag consulted by registry reconciliation.
    pub fn set_feature_enabled(&self, enabled: bool) {
        self.registry.set_feature_enabled(enabled);
    }

    /// Re-discover tools on every connected server.
    ///
    /// Each server gets a remote reload, a cache refresh, and a registration
    /// pass for any newly enabled tools. Per-server failures are collected
    /// into an aggregate error rather than aborting the sweep.
    pub async fn reload_all(&self) -> BridgeResult<()> {
        let mut failures: Vec<ServerFailure> = Vec::new();

        for name in self.manager.connected_servers() {
            if let Err(e) = self.reload_server(&name).await {
                tracing::warn!(server = %name, "Tool reload failed: {e}");
                failures.push(ServerFailure {
                    server: name,
                    error: e.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Aggregate(failures))
        }
    }

    async fn reload_server(&self, name: &str) -> BridgeResult<()> {
        let transport = self.manager.transport(name).ok_or_else(|| {
            BridgeError::Connection(format!("Server '{name}' has no live transport"))
        })?;

        self.gateway.reload_tools(name).await?;
        self.cache.refresh_tools(name, &transport).await?;
        self.cache.register_enabled_tools(name).await?;
        Ok(())
    }

    /// Disconnect every server. The service can be reused afterwards.
    pub async fn shutdown(&self) {
        self.manager.shutdown_all().await;
    }
}
