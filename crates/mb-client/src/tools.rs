//! Per-server tool cache and host-registration sync
//!
//! The cache owns every `ToolDescriptor`'s `enabled` flag and the record of
//! which keys are currently registered with the host. Enablement changes are
//! applied as minimal diffs: only tools whose effective state flips produce a
//! host call, because the host must not be assumed to tolerate re-registering
//! an already-registered tool or unregistering one it never saw.

use crate::transport::ServerTransport;
use async_trait::async_trait;
use dashmap::DashMap;
use mb_types::{BridgeResult, ToolDescriptor, ToolKey};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// The host application's tool-registration collaborator.
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Make a tool invocable in the host under the composite key.
    async fn register_tool(
        &self,
        key: ToolKey,
        description: Option<String>,
        input_schema: Option<Value>,
    ) -> BridgeResult<()>;

    /// Remove a previously registered tool.
    async fn unregister_tool(&self, key: &ToolKey) -> BridgeResult<()>;
}

/// Cached tool descriptors per server, plus registered-set bookkeeping.
pub struct ToolCache {
    host: Arc<dyn ToolHost>,

    /// Cached descriptors (server name -> tools); the only place `enabled`
    /// flags are mutated
    tools: DashMap<String, Vec<ToolDescriptor>>,

    /// Keys currently registered with the host
    registered: parking_lot::RwLock<HashSet<ToolKey>>,
}

impl ToolCache {
    pub fn new(host: Arc<dyn ToolHost>) -> Self {
        Self {
            host,
            tools: DashMap::new(),
            registered: parking_lot::RwLock::new(HashSet::new()),
        }
    }

    /// Cached tools for a server, if any.
    pub fn cached_tools(&self, server: &str) -> Option<Vec<ToolDescriptor>> {
        self.tools.get(server).map(|entry| entry.clone())
    }

    /// Whether a key is currently registered with the host.
    pub fn is_registered(&self, key: &ToolKey) -> bool {
        self.registered.read().contains(key)
    }

    /// Number of this server's tools registered with the host.
    pub fn registered_count(&self, server: &str) -> usize {
        self.registered
            .read()
            .iter()
            .filter(|key| key.server == server)
            .count()
    }

    /// Return cached tools, or fetch them from the transport on a miss.
    ///
    /// Newly seen tools default to enabled unless the remote registry listed
    /// them in `remote_disabled`.
    pub async fn fetch_tools(
        &self,
        server: &str,
        transport: &Arc<dyn ServerTransport>,
        remote_disabled: &[String],
    ) -> BridgeResult<Vec<ToolDescriptor>> {
        if let Some(cached) = self.cached_tools(server) {
            return Ok(cached);
        }

        let mut tools = transport.list_tools().await?;
        for tool in &mut tools {
            tool.enabled = !remote_disabled.contains(&tool.name);
        }

        tracing::info!(server, count = tools.len(), "Fetched tool descriptors");
        self.tools.insert(server.to_string(), tools.clone());
        Ok(tools)
    }

    /// Register with the host exactly the cached tools with `enabled = true`.
    ///
    /// Already-registered keys are skipped, so this is safe after connect and
    /// after reload alike.
    pub async fn register_enabled_tools(&self, server: &str) -> BridgeResult<usize> {
        let tools = self.cached_tools(server).unwrap_or_default();

        let mut added = 0;
        for tool in tools.iter().filter(|t| t.enabled) {
            let key = ToolKey::new(server, &tool.name);
            if self.is_registered(&key) {
                continue;
            }
            self.host
                .register_tool(key.clone(), tool.description.clone(), tool.input_schema.clone())
                .await?;
            self.registered.write().insert(key);
            added += 1;
        }

        if added > 0 {
            tracing::info!(server, added, "Registered enabled tools with host");
        }
        Ok(added)
    }

    /// Apply a new disabled-tool set for one server.
    ///
    /// Computes old vs. new enabled state per tool; a flip to enabled
    /// registers, a flip to disabled unregisters, everything else is left
    /// untouched. Applying the same set twice performs no host calls the
    /// second time.
    pub async fn set_disabled_tools(&self, server: &str, disabled: &[String]) -> BridgeResult<()> {
        let mut to_register: Vec<ToolDescriptor> = Vec::new();
        let mut to_unregister: Vec<String> = Vec::new();

        if let Some(mut entry) = self.tools.get_mut(server) {
            for tool in entry.iter_mut() {
                let enable = !disabled.contains(&tool.name);
                if enable == tool.enabled {
                    continue;
                }
                tool.enabled = enable;
                if enable {
                    to_register.push(tool.clone());
                } else {
                    to_unregister.push(tool.name.clone());
                }
            }
        }

        for tool in to_register {
            let key = ToolKey::new(server, &tool.name);
            if self.is_registered(&key) {
                continue;
            }
            self.host
                .register_tool(key.clone(), tool.description, tool.input_schema)
                .await?;
            self.registered.write().insert(key);
        }

        for name in to_unregister {
            let key = ToolKey::new(server, &name);
            if !self.is_registered(&key) {
                continue;
            }
            self.host.unregister_tool(&key).await?;
            self.registered.write().remove(&key);
        }

        Ok(())
    }

    /// Unregister every tool of one server and drop its cache entry.
    ///
    /// Host failures are logged and do not stop the sweep: after this returns
    /// the server has zero registered tools, which is what disconnect relies
    /// on.
    pub async fn unregister_all(&self, server: &str) {
        self.tools.remove(server);

        let keys: Vec<ToolKey> = self
            .registered
            .read()
            .iter()
            .filter(|key| key.server == server)
            .cloned()
            .collect();

        for key in keys {
            if let Err(e) = self.host.unregister_tool(&key).await {
                tracing::warn!(%key, "Failed to unregister tool from host: {e}");
            }
            self.registered.write().remove(&key);
        }
    }

    /// Drop a server's cache entry, unregistering tools that disappeared.
    ///
    /// Enabled flags carry over by tool name so a reload does not resurrect
    /// tools the user disabled; tools seen for the first time default to
    /// enabled.
    pub async fn refresh_tools(
        &self,
        server: &str,
        transport: &Arc<dyn ServerTransport>,
    ) -> BridgeResult<Vec<ToolDescriptor>> {
        let previous = self.cached_tools(server).unwrap_or_default();

        let mut tools = transport.list_tools().await?;
        for tool in &mut tools {
            tool.enabled = previous
                .iter()
                .find(|p| p.name == tool.name)
                .map_or(true, |p| p.enabled);
        }

        // Stale entries must not leak: anything registered that the server
        // no longer reports gets unregistered.
        let survivors: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        for gone in previous.iter().filter(|p| !survivors.contains(p.name.as_str())) {
            let key = ToolKey::new(server, &gone.name);
            if self.is_registered(&key) {
                if let Err(e) = self.host.unregister_tool(&key).await {
                    tracing::warn!(%key, "Failed to unregister vanished tool: {e}");
                }
                self.registered.write().remove(&key);
            }
        }

        self.tools.insert(server.to_string(), tools.clone());
        Ok(tools)
    }
}
