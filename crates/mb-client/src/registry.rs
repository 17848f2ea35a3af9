//! CRUD boundary to the remote server-configuration store
//!
//! Thin layer over the companion plugin's HTTP surface, plus the
//! reconciliation that keeps local connections converged with the remote
//! enabled/disabled state.

use crate::gateway::HttpGateway;
use crate::manager::{ConnectionManager, ConnectionState};
use crate::tools::ToolCache;
use mb_types::{BridgeError, BridgeResult, RegistryEntry, ServerConfig, ServerFailure};
use parking_lot::RwLock;
use std::sync::Arc;

/// Result of `add`: the config was saved; the auto-connect may still have
/// failed, which is a warning, not an add failure.
#[derive(Debug)]
pub struct AddOutcome {
    /// Present when the server was added but did not come up.
    pub connect_warning: Option<BridgeError>,
}

/// Registry view over the companion's server-configuration store.
pub struct ServerRegistry {
    gateway: Arc<HttpGateway>,
    manager: Arc<ConnectionManager>,
    cache: Arc<ToolCache>,

    /// Global feature toggle; when off, reconciliation connects nothing.
    feature_enabled: RwLock<bool>,
}

impl ServerRegistry {
    pub fn new(
        gateway: Arc<HttpGateway>,
        manager: Arc<ConnectionManager>,
        cache: Arc<ToolCache>,
    ) -> Self {
        Self {
            gateway,
            manager,
            cache,
            feature_enabled: RwLock::new(true),
        }
    }

    /// Toggle the global feature flag used by reconciliation.
    pub fn set_feature_enabled(&self, enabled: bool) {
        *self.feature_enabled.write() = enabled;
    }

    pub fn feature_enabled(&self) -> bool {
        *self.feature_enabled.read()
    }

    /// List the remote registry.
    pub async fn list(&self) -> BridgeResult<Vec<RegistryEntry>> {
        self.gateway.list_servers().await
    }

    /// Add a server and auto-connect it.
    ///
    /// A connect failure after a successful add is reported as
    /// `connect_warning` so the caller can tell "config saved, never came up"
    /// from "config rejected".
    pub async fn add(&self, name: &str, config: &ServerConfig) -> BridgeResult<AddOutcome> {
        self.gateway.add_server(name, config).await?;
        tracing::info!(server = %name, "Server added to registry");

        match self.manager.connect_and_register(config, &[]).await {
            Ok(_) => Ok(AddOutcome {
                connect_warning: None,
            }),
            Err(e) => {
                tracing::warn!(server = %name, "Server added but failed to connect: {e}");
                Ok(AddOutcome {
                    connect_warning: Some(e),
                })
            }
        }
    }

    /// Delete a server: tear down any live or in-flight connection, then
    /// remove the remote entry.
    pub async fn delete(&self, name: &str) -> BridgeResult<()> {
        if self.manager.state(name) != ConnectionState::Disconnected {
            self.manager.disconnect(name).await?;
        }
        self.gateway.delete_server(name).await?;
        tracing::info!(server = %name, "Server deleted from registry");
        Ok(())
    }

    /// Persist a server's disabled-tool set remotely, then apply the minimal
    /// registration diff locally.
    pub async fn set_disabled_tools(&self, name: &str, disabled: &[String]) -> BridgeResult<()> {
        self.gateway.set_disabled_tools(name, disabled).await?;
        self.cache.set_disabled_tools(name, disabled).await
    }

    /// Persist the disabled-server set remotely, then reconcile connections
    /// against the re-listed registry.
    ///
    /// Convergent and order-independent: each server is connected iff it is
    /// enabled remotely, the feature is enabled globally, and it is not
    /// already connected; servers that should not be up are disconnected.
    /// Running this twice with the same input is a no-op the second time.
    /// Per-server failures are collected, not short-circuited.
    pub async fn set_disabled_servers(&self, disabled: &[String]) -> BridgeResult<()> {
        self.gateway.set_disabled_servers(disabled).await?;

        let entries = self.gateway.list_servers().await?;
        let feature_enabled = self.feature_enabled();

        let mut failures: Vec<ServerFailure> = Vec::new();

        for entry in entries {
            let should_connect =
                feature_enabled && entry.enabled && !disabled.contains(&entry.name);
            let connected = self.manager.is_connected(&entry.name);

            let result = if should_connect && !connected {
                self.manager
                    .connect_and_register(&entry.config, &entry.disabled_tools)
                    .await
                    .map(|_| ())
            } else if !should_connect && connected {
                self.manager.disconnect(&entry.name).await
            } else {
                Ok(())
            };

            if let Err(e) = result {
                failures.push(ServerFailure {
                    server: entry.name.clone(),
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
}
