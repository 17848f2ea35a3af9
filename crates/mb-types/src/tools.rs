//! Tool descriptors and registration identity

use crate::config::ServerConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invocable capability exposed by a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// Local enablement flag; not part of the wire format. Defaults to true
    /// unless the remote registry marked the tool disabled.
    #[serde(skip, default = "default_true")]
    pub enabled: bool,
}

impl ToolDescriptor {
    /// Create an enabled descriptor with no description or schema.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
            enabled: true,
        }
    }
}

/// Composite registration identity: (server name, tool name).
///
/// Used as the host registration key instead of a concatenated string id, so
/// names containing separators stay unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolKey {
    pub server: String,
    pub tool: String,
}

impl ToolKey {
    pub fn new(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
        }
    }
}

impl std::fmt::Display for ToolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.server, self.tool)
    }
}

/// One row of the remote server registry, the authoritative store the bridge
/// reconciles against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,

    pub config: ServerConfig,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Last-known tool list, if the companion cached one.
    #[serde(rename = "cachedTools", skip_serializing_if = "Option::is_none")]
    pub cached_tools: Option<Vec<ToolDescriptor>>,

    /// Tool names the registry marked disabled for this server.
    #[serde(rename = "disabledTools", default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_tools: Vec<String>,
}

fn default_true() -> bool {
    true
}
