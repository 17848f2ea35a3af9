//! Server configuration types
//!
//! A `ServerConfig` is immutable once a server is connected; changing the
//! transport requires disconnect + reconnect with a new config.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// How a given server is reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Local process via standard streams, supervised by the companion
    /// plugin; the bridge reaches it request/response through the companion.
    ProcessStdio,

    /// Long-lived push feed for responses, separate outbound call for
    /// requests.
    PushChannel,

    /// Streaming HTTP endpoint, request/response per call.
    StreamingHttp,
}

/// Transport-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Process configuration, executed by the companion plugin.
    Stdio {
        /// Full command to execute (parsed with shell-words at runtime).
        /// Example: "npx -y @modelcontextprotocol/server-filesystem /tmp"
        command: String,
        /// Explicit arguments; when non-empty they take precedence over
        /// parsing the command string.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        /// Environment variables for the spawned process
        #[serde(default)]
        env: HashMap<String, String>,
    },

    /// Push-channel configuration.
    PushChannel {
        /// URL of the long-lived subscription feed (ws:// or wss://)
        feed_url: String,
        /// URL the outbound JSON-RPC envelopes are POSTed to
        request_url: String,
        /// Headers sent on both legs
        #[serde(default)]
        headers: HashMap<String, String>,
    },

    /// Streaming HTTP configuration.
    StreamingHttp {
        /// Server URL
        url: String,
        /// Headers sent with every request
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl TransportConfig {
    /// Parse a stdio command into executable and arguments.
    ///
    /// Supports two formats: a single command string split with shell-words,
    /// or explicit command + args fields.
    ///
    /// Returns (executable, args, env) or an error message if parsing fails.
    #[allow(clippy::type_complexity)]
    pub fn parse_stdio_command(
        &self,
    ) -> Result<(String, Vec<String>, HashMap<String, String>), String> {
        match self {
            TransportConfig::Stdio { command, args, env } => {
                if !args.is_empty() {
                    return Ok((command.clone(), args.clone(), env.clone()));
                }

                let parts = shell_words::split(command)
                    .map_err(|e| format!("Failed to parse command '{command}': {e}"))?;

                if parts.is_empty() {
                    return Err("Command is empty".to_string());
                }

                let executable = parts[0].clone();
                let parsed_args = parts[1..].to_vec();

                Ok((executable, parsed_args, env.clone()))
            }
            _ => Err("Not a stdio transport".to_string()),
        }
    }
}

/// Configuration for one remote tool-providing server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Unique name, the key for everything keyed per server
    pub name: String,

    /// Transport kind
    pub transport: TransportKind,

    /// Transport-specific configuration
    pub transport_config: TransportConfig,

    /// Whether the server is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ServerConfig {
    /// Create a new server configuration, enabled by default.
    pub fn new(
        name: impl Into<String>,
        transport: TransportKind,
        transport_config: TransportConfig,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            transport_config,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}
