//! Error types and conversions

use thiserror::Error;

/// One server's failure within a bulk operation.
#[derive(Debug, Clone)]
pub struct ServerFailure {
    /// Server name the failure belongs to
    pub server: String,
    /// Rendered error message
    pub error: String,
}

impl std::fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.server, self.error)
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Transport could not open or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No correlated response arrived within the deadline.
    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// Well-formed error envelope from the remote side.
    #[error("Protocol error {code}: {message}")]
    Protocol { code: i32, message: String },

    /// Operation attempted or pending during/after shutdown.
    #[error("Channel closed")]
    Closed,

    /// The companion server-side plugin is absent (HTTP 404).
    #[error("Companion plugin is not installed")]
    PluginNotInstalled,

    /// The companion server-side plugin is broken (HTTP 500).
    #[error("Companion plugin is misconfigured")]
    PluginMisconfigured,

    /// Any other non-2xx outcome at the registry boundary.
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Invalid or rejected configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Per-server failures collected from a bulk operation.
    #[error("{} server(s) failed: {}", .0.len(), format_failures(.0))]
    Aggregate(Vec<ServerFailure>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_failures(failures: &[ServerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Translate a registry-boundary HTTP status into the error taxonomy.
    ///
    /// 404 means the companion plugin is absent; 500 means it is present but
    /// broken; anything else keeps the raw status and body.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => BridgeError::PluginNotInstalled,
            500 => BridgeError::PluginMisconfigured,
            _ => BridgeError::RequestFailed { status, body },
        }
    }
}
