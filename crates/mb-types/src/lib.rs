//! Shared types for mcp-bridge: error taxonomy, JSON-RPC protocol envelope,
//! server configuration, and tool descriptors.

pub mod config;
pub mod errors;
pub mod protocol;
pub mod tools;

pub use config::{ServerConfig, TransportConfig, TransportKind};
pub use errors::{BridgeError, BridgeResult, ServerFailure};
pub use protocol::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
pub use tools::{RegistryEntry, ToolDescriptor, ToolKey};
