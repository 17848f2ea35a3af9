//! Client-side runtime for remote tool-providing servers
//!
//! Manages connections to servers speaking a JSON-RPC tool protocol over
//! heterogeneous transports, and keeps the host's registered tool set in sync
//! with which servers and tools are enabled.

pub mod channel;
pub mod gateway;
pub mod manager;
pub mod registry;
pub mod service;
pub mod tools;
pub mod transport;

pub use channel::{OutboundLeg, RpcChannel, DEFAULT_REQUEST_TIMEOUT};
pub use gateway::HttpGateway;
pub use manager::{ConnectionManager, ConnectionState};
pub use registry::{AddOutcome, ServerRegistry};
pub use service::BridgeService;
pub use tools::{ToolCache, ToolHost};
pub use transport::{ServerTransport, TransportRegistry};
