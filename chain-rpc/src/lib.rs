//! Resilient JSON-RPC client for blockchain nodes
//!
//! This crate multiplexes many concurrent logical requests and subscriptions
//! onto a single long-lived WebSocket connection to a remote node. The engine
//! survives disconnects, reachability changes, and node errors without losing
//! in-flight work: idempotent requests are replayed after reconnection,
//! subscriptions are re-established with fresh remote identifiers, and a
//! periodic health check keeps the connection honest.
//!
//! Consumers interact through two narrow surfaces: submit a call and receive
//! exactly one response ([`RpcEngine::call`]), or open a subscription and
//! receive zero-or-more updates until cancelled or failed
//! ([`RpcEngine::subscribe`]).

pub mod engine;
pub mod policy;
pub mod protocol;
pub mod reachability;
mod scheduler;
mod store;
pub mod transport;

use serde_json::Value;
use std::time::Duration;

// Re-export the public surface
pub use engine::{
    CallOptions, CallResult, ConnectionState, ResponseHandler, RpcEngine, SubscriptionHandler,
};
pub use policy::{ExponentialReconnection, LimitedReconnection, ReconnectionPolicy};
pub use reachability::ReachabilityNotifier;
pub use transport::{Transport, TransportEvent, WebSocketTransport};

/// Locally-generated correlation identifier used to match a response or
/// subscription confirmation to its originating call.
pub type RequestId = u16;

/// Engine error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// A success frame arrived without a usable result.
    #[error("empty result in response")]
    EmptyResult,

    /// The remote closed the connection while the request was in flight.
    #[error("connection closed by remote")]
    RemoteCancelled,

    /// The request was cancelled locally, either explicitly or at teardown.
    #[error("request cancelled by client")]
    ClientCancelled,

    /// The bounded wrapper's deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The node returned a well-formed JSON-RPC error object.
    #[error("node returned error {code}: {message}")]
    Node {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The request envelope could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport refused or failed to carry a frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// Every request id is currently outstanding.
    #[error("request id space exhausted")]
    IdsExhausted,

    /// Unclassified failure.
    #[error("unknown engine error")]
    Unknown,
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// WebSocket endpoint of the target node
    pub url: String,
    /// JSON-RPC protocol version string
    pub version: String,
    /// Deadline for establishing the socket
    pub connection_timeout: Duration,
    /// Interval between health-check calls; `Duration::ZERO` disables them
    pub health_check_interval: Duration,
    /// Method issued by the health check
    pub health_check_method: String,
    /// Connect lazily on the first submitted request
    pub autoconnect: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9944".to_string(),
            version: protocol::JSONRPC_VERSION.to_string(),
            connection_timeout: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(30),
            health_check_method: "system_health".to_string(),
            autoconnect: true,
        }
    }
}
