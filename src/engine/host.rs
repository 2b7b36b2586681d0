//! Host-facing traits: the authoritative data source and the remote
//! transport the engine is constructed over.

use async_trait::async_trait;
use serde_json::Value;

// ============================================================================
// StateSource — authoritative host data
// ============================================================================

/// Host-implemented read access to authoritative state.
///
/// The engine and projector only ever read through this; authoritative data
/// is mutated by the host in response to settled remote calls, never by this
/// crate.
///
/// # Threading
/// `get_state` is synchronous and runs on every projection. Implementations
/// should serve it from memory rather than blocking on I/O.
pub trait StateSource: Send + Sync {
    /// Current entity list for one state path. Each entity is expected to be
    /// a JSON object carrying at least an `id` field.
    fn get_state(&self, state_path: &str) -> Vec<Value>;
}

// ============================================================================
// RemoteTransport — user-provided network layer
// ============================================================================

/// User-implemented transport for dispatching operations to the
/// authoritative host. Implementations handle network communication
/// (HTTP, WebSocket, etc.).
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Perform `operation` remotely with positional `args`.
    ///
    /// The outcome is surfaced to the invoking caller unmodified; the engine
    /// reacts to success and failure identically apart from logging.
    async fn call(&self, operation: &str, args: &[Value])
        -> std::result::Result<Value, RemoteError>;
}

/// Transport-level error (wraps arbitrary error strings from the transport layer).
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}
