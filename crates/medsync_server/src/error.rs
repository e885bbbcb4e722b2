//! Error types for the transport bindings.

use medsync_core::CoreError;
use medsync_protocol::{BrokerFault, FaultKind, ProtocolError, RECORD_NOT_FOUND};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by bindings, clients and node assembly.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A binding could not acquire its listening resource.
    #[error("{binding} failed to start: {reason}")]
    Startup {
        /// Binding name.
        binding: String,
        /// What went wrong.
        reason: String,
    },

    /// A binding could not release its resources cleanly.
    #[error("{binding} failed to shut down: {reason}")]
    Shutdown {
        /// Binding name.
        binding: String,
        /// What went wrong.
        reason: String,
    },

    /// Low-level framing was violated; the connection is unusable.
    #[error("framing error: {0}")]
    Frame(String),

    /// Connecting to a remote endpoint took too long.
    #[error("connection to {addr} timed out after {timeout_ms}ms")]
    Timeout {
        /// Address that was dialed.
        addr: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// No service is bound under the name.
    #[error("no service bound as '{0}'")]
    NameNotBound(String),

    /// Another service already holds the name.
    #[error("name '{0}' is already bound")]
    NameBound(String),

    /// The broker answered with a fault.
    #[error("remote fault: {0}")]
    Fault(BrokerFault),

    /// The socket binding answered with an error line.
    #[error("remote error: {0}")]
    Rejected(String),

    /// Core operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Message could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a startup error.
    pub fn startup(binding: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Startup {
            binding: binding.into(),
            reason: reason.into(),
        }
    }

    /// Creates a shutdown error.
    pub fn shutdown(binding: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Shutdown {
            binding: binding.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the remote side reported a lookup miss.
    pub fn is_not_found(&self) -> bool {
        match self {
            ServerError::Core(e) => e.is_not_found(),
            ServerError::Fault(fault) => fault.kind == FaultKind::NotFound,
            ServerError::Rejected(message) => message == RECORD_NOT_FOUND,
            _ => false,
        }
    }

    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::Core(e) => e.is_client_error(),
            ServerError::Protocol(_) | ServerError::NameNotBound(_) | ServerError::NameBound(_) => {
                true
            }
            ServerError::Fault(fault) => fault.kind != FaultKind::Internal,
            ServerError::Rejected(_) => true,
            _ => false,
        }
    }

    /// Returns true if repeating the call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Timeout { .. } | ServerError::Io(_) => true,
            ServerError::Core(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Collapses this error into the core taxonomy for a peer push.
    pub(crate) fn into_peer_error(self, endpoint: &str) -> CoreError {
        match self {
            ServerError::Core(e @ CoreError::PeerUnavailable { .. }) => e,
            other => CoreError::peer_unavailable(endpoint, other.to_string()),
        }
    }
}
