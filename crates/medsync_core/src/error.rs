//! Error types for the sync core.

use medsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the record store, node registry and coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No record is stored for the patient.
    #[error("record not found: {patient_id}")]
    NotFound {
        /// Patient identifier that missed.
        patient_id: String,
    },

    /// Input was rejected before any state changed.
    #[error("validation error: {0}")]
    Validation(String),

    /// A wire document could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A peer could not be reached or rejected a push.
    #[error("peer unavailable at {endpoint}: {reason}")]
    PeerUnavailable {
        /// Endpoint that was dialed.
        endpoint: String,
        /// What went wrong.
        reason: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(patient_id: impl Into<String>) -> Self {
        Self::NotFound {
            patient_id: patient_id.into(),
        }
    }

    /// Creates a peer-unavailable error.
    pub fn peer_unavailable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PeerUnavailable {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    /// Returns true if the caller's input caused the error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound { .. } | CoreError::Validation(_) | CoreError::Decode(_)
        )
    }

    /// Returns true if repeating the operation later may succeed.
    ///
    /// Nothing in the core retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::PeerUnavailable { .. })
    }
}

impl From<ProtocolError> for CoreError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Decode { reason } => CoreError::Decode(reason),
            other => CoreError::Decode(other.to_string()),
        }
    }
}
