//! Error types for the protocol crate.

use medsync_codec::CodecError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding wire documents and protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A wire document is malformed or violates the record schema.
    #[error("decode error: {reason}")]
    Decode {
        /// What was wrong with the document.
        reason: String,
    },

    /// A broker envelope has an unknown operation or shape.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// A socket reply line does not follow the reply grammar.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl ProtocolError {
    /// Creates a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

impl From<CodecError> for ProtocolError {
    fn from(err: CodecError) -> Self {
        Self::decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_become_decode_errors() {
        let err: ProtocolError = CodecError::missing("gender").into();
        assert!(matches!(err, ProtocolError::Decode { .. }));
        assert!(err.to_string().contains("gender"));
    }
}
