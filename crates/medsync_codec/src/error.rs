//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while reading or interpreting an XML document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the document was complete.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The input is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed {
        /// Byte offset where the problem was detected.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// A closing tag does not match the open element.
    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        /// Name of the element that is open.
        expected: String,
        /// Name found in the closing tag.
        found: String,
    },

    /// An entity or character reference could not be resolved.
    #[error("invalid entity reference: &{0};")]
    InvalidEntity(String),

    /// Element nesting exceeds the reader's limit.
    #[error("element nesting exceeds {0} levels")]
    DepthExceeded(usize),

    /// Non-whitespace content after the root element.
    #[error("trailing content after root element")]
    TrailingContent,

    /// The document is well-formed but does not have the expected shape.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },
}

impl CodecError {
    /// Create a malformed-input error.
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an error for a required child element or attribute that is absent.
    pub fn missing(name: &str) -> Self {
        Self::invalid_structure(format!("missing required field '{name}'"))
    }

    /// Returns true if the error comes from the document's syntax rather than its shape.
    pub fn is_syntax_error(&self) -> bool {
        !matches!(self, CodecError::InvalidStructure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message() {
        let err = CodecError::missing("patientId");
        assert_eq!(
            err.to_string(),
            "invalid structure: missing required field 'patientId'"
        );
        assert!(!err.is_syntax_error());
    }

    #[test]
    fn syntax_errors() {
        assert!(CodecError::UnexpectedEof.is_syntax_error());
        assert!(CodecError::malformed(3, "bad").is_syntax_error());
        let err = CodecError::MismatchedTag {
            expected: "a".into(),
            found: "b".into(),
        };
        assert!(err.to_string().contains("</a>"));
    }
}
