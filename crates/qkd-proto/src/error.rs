//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Inbound text is not a recognizable command shape.
    ///
    /// Not fatal: the connection stays open and the text is ignored.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Outbound message could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::Malformed("expected value at line 1".to_string());
        assert_eq!(err.to_string(), "malformed message: expected value at line 1");

        let err = ProtocolError::Encode("float is NaN".to_string());
        assert_eq!(err.to_string(), "encode failed: float is NaN");
    }
}
