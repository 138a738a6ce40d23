//! Error types for the wire codec

use thiserror::Error;

/// Result alias for codec operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding packets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Zero-length input
    #[error("empty packet")]
    Empty,

    /// Leading version/tag byte is not one we speak
    #[error("unsupported packet version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Buffer ended inside a field
    #[error("packet truncated in {field}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Field being read
        field: &'static str,
        /// Bytes the field requires
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Length prefix or field exceeds the codec limit
    #[error("{field} length {size} exceeds maximum {max}")]
    FieldTooLarge {
        /// Offending field
        field: &'static str,
        /// Declared or actual size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Nonce length prefix does not match the version's nonce size
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Required nonce length
        expected: usize,
        /// Declared nonce length
        actual: usize,
    },

    /// Identifier bytes are not UTF-8
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// Handshake kind byte outside 1..=3
    #[error("unknown handshake kind: {0}")]
    UnknownHandshakeKind(u8),

    /// Confirmation flag is neither 0 nor 1
    #[error("invalid confirmation flag: {0}")]
    InvalidConfirmationFlag(u8),

    /// Response or Rekey without a tag, or Init with one
    #[error("confirmation presence does not match handshake kind {kind}")]
    ConfirmationMismatch {
        /// Raw handshake kind
        kind: u8,
    },

    /// Bytes left over after a complete packet
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),
}

impl ProtocolError {
    /// Unknown version, as opposed to a malformed packet of a known version.
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Self::UnsupportedVersion(_))
    }
}
