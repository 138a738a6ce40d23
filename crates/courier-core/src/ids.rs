//! Identifier validation for conversation ids, room names and identity ids

use thiserror::Error;

/// Longest accepted identifier, in bytes
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Why an identifier was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Zero-length identifier
    #[error("{kind} is empty")]
    Empty {
        /// Which identifier
        kind: &'static str,
    },

    /// Identifier longer than [`MAX_IDENTIFIER_LEN`]
    #[error("{kind} is {len} bytes, maximum is {max}")]
    TooLong {
        /// Which identifier
        kind: &'static str,
        /// Actual length
        len: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Character outside `[A-Za-z0-9_-]`
    #[error("{kind} contains invalid character {ch:?}")]
    InvalidCharacter {
        /// Which identifier
        kind: &'static str,
        /// First offending character
        ch: char,
    },
}

/// Check that `value` is non-empty, at most 64 bytes and made of ASCII
/// alphanumerics, `-` and `_`.
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong { kind, len: value.len(), max: MAX_IDENTIFIER_LEN });
    }
    if let Some(ch) = value.chars().find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')) {
        return Err(IdentifierError::InvalidCharacter { kind, ch });
    }
    Ok(())
}
