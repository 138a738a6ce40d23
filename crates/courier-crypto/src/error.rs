//! Crypto error types

use thiserror::Error;

/// Errors from Courier cryptographic operations.
///
/// Authentication problems are deliberately collapsed into a single
/// variant: callers learn that a message did not open, never why.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Public key had the wrong length
    #[error("invalid public key: expected {expected} bytes, got {actual}")]
    InvalidKey {
        /// Required key length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Diffie-Hellman produced the all-zero output (low-order peer point)
    #[error("key agreement produced a non-contributory shared secret")]
    Agreement,

    /// Tag mismatch, replayed counter or malformed sealed payload
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Send counter reached `u64::MAX`; the session must be re-keyed
    #[error("session send counter exhausted")]
    SessionExhausted,

    /// Replay window larger than the bitmap can track
    #[error("replay window {size} exceeds maximum {max}")]
    InvalidWindow {
        /// Requested window size
        size: u32,
        /// Largest supported window
        max: u32,
    },
}

impl CryptoError {
    /// Whether the failure concerns a peer-supplied key or handshake.
    ///
    /// Such errors reject the handshake but leave any existing session
    /// intact.
    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Self::InvalidKey { .. } | Self::Agreement)
    }
}
