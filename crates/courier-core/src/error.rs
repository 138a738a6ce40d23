//! Error types for the Courier core.
//!
//! One enum per layer: storage failures, key store failures and the
//! session-level taxonomy that every public `SessionManager` entry point
//! returns. Cryptographic and wire errors from the lower crates are folded
//! into [`SessionError`] without losing their kind.

use courier_crypto::CryptoError;
use courier_proto::{HandshakeKind, ProtocolError};
use thiserror::Error;

use crate::{config::ConfigError, ids::IdentifierError, session::SessionPhase, storage::StorageError};

/// Secure randomness could not be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("secure randomness unavailable: {reason}")]
pub struct EntropyError {
    /// Description from the entropy source
    pub reason: String,
}

impl EntropyError {
    /// Build an error with the source's description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Errors from [`crate::KeyStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// No identity stored under this id
    #[error("identity not found: {identity_id}")]
    NotFound {
        /// Requested identity id
        identity_id: String,
    },

    /// Key generation needed randomness and none was available
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// Persistence collaborator failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stored record does not decode to a consistent key pair
    #[error("corrupt identity record for {identity_id}: {reason}")]
    Corrupt {
        /// Identity whose record is damaged
        identity_id: String,
        /// What was wrong with it
        reason: String,
    },

    /// Key agreement rejected the supplied keys
    #[error("key agreement failed: {0}")]
    Crypto(#[from] CryptoError),
}

/// Errors from [`crate::SessionManager`] and [`crate::RoomChannel`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Secure randomness unavailable; nothing can proceed
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// A supplied public key is malformed
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Key agreement produced a degenerate shared secret
    #[error("key agreement produced a degenerate shared secret")]
    Agreement,

    /// Message or handshake did not authenticate. Covers tag mismatch,
    /// replay and unknown sender alike.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Packet is structurally invalid
    #[error("malformed packet: {0}")]
    Format(ProtocolError),

    /// Packet carries a version this build does not speak
    #[error("unsupported packet version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Operation needs a phase the conversation is not in
    #[error("session {conversation_id} not ready: {phase:?}")]
    SessionNotReady {
        /// Conversation addressed
        conversation_id: String,
        /// Phase it is actually in
        phase: SessionPhase,
    },

    /// Send counter or re-key policy exhausted; conversation is now Rekeying
    #[error("session {conversation_id} exhausted, re-key required")]
    SessionExhausted {
        /// Conversation that must be re-keyed
        conversation_id: String,
    },

    /// Handshake is too old, from the future, or a replay
    #[error("stale handshake for {conversation_id}")]
    StaleHandshake {
        /// Conversation the handshake addressed
        conversation_id: String,
    },

    /// Handshake kind does not fit the conversation's phase or peer
    #[error("unexpected {kind:?} handshake for {conversation_id}")]
    UnexpectedHandshake {
        /// Conversation the handshake addressed
        conversation_id: String,
        /// Handshake kind received
        kind: HandshakeKind,
    },

    /// Identity key does not match the pinned or claimed identity
    #[error("untrusted peer: {identity_id}")]
    UntrustedPeer {
        /// Claimed identity id
        identity_id: String,
    },

    /// Plaintext exceeds the configured maximum
    #[error("plaintext of {size} bytes exceeds maximum {max}")]
    PlaintextTooLarge {
        /// Plaintext length
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Conversation, room or identity id failed validation
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    /// Configuration rejected by validation
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Key store failure not covered by a more specific kind
    #[error("key store error: {0}")]
    KeyStore(KeyStoreError),
}

impl SessionError {
    /// Returns true if this error may succeed on retry.
    ///
    /// A session that is not ready or exhausted recovers once a handshake
    /// completes; storage I/O may recover on its own. Authentication and
    /// format failures never do.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SessionNotReady { .. }
                | Self::SessionExhausted { .. }
                | Self::KeyStore(KeyStoreError::Storage(StorageError::Io(_)))
        )
    }

    /// Returns true if the core cannot operate at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Entropy(_))
    }

    /// Returns true if the packet was rejected at the codec boundary.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_) | Self::UnsupportedVersion(_))
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnsupportedVersion(version) => Self::UnsupportedVersion(version),
            other => Self::Format(other),
        }
    }
}

impl From<CryptoError> for SessionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKey { .. } => Self::InvalidKey(err.to_string()),
            CryptoError::Agreement => Self::Agreement,
            CryptoError::InvalidWindow { size, max } => {
                Self::InvalidConfig(ConfigError::ReplayWindowTooLarge { size, max })
            },
            // Exhaustion is reported by the manager with its conversation id;
            // anything reaching here failed to open.
            CryptoError::AuthenticationFailure | CryptoError::SessionExhausted => {
                Self::AuthenticationFailure
            },
        }
    }
}

impl From<KeyStoreError> for SessionError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::Entropy(entropy) => Self::Entropy(entropy),
            KeyStoreError::Crypto(crypto) => crypto.into(),
            other => Self::KeyStore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_keeps_its_own_kind() {
        let err = SessionError::from(ProtocolError::UnsupportedVersion(0x07));
        assert_eq!(err, SessionError::UnsupportedVersion(0x07));
        assert!(err.is_format_error());

        let err = SessionError::from(ProtocolError::Empty);
        assert_eq!(err, SessionError::Format(ProtocolError::Empty));
    }

    #[test]
    fn key_store_errors_are_flattened() {
        let err = SessionError::from(KeyStoreError::Entropy(EntropyError::new("no rng")));
        assert!(err.is_fatal());

        let err = SessionError::from(KeyStoreError::Crypto(CryptoError::Agreement));
        assert_eq!(err, SessionError::Agreement);

        let err = SessionError::from(KeyStoreError::NotFound { identity_id: "x".to_owned() });
        assert!(matches!(err, SessionError::KeyStore(KeyStoreError::NotFound { .. })));
    }

    #[test]
    fn readiness_errors_are_transient() {
        assert!(
            SessionError::SessionNotReady {
                conversation_id: "c1".to_owned(),
                phase: SessionPhase::Establishing,
            }
            .is_transient()
        );
        assert!(SessionError::SessionExhausted { conversation_id: "c1".to_owned() }.is_transient());
        assert!(!SessionError::AuthenticationFailure.is_transient());
        assert!(!SessionError::Agreement.is_transient());
    }
}
