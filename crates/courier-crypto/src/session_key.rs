//! Per-conversation symmetric session key

use std::fmt;

use zeroize::Zeroize;

use crate::{
    derivation::{CONFIRMATION_SIZE, derive_session_key_bytes, rekey_tag, verify_rekey_tag},
    error::CryptoError,
    replay::ReplayWindow,
};

/// Session key size in bytes (ChaCha20-Poly1305)
pub const KEY_SIZE: usize = 32;

/// Which side of the handshake produced this key.
///
/// Fixes the nonce direction prefix so both parties can seal under the
/// same key without ever producing the same nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sent the Init (or Rekey) message
    Initiator,
    /// Answered it
    Responder,
}

impl Role {
    /// Nonce direction prefix for messages sent in this role.
    pub fn direction(self) -> u32 {
        match self {
            Self::Initiator => 1,
            Self::Responder => 2,
        }
    }

    /// The other side.
    pub fn peer(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

/// Symmetric key plus the counters that guard its nonces.
///
/// Key bytes are zeroized on drop and never appear in `Debug` output.
pub struct SessionKey {
    conversation_id: String,
    key: [u8; KEY_SIZE],
    role: Role,
    created_at: u64,
    send_counter: u64,
    replay: ReplayWindow,
}

impl SessionKey {
    /// Derive a session key from raw agreement output.
    ///
    /// `material` is zeroized before returning. `created_at` is unix seconds
    /// from the caller's clock.
    pub fn derive(material: &mut [u8], conversation_id: &str, role: Role, created_at: u64) -> Self {
        let key = derive_session_key_bytes(material, conversation_id);
        material.zeroize();

        Self {
            conversation_id: conversation_id.to_owned(),
            key,
            role,
            created_at,
            send_counter: 0,
            replay: ReplayWindow::strict(),
        }
    }

    /// Replace the receive window (default: strict ordering).
    ///
    /// # Errors
    ///
    /// - `InvalidWindow` if `size` exceeds [`crate::MAX_REPLAY_WINDOW`]
    pub fn with_replay_window(mut self, size: u32) -> Result<Self, CryptoError> {
        self.replay = ReplayWindow::new(size)?;
        Ok(self)
    }

    /// Conversation this key is bound to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Handshake role that produced the key.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Creation time in unix seconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Counter the next outgoing message will use. Equal to the number of
    /// messages sealed so far.
    pub fn send_counter(&self) -> u64 {
        self.send_counter
    }

    /// Highest counter accepted from the peer.
    pub fn receive_counter(&self) -> Option<u64> {
        self.replay.highest()
    }

    /// Counter for the next send, or `SessionExhausted` once `u64::MAX` is
    /// reached.
    pub fn next_send_counter(&self) -> Result<u64, CryptoError> {
        if self.send_counter == u64::MAX {
            return Err(CryptoError::SessionExhausted);
        }
        Ok(self.send_counter)
    }

    /// Tag proving the sender of a Rekey holds this key.
    ///
    /// Both parties derive identical key bytes, so the peer checks the tag
    /// with [`Self::verify_rekey_tag`] on its own copy.
    pub fn rekey_tag(&self, transcript: &[u8]) -> [u8; CONFIRMATION_SIZE] {
        rekey_tag(&self.key, transcript)
    }

    /// Check a Rekey tag in constant time.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailure` if the tag was not made with this key
    pub fn verify_rekey_tag(&self, transcript: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
        verify_rekey_tag(&self.key, transcript, tag)
    }

    pub(crate) fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub(crate) fn commit_send(&mut self) {
        self.send_counter += 1;
    }

    pub(crate) fn replay(&self) -> &ReplayWindow {
        &self.replay
    }

    pub(crate) fn replay_mut(&mut self) -> &mut ReplayWindow {
        &mut self.replay
    }

    #[cfg(test)]
    pub(crate) fn set_send_counter(&mut self, counter: u64) {
        self.send_counter = counter;
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("conversation_id", &self.conversation_id)
            .field("key", &"[REDACTED]")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .field("send_counter", &self.send_counter)
            .field("receive_counter", &self.replay.highest())
            .finish()
    }
}
