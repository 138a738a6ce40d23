//! Conversation records held behind the manager's per-conversation locks.

use std::mem;

use courier_crypto::{PublicKey, SessionKey, SharedSecret, decrypt};
use courier_proto::Envelope;

use super::SessionPhase;
use crate::keystore::Identity;

/// Our half of an exchange awaiting the peer's Response.
pub(crate) struct Pending {
    pub(crate) ephemeral: PublicKey,
    pub(crate) shared: SharedSecret,
    pub(crate) timestamp: u64,
}

/// Keys that can open envelopes. Only `current` seals.
pub(crate) struct ActiveKeys {
    pub(crate) current: SessionKey,
    pub(crate) previous: Option<SessionKey>,
}

impl ActiveKeys {
    pub(crate) fn new(current: SessionKey) -> Self {
        Self { current, previous: None }
    }

    /// Install `next`, keeping the current key for receive only.
    pub(crate) fn replace(self, next: SessionKey) -> Self {
        Self { current: next, previous: Some(self.current) }
    }

    /// Try the current key, then the previous one.
    pub(crate) fn open(&mut self, envelope: &Envelope, aad: &[u8]) -> Option<Vec<u8>> {
        let attempt = |key: &mut SessionKey| {
            decrypt(key, &envelope.nonce, &envelope.ciphertext, &envelope.tag, aad).ok()
        };
        if let Some(plaintext) = attempt(&mut self.current) {
            return Some(plaintext);
        }
        self.previous.as_mut().and_then(attempt)
    }
}

pub(crate) enum State {
    Uninitialized,
    Establishing(Pending),
    Established(ActiveKeys),
    Rekeying { keys: ActiveKeys, pending: Option<Pending> },
    Closed,
}

impl State {
    pub(crate) fn phase(&self) -> SessionPhase {
        match self {
            Self::Uninitialized => SessionPhase::Uninitialized,
            Self::Establishing(_) => SessionPhase::Establishing,
            Self::Established(_) => SessionPhase::Established,
            Self::Rekeying { .. } => SessionPhase::Rekeying,
            Self::Closed => SessionPhase::Closed,
        }
    }

    /// Keys able to open envelopes, if any.
    pub(crate) fn keys_mut(&mut self) -> Option<&mut ActiveKeys> {
        match self {
            Self::Established(keys) | Self::Rekeying { keys, .. } => Some(keys),
            Self::Uninitialized | Self::Establishing(_) | Self::Closed => None,
        }
    }

    /// Exchange we started and have not seen answered.
    pub(crate) fn pending(&self) -> Option<&Pending> {
        match self {
            Self::Establishing(pending) | Self::Rekeying { pending: Some(pending), .. } => Some(pending),
            _ => None,
        }
    }

    /// Move out the current state, leaving `Closed` behind.
    pub(crate) fn take(&mut self) -> Self {
        mem::replace(self, Self::Closed)
    }

    /// Established → Rekeying without a pending exchange. Other states are
    /// left as they are.
    pub(crate) fn begin_rekeying(&mut self) {
        *self = match self.take() {
            Self::Established(keys) => Self::Rekeying { keys, pending: None },
            other => other,
        };
    }
}

/// Last handshake this conversation accepted.
#[derive(Clone, Copy)]
pub(crate) struct LastHandshake {
    pub(crate) timestamp: u64,
    pub(crate) ephemeral: PublicKey,
}

pub(crate) struct Conversation {
    pub(crate) id: String,
    /// Fixed once the first handshake succeeds
    pub(crate) peer: Option<Identity>,
    pub(crate) state: State,
    pub(crate) last_handshake: Option<LastHandshake>,
}

impl Conversation {
    pub(crate) fn new(id: &str) -> Self {
        Self { id: id.to_owned(), peer: None, state: State::Uninitialized, last_handshake: None }
    }
}
