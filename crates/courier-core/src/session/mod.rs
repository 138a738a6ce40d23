//! Per-conversation session lifecycle.
//!
//! Each conversation runs the state machine below. Handshake packets drive
//! every transition except `send`'s re-key policy and explicit `close`.
//!
//! ```text
//!                    start_session / Init
//! ┌───────────────┐ ──────────────────────> ┌──────────────┐
//! │ Uninitialized │                         │ Establishing │
//! └───────────────┘ ─────┐                  └──────────────┘
//!                        │ Init (answered)         │ Response
//!                        ↓                         ↓
//!                   ┌─────────────┐  policy / rekey  ┌───────────┐
//!                   │ Established │ ───────────────> │ Rekeying  │
//!                   └─────────────┘ <─────────────── └───────────┘
//!                                    Rekey / Response
//!
//!                  any state ── close ──> Closed
//! ```
//!
//! While Rekeying the current key still opens incoming envelopes. After a
//! re-key completes the replaced key is kept for receive only, so messages
//! sealed before the switch still open once. A Rekey is only answered when
//! it carries a tag made with the current key.

mod manager;
mod state;

pub use manager::SessionManager;

/// Observable phase of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No handshake attempted
    Uninitialized,
    /// Init sent, waiting for the peer's Response
    Establishing,
    /// Keys agreed; `send` is allowed
    Established,
    /// Key is being replaced; the old key still receives
    Rekeying,
    /// Torn down; all key material discarded
    Closed,
}

/// Result of feeding one packet to [`SessionManager::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// An application message opened
    Message {
        /// Conversation the message belongs to
        conversation_id: String,
        /// Authenticated sender
        sender_identity_id: String,
        /// Decrypted payload
        plaintext: Vec<u8>,
    },

    /// Handshake answered; the caller must transmit `reply` to the peer
    HandshakeReply {
        /// Conversation now established under the new key
        conversation_id: String,
        /// Encoded Response packet
        reply: Vec<u8>,
    },

    /// Our own Init or Rekey was confirmed by the peer
    Established {
        /// Conversation now established under the new key
        conversation_id: String,
    },

    /// Peer's exchange lost a simultaneous open or re-key and was dropped
    Ignored {
        /// Conversation the dropped exchange addressed
        conversation_id: String,
    },
}

impl ReceiveOutcome {
    /// Conversation this outcome concerns.
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Message { conversation_id, .. }
            | Self::HandshakeReply { conversation_id, .. }
            | Self::Established { conversation_id }
            | Self::Ignored { conversation_id } => conversation_id,
        }
    }
}
