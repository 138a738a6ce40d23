//! Handshake (key exchange) message codec
//!
//! Handshakes travel under their own leading tag so the envelope layout
//! stays fixed. Layout (big-endian):
//!
//! ```text
//! tag:1 (0x41) | kind:1 | conv_len:2 | conv | sender_len:2 | sender
//!              | identity_key:32 | ephemeral_key:32 | timestamp:8
//!              | has_confirmation:1 | confirmation:32 (if flag is 1)
//! ```
//!
//! A `Response` echoes the initiator's ephemeral key and carries the key
//! confirmation tag. A `Rekey` carries a tag made with the session key it
//! replaces. An `Init` has no tag.

use bytes::BufMut;

use crate::{
    errors::{ProtocolError, Result},
    wire::{Reader, check_len},
};

/// Leading byte of a version 1 handshake packet
pub const HANDSHAKE_V1: u8 = 0x41;

/// X25519 public key length
pub const KEY_SIZE: usize = 32;

/// HMAC-SHA256 confirmation length
pub const CONFIRMATION_SIZE: usize = 32;

/// Maximum conversation or sender id length in bytes
pub const MAX_ID_LEN: usize = 1024;

/// Handshake message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeKind {
    /// Opens a new session
    Init = 1,
    /// Answers an Init or Rekey
    Response = 2,
    /// Replaces the key of an established session
    Rekey = 3,
}

impl HandshakeKind {
    /// Map a raw kind byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Init),
            2 => Some(Self::Response),
            3 => Some(Self::Rekey),
            _ => None,
        }
    }

    /// Raw kind byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether this kind carries a tag in the confirmation field.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Self::Response | Self::Rekey)
    }
}

/// Key exchange message for session establishment or re-key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExchangeMessage {
    /// Message kind
    pub kind: HandshakeKind,
    /// Conversation being keyed
    pub conversation_id: String,
    /// Identity id of the sender
    pub sender_identity_id: String,
    /// Sender's long-term identity public key
    pub identity_key: [u8; KEY_SIZE],
    /// Initiator's ephemeral public key (echoed in a Response)
    pub ephemeral_key: [u8; KEY_SIZE],
    /// Unix seconds when the message was created
    pub timestamp: u64,
    /// Key confirmation (Response) or re-key authentication tag (Rekey)
    pub confirmation: Option<[u8; CONFIRMATION_SIZE]>,
}

impl KeyExchangeMessage {
    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        let confirmation = if self.confirmation.is_some() { CONFIRMATION_SIZE } else { 0 };
        1 + 1
            + 2
            + self.conversation_id.len()
            + 2
            + self.sender_identity_id.len()
            + 2 * KEY_SIZE
            + 8
            + 1
            + confirmation
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `FieldTooLarge` if an id exceeds [`MAX_ID_LEN`]
    /// - `ConfirmationMismatch` if the confirmation does not fit the kind
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        check_len("conversation_id", self.conversation_id.len(), MAX_ID_LEN)?;
        check_len("sender_identity_id", self.sender_identity_id.len(), MAX_ID_LEN)?;
        if self.kind.requires_confirmation() != self.confirmation.is_some() {
            return Err(ProtocolError::ConfirmationMismatch { kind: self.kind.to_u8() });
        }

        dst.put_u8(HANDSHAKE_V1);
        dst.put_u8(self.kind.to_u8());
        dst.put_u16(self.conversation_id.len() as u16);
        dst.put_slice(self.conversation_id.as_bytes());
        dst.put_u16(self.sender_identity_id.len() as u16);
        dst.put_slice(self.sender_identity_id.as_bytes());
        dst.put_slice(&self.identity_key);
        dst.put_slice(&self.ephemeral_key);
        dst.put_u64(self.timestamp);
        match &self.confirmation {
            Some(tag) => {
                dst.put_u8(1);
                dst.put_slice(tag);
            },
            None => dst.put_u8(0),
        }
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a complete handshake packet.
    ///
    /// # Errors
    ///
    /// - `Empty`, `UnsupportedVersion` for a missing or foreign tag
    /// - `UnknownHandshakeKind`, `InvalidConfirmationFlag`,
    ///   `ConfirmationMismatch` for bad enum bytes
    /// - `Truncated`, `FieldTooLarge`, `InvalidUtf8`, `TrailingBytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(&first) = bytes.first() else {
            return Err(ProtocolError::Empty);
        };
        if first != HANDSHAKE_V1 {
            return Err(ProtocolError::UnsupportedVersion(first));
        }

        let mut reader = Reader::new(&bytes[1..]);
        let raw_kind = reader.u8("kind")?;
        let kind = HandshakeKind::from_u8(raw_kind).ok_or(ProtocolError::UnknownHandshakeKind(raw_kind))?;
        let conversation_id = reader.string16(MAX_ID_LEN, "conversation_id")?;
        let sender_identity_id = reader.string16(MAX_ID_LEN, "sender_identity_id")?;
        let identity_key = reader.array::<KEY_SIZE>("identity_key")?;
        let ephemeral_key = reader.array::<KEY_SIZE>("ephemeral_key")?;
        let timestamp = reader.u64("timestamp")?;

        let confirmation = match reader.u8("has_confirmation")? {
            0 => None,
            1 => Some(reader.array::<CONFIRMATION_SIZE>("confirmation")?),
            flag => return Err(ProtocolError::InvalidConfirmationFlag(flag)),
        };
        if kind.requires_confirmation() != confirmation.is_some() {
            return Err(ProtocolError::ConfirmationMismatch { kind: raw_kind });
        }
        reader.finish()?;

        Ok(Self {
            kind,
            conversation_id,
            sender_identity_id,
            identity_key,
            ephemeral_key,
            timestamp,
            confirmation,
        })
    }
}
