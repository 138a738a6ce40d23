//! Session envelope codec
//!
//! An `Envelope` is the unit a session sends for every application message.
//!
//! Layout on the wire (all integers big-endian):
//!
//! ```text
//! version:1 | sender_len:2 | sender | counter:8 | nonce_len:1 | nonce
//!           | ciphertext_len:4 | ciphertext | tag:16
//! ```
//!
//! # Security
//!
//! Decoding only establishes structural validity. Every length prefix is
//! checked against a fixed maximum and against the remaining input before
//! anything is copied, so a hostile prefix cannot trigger a large allocation.
//! Authenticity is established later when the session opens the ciphertext.

use bytes::{BufMut, Bytes};

use crate::{
    errors::{ProtocolError, Result},
    wire::{Reader, check_len},
};

/// Nonce length for envelope version 1 (ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag length
pub const TAG_SIZE: usize = 16;

/// Maximum sender identity id length in bytes
pub const MAX_SENDER_ID_LEN: usize = 1024;

/// Maximum ciphertext length (16 MiB)
pub const MAX_CIPHERTEXT_LEN: usize = 16 * 1024 * 1024;

/// Label prefixed to every envelope's associated data
const AAD_LABEL: &[u8] = b"courier-envelope-v1";

/// Envelope wire versions. Closed set: unknown bytes are rejected at decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeVersion {
    /// ChaCha20-Poly1305, 12-byte counter nonce
    V1 = 0x01,
}

impl EnvelopeVersion {
    /// Map a raw version byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::V1),
            _ => None,
        }
    }

    /// Raw version byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Nonce length this version carries.
    pub fn nonce_len(self) -> usize {
        match self {
            Self::V1 => NONCE_SIZE,
        }
    }
}

/// One encrypted application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Wire version
    pub version: EnvelopeVersion,
    /// Identity id of the sender
    pub sender_identity_id: String,
    /// Send counter the nonce was derived from
    pub counter: u64,
    /// AEAD nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext without the tag
    pub ciphertext: Bytes,
    /// Detached authentication tag
    pub tag: [u8; TAG_SIZE],
}

impl Envelope {
    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + 2 + self.sender_identity_id.len() + 8 + 1 + NONCE_SIZE + 4 + self.ciphertext.len() + TAG_SIZE
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `FieldTooLarge` if the sender id or ciphertext exceeds its limit
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        check_len("sender_identity_id", self.sender_identity_id.len(), MAX_SENDER_ID_LEN)?;
        check_len("ciphertext", self.ciphertext.len(), MAX_CIPHERTEXT_LEN)?;

        dst.put_u8(self.version.to_u8());
        dst.put_u16(self.sender_identity_id.len() as u16);
        dst.put_slice(self.sender_identity_id.as_bytes());
        dst.put_u64(self.counter);
        dst.put_u8(NONCE_SIZE as u8);
        dst.put_slice(&self.nonce);
        dst.put_u32(self.ciphertext.len() as u32);
        dst.put_slice(&self.ciphertext);
        dst.put_slice(&self.tag);
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a complete envelope.
    ///
    /// # Errors
    ///
    /// - `Empty` for zero-length input
    /// - `UnsupportedVersion` for an unknown leading byte
    /// - `Truncated`, `FieldTooLarge`, `InvalidNonceLength`, `InvalidUtf8` or
    ///   `TrailingBytes` for malformed input
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(&first) = bytes.first() else {
            return Err(ProtocolError::Empty);
        };
        let version = EnvelopeVersion::from_u8(first).ok_or(ProtocolError::UnsupportedVersion(first))?;

        let mut reader = Reader::new(&bytes[1..]);
        let sender_identity_id = reader.string16(MAX_SENDER_ID_LEN, "sender_identity_id")?;
        let counter = reader.u64("counter")?;

        let nonce_len = reader.u8("nonce_len")? as usize;
        if nonce_len != version.nonce_len() {
            return Err(ProtocolError::InvalidNonceLength { expected: version.nonce_len(), actual: nonce_len });
        }
        let nonce = reader.array::<NONCE_SIZE>("nonce")?;

        let ciphertext_len = reader.u32("ciphertext_len")? as usize;
        let ciphertext = Bytes::copy_from_slice(reader.bounded(ciphertext_len, MAX_CIPHERTEXT_LEN, "ciphertext")?);
        let tag = reader.array::<TAG_SIZE>("tag")?;
        reader.finish()?;

        Ok(Self { version, sender_identity_id, counter, nonce, ciphertext, tag })
    }

    /// Associated data binding this envelope to a conversation.
    pub fn associated_data(&self, conversation_id: &str) -> Vec<u8> {
        associated_data(self.version, conversation_id, &self.sender_identity_id, self.counter)
    }
}

/// Associated data for an envelope that has not been built yet:
/// `label || version || len16(conversation) || len16(sender) || counter`.
pub fn associated_data(
    version: EnvelopeVersion,
    conversation_id: &str,
    sender_identity_id: &str,
    counter: u64,
) -> Vec<u8> {
    let mut aad =
        Vec::with_capacity(AAD_LABEL.len() + 1 + 2 + conversation_id.len() + 2 + sender_identity_id.len() + 8);
    aad.put_slice(AAD_LABEL);
    aad.put_u8(version.to_u8());
    aad.put_u16(conversation_id.len() as u16);
    aad.put_slice(conversation_id.as_bytes());
    aad.put_u16(sender_identity_id.len() as u16);
    aad.put_slice(sender_identity_id.as_bytes());
    aad.put_u64(counter);
    aad
}
