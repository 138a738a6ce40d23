//! Courier Wire Protocol
//!
//! Binary codecs for everything a Courier session puts on the wire. The
//! first byte of each packet is a closed tag:
//!
//! - `0x01`: [`Envelope`] version 1, one encrypted application message
//! - `0x41`: [`KeyExchangeMessage`] version 1, handshake and re-key traffic
//!
//! Any other leading byte decodes to [`ProtocolError::UnsupportedVersion`].
//!
//! # Security
//!
//! The codec is structural only. It bounds every length prefix before
//! touching the buffer and never allocates more than the packet it was
//! handed, but it does not authenticate anything. Envelopes are
//! authenticated when the session opens them; handshakes by the key
//! confirmation tag.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod errors;
pub mod handshake;
pub mod packet;
mod wire;

pub use envelope::{
    Envelope, EnvelopeVersion, MAX_CIPHERTEXT_LEN, MAX_SENDER_ID_LEN, NONCE_SIZE, TAG_SIZE,
    associated_data,
};
pub use errors::{ProtocolError, Result};
pub use handshake::{CONFIRMATION_SIZE, HANDSHAKE_V1, HandshakeKind, KEY_SIZE, KeyExchangeMessage, MAX_ID_LEN};
pub use packet::Packet;
