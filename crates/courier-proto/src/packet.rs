//! Closed dispatch over the leading byte of a transmitted packet

use bytes::BufMut;

use crate::{
    envelope::{Envelope, EnvelopeVersion},
    errors::{ProtocolError, Result},
    handshake::{HANDSHAKE_V1, KeyExchangeMessage},
};

/// Anything a session can receive from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Encrypted application message
    Envelope(Envelope),
    /// Session establishment or re-key message
    Handshake(KeyExchangeMessage),
}

impl Packet {
    /// Decode by leading byte. Unknown bytes are `UnsupportedVersion`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(&first) = bytes.first() else {
            return Err(ProtocolError::Empty);
        };

        if EnvelopeVersion::from_u8(first).is_some() {
            return Envelope::decode(bytes).map(Self::Envelope);
        }
        match first {
            HANDSHAKE_V1 => KeyExchangeMessage::decode(bytes).map(Self::Handshake),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }

    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::Envelope(envelope) => envelope.encode(dst),
            Self::Handshake(message) => message.encode(dst),
        }
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Envelope(envelope) => envelope.to_bytes(),
            Self::Handshake(message) => message.to_bytes(),
        }
    }
}

impl From<Envelope> for Packet {
    fn from(envelope: Envelope) -> Self {
        Self::Envelope(envelope)
    }
}

impl From<KeyExchangeMessage> for Packet {
    fn from(message: KeyExchangeMessage) -> Self {
        Self::Handshake(message)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::handshake::HandshakeKind;

    #[test]
    fn dispatches_on_leading_byte() {
        let envelope = Envelope {
            version: EnvelopeVersion::V1,
            sender_identity_id: "bob".to_owned(),
            counter: 0,
            nonce: [0; 12],
            ciphertext: Bytes::new(),
            tag: [0; 16],
        };
        let handshake = KeyExchangeMessage {
            kind: HandshakeKind::Rekey,
            conversation_id: "c1".to_owned(),
            sender_identity_id: "bob".to_owned(),
            identity_key: [3; 32],
            ephemeral_key: [4; 32],
            timestamp: 5,
            confirmation: Some([6; 32]),
        };

        let decoded = Packet::decode(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, Packet::Envelope(envelope));

        let decoded = Packet::decode(&handshake.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, Packet::Handshake(handshake));
    }

    #[test]
    fn unknown_leading_byte_is_unsupported_version() {
        for byte in [0x00, 0x02, 0x40, 0x42, 0xFF] {
            assert_eq!(Packet::decode(&[byte, 0, 0]), Err(ProtocolError::UnsupportedVersion(byte)));
        }
    }

    #[test]
    fn empty_input() {
        assert_eq!(Packet::decode(&[]), Err(ProtocolError::Empty));
    }
}
