//! Fuzz target for packet length-prefix boundary conditions
//!
//! Prevent memory exhaustion and panics via hostile length prefixes
//!
//! # Strategy
//!
//! - Leading byte: envelope tag, handshake tag, zero, random
//! - Sender length: zero, exact, off by one, u16::MAX
//! - Ciphertext length: zero, exact, at max, just over max, u32::MAX
//! - Nonce length: valid (12), zero, random
//! - Raw bytes: arbitrary input straight into the decoder
//!
//! # Invariants
//!
//! - Decode never panics
//! - A declared ciphertext length over 16 MiB is `FieldTooLarge`
//! - Unknown leading bytes are `UnsupportedVersion`, never a format error
//! - Anything that decodes re-encodes to the identical bytes

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use courier_proto::{HANDSHAKE_V1, MAX_CIPHERTEXT_LEN, Packet, ProtocolError};

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    Raw(Vec<u8>),
    Envelope(BoundaryEnvelope),
}

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryEnvelope {
    leading: LeadingByte,
    sender: Vec<u8>,
    sender_len: LengthMode16,
    counter: u64,
    nonce_len: NonceLen,
    ciphertext: Vec<u8>,
    ciphertext_len: LengthMode32,
    tail: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
enum LeadingByte {
    Envelope,
    Handshake,
    Zero,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum LengthMode16 {
    Exact,
    Zero,
    OffByOne,
    Max,
}

#[derive(Debug, Clone, Arbitrary)]
enum LengthMode32 {
    Exact,
    Zero,
    AtMax,
    JustOverMax,
    MaxU32,
    Random(u32),
}

#[derive(Debug, Clone, Arbitrary)]
enum NonceLen {
    Valid,
    Zero,
    Random(u8),
}

fn build(input: &BoundaryEnvelope) -> (Vec<u8>, u32) {
    let leading = match input.leading {
        LeadingByte::Envelope => 0x01,
        LeadingByte::Handshake => HANDSHAKE_V1,
        LeadingByte::Zero => 0x00,
        LeadingByte::Random(byte) => byte,
    };
    let sender = &input.sender[..input.sender.len().min(256)];
    let sender_len = match input.sender_len {
        LengthMode16::Exact => sender.len() as u16,
        LengthMode16::Zero => 0,
        LengthMode16::OffByOne => (sender.len() as u16).wrapping_add(1),
        LengthMode16::Max => u16::MAX,
    };
    let nonce_len = match input.nonce_len {
        NonceLen::Valid => 12,
        NonceLen::Zero => 0,
        NonceLen::Random(len) => len,
    };
    let ciphertext = &input.ciphertext[..input.ciphertext.len().min(4096)];
    let ciphertext_len = match input.ciphertext_len {
        LengthMode32::Exact => ciphertext.len() as u32,
        LengthMode32::Zero => 0,
        LengthMode32::AtMax => MAX_CIPHERTEXT_LEN as u32,
        LengthMode32::JustOverMax => MAX_CIPHERTEXT_LEN as u32 + 1,
        LengthMode32::MaxU32 => u32::MAX,
        LengthMode32::Random(len) => len,
    };

    let mut buffer = vec![leading];
    buffer.extend_from_slice(&sender_len.to_be_bytes());
    buffer.extend_from_slice(sender);
    buffer.extend_from_slice(&input.counter.to_be_bytes());
    buffer.push(nonce_len);
    buffer.extend_from_slice(&[0xAA; 12]);
    buffer.extend_from_slice(&ciphertext_len.to_be_bytes());
    buffer.extend_from_slice(ciphertext);
    buffer.extend_from_slice(&[0xBB; 16]);
    buffer.extend_from_slice(&input.tail[..input.tail.len().min(64)]);
    (buffer, ciphertext_len)
}

fn check(bytes: &[u8]) -> Result<Packet, ProtocolError> {
    let result = Packet::decode(bytes);
    if let Ok(packet) = &result {
        let encoded = packet.to_bytes().expect("decoded packet must re-encode");
        assert_eq!(encoded, bytes, "decode/encode must be lossless");
    }
    if let Some(&first) = bytes.first() {
        if first != 0x01 && first != HANDSHAKE_V1 {
            assert_eq!(result, Err(ProtocolError::UnsupportedVersion(first)));
        }
    }
    result
}

fuzz_target!(|input: Input| {
    match input {
        Input::Raw(bytes) => {
            let _ = check(&bytes);
        },
        Input::Envelope(envelope) => {
            let (bytes, ciphertext_len) = build(&envelope);
            let result = check(&bytes);

            let well_formed_prefix = bytes[0] == 0x01
                && matches!(envelope.sender_len, LengthMode16::Exact)
                && matches!(envelope.nonce_len, NonceLen::Valid)
                && std::str::from_utf8(&bytes[3..3 + envelope.sender.len().min(256)]).is_ok();
            if well_formed_prefix && ciphertext_len as usize > MAX_CIPHERTEXT_LEN {
                assert!(
                    matches!(result, Err(ProtocolError::FieldTooLarge { .. })),
                    "oversized ciphertext prefix must be rejected before reading: {result:?}"
                );
            }
        },
    }
});
