//! Message encryption using ChaCha20-Poly1305
//!
//! Nonces are never random. Each one is built from the sender's direction
//! and its send counter, so uniqueness holds as long as the counter never
//! repeats under one key:
//!
//! ```text
//! bytes 0-3:  direction (1 = initiator, 2 = responder), big-endian
//! bytes 4-11: send counter, big-endian
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::Zeroize;

use crate::{error::CryptoError, session_key::SessionKey};

/// ChaCha20-Poly1305 nonce size (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Output of [`encrypt`]: everything the envelope needs besides the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Counter the nonce was built from
    pub counter: u64,
    /// The 12-byte nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// Detached Poly1305 tag
    pub tag: [u8; TAG_SIZE],
}

/// Encrypt `plaintext` under `key`, binding `aad` into the tag.
///
/// The nonce comes from [`SessionKey::next_send_counter`]; the counter is
/// advanced only after sealing succeeds. Callers that put the counter into
/// `aad` read it with `next_send_counter` first.
///
/// # Errors
///
/// - `SessionExhausted` once the send counter reaches `u64::MAX`
pub fn encrypt(key: &mut SessionKey, plaintext: &[u8], aad: &[u8]) -> Result<Sealed, CryptoError> {
    let counter = key.next_send_counter()?;
    let nonce = build_nonce(key.role().direction(), counter);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.key()));
    let mut buffer = plaintext.to_vec();
    let Ok(tag) = cipher.encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, &mut buffer)
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail below 256 GiB");
    };

    key.commit_send();

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    Ok(Sealed { counter, nonce, ciphertext: buffer, tag: tag_bytes })
}

/// Verify and decrypt a message from the peer.
///
/// Checks, in order: nonce and tag shape, the peer's direction prefix, the
/// replay window, then the tag. The window is updated only after the tag
/// verifies. Every failure is the same [`CryptoError::AuthenticationFailure`].
///
/// # Errors
///
/// - `AuthenticationFailure` on any rejection
pub fn decrypt(
    key: &mut SessionKey,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if tag.len() != TAG_SIZE {
        return Err(CryptoError::AuthenticationFailure);
    }
    let Some((direction, counter)) = split_nonce(nonce) else {
        return Err(CryptoError::AuthenticationFailure);
    };
    if direction != key.role().peer().direction() || !key.replay().check(counter) {
        return Err(CryptoError::AuthenticationFailure);
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.key()));
    let mut buffer = ciphertext.to_vec();
    if cipher
        .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer, Tag::from_slice(tag))
        .is_err()
    {
        buffer.zeroize();
        return Err(CryptoError::AuthenticationFailure);
    }

    key.replay_mut().commit(counter);
    Ok(buffer)
}

/// Counter encoded in a nonce, or `None` if the nonce is not 12 bytes.
pub fn counter_from_nonce(nonce: &[u8]) -> Option<u64> {
    split_nonce(nonce).map(|(_, counter)| counter)
}

fn build_nonce(direction: u32, counter: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[0..4].copy_from_slice(&direction.to_be_bytes());
    nonce[4..12].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn split_nonce(nonce: &[u8]) -> Option<(u32, u64)> {
    let nonce: &[u8; NONCE_SIZE] = nonce.try_into().ok()?;
    let (direction, counter) = nonce.split_at(4);
    let direction = u32::from_be_bytes(direction.try_into().ok()?);
    let counter = u64::from_be_bytes(counter.try_into().ok()?);
    Some((direction, counter))
}
