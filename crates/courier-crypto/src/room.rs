//! Passphrase room keys for group chat
//!
//! Every member who knows the room name and passphrase derives the same key
//! with scrypt. Payloads are `base64(nonce || ciphertext || tag)` with a
//! random 12-byte nonce supplied by the caller.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{
    cipher::{NONCE_SIZE, TAG_SIZE},
    error::CryptoError,
};

/// Default associated data for room messages
pub const DEFAULT_ROOM_LABEL: &str = "chat-group-e2e-v1";

/// scrypt cost parameter, log2(N)
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Salt is the leading 16 bytes of SHA-256(room)
const SALT_SIZE: usize = 16;

/// Symmetric key shared by all members of a room. Zeroized on drop.
pub struct RoomKey([u8; 32]);

impl RoomKey {
    /// Wrap raw key bytes, e.g. from another client.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Drop for RoomKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey([REDACTED])")
    }
}

/// Derive the room key from the room name and passphrase.
///
/// Deliberately slow (scrypt, N = 2^14).
pub fn derive_room_key(room: &str, passphrase: &str) -> RoomKey {
    let digest = Sha256::digest(room.as_bytes());
    let salt = &digest[..SALT_SIZE];

    let Ok(params) = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32) else {
        unreachable!("fixed scrypt parameters are valid");
    };
    let mut key = [0u8; 32];
    let Ok(()) = scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut key) else {
        unreachable!("32 bytes is a valid scrypt output length");
    };

    RoomKey(key)
}

/// Seal a room message. `nonce` must be fresh random bytes.
pub fn seal_room_message(key: &RoomKey, plaintext: &[u8], nonce: [u8; NONCE_SIZE], aad: &[u8]) -> String {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail below 256 GiB");
    };

    let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    STANDARD.encode(raw)
}

/// Open a room message produced by [`seal_room_message`].
///
/// # Errors
///
/// - `AuthenticationFailure` for bad base64, short payloads or a bad tag
pub fn open_room_message(key: &RoomKey, payload: &str, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let raw = STANDARD.decode(payload.trim()).map_err(|_| CryptoError::AuthenticationFailure)?;
    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::AuthenticationFailure);
    }

    let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.0));
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailure)
}
