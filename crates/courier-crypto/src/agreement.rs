//! Mutually authenticated X25519 key agreement
//!
//! The initiator combines its identity key and a fresh ephemeral key with the
//! responder's identity key. The responder mirrors both products with its own
//! identity key, so the two sides arrive at the same pair of DH outputs:
//!
//! ```text
//! dh_static    = X25519(IK_A, IK_B)
//! dh_ephemeral = X25519(EK_A, IK_B)
//! shared       = HKDF(salt, dh_static || dh_ephemeral,
//!                     label || IK_A || IK_B || EK_A)
//! ```
//!
//! Public keys are placed in the HKDF info by role, not by who is computing,
//! which is what makes [`initiate`] and [`respond`] symmetric.

use std::fmt;

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

/// X25519 public key size in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of the agreed shared secret in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

/// HKDF salt for the agreement extract step
const AGREEMENT_SALT: &[u8] = b"courier-agreement-v1";

/// HKDF info label, followed by the three public keys
const AGREEMENT_LABEL: &[u8] = b"courier-x25519-sha256";

/// Number of SHA-256 bytes kept for an identity fingerprint
const FINGERPRINT_SIZE: usize = 16;

/// An X25519 public key.
///
/// Any 32-byte string is a valid Montgomery u-coordinate, so the only
/// structural check is the length. Low-order points are caught later when
/// the DH output turns out to be non-contributory.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a key from an arbitrary slice.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the slice is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKey {
            expected: PUBLIC_KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Lowercase hex of the full key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Stable identity id for this key: hex of the first 16 bytes of its
    /// SHA-256 digest.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..FINGERPRINT_SIZE])
    }

    fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", hex::encode(&self.0[..8]))
    }
}

/// Secret produced by a successful key agreement.
///
/// Zeroized on drop. Feed it to [`crate::SessionKey::derive`] and
/// [`crate::confirmation_tag`]; never store it.
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    /// Raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// A long-term X25519 identity key pair.
///
/// The secret half is zeroized on drop by `x25519-dalek`.
#[derive(Clone)]
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeyPair {
    /// Build a key pair from 32 random bytes. The seed is clamped by X25519
    /// and zeroized here.
    pub fn from_seed(mut seed: [u8; 32]) -> Self {
        let secret = StaticSecret::from(seed);
        seed.zeroize();
        let public = PublicKey(DalekPublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// Restore a key pair from stored secret bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the slice is not exactly 32 bytes
    pub fn from_secret_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKey {
            expected: PUBLIC_KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_seed(seed))
    }

    /// Public half.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Secret bytes for persistence. Wiped when the returned buffer drops.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    fn diffie_hellman(&self, remote: PublicKey) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        dh(&self.secret, remote)
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Start a key agreement as the initiator.
///
/// `ephemeral_seed` must be 32 fresh random bytes; it becomes the ephemeral
/// secret for this exchange only and is zeroized before returning.
///
/// Returns the ephemeral public key to transmit and the shared secret.
///
/// # Errors
///
/// - `Agreement` if either DH output is all-zero (low-order remote key)
pub fn initiate(
    local: &IdentityKeyPair,
    remote_identity: &PublicKey,
    mut ephemeral_seed: [u8; 32],
) -> Result<(PublicKey, SharedSecret), CryptoError> {
    let ephemeral = StaticSecret::from(ephemeral_seed);
    ephemeral_seed.zeroize();
    let ephemeral_public = PublicKey(DalekPublicKey::from(&ephemeral).to_bytes());

    let dh_static = local.diffie_hellman(*remote_identity)?;
    let dh_ephemeral = dh(&ephemeral, *remote_identity)?;

    let shared = combine(
        &dh_static,
        &dh_ephemeral,
        &local.public_key(),
        remote_identity,
        &ephemeral_public,
    );
    Ok((ephemeral_public, shared))
}

/// Complete a key agreement as the responder.
///
/// Derives the same secret as [`initiate`] when given the initiator's
/// ephemeral and identity public keys.
///
/// # Errors
///
/// - `Agreement` if either DH output is all-zero
pub fn respond(
    local: &IdentityKeyPair,
    remote_ephemeral: &PublicKey,
    remote_identity: &PublicKey,
) -> Result<SharedSecret, CryptoError> {
    let dh_static = local.diffie_hellman(*remote_identity)?;
    let dh_ephemeral = local.diffie_hellman(*remote_ephemeral)?;

    Ok(combine(
        &dh_static,
        &dh_ephemeral,
        remote_identity,
        &local.public_key(),
        remote_ephemeral,
    ))
}

fn dh(secret: &StaticSecret, remote: PublicKey) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let output = secret.diffie_hellman(&remote.to_dalek());
    if !output.was_contributory() {
        return Err(CryptoError::Agreement);
    }
    Ok(Zeroizing::new(output.to_bytes()))
}

fn combine(
    dh_static: &[u8; 32],
    dh_ephemeral: &[u8; 32],
    initiator_identity: &PublicKey,
    responder_identity: &PublicKey,
    initiator_ephemeral: &PublicKey,
) -> SharedSecret {
    let mut ikm = Zeroizing::new([0u8; 64]);
    ikm[..32].copy_from_slice(dh_static);
    ikm[32..].copy_from_slice(dh_ephemeral);

    // label || IK_A || IK_B || EK_A
    let mut info = Vec::with_capacity(AGREEMENT_LABEL.len() + 3 * PUBLIC_KEY_SIZE);
    info.extend_from_slice(AGREEMENT_LABEL);
    info.extend_from_slice(initiator_identity.as_bytes());
    info.extend_from_slice(responder_identity.as_bytes());
    info.extend_from_slice(initiator_ephemeral.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(AGREEMENT_SALT), ikm.as_slice());
    let mut okm = [0u8; SHARED_SECRET_SIZE];
    let Ok(()) = hkdf.expand(&info, &mut okm) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    SharedSecret(okm)
}
