//! HKDF and HMAC derivations on top of the agreed shared secret

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    agreement::{PUBLIC_KEY_SIZE, PublicKey},
    error::CryptoError,
};

type HmacSha256 = Hmac<Sha256>;

/// Label for the per-conversation session key
const SESSION_KEY_LABEL: &[u8] = b"courier-session-key-v1";

/// Label for the handshake confirmation key
const CONFIRM_LABEL: &[u8] = b"courier-confirm-v1";

/// Label for the key that authenticates a Rekey under the current session key
const REKEY_LABEL: &[u8] = b"courier-rekey-auth-v1";

/// Size of a confirmation tag in bytes
pub const CONFIRMATION_SIZE: usize = 32;

/// Expand raw agreement output into a 32-byte session key bound to one
/// conversation.
pub(crate) fn derive_session_key_bytes(material: &[u8], conversation_id: &str) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(None, material);

    let mut info = Vec::with_capacity(SESSION_KEY_LABEL.len() + conversation_id.len());
    info.extend_from_slice(SESSION_KEY_LABEL);
    info.extend_from_slice(conversation_id.as_bytes());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&info, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key
}

fn mac_key(secret: &[u8], label: &[u8]) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(None, secret);
    let mut key = Zeroizing::new([0u8; 32]);
    let Ok(()) = hkdf.expand(label, key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key
}

fn mac(secret: &[u8], label: &[u8], transcript: &[u8]) -> HmacSha256 {
    let key = mac_key(secret, label);
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_slice()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(transcript);
    mac
}

/// Handshake transcript the confirmation tag covers:
/// `conversation_id || IK_A || IK_B || EK_A`, public keys ordered by role.
pub fn confirmation_transcript(
    conversation_id: &str,
    initiator_identity: &PublicKey,
    responder_identity: &PublicKey,
    initiator_ephemeral: &PublicKey,
) -> Vec<u8> {
    let mut transcript = Vec::with_capacity(conversation_id.len() + 3 * PUBLIC_KEY_SIZE);
    transcript.extend_from_slice(conversation_id.as_bytes());
    transcript.extend_from_slice(initiator_identity.as_bytes());
    transcript.extend_from_slice(responder_identity.as_bytes());
    transcript.extend_from_slice(initiator_ephemeral.as_bytes());
    transcript
}

/// Compute the responder's key confirmation tag.
pub fn confirmation_tag(shared: &[u8], transcript: &[u8]) -> [u8; CONFIRMATION_SIZE] {
    let result = mac(shared, CONFIRM_LABEL, transcript).finalize().into_bytes();

    let mut tag = [0u8; CONFIRMATION_SIZE];
    tag.copy_from_slice(&result);
    tag
}

/// Check a confirmation tag in constant time.
///
/// # Errors
///
/// - `AuthenticationFailure` if the tag does not match
pub fn verify_confirmation(shared: &[u8], transcript: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    mac(shared, CONFIRM_LABEL, transcript).verify_slice(tag).map_err(|_| CryptoError::AuthenticationFailure)
}

/// Transcript a Rekey tag covers:
/// `conversation_id || IK_sender || IK_receiver || EK_sender || timestamp`.
pub fn rekey_transcript(
    conversation_id: &str,
    sender_identity: &PublicKey,
    receiver_identity: &PublicKey,
    sender_ephemeral: &PublicKey,
    timestamp: u64,
) -> Vec<u8> {
    let mut transcript = confirmation_transcript(conversation_id, sender_identity, receiver_identity, sender_ephemeral);
    transcript.extend_from_slice(&timestamp.to_be_bytes());
    transcript
}

pub(crate) fn rekey_tag(session_key: &[u8], transcript: &[u8]) -> [u8; CONFIRMATION_SIZE] {
    let result = mac(session_key, REKEY_LABEL, transcript).finalize().into_bytes();

    let mut tag = [0u8; CONFIRMATION_SIZE];
    tag.copy_from_slice(&result);
    tag
}

pub(crate) fn verify_rekey_tag(session_key: &[u8], transcript: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    mac(session_key, REKEY_LABEL, transcript).verify_slice(tag).map_err(|_| CryptoError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (PublicKey, PublicKey, PublicKey) {
        (
            PublicKey::from_bytes([1; 32]),
            PublicKey::from_bytes([2; 32]),
            PublicKey::from_bytes([3; 32]),
        )
    }

    #[test]
    fn session_key_is_bound_to_conversation() {
        let material = [0x42u8; 32];
        let a = derive_session_key_bytes(&material, "c1");
        let b = derive_session_key_bytes(&material, "c2");

        assert_ne!(a, b);
        assert_eq!(a, derive_session_key_bytes(&material, "c1"));
    }

    #[test]
    fn confirmation_roundtrip() {
        let (ik_a, ik_b, ek_a) = keys();
        let transcript = confirmation_transcript("c1", &ik_a, &ik_b, &ek_a);
        let tag = confirmation_tag(&[9; 32], &transcript);

        assert!(verify_confirmation(&[9; 32], &transcript, &tag).is_ok());
    }

    #[test]
    fn confirmation_rejects_other_secret() {
        let (ik_a, ik_b, ek_a) = keys();
        let transcript = confirmation_transcript("c1", &ik_a, &ik_b, &ek_a);
        let tag = confirmation_tag(&[9; 32], &transcript);

        assert_eq!(
            verify_confirmation(&[8; 32], &transcript, &tag),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn confirmation_rejects_swapped_roles() {
        let (ik_a, ik_b, ek_a) = keys();
        let transcript = confirmation_transcript("c1", &ik_a, &ik_b, &ek_a);
        let swapped = confirmation_transcript("c1", &ik_b, &ik_a, &ek_a);
        let tag = confirmation_tag(&[9; 32], &transcript);

        assert!(verify_confirmation(&[9; 32], &swapped, &tag).is_err());
    }

    #[test]
    fn confirmation_rejects_truncated_tag() {
        let (ik_a, ik_b, ek_a) = keys();
        let transcript = confirmation_transcript("c1", &ik_a, &ik_b, &ek_a);
        let tag = confirmation_tag(&[9; 32], &transcript);

        assert!(verify_confirmation(&[9; 32], &transcript, &tag[..16]).is_err());
    }

    #[test]
    fn rekey_tag_is_bound_to_timestamp_and_label() {
        let (ik_a, ik_b, ek_a) = keys();
        let transcript = rekey_transcript("c1", &ik_a, &ik_b, &ek_a, 7);
        let tag = rekey_tag(&[9; 32], &transcript);

        assert!(verify_rekey_tag(&[9; 32], &transcript, &tag).is_ok());
        let later = rekey_transcript("c1", &ik_a, &ik_b, &ek_a, 8);
        assert!(verify_rekey_tag(&[9; 32], &later, &tag).is_err());

        // A confirmation over the same bytes is not a valid rekey tag.
        let confirmation = confirmation_tag(&[9; 32], &transcript);
        assert!(verify_rekey_tag(&[9; 32], &transcript, &confirmation).is_err());
    }
}
