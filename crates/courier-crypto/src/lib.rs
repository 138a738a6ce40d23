//! Courier Cryptographic Primitives
//!
//! Pure building blocks for the Courier messaging core. Nothing in this
//! crate reads the clock or the system RNG: callers pass random seeds and
//! timestamps in, which keeps every operation deterministic under test.
//!
//! # Key Lifecycle
//!
//! ```text
//! Identity key (X25519)   Ephemeral key (X25519, one per handshake)
//!        │                         │
//!        └──────── DH x2 ──────────┘
//!                    │
//!                    ▼
//!        HKDF → Shared secret (bound to both identities + ephemeral)
//!                    │
//!                    ├──▶ HMAC confirmation tag (responder proves the key)
//!                    ▼
//!        HKDF → Session key (bound to the conversation id)
//!                    │
//!                    ▼
//!        ChaCha20-Poly1305, nonce = direction || counter
//! ```
//!
//! # Security
//!
//! Nonce uniqueness:
//! - Nonces are derived from a strictly increasing send counter, never drawn
//!   at random
//! - Initiator and responder use disjoint direction prefixes under one key
//! - The counter never wraps; `u64::MAX` reports [`CryptoError::SessionExhausted`]
//!
//! Replay protection:
//! - Every opened counter is committed to a [`ReplayWindow`]
//! - Replays, wrong directions and bad tags share one error,
//!   [`CryptoError::AuthenticationFailure`]
//!
//! Re-key authentication:
//! - A Rekey carries [`SessionKey::rekey_tag`], keyed from the session key
//!   it replaces, so only a holder of the live key can rotate it
//!
//! Key hygiene:
//! - Shared secrets, session keys and room keys are zeroized on drop
//! - `Debug` output never contains key bytes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod agreement;
pub mod cipher;
pub mod derivation;
pub mod error;
pub mod replay;
pub mod room;
pub mod session_key;

pub use agreement::{IdentityKeyPair, PUBLIC_KEY_SIZE, PublicKey, SharedSecret, initiate, respond};
pub use cipher::{NONCE_SIZE, Sealed, TAG_SIZE, counter_from_nonce, decrypt, encrypt};
pub use derivation::{
    CONFIRMATION_SIZE, confirmation_tag, confirmation_transcript, rekey_transcript, verify_confirmation,
};
pub use error::CryptoError;
pub use replay::{MAX_REPLAY_WINDOW, ReplayWindow};
pub use room::{DEFAULT_ROOM_LABEL, RoomKey, derive_room_key, open_room_message, seal_room_message};
pub use session_key::{KEY_SIZE, Role, SessionKey};
