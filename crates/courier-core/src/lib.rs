//! Courier Core
//!
//! Key store, session manager and group rooms for an end-to-end encrypted
//! messenger. UI and transport code talk to [`SessionManager`] and
//! [`KeyStore`] only; everything else is plumbing between them.
//!
//! # Architecture
//!
//! ```text
//! KeyStore ──(identity keys)──> agreement ──> SessionManager
//!    │                                            │
//! SecureStorage                          CipherEngine + EnvelopeCodec
//! ```
//!
//! Randomness and wall-clock time come from an injected [`Environment`], so
//! every operation can be replayed deterministically under test with
//! `env::test_utils::MockEnv` (feature `test-utils`). Persistence goes
//! through [`SecureStorage`]; the core never touches disk or network itself.
//!
//! # Components
//!
//! - [`KeyStore`]: identity generation, persistence and key agreement
//! - [`SessionManager`]: per-conversation state machine, send and receive
//! - [`RoomChannel`]: passphrase-keyed group rooms
//! - [`SessionConfig`]: replay window, re-key policy, trust policy

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod ids;
pub mod keystore;
pub mod room;
pub mod session;
pub mod storage;

pub use config::{ConfigError, RoomConfig, SessionConfig};
pub use courier_crypto::{PublicKey, Role};
pub use courier_proto::{Envelope, HandshakeKind};
pub use env::{Environment, SystemEnv};
pub use error::{EntropyError, KeyStoreError, SessionError};
pub use ids::{IdentifierError, MAX_IDENTIFIER_LEN, validate_identifier};
pub use keystore::{Identity, KeyStore};
pub use room::RoomChannel;
pub use session::{ReceiveOutcome, SessionManager, SessionPhase};
pub use storage::{ChaoticStorage, MemoryStorage, SecureStorage, StorageError};
