//! Identity key store
//!
//! Owns every private key. Identity records live in the persistence
//! collaborator as CBOR under `identity/<id>`; callers only ever see the
//! public [`Identity`] view. Agreements run here, with the private key loaded
//! for the duration of one call, so secret bytes never cross the API.
//!
//! Operations on one identity are serialized by a per-identity lock.
//! Different identities proceed in parallel.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use courier_crypto::{IdentityKeyPair, PublicKey, Role, SessionKey, SharedSecret};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    env::Environment,
    error::KeyStoreError,
    storage::{SecureStorage, StorageError},
};

/// Storage key prefix for identity records
const IDENTITY_PREFIX: &str = "identity/";

/// Record format version
const RECORD_VERSION: u8 = 1;

/// Public view of a local or remote identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Hex fingerprint of the public key
    pub identity_id: String,
    /// X25519 identity public key
    pub public_key: PublicKey,
}

impl Identity {
    /// Identity for a public key received out of band (e.g. a contact card).
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self { identity_id: public_key.fingerprint(), public_key }
    }
}

/// Persisted identity. Secret bytes are zeroized when the record drops.
#[derive(Serialize, Deserialize)]
struct IdentityRecord {
    version: u8,
    public_key: Vec<u8>,
    secret_key: Vec<u8>,
    created_at: u64,
}

impl Drop for IdentityRecord {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

/// Generates, persists and uses identity key pairs.
pub struct KeyStore<S: SecureStorage, E: Environment> {
    storage: S,
    env: E,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: SecureStorage, E: Environment> KeyStore<S, E> {
    /// Key store over `storage`, drawing randomness and time from `env`.
    pub fn new(storage: S, env: E) -> Self {
        Self { storage, env, locks: Mutex::new(HashMap::new()) }
    }

    /// Environment this store draws randomness and time from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Persistence collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn identity_lock(&self, identity_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(identity_id.to_owned()).or_default())
    }

    /// Create and persist a fresh identity.
    ///
    /// # Errors
    ///
    /// - `Entropy` if the random source is unavailable
    /// - `Storage` if persisting fails
    pub fn generate_identity(&self) -> Result<Identity, KeyStoreError> {
        let seed = self.env.random_seed()?;
        let pair = IdentityKeyPair::from_seed(seed);
        let identity = Identity::from_public_key(pair.public_key());

        let record = IdentityRecord {
            version: RECORD_VERSION,
            public_key: identity.public_key.as_bytes().to_vec(),
            secret_key: pair.secret_bytes().to_vec(),
            created_at: self.env.wall_clock_secs(),
        };
        let mut encoded = Vec::new();
        ciborium::into_writer(&record, &mut encoded)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        let lock = self.identity_lock(&identity.identity_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = self.storage.put(&record_key(&identity.identity_id), &encoded);
        encoded.zeroize();
        stored?;

        tracing::info!(identity_id = %identity.identity_id, "generated identity");
        Ok(identity)
    }

    /// Public view of a stored identity.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no identity is stored under `identity_id`
    /// - `Corrupt` if the stored record is damaged
    pub fn get_identity(&self, identity_id: &str) -> Result<Identity, KeyStoreError> {
        let pair = self.load(identity_id)?;
        Ok(Identity { identity_id: identity_id.to_owned(), public_key: pair.public_key() })
    }

    /// Remove an identity (account reset).
    ///
    /// # Errors
    ///
    /// - `NotFound` if no identity is stored under `identity_id`
    pub fn delete_identity(&self, identity_id: &str) -> Result<(), KeyStoreError> {
        let lock = self.identity_lock(identity_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.storage.get(&record_key(identity_id))?.is_none() {
            return Err(KeyStoreError::NotFound { identity_id: identity_id.to_owned() });
        }
        self.storage.delete(&record_key(identity_id))?;

        tracing::info!(identity_id = %identity_id, "deleted identity");
        Ok(())
    }

    /// Wrap agreement output into a session key for `conversation_id`.
    ///
    /// `material` is zeroized. The key's creation time comes from the
    /// environment clock.
    pub fn derive_session_key(&self, material: &mut [u8], conversation_id: &str, role: Role) -> SessionKey {
        SessionKey::derive(material, conversation_id, role, self.env.wall_clock_secs())
    }

    /// Run the initiator side of a key agreement with a fresh ephemeral key.
    ///
    /// # Errors
    ///
    /// - `NotFound`/`Corrupt` for the local identity
    /// - `Entropy` if no ephemeral seed can be drawn
    /// - `Crypto(Agreement)` for a degenerate remote key
    pub fn initiate_agreement(
        &self,
        identity_id: &str,
        remote_identity: &PublicKey,
    ) -> Result<(PublicKey, SharedSecret), KeyStoreError> {
        let lock = self.identity_lock(identity_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let pair = self.load(identity_id)?;
        let seed = self.env.random_seed()?;
        Ok(courier_crypto::initiate(&pair, remote_identity, seed)?)
    }

    /// Run the responder side of a key agreement.
    ///
    /// # Errors
    ///
    /// - `NotFound`/`Corrupt` for the local identity
    /// - `Crypto(Agreement)` for a degenerate remote key
    pub fn respond_agreement(
        &self,
        identity_id: &str,
        remote_ephemeral: &PublicKey,
        remote_identity: &PublicKey,
    ) -> Result<SharedSecret, KeyStoreError> {
        let lock = self.identity_lock(identity_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let pair = self.load(identity_id)?;
        Ok(courier_crypto::respond(&pair, remote_ephemeral, remote_identity)?)
    }

    fn load(&self, identity_id: &str) -> Result<IdentityKeyPair, KeyStoreError> {
        let Some(mut encoded) = self.storage.get(&record_key(identity_id))? else {
            return Err(KeyStoreError::NotFound { identity_id: identity_id.to_owned() });
        };
        let decoded: Result<IdentityRecord, _> = ciborium::from_reader(encoded.as_slice());
        encoded.zeroize();

        let corrupt = |reason: String| KeyStoreError::Corrupt { identity_id: identity_id.to_owned(), reason };
        let record = decoded.map_err(|err| corrupt(err.to_string()))?;
        if record.version != RECORD_VERSION {
            return Err(corrupt(format!("unknown record version {}", record.version)));
        }

        let pair = IdentityKeyPair::from_secret_slice(&record.secret_key).map_err(|err| corrupt(err.to_string()))?;
        if pair.public_key().as_bytes().as_slice() != record.public_key.as_slice() {
            return Err(corrupt("public key does not match secret key".to_owned()));
        }
        if pair.public_key().fingerprint() != identity_id {
            return Err(corrupt("record stored under the wrong id".to_owned()));
        }
        Ok(pair)
    }
}

fn record_key(identity_id: &str) -> String {
    format!("{IDENTITY_PREFIX}{identity_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        env::test_utils::MockEnv,
        storage::{ChaoticStorage, MemoryStorage},
    };

    fn store() -> KeyStore<MemoryStorage, MockEnv> {
        KeyStore::new(MemoryStorage::new(), MockEnv::new(7))
    }

    #[test]
    fn generated_identity_round_trips() {
        let keystore = store();
        let identity = keystore.generate_identity().unwrap();

        assert_eq!(identity.identity_id, identity.public_key.fingerprint());
        assert_eq!(keystore.get_identity(&identity.identity_id).unwrap(), identity);
        assert!(keystore.storage().get(&record_key(&identity.identity_id)).unwrap().is_some());
    }

    #[test]
    fn missing_identity_is_not_found() {
        assert_eq!(
            store().get_identity("nobody"),
            Err(KeyStoreError::NotFound { identity_id: "nobody".to_owned() })
        );
    }

    #[test]
    fn delete_removes_identity() {
        let keystore = store();
        let identity = keystore.generate_identity().unwrap();

        keystore.delete_identity(&identity.identity_id).unwrap();
        assert!(matches!(keystore.get_identity(&identity.identity_id), Err(KeyStoreError::NotFound { .. })));
        assert!(matches!(keystore.delete_identity(&identity.identity_id), Err(KeyStoreError::NotFound { .. })));
    }

    #[test]
    fn entropy_failure_surfaces() {
        let env = MockEnv::new(1);
        let keystore = KeyStore::new(MemoryStorage::new(), env.clone());
        env.set_entropy_available(false);

        assert!(matches!(keystore.generate_identity(), Err(KeyStoreError::Entropy(_))));
        assert!(keystore.storage().is_empty());
    }

    #[test]
    fn storage_failure_surfaces() {
        let keystore = KeyStore::new(ChaoticStorage::new(MemoryStorage::new(), 1.0), MockEnv::new(1));
        assert!(matches!(keystore.generate_identity(), Err(KeyStoreError::Storage(StorageError::Io(_)))));
    }

    #[test]
    fn corrupt_record_is_detected() {
        let keystore = store();
        let identity = keystore.generate_identity().unwrap();
        keystore.storage().put(&record_key(&identity.identity_id), b"\xFFgarbage").unwrap();

        assert!(matches!(keystore.get_identity(&identity.identity_id), Err(KeyStoreError::Corrupt { .. })));
    }

    #[test]
    fn record_under_wrong_id_is_detected() {
        let keystore = store();
        let identity = keystore.generate_identity().unwrap();
        let bytes = keystore.storage().get(&record_key(&identity.identity_id)).unwrap().unwrap();
        keystore.storage().put(&record_key("other"), &bytes).unwrap();

        assert!(matches!(keystore.get_identity("other"), Err(KeyStoreError::Corrupt { .. })));
    }

    #[test]
    fn agreement_through_two_stores_matches() {
        let alice_store = store();
        let bob_store = KeyStore::new(MemoryStorage::new(), MockEnv::new(8));
        let alice = alice_store.generate_identity().unwrap();
        let bob = bob_store.generate_identity().unwrap();

        let (ephemeral, alice_secret) = alice_store.initiate_agreement(&alice.identity_id, &bob.public_key).unwrap();
        let bob_secret = bob_store.respond_agreement(&bob.identity_id, &ephemeral, &alice.public_key).unwrap();

        assert_eq!(alice_secret.as_bytes(), bob_secret.as_bytes());
    }

    #[test]
    fn degenerate_remote_key_is_rejected() {
        let keystore = store();
        let identity = keystore.generate_identity().unwrap();
        let zero = PublicKey::from_bytes([0; 32]);

        assert!(matches!(
            keystore.initiate_agreement(&identity.identity_id, &zero),
            Err(KeyStoreError::Crypto(courier_crypto::CryptoError::Agreement))
        ));
    }

    #[test]
    fn derive_session_key_zeroizes_material_and_stamps_clock() {
        let env = MockEnv::new(3);
        let keystore = KeyStore::new(MemoryStorage::new(), env.clone());
        env.set_time(1_234);

        let mut material = [5u8; 32];
        let key = keystore.derive_session_key(&mut material, "c1", Role::Initiator);

        assert_eq!(material, [0u8; 32]);
        assert_eq!(key.created_at(), 1_234);
        assert_eq!(key.conversation_id(), "c1");
    }

    #[test]
    fn private_key_never_appears_in_public_view() {
        let keystore = store();
        let identity = keystore.generate_identity().unwrap();
        let rendered = format!("{identity:?}");
        let bytes = keystore.storage().get(&record_key(&identity.identity_id)).unwrap().unwrap();
        let record: IdentityRecord = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert!(!rendered.contains(&hex_of(&record.secret_key)));
    }

    fn hex_of(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
