//! Fuzz target for the key store under storage faults
//!
//! # Strategy
//!
//! - Random sequence of generate/get/delete/agree operations
//! - Storage fails a fuzzer-chosen fraction of calls
//! - Entropy toggles on and off
//!
//! # Invariants
//!
//! - Failures are structured errors, never panics
//! - An identity reported as generated reads back with the same public key
//!   whenever storage lets the read through
//! - A failed generation never leaves a readable identity behind

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use courier_core::{
    ChaoticStorage, KeyStore, KeyStoreError, MemoryStorage, PublicKey, StorageError,
    env::test_utils::MockEnv,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    failure_percent: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Generate,
    Get { index: u8 },
    Delete { index: u8 },
    Agree { local: u8, remote: u8 },
    ToggleEntropy,
}

fuzz_target!(|scenario: Scenario| {
    let env = MockEnv::new(scenario.seed);
    let backing = MemoryStorage::new();
    let rate = f64::from(scenario.failure_percent % 101) / 100.0;
    let storage = ChaoticStorage::with_seed(backing.clone(), rate, scenario.seed);
    let keystore = KeyStore::new(storage, env.clone());

    let mut known: Vec<(String, PublicKey)> = Vec::new();
    let mut deleted: HashSet<String> = HashSet::new();
    let mut entropy = true;

    for operation in scenario.operations.iter().take(64) {
        match operation {
            Operation::Generate => match keystore.generate_identity() {
                Ok(identity) => known.push((identity.identity_id, identity.public_key)),
                Err(KeyStoreError::Entropy(_)) => assert!(!entropy),
                Err(KeyStoreError::Storage(StorageError::Io(_))) => {},
                Err(other) => panic!("unexpected generate error: {other:?}"),
            },
            Operation::Get { index } => {
                let Some((id, public_key)) = pick(&known, *index) else { continue };
                match keystore.get_identity(id) {
                    Ok(identity) => assert_eq!(&identity.public_key, public_key),
                    Err(KeyStoreError::NotFound { .. }) => assert!(deleted.contains(id)),
                    Err(KeyStoreError::Storage(_)) => {},
                    Err(other) => panic!("unexpected get error: {other:?}"),
                }
            },
            Operation::Delete { index } => {
                let Some((id, _)) = pick(&known, *index) else { continue };
                let id = id.clone();
                match keystore.delete_identity(&id) {
                    Ok(()) => {
                        deleted.insert(id);
                    },
                    Err(KeyStoreError::NotFound { .. }) => assert!(deleted.contains(&id)),
                    Err(KeyStoreError::Storage(_)) => {},
                    Err(other) => panic!("unexpected delete error: {other:?}"),
                }
            },
            Operation::Agree { local, remote } => {
                let (Some((id, _)), Some((_, remote_key))) = (pick(&known, *local), pick(&known, *remote)) else {
                    continue;
                };
                let _ = keystore.initiate_agreement(id, remote_key);
            },
            Operation::ToggleEntropy => {
                entropy = !entropy;
                env.set_entropy_available(entropy);
            },
        }
    }

    // Everything that was generated and never deleted is intact in the
    // backing store.
    let clean = KeyStore::new(backing, env);
    for (id, public_key) in &known {
        if deleted.contains(id) {
            continue;
        }
        let identity = clean.get_identity(id).expect("generated identity must persist");
        assert_eq!(&identity.public_key, public_key);
    }
});

fn pick(known: &[(String, PublicKey)], index: u8) -> Option<&(String, PublicKey)> {
    if known.is_empty() {
        None
    } else {
        known.get(index as usize % known.len())
    }
}
