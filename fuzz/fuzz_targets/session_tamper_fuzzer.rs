//! Fuzz target for tampered envelopes against a live session
//!
//! # Strategy
//!
//! - Establish Alice/Bob with a seeded environment
//! - Seal a fuzzer-chosen plaintext
//! - Apply bit flips, truncation, byte insertion or a full replacement
//!
//! # Invariants
//!
//! - Any packet that differs from the sealed one never yields a message
//! - A rejected packet leaves the session untouched: the genuine envelope
//!   still opens afterwards, exactly once
//! - Nothing panics

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use courier_core::{
    KeyStore, MemoryStorage, ReceiveOutcome, SessionConfig, SessionManager, env::test_utils::MockEnv,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    plaintext: Vec<u8>,
    mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Mutation {
    FlipBit { position: u16, bit: u8 },
    Truncate { len: u16 },
    Insert { position: u16, byte: u8 },
    Replace(Vec<u8>),
}

type Manager = SessionManager<MemoryStorage, MockEnv>;

fn party(seed: u64) -> Manager {
    let keystore = Arc::new(KeyStore::new(MemoryStorage::new(), MockEnv::new(seed)));
    let identity = keystore.generate_identity().expect("identity");
    SessionManager::new(keystore, &identity.identity_id, SessionConfig::default()).expect("manager")
}

fn apply(bytes: &mut Vec<u8>, mutation: &Mutation) {
    match mutation {
        Mutation::FlipBit { position, bit } => {
            if !bytes.is_empty() {
                let index = *position as usize % bytes.len();
                bytes[index] ^= 1 << (bit % 8);
            }
        },
        Mutation::Truncate { len } => bytes.truncate(*len as usize),
        Mutation::Insert { position, byte } => {
            let index = *position as usize % (bytes.len() + 1);
            bytes.insert(index, *byte);
        },
        Mutation::Replace(replacement) => *bytes = replacement.clone(),
    }
}

fuzz_target!(|scenario: Scenario| {
    let alice = party(scenario.seed);
    let bob = party(scenario.seed.wrapping_add(1));

    let init = alice.start_session("fuzz", bob.local_identity()).expect("init");
    let Ok(ReceiveOutcome::HandshakeReply { reply, .. }) = bob.receive(&init) else {
        panic!("handshake must succeed");
    };
    alice.receive(&reply).expect("response");

    let plaintext = &scenario.plaintext[..scenario.plaintext.len().min(4096)];
    let genuine = alice.send("fuzz", plaintext).expect("send").to_bytes().expect("encode");

    for mutation in scenario.mutations.iter().take(16) {
        let mut tampered = genuine.clone();
        apply(&mut tampered, mutation);
        if tampered == genuine {
            continue;
        }
        if let Ok(ReceiveOutcome::Message { .. }) = bob.receive(&tampered) {
            panic!("tampered envelope opened: {mutation:?}");
        }
    }

    match bob.receive(&genuine) {
        Ok(ReceiveOutcome::Message { plaintext: opened, .. }) => assert_eq!(opened, plaintext),
        other => panic!("genuine envelope must open after rejections: {other:?}"),
    }
    assert!(bob.receive(&genuine).is_err(), "replay must fail");
});
