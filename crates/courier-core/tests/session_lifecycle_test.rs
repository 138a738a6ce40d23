//! Session lifecycle: re-keying, policy, freshness, trust, reordering and
//! concurrency.

use std::{collections::HashSet, sync::Arc, thread, time::Duration};

use courier_core::{
    HandshakeKind, KeyStore, KeyStoreError, MemoryStorage, ReceiveOutcome, SessionConfig, SessionError,
    SessionManager, SessionPhase,
    env::test_utils::{MOCK_EPOCH_SECS, MockEnv},
};
use courier_proto::{CONFIRMATION_SIZE, KeyExchangeMessage};

type Manager = SessionManager<MemoryStorage, MockEnv>;

fn party(seed: u64, config: SessionConfig) -> (Manager, MockEnv) {
    let env = MockEnv::new(seed);
    let keystore = Arc::new(KeyStore::new(MemoryStorage::new(), env.clone()));
    let identity = keystore.generate_identity().expect("generate identity");
    let manager = SessionManager::new(keystore, &identity.identity_id, config).expect("create manager");
    (manager, env)
}

fn answer(responder: &Manager, packet: &[u8]) -> Vec<u8> {
    match responder.receive(packet).expect("receive handshake") {
        ReceiveOutcome::HandshakeReply { reply, .. } => reply,
        other => panic!("expected handshake reply, got {other:?}"),
    }
}

fn establish(initiator: &Manager, responder: &Manager, conversation_id: &str) {
    let init = initiator.start_session(conversation_id, responder.local_identity()).expect("start session");
    let reply = answer(responder, &init);
    initiator.receive(&reply).expect("complete handshake");
}

fn open(receiver: &Manager, packet: &[u8]) -> Vec<u8> {
    match receiver.receive(packet).expect("open envelope") {
        ReceiveOutcome::Message { plaintext, .. } => plaintext,
        other => panic!("expected message, got {other:?}"),
    }
}

fn sealed(sender: &Manager, conversation_id: &str, plaintext: &[u8]) -> Vec<u8> {
    sender.send(conversation_id, plaintext).expect("send").to_bytes().expect("encode")
}

#[test]
fn rekey_keeps_in_flight_envelope_readable() {
    let (alice, _) = party(1, SessionConfig::default());
    let (bob, _) = party(2, SessionConfig::default());
    establish(&alice, &bob, "c1");

    let in_flight = sealed(&alice, "c1", b"sent before rekey");

    let rekey = alice.rekey("c1").expect("start rekey");
    assert_eq!(alice.state("c1"), SessionPhase::Rekeying);
    let reply = answer(&bob, &rekey);
    assert_eq!(
        alice.receive(&reply).expect("complete rekey"),
        ReceiveOutcome::Established { conversation_id: "c1".to_owned() }
    );

    // Both directions under the new key
    assert_eq!(open(&bob, &sealed(&alice, "c1", b"new key")), b"new key");
    assert_eq!(open(&alice, &sealed(&bob, "c1", b"new key back")), b"new key back");

    // Oracle: the old envelope opens exactly once, under the retained key
    assert_eq!(open(&bob, &in_flight), b"sent before rekey");
    assert_eq!(bob.receive(&in_flight), Err(SessionError::AuthenticationFailure));
}

#[test]
fn either_side_may_rekey() {
    let (alice, _) = party(3, SessionConfig::default());
    let (bob, _) = party(4, SessionConfig::default());
    establish(&alice, &bob, "c1");

    let rekey = bob.rekey("c1").expect("bob rekeys");
    let reply = answer(&alice, &rekey);
    bob.receive(&reply).expect("complete rekey");

    assert_eq!(open(&alice, &sealed(&bob, "c1", b"from bob")), b"from bob");
    assert_eq!(open(&bob, &sealed(&alice, "c1", b"from alice")), b"from alice");
}

#[test]
fn old_key_still_receives_while_rekeying() {
    let (alice, _) = party(5, SessionConfig::default());
    let (bob, _) = party(6, SessionConfig::default());
    establish(&alice, &bob, "c1");

    alice.rekey("c1").expect("start rekey");
    assert!(matches!(
        alice.send("c1", b"blocked"),
        Err(SessionError::SessionNotReady { phase: SessionPhase::Rekeying, .. })
    ));
    assert_eq!(open(&alice, &sealed(&bob, "c1", b"still old key")), b"still old key");
}

#[test]
fn message_policy_forces_rekey() {
    let config = SessionConfig { rekey_after_messages: 3, ..SessionConfig::default() };
    let (alice, _) = party(7, config.clone());
    let (bob, _) = party(8, config);
    establish(&alice, &bob, "c1");

    for i in 0..3u8 {
        alice.send("c1", &[i]).expect("send within policy");
    }

    // Oracle: the (n+1)-th send fails and leaves the session Rekeying
    assert_eq!(
        alice.send("c1", b"one too many"),
        Err(SessionError::SessionExhausted { conversation_id: "c1".to_owned() })
    );
    assert_eq!(alice.state("c1"), SessionPhase::Rekeying);

    let rekey = alice.rekey("c1").expect("rekey after exhaustion");
    let reply = answer(&bob, &rekey);
    alice.receive(&reply).expect("complete rekey");

    assert_eq!(alice.state("c1"), SessionPhase::Established);
    assert_eq!(open(&bob, &sealed(&alice, "c1", b"fresh")), b"fresh");
}

#[test]
fn exhausted_peer_accepts_rekey() {
    let config = SessionConfig { rekey_after_messages: 1, ..SessionConfig::default() };
    let (alice, _) = party(9, config.clone());
    let (bob, _) = party(10, config);
    establish(&alice, &bob, "c1");

    bob.send("c1", b"only one").expect("send");
    assert!(matches!(bob.send("c1", b"two"), Err(SessionError::SessionExhausted { .. })));

    // Alice starts the rekey; Bob is Rekeying with nothing pending.
    let rekey = alice.rekey("c1").expect("rekey");
    let reply = answer(&bob, &rekey);
    alice.receive(&reply).expect("complete rekey");

    assert_eq!(bob.state("c1"), SessionPhase::Established);
    assert_eq!(open(&alice, &sealed(&bob, "c1", b"two")), b"two");
}

#[test]
fn forged_rekey_leaves_session_intact() {
    let (alice, _) = party(32, SessionConfig::default());
    let (bob, _) = party(33, SessionConfig::default());
    establish(&alice, &bob, "c1");

    // Everything here is public: Alice's id and identity key, the
    // conversation id and the clock.
    let forged = KeyExchangeMessage {
        kind: HandshakeKind::Rekey,
        conversation_id: "c1".to_owned(),
        sender_identity_id: alice.local_identity().identity_id.clone(),
        identity_key: *alice.local_identity().public_key.as_bytes(),
        ephemeral_key: [9; 32],
        timestamp: MOCK_EPOCH_SECS,
        confirmation: Some([0; CONFIRMATION_SIZE]),
    };
    for _ in 0..2 {
        assert_eq!(
            bob.receive(&forged.to_bytes().expect("encode")),
            Err(SessionError::AuthenticationFailure)
        );
    }

    // Oracle: Bob still seals under the key Alice holds
    assert_eq!(bob.state("c1"), SessionPhase::Established);
    assert_eq!(open(&alice, &sealed(&bob, "c1", b"unchanged")), b"unchanged");
    assert_eq!(open(&bob, &sealed(&alice, "c1", b"both ways")), b"both ways");
}

#[test]
fn simultaneous_rekey_converges() {
    let (alice, _) = party(34, SessionConfig::default());
    let (bob, _) = party(35, SessionConfig::default());
    establish(&alice, &bob, "c1");
    let (small, large) = if alice.local_identity().identity_id < bob.local_identity().identity_id {
        (&alice, &bob)
    } else {
        (&bob, &alice)
    };

    let small_rekey = small.rekey("c1").expect("small rekeys");
    let large_rekey = large.rekey("c1").expect("large rekeys");

    assert_eq!(
        small.receive(&large_rekey).expect("small sees large rekey"),
        ReceiveOutcome::Ignored { conversation_id: "c1".to_owned() }
    );
    let reply = answer(large, &small_rekey);
    small.receive(&reply).expect("small completes");

    assert_eq!(open(large, &sealed(small, "c1", b"ping")), b"ping");
    assert_eq!(open(small, &sealed(large, "c1", b"pong")), b"pong");
}

#[test]
fn rekey_racing_a_completed_exchange_is_ignored() {
    let (alice, _) = party(36, SessionConfig::default());
    let (bob, _) = party(37, SessionConfig::default());
    establish(&alice, &bob, "c1");
    let (small, large) = if alice.local_identity().identity_id < bob.local_identity().identity_id {
        (&alice, &bob)
    } else {
        (&bob, &alice)
    };

    let small_rekey = small.rekey("c1").expect("small rekeys");
    let large_rekey = large.rekey("c1").expect("large rekeys");

    // Large answers first; its own Rekey reaches small only after small
    // has finished the exchange.
    let reply = answer(large, &small_rekey);
    assert_eq!(
        small.receive(&reply).expect("small completes"),
        ReceiveOutcome::Established { conversation_id: "c1".to_owned() }
    );
    assert_eq!(
        small.receive(&large_rekey).expect("late rekey"),
        ReceiveOutcome::Ignored { conversation_id: "c1".to_owned() }
    );

    // Oracle: both sides hold the same new key
    assert_eq!(small.state("c1"), SessionPhase::Established);
    assert_eq!(large.state("c1"), SessionPhase::Established);
    assert_eq!(open(large, &sealed(small, "c1", b"ping")), b"ping");
    assert_eq!(open(small, &sealed(large, "c1", b"pong")), b"pong");
}

#[test]
fn replayed_rekey_exchange_changes_nothing() {
    let (alice, _) = party(38, SessionConfig::default());
    let (bob, _) = party(39, SessionConfig::default());
    establish(&alice, &bob, "c1");

    let rekey = alice.rekey("c1").expect("start rekey");
    let reply = answer(&bob, &rekey);
    alice.receive(&reply).expect("complete rekey");

    assert_eq!(
        bob.receive(&rekey).expect("replayed rekey"),
        ReceiveOutcome::Ignored { conversation_id: "c1".to_owned() }
    );
    assert!(matches!(alice.receive(&reply), Err(SessionError::StaleHandshake { .. })));

    assert_eq!(open(&bob, &sealed(&alice, "c1", b"after replay")), b"after replay");
    assert_eq!(open(&alice, &sealed(&bob, "c1", b"and back")), b"and back");
}

#[test]
fn replayed_handshakes_are_stale() {
    let (alice, _) = party(11, SessionConfig::default());
    let (bob, _) = party(12, SessionConfig::default());

    let init = alice.start_session("c1", bob.local_identity()).expect("start session");
    let reply = answer(&bob, &init);
    alice.receive(&reply).expect("complete handshake");

    assert!(matches!(bob.receive(&init), Err(SessionError::StaleHandshake { .. })));
    assert!(matches!(alice.receive(&reply), Err(SessionError::StaleHandshake { .. })));

    // Still stale after the conversation is torn down
    bob.close("c1").expect("close");
    assert!(matches!(bob.receive(&init), Err(SessionError::StaleHandshake { .. })));
}

#[test]
fn handshakes_outside_age_bound_are_stale() {
    let (alice, alice_env) = party(13, SessionConfig::default());
    let (bob, bob_env) = party(14, SessionConfig::default());

    let init = alice.start_session("c1", bob.local_identity()).expect("start session");
    bob_env.advance(Duration::from_secs(10 * 60));
    assert!(matches!(bob.receive(&init), Err(SessionError::StaleHandshake { .. })));
    assert_eq!(bob.state("c1"), SessionPhase::Uninitialized);

    // From the future
    alice.close("c1").expect("close");
    alice_env.advance(Duration::from_secs(60 * 60));
    let early = alice.start_session("c1", bob.local_identity()).expect("restart session");
    assert!(matches!(bob.receive(&early), Err(SessionError::StaleHandshake { .. })));
}

#[test]
fn simultaneous_open_converges() {
    let (alice, _) = party(15, SessionConfig::default());
    let (bob, _) = party(16, SessionConfig::default());

    let alice_init = alice.start_session("c1", bob.local_identity()).expect("alice starts");
    let bob_init = bob.start_session("c1", alice.local_identity()).expect("bob starts");

    let (winner, loser, winner_init, loser_init) =
        if alice.local_identity().identity_id < bob.local_identity().identity_id {
            (&alice, &bob, alice_init, bob_init)
        } else {
            (&bob, &alice, bob_init, alice_init)
        };

    assert_eq!(
        winner.receive(&loser_init).expect("winner sees loser init"),
        ReceiveOutcome::Ignored { conversation_id: "c1".to_owned() }
    );
    let reply = answer(loser, &winner_init);
    winner.receive(&reply).expect("winner completes");

    assert_eq!(winner.state("c1"), SessionPhase::Established);
    assert_eq!(loser.state("c1"), SessionPhase::Established);
    assert_eq!(open(loser, &sealed(winner, "c1", b"ping")), b"ping");
    assert_eq!(open(winner, &sealed(loser, "c1", b"pong")), b"pong");
}

#[test]
fn out_of_order_delivery_with_window() {
    let config = SessionConfig { replay_window: 16, ..SessionConfig::default() };
    let (alice, _) = party(17, config.clone());
    let (bob, _) = party(18, config);
    establish(&alice, &bob, "c1");

    let packets: Vec<Vec<u8>> = (0..3u8).map(|i| sealed(&alice, "c1", &[i])).collect();

    assert_eq!(open(&bob, &packets[2]), [2u8]);
    assert_eq!(open(&bob, &packets[0]), [0u8]);
    assert_eq!(open(&bob, &packets[1]), [1u8]);

    // Oracle: each counter inside the window opens exactly once
    for packet in &packets {
        assert_eq!(bob.receive(packet), Err(SessionError::AuthenticationFailure));
    }
}

#[test]
fn strict_window_rejects_reordering() {
    let (alice, _) = party(19, SessionConfig::default());
    let (bob, _) = party(20, SessionConfig::default());
    establish(&alice, &bob, "c1");

    let first = sealed(&alice, "c1", b"first");
    let second = sealed(&alice, "c1", b"second");

    assert_eq!(open(&bob, &second), b"second");
    assert_eq!(bob.receive(&first), Err(SessionError::AuthenticationFailure));
}

#[test]
fn pinned_identity_cannot_be_impersonated() {
    let (alice, _) = party(21, SessionConfig::default());
    let (bob, _) = party(22, SessionConfig::default());
    let (mallory, _) = party(23, SessionConfig::default());
    establish(&alice, &bob, "c1");

    // Mallory claims Alice's id with her own key.
    let init = mallory.start_session("c2", bob.local_identity()).expect("mallory starts");
    let mut forged = KeyExchangeMessage::decode(&init).expect("decode");
    forged.sender_identity_id = alice.local_identity().identity_id.clone();
    assert!(matches!(
        bob.receive(&forged.to_bytes().expect("encode")),
        Err(SessionError::UntrustedPeer { .. })
    ));

    // Mallory under her own id cannot take over Alice's conversation.
    let hijack = mallory.start_session("c1", bob.local_identity()).expect("mallory starts c1");
    assert!(matches!(bob.receive(&hijack), Err(SessionError::UntrustedPeer { .. })));
    assert_eq!(open(&bob, &sealed(&alice, "c1", b"still alice")), b"still alice");
}

#[test]
fn entropy_failure_is_fatal_and_leaves_state_untouched() {
    let (alice, alice_env) = party(24, SessionConfig::default());
    let (bob, _) = party(25, SessionConfig::default());

    alice_env.set_entropy_available(false);
    let err = alice.start_session("c1", bob.local_identity()).expect_err("no entropy");
    assert!(matches!(err, SessionError::Entropy(_)));
    assert!(err.is_fatal());
    assert_eq!(alice.state("c1"), SessionPhase::Uninitialized);

    let keystore = KeyStore::new(MemoryStorage::new(), alice_env.clone());
    assert!(matches!(keystore.generate_identity(), Err(KeyStoreError::Entropy(_))));

    alice_env.set_entropy_available(true);
    establish(&alice, &bob, "c1");
}

#[test]
fn restart_after_close() {
    let (alice, _) = party(26, SessionConfig::default());
    let (bob, _) = party(27, SessionConfig::default());
    establish(&alice, &bob, "c1");

    alice.close("c1").expect("alice closes");
    bob.close("c1").expect("bob closes");
    assert!(matches!(
        alice.rekey("c1"),
        Err(SessionError::SessionNotReady { phase: SessionPhase::Closed, .. })
    ));

    establish(&alice, &bob, "c1");
    assert_eq!(open(&bob, &sealed(&alice, "c1", b"again")), b"again");
}

#[test]
fn parallel_sends_on_distinct_conversations() {
    let (alice, _) = party(28, SessionConfig::default());
    let (bob, _) = party(29, SessionConfig::default());
    let conversations: Vec<String> = (0..8).map(|i| format!("conv-{i}")).collect();
    for conversation_id in &conversations {
        establish(&alice, &bob, conversation_id);
    }

    let alice = Arc::new(alice);
    thread::scope(|scope| {
        for conversation_id in &conversations {
            let alice = Arc::clone(&alice);
            scope.spawn(move || {
                for i in 0..50u32 {
                    alice.send(conversation_id, &i.to_be_bytes()).expect("parallel send");
                }
            });
        }
    });
}

#[test]
fn parallel_sends_on_one_conversation_never_repeat_a_counter() {
    let (alice, _) = party(30, SessionConfig::default());
    let (bob, _) = party(31, SessionConfig::default());
    establish(&alice, &bob, "c1");

    let envelopes = thread::scope(|scope| {
        let handles: Vec<_> = (0..4u8)
            .map(|worker| {
                let alice = &alice;
                scope.spawn(move || {
                    (0..50u8).map(|i| alice.send("c1", &[worker, i]).expect("send")).collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|handle| handle.join().expect("worker panicked")).collect::<Vec<_>>()
    });

    // Oracle: every counter (and so every nonce) is distinct
    let counters: HashSet<u64> = envelopes.iter().map(|envelope| envelope.counter).collect();
    assert_eq!(counters.len(), envelopes.len());
    let nonces: HashSet<[u8; 12]> = envelopes.iter().map(|envelope| envelope.nonce).collect();
    assert_eq!(nonces.len(), envelopes.len());

    // In counter order every envelope opens under the strict window.
    let mut ordered = envelopes;
    ordered.sort_by_key(|envelope| envelope.counter);
    for envelope in ordered {
        open(&bob, &envelope.to_bytes().expect("encode"));
    }
}
