//! Session manager: the single entry point for UI and transport code.
//!
//! The manager owns every conversation's state and key material. Callers hand
//! it plaintext and get back envelopes to transmit, and hand it received
//! bytes and get back a [`ReceiveOutcome`].
//!
//! # Locking
//!
//! Each conversation sits behind its own mutex, so `send`/`receive` on one
//! conversation are serialized while different conversations run in
//! parallel. The conversation map, the sender routing index and the pinned
//! peer table are behind read/write locks that are only held to look up or
//! insert entries, never across a conversation lock acquisition. The first
//! operation on a new conversation id runs under the map's write lock and
//! only records the conversation if it succeeds, so rejected handshakes
//! leave nothing behind.
//!
//! # Re-key authentication
//!
//! A Rekey is tagged under the session key it replaces. A Rekey whose tag
//! only verifies under the previous key raced an exchange that already
//! completed and is ignored; any other bad tag is an authentication failure
//! and leaves the session as it was.
//!
//! # Logging
//!
//! Phase changes are logged at `info`, per-message counters at `debug`,
//! rejected packets at `warn`. Key material and plaintext never reach a log
//! line.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bytes::Bytes;
use courier_crypto::{
    PublicKey, Role, SessionKey, SharedSecret, confirmation_tag, confirmation_transcript, counter_from_nonce,
    rekey_transcript, verify_confirmation,
};
use courier_proto::{
    CONFIRMATION_SIZE, Envelope, EnvelopeVersion, HandshakeKind, KeyExchangeMessage, Packet, associated_data,
};

use super::{
    ReceiveOutcome, SessionPhase,
    state::{ActiveKeys, Conversation, LastHandshake, Pending, State},
};
use crate::{
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    ids::validate_identifier,
    keystore::{Identity, KeyStore},
    storage::SecureStorage,
};

type Slot = Arc<Mutex<Conversation>>;

/// Tracks every conversation of one local identity.
///
/// Shared between threads via `Arc`; all methods take `&self`.
pub struct SessionManager<S: SecureStorage, E: Environment> {
    keystore: Arc<KeyStore<S, E>>,
    local: Identity,
    config: SessionConfig,
    conversations: RwLock<HashMap<String, Slot>>,
    /// Peer identity id -> conversations keyed with that peer
    routes: RwLock<HashMap<String, BTreeSet<String>>>,
    /// Pinned identity keys by identity id
    trusted: RwLock<HashMap<String, PublicKey>>,
}

impl<S: SecureStorage, E: Environment> SessionManager<S, E> {
    /// Manager for the stored identity `local_identity_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config` fails validation
    /// - `KeyStore(NotFound)` if the identity is not in the store
    pub fn new(
        keystore: Arc<KeyStore<S, E>>,
        local_identity_id: &str,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let local = keystore.get_identity(local_identity_id)?;

        Ok(Self {
            keystore,
            local,
            config,
            conversations: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
            trusted: RwLock::new(HashMap::new()),
        })
    }

    /// Identity this manager speaks for.
    pub fn local_identity(&self) -> &Identity {
        &self.local
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Phase of a conversation. Unknown ids are `Uninitialized`.
    pub fn state(&self, conversation_id: &str) -> SessionPhase {
        self.lookup(conversation_id)
            .map_or(SessionPhase::Uninitialized, |slot| lock(&slot).state.phase())
    }

    /// Pin a contact's identity key.
    ///
    /// Handshakes claiming this id with any other key are rejected as
    /// `UntrustedPeer`. Pinning again replaces the stored key.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` for a malformed id
    /// - `UntrustedPeer` if the id is not the key's fingerprint
    pub fn trust_peer(&self, identity: &Identity) -> Result<(), SessionError> {
        let identity = verified_identity(&identity.identity_id, *identity.public_key.as_bytes())?;
        let replaced = write(&self.trusted).insert(identity.identity_id.clone(), identity.public_key);

        if replaced.is_some_and(|previous| previous != identity.public_key) {
            tracing::warn!(identity_id = %identity.identity_id, "replaced pinned identity key");
        } else {
            tracing::info!(identity_id = %identity.identity_id, "pinned identity key");
        }
        Ok(())
    }

    /// Open a session with `remote` and return the Init packet to transmit.
    ///
    /// # Errors
    ///
    /// - `SessionNotReady` unless the conversation is Uninitialized or Closed
    /// - `UntrustedPeer` if `remote` conflicts with a pinned key or with the
    ///   conversation's existing peer
    /// - `Entropy` if no ephemeral key can be generated
    /// - `Agreement` for a degenerate remote key
    pub fn start_session(&self, conversation_id: &str, remote: &Identity) -> Result<Vec<u8>, SessionError> {
        validate_identifier("conversation id", conversation_id)?;
        let remote = verified_identity(&remote.identity_id, *remote.public_key.as_bytes())?;
        let first_use = self.check_trust(&remote, true)?;

        self.upsert(conversation_id, |conversation| {
            match conversation.state.phase() {
                SessionPhase::Uninitialized | SessionPhase::Closed => {},
                phase => return Err(not_ready(conversation_id, phase)),
            }
            check_peer(conversation, &remote)?;

            let (ephemeral, shared) =
                self.keystore.initiate_agreement(&self.local.identity_id, &remote.public_key)?;
            let timestamp = self.keystore.env().wall_clock_secs();
            let packet =
                self.handshake(HandshakeKind::Init, conversation_id, ephemeral, timestamp, None).to_bytes()?;

            if first_use {
                self.pin(&remote);
            }
            self.bind_peer(conversation, &remote);
            transition(conversation, State::Establishing(Pending { ephemeral, shared, timestamp }));
            Ok(packet)
        })
    }

    /// Start replacing the key of an established conversation. Returns the
    /// Rekey packet to transmit.
    ///
    /// Messages keep opening under the old key until the peer answers.
    ///
    /// # Errors
    ///
    /// - `SessionNotReady` unless Established, or Rekeying with no exchange
    ///   in flight
    /// - `Entropy` if no ephemeral key can be generated
    pub fn rekey(&self, conversation_id: &str) -> Result<Vec<u8>, SessionError> {
        let Some(slot) = self.lookup(conversation_id) else {
            return Err(not_ready(conversation_id, SessionPhase::Uninitialized));
        };
        let mut guard = lock(&slot);
        let conversation = &mut *guard;

        let can_rekey = matches!(conversation.state, State::Established(_) | State::Rekeying { pending: None, .. });
        let Some(peer) = conversation.peer.clone().filter(|_| can_rekey) else {
            return Err(not_ready(conversation_id, conversation.state.phase()));
        };

        let (ephemeral, shared) = self.keystore.initiate_agreement(&self.local.identity_id, &peer.public_key)?;
        let timestamp = self.keystore.env().wall_clock_secs();
        let transcript =
            rekey_transcript(conversation_id, &self.local.public_key, &peer.public_key, &ephemeral, timestamp);
        let tag = match &conversation.state {
            State::Established(keys) | State::Rekeying { keys, .. } => keys.current.rekey_tag(&transcript),
            other => return Err(not_ready(conversation_id, other.phase())),
        };
        let packet =
            self.handshake(HandshakeKind::Rekey, conversation_id, ephemeral, timestamp, Some(tag)).to_bytes()?;

        let next = match conversation.state.take() {
            State::Established(keys) | State::Rekeying { keys, .. } => {
                State::Rekeying { keys, pending: Some(Pending { ephemeral, shared, timestamp }) }
            },
            other => other,
        };
        transition(conversation, next);
        Ok(packet)
    }

    /// Tear a conversation down. All of its key material is zeroized.
    ///
    /// Unknown ids hold no keys and are left Uninitialized.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` for a malformed conversation id
    pub fn close(&self, conversation_id: &str) -> Result<(), SessionError> {
        validate_identifier("conversation id", conversation_id)?;
        if let Some(slot) = self.lookup(conversation_id) {
            transition(&mut lock(&slot), State::Closed);
        }
        Ok(())
    }

    /// Encrypt `plaintext` for the conversation's peer.
    ///
    /// Reaching the re-key policy (message count, key age, or counter
    /// exhaustion) moves the conversation to Rekeying and fails; the caller
    /// then runs [`Self::rekey`].
    ///
    /// # Errors
    ///
    /// - `PlaintextTooLarge` above `max_plaintext_len`
    /// - `SessionNotReady` unless Established
    /// - `SessionExhausted` when the re-key policy is reached
    pub fn send(&self, conversation_id: &str, plaintext: &[u8]) -> Result<Envelope, SessionError> {
        if plaintext.len() > self.config.max_plaintext_len {
            return Err(SessionError::PlaintextTooLarge {
                size: plaintext.len(),
                max: self.config.max_plaintext_len,
            });
        }
        let Some(slot) = self.lookup(conversation_id) else {
            return Err(not_ready(conversation_id, SessionPhase::Uninitialized));
        };
        let mut guard = lock(&slot);
        let conversation = &mut *guard;
        let now = self.keystore.env().wall_clock_secs();

        let keys = match &mut conversation.state {
            State::Established(keys) => keys,
            other => return Err(not_ready(conversation_id, other.phase())),
        };
        if self.policy_reached(&keys.current, now) {
            conversation.state.begin_rekeying();
            tracing::info!(
                conversation_id = %conversation_id,
                from = ?SessionPhase::Established,
                to = ?SessionPhase::Rekeying,
                "re-key policy reached"
            );
            return Err(SessionError::SessionExhausted { conversation_id: conversation_id.to_owned() });
        }

        let counter = keys.current.send_counter();
        let aad = associated_data(EnvelopeVersion::V1, conversation_id, &self.local.identity_id, counter);
        let sealed = courier_crypto::encrypt(&mut keys.current, plaintext, &aad)
            .map_err(|_| SessionError::SessionExhausted { conversation_id: conversation_id.to_owned() })?;

        tracing::debug!(conversation_id = %conversation_id, counter = sealed.counter, "sealed envelope");
        Ok(Envelope {
            version: EnvelopeVersion::V1,
            sender_identity_id: self.local.identity_id.clone(),
            counter: sealed.counter,
            nonce: sealed.nonce,
            ciphertext: Bytes::from(sealed.ciphertext),
            tag: sealed.tag,
        })
    }

    /// Process one received packet.
    ///
    /// Envelopes are opened; handshakes drive the conversation's state
    /// machine. A rejected packet never changes any session state.
    ///
    /// # Errors
    ///
    /// - `Format`/`UnsupportedVersion` for undecodable bytes
    /// - `AuthenticationFailure` for an envelope no conversation can open
    ///   (bad tag, replay, unknown sender) or a bad confirmation
    /// - `StaleHandshake`, `UnexpectedHandshake`, `UntrustedPeer` for
    ///   rejected handshakes
    pub fn receive(&self, bytes: &[u8]) -> Result<ReceiveOutcome, SessionError> {
        let packet = Packet::decode(bytes).map_err(|err| {
            tracing::warn!(error = %err, "rejected malformed packet");
            SessionError::from(err)
        })?;

        match packet {
            Packet::Envelope(envelope) => self.receive_envelope(&envelope),
            Packet::Handshake(message) => self.receive_handshake(&message).inspect_err(|err| {
                tracing::warn!(
                    conversation_id = %message.conversation_id,
                    kind = ?message.kind,
                    error = %err,
                    "rejected handshake"
                );
            }),
        }
    }

    fn receive_envelope(&self, envelope: &Envelope) -> Result<ReceiveOutcome, SessionError> {
        let candidates: Vec<String> = read(&self.routes)
            .get(&envelope.sender_identity_id)
            .map(|conversations| conversations.iter().cloned().collect())
            .unwrap_or_default();

        if counter_from_nonce(&envelope.nonce) == Some(envelope.counter) {
            for conversation_id in candidates {
                let Some(slot) = self.lookup(&conversation_id) else {
                    continue;
                };
                let mut guard = lock(&slot);
                let Some(keys) = guard.state.keys_mut() else {
                    continue;
                };

                let aad = envelope.associated_data(&conversation_id);
                if let Some(plaintext) = keys.open(envelope, &aad) {
                    tracing::debug!(conversation_id = %conversation_id, counter = envelope.counter, "opened envelope");
                    return Ok(ReceiveOutcome::Message {
                        conversation_id,
                        sender_identity_id: envelope.sender_identity_id.clone(),
                        plaintext,
                    });
                }
            }
        }

        tracing::warn!(sender_identity_id = %envelope.sender_identity_id, "envelope failed authentication");
        Err(SessionError::AuthenticationFailure)
    }

    fn receive_handshake(&self, message: &KeyExchangeMessage) -> Result<ReceiveOutcome, SessionError> {
        let conversation_id = message.conversation_id.as_str();
        validate_identifier("conversation id", conversation_id)?;
        let sender = verified_identity(&message.sender_identity_id, message.identity_key)?;
        if sender.identity_id == self.local.identity_id {
            return Err(unexpected(conversation_id, message.kind));
        }

        let now = self.keystore.env().wall_clock_secs();
        self.check_age(message, now)?;
        let allow_first_use = message.kind == HandshakeKind::Init && self.config.trust_on_first_use;
        let first_use = self.check_trust(&sender, allow_first_use)?;

        self.upsert(conversation_id, |conversation| {
            check_peer(conversation, &sender)?;
            if message.kind == HandshakeKind::Rekey && !self.rekey_is_current(conversation, &sender, message)? {
                tracing::info!(conversation_id = %conversation.id, "ignored rekey from a completed exchange");
                return Ok(ReceiveOutcome::Ignored { conversation_id: conversation.id.clone() });
            }
            check_replay(conversation, message)?;

            let outcome = match message.kind {
                HandshakeKind::Init | HandshakeKind::Rekey => self.answer(conversation, &sender, message, now)?,
                HandshakeKind::Response => self.complete(conversation, &sender, message)?,
            };
            if first_use && matches!(outcome, ReceiveOutcome::HandshakeReply { .. }) {
                self.pin(&sender);
            }
            Ok(outcome)
        })
    }

    /// Checks a Rekey's tag. `Ok(false)` means it was made with the key the
    /// last completed exchange replaced.
    fn rekey_is_current(
        &self,
        conversation: &Conversation,
        sender: &Identity,
        message: &KeyExchangeMessage,
    ) -> Result<bool, SessionError> {
        let keys = match &conversation.state {
            State::Established(keys) | State::Rekeying { keys, .. } => keys,
            _ => return Err(unexpected(&conversation.id, message.kind)),
        };
        let Some(tag) = &message.confirmation else {
            return Err(SessionError::AuthenticationFailure);
        };

        let transcript = rekey_transcript(
            &conversation.id,
            &sender.public_key,
            &self.local.public_key,
            &PublicKey::from_bytes(message.ephemeral_key),
            message.timestamp,
        );
        if keys.current.verify_rekey_tag(&transcript, tag).is_ok() {
            return Ok(true);
        }
        match &keys.previous {
            Some(previous) if previous.verify_rekey_tag(&transcript, tag).is_ok() => Ok(false),
            _ => Err(SessionError::AuthenticationFailure),
        }
    }

    /// Responder side of Init and Rekey.
    fn answer(
        &self,
        conversation: &mut Conversation,
        sender: &Identity,
        message: &KeyExchangeMessage,
        now: u64,
    ) -> Result<ReceiveOutcome, SessionError> {
        let contended = match (&conversation.state, message.kind) {
            (State::Uninitialized | State::Closed, HandshakeKind::Init)
            | (State::Established(_) | State::Rekeying { pending: None, .. }, HandshakeKind::Rekey) => false,
            (State::Establishing(_), HandshakeKind::Init)
            | (State::Rekeying { pending: Some(_), .. }, HandshakeKind::Rekey) => true,
            _ => return Err(unexpected(&conversation.id, message.kind)),
        };

        // Both sides started an exchange: the smaller identity id stays
        // initiator, the other answers.
        if contended && self.local.identity_id < sender.identity_id {
            tracing::info!(conversation_id = %conversation.id, "kept initiator role in simultaneous exchange");
            return Ok(ReceiveOutcome::Ignored { conversation_id: conversation.id.clone() });
        }

        let remote_ephemeral = PublicKey::from_bytes(message.ephemeral_key);
        let shared =
            self.keystore.respond_agreement(&self.local.identity_id, &remote_ephemeral, &sender.public_key)?;
        let transcript = confirmation_transcript(
            &conversation.id,
            &sender.public_key,
            &self.local.public_key,
            &remote_ephemeral,
        );
        let confirmation = confirmation_tag(shared.as_bytes(), &transcript);
        let key = self.session_key(&shared, &conversation.id, Role::Responder)?;
        let reply = self
            .handshake(HandshakeKind::Response, &conversation.id, remote_ephemeral, now, Some(confirmation))
            .to_bytes()?;

        let keys = match conversation.state.take() {
            State::Established(old) | State::Rekeying { keys: old, .. } => old.replace(key),
            _ => ActiveKeys::new(key),
        };
        self.bind_peer(conversation, sender);
        conversation.last_handshake = Some(LastHandshake { timestamp: message.timestamp, ephemeral: remote_ephemeral });
        transition(conversation, State::Established(keys));

        Ok(ReceiveOutcome::HandshakeReply { conversation_id: conversation.id.clone(), reply })
    }

    /// Initiator side: verify the Response to our pending exchange.
    fn complete(
        &self,
        conversation: &mut Conversation,
        sender: &Identity,
        message: &KeyExchangeMessage,
    ) -> Result<ReceiveOutcome, SessionError> {
        let Some(pending) = conversation.state.pending() else {
            return Err(unexpected(&conversation.id, message.kind));
        };
        if pending.ephemeral.as_bytes() != &message.ephemeral_key {
            return Err(stale(&conversation.id));
        }
        let Some(confirmation) = &message.confirmation else {
            return Err(SessionError::AuthenticationFailure);
        };

        let transcript = confirmation_transcript(
            &conversation.id,
            &self.local.public_key,
            &sender.public_key,
            &pending.ephemeral,
        );
        verify_confirmation(pending.shared.as_bytes(), &transcript, confirmation)?;
        let key = self.session_key(&pending.shared, &conversation.id, Role::Initiator)?;
        let accepted = LastHandshake { timestamp: pending.timestamp, ephemeral: pending.ephemeral };

        let keys = match conversation.state.take() {
            State::Rekeying { keys: old, .. } => old.replace(key),
            _ => ActiveKeys::new(key),
        };
        conversation.last_handshake = Some(accepted);
        transition(conversation, State::Established(keys));

        Ok(ReceiveOutcome::Established { conversation_id: conversation.id.clone() })
    }

    fn session_key(
        &self,
        shared: &SharedSecret,
        conversation_id: &str,
        role: Role,
    ) -> Result<SessionKey, SessionError> {
        let mut material = *shared.as_bytes();
        let key = self.keystore.derive_session_key(&mut material, conversation_id, role);
        Ok(key.with_replay_window(self.config.replay_window)?)
    }

    fn handshake(
        &self,
        kind: HandshakeKind,
        conversation_id: &str,
        ephemeral: PublicKey,
        timestamp: u64,
        confirmation: Option<[u8; CONFIRMATION_SIZE]>,
    ) -> KeyExchangeMessage {
        KeyExchangeMessage {
            kind,
            conversation_id: conversation_id.to_owned(),
            sender_identity_id: self.local.identity_id.clone(),
            identity_key: *self.local.public_key.as_bytes(),
            ephemeral_key: *ephemeral.as_bytes(),
            timestamp,
            confirmation,
        }
    }

    fn policy_reached(&self, key: &SessionKey, now: u64) -> bool {
        key.send_counter() >= self.config.rekey_after_messages
            || now.saturating_sub(key.created_at()) >= self.config.rekey_after.as_secs()
            || key.next_send_counter().is_err()
    }

    /// Rejects handshakes outside `max_handshake_age` in either direction.
    fn check_age(&self, message: &KeyExchangeMessage, now: u64) -> Result<(), SessionError> {
        let max_age = self.config.max_handshake_age.as_secs();
        let too_old = now.saturating_sub(message.timestamp) > max_age;
        let too_new = message.timestamp.saturating_sub(now) > max_age;
        if too_old || too_new {
            return Err(stale(&message.conversation_id));
        }
        Ok(())
    }

    /// Whether `identity` may be used, and if so whether it still needs
    /// pinning.
    fn check_trust(&self, identity: &Identity, allow_first_use: bool) -> Result<bool, SessionError> {
        match read(&self.trusted).get(&identity.identity_id) {
            Some(pinned) if *pinned == identity.public_key => Ok(false),
            None if allow_first_use => Ok(true),
            _ => Err(SessionError::UntrustedPeer { identity_id: identity.identity_id.clone() }),
        }
    }

    fn pin(&self, identity: &Identity) {
        write(&self.trusted).entry(identity.identity_id.clone()).or_insert(identity.public_key);
        tracing::info!(identity_id = %identity.identity_id, "pinned identity key on first use");
    }

    fn bind_peer(&self, conversation: &mut Conversation, peer: &Identity) {
        if conversation.peer.is_some() {
            return;
        }
        conversation.peer = Some(peer.clone());
        write(&self.routes)
            .entry(peer.identity_id.clone())
            .or_default()
            .insert(conversation.id.clone());
    }

    fn lookup(&self, conversation_id: &str) -> Option<Slot> {
        read(&self.conversations).get(conversation_id).cloned()
    }

    /// Run `apply` on a conversation, creating it if needed. A new
    /// conversation is only recorded when `apply` succeeds.
    fn upsert<T>(
        &self,
        conversation_id: &str,
        apply: impl FnOnce(&mut Conversation) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        if let Some(slot) = self.lookup(conversation_id) {
            return apply(&mut lock(&slot));
        }

        let mut conversations = write(&self.conversations);
        if let Some(slot) = conversations.get(conversation_id).cloned() {
            drop(conversations);
            return apply(&mut lock(&slot));
        }

        let mut conversation = Conversation::new(conversation_id);
        let result = apply(&mut conversation)?;
        conversations.insert(conversation_id.to_owned(), Arc::new(Mutex::new(conversation)));
        Ok(result)
    }
}

/// Identity whose id is the fingerprint of its key.
fn verified_identity(identity_id: &str, key: [u8; 32]) -> Result<Identity, SessionError> {
    validate_identifier("identity id", identity_id)?;
    let identity = Identity::from_public_key(PublicKey::from_bytes(key));
    if identity.identity_id != identity_id {
        return Err(SessionError::UntrustedPeer { identity_id: identity_id.to_owned() });
    }
    Ok(identity)
}

fn check_peer(conversation: &Conversation, sender: &Identity) -> Result<(), SessionError> {
    match &conversation.peer {
        Some(peer) if peer != sender => {
            Err(SessionError::UntrustedPeer { identity_id: sender.identity_id.clone() })
        },
        _ => Ok(()),
    }
}

/// Rejects a handshake replaying the last accepted ephemeral key, and an
/// Init or Rekey older than the last accepted exchange.
fn check_replay(conversation: &Conversation, message: &KeyExchangeMessage) -> Result<(), SessionError> {
    let Some(last) = &conversation.last_handshake else {
        return Ok(());
    };
    let reused = last.ephemeral.as_bytes() == &message.ephemeral_key;
    let older = message.kind != HandshakeKind::Response && message.timestamp < last.timestamp;
    if reused || older {
        return Err(stale(&conversation.id));
    }
    Ok(())
}

fn transition(conversation: &mut Conversation, next: State) {
    let from = conversation.state.phase();
    conversation.state = next;
    let to = conversation.state.phase();
    if from != to {
        tracing::info!(conversation_id = %conversation.id, from = ?from, to = ?to, "session phase changed");
    }
}

fn not_ready(conversation_id: &str, phase: SessionPhase) -> SessionError {
    SessionError::SessionNotReady { conversation_id: conversation_id.to_owned(), phase }
}

fn stale(conversation_id: &str) -> SessionError {
    SessionError::StaleHandshake { conversation_id: conversation_id.to_owned() }
}

fn unexpected(conversation_id: &str, kind: HandshakeKind) -> SessionError {
    SessionError::UnexpectedHandshake { conversation_id: conversation_id.to_owned(), kind }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
