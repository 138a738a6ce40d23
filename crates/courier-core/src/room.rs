//! Passphrase-keyed group rooms.
//!
//! Compatibility mode for group chat: every member who knows the room name
//! and passphrase can read and write. There is no per-member key and no
//! replay protection; the session layer is the authenticated path.

use courier_crypto::{NONCE_SIZE, RoomKey, derive_room_key, open_room_message, seal_room_message};

use crate::{config::RoomConfig, env::Environment, error::SessionError, ids::validate_identifier};

/// One joined room.
pub struct RoomChannel<E: Environment> {
    room: String,
    key: RoomKey,
    label: String,
    env: E,
}

impl<E: Environment> RoomChannel<E> {
    /// Derive the room key and join. Key derivation is deliberately slow.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `room` is not a valid identifier
    pub fn join(room: &str, passphrase: &str, config: &RoomConfig, env: E) -> Result<Self, SessionError> {
        validate_identifier("room", room)?;
        let key = derive_room_key(room, passphrase);

        tracing::info!(room = %room, "joined room");
        Ok(Self { room: room.to_owned(), key, label: config.label.clone(), env })
    }

    /// Room name.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Encrypt a message for the room under a fresh random nonce.
    ///
    /// # Errors
    ///
    /// - `Entropy` if no nonce can be drawn
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, SessionError> {
        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce)?;
        Ok(seal_room_message(&self.key, plaintext, nonce, self.label.as_bytes()))
    }

    /// Decrypt a room payload.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailure` for bad base64, short payloads, a wrong
    ///   passphrase or tampering
    pub fn open(&self, payload: &str) -> Result<Vec<u8>, SessionError> {
        open_room_message(&self.key, payload, self.label.as_bytes()).map_err(|err| {
            tracing::warn!(room = %self.room, "room payload failed authentication");
            SessionError::from(err)
        })
    }
}
