//! Persistence collaborator for the key store
//!
//! A synchronous key/value trait. The core never chooses the medium: the
//! embedding application supplies an implementation backed by whatever
//! protected store the platform offers. Calls may block.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;

/// Secure key/value storage for serialized key material.
///
/// Must be Clone (shared between the key store and the application) and
/// Send + Sync. Implementations typically share internal state via Arc, so
/// clones access the same underlying storage.
pub trait SecureStorage: Clone + Send + Sync + 'static {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Value under `key`. `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}
