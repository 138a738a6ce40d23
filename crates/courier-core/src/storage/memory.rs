use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use zeroize::Zeroize;

use super::{SecureStorage, StorageError};

/// In-memory storage for tests and embedding
///
/// All state is wrapped in Arc<Mutex<>> so clones share one map. A poisoned
/// lock is recovered rather than propagated: every operation leaves the map
/// consistent. Overwritten and deleted values are zeroized.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Stored keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.map().keys().cloned().collect()
    }
}

impl SecureStorage for MemoryStorage {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if let Some(mut old) = self.map().insert(key.to_owned(), value.to_vec()) {
            old.zeroize();
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.map().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        if let Some(mut old) = self.map().remove(key) {
            old.zeroize();
        }
        Ok(())
    }
}
