//! Chaotic storage wrapper for fault injection testing
//!
//! Delegates to an underlying store but fails a configurable fraction of
//! operations, so tests can check that storage failures surface as errors
//! and never leave a half-written identity behind.

use std::sync::{Arc, Mutex, PoisonError};

use super::{SecureStorage, StorageError};

/// Storage wrapper that randomly injects `StorageError::Io` failures
///
/// Uses Arc<Mutex<>> for the RNG state, making it Clone and thread-safe.
#[derive(Clone)]
pub struct ChaoticStorage<S: SecureStorage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
}

/// Linear congruential generator: fast, deterministic, reproducible from a
/// seed. Not for anything but fault injection.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    /// Next value in [0.0, 1.0)
    fn next_f64(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: SecureStorage> ChaoticStorage<S> {
    /// Wrap `inner`, failing with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );
        Self { inner, failure_rate, rng: Arc::new(Mutex::new(ChaoticRng { state: seed })) }
    }

    /// The wrapped store, bypassing fault injection.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn maybe_fail(&self, operation: &str) -> Result<(), StorageError> {
        let roll = self.rng.lock().unwrap_or_else(PoisonError::into_inner).next_f64();
        if roll < self.failure_rate {
            return Err(StorageError::Io(format!("injected failure during {operation}")));
        }
        Ok(())
    }
}

impl<S: SecureStorage> SecureStorage for ChaoticStorage<S> {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.maybe_fail("put")?;
        self.inner.put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.maybe_fail("get")?;
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.maybe_fail("delete")?;
        self.inner.delete(key)
    }
}
