//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (wall clock, randomness).
//! Production code uses [`SystemEnv`]; tests use `test_utils::MockEnv`
//! with a seeded RNG and a clock they control.

use crate::error::EntropyError;

/// Clock and randomness source injected into the key store and sessions.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `random_bytes()` either fills the whole buffer or returns an error; it
///   never hands back partially random output as success
pub trait Environment: Clone + Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// 32 random bytes, e.g. a key seed.
    fn random_seed(&self) -> Result<[u8; 32], EntropyError> {
        let mut seed = [0u8; 32];
        self.random_bytes(&mut seed)?;
        Ok(seed)
    }
}

/// Production environment using the system clock and OS randomness.
///
/// # Security
///
/// The RNG uses getrandom, which provides OS-level cryptographic randomness
/// (e.g. `/dev/urandom` on Linux, `BCryptGenRandom` on Windows). A failure is
/// surfaced as [`EntropyError`] rather than a panic so the embedding
/// application decides how to shut down.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn wall_clock_secs(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|err| EntropyError::new(err.to_string()))
    }
}

/// Deterministic environment for tests and simulation.
///
/// Enabled by the `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::{
        sync::{Arc, Mutex, PoisonError},
        time::Duration,
    };

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::Environment;
    use crate::error::EntropyError;

    /// Wall clock value every `MockEnv` starts at (2023-11-14).
    pub const MOCK_EPOCH_SECS: u64 = 1_700_000_000;

    /// Seeded, clock-controlled environment.
    ///
    /// Clones share state, so a test can hand one clone to a key store and
    /// keep another to move the clock or cut off entropy.
    #[derive(Clone)]
    pub struct MockEnv {
        inner: Arc<Mutex<MockState>>,
    }

    struct MockState {
        rng: ChaCha20Rng,
        now_secs: u64,
        entropy_available: bool,
    }

    impl MockEnv {
        /// Environment whose random stream is fixed by `seed`.
        pub fn new(seed: u64) -> Self {
            Self {
                inner: Arc::new(Mutex::new(MockState {
                    rng: ChaCha20Rng::seed_from_u64(seed),
                    now_secs: MOCK_EPOCH_SECS,
                    entropy_available: true,
                })),
            }
        }

        fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Set the wall clock.
        pub fn set_time(&self, secs: u64) {
            self.state().now_secs = secs;
        }

        /// Move the wall clock forward.
        pub fn advance(&self, by: Duration) {
            let mut state = self.state();
            state.now_secs = state.now_secs.saturating_add(by.as_secs());
        }

        /// Simulate the entropy source failing (or recovering).
        pub fn set_entropy_available(&self, available: bool) {
            self.state().entropy_available = available;
        }
    }

    impl Environment for MockEnv {
        fn wall_clock_secs(&self) -> u64 {
            self.state().now_secs
        }

        fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
            let mut state = self.state();
            if !state.entropy_available {
                return Err(EntropyError::new("mock entropy source disabled"));
            }
            state.rng.fill_bytes(buffer);
            Ok(())
        }
    }
}
