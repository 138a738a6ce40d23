//! Sliding replay window over received counters
//!
//! Tracks the highest accepted counter plus a 64-bit bitmap of the counters
//! just below it. Bit `k` records whether `highest - (k + 1)` was accepted.
//! A window of size 0 degenerates to "strictly greater than the last
//! accepted counter".

use crate::error::CryptoError;

/// Largest supported out-of-order window
pub const MAX_REPLAY_WINDOW: u32 = 64;

/// Receive-side counter state for one session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayWindow {
    highest: Option<u64>,
    bitmap: u64,
    size: u32,
}

impl ReplayWindow {
    /// Window that accepts counters up to `size` behind the highest seen.
    ///
    /// # Errors
    ///
    /// - `InvalidWindow` if `size > MAX_REPLAY_WINDOW`
    pub fn new(size: u32) -> Result<Self, CryptoError> {
        if size > MAX_REPLAY_WINDOW {
            return Err(CryptoError::InvalidWindow { size, max: MAX_REPLAY_WINDOW });
        }
        Ok(Self { highest: None, bitmap: 0, size })
    }

    /// Window that only accepts strictly increasing counters.
    pub fn strict() -> Self {
        Self { highest: None, bitmap: 0, size: 0 }
    }

    /// Highest counter accepted so far.
    pub fn highest(&self) -> Option<u64> {
        self.highest
    }

    /// Configured window size.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether `counter` would be accepted. Does not mutate.
    pub fn check(&self, counter: u64) -> bool {
        let Some(highest) = self.highest else {
            return true;
        };
        if counter > highest {
            return true;
        }
        let offset = highest - counter;
        if offset == 0 || offset > u64::from(self.size) {
            return false;
        }
        self.bitmap & (1u64 << (offset - 1)) == 0
    }

    /// Record `counter` as accepted.
    ///
    /// Callers check first and commit only after the message authenticated.
    pub fn commit(&mut self, counter: u64) {
        let Some(highest) = self.highest else {
            self.highest = Some(counter);
            self.bitmap = 0;
            return;
        };

        if counter > highest {
            let shift = counter - highest;
            self.bitmap = if shift >= 64 { 0 } else { self.bitmap << shift };
            if shift <= 64 {
                // old highest is now `shift` behind
                self.bitmap |= 1u64 << (shift - 1);
            }
            self.highest = Some(counter);
        } else {
            let offset = highest - counter;
            if (1..=64).contains(&offset) {
                self.bitmap |= 1u64 << (offset - 1);
            }
        }
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::strict()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn accept(window: &mut ReplayWindow, counter: u64) -> bool {
        if window.check(counter) {
            window.commit(counter);
            true
        } else {
            false
        }
    }

    #[test]
    fn strict_window_rejects_older_and_equal() {
        let mut window = ReplayWindow::strict();
        assert!(accept(&mut window, 0));
        assert!(accept(&mut window, 5));
        assert!(!accept(&mut window, 5));
        assert!(!accept(&mut window, 3));
        assert!(accept(&mut window, 6));
    }

    #[test]
    fn window_accepts_skipped_counter_once() {
        let mut window = ReplayWindow::new(8).unwrap();
        assert!(accept(&mut window, 0));
        assert!(accept(&mut window, 2));
        assert!(accept(&mut window, 1));
        assert!(!accept(&mut window, 1));
        assert!(!accept(&mut window, 0));
    }

    #[test]
    fn window_rejects_beyond_size() {
        let mut window = ReplayWindow::new(4).unwrap();
        assert!(accept(&mut window, 10));
        assert!(accept(&mut window, 6));
        assert!(!accept(&mut window, 5));
    }

    #[test]
    fn large_jump_clears_history() {
        let mut window = ReplayWindow::new(64).unwrap();
        assert!(accept(&mut window, 1));
        assert!(accept(&mut window, 1000));
        assert!(accept(&mut window, 999));
        assert!(!accept(&mut window, 1));
    }

    #[test]
    fn jump_of_exactly_64_keeps_old_highest() {
        let mut window = ReplayWindow::new(64).unwrap();
        assert!(accept(&mut window, 0));
        assert!(accept(&mut window, 64));
        assert!(!accept(&mut window, 0));
    }

    #[test]
    fn oversized_window_is_rejected() {
        assert_eq!(
            ReplayWindow::new(65).unwrap_err(),
            CryptoError::InvalidWindow { size: 65, max: 64 }
        );
    }

    #[test]
    fn check_does_not_mutate() {
        let window = ReplayWindow::new(4).unwrap();
        assert!(window.check(3));
        assert!(window.check(3));
        assert_eq!(window.highest(), None);
    }

    proptest! {
        #[test]
        fn no_counter_accepted_twice(
            size in 0u32..=64,
            counters in prop::collection::vec(0u64..200, 1..100),
        ) {
            let mut window = ReplayWindow::new(size).unwrap();
            let mut seen = std::collections::HashSet::new();
            for counter in counters {
                if accept(&mut window, counter) {
                    prop_assert!(seen.insert(counter), "counter {} accepted twice", counter);
                }
            }
        }

        #[test]
        fn increasing_counters_always_accepted(
            size in 0u32..=64,
            mut counters in prop::collection::btree_set(any::<u64>(), 1..50),
        ) {
            let mut window = ReplayWindow::new(size).unwrap();
            while let Some(counter) = counters.pop_first() {
                prop_assert!(accept(&mut window, counter));
            }
        }
    }
}
