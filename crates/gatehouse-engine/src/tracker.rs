//! Entry/exit gating.
//!
//! When enabled, a card only produces a transaction once its scans are at
//! least `min_gap` apart: the first-ever scan primes the tracker and is
//! not recorded, a scan inside the gap is not recorded (and does not move
//! the anchor), and a scan at or past the gap is recorded and resets it.

use gatehouse_core::CardNumber;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Card → last recorded scan instant.
#[derive(Debug, Default)]
pub struct EntryExitTracker {
    last_seen: Mutex<HashMap<CardNumber, Instant>>,
}

impl EntryExitTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a scan of `card` should produce a transaction.
    pub fn should_record(&self, card: &CardNumber, min_gap: Duration) -> bool {
        let now = Instant::now();
        let mut last = self.last_seen.lock().expect("tracker lock poisoned");

        match last.get(card) {
            None => {
                last.insert(card.clone(), now);
                false
            }
            Some(previous) if now.duration_since(*previous) < min_gap => false,
            Some(_) => {
                last.insert(card.clone(), now);
                true
            }
        }
    }

    #[cfg(test)]
    fn backdate(&self, card: &CardNumber, by: Duration) {
        let mut last = self.last_seen.lock().expect("tracker lock poisoned");
        if let Some(t) = last.get_mut(card) {
            *t -= by;
        }
    }
}
