//! Scan-rate limiter: the dedup window.
//!
//! A second read of the same card inside the window is dropped silently.
//! Timing uses the monotonic clock so wall-clock changes (the admin can
//! set system time at runtime) never reopen or extend a window.

use gatehouse_core::CardNumber;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Card → last accepted scan instant.
#[derive(Debug, Default)]
pub struct ScanDeduper {
    last_accepted: Mutex<HashMap<CardNumber, Instant>>,
}

impl ScanDeduper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept or drop a scan of `card` under the given window.
    ///
    /// Accepting records the scan time; a dropped scan leaves the window
    /// anchored at the last accepted scan.
    pub fn accept(&self, card: &CardNumber, window: Duration) -> bool {
        let now = Instant::now();
        let mut last = self.last_accepted.lock().expect("deduper lock poisoned");
        if let Some(previous) = last.get(card)
            && now.duration_since(*previous) < window
        {
            return false;
        }
        last.insert(card.clone(), now);
        true
    }

    #[cfg(test)]
    fn backdate(&self, card: &CardNumber, by: Duration) {
        let mut last = self.last_accepted.lock().expect("deduper lock poisoned");
        if let Some(t) = last.get_mut(card) {
            *t -= by;
        }
    }
}
