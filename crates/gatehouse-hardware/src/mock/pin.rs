//! Mock digital output for testing relay behavior.

use crate::error::Result;
use crate::traits::OutputPin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock output pin backed by an atomic flag.
///
/// Clones share the same underlying state, so a test can hand one clone
/// to the relay bank and keep another to observe the driven level.
///
/// # Examples
///
/// ```
/// use gatehouse_hardware::mock::MockPin;
/// use gatehouse_hardware::traits::OutputPin;
///
/// let pin = MockPin::new();
/// let observer = pin.clone();
///
/// pin.set_active().unwrap();
/// assert!(observer.is_active());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockPin {
    active: Arc<AtomicBool>,
}

impl MockPin {
    /// Create a new pin, initially inactive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputPin for MockPin {
    fn set_active(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_inactive(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
