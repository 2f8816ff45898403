//! Relay driver with the manual-override state machine.
//!
//! Each relay is `Idle`, `HeldOpen` or `HeldClosed`. `Idle` permits
//! automatic pulses from the access pipeline; a held relay ignores them
//! until an explicit admin command transitions it back. RFID scans can
//! never re-arm a manually held relay.
//!
//! A single mutex guards bank state and serializes physical pin access;
//! pulse releases run on their own short-lived task so callers never
//! block on the pulse duration.

use crate::error::{HardwareError, Result};
use crate::traits::OutputPin;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Per-relay override state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Automatic pulses permitted.
    Idle,
    /// Driven active until explicitly normalized.
    HeldOpen,
    /// Driven inactive until explicitly normalized.
    HeldClosed,
}

impl RelayState {
    /// Whether the access pipeline may pulse this relay.
    #[must_use]
    pub fn permits_auto_pulse(&self) -> bool {
        matches!(self, RelayState::Idle)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Idle => write!(f, "idle"),
            RelayState::HeldOpen => write!(f, "held_open"),
            RelayState::HeldClosed => write!(f, "held_closed"),
        }
    }
}

/// Admin relay command, as carried by `POST /relay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayAction {
    Pulse,
    OpenHold,
    CloseHold,
    Normal,
}

#[derive(Debug)]
struct RelaySlot<P> {
    pin: P,
    state: RelayState,
}

/// Bank of N relays behind one mutex.
#[derive(Debug)]
pub struct RelayBank<P: OutputPin> {
    slots: Arc<Mutex<Vec<RelaySlot<P>>>>,
}

impl<P: OutputPin> Clone for RelayBank<P> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<P: OutputPin> RelayBank<P> {
    /// Wrap a set of output pins. Pins are released (inactive) on creation.
    pub fn new(pins: Vec<P>) -> Result<Self> {
        let slots = pins
            .into_iter()
            .map(|pin| {
                pin.set_inactive()?;
                Ok(RelaySlot {
                    pin,
                    state: RelayState::Idle,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            slots: Arc::new(Mutex::new(slots)),
        })
    }

    /// Number of relays in the bank.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Explicit admin pulse: clears any hold, drives active for
    /// `duration`, then releases.
    pub async fn pulse(&self, index: usize, duration: Duration) -> Result<()> {
        {
            let mut slots = self.slots.lock().await;
            let slot = slot_mut(&mut slots, index)?;
            slot.state = RelayState::Idle;
            slot.pin.set_active()?;
        }
        self.spawn_release(index, duration);
        Ok(())
    }

    /// Automatic pulse from the access pipeline.
    ///
    /// Ignored (returning `Ok(false)`) while the relay is held.
    pub async fn pulse_auto(&self, index: usize, duration: Duration) -> Result<bool> {
        {
            let mut slots = self.slots.lock().await;
            let slot = slot_mut(&mut slots, index)?;
            if !slot.state.permits_auto_pulse() {
                info!(
                    relay = index + 1,
                    state = %slot.state,
                    "relay held; automatic pulse ignored"
                );
                return Ok(false);
            }
            slot.pin.set_active()?;
        }
        self.spawn_release(index, duration);
        Ok(true)
    }

    /// Drive active and latch `HeldOpen`.
    pub async fn hold_open(&self, index: usize) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let slot = slot_mut(&mut slots, index)?;
        slot.pin.set_active()?;
        slot.state = RelayState::HeldOpen;
        Ok(())
    }

    /// Drive inactive and latch `HeldClosed`.
    pub async fn hold_closed(&self, index: usize) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let slot = slot_mut(&mut slots, index)?;
        slot.pin.set_inactive()?;
        slot.state = RelayState::HeldClosed;
        Ok(())
    }

    /// Release the relay and return it to `Idle`.
    pub async fn normalize(&self, index: usize) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let slot = slot_mut(&mut slots, index)?;
        slot.pin.set_inactive()?;
        slot.state = RelayState::Idle;
        Ok(())
    }

    /// Dispatch an admin command.
    pub async fn apply(&self, index: usize, action: RelayAction, pulse_duration: Duration) -> Result<()> {
        match action {
            RelayAction::Pulse => self.pulse(index, pulse_duration).await,
            RelayAction::OpenHold => self.hold_open(index).await,
            RelayAction::CloseHold => self.hold_closed(index).await,
            RelayAction::Normal => self.normalize(index).await,
        }
    }

    /// Current state of one relay.
    pub async fn state(&self, index: usize) -> Result<RelayState> {
        let slots = self.slots.lock().await;
        slots
            .get(index)
            .map(|slot| slot.state)
            .ok_or_else(|| bad_index(index))
    }

    /// Snapshot of all relay states.
    pub async fn states(&self) -> Vec<RelayState> {
        self.slots.lock().await.iter().map(|s| s.state).collect()
    }

    fn spawn_release(&self, index: usize, duration: Duration) {
        let slots = Arc::clone(&self.slots);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut slots = slots.lock().await;
            // A hold issued mid-pulse wins; only release an idle relay.
            if let Some(slot) = slots.get_mut(index)
                && slot.state == RelayState::Idle
                && let Err(error) = slot.pin.set_inactive()
            {
                warn!(relay = index + 1, %error, "relay release failed");
            }
        });
    }
}

fn slot_mut<P>(slots: &mut [RelaySlot<P>], index: usize) -> Result<&mut RelaySlot<P>> {
    let len = slots.len();
    slots.get_mut(index).ok_or_else(|| {
        HardwareError::invalid_data(format!("relay index {index} out of range (0..{len})"))
    })
}

fn bad_index(index: usize) -> HardwareError {
    HardwareError::invalid_data(format!("relay index {index} out of range"))
}
