//! Hardware device trait definitions.
//!
//! These traits establish the contract between the access controller and
//! the board's GPIO: relays are driven through [`OutputPin`], and Wiegand
//! readers deliver falling edges through [`EdgeSource`]. Real
//! implementations live outside this workspace (the edge-interrupt
//! collaborator); the [`mock`](crate::mock) module provides channel-driven
//! substitutes.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT); callers use generic type parameters rather than trait objects.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use gatehouse_core::ReaderId;

/// A single digital output line.
///
/// "Active" means the relay coil is energized; the physical polarity
/// (the original board drives active-low) is the implementation's concern.
pub trait OutputPin: Send + Sync + 'static {
    /// Energize the output.
    ///
    /// # Errors
    /// Returns an error if the GPIO write fails.
    fn set_active(&self) -> Result<()>;

    /// De-energize the output.
    ///
    /// # Errors
    /// Returns an error if the GPIO write fails.
    fn set_inactive(&self) -> Result<()>;

    /// Current driven state.
    fn is_active(&self) -> bool;
}

impl OutputPin for Box<dyn OutputPin> {
    fn set_active(&self) -> Result<()> {
        (**self).set_active()
    }

    fn set_inactive(&self) -> Result<()> {
        (**self).set_inactive()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

/// Which Wiegand data line pulsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WiegandLine {
    /// D0 — a pulse encodes a `0` bit.
    Data0,
    /// D1 — a pulse encodes a `1` bit.
    Data1,
}

impl WiegandLine {
    /// The bit value this line's pulse encodes.
    #[must_use]
    pub fn bit(&self) -> u8 {
        match self {
            WiegandLine::Data0 => 0,
            WiegandLine::Data1 => 1,
        }
    }
}

/// A falling edge observed on one of a reader's data lines.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    /// Line the edge arrived on.
    pub line: WiegandLine,

    /// Microsecond tick of the edge, from the interrupt handler's clock.
    pub tick_us: u64,
}

/// Stream of falling edges for one reader.
pub trait EdgeSource: Send + 'static {
    /// Wait for the next falling edge.
    ///
    /// # Errors
    /// Returns [`HardwareError::Disconnected`](crate::HardwareError::Disconnected)
    /// when the underlying source is gone; the decoder task terminates on it.
    fn next_edge(&mut self) -> impl std::future::Future<Output = Result<Edge>> + Send;
}

/// Factory for per-reader edge sources.
///
/// Decoder restarts (config hot-reload) tear the old sources down and open
/// fresh ones through this port, so implementations must support repeated
/// `open` calls for the same reader.
pub trait EdgePort: Send + Sync + 'static {
    type Source: EdgeSource;

    /// Open an edge stream for the given reader.
    ///
    /// # Errors
    /// Returns an error if the reader's GPIO lines cannot be claimed.
    fn open(&self, reader: ReaderId) -> Result<Self::Source>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_bit_values() {
        assert_eq!(WiegandLine::Data0.bit(), 0);
        assert_eq!(WiegandLine::Data1.bit(), 1);
    }
}
