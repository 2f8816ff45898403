//! Hardware layer: GPIO abstraction, Wiegand decoding and relay control.
//!
//! Physical GPIO access sits behind the [`traits::OutputPin`] and
//! [`traits::EdgeSource`] traits; the edge-interrupt collaborator that
//! feeds D0/D1 falling edges is external to this crate. Channel-driven
//! mock implementations in [`mock`] cover tests and GPIO-less deployments.

pub mod error;
pub mod mock;
pub mod relay;
pub mod traits;
pub mod wiegand;

pub use error::{HardwareError, Result};
pub use relay::{RelayAction, RelayBank, RelayState};
pub use traits::{Edge, EdgePort, EdgeSource, OutputPin, WiegandLine};
pub use wiegand::{CardScan, DecoderConfig, DecoderSupervisor, WiegandDecoder};
