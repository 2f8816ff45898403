//! Mock edge source for simulating Wiegand readers.
//!
//! The port hands out broadcast subscriptions per reader, so decoder
//! restarts can re-open a reader's stream while the controlling handle
//! keeps injecting edges.

use crate::error::{HardwareError, Result};
use crate::traits::{Edge, EdgePort, EdgeSource, WiegandLine};
use crate::wiegand::encode_frame;
use gatehouse_core::ReaderId;
use gatehouse_core::constants::READER_COUNT;
use tokio::sync::broadcast;
use tracing::warn;

const EDGE_CHANNEL_CAPACITY: usize = 256;

/// Microsecond spacing between simulated bits (well inside any valid
/// inter-bit timeout).
const BIT_SPACING_US: u64 = 200;

/// Mock edge port covering all readers.
///
/// # Examples
///
/// ```
/// use gatehouse_hardware::mock::MockEdgePort;
/// use gatehouse_hardware::traits::{EdgePort, EdgeSource};
/// use gatehouse_core::ReaderId;
///
/// # #[tokio::main]
/// # async fn main() -> gatehouse_hardware::Result<()> {
/// let (port, handle) = MockEdgePort::new();
/// let reader = ReaderId::new(1).unwrap();
/// let mut source = port.open(reader)?;
///
/// // Present card 42 as a 26-bit frame on reader 1
/// handle.present_card(reader, 42, 26, 0)?;
///
/// let edge = source.next_edge().await?;
/// # let _ = edge;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockEdgePort {
    senders: Vec<broadcast::Sender<Edge>>,
}

impl MockEdgePort {
    /// Create a port and its controlling handle.
    #[must_use]
    pub fn new() -> (Self, MockReaderHandle) {
        let senders: Vec<_> = (0..READER_COUNT)
            .map(|_| broadcast::channel(EDGE_CHANNEL_CAPACITY).0)
            .collect();
        let handle = MockReaderHandle {
            senders: senders.clone(),
        };
        (Self { senders }, handle)
    }
}

impl EdgePort for MockEdgePort {
    type Source = MockEdgeSource;

    fn open(&self, reader: ReaderId) -> Result<Self::Source> {
        let rx = self.senders[reader.relay_index()].subscribe();
        Ok(MockEdgeSource { rx, reader })
    }
}

/// Edge stream for one mock reader.
#[derive(Debug)]
pub struct MockEdgeSource {
    rx: broadcast::Receiver<Edge>,
    reader: ReaderId,
}

impl EdgeSource for MockEdgeSource {
    async fn next_edge(&mut self) -> Result<Edge> {
        loop {
            match self.rx.recv().await {
                Ok(edge) => return Ok(edge),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(reader = %self.reader, missed, "edge burst overflowed; edges dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(HardwareError::disconnected(format!(
                        "reader {} edge channel",
                        self.reader
                    )));
                }
            }
        }
    }
}

/// Handle for injecting edges into mock readers.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    senders: Vec<broadcast::Sender<Edge>>,
}

impl MockReaderHandle {
    /// Inject a single falling edge.
    pub fn edge(&self, reader: ReaderId, line: WiegandLine, tick_us: u64) {
        // No subscriber just means the edge falls on deaf ears, as it
        // would with the decoders stopped.
        let _ = self.senders[reader.relay_index()].send(Edge { line, tick_us });
    }

    /// Emit a raw frame MSB-first with normal inter-bit spacing.
    pub fn send_raw_frame(&self, reader: ReaderId, frame: u64, bits: u8, start_tick_us: u64) {
        for i in 0..bits {
            let bit = (frame >> (bits - 1 - i)) & 1;
            let line = if bit == 1 {
                WiegandLine::Data1
            } else {
                WiegandLine::Data0
            };
            self.edge(reader, line, start_tick_us + u64::from(i) * BIT_SPACING_US);
        }
    }

    /// Emit a parity-correct frame for a card value.
    ///
    /// # Errors
    /// Returns an error if `bits` is unsupported or the card does not fit.
    pub fn present_card(&self, reader: ReaderId, card: u64, bits: u8, start_tick_us: u64) -> Result<()> {
        let frame = encode_frame(card, bits).ok_or_else(|| {
            HardwareError::invalid_data(format!("card {card} does not fit a {bits}-bit frame"))
        })?;
        self.send_raw_frame(reader, frame, bits, start_tick_us);
        Ok(())
    }
}
