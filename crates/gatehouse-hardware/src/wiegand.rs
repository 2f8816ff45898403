//! Wiegand frame assembly and decoding.
//!
//! Each reader pulses one of two lines per bit (D0 = `0`, D1 = `1`).
//! A frame is complete when the configured bit count has arrived; a gap
//! longer than the configured timeout between bits discards the partial
//! frame and the late edge starts a new one.
//!
//! # Frame layout
//!
//! The first bit received is the leading parity bit, the last is the
//! trailing parity bit, and the data bits in between are read big-endian:
//!
//! - 26-bit: leading even parity over data bits 1..12, trailing odd
//!   parity over data bits 13..24.
//! - 34-bit: leading even parity over data bits 1..16, trailing odd
//!   parity over data bits 17..32.
//!
//! The decimal rendering of the data value is the card identity.

use crate::error::{HardwareError, Result};
use crate::traits::{EdgePort, EdgeSource};
use gatehouse_core::constants::{
    MAX_WIEGAND_TIMEOUT_MS, MIN_WIEGAND_TIMEOUT_MS, READER_COUNT, WIEGAND_BITS_26, WIEGAND_BITS_34,
};
use gatehouse_core::{CardNumber, ReaderId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Pause between tearing decoders down and restarting them.
const RESTART_SETTLE: Duration = Duration::from_millis(100);

/// A validated card read, emitted to the policy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardScan {
    pub card: CardNumber,
    pub reader: ReaderId,
}

/// Validate a completed frame and extract the card value.
///
/// Returns `None` when the width is unsupported or a parity check fails.
#[must_use]
pub fn decode_frame(bits: u8, value: u64) -> Option<u64> {
    let data_bits = data_bits_for(bits)?;
    let half = data_bits / 2;

    let data = (value >> 1) & mask(data_bits);
    let leading = (value >> (data_bits + 1)) & 1;
    let trailing = value & 1;

    let first_half = data >> half;
    let second_half = data & mask(half);

    let leading_ok = (first_half.count_ones() % 2 == 0) == (leading == 0);
    let trailing_ok = (second_half.count_ones() % 2 == 1) == (trailing == 1);

    (leading_ok && trailing_ok).then_some(data)
}

/// Build a parity-correct frame for a card value (test and mock helper).
///
/// Returns `None` when the width is unsupported or the value does not fit
/// in the frame's data bits.
#[must_use]
pub fn encode_frame(card: u64, bits: u8) -> Option<u64> {
    let data_bits = data_bits_for(bits)?;
    if data_bits < 64 && card > mask(data_bits) {
        return None;
    }
    let half = data_bits / 2;

    let first_half = card >> half;
    let second_half = card & mask(half);

    let leading = u64::from(first_half.count_ones() % 2);
    let trailing = u64::from(second_half.count_ones() % 2);

    Some((leading << (data_bits + 1)) | (card << 1) | trailing)
}

fn data_bits_for(bits: u8) -> Option<u32> {
    match bits {
        WIEGAND_BITS_26 => Some(24),
        WIEGAND_BITS_34 => Some(32),
        _ => None,
    }
}

fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

/// Accumulates edge bits into frames, enforcing the inter-bit timeout.
#[derive(Debug)]
pub struct FrameAccumulator {
    expected_bits: u8,
    timeout_us: u64,
    value: u64,
    bits: u8,
    last_tick: Option<u64>,
}

impl FrameAccumulator {
    #[must_use]
    pub fn new(expected_bits: u8, timeout_ms: u64) -> Self {
        Self {
            expected_bits,
            timeout_us: timeout_ms * 1000,
            value: 0,
            bits: 0,
            last_tick: None,
        }
    }

    /// Push one bit. Returns the raw `(bits, value)` frame when complete.
    ///
    /// A gap longer than the timeout discards the stale partial frame;
    /// the pushed bit then starts a fresh one.
    pub fn push(&mut self, bit: u8, tick_us: u64) -> Option<(u8, u64)> {
        if let Some(last) = self.last_tick
            && tick_us.saturating_sub(last) > self.timeout_us
        {
            self.value = 0;
            self.bits = 0;
        }

        self.value = (self.value << 1) | u64::from(bit & 1);
        self.bits += 1;
        self.last_tick = Some(tick_us);

        if self.bits == self.expected_bits {
            let frame = (self.bits, self.value);
            self.value = 0;
            self.bits = 0;
            Some(frame)
        } else {
            None
        }
    }
}

/// Per-reader Wiegand bit widths and the shared inter-bit timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Bit width per reader, indexed by `reader - 1`.
    pub bits: [u8; READER_COUNT as usize],

    /// Inter-bit gap after which a partial frame is discarded.
    pub timeout_ms: u64,
}

impl DecoderConfig {
    /// Validate widths and timeout against the supported ranges.
    ///
    /// # Errors
    /// Returns an error if any width is not 26 or 34, or the timeout is
    /// outside 10..=100 ms.
    pub fn validate(&self) -> Result<()> {
        for (i, bits) in self.bits.iter().enumerate() {
            if !matches!(*bits, WIEGAND_BITS_26 | WIEGAND_BITS_34) {
                return Err(HardwareError::invalid_data(format!(
                    "reader_{}: bit width must be 26 or 34, got {bits}",
                    i + 1
                )));
            }
        }
        if !(MIN_WIEGAND_TIMEOUT_MS..=MAX_WIEGAND_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(HardwareError::invalid_data(format!(
                "wiegand_timeout_ms must be {MIN_WIEGAND_TIMEOUT_MS}-{MAX_WIEGAND_TIMEOUT_MS}, got {}",
                self.timeout_ms
            )));
        }
        Ok(())
    }

    /// Bit width configured for a reader.
    #[must_use]
    pub fn bits_for(&self, reader: ReaderId) -> u8 {
        self.bits[usize::from(reader.as_u8()) - 1]
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            bits: [WIEGAND_BITS_26; READER_COUNT as usize],
            timeout_ms: 25,
        }
    }
}

/// Decoder task for one reader.
///
/// Consumes edges until the source disconnects or the scan channel closes.
/// Per-frame failures (parity, timeout resets) never terminate the task.
pub struct WiegandDecoder<S: EdgeSource> {
    source: S,
    reader: ReaderId,
    accumulator: FrameAccumulator,
    scan_tx: mpsc::Sender<CardScan>,
}

impl<S: EdgeSource> WiegandDecoder<S> {
    #[must_use]
    pub fn new(source: S, reader: ReaderId, bits: u8, timeout_ms: u64, scan_tx: mpsc::Sender<CardScan>) -> Self {
        Self {
            source,
            reader,
            accumulator: FrameAccumulator::new(bits, timeout_ms),
            scan_tx,
        }
    }

    /// Run until the edge source disconnects or the scan channel closes.
    pub async fn run(mut self) {
        loop {
            let edge = match self.source.next_edge().await {
                Ok(edge) => edge,
                Err(HardwareError::Disconnected { device }) => {
                    debug!(reader = %self.reader, %device, "edge source closed; decoder stopping");
                    return;
                }
                Err(error) => {
                    warn!(reader = %self.reader, %error, "edge read failed");
                    continue;
                }
            };

            let Some((bits, raw)) = self.accumulator.push(edge.line.bit(), edge.tick_us) else {
                continue;
            };

            match decode_frame(bits, raw) {
                Some(value) => {
                    let scan = CardScan {
                        card: CardNumber::from_raw(value),
                        reader: self.reader,
                    };
                    if self.scan_tx.send(scan).await.is_err() {
                        debug!(reader = %self.reader, "scan channel closed; decoder stopping");
                        return;
                    }
                }
                None => {
                    warn!(reader = %self.reader, bits, "parity check failed; frame dropped");
                }
            }
        }
    }
}

/// Owns the per-reader decoder tasks and restarts them on config change.
///
/// A restart aborts the running tasks (in-flight partial frames die with
/// them), waits briefly for the lines to settle, then opens fresh edge
/// sources with the new widths.
pub struct DecoderSupervisor<P: EdgePort> {
    port: P,
    scan_tx: mpsc::Sender<CardScan>,
    tasks: JoinSet<()>,
}

impl<P: EdgePort> DecoderSupervisor<P> {
    #[must_use]
    pub fn new(port: P, scan_tx: mpsc::Sender<CardScan>) -> Self {
        Self {
            port,
            scan_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Spawn one decoder task per reader.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or a reader's edge lines
    /// cannot be claimed.
    pub fn start(&mut self, config: &DecoderConfig) -> Result<()> {
        config.validate()?;

        for id in 1..=READER_COUNT {
            let reader = ReaderId::new(id)
                .map_err(|e| HardwareError::initialization_failed(e.to_string()))?;
            let source = self.port.open(reader)?;
            let decoder = WiegandDecoder::new(
                source,
                reader,
                config.bits_for(reader),
                config.timeout_ms,
                self.scan_tx.clone(),
            );
            self.tasks.spawn(decoder.run());
        }
        debug!(timeout_ms = config.timeout_ms, "wiegand decoders started");
        Ok(())
    }

    /// Tear down and restart all decoders with a new config.
    ///
    /// # Errors
    /// Returns an error if the new config is invalid or the edge sources
    /// cannot be reopened; the old decoders are already gone either way.
    pub async fn restart(&mut self, config: &DecoderConfig) -> Result<()> {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        tokio::time::sleep(RESTART_SETTLE).await;
        self.start(config)
    }

    /// Number of live decoder tasks.
    #[must_use]
    pub fn running(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(12345678, 26)]
    #[case(0, 26)]
    #[case(0xFF_FFFF, 26)]
    #[case(12345678, 34)]
    #[case(0xFFFF_FFFF, 34)]
    fn test_encode_decode_round_trip(#[case] card: u64, #[case] bits: u8) {
        let frame = encode_frame(card, bits).unwrap();
        assert_eq!(decode_frame(bits, frame), Some(card));
    }

    #[test]
    fn test_decode_rejects_flipped_parity() {
        let frame = encode_frame(12345678, 26).unwrap();
        // Flip the leading parity bit (bit 25)
        assert_eq!(decode_frame(26, frame ^ (1 << 25)), None);
        // Flip the trailing parity bit
        assert_eq!(decode_frame(26, frame ^ 1), None);
        // Flip one data bit
        assert_eq!(decode_frame(26, frame ^ (1 << 5)), None);
    }

    #[test]
    fn test_decode_rejects_unsupported_width() {
        assert_eq!(decode_frame(32, 0), None);
        assert_eq!(encode_frame(1, 27), None);
    }

    #[test]
    fn test_encode_rejects_oversized_card() {
        assert_eq!(encode_frame(1 << 24, 26), None);
        assert!(encode_frame((1 << 24) - 1, 26).is_some());
    }

    #[test]
    fn test_accumulator_completes_frame() {
        let mut acc = FrameAccumulator::new(26, 25);
        let frame = encode_frame(42, 26).unwrap();

        let mut result = None;
        for i in 0..26 {
            let bit = ((frame >> (25 - i)) & 1) as u8;
            result = acc.push(bit, 1000 + i * 200);
        }
        assert_eq!(result, Some((26, frame)));
    }

    #[test]
    fn test_accumulator_discards_stale_partial_frame() {
        let mut acc = FrameAccumulator::new(26, 25);

        // Three bits, then a gap well past 25ms
        acc.push(1, 0);
        acc.push(1, 200);
        acc.push(1, 400);

        let frame = encode_frame(42, 26).unwrap();
        let mut result = None;
        for i in 0..26 {
            let bit = ((frame >> (25 - i)) & 1) as u8;
            result = acc.push(bit, 1_000_000 + i * 200);
        }
        // The stale bits were dropped: exactly one clean frame came out.
        assert_eq!(result, Some((26, frame)));
    }

    #[test]
    fn test_decoder_config_validation() {
        let mut config = DecoderConfig::default();
        assert!(config.validate().is_ok());

        config.bits[1] = 34;
        assert!(config.validate().is_ok());

        config.bits[1] = 32;
        assert!(config.validate().is_err());

        config.bits[1] = 26;
        config.timeout_ms = 5;
        assert!(config.validate().is_err());
        config.timeout_ms = 101;
        assert!(config.validate().is_err());
    }
}
