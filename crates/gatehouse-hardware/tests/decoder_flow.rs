//! End-to-end decoder flow tests: edges in, card scans out.

use gatehouse_core::ReaderId;
use gatehouse_hardware::mock::MockEdgePort;
use gatehouse_hardware::wiegand::{DecoderConfig, DecoderSupervisor, encode_frame};
use gatehouse_hardware::{CardScan, WiegandLine};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

async fn recv_scan(rx: &mut mpsc::Receiver<CardScan>) -> CardScan {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for scan")
        .expect("scan channel closed")
}

async fn expect_no_scan(rx: &mut mpsc::Receiver<CardScan>) {
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "unexpected scan delivered"
    );
}

#[tokio::test]
async fn valid_frame_produces_scan() {
    let (port, handle) = MockEdgePort::new();
    let (tx, mut rx) = mpsc::channel(16);
    let mut supervisor = DecoderSupervisor::new(port, tx);
    supervisor.start(&DecoderConfig::default()).unwrap();

    let reader = ReaderId::new(1).unwrap();
    handle.present_card(reader, 12345678, 26, 0).unwrap();

    let scan = recv_scan(&mut rx).await;
    assert_eq!(scan.card.as_str(), "12345678");
    assert_eq!(scan.reader, reader);
}

#[tokio::test]
async fn parity_invalid_frame_is_dropped() {
    let (port, handle) = MockEdgePort::new();
    let (tx, mut rx) = mpsc::channel(16);
    let mut supervisor = DecoderSupervisor::new(port, tx);
    supervisor.start(&DecoderConfig::default()).unwrap();

    let reader = ReaderId::new(1).unwrap();
    let frame = encode_frame(12345678, 26).unwrap() ^ 1; // corrupt trailing parity
    handle.send_raw_frame(reader, frame, 26, 0);

    expect_no_scan(&mut rx).await;

    // The decoder keeps running: a clean frame still decodes.
    handle.present_card(reader, 42, 26, 1_000_000).unwrap();
    assert_eq!(recv_scan(&mut rx).await.card.as_str(), "42");
}

#[tokio::test]
async fn inter_bit_timeout_discards_partial_frame() {
    let (port, handle) = MockEdgePort::new();
    let (tx, mut rx) = mpsc::channel(16);
    let mut supervisor = DecoderSupervisor::new(port, tx);
    supervisor.start(&DecoderConfig::default()).unwrap();

    let reader = ReaderId::new(2).unwrap();

    // Half a frame, then silence past the 25ms timeout.
    handle.edge(reader, WiegandLine::Data1, 0);
    handle.edge(reader, WiegandLine::Data1, 200);
    handle.edge(reader, WiegandLine::Data0, 400);

    // A full clean frame after the gap decodes on its own.
    handle.present_card(reader, 777, 26, 10_000_000).unwrap();

    let scan = recv_scan(&mut rx).await;
    assert_eq!(scan.card.as_str(), "777");
    expect_no_scan(&mut rx).await;
}

#[tokio::test]
async fn scans_from_multiple_readers_carry_reader_id() {
    let (port, handle) = MockEdgePort::new();
    let (tx, mut rx) = mpsc::channel(16);
    let mut supervisor = DecoderSupervisor::new(port, tx);
    supervisor.start(&DecoderConfig::default()).unwrap();

    let r1 = ReaderId::new(1).unwrap();
    let r3 = ReaderId::new(3).unwrap();
    handle.present_card(r1, 1111, 26, 0).unwrap();
    let first = recv_scan(&mut rx).await;
    handle.present_card(r3, 3333, 26, 0).unwrap();
    let second = recv_scan(&mut rx).await;

    assert_eq!((first.card.as_str(), first.reader), ("1111", r1));
    assert_eq!((second.card.as_str(), second.reader), ("3333", r3));
}

#[tokio::test]
async fn restart_switches_frame_width() {
    let (port, handle) = MockEdgePort::new();
    let (tx, mut rx) = mpsc::channel(16);
    let mut supervisor = DecoderSupervisor::new(port, tx);
    supervisor.start(&DecoderConfig::default()).unwrap();

    let reader = ReaderId::new(1).unwrap();
    handle.present_card(reader, 555, 26, 0).unwrap();
    assert_eq!(recv_scan(&mut rx).await.card.as_str(), "555");

    // Hot-reload reader 1 to 34-bit frames.
    let mut config = DecoderConfig::default();
    config.bits[0] = 34;
    supervisor.restart(&config).await.unwrap();

    // A 26-bit frame no longer completes a 34-bit accumulator on its own
    // timeline; a proper 34-bit frame decodes.
    handle.present_card(reader, 555, 26, 50_000_000).unwrap();
    expect_no_scan(&mut rx).await;

    handle.present_card(reader, 987654321, 34, 100_000_000).unwrap();
    assert_eq!(recv_scan(&mut rx).await.card.as_str(), "987654321");
}
