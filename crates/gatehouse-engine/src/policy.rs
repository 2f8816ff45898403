//! The access policy engine.
//!
//! Executes a strict sequence of gates per scan, failing out at the
//! first that applies:
//!
//! 1. **Dedup gate**: a repeat scan inside the configured window is
//!    dropped silently.
//! 2. **Resolve**: one lock acquisition fetches the user record and
//!    blocklist membership.
//! 3. **Decision**: blocked wins over everything; a known user is
//!    granted and the paired relay pulsed (subject to the hold
//!    override); an unknown card is denied. The blocked check strictly
//!    precedes any relay actuation.
//! 4. **Entry/exit gate**: when enabled, suppresses the transaction
//!    until the per-card gap is satisfied.
//! 5. **Privacy gate**: a privacy-protected user keeps the grant but
//!    produces no persisted record of any kind.
//! 6. **Record**: append to the local log, bump the daily stats, and
//!    enqueue for upload. Recording failures are logged and never undo
//!    the actuation already performed; the upload queue is the only
//!    coupling to the network and it is non-blocking.

use crate::dedup::ScanDeduper;
use crate::tracker::EntryExitTracker;
use chrono::Utc;
use gatehouse_core::constants::{DEFAULT_PULSE_SECS, NAME_BLOCKED, NAME_UNKNOWN};
use gatehouse_core::{AccessStatus, Transaction};
use gatehouse_hardware::traits::OutputPin;
use gatehouse_hardware::{CardScan, RelayBank};
use gatehouse_storage::{ConfigStore, DailyStats, FailedUploadCache, TransactionLog, UserStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The per-scan decision pipeline.
pub struct AccessPolicy<P: OutputPin> {
    users: Arc<UserStore>,
    config: Arc<ConfigStore>,
    relays: RelayBank<P>,
    txlog: Arc<TransactionLog>,
    stats: Arc<DailyStats>,
    cache: Arc<FailedUploadCache>,
    upload_tx: mpsc::Sender<Transaction>,
    deduper: ScanDeduper,
    tracker: EntryExitTracker,
}

impl<P: OutputPin> AccessPolicy<P> {
    #[must_use]
    pub fn new(
        users: Arc<UserStore>,
        config: Arc<ConfigStore>,
        relays: RelayBank<P>,
        txlog: Arc<TransactionLog>,
        stats: Arc<DailyStats>,
        cache: Arc<FailedUploadCache>,
        upload_tx: mpsc::Sender<Transaction>,
    ) -> Self {
        Self {
            users,
            config,
            relays,
            txlog,
            stats,
            cache,
            upload_tx,
            deduper: ScanDeduper::new(),
            tracker: EntryExitTracker::new(),
        }
    }

    /// Consume scans until the decoder side closes.
    pub async fn run(self, mut scan_rx: mpsc::Receiver<CardScan>) {
        while let Some(scan) = scan_rx.recv().await {
            self.handle_scan(scan).await;
        }
        debug!("scan channel closed; policy engine stopping");
    }

    /// Apply the full gate sequence to one scan.
    pub async fn handle_scan(&self, scan: CardScan) {
        let CardScan { card, reader } = scan;
        let config = self.config.get();

        // 1. Dedup gate
        let window = Duration::from_secs(config.scan_delay_seconds);
        if !self.deduper.accept(&card, window) {
            debug!(%card, "duplicate scan ignored");
            return;
        }

        // 2. Resolve user and blocklist membership in one lock
        let lookup = self.users.lookup(&card);

        // 3. Decision — blocked wins, and is checked before any actuation
        let (status, name, privacy) = if lookup.blocked {
            (AccessStatus::Blocked, NAME_BLOCKED.to_string(), false)
        } else if let Some(user) = lookup.user {
            let pulse = Duration::from_secs_f64(DEFAULT_PULSE_SECS);
            match self.relays.pulse_auto(reader.relay_index(), pulse).await {
                Ok(_) => {}
                Err(error) => {
                    // Hardware transient: the decision stands, the log records it.
                    warn!(%card, %reader, %error, "relay actuation failed");
                }
            }
            (AccessStatus::Granted, user.name, user.privacy_protected)
        } else {
            (AccessStatus::Denied, NAME_UNKNOWN.to_string(), false)
        };
        info!(%card, %reader, %status, "access decision");

        // 4. Entry/exit gate
        if config.entry_exit_tracking.enabled {
            let gap = Duration::from_secs(config.entry_exit_tracking.min_gap_seconds);
            if !self.tracker.should_record(&card, gap) {
                info!(%card, "entry/exit gap not satisfied; transaction skipped");
                return;
            }
        }

        // 5. Privacy gate
        if privacy {
            info!(%card, "privacy protected; transaction suppressed");
            return;
        }

        // 6. Record
        let tx = Transaction::new(name, card, reader, status, Utc::now().timestamp());

        if let Err(error) = self.txlog.append(&tx) {
            error!(card = %tx.card, %error, "local transaction append failed");
        }
        if let Err(error) = self.stats.record(status, tx.timestamp) {
            error!(card = %tx.card, %error, "daily stats update failed");
        }

        // The queue must never back-pressure the hot path: on overflow
        // the transaction goes straight to the retry cache.
        if let Err(mpsc::error::TrySendError::Full(tx)) | Err(mpsc::error::TrySendError::Closed(tx)) =
            self.upload_tx.try_send(tx)
        {
            warn!(card = %tx.card, "upload queue unavailable; caching directly");
            if let Err(error) = self.cache.append(&tx) {
                error!(card = %tx.card, %error, "failed to cache transaction");
            }
        }
    }
}
