//! Periodic background workers: session sweep and storage cap
//! enforcement.

use crate::auth::SessionStore;
use gatehouse_storage::TransactionLog;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Minimum storage-monitor interval; checking more often buys nothing.
const MIN_STORAGE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Sweep expired sessions forever on the given interval.
pub async fn session_sweeper(sessions: Arc<SessionStore>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let removed = sessions.sweep();
        if removed > 0 {
            debug!(removed, "expired sessions swept");
        }
    }
}

/// Enforce the transaction-log storage cap forever.
pub async fn storage_monitor(
    txlog: Arc<TransactionLog>,
    cap_bytes: u64,
    cleanup_fraction: f64,
    interval: Duration,
) {
    let interval = interval.max(MIN_STORAGE_CHECK_INTERVAL);
    loop {
        let total = txlog.size_bytes();
        if total > cap_bytes {
            warn!(
                total_bytes = total,
                cap_bytes, "transaction storage over cap; purging oldest days"
            );
            match txlog.evict_to_cap(cap_bytes, cleanup_fraction) {
                Ok(freed) => debug!(freed, "storage eviction complete"),
                Err(error) => error!(%error, "storage eviction failed"),
            }
        }
        tokio::time::sleep(interval).await;
    }
}
