//! Background drainer of the failed-upload cache.
//!
//! Wakes on a slow schedule (1 minute after startup, then 5 minutes
//! while reachable, 10 while not), retries every cached transaction with
//! a small inter-request delay, and atomically rewrites the cache with
//! whatever still fails. It shares nothing with the hot-path queue, so a
//! blocked remote can never back-pressure access decisions.

use crate::probe::ReachabilityProbe;
use crate::store::DocumentStore;
use crate::uploader::attempt_upload;
use gatehouse_core::Transaction;
use gatehouse_storage::{ConfigStore, FailedUploadCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Wake-up cadence and pacing for the drainer.
#[derive(Debug, Clone)]
pub struct DrainerSchedule {
    /// Delay before the first tick after startup.
    pub initial_delay: Duration,
    /// Interval between ticks while the remote is reachable.
    pub online_interval: Duration,
    /// Interval between ticks while offline.
    pub offline_interval: Duration,
    /// Pause between consecutive uploads within one tick.
    pub inter_upload_delay: Duration,
}

impl Default for DrainerSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            online_interval: Duration::from_secs(300),
            offline_interval: Duration::from_secs(600),
            inter_upload_delay: Duration::from_millis(500),
        }
    }
}

/// Retries cached transactions whenever the remote is reachable.
pub struct CacheDrainer<S: DocumentStore> {
    remote: Option<Arc<S>>,
    probe: Arc<ReachabilityProbe>,
    cache: Arc<FailedUploadCache>,
    config: Arc<ConfigStore>,
    schedule: DrainerSchedule,
    upload_timeout: Duration,
}

impl<S: DocumentStore> CacheDrainer<S> {
    #[must_use]
    pub fn new(
        remote: Option<Arc<S>>,
        probe: Arc<ReachabilityProbe>,
        cache: Arc<FailedUploadCache>,
        config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            remote,
            probe,
            cache,
            config,
            schedule: DrainerSchedule::default(),
            upload_timeout: Duration::from_secs(5),
        }
    }

    /// Override the schedule (tests tighten it).
    #[must_use]
    pub fn with_schedule(mut self, schedule: DrainerSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Run forever on the configured schedule.
    pub async fn run(self) {
        tokio::time::sleep(self.schedule.initial_delay).await;
        loop {
            let online = match self.remote {
                Some(_) => self.probe.is_reachable().await,
                None => false,
            };

            if online {
                self.drain_once().await;
                tokio::time::sleep(self.schedule.online_interval).await;
            } else {
                tokio::time::sleep(self.schedule.offline_interval).await;
            }
        }
    }

    /// One drain pass: attempt every cached entry, rewrite the cache with
    /// the failures. Public so tests can tick the drainer directly.
    pub async fn drain_once(&self) {
        let Some(remote) = self.remote.as_deref() else {
            return;
        };

        let pending = self.cache.load();
        if pending.is_empty() {
            return;
        }
        info!(count = pending.len(), "processing cached transactions");

        let mut uploaded = 0usize;
        let mut still_failing: Vec<Transaction> = Vec::new();

        for tx in pending {
            match attempt_upload(remote, &tx, &self.config, self.upload_timeout).await {
                Ok(()) => uploaded += 1,
                Err(error) => {
                    warn!(card = %tx.card, %error, "cached transaction still failing");
                    still_failing.push(tx);
                }
            }
            tokio::time::sleep(self.schedule.inter_upload_delay).await;
        }

        if let Err(error) = self.cache.rewrite(&still_failing) {
            error!(%error, "failed to rewrite upload cache");
            return;
        }
        info!(uploaded, remaining = still_failing.len(), "drain pass complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use gatehouse_core::{AccessStatus, CardNumber, ReaderId};
    use gatehouse_storage::RuntimeConfig;
    use tempfile::tempdir;

    fn tx(card: &str) -> Transaction {
        Transaction::new(
            "John",
            CardNumber::new(card).unwrap(),
            ReaderId::new(1).unwrap(),
            AccessStatus::Granted,
            1_700_000_000,
        )
    }

    fn fast_schedule() -> DrainerSchedule {
        DrainerSchedule {
            initial_delay: Duration::from_millis(1),
            online_interval: Duration::from_millis(10),
            offline_interval: Duration::from_millis(10),
            inter_upload_delay: Duration::from_millis(1),
        }
    }

    fn drainer(
        dir: &std::path::Path,
        store: &MockStore,
        cache: &Arc<FailedUploadCache>,
    ) -> CacheDrainer<MockStore> {
        let config = Arc::new(ConfigStore::load(dir, RuntimeConfig::default()).unwrap());
        CacheDrainer::new(
            Some(Arc::new(store.clone())),
            Arc::new(ReachabilityProbe::new("127.0.0.1:1")),
            Arc::clone(cache),
            config,
        )
        .with_schedule(fast_schedule())
    }

    #[tokio::test]
    async fn test_drain_uploads_everything_and_removes_cache() {
        let dir = tempdir().unwrap();
        let store = MockStore::new();
        let cache = Arc::new(FailedUploadCache::new(dir.path()));
        for i in 0..3 {
            cache.append(&tx(&format!("{i}"))).unwrap();
        }

        drainer(dir.path(), &store, &cache).drain_once().await;

        assert_eq!(store.documents().len(), 3);
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn test_drain_keeps_failures_in_cache() {
        let dir = tempdir().unwrap();
        let store = MockStore::new();
        store.set_failing(true);
        let cache = Arc::new(FailedUploadCache::new(dir.path()));
        cache.append(&tx("1")).unwrap();
        cache.append(&tx("2")).unwrap();

        let drainer = drainer(dir.path(), &store, &cache);
        drainer.drain_once().await;

        assert!(store.documents().is_empty());
        assert_eq!(cache.load().len(), 2);

        // Remote recovers: the next pass drains fully.
        store.set_failing(false);
        drainer.drain_once().await;
        assert_eq!(store.documents().len(), 2);
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn test_drain_with_empty_cache_is_a_noop() {
        let dir = tempdir().unwrap();
        let store = MockStore::new();
        let cache = Arc::new(FailedUploadCache::new(dir.path()));

        drainer(dir.path(), &store, &cache).drain_once().await;
        assert!(store.documents().is_empty());
    }
}
