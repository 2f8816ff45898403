//! Hot-path uploader: one attempt per transaction, cache on failure.

use crate::error::UplinkError;
use crate::probe::ReachabilityProbe;
use crate::store::DocumentStore;
use gatehouse_core::Transaction;
use gatehouse_storage::{ConfigStore, FailedUploadCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Consumes the policy engine's transaction queue.
///
/// Reachable and initialized: one bounded write attempt, then done or
/// cached. Offline or uninitialized: cached immediately. The cache is
/// the only retry mechanism; nothing is retried here.
pub struct Uploader<S: DocumentStore> {
    remote: Option<Arc<S>>,
    probe: Arc<ReachabilityProbe>,
    cache: Arc<FailedUploadCache>,
    config: Arc<ConfigStore>,
    upload_timeout: Duration,
}

impl<S: DocumentStore> Uploader<S> {
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
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    /// Override the per-write timeout (tests shorten it).
    #[must_use]
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Drain the queue until the sending side closes.
    pub async fn run(self, mut rx: mpsc::Receiver<Transaction>) {
        while let Some(tx) = rx.recv().await {
            self.handle(tx).await;
        }
        info!("transaction queue closed; uploader stopping");
    }

    async fn handle(&self, tx: Transaction) {
        let Some(remote) = self.remote.as_deref() else {
            self.to_cache(&tx);
            return;
        };
        if !self.probe.is_reachable().await {
            info!(card = %tx.card, "offline; transaction cached");
            self.to_cache(&tx);
            return;
        }

        match attempt_upload(remote, &tx, &self.config, self.upload_timeout).await {
            Ok(()) => {}
            Err(error) => {
                warn!(card = %tx.card, %error, "upload failed; transaction cached");
                self.to_cache(&tx);
            }
        }
    }

    fn to_cache(&self, tx: &Transaction) {
        if let Err(error) = self.cache.append(tx) {
            // Worst case: the transaction survives only in the local log.
            error!(card = %tx.card, %error, "failed to write upload cache");
        }
    }
}

/// One bounded write attempt against the remote.
pub(crate) async fn attempt_upload<S: DocumentStore>(
    remote: &S,
    tx: &Transaction,
    config: &ConfigStore,
    upload_timeout: Duration,
) -> Result<(), UplinkError> {
    let entity_id = config.get().entity_id;
    match tokio::time::timeout(upload_timeout, remote.add(tx, &entity_id)).await {
        Ok(Ok(id)) => {
            info!(card = %tx.card, status = %tx.status, doc = %id.0, "transaction uploaded");
            Ok(())
        }
        Ok(Err(error)) => Err(error),
        Err(_) => Err(UplinkError::timeout(upload_timeout.as_millis() as u64)),
    }
}
