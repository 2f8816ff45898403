//! Recording mock of the remote document store.

use crate::error::{UplinkError, UplinkResult};
use crate::store::{DocumentId, DocumentStore};
use gatehouse_core::Transaction;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockStoreInner {
    documents: Vec<(Transaction, String)>,
    failing: bool,
}

/// Mock document store for tests.
///
/// Clones share state: hand one clone to the pipeline and keep another
/// to flip failure mode and inspect uploads.
///
/// # Examples
///
/// ```
/// use gatehouse_uplink::mock::MockStore;
/// use gatehouse_uplink::store::DocumentStore;
/// # use gatehouse_core::{AccessStatus, CardNumber, ReaderId, Transaction};
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = MockStore::new();
/// let tx = Transaction::new(
///     "John",
///     CardNumber::new("123").unwrap(),
///     ReaderId::new(1).unwrap(),
///     AccessStatus::Granted,
///     1_700_000_000,
/// );
///
/// store.add(&tx, "site-a").await.unwrap();
/// assert_eq!(store.documents().len(), 1);
///
/// store.set_failing(true);
/// assert!(store.add(&tx, "site-a").await.is_err());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

impl MockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().expect("mock store lock poisoned").failing = failing;
    }

    /// Every document accepted so far, with its entity id.
    #[must_use]
    pub fn documents(&self) -> Vec<(Transaction, String)> {
        self.inner
            .lock()
            .expect("mock store lock poisoned")
            .documents
            .clone()
    }
}

impl DocumentStore for MockStore {
    async fn add(&self, tx: &Transaction, entity_id: &str) -> UplinkResult<DocumentId> {
        let mut inner = self.inner.lock().expect("mock store lock poisoned");
        if inner.failing {
            return Err(UplinkError::write_failed("mock store set to fail"));
        }
        inner.documents.push((tx.clone(), entity_id.to_string()));
        Ok(DocumentId(format!("doc-{}", inner.documents.len())))
    }
}
