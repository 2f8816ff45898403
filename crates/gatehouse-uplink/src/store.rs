//! Contract with the remote document store.
//!
//! The concrete client (the cloud SDK) is an external collaborator; this
//! trait pins down the one operation the pipeline needs. The remote
//! attaches its own server-side creation timestamp to each document and
//! generates the document id.

#![allow(async_fn_in_trait)]

use crate::error::UplinkResult;
use gatehouse_core::Transaction;

/// Remote-generated identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId(pub String);

/// Write access to the remote transaction collection.
pub trait DocumentStore: Send + Sync + 'static {
    /// Store one transaction, tagged with the deployment's entity id.
    ///
    /// The local transaction fields are sent as-is; the server adds its
    /// own creation timestamp. Callers bound this with a timeout.
    ///
    /// # Errors
    /// Returns an error when the remote rejects or cannot confirm the
    /// write; the caller downgrades to the retry cache.
    async fn add(&self, tx: &Transaction, entity_id: &str) -> UplinkResult<DocumentId>;
}
