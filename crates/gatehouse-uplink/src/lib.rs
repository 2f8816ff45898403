//! Upload pipeline: ship transactions to the remote document store,
//! falling back to the crash-safe local cache whenever the remote cannot
//! confirm a write.
//!
//! Two independent paths share the cache but never a channel:
//! - the [`Uploader`] consumes the hot-path queue fed by the policy
//!   engine and makes exactly one attempt per transaction;
//! - the [`CacheDrainer`] wakes on a slow schedule and retries whatever
//!   the cache holds.
//!
//! Delivery is at-least-once: a crash between remote ack and cache
//! rewrite can duplicate a document, and downstream consumers rely on
//! the remote-generated document id to cope.

pub mod drainer;
pub mod error;
pub mod mock;
pub mod probe;
pub mod store;
pub mod uploader;

pub use drainer::{CacheDrainer, DrainerSchedule};
pub use error::{UplinkError, UplinkResult};
pub use probe::ReachabilityProbe;
pub use store::{DocumentId, DocumentStore};
pub use uploader::Uploader;
