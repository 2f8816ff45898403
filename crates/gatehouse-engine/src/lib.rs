//! The access decision pipeline.
//!
//! Card scans flow from the Wiegand decoders into [`AccessPolicy`], which
//! applies the gates in a fixed order: scan-rate dedup, blocked-first
//! decision (with relay actuation on grant), entry/exit gating, privacy
//! suppression, and finally record fan-out to the local log, the daily
//! stats and the upload queue.
//!
//! The hot path never performs network I/O; the upload queue decouples it
//! from the remote store.

pub mod dedup;
pub mod policy;
pub mod tracker;

pub use dedup::ScanDeduper;
pub use policy::AccessPolicy;
pub use tracker::EntryExitTracker;
