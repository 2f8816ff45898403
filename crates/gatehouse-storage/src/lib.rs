//! Persistence layer: JSON files under a single base directory.
//!
//! Every mutating write goes through temp-file + fsync + rename, so a
//! reader always sees either the old file or the new one. In-memory
//! copies are the read path; disk is the crash-recovery source.
//!
//! Files managed here:
//! - `users.json` / `blocked_users.json` — card holder map and blocklist
//! - `config.json` — runtime configuration
//! - `daily_stats.json` — per-day decision counters
//! - `transactions/transactions_YYYYMMDD.jsonl` — append-only daily logs
//! - `failed_transactions_cache.jsonl` — pending remote uploads

pub mod atomic;
pub mod cache;
pub mod config;
pub mod error;
pub mod stats;
pub mod txlog;
pub mod users;

pub use cache::FailedUploadCache;
pub use config::{ConfigStore, EntryExitConfig, RuntimeConfig, WiegandBits};
pub use error::{StorageError, StorageResult};
pub use stats::{DailyStats, TodayStats};
pub use txlog::TransactionLog;
pub use users::{UserRecord, UserStore};
