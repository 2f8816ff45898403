//! Per-day decision counters (`daily_stats.json`).
//!
//! A small cache so `GET /get_today_stats` does not rescan today's log.
//! The file keeps the historical on-disk shape: a map of `YYYY-MM-DD` to
//! `{date, valid_entries, invalid_entries, blocked_entries}`.

use crate::atomic::{read_json_or_default, write_json_atomic};
use crate::error::StorageResult;
use chrono::{DateTime, Utc};
use gatehouse_core::AccessStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const STATS_FILE: &str = "daily_stats.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DayCounters {
    #[serde(default)]
    date: String,
    #[serde(default)]
    valid_entries: u64,
    #[serde(default)]
    invalid_entries: u64,
    #[serde(default)]
    blocked_entries: u64,
}

/// Today's aggregate, as returned by `GET /get_today_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayStats {
    pub total: u64,
    pub granted: u64,
    pub denied: u64,
    pub blocked: u64,
}

/// Daily decision counters with atomic persistence.
#[derive(Debug)]
pub struct DailyStats {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DailyStats {
    #[must_use]
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: base_dir.join(STATS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Bump the counter for a decision made at `timestamp`.
    pub fn record(&self, status: AccessStatus, timestamp: i64) -> StorageResult<()> {
        let _guard = self.lock.lock().expect("daily stats lock poisoned");
        let day = day_key(timestamp);

        let mut stats: BTreeMap<String, DayCounters> =
            read_json_or_default(&self.path, BTreeMap::new());
        let counters = stats.entry(day.clone()).or_insert_with(|| DayCounters {
            date: day,
            ..DayCounters::default()
        });
        match status {
            AccessStatus::Granted => counters.valid_entries += 1,
            AccessStatus::Denied => counters.invalid_entries += 1,
            AccessStatus::Blocked => counters.blocked_entries += 1,
        }

        write_json_atomic(&self.path, &stats)
    }

    /// Counters for the day containing `timestamp` (zeroes when absent).
    #[must_use]
    pub fn for_day(&self, timestamp: i64) -> TodayStats {
        let _guard = self.lock.lock().expect("daily stats lock poisoned");
        let stats: BTreeMap<String, DayCounters> =
            read_json_or_default(&self.path, BTreeMap::new());

        match stats.get(&day_key(timestamp)) {
            Some(c) => TodayStats {
                total: c.valid_entries + c.invalid_entries + c.blocked_entries,
                granted: c.valid_entries,
                denied: c.invalid_entries,
                blocked: c.blocked_entries,
            },
            None => TodayStats::default(),
        }
    }

    /// Whether the stats file exists on disk.
    #[must_use]
    pub fn file_exists(&self) -> bool {
        self.path.exists()
    }
}

fn day_key(timestamp: i64) -> String {
    let day = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    day.format("%Y-%m-%d").to_string()
}
