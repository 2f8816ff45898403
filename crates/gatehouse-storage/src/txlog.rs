//! Append-only daily transaction log with size-capped eviction.
//!
//! One JSON Lines file per UTC day under `<base>/transactions/`, named
//! `transactions_YYYYMMDD.jsonl`. The target file is derived from each
//! transaction's own timestamp, so rotation is just the date changing.
//! Appends flush before returning and never touch the network.

use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use gatehouse_core::Transaction;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

const TX_DIR: &str = "transactions";
const TX_PREFIX: &str = "transactions_";
const TX_SUFFIX: &str = ".jsonl";

/// The daily transaction log directory.
#[derive(Debug)]
pub struct TransactionLog {
    dir: PathBuf,
    // Serializes appends, rotation and eviction.
    lock: Mutex<()>,
}

impl TransactionLog {
    /// Open (creating if needed) the transaction directory.
    pub fn open(base_dir: &Path) -> StorageResult<Self> {
        let dir = base_dir.join(TX_DIR);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// File name for the UTC day containing `timestamp`.
    #[must_use]
    pub fn file_name_for(timestamp: i64) -> String {
        let day = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
        format!("{TX_PREFIX}{}{TX_SUFFIX}", day.format("%Y%m%d"))
    }

    /// Append one transaction to its day's file and flush.
    pub fn append(&self, tx: &Transaction) -> StorageResult<()> {
        let _guard = self.lock.lock().expect("transaction log lock poisoned");
        let path = self.dir.join(Self::file_name_for(tx.timestamp));
        let as_str = path.display().to_string();

        let line = serde_json::to_string(tx)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(as_str.clone(), e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .map_err(|e| StorageError::io(as_str, e))?;
        Ok(())
    }

    /// Newest transactions first, at most `limit`, newest file first.
    ///
    /// Unparseable lines (including a torn final line from a crash
    /// mid-append) are skipped.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Transaction> {
        let _guard = self.lock.lock().expect("transaction log lock poisoned");
        let mut files = self.day_files();
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name())); // newest day first

        let mut out = Vec::new();
        for path in files {
            let Ok(file) = File::open(&path) else {
                continue;
            };
            let lines: Vec<String> = BufReader::new(file)
                .lines()
                .map_while(std::io::Result::ok)
                .collect();
            for line in lines.iter().rev() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Transaction>(line) {
                    Ok(tx) => {
                        out.push(tx);
                        if out.len() >= limit {
                            return out;
                        }
                    }
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping unparseable log line");
                    }
                }
            }
        }
        out
    }

    /// Total bytes across all day files.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.day_files()
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }

    /// Enforce the storage cap: when over `cap_bytes`, delete the oldest
    /// day files until at least `min(over, cap × cleanup_fraction)` bytes
    /// are freed. Today's file is never deleted.
    ///
    /// Returns the bytes freed.
    pub fn evict_to_cap(&self, cap_bytes: u64, cleanup_fraction: f64) -> StorageResult<u64> {
        let _guard = self.lock.lock().expect("transaction log lock poisoned");

        let mut files: Vec<(PathBuf, u64)> = self
            .day_files()
            .into_iter()
            .filter_map(|p| {
                let len = fs::metadata(&p).ok()?.len();
                Some((p, len))
            })
            .collect();
        files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name())); // oldest day first

        let total: u64 = files.iter().map(|(_, len)| len).sum();
        if total <= cap_bytes {
            return Ok(0);
        }

        let over = total - cap_bytes;
        let free_target = over.min((cap_bytes as f64 * cleanup_fraction) as u64).max(1);
        let today = Self::file_name_for(Utc::now().timestamp());

        let mut freed = 0u64;
        for (path, len) in files {
            if freed >= free_target {
                break;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(today.as_str()) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    freed += len;
                    info!(path = %path.display(), bytes = len, "purged transaction log file");
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to purge log file");
                }
            }
        }
        Ok(freed)
    }

    fn day_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(TX_PREFIX) && n.ends_with(TX_SUFFIX))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{AccessStatus, CardNumber, ReaderId};
    use tempfile::tempdir;

    fn tx(card: &str, timestamp: i64) -> Transaction {
        Transaction::new(
            "John",
            CardNumber::new(card).unwrap(),
            ReaderId::new(1).unwrap(),
            AccessStatus::Granted,
            timestamp,
        )
    }

    #[test]
    fn test_file_name_follows_utc_day() {
        // 2023-11-14T22:13:20Z
        assert_eq!(
            TransactionLog::file_name_for(1_700_000_000),
            "transactions_20231114.jsonl"
        );
    }

    #[test]
    fn test_append_and_read_back_in_order() {
        let dir = tempdir().unwrap();
        let log = TransactionLog::open(dir.path()).unwrap();

        let base = Utc::now().timestamp();
        for i in 0..5 {
            log.append(&tx(&format!("{i}"), base + i)).unwrap();
        }

        let recent = log.recent(3);
        let cards: Vec<_> = recent.iter().map(|t| t.card.as_str()).collect();
        assert_eq!(cards, vec!["4", "3", "2"]);
    }

    #[test]
    fn test_appends_split_across_days() {
        let dir = tempdir().unwrap();
        let log = TransactionLog::open(dir.path()).unwrap();

        log.append(&tx("1", 1_700_000_000)).unwrap(); // 2023-11-14
        log.append(&tx("2", 1_700_100_000)).unwrap(); // 2023-11-16

        let names: Vec<_> = std::fs::read_dir(dir.path().join("transactions"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"transactions_20231114.jsonl".to_string()));

        // Newest file is read first.
        let recent = log.recent(10);
        assert_eq!(recent[0].card.as_str(), "2");
        assert_eq!(recent[1].card.as_str(), "1");
    }

    #[test]
    fn test_recent_skips_torn_lines() {
        let dir = tempdir().unwrap();
        let log = TransactionLog::open(dir.path()).unwrap();

        let now = Utc::now().timestamp();
        log.append(&tx("1", now)).unwrap();

        // Simulate a crash mid-append: a torn trailing line.
        let path = dir
            .path()
            .join("transactions")
            .join(TransactionLog::file_name_for(now));
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(b"{\"name\":\"torn").unwrap();

        let recent = log.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].card.as_str(), "1");
    }

    #[test]
    fn test_restart_reads_back_identical_sequence() {
        let dir = tempdir().unwrap();
        let base = Utc::now().timestamp();
        let written: Vec<Transaction> = (0..4).map(|i| tx(&format!("{i}"), base + i)).collect();

        {
            let log = TransactionLog::open(dir.path()).unwrap();
            for t in &written {
                log.append(t).unwrap();
            }
        }

        let log = TransactionLog::open(dir.path()).unwrap();
        let mut read = log.recent(10);
        read.reverse(); // oldest first
        assert_eq!(read, written);
    }

    #[test]
    fn test_eviction_deletes_oldest_keeps_today() {
        let dir = tempdir().unwrap();
        let log = TransactionLog::open(dir.path()).unwrap();
        let tx_dir = dir.path().join("transactions");

        // Three old day files of ~1KiB each, plus today's.
        let payload = vec![b'x'; 1024];
        for name in [
            "transactions_20200101.jsonl",
            "transactions_20200102.jsonl",
            "transactions_20200103.jsonl",
        ] {
            std::fs::write(tx_dir.join(name), &payload).unwrap();
        }
        log.append(&tx("1", Utc::now().timestamp())).unwrap();

        // Cap at ~1.5KiB: must free at least half the cap.
        let freed = log.evict_to_cap(1536, 0.5).unwrap();
        assert!(freed >= 1024);
        assert!(!tx_dir.join("transactions_20200101.jsonl").exists());

        // Today's file survives.
        let today = TransactionLog::file_name_for(Utc::now().timestamp());
        assert!(tx_dir.join(today).exists());
    }

    #[test]
    fn test_eviction_noop_under_cap() {
        let dir = tempdir().unwrap();
        let log = TransactionLog::open(dir.path()).unwrap();
        log.append(&tx("1", Utc::now().timestamp())).unwrap();

        assert_eq!(log.evict_to_cap(u64::MAX, 0.5).unwrap(), 0);
        assert_eq!(log.recent(10).len(), 1);
    }
}
