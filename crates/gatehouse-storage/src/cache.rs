//! Crash-safe cache of transactions awaiting remote upload.
//!
//! A JSON Lines file under the base directory. Appends flush before
//! returning; rewrites go through temp-file + rename so a crash leaves
//! either the old cache or the new one. An entry present here has not
//! been confirmed by the remote.

use crate::atomic::replace_file;
use crate::error::{StorageError, StorageResult};
use gatehouse_core::Transaction;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

const CACHE_FILE: &str = "failed_transactions_cache.jsonl";

/// Persistent queue of transactions the remote has not accepted.
#[derive(Debug)]
pub struct FailedUploadCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailedUploadCache {
    #[must_use]
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: base_dir.join(CACHE_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Append one transaction and flush.
    pub fn append(&self, tx: &Transaction) -> StorageResult<()> {
        let _guard = self.lock.lock().expect("upload cache lock poisoned");
        let as_str = self.path.display().to_string();

        let line = serde_json::to_string(tx)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::io(as_str.clone(), e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .map_err(|e| StorageError::io(as_str, e))?;

        info!(card = %tx.card, status = %tx.status, "transaction cached for retry");
        Ok(())
    }

    /// Load every cached transaction, skipping corrupt lines.
    #[must_use]
    pub fn load(&self) -> Vec<Transaction> {
        let _guard = self.lock.lock().expect("upload cache lock poisoned");
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Transaction>(line) {
                Ok(tx) => out.push(tx),
                Err(error) => {
                    warn!(path = %self.path.display(), %error, "skipping corrupt cache line");
                }
            }
        }
        out
    }

    /// Replace the cache with the still-failing entries.
    ///
    /// An empty `remaining` deletes the file.
    pub fn rewrite(&self, remaining: &[Transaction]) -> StorageResult<()> {
        let _guard = self.lock.lock().expect("upload cache lock poisoned");

        if remaining.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => info!("upload cache drained; file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io(self.path.display().to_string(), e)),
            }
            return Ok(());
        }

        let mut contents = Vec::new();
        for tx in remaining {
            serde_json::to_writer(&mut contents, tx)?;
            contents.push(b'\n');
        }
        replace_file(&self.path, &contents)?;
        info!(remaining = remaining.len(), "upload cache rewritten");
        Ok(())
    }

    /// Whether the cache file currently exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::{AccessStatus, CardNumber, ReaderId};
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

    #[test]
    fn test_append_load_round_trip() {
        let dir = tempdir().unwrap();
        let cache = FailedUploadCache::new(dir.path());

        cache.append(&tx("1")).unwrap();
        cache.append(&tx("2")).unwrap();
        cache.append(&tx("3")).unwrap();

        let loaded = cache.load();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].card.as_str(), "1");
        assert_eq!(loaded[2].card.as_str(), "3");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cache = FailedUploadCache::new(dir.path());
        assert!(cache.load().is_empty());
        assert!(!cache.exists());
    }

    #[test]
    fn test_load_skips_corrupt_lines() {
        let dir = tempdir().unwrap();
        let cache = FailedUploadCache::new(dir.path());

        cache.append(&tx("1")).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(dir.path().join(CACHE_FILE))
                .unwrap();
            file.write_all(b"garbage\n").unwrap();
        }
        cache.append(&tx("2")).unwrap();

        let loaded = cache.load();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_rewrite_keeps_only_remaining() {
        let dir = tempdir().unwrap();
        let cache = FailedUploadCache::new(dir.path());

        cache.append(&tx("1")).unwrap();
        cache.append(&tx("2")).unwrap();
        cache.append(&tx("3")).unwrap();

        cache.rewrite(&[tx("2")]).unwrap();
        let loaded = cache.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].card.as_str(), "2");
    }

    #[test]
    fn test_rewrite_empty_deletes_file() {
        let dir = tempdir().unwrap();
        let cache = FailedUploadCache::new(dir.path());

        cache.append(&tx("1")).unwrap();
        assert!(cache.exists());

        cache.rewrite(&[]).unwrap();
        assert!(!cache.exists());

        // Deleting an absent cache is not an error.
        cache.rewrite(&[]).unwrap();
    }

    #[test]
    fn test_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let cache = FailedUploadCache::new(dir.path());
            cache.append(&tx("1")).unwrap();
            cache.append(&tx("2")).unwrap();
        }

        let cache = FailedUploadCache::new(dir.path());
        assert_eq!(cache.load().len(), 2);
    }
}
