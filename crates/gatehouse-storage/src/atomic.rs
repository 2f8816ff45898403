//! Atomic JSON file update helpers.
//!
//! Writes go to `<file>.tmp`, are fsynced, then renamed over the
//! original. Readers see either the old contents or the new, never a
//! torn write.

use crate::error::{StorageError, StorageResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Serialize `data` as pretty JSON and atomically replace `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(data)?;
    replace_file(path, &json)
}

/// Atomically replace `path` with raw bytes.
pub fn replace_file(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let tmp = tmp_path(path);
    let as_str = |p: &Path| p.display().to_string();

    let mut file = File::create(&tmp).map_err(|e| StorageError::io(as_str(&tmp), e))?;
    file.write_all(contents)
        .map_err(|e| StorageError::io(as_str(&tmp), e))?;
    file.sync_all().map_err(|e| StorageError::io(as_str(&tmp), e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| StorageError::io(as_str(path), e))?;
    Ok(())
}

/// Read and deserialize `path`, returning `default` when the file is
/// missing or unreadable.
///
/// A present-but-corrupt file is treated the same as a missing one: the
/// default wins and a warning is logged, so a damaged store never keeps
/// the controller from booting.
pub fn read_json_or_default<T: DeserializeOwned>(path: &Path, default: T) -> T {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(error) => {
                warn!(path = %path.display(), %error, "corrupt JSON file; using defaults");
                default
            }
        },
        Err(_) => default,
    }
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    os.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut data = BTreeMap::new();
        data.insert("a".to_string(), 1u32);
        write_json_atomic(&path, &data).unwrap();

        let back: BTreeMap<String, u32> = read_json_or_default(&path, BTreeMap::new());
        assert_eq!(back, data);
    }

    #[test]
    fn test_replace_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4, 5, 6]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("data.json")]);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempdir().unwrap();
        let value: Vec<u8> = read_json_or_default(&dir.path().join("absent.json"), vec![9]);
        assert_eq!(value, vec![9]);
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").unwrap();

        let value: Vec<u8> = read_json_or_default(&path, vec![7]);
        assert_eq!(value, vec![7]);
    }
}
