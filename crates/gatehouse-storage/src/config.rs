//! Runtime configuration store with validation and atomic persistence.
//!
//! The config is a single JSON object (`config.json`) replaced atomically
//! on every update. Unknown keys are preserved-by-ignore on read; missing
//! keys take their defaults, so older files keep loading as fields are
//! added.

use crate::atomic::{read_json_or_default, write_json_atomic};
use crate::error::{StorageError, StorageResult};
use gatehouse_core::constants::{
    MAX_ENTRY_EXIT_GAP_SECS, MAX_SCAN_DELAY_SECS, MAX_WIEGAND_TIMEOUT_MS, MIN_ENTRY_EXIT_GAP_SECS,
    MIN_SCAN_DELAY_SECS, MIN_WIEGAND_TIMEOUT_MS, READER_COUNT, WIEGAND_BITS_26, WIEGAND_BITS_34,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CONFIG_FILE: &str = "config.json";

/// Per-reader Wiegand bit widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiegandBits {
    pub reader_1: u8,
    pub reader_2: u8,
    pub reader_3: u8,
}

impl WiegandBits {
    /// Widths as an array indexed by `reader - 1`.
    #[must_use]
    pub fn as_array(&self) -> [u8; READER_COUNT as usize] {
        [self.reader_1, self.reader_2, self.reader_3]
    }
}

impl Default for WiegandBits {
    fn default() -> Self {
        Self {
            reader_1: WIEGAND_BITS_26,
            reader_2: WIEGAND_BITS_26,
            reader_3: WIEGAND_BITS_26,
        }
    }
}

/// Entry/exit gating configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryExitConfig {
    pub enabled: bool,
    pub min_gap_seconds: u64,
}

impl Default for EntryExitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_gap_seconds: 300,
        }
    }
}

/// The persisted runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub wiegand_bits: WiegandBits,

    #[serde(default = "default_wiegand_timeout_ms")]
    pub wiegand_timeout_ms: u64,

    #[serde(default = "default_scan_delay_seconds")]
    pub scan_delay_seconds: u64,

    #[serde(default)]
    pub entry_exit_tracking: EntryExitConfig,

    #[serde(default = "default_entity_id")]
    pub entity_id: String,

    #[serde(default)]
    pub basic_auth_enabled: bool,
}

fn default_wiegand_timeout_ms() -> u64 {
    25
}

fn default_scan_delay_seconds() -> u64 {
    60
}

fn default_entity_id() -> String {
    "default_entity".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            wiegand_bits: WiegandBits::default(),
            wiegand_timeout_ms: default_wiegand_timeout_ms(),
            scan_delay_seconds: default_scan_delay_seconds(),
            entry_exit_tracking: EntryExitConfig::default(),
            entity_id: default_entity_id(),
            basic_auth_enabled: false,
        }
    }
}

impl RuntimeConfig {
    /// Validate every field against its allowed range.
    ///
    /// # Errors
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self) -> StorageResult<()> {
        for (name, bits) in [
            ("reader_1", self.wiegand_bits.reader_1),
            ("reader_2", self.wiegand_bits.reader_2),
            ("reader_3", self.wiegand_bits.reader_3),
        ] {
            if !matches!(bits, WIEGAND_BITS_26 | WIEGAND_BITS_34) {
                return Err(StorageError::validation(format!(
                    "Invalid bits for {name}. Must be 26 or 34."
                )));
            }
        }

        if !(MIN_WIEGAND_TIMEOUT_MS..=MAX_WIEGAND_TIMEOUT_MS).contains(&self.wiegand_timeout_ms) {
            return Err(StorageError::validation(format!(
                "wiegand_timeout_ms must be {MIN_WIEGAND_TIMEOUT_MS}-{MAX_WIEGAND_TIMEOUT_MS}"
            )));
        }

        if !(MIN_SCAN_DELAY_SECS..=MAX_SCAN_DELAY_SECS).contains(&self.scan_delay_seconds) {
            return Err(StorageError::validation(format!(
                "scan_delay_seconds must be {MIN_SCAN_DELAY_SECS}-{MAX_SCAN_DELAY_SECS}"
            )));
        }

        if !(MIN_ENTRY_EXIT_GAP_SECS..=MAX_ENTRY_EXIT_GAP_SECS)
            .contains(&self.entry_exit_tracking.min_gap_seconds)
        {
            return Err(StorageError::validation(format!(
                "entry_exit_tracking.min_gap_seconds must be {MIN_ENTRY_EXIT_GAP_SECS}-{MAX_ENTRY_EXIT_GAP_SECS}"
            )));
        }

        if self.entity_id.is_empty() {
            return Err(StorageError::validation("entity_id must not be empty"));
        }

        Ok(())
    }

    /// Whether moving to `new` requires tearing down and restarting the
    /// Wiegand decoders.
    #[must_use]
    pub fn requires_decoder_restart(&self, new: &RuntimeConfig) -> bool {
        self.wiegand_bits != new.wiegand_bits || self.wiegand_timeout_ms != new.wiegand_timeout_ms
    }
}

/// Persisted config with an in-memory working copy.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: Mutex<RuntimeConfig>,
}

impl ConfigStore {
    /// Load `config.json`, falling back to `defaults` when absent.
    ///
    /// # Errors
    /// Returns a validation error when the loaded config is out of range;
    /// startup should treat that as fatal rather than run with a config
    /// the decoders cannot honor.
    pub fn load(base_dir: &Path, defaults: RuntimeConfig) -> StorageResult<Self> {
        let path = base_dir.join(CONFIG_FILE);
        let config: RuntimeConfig = read_json_or_default(&path, defaults);
        config.validate()?;
        Ok(Self {
            path,
            current: Mutex::new(config),
        })
    }

    /// Defensive snapshot of the current config.
    #[must_use]
    pub fn get(&self) -> RuntimeConfig {
        self.current.lock().expect("config lock poisoned").clone()
    }

    /// Validate, persist and swap in a new config.
    ///
    /// Returns the previous config so the caller can decide whether the
    /// decoders need a restart.
    ///
    /// # Errors
    /// Returns a validation error without touching disk or memory, or an
    /// IO error with memory unchanged.
    pub fn update(&self, new: RuntimeConfig) -> StorageResult<RuntimeConfig> {
        new.validate()?;
        let mut current = self.current.lock().expect("config lock poisoned");
        write_json_atomic(&self.path, &new)?;
        let previous = std::mem::replace(&mut *current, new);
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case(|c: &mut RuntimeConfig| c.wiegand_bits.reader_2 = 32)]
    #[case(|c: &mut RuntimeConfig| c.wiegand_timeout_ms = 9)]
    #[case(|c: &mut RuntimeConfig| c.wiegand_timeout_ms = 101)]
    #[case(|c: &mut RuntimeConfig| c.scan_delay_seconds = 0)]
    #[case(|c: &mut RuntimeConfig| c.scan_delay_seconds = 301)]
    #[case(|c: &mut RuntimeConfig| c.entry_exit_tracking.min_gap_seconds = 0)]
    #[case(|c: &mut RuntimeConfig| c.entity_id.clear())]
    fn test_validation_rejects_out_of_range(#[case] mutate: fn(&mut RuntimeConfig)) {
        let mut config = RuntimeConfig::default();
        mutate(&mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_restart_detection() {
        let base = RuntimeConfig::default();

        let mut widths = base.clone();
        widths.wiegand_bits.reader_1 = 34;
        assert!(base.requires_decoder_restart(&widths));

        let mut timeout = base.clone();
        timeout.wiegand_timeout_ms = 50;
        assert!(base.requires_decoder_restart(&timeout));

        let mut delay = base.clone();
        delay.scan_delay_seconds = 5;
        assert!(!base.requires_decoder_restart(&delay));
    }

    #[test]
    fn test_update_persists_and_survives_reload() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::load(dir.path(), RuntimeConfig::default()).unwrap();

        let mut new = RuntimeConfig::default();
        new.wiegand_bits.reader_1 = 34;
        new.scan_delay_seconds = 5;
        let previous = store.update(new.clone()).unwrap();
        assert_eq!(previous.wiegand_bits.reader_1, 26);
        assert_eq!(store.get(), new);

        let reloaded = ConfigStore::load(dir.path(), RuntimeConfig::default()).unwrap();
        assert_eq!(reloaded.get(), new);
    }

    #[test]
    fn test_update_rejects_invalid_without_mutation() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::load(dir.path(), RuntimeConfig::default()).unwrap();

        let mut bad = RuntimeConfig::default();
        bad.wiegand_bits.reader_3 = 8;
        assert!(store.update(bad).is_err());
        assert_eq!(store.get(), RuntimeConfig::default());
    }

    #[test]
    fn test_load_tolerates_missing_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"scan_delay_seconds": 30}"#,
        )
        .unwrap();

        let store = ConfigStore::load(dir.path(), RuntimeConfig::default()).unwrap();
        let config = store.get();
        assert_eq!(config.scan_delay_seconds, 30);
        assert_eq!(config.wiegand_timeout_ms, 25);
        assert_eq!(config.entity_id, "default_entity");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"wiegand_bits": {"reader_1": 13, "reader_2": 26, "reader_3": 26}}"#,
        )
        .unwrap();

        assert!(ConfigStore::load(dir.path(), RuntimeConfig::default()).is_err());
    }
}
