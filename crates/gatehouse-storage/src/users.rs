//! Card holder store and blocklist.
//!
//! Two JSON files under the base directory: `users.json` maps card
//! numbers to holder records, `blocked_users.json` is the redundant
//! blocklist consulted on the scan hot path. The blocklist is kept as a
//! map of `card -> true` so existing deployments' files load unchanged.
//!
//! A single mutex serializes mutations; every mutation writes the file
//! first and commits to memory only on success, so a failed write never
//! leaves memory and disk disagreeing. The blocklist may name cards with
//! no user record (blocking ahead of enrollment is allowed).

use crate::atomic::{read_json_or_default, write_json_atomic};
use crate::error::{StorageError, StorageResult};
use gatehouse_core::{CardNumber, User};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

const USERS_FILE: &str = "users.json";
const BLOCKED_FILE: &str = "blocked_users.json";

/// Joined view of a user and their blocklist membership, as returned by
/// `GET /get_users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub card_number: CardNumber,
    pub id: String,
    pub name: String,
    pub ref_id: String,
    pub blocked: bool,
    pub privacy_protected: bool,
}

/// Result of the hot-path lookup for an access decision.
#[derive(Debug, Clone)]
pub struct CardLookup {
    pub user: Option<User>,
    pub blocked: bool,
}

#[derive(Debug)]
struct Inner {
    users: BTreeMap<String, User>,
    blocked: HashSet<String>,
}

/// Durable card → user mapping plus the blocklist set.
#[derive(Debug)]
pub struct UserStore {
    users_path: PathBuf,
    blocked_path: PathBuf,
    inner: Mutex<Inner>,
}

impl UserStore {
    /// Load both files from the base directory, creating nothing.
    ///
    /// Missing or corrupt files start empty; the first mutation recreates
    /// them.
    #[must_use]
    pub fn load(base_dir: &Path) -> Self {
        let users_path = base_dir.join(USERS_FILE);
        let blocked_path = base_dir.join(BLOCKED_FILE);

        let users: BTreeMap<String, User> = read_json_or_default(&users_path, BTreeMap::new());
        let blocked_map: BTreeMap<String, bool> =
            read_json_or_default(&blocked_path, BTreeMap::new());
        let blocked = blocked_map
            .into_iter()
            .filter_map(|(card, is_blocked)| is_blocked.then_some(card))
            .collect();

        Self {
            users_path,
            blocked_path,
            inner: Mutex::new(Inner { users, blocked }),
        }
    }

    /// Look up a user by card.
    #[must_use]
    pub fn get(&self, card: &CardNumber) -> Option<User> {
        let inner = self.inner.lock().expect("user store lock poisoned");
        inner.users.get(card.as_str()).cloned()
    }

    /// Blocklist membership check.
    #[must_use]
    pub fn is_blocked(&self, card: &CardNumber) -> bool {
        let inner = self.inner.lock().expect("user store lock poisoned");
        inner.blocked.contains(card.as_str())
    }

    /// One-lock lookup of user record and blocklist membership.
    #[must_use]
    pub fn lookup(&self, card: &CardNumber) -> CardLookup {
        let inner = self.inner.lock().expect("user store lock poisoned");
        CardLookup {
            user: inner.users.get(card.as_str()).cloned(),
            blocked: inner.blocked.contains(card.as_str()),
        }
    }

    /// Enroll a user. A duplicate card number replaces the existing entry.
    pub fn add(&self, user: User) -> StorageResult<()> {
        user.validate()
            .map_err(|e| StorageError::validation(e.to_string()))?;

        let mut inner = self.inner.lock().expect("user store lock poisoned");
        let mut users = inner.users.clone();
        users.insert(user.card_number.as_str().to_string(), user);
        write_json_atomic(&self.users_path, &users)?;
        inner.users = users;
        Ok(())
    }

    /// Remove a user by card.
    pub fn delete(&self, card: &CardNumber) -> StorageResult<()> {
        let mut inner = self.inner.lock().expect("user store lock poisoned");
        if !inner.users.contains_key(card.as_str()) {
            return Err(StorageError::NotFound(format!("card {card}")));
        }
        let mut users = inner.users.clone();
        users.remove(card.as_str());
        write_json_atomic(&self.users_path, &users)?;
        inner.users = users;
        Ok(())
    }

    /// Add or remove a card from the blocklist.
    ///
    /// The card need not have a user record; unknown cards can be blocked
    /// ahead of enrollment.
    pub fn set_blocked(&self, card: &CardNumber, blocked: bool) -> StorageResult<()> {
        let mut inner = self.inner.lock().expect("user store lock poisoned");
        let mut set = inner.blocked.clone();
        if blocked {
            set.insert(card.as_str().to_string());
        } else {
            set.remove(card.as_str());
        }

        let map: BTreeMap<&str, bool> = set.iter().map(|c| (c.as_str(), true)).collect();
        write_json_atomic(&self.blocked_path, &map)?;
        inner.blocked = set;
        Ok(())
    }

    /// Toggle privacy protection for a user.
    ///
    /// The caller is responsible for re-verifying the admin password
    /// before invoking this; suppressing audit records is a sensitive
    /// operation.
    pub fn set_privacy(&self, card: &CardNumber, enable: bool) -> StorageResult<User> {
        let mut inner = self.inner.lock().expect("user store lock poisoned");
        if !inner.users.contains_key(card.as_str()) {
            return Err(StorageError::NotFound(format!("card {card}")));
        }

        let mut users = inner.users.clone();
        let user = users
            .get_mut(card.as_str())
            .expect("presence checked above");
        user.privacy_protected = enable;
        let updated = user.clone();

        write_json_atomic(&self.users_path, &users)?;
        inner.users = users;
        info!(
            card = %card,
            enabled = enable,
            "privacy protection changed"
        );
        Ok(updated)
    }

    /// All users joined with blocklist membership, sorted by name
    /// (case-insensitive).
    #[must_use]
    pub fn list(&self) -> Vec<UserRecord> {
        let inner = self.inner.lock().expect("user store lock poisoned");
        let mut records: Vec<UserRecord> = inner
            .users
            .values()
            .map(|user| UserRecord {
                card_number: user.card_number.clone(),
                id: user.id.clone(),
                name: user.name.clone(),
                ref_id: user.ref_id.clone(),
                blocked: inner.blocked.contains(user.card_number.as_str()),
                privacy_protected: user.privacy_protected,
            })
            .collect();
        records.sort_by_key(|r| r.name.to_lowercase());
        records
    }

    /// Whether the users file exists on disk (startup status reporting).
    #[must_use]
    pub fn users_file_exists(&self) -> bool {
        self.users_path.exists()
    }

    /// Whether the blocklist file exists on disk.
    #[must_use]
    pub fn blocked_file_exists(&self) -> bool {
        self.blocked_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn card(s: &str) -> CardNumber {
        CardNumber::new(s).unwrap()
    }

    fn user(card_number: &str, name: &str) -> User {
        User {
            id: format!("id-{card_number}"),
            name: name.to_string(),
            card_number: card(card_number),
            ref_id: String::new(),
            privacy_protected: false,
        }
    }

    #[test]
    fn test_add_then_get() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.add(user("12345678", "John")).unwrap();
        let found = store.get(&card("12345678")).unwrap();
        assert_eq!(found.name, "John");
        assert!(store.get(&card("999")).is_none());
    }

    #[test]
    fn test_duplicate_card_replaces() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.add(user("123", "Old")).unwrap();
        store.add(user("123", "New")).unwrap();
        assert_eq!(store.get(&card("123")).unwrap().name, "New");
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_add_rejects_empty_fields() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        let mut invalid = user("123", "John");
        invalid.id.clear();
        assert!(matches!(
            store.add(invalid),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());
        assert!(matches!(
            store.delete(&card("123")),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_block_unblock_cycle() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.add(user("123", "John")).unwrap();
        assert!(!store.is_blocked(&card("123")));

        store.set_blocked(&card("123"), true).unwrap();
        assert!(store.is_blocked(&card("123")));
        assert!(store.list()[0].blocked);

        store.set_blocked(&card("123"), false).unwrap();
        assert!(!store.is_blocked(&card("123")));
    }

    #[test]
    fn test_block_unknown_card_allowed() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.set_blocked(&card("404"), true).unwrap();
        assert!(store.is_blocked(&card("404")));
        assert!(store.get(&card("404")).is_none());
    }

    #[test]
    fn test_set_privacy() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.add(user("99999", "CEO")).unwrap();
        let updated = store.set_privacy(&card("99999"), true).unwrap();
        assert!(updated.privacy_protected);
        assert!(store.get(&card("99999")).unwrap().privacy_protected);

        assert!(matches!(
            store.set_privacy(&card("404"), true),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_persistence_across_reload() {
        let dir = tempdir().unwrap();
        {
            let store = UserStore::load(dir.path());
            store.add(user("123", "John")).unwrap();
            store.add(user("456", "alice")).unwrap();
            store.set_blocked(&card("456"), true).unwrap();
        }

        let store = UserStore::load(dir.path());
        assert_eq!(store.get(&card("123")).unwrap().name, "John");
        assert!(store.is_blocked(&card("456")));
        assert!(!store.is_blocked(&card("123")));
    }

    #[test]
    fn test_list_sorted_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.add(user("1", "zara")).unwrap();
        store.add(user("2", "Bob")).unwrap();
        store.add(user("3", "alice")).unwrap();

        let names: Vec<_> = store.list().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alice", "Bob", "zara"]);
    }

    #[test]
    fn test_lookup_joins_user_and_blocklist() {
        let dir = tempdir().unwrap();
        let store = UserStore::load(dir.path());

        store.add(user("123", "John")).unwrap();
        store.set_blocked(&card("123"), true).unwrap();

        let lookup = store.lookup(&card("123"));
        assert!(lookup.blocked);
        assert_eq!(lookup.user.unwrap().name, "John");

        let lookup = store.lookup(&card("404"));
        assert!(!lookup.blocked);
        assert!(lookup.user.is_none());
    }
}
