//! Credentials, sessions and request authentication.
//!
//! A single admin identity with an unsalted SHA-256 password digest
//! (kept for compatibility with existing deployments; digests are never
//! rewritten). Requests authenticate with a bearer session token, or —
//! when enabled in the runtime config — HTTP Basic against the same
//! credentials. An optional legacy shared secret (`X-API-Key`) guards
//! mutating routes when the deployment configures one.
//!
//! All secret comparisons are constant-time.

use crate::api::ApiError;
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STD, URL_SAFE_NO_PAD as BASE64_URL};
use chrono::{DateTime, Duration, Utc};
use gatehouse_core::constants::{MIN_API_KEY_LENGTH, MIN_PASSWORD_LENGTH, SESSION_TOKEN_BYTES};
use gatehouse_storage::ConfigStore;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Hex-encoded SHA-256 of a password.
#[must_use]
pub fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{b:02x}");
        s
    })
}

fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The admin identity and the optional legacy API key.
///
/// Both secrets are runtime-mutable through `/update_security`; the
/// environment remains the durable source across restarts.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password_digest: Mutex<String>,
    api_key: Mutex<Option<String>>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: String, password_digest_hex: String, api_key: Option<String>) -> Self {
        Self {
            username,
            password_digest: Mutex::new(password_digest_hex),
            api_key: Mutex::new(api_key),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Constant-time password check against the stored digest.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        let presented = password_digest(password);
        let stored = self
            .password_digest
            .lock()
            .expect("credentials lock poisoned");
        ct_eq(&presented, &stored)
    }

    /// Basic-auth check: case-sensitive username, constant-time digest
    /// comparison.
    #[must_use]
    pub fn verify_basic(&self, username: &str, password: &str) -> bool {
        username == self.username && self.verify_password(password)
    }

    /// Legacy shared-secret check. Passes when no key is configured.
    #[must_use]
    pub fn check_api_key(&self, presented: Option<&str>) -> bool {
        let configured = self.api_key.lock().expect("credentials lock poisoned");
        match configured.as_deref() {
            None => true,
            Some(key) => presented.is_some_and(|p| ct_eq(p, key)),
        }
    }

    /// Replace the admin password (runtime only).
    pub fn set_password(&self, new_password: &str) -> Result<(), ApiError> {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let mut stored = self
            .password_digest
            .lock()
            .expect("credentials lock poisoned");
        *stored = password_digest(new_password);
        Ok(())
    }

    /// Replace the API key (runtime only).
    pub fn set_api_key(&self, new_key: &str) -> Result<(), ApiError> {
        if new_key.len() < MIN_API_KEY_LENGTH {
            return Err(ApiError::bad_request(format!(
                "API key must be at least {MIN_API_KEY_LENGTH} characters"
            )));
        }
        let mut stored = self.api_key.lock().expect("credentials lock poisoned");
        *stored = Some(new_key.to_string());
        Ok(())
    }
}

/// A live session.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-memory session map. Lost on restart by design.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh 256-bit URL-safe token for `username`.
    #[must_use]
    pub fn issue(&self, username: &str) -> String {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = BASE64_URL.encode(bytes);

        let now = Utc::now();
        let session = Session {
            username: username.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .insert(token.clone(), session);
        token
    }

    /// Validate a token; an expired entry is removed on discovery.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        match sessions.get(token) {
            Some(session) if Utc::now() < session.expires_at => Some(session.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    /// Drop a token (logout). Unknown tokens are ignored.
    pub fn revoke(&self, token: &str) {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .remove(token);
    }

    /// Remove every expired session; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let before = sessions.len();
        sessions.retain(|_, s| now < s.expires_at);
        before - sessions.len()
    }

    /// Number of live entries (expired-but-unswept included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn expire(&self, token: &str) {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        if let Some(s) = sessions.get_mut(token) {
            s.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

/// Everything a handler needs to authenticate a request.
#[derive(Debug)]
pub struct AuthContext {
    pub credentials: Arc<Credentials>,
    pub sessions: Arc<SessionStore>,
    config: Arc<ConfigStore>,
}

impl AuthContext {
    #[must_use]
    pub fn new(
        credentials: Arc<Credentials>,
        sessions: Arc<SessionStore>,
        config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            credentials,
            sessions,
            config,
        }
    }

    /// Authenticate a request: bearer session token, or HTTP Basic when
    /// the config enables it. Returns the authenticated username.
    pub fn require(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let authorization = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if let Some(token) = authorization.strip_prefix("Bearer ")
            && let Some(session) = self.sessions.validate(token)
        {
            return Ok(session.username);
        }

        if self.config.get().basic_auth_enabled
            && let Some(encoded) = authorization.strip_prefix("Basic ")
            && let Ok(decoded) = BASE64_STD.decode(encoded)
            && let Ok(pair) = String::from_utf8(decoded)
            && let Some((username, password)) = pair.split_once(':')
            && self.credentials.verify_basic(username, password)
        {
            return Ok(username.to_string());
        }

        Err(ApiError::unauthorized())
    }

    /// Authentication for mutating routes: `require` plus the legacy
    /// shared-secret check when one is configured.
    pub fn require_write(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let username = self.require(headers)?;

        let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if !self.credentials.check_api_key(presented) {
            warn!("mutating request rejected: invalid API key");
            return Err(ApiError::unauthorized());
        }
        Ok(username)
    }

    /// Bearer token from a request, if any (used by logout).
    #[must_use]
    pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_storage::RuntimeConfig;
    use tempfile::tempdir;

    fn credentials() -> Credentials {
        Credentials::new("admin".to_string(), password_digest("admin123"), None)
    }

    #[test]
    fn test_password_digest_is_sha256_hex() {
        // sha256("admin123")
        assert_eq!(
            password_digest("admin123"),
            "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9"
        );
    }

    #[test]
    fn test_verify_password() {
        let creds = credentials();
        assert!(creds.verify_password("admin123"));
        assert!(!creds.verify_password("admin124"));
        assert!(!creds.verify_password(""));
    }

    #[test]
    fn test_basic_username_is_case_sensitive() {
        let creds = credentials();
        assert!(creds.verify_basic("admin", "admin123"));
        assert!(!creds.verify_basic("Admin", "admin123"));
        assert!(!creds.verify_basic("admin", "wrong"));
    }

    #[test]
    fn test_api_key_unconfigured_passes() {
        let creds = credentials();
        assert!(creds.check_api_key(None));
        assert!(creds.check_api_key(Some("anything")));
    }

    #[test]
    fn test_api_key_configured_must_match() {
        let creds = Credentials::new(
            "admin".to_string(),
            password_digest("admin123"),
            Some("sixteen-byte-key!".to_string()),
        );
        assert!(creds.check_api_key(Some("sixteen-byte-key!")));
        assert!(!creds.check_api_key(Some("wrong")));
        assert!(!creds.check_api_key(None));
    }

    #[test]
    fn test_set_password_length_floor() {
        let creds = credentials();
        assert!(creds.set_password("short").is_err());
        creds.set_password("longenough").unwrap();
        assert!(creds.verify_password("longenough"));
        assert!(!creds.verify_password("admin123"));
    }

    #[test]
    fn test_set_api_key_length_floor() {
        let creds = credentials();
        assert!(creds.set_api_key("tooshort").is_err());
        creds.set_api_key("0123456789abcdef").unwrap();
        assert!(creds.check_api_key(Some("0123456789abcdef")));
    }

    #[test]
    fn test_session_issue_validate_revoke() {
        let store = SessionStore::new(24);
        let token = store.issue("admin");
        assert!(token.len() >= 43); // 32 bytes base64url, unpadded

        let session = store.validate(&token).unwrap();
        assert_eq!(session.username, "admin");

        store.revoke(&token);
        assert!(store.validate(&token).is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let store = SessionStore::new(24);
        assert_ne!(store.issue("admin"), store.issue("admin"));
    }

    #[test]
    fn test_expired_token_removed_on_validate() {
        let store = SessionStore::new(24);
        let token = store.issue("admin");
        store.expire(&token);

        assert!(store.validate(&token).is_none());
        assert_eq!(store.len(), 0); // removed on discovery
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = SessionStore::new(24);
        let stale = store.issue("admin");
        let fresh = store.issue("admin");
        store.expire(&stale);

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.validate(&fresh).is_some());
    }

    #[test]
    fn test_require_accepts_bearer_and_basic() {
        let dir = tempdir().unwrap();
        let mut runtime = RuntimeConfig::default();
        runtime.basic_auth_enabled = true;
        let config = Arc::new(ConfigStore::load(dir.path(), runtime).unwrap());
        let sessions = Arc::new(SessionStore::new(24));
        let auth = AuthContext::new(Arc::new(credentials()), Arc::clone(&sessions), config);

        let token = sessions.issue("admin");
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        assert_eq!(auth.require(&headers).unwrap(), "admin");

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Basic {}", BASE64_STD.encode("admin:admin123"))
                .parse()
                .unwrap(),
        );
        assert_eq!(auth.require(&headers).unwrap(), "admin");

        assert!(auth.require(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_basic_rejected_when_disabled() {
        let dir = tempdir().unwrap();
        let config = Arc::new(ConfigStore::load(dir.path(), RuntimeConfig::default()).unwrap());
        let sessions = Arc::new(SessionStore::new(24));
        let auth = AuthContext::new(Arc::new(credentials()), sessions, config);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            format!("Basic {}", BASE64_STD.encode("admin:admin123"))
                .parse()
                .unwrap(),
        );
        assert!(auth.require(&headers).is_err());
    }
}
