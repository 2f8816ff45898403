//! Internet reachability probe.
//!
//! A bounded TCP connect to a well-known endpoint, with the verdict
//! cached for a short window so the uploader and drainer do not hammer
//! the network on every transaction.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "clients3.google.com:80";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Cached TCP reachability check.
#[derive(Debug)]
pub struct ReachabilityProbe {
    addr: String,
    connect_timeout: Duration,
    cache_ttl: Duration,
    last: Mutex<Option<(Instant, bool)>>,
}

impl Default for ReachabilityProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ADDR)
    }
}

impl ReachabilityProbe {
    /// Probe the given `host:port`.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            last: Mutex::new(None),
        }
    }

    /// Override the result cache TTL (tests shorten it).
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Whether the probe endpoint currently accepts connections.
    ///
    /// Returns the cached verdict when it is fresh enough.
    pub async fn is_reachable(&self) -> bool {
        {
            let last = self.last.lock().expect("probe lock poisoned");
            if let Some((when, verdict)) = *last
                && when.elapsed() < self.cache_ttl
            {
                return verdict;
            }
        }

        let verdict = matches!(
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        );
        debug!(addr = %self.addr, reachable = verdict, "reachability probe");

        let mut last = self.last.lock().expect("probe lock poisoned");
        *last = Some((Instant::now(), verdict));
        verdict
    }
}
