//! Connection pool limits and statistics
//!
//! The pool itself belongs to the transport. This module holds the limits the
//! client records, the statistics it reports, and the per-host limiter that
//! enforces `max_conns_per_host` (the only limit reqwest has no knob for).

use parking_lot::Mutex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::serde_millis;

/// Connection pool limits
///
/// Zero means "unlimited" for the connection counts and "never expire" for
/// the idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum idle connections across all hosts
    pub max_idle_conns: usize,
    /// Maximum connections (idle or active) per host
    pub max_conns_per_host: usize,
    /// Maximum idle connections per host
    pub max_idle_conns_per_host: usize,
    /// How long an idle connection is kept
    #[serde(with = "serde_millis")]
    pub idle_conn_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: 100,
            max_conns_per_host: 100,
            max_idle_conns_per_host: 10,
            idle_conn_timeout: Duration::from_secs(90),
        }
    }
}

impl PoolConfig {
    /// Create a pool configuration with all four limits
    pub fn new(
        max_idle_conns: usize,
        max_conns_per_host: usize,
        max_idle_conns_per_host: usize,
        idle_conn_timeout: Duration,
    ) -> Self {
        Self { max_idle_conns, max_conns_per_host, max_idle_conns_per_host, idle_conn_timeout }
    }

    /// Idle connections kept per host once the total cap is taken into account
    pub fn effective_idle_per_host(&self) -> usize {
        match (self.max_idle_conns, self.max_idle_conns_per_host) {
            (0, 0) => usize::MAX,
            (0, per_host) => per_host,
            (total, 0) => total,
            (total, per_host) => per_host.min(total),
        }
    }

    /// Limits as the default transport applies them
    ///
    /// The per-host idle limit becomes [`PoolConfig::effective_idle_per_host`],
    /// with zero still meaning unlimited.
    pub fn effective(&self) -> PoolConfig {
        let per_host = match self.effective_idle_per_host() {
            usize::MAX => 0,
            n => n,
        };
        PoolConfig { max_idle_conns_per_host: per_host, ..*self }
    }

    /// Idle timeout as reqwest expects it
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_conn_timeout.is_zero() {
            None
        } else {
            Some(self.idle_conn_timeout)
        }
    }
}

/// Configured and effective pool settings side by side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionPoolStats {
    /// Recorded total idle limit
    pub max_idle_conns: usize,
    /// Recorded per-host connection limit
    pub max_conns_per_host: usize,
    /// Recorded per-host idle limit
    pub max_idle_conns_per_host: usize,
    /// Recorded idle timeout
    #[serde(with = "serde_millis")]
    pub idle_conn_timeout: Duration,
    /// Recorded round-trip timeout
    #[serde(with = "serde_millis")]
    pub timeout: Duration,
    /// Transport's total idle limit
    pub current_max_idle_conns: usize,
    /// Transport's per-host connection limit
    pub current_max_conns_per_host: usize,
    /// Transport's per-host idle limit
    pub current_max_idle_conns_per_host: usize,
    /// Transport's idle timeout
    #[serde(with = "serde_millis")]
    pub current_idle_conn_timeout: Duration,
    /// Transport's round-trip timeout
    #[serde(with = "serde_millis")]
    pub current_timeout: Duration,
}

impl ConnectionPoolStats {
    pub(crate) fn new(
        configured: &PoolConfig,
        timeout: Duration,
        current: &PoolConfig,
        current_timeout: Duration,
    ) -> Self {
        Self {
            max_idle_conns: configured.max_idle_conns,
            max_conns_per_host: configured.max_conns_per_host,
            max_idle_conns_per_host: configured.max_idle_conns_per_host,
            idle_conn_timeout: configured.idle_conn_timeout,
            timeout,
            current_max_idle_conns: current.max_idle_conns,
            current_max_conns_per_host: current.max_conns_per_host,
            current_max_idle_conns_per_host: current.max_idle_conns_per_host,
            current_idle_conn_timeout: current.idle_conn_timeout,
            current_timeout,
        }
    }

    /// Whether the transport runs with exactly the recorded settings
    pub fn in_sync(&self) -> bool {
        self.max_idle_conns == self.current_max_idle_conns
            && self.max_conns_per_host == self.current_max_conns_per_host
            && self.max_idle_conns_per_host == self.current_max_idle_conns_per_host
            && self.idle_conn_timeout == self.current_idle_conn_timeout
            && self.timeout == self.current_timeout
    }
}

/// Caps concurrent exchanges per scheme/host/port
///
/// A permit is held from dispatch until the body has been drained. A host's
/// entry lives only while some request holds or waits for one of its permits.
#[derive(Debug)]
pub(crate) struct HostLimiter {
    limit: usize,
    hosts: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl HostLimiter {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit, hosts: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// Wait for a slot on the URL's host; `None` when unlimited
    pub(crate) async fn acquire(&self, url: &Url) -> Option<HostPermit> {
        if self.limit == 0 {
            return None;
        }

        let key = host_key(url);
        let semaphore = {
            let mut hosts = self.hosts.lock();
            hosts
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
                .clone()
        };

        // The semaphore is never closed, so acquisition only fails if it were.
        let permit = semaphore.acquire_owned().await.ok()?;
        Some(HostPermit { permit: Some(permit), key, hosts: self.hosts.clone() })
    }

    #[cfg(test)]
    fn tracked_hosts(&self) -> usize {
        self.hosts.lock().len()
    }
}

/// Slot on one host, released on drop
#[derive(Debug)]
pub(crate) struct HostPermit {
    permit: Option<OwnedSemaphorePermit>,
    key: String,
    hosts: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl Drop for HostPermit {
    fn drop(&mut self) {
        drop(self.permit.take());

        // Waiters and other permits each hold a clone of the semaphore.
        let mut hosts = self.hosts.lock();
        let idle = hosts.get(&self.key).is_some_and(|semaphore| Arc::strong_count(semaphore) == 1);
        if idle {
            hosts.remove(&self.key);
        }
    }
}

fn host_key(url: &Url) -> String {
    format!(
        "{}://{}:{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}
