//! Transport seam between the client and the HTTP stack
//!
//! The client decides what to send, how often, and what the answer means.
//! A [`Transport`] only performs single round trips and owns the connection
//! pool. [`HttpTransport`] is the default, backed by `reqwest`.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::pool::PoolConfig;
use crate::{Error, Result};

/// Settings a transport is running with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Round-trip timeout
    pub timeout: Duration,
    /// Pool limits
    pub pool: PoolConfig,
    /// Skip TLS certificate validation
    pub accept_invalid_certs: bool,
}

impl TransportSettings {
    /// Settings derived from a client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            timeout: config.timeout,
            pool: config.pool,
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }
}

/// Performs round trips and owns the connection pool
///
/// Implementations must be safe to share across tasks; the client calls
/// `round_trip` concurrently from every in-flight request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the response head with an unread body
    async fn round_trip(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response>;

    /// Settings currently in effect
    fn settings(&self) -> TransportSettings;

    /// Apply new settings to subsequent round trips
    fn configure(&self, settings: &TransportSettings) -> Result<()>;

    /// Drop pooled connections that are not serving a request
    fn close_idle_connections(&self);

    /// Jar that `Set-Cookie` headers are recorded into, redirect hops included
    ///
    /// The client reads it to build the `Cookie` header of each request.
    fn cookie_jar(&self) -> Option<Arc<Jar>>;

    /// Forget every stored cookie
    fn clear_cookie_jar(&self);
}

/// Default transport backed by a pooled `reqwest::Client`
///
/// Reconfiguring builds a fresh inner client. Requests already holding the
/// previous one finish on it; its pool goes away with the last of them.
/// Every inner client shares the transport's cookie jar, so reqwest stores
/// cookies from each response it sees, including redirects.
#[derive(Debug)]
pub struct HttpTransport {
    client: RwLock<reqwest::Client>,
    settings: RwLock<TransportSettings>,
    jar: RwLock<Arc<Jar>>,
}

impl HttpTransport {
    /// Build a transport with the given settings and an empty cookie jar
    pub fn new(settings: TransportSettings) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = build_client(&settings, &jar)?;
        Ok(Self {
            client: RwLock::new(client),
            settings: RwLock::new(settings),
            jar: RwLock::new(jar),
        })
    }

    /// Build a transport matching a client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(TransportSettings::from_config(config))
    }

    fn rebuild(&self) -> Result<()> {
        let settings = self.settings.read().clone();
        let jar = self.jar.read().clone();
        *self.client.write() = build_client(&settings, &jar)?;
        Ok(())
    }
}

fn build_client(settings: &TransportSettings, jar: &Arc<Jar>) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_provider(jar.clone())
        .timeout(settings.timeout)
        .pool_max_idle_per_host(settings.pool.effective_idle_per_host())
        .pool_idle_timeout(settings.pool.idle_timeout())
        .danger_accept_invalid_certs(settings.accept_invalid_certs)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP transport: {}", e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let client = self.client.read().clone();
        client.execute(request).await
    }

    /// Settings as reqwest applies them
    ///
    /// The total idle cap has no reqwest knob and shows up folded into the
    /// per-host idle limit.
    fn settings(&self) -> TransportSettings {
        let settings = self.settings.read();
        TransportSettings { pool: settings.pool.effective(), ..settings.clone() }
    }

    fn configure(&self, settings: &TransportSettings) -> Result<()> {
        let jar = self.jar.read().clone();
        let client = build_client(settings, &jar)?;
        *self.client.write() = client;
        *self.settings.write() = settings.clone();
        Ok(())
    }

    fn close_idle_connections(&self) {
        if let Err(e) = self.rebuild() {
            tracing::warn!("Failed to reset connection pool: {}", e);
        }
    }

    fn cookie_jar(&self) -> Option<Arc<Jar>> {
        Some(self.jar.read().clone())
    }

    fn clear_cookie_jar(&self) {
        *self.jar.write() = Arc::new(Jar::default());
        if let Err(e) = self.rebuild() {
            tracing::warn!("Failed to rebuild client after clearing cookies: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ClientConfig::new().with_timeout(Duration::from_secs(3));
        let settings = TransportSettings::from_config(&config);
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.pool, PoolConfig::default());
        assert!(settings.accept_invalid_certs);
    }

    #[test]
    fn test_http_transport_configure() {
        let transport = HttpTransport::from_config(&ClientConfig::default()).unwrap();
        assert_eq!(transport.settings().pool.max_idle_conns_per_host, 10);

        let mut settings = transport.settings();
        settings.pool.max_idle_conns_per_host = 3;
        settings.timeout = Duration::from_secs(1);
        transport.configure(&settings).unwrap();

        assert_eq!(transport.settings(), settings);
    }

    #[test]
    fn test_settings_report_folded_idle_limit() {
        let transport = HttpTransport::from_config(&ClientConfig::default()).unwrap();

        let mut settings = transport.settings();
        settings.pool.max_idle_conns = 5;
        settings.pool.max_idle_conns_per_host = 10;
        transport.configure(&settings).unwrap();

        let current = transport.settings();
        assert_eq!(current.pool.max_idle_conns, 5);
        assert_eq!(current.pool.max_idle_conns_per_host, 5);
    }

    #[test]
    fn test_clear_cookie_jar_replaces_jar() {
        use reqwest::cookie::CookieStore;

        let transport = HttpTransport::from_config(&ClientConfig::default()).unwrap();
        let url = reqwest::Url::parse("http://example.test/").unwrap();

        let jar = transport.cookie_jar().unwrap();
        jar.add_cookie_str("sid=42; Path=/", &url);
        assert!(transport.cookie_jar().unwrap().cookies(&url).is_some());

        transport.clear_cookie_jar();
        assert!(transport.cookie_jar().unwrap().cookies(&url).is_none());
    }

    #[test]
    fn test_close_idle_keeps_settings() {
        let transport = HttpTransport::from_config(&ClientConfig::default()).unwrap();
        let before = transport.settings();
        transport.close_idle_connections();
        assert_eq!(transport.settings(), before);
    }
}
