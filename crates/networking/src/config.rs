//! Client configuration

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::method::MethodPolicy;
use crate::pool::PoolConfig;
use crate::retry::RetryConfig;
use crate::{Error, Result};

/// Default `Content-Type` for [`crate::Client::request`]
pub const DEFAULT_CONTENT_TYPE: &str = "application/json;charset=utf-8";
/// `Content-Type` of url-encoded form submissions
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// Media type of multipart form submissions
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Serialize a [`Duration`] as integer milliseconds
pub mod serde_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Write the duration as milliseconds
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Read a duration from milliseconds
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration for [`crate::Client`]
///
/// # Examples
/// ```
/// use networking::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new()
///     .with_timeout(Duration::from_secs(30))
///     .with_header("X-Api-Key", "secret")
///     .with_debug(true);
///
/// assert_eq!(config.timeout, Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on one whole round trip
    #[serde(with = "serde_millis")]
    pub timeout: Duration,
    /// Headers merged into every request, overriding request defaults
    pub headers: HashMap<String, String>,
    /// Log every request and response at debug level
    pub debug: bool,
    /// Skip TLS certificate validation
    pub accept_invalid_certs: bool,
    /// Connection pool limits
    pub pool: PoolConfig,
    /// Retry delays
    pub retry: RetryConfig,
    /// Accepted method names
    pub method_policy: MethodPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), default_user_agent());

        Self {
            timeout: Duration::from_secs(10),
            headers,
            debug: false,
            accept_invalid_certs: true,
            pool: PoolConfig::default(),
            retry: RetryConfig::default(),
            method_policy: MethodPolicy::Permissive,
        }
    }
}

impl ClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the round-trip timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add or replace a header, matching names case-insensitively
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// Enable or disable debug logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable TLS certificate validation skipping
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set the connection pool limits
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set the retry delays
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the method policy
    pub fn with_method_policy(mut self, policy: MethodPolicy) -> Self {
        self.method_policy = policy;
        self
    }

    /// Check that the configuration can be used to send requests
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
            HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header {}: {}", name, e)))?;
        }

        self.retry.validate()
    }
}

/// Default `User-Agent` value
pub fn default_user_agent() -> String {
    format!("courier/{}", env!("CARGO_PKG_VERSION"))
}

/// Insert a header, replacing any existing entry whose name differs only in case
pub(crate) fn insert_header(headers: &mut HashMap<String, String>, key: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
    headers.insert(key, value);
}

/// Remove a header by case-insensitive name
pub(crate) fn remove_header(headers: &mut HashMap<String, String>, key: &str) -> Option<String> {
    let existing = headers.keys().find(|k| k.eq_ignore_ascii_case(key)).cloned()?;
    headers.remove(&existing)
}
