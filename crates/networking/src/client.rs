//! HTTP client with retries, cookies, and a reconfigurable connection pool
//!
//! A [`Client`] is built once and shared. Every dispatch takes a snapshot of
//! the client's headers, auth, cookies and settings, so changing them while
//! requests are in flight only affects requests started afterwards.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::{Method, Url};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{self, ClientConfig, DEFAULT_CONTENT_TYPE, FORM_URLENCODED};
use crate::cookie::{self as cookies, Cookie};
use crate::form::{self, FormSource, MultipartWriter};
use crate::method::{self, MethodPolicy};
use crate::pool::{ConnectionPoolStats, HostLimiter, PoolConfig};
use crate::response::Response;
use crate::retry::{self, RetryConfig};
use crate::transport::{HttpTransport, Transport, TransportSettings};
use crate::{Error, NetworkErrorKind, Result};

/// Username and password for HTTP Basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// Username; a blank username disables the header
    pub username: String,
    /// Password
    pub password: String,
}

impl BasicAuth {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    fn header_value(&self) -> Option<HeaderValue> {
        if self.username.trim().is_empty() {
            return None;
        }
        let encoded = BASE64.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {}", encoded)).ok()?;
        value.set_sensitive(true);
        Some(value)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

struct ClientState {
    config: ClientConfig,
    auth: Option<BasicAuth>,
    cookies: Vec<Cookie>,
}

struct ClientInner {
    state: RwLock<ClientState>,
    transport: RwLock<Arc<dyn Transport>>,
    limiter: RwLock<Arc<HostLimiter>>,
}

/// HTTP client
///
/// Cloning is cheap; clones share configuration, cookies and the pool.
///
/// # Examples
/// ```no_run
/// use networking::Client;
///
/// async fn example() -> networking::Result<()> {
///     let client = Client::new()?;
///     client.set_basic_auth("user", "secret");
///
///     let response = client.request("post", "https://example.com/api", r#"{"a":1}"#, 2).await?;
///     println!("{} {}", response.status_text, response.text());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

/// Everything one dispatch needs, copied out of the shared state
struct Snapshot {
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    debug: bool,
    timeout: Duration,
    retry: RetryConfig,
    transport: Arc<dyn Transport>,
    limiter: Arc<HostLimiter>,
    jar: Option<Arc<Jar>>,
}

impl Client {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client backed by the default transport
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client on top of a caller-provided transport
    ///
    /// The transport keeps its own settings until a pool or timeout setter
    /// is called.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let limiter = HostLimiter::new(config.pool.max_conns_per_host);

        Ok(Self {
            inner: Arc::new(ClientInner {
                state: RwLock::new(ClientState { config, auth: None, cookies: Vec::new() }),
                transport: RwLock::new(transport),
                limiter: RwLock::new(Arc::new(limiter)),
            }),
        })
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Send a request, retrying transport failures up to `retry_count` times
    ///
    /// `method` is trimmed and upper-cased. Statuses 200-206 return the
    /// response; any other status returns [`Error::Server`] carrying it.
    /// Responses are never retried, whatever their status.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        body: impl Into<Bytes>,
        retry_count: i32,
    ) -> Result<Response> {
        let policy = self.inner.state.read().config.method_policy;
        let method = method::normalize(method, policy)?;
        let retries = retry_count.max(0) as usize;

        self.dispatch(method, url, body.into(), None, retries).await
    }

    /// Like [`Client::request`], aborting as soon as `cancel` fires
    ///
    /// Cancellation interrupts the in-flight attempt or backoff wait and
    /// returns [`Error::Cancelled`].
    pub async fn request_with_cancel(
        &self,
        method: &str,
        url: &str,
        body: impl Into<Bytes>,
        retry_count: i32,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.request(method, url, body, retry_count) => result,
        }
    }

    /// Send a GET request without retries
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(method::GET, url, Bytes::new(), 0).await
    }

    /// Send a POST request without retries
    pub async fn post(&self, url: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.request(method::POST, url, body, 0).await
    }

    /// Submit a `multipart/form-data` form
    ///
    /// Sources with a file name become file parts. All sources are consumed,
    /// and the form is always terminated, even when one of them fails.
    pub async fn post_form<I, K>(&self, url: &str, fields: I) -> Result<Response>
    where
        I: IntoIterator<Item = (K, FormSource)>,
        K: AsRef<str>,
    {
        let (content_type, body) = form::encode_multipart(fields, MultipartWriter::new()).await?;
        self.dispatch(Method::POST, url, body, Some(content_type), 0).await
    }

    /// Submit an `application/x-www-form-urlencoded` form
    pub async fn post_form_urlencoded<I, K, V>(&self, url: &str, fields: I) -> Result<Response>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let body = form::encode_urlencoded(fields);
        self.dispatch(Method::POST, url, Bytes::from(body), Some(FORM_URLENCODED.to_string()), 0)
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
        content_type: Option<String>,
        retries: usize,
    ) -> Result<Response> {
        let url = Url::parse(url).map_err(|e| {
            Error::network_with_source(NetworkErrorKind::Build, format!("invalid URL {:?}", url), e)
        })?;
        let snapshot = self.snapshot(content_type.as_deref())?;

        let response =
            retry::retry(&snapshot.retry, retries, || attempt(&snapshot, &method, &url, &body))
                .await?;

        if snapshot.debug {
            tracing::debug!("[http resp] => {}\n{}", response.status_text, response.text());
        }

        if response.is_success() {
            Ok(response)
        } else {
            let status = response.status_code;
            let message = response.text();
            let response = response.with_message(message.clone());
            Err(Error::Server { status, message, response: Box::new(response) })
        }
    }

    fn snapshot(&self, content_type: Option<&str>) -> Result<Snapshot> {
        let state = self.inner.state.read();
        let mut headers = HeaderMap::new();

        if let Some(value) = state.auth.as_ref().and_then(BasicAuth::header_value) {
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        for (name, value) in &state.config.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        if let Some(content_type) = content_type {
            let value = HeaderValue::from_str(content_type).map_err(|e| {
                Error::network_with_source(NetworkErrorKind::Build, "invalid content type", e)
            })?;
            headers.insert(CONTENT_TYPE, value);
        }

        let transport = self.transport();
        Ok(Snapshot {
            jar: transport.cookie_jar(),
            headers,
            cookies: state.cookies.clone(),
            debug: state.config.debug,
            timeout: state.config.timeout,
            retry: state.config.retry.clone(),
            transport,
            limiter: self.inner.limiter.read().clone(),
        })
    }

    // =========================================================================
    // Connection pool
    // =========================================================================

    /// Current transport
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.inner.transport.read().clone()
    }

    /// Replace the transport; takes effect on the next request
    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.inner.transport.write() = transport;
    }

    /// Set the round-trip timeout
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        self.reconfigure(|config| config.timeout = timeout)
    }

    /// Set the total idle connection limit
    pub fn set_max_idle_conns(&self, max: usize) -> Result<()> {
        self.reconfigure(|config| config.pool.max_idle_conns = max)
    }

    /// Set the per-host connection limit
    pub fn set_max_conns_per_host(&self, max: usize) -> Result<()> {
        self.reconfigure(|config| config.pool.max_conns_per_host = max)
    }

    /// Set the per-host idle connection limit
    pub fn set_max_idle_conns_per_host(&self, max: usize) -> Result<()> {
        self.reconfigure(|config| config.pool.max_idle_conns_per_host = max)
    }

    /// Set how long idle connections are kept
    pub fn set_idle_conn_timeout(&self, timeout: Duration) -> Result<()> {
        self.reconfigure(|config| config.pool.idle_conn_timeout = timeout)
    }

    /// Replace all pool limits at once
    pub fn set_connection_pool(&self, pool: PoolConfig) -> Result<()> {
        self.reconfigure(|config| config.pool = pool)
    }

    /// Apply a configuration change to the recorded state and the transport
    ///
    /// The recorded configuration only changes if the transport accepted it.
    fn reconfigure(&self, change: impl FnOnce(&mut ClientConfig)) -> Result<()> {
        let mut state = self.inner.state.write();
        let mut config = state.config.clone();
        change(&mut config);

        self.transport().configure(&TransportSettings::from_config(&config))?;

        let per_host = config.pool.max_conns_per_host;
        state.config = config;
        drop(state);

        let mut limiter = self.inner.limiter.write();
        if limiter.limit() != per_host {
            *limiter = Arc::new(HostLimiter::new(per_host));
        }
        Ok(())
    }

    /// Recorded pool settings next to the ones actually in effect
    pub fn pool_stats(&self) -> ConnectionPoolStats {
        let state = self.inner.state.read();
        let current = self.transport().settings();
        let effective = PoolConfig {
            max_conns_per_host: self.inner.limiter.read().limit(),
            ..current.pool
        };

        ConnectionPoolStats::new(&state.config.pool, state.config.timeout, &effective, current.timeout)
    }

    /// Drop idle connections and clear headers, cookies and the cookie jar
    ///
    /// Requests already in flight are not affected.
    pub fn close(&self) {
        let transport = self.transport();
        transport.close_idle_connections();
        transport.clear_cookie_jar();

        let mut state = self.inner.state.write();
        state.config.headers.clear();
        state.cookies.clear();
    }

    // =========================================================================
    // Headers, auth, cookies
    // =========================================================================

    /// Copy of the recorded configuration
    pub fn config(&self) -> ClientConfig {
        self.inner.state.read().config.clone()
    }

    /// Client-level headers
    pub fn headers(&self) -> HashMap<String, String> {
        self.inner.state.read().config.headers.clone()
    }

    /// Add or replace a client-level header
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (name, value) = (name.into(), value.into());
        parse_header(&name, &value)?;
        config::insert_header(&mut self.inner.state.write().config.headers, name, value);
        Ok(())
    }

    /// Remove a client-level header, returning its value
    pub fn remove_header(&self, name: &str) -> Option<String> {
        config::remove_header(&mut self.inner.state.write().config.headers, name)
    }

    /// Whether debug logging is on
    pub fn debug(&self) -> bool {
        self.inner.state.read().config.debug
    }

    /// Turn debug logging on or off
    pub fn set_debug(&self, debug: bool) {
        self.inner.state.write().config.debug = debug;
    }

    /// Accepted method names
    pub fn set_method_policy(&self, policy: MethodPolicy) {
        self.inner.state.write().config.method_policy = policy;
    }

    /// Set the retry delays
    pub fn set_retry(&self, retry: RetryConfig) -> Result<()> {
        retry.validate()?;
        self.inner.state.write().config.retry = retry;
        Ok(())
    }

    /// Current Basic credentials
    pub fn basic_auth(&self) -> Option<BasicAuth> {
        self.inner.state.read().auth.clone()
    }

    /// Send HTTP Basic credentials with every request
    pub fn set_basic_auth(&self, username: impl Into<String>, password: impl Into<String>) {
        self.inner.state.write().auth = Some(BasicAuth::new(username, password));
    }

    /// Stop sending HTTP Basic credentials
    pub fn clear_basic_auth(&self) {
        self.inner.state.write().auth = None;
    }

    /// Explicit cookies sent with every request
    pub fn cookies(&self) -> Vec<Cookie> {
        self.inner.state.read().cookies.clone()
    }

    /// Append a cookie sent with every request
    pub fn set_cookie(&self, cookie: Cookie) {
        self.inner.state.write().cookies.push(cookie);
    }

    /// Remove all explicit cookies
    pub fn clear_cookies(&self) {
        self.inner.state.write().cookies.clear();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Client")
            .field("timeout", &state.config.timeout)
            .field("pool", &state.config.pool)
            .field("debug", &state.config.debug)
            .field("auth", &state.auth)
            .field("cookies", &state.cookies.len())
            .finish()
    }
}

/// One round trip, including draining the body
///
/// Transport failures are transient; everything after a response arrived is
/// permanent.
async fn attempt(
    snapshot: &Snapshot,
    method: &Method,
    url: &Url,
    body: &Bytes,
) -> std::result::Result<Response, backoff::Error<Error>> {
    let started = Instant::now();
    let slot_timeout = || {
        retry::transient(Error::network(
            NetworkErrorKind::Timeout,
            format!(
                "timed out after {:?} waiting for a connection to {}",
                snapshot.timeout,
                url.host_str().unwrap_or_default()
            ),
        ))
    };

    let _permit = tokio::time::timeout(snapshot.timeout, snapshot.limiter.acquire(url))
        .await
        .map_err(|_| slot_timeout())?;

    // Time spent waiting for a slot comes out of the round-trip budget.
    let remaining = snapshot.timeout.saturating_sub(started.elapsed());
    if remaining.is_zero() {
        return Err(slot_timeout());
    }

    let request =
        build_request(snapshot, method, url, body, remaining).map_err(retry::permanent)?;
    if snapshot.debug {
        log_request(&request, body);
    }

    let response = snapshot
        .transport
        .round_trip(request)
        .await
        .map_err(|e| retry::transient(Error::from_transport(e, snapshot.timeout)))?;

    Response::drain(response).await.map_err(|e| {
        let kind = if e.is_timeout() { NetworkErrorKind::Timeout } else { NetworkErrorKind::Body };
        let message = if e.is_timeout() {
            format!("response body timed out after {:?}: {}", snapshot.timeout, e)
        } else {
            format!("failed to read response body: {}", e)
        };
        retry::permanent(Error::network_with_source(kind, message, e))
    })
}

fn build_request(
    snapshot: &Snapshot,
    method: &Method,
    url: &Url,
    body: &Bytes,
    timeout: Duration,
) -> Result<reqwest::Request> {
    let mut request = reqwest::Request::new(method.clone(), url.clone());
    *request.headers_mut() = snapshot.headers.clone();

    let jar_cookies = snapshot.jar.as_ref().and_then(|jar| jar.cookies(url));
    let jar_pairs = jar_cookies.as_ref().and_then(|v| v.to_str().ok());
    if let Some(cookie) = cookies::header_value(&snapshot.cookies, jar_pairs) {
        let value = HeaderValue::from_str(&cookie).map_err(|e| {
            Error::network_with_source(NetworkErrorKind::Build, "invalid cookie value", e)
        })?;
        request.headers_mut().insert(COOKIE, value);
    }

    if !body.is_empty() {
        *request.body_mut() = Some(reqwest::Body::from(body.clone()));
    }
    *request.timeout_mut() = Some(timeout);

    Ok(request)
}

fn log_request(request: &reqwest::Request, body: &Bytes) {
    tracing::debug!(
        "[http req] => {} {}\n{}",
        request.method(),
        request.url(),
        String::from_utf8_lossy(body)
    );
    for (name, value) in request.headers() {
        if name == AUTHORIZATION || name == COOKIE || value.is_sensitive() {
            tracing::debug!("[header] => {}: <redacted>", name);
        } else {
            tracing::debug!("[header] => {}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        Error::network_with_source(NetworkErrorKind::Build, format!("invalid header name {:?}", name), e)
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        Error::network_with_source(NetworkErrorKind::Build, format!("invalid value for header {}", name), e)
    })?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::sync::Mutex;

    fn ok_response(body: &'static str) -> reqwest::Response {
        reqwest::Response::from(http::Response::builder().status(200).body(body).unwrap())
    }

    fn settings_for(config: &ClientConfig) -> TransportSettings {
        TransportSettings::from_config(config)
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_new_client_defaults() {
        let client = Client::new().unwrap();
        let config = client.config();

        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.pool, PoolConfig::default());
        assert!(!client.debug());
        assert!(client.cookies().is_empty());
        assert!(client.basic_auth().is_none());
        assert!(client.headers()["User-Agent"].starts_with("courier/"));

        let stats = client.pool_stats();
        assert!(stats.in_sync());
        assert_eq!(stats.current_max_idle_conns_per_host, 10);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = ClientConfig::new().with_timeout(Duration::ZERO);
        assert!(matches!(Client::with_config(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_basic_auth_header() {
        let auth = BasicAuth::new("testuser", "testpass");
        let value = auth.header_value().unwrap();
        assert_eq!(value.to_str().unwrap(), "Basic dGVzdHVzZXI6dGVzdHBhc3M=");
        assert!(value.is_sensitive());

        assert!(BasicAuth::new("  ", "secret").header_value().is_none());
        assert!(!format!("{:?}", auth).contains("testpass"));
    }

    #[test]
    fn test_snapshot_header_precedence() {
        let client = Client::new().unwrap();
        client.set_header("Content-Type", "text/plain").unwrap();
        client.set_basic_auth("user", "pass");

        let snapshot = client.snapshot(None).unwrap();
        assert_eq!(snapshot.headers[CONTENT_TYPE], "text/plain");
        assert!(snapshot.headers.contains_key(AUTHORIZATION));

        let snapshot = client.snapshot(Some(FORM_URLENCODED)).unwrap();
        assert_eq!(snapshot.headers[CONTENT_TYPE], FORM_URLENCODED);
    }

    #[test]
    fn test_snapshot_default_content_type() {
        let client = Client::new().unwrap();
        let snapshot = client.snapshot(None).unwrap();
        assert_eq!(snapshot.headers[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert!(!snapshot.headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_set_header_validates() {
        let client = Client::new().unwrap();
        assert!(client.set_header("Bad Name", "x").is_err());
        assert!(client.set_header("X-Trace", "abc").is_ok());
        assert_eq!(client.remove_header("x-trace"), Some("abc".to_string()));
    }

    #[test]
    fn test_cookie_operations() {
        let client = Client::new().unwrap();
        client.set_cookie(Cookie::new("cookie1", "value1"));
        client.set_cookie(Cookie::new("cookie2", "value2"));
        assert_eq!(client.cookies().len(), 2);
        assert_eq!(client.cookies()[1].name, "cookie2");

        client.clear_cookies();
        assert!(client.cookies().is_empty());
    }

    #[test]
    fn test_set_debug_honours_argument() {
        let client = Client::new().unwrap();
        client.set_debug(true);
        assert!(client.debug());
        client.set_debug(false);
        assert!(!client.debug());
    }

    #[test]
    fn test_pool_setters_reach_transport() {
        let client = Client::new().unwrap();

        client.set_max_idle_conns(50).unwrap();
        client.set_max_conns_per_host(20).unwrap();
        client.set_max_idle_conns_per_host(5).unwrap();
        client.set_idle_conn_timeout(Duration::from_secs(60)).unwrap();
        client.set_timeout(Duration::from_secs(3)).unwrap();

        let stats = client.pool_stats();
        assert_eq!(stats.max_idle_conns, 50);
        assert_eq!(stats.current_max_idle_conns, 50);
        assert_eq!(stats.max_conns_per_host, 20);
        assert_eq!(stats.current_max_conns_per_host, 20);
        assert_eq!(stats.max_idle_conns_per_host, 5);
        assert_eq!(stats.current_max_idle_conns_per_host, 5);
        assert_eq!(stats.idle_conn_timeout, Duration::from_secs(60));
        assert_eq!(stats.current_idle_conn_timeout, Duration::from_secs(60));
        assert_eq!(stats.current_timeout, Duration::from_secs(3));
        assert!(stats.in_sync());
    }

    #[test]
    fn test_pool_stats_report_folded_idle_limit() {
        let client = Client::new().unwrap();
        client.set_max_idle_conns(5).unwrap();

        let stats = client.pool_stats();
        assert_eq!(stats.max_idle_conns_per_host, 10);
        assert_eq!(stats.current_max_idle_conns_per_host, 5);
        assert_eq!(stats.current_max_idle_conns, 5);
        assert!(!stats.in_sync());
    }

    #[test]
    fn test_set_retry_validates() {
        let client = Client::new().unwrap();
        let inverted = RetryConfig::new(Duration::from_secs(5)).with_max_delay(Duration::from_secs(1));

        assert!(matches!(client.set_retry(inverted), Err(Error::Config(_))));
        assert_eq!(client.config().retry, RetryConfig::default());

        let fast = RetryConfig::new(Duration::from_millis(10));
        client.set_retry(fast.clone()).unwrap();
        assert_eq!(client.config().retry, fast);
    }

    #[test]
    fn test_set_connection_pool() {
        let client = Client::new().unwrap();
        let pool = PoolConfig::new(200, 50, 20, Duration::from_secs(120));
        client.set_connection_pool(pool).unwrap();

        assert_eq!(client.config().pool, pool);
        assert_eq!(client.transport().settings().pool, pool);
    }

    #[test]
    fn test_set_timeout_rejects_zero() {
        let client = Client::new().unwrap();
        assert!(client.set_timeout(Duration::ZERO).is_err());
        assert_eq!(client.config().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_reconfigure_calls_transport() {
        let config = ClientConfig::default();
        let mut expected = settings_for(&config);
        expected.pool.max_idle_conns = 7;

        let mut transport = MockTransport::new();
        transport
            .expect_configure()
            .withf(move |s| *s == expected)
            .times(1)
            .returning(|_| Ok(()));

        let client = Client::with_transport(config, Arc::new(transport)).unwrap();
        client.set_max_idle_conns(7).unwrap();
        assert_eq!(client.config().pool.max_idle_conns, 7);
    }

    #[test]
    fn test_rejected_reconfigure_keeps_config() {
        let mut transport = MockTransport::new();
        transport
            .expect_configure()
            .times(1)
            .returning(|_| Err(Error::Config("nope".into())));

        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();
        assert!(client.set_max_idle_conns_per_host(1).is_err());
        assert_eq!(client.config().pool.max_idle_conns_per_host, 10);
    }

    #[test]
    fn test_stats_show_custom_transport_divergence() {
        let mut transport = MockTransport::new();
        transport.expect_settings().returning(|| TransportSettings {
            timeout: Duration::from_secs(1),
            pool: PoolConfig::new(1, 1, 1, Duration::from_secs(1)),
            accept_invalid_certs: false,
        });

        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();
        let stats = client.pool_stats();
        assert!(!stats.in_sync());
        assert_eq!(stats.max_idle_conns, 100);
        assert_eq!(stats.current_max_idle_conns, 1);
        assert_eq!(stats.current_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_close_clears_state() {
        let mut transport = MockTransport::new();
        transport.expect_close_idle_connections().times(1).return_const(());
        transport.expect_clear_cookie_jar().times(1).return_const(());

        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();
        client.set_header("X-Test", "value").unwrap();
        client.set_cookie(Cookie::new("test", "value"));

        client.close();

        assert!(client.headers().is_empty());
        assert!(client.cookies().is_empty());
    }

    #[tokio::test]
    async fn test_request_builds_expected_headers() {
        let seen = Arc::new(Mutex::new(None::<HeaderMap>));
        let seen_clone = seen.clone();

        let jar = Arc::new(Jar::default());
        jar.add_cookie_str("sid=42; Path=/", &Url::parse("http://cache.test/").unwrap());

        let mut transport = MockTransport::new();
        transport.expect_cookie_jar().returning(move || Some(jar.clone()));
        transport.expect_round_trip().times(1).returning(move |req| {
            *seen_clone.lock().unwrap() = Some(req.headers().clone());
            assert_eq!(req.method(), Method::from_bytes(b"PURGE").unwrap());
            assert_eq!(req.timeout(), Some(&Duration::from_secs(10)));
            Ok(ok_response("purged"))
        });

        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();
        client.set_header("X-Custom", "custom-value").unwrap();
        client.set_cookie(Cookie::new("a", "1"));
        client.set_cookie(Cookie::new("b", "2"));

        let response = client.request("purge", "http://cache.test/item", Bytes::new(), 0).await.unwrap();
        assert_eq!(response.text(), "purged");

        let headers = seen.lock().unwrap().take().unwrap();
        assert_eq!(headers["x-custom"], "custom-value");
        assert_eq!(headers[COOKIE], "a=1; b=2; sid=42");
        assert_eq!(headers[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_debug_dump_shows_sent_request() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut transport = MockTransport::new();
        transport.expect_cookie_jar().returning(|| None);
        transport.expect_round_trip().times(1).returning(|_| Ok(ok_response("pong")));

        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();
        client.set_debug(true);
        client.set_basic_auth("user", "pass");
        client.set_header("X-Custom", "abc").unwrap();
        client.set_cookie(Cookie::new("session", "secret-value"));

        client.post("http://api.test/echo", "ping").await.unwrap();

        let output = logs.contents();
        assert!(output.contains("[http req] => POST http://api.test/echo"), "{}", output);
        assert!(output.contains("ping"));
        assert!(output.contains("[header] => x-custom: abc"));
        assert!(output.contains("[header] => authorization: <redacted>"));
        assert!(output.contains("[header] => cookie: <redacted>"));
        assert!(output.contains("[http resp] => 200 OK"));
        assert!(output.contains("pong"));
        assert!(!output.contains("secret-value"));
        assert!(!output.contains("dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn test_debug_off_logs_nothing() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut transport = MockTransport::new();
        transport.expect_cookie_jar().returning(|| None);
        transport.expect_round_trip().times(1).returning(|_| Ok(ok_response("pong")));

        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();
        client.post("http://api.test/echo", "ping").await.unwrap();

        assert!(!logs.contents().contains("[http req]"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_build_error() {
        let transport = MockTransport::new();
        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();

        let err = client.request("GET", "invalid-url", Bytes::new(), 0).await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Build));
    }

    #[tokio::test]
    async fn test_standard_policy_rejects_before_sending() {
        let transport = MockTransport::new();
        let config = ClientConfig::default().with_method_policy(MethodPolicy::Standard);
        let client = Client::with_transport(config, Arc::new(transport)).unwrap();

        let err = client.request("BREW", "http://pot.test/", Bytes::new(), 3).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(ref m) if m == "BREW"));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_sends_nothing() {
        let transport = MockTransport::new();
        let client = Client::with_transport(ClientConfig::default(), Arc::new(transport)).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .request_with_cancel("GET", "http://example.test/", Bytes::new(), 0, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
    }
}
