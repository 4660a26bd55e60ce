//! Drained HTTP responses

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url, Version};
use serde::de::DeserializeOwned;

use crate::cookie::Cookie;
use crate::Result;

/// Statuses treated as success (200 OK through 206 Partial Content)
pub const SUCCESS_STATUS: std::ops::RangeInclusive<u16> = 200..=206;

/// Immutable result of one HTTP exchange
///
/// The body has always been read to the end before a `Response` exists, so
/// the underlying connection is already back in the pool.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status_code: u16,
    /// Status line text, e.g. `"404 Not Found"`
    pub status_text: String,
    /// Raw body as text, set only when the status is not a success
    pub message: String,
    /// Response body
    pub body: Bytes,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    url: Url,
    version: Version,
}

impl Response {
    /// Assemble a response from already-drained parts
    pub fn from_parts(
        status: StatusCode,
        version: Version,
        url: Url,
        headers: HeaderMap,
        cookies: Vec<Cookie>,
        body: Bytes,
    ) -> Self {
        Self {
            status_code: status.as_u16(),
            status_text: status_text(status),
            message: String::new(),
            body,
            headers,
            cookies,
            url,
            version,
        }
    }

    /// Read a transport response to the end
    pub(crate) async fn drain(response: reqwest::Response) -> reqwest::Result<Self> {
        let status = response.status();
        let version = response.version();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let cookies = response.cookies().map(|c| Cookie::from_set_cookie(&c)).collect();

        let body = response.bytes().await?;

        Ok(Self::from_parts(status, version, url, headers, cookies, body))
    }

    /// Whether the status falls in 200-206
    pub fn is_success(&self) -> bool {
        SUCCESS_STATUS.contains(&self.status_code)
    }

    /// Body as UTF-8 text, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Raw body bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Cookies set by this response
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Final URL after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP version of the exchange
    pub fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }
}

fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
