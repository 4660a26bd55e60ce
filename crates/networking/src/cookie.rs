//! Cookie values attached to requests and parsed from responses

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single HTTP cookie
///
/// Only `name` and `value` travel on outgoing requests; the remaining
/// attributes are informational and filled in when parsing `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Path attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Max-Age attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Duration>,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// HttpOnly flag
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// Create a cookie with a name and value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
        }
    }

    /// Set the domain attribute
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the path attribute
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// `name=value` form used in a `Cookie` request header
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    pub(crate) fn from_set_cookie(cookie: &reqwest::cookie::Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
            max_age: cookie.max_age(),
            secure: cookie.secure(),
            http_only: cookie.http_only(),
        }
    }
}

/// Join explicit cookies and jar-provided pairs into one `Cookie` header value
///
/// Returns `None` when there is nothing to send.
pub(crate) fn header_value(cookies: &[Cookie], jar_pairs: Option<&str>) -> Option<String> {
    let mut pairs: Vec<String> = cookies.iter().map(Cookie::pair).collect();
    if let Some(jar) = jar_pairs.filter(|s| !s.is_empty()) {
        pairs.push(jar.to_string());
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
