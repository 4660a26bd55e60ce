//! HTTP method normalization and policy

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// POST
pub const POST: &str = "POST";
/// GET
pub const GET: &str = "GET";
/// PUT
pub const PUT: &str = "PUT";
/// PATCH
pub const PATCH: &str = "PATCH";
/// DELETE
pub const DELETE: &str = "DELETE";
/// HEAD
pub const HEAD: &str = "HEAD";
/// OPTIONS
pub const OPTIONS: &str = "OPTIONS";
/// TRACE
pub const TRACE: &str = "TRACE";
/// CONNECT
pub const CONNECT: &str = "CONNECT";

/// Methods accepted under [`MethodPolicy::Standard`]
pub const STANDARD_METHODS: [&str; 9] =
    [GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS, TRACE, CONNECT];

/// Which method names a client is willing to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodPolicy {
    /// Any syntactically valid method token, sent verbatim
    #[default]
    Permissive,
    /// Only the standard methods in [`STANDARD_METHODS`]
    Standard,
}

/// Trim and upper-case a method name, then check it against the policy
pub fn normalize(method: &str, policy: MethodPolicy) -> Result<Method> {
    let upper = method.trim().to_ascii_uppercase();

    if policy == MethodPolicy::Standard && !STANDARD_METHODS.contains(&upper.as_str()) {
        return Err(Error::UnsupportedMethod(upper));
    }

    Method::from_bytes(upper.as_bytes()).map_err(|_| Error::UnsupportedMethod(upper))
}
