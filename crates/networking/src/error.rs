//! Error types for the HTTP client
//!
//! Every failure is returned as a value. The variants separate "never got a
//! response" ([`Error::Network`]) from "got an unwanted response"
//! ([`Error::Server`]) so callers can pick between retrying elsewhere and
//! inspecting the body.

use std::fmt;
use std::time::Duration;

use crate::response::Response;

/// Boxed error source carried by [`Error::Network`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What stage of a client-side failure went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The request could not be constructed (bad URL, bad header)
    Build,
    /// No connection could be established (refused, DNS, TLS)
    Connect,
    /// The round trip exceeded the configured deadline
    Timeout,
    /// The response body could not be drained
    Body,
    /// A local byte source could not be read
    Io,
    /// Any other transport failure (reset, protocol error)
    Transport,
}

impl NetworkErrorKind {
    /// Short lowercase label used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::Build => "build",
            NetworkErrorKind::Connect => "connect",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Body => "body",
            NetworkErrorKind::Io => "io",
            NetworkErrorKind::Transport => "transport",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed error codes, one per [`Error`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Client-side or transport failure
    Network,
    /// Non-success status from the server
    Server,
    /// Method rejected before sending
    UnsupportedMethod,
    /// Aborted through a cancellation token
    Cancelled,
    /// Invalid client configuration
    InvalidConfig,
    /// JSON encoding or decoding failure
    Json,
}

impl ErrorCode {
    /// Stable string form of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Network => "NetworkError",
            ErrorCode::Server => "ServerError",
            ErrorCode::UnsupportedMethod => "UnsupportedMethod",
            ErrorCode::Cancelled => "Cancelled",
            ErrorCode::InvalidConfig => "InvalidConfig",
            ErrorCode::Json => "JsonError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP client errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable response was obtained
    #[error("Network error ({kind}): {message}")]
    Network {
        /// Failure stage
        kind: NetworkErrorKind,
        /// Human-readable description
        message: String,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },

    /// The server answered with a status outside 200-206
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Raw response body as text
        message: String,
        /// The fully drained response
        response: Box<Response>,
    },

    /// The method is not a valid token or is outside the allow-list
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The request was aborted by its cancellation token
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a network error without an underlying cause
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Error::Network { kind, message: message.into(), source: None }
    }

    /// Build a network error wrapping a cause
    pub fn network_with_source(
        kind: NetworkErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Network { kind, message: message.into(), source: Some(source.into()) }
    }

    /// Classify a transport failure
    ///
    /// `timeout` is the deadline that was in force, used to make timeout
    /// messages self-explanatory.
    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        let (kind, message) = if err.is_timeout() {
            (NetworkErrorKind::Timeout, format!("request timed out after {:?}: {}", timeout, err))
        } else if err.is_builder() {
            (NetworkErrorKind::Build, format!("failed to build request: {}", err))
        } else if err.is_connect() {
            (NetworkErrorKind::Connect, format!("connection failed: {}", err))
        } else if err.is_body() || err.is_decode() {
            (NetworkErrorKind::Body, format!("failed to read response body: {}", err))
        } else {
            (NetworkErrorKind::Transport, format!("request failed: {}", err))
        };
        Error::network_with_source(kind, message, err)
    }

    /// Fixed code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Network { .. } => ErrorCode::Network,
            Error::Server { .. } => ErrorCode::Server,
            Error::UnsupportedMethod(_) => ErrorCode::UnsupportedMethod,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::Config(_) => ErrorCode::InvalidConfig,
            Error::Json(_) => ErrorCode::Json,
        }
    }

    /// Whether no response was obtained
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// Whether the failure was a deadline being exceeded
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network { kind: NetworkErrorKind::Timeout, .. })
    }

    /// Whether the request was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Network failure stage, if this is a network error
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            Error::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status of a server error
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response attached to a server error
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Server { response, .. } => Some(&**response),
            _ => None,
        }
    }

    /// Take the response out of a server error
    pub fn into_response(self) -> Option<Response> {
        match self {
            Error::Server { response, .. } => Some(*response),
            _ => None,
        }
    }
}
