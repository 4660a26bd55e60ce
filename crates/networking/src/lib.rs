//! HTTP client for Courier
//!
//! This crate provides a reusable HTTP client with linear-backoff retries,
//! cookie handling, Basic authentication, form submission, and a
//! reconfigurable connection pool.
//!
//! # Examples
//! ```no_run
//! use networking::{Client, Cookie};
//!
//! async fn example() -> networking::Result<()> {
//!     let client = Client::new()?;
//!     client.set_cookie(Cookie::new("session", "abc"));
//!
//!     match client.get("https://example.com/status").await {
//!         Ok(response) => println!("{}", response.text()),
//!         Err(err) if err.is_timeout() => println!("slow server"),
//!         Err(err) => return Err(err),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod cookie;
pub mod error;
pub mod form;
pub mod method;
pub mod pool;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::{BasicAuth, Client};
pub use config::{ClientConfig, DEFAULT_CONTENT_TYPE, FORM_URLENCODED, MULTIPART_FORM_DATA};
pub use cookie::Cookie;
pub use error::{Error, ErrorCode, NetworkErrorKind};
pub use form::{FormSource, MultipartWriter};
pub use method::MethodPolicy;
pub use pool::{ConnectionPoolStats, PoolConfig};
pub use response::Response;
pub use retry::RetryConfig;
pub use transport::{HttpTransport, Transport, TransportSettings};

pub use tokio_util::sync::CancellationToken;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
