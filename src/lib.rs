//! Courier: a reusable HTTP client
//!
//! Re-exports the [`networking`] crate and adds process-level logging setup.
//!
//! # Examples
//! ```no_run
//! use courier::{logging, Client};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     logging::init_from_env()?;
//!
//!     let client = Client::new()?;
//!     client.set_debug(true);
//!     let response = client.get("https://example.com/").await?;
//!     println!("{}", response.status_text);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use networking::*;

pub mod logging;
