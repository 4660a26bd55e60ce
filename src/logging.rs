//! Logging setup
//!
//! The client logs through `tracing`; nothing is printed until a subscriber
//! is installed. These helpers install a formatted subscriber once per
//! process.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Level used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LEVEL: Level = Level::INFO;

/// Install a subscriber that logs at `level` and above
///
/// Fails if a global subscriber is already installed.
pub fn init(level: Level) -> Result<()> {
    install(level_filter(level))
}

/// Install a subscriber configured from `RUST_LOG`, falling back to `info`
///
/// Use `RUST_LOG=networking=debug` together with `Client::set_debug(true)`
/// to see request and response dumps.
pub fn init_from_env() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level_filter(DEFAULT_LEVEL));
    install(filter)
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

fn install(filter: EnvFilter) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("logging is already initialised")
}
