//! Structured logging for the bundler process

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Honors `RUST_LOG`, falling back to `info`.
pub fn init() -> Result<()> {
  init_with_default(DEFAULT_FILTER)
}

pub fn init_with_default(default_filter: &str) -> Result<()> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(default_filter))
    .map_err(|e| anyhow!("invalid log filter {default_filter:?}: {e}"))?;

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(true))
    .try_init()
    .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

  tracing::debug!(default_filter, "Logging initialized");
  Ok(())
}
