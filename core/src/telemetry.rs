// Logging setup shared by binaries embedding the bridge
use crate::{BtdError, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or `default_filter` when unset.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| BtdError::ConfigError(format!("failed to install subscriber: {}", e)))?;

    info!(target: "telemetry", "Logging initialized");
    Ok(())
}
