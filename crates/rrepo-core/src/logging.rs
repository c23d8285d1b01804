//! Tracing subscriber setup.

use crate::config::RepoConfig;
use crate::error::{RepoError, Result};

/// Install a global fmt subscriber filtered at `log_level`.
///
/// `RUST_LOG` takes precedence when set. Fails if a global subscriber is
/// already installed.
pub fn init_logging(log_level: &str) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| RepoError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// [`init_logging`] at the configured level.
pub fn init_from_config(config: &RepoConfig) -> Result<()> {
    init_logging(&config.general().log_level)
}
