pub mod config;
pub mod retry;

pub use config::{CacheConfig, Config, RetrySettings, ValidationResult, WeatherConfig};
pub use retry::{retry_if, with_retry, AttemptOutcome, RetryConfig};

use anyhow::Result;

/// Initialize logging for the process
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Skyproxy core initialized");
    Ok(())
}
