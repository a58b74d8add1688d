use anyhow::{Context, Result};
use skyproxy_cache::RedisCacheStore;
use skyproxy_core::Config;
use skyproxy_weather::{FetchMode, WeatherService};
use std::sync::Arc;

const USAGE: &str = "usage: skyproxy [--direct] <city> [<city> ...]";

#[tokio::main]
async fn main() -> Result<()> {
    skyproxy_core::init()?;

    let mut mode = FetchMode::Retrying;
    let mut cities = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--direct" => mode = FetchMode::Direct,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ => cities.push(arg),
        }
    }
    if cities.is_empty() {
        anyhow::bail!("no city given\n{USAGE}");
    }

    let (config, _) = Config::load_validated()?;

    let cache = Arc::new(
        RedisCacheStore::connect(&config.cache)
            .await
            .context("Invalid cache configuration")?,
    );
    let service = WeatherService::from_config(&config, cache.clone())
        .context("Failed to build weather service")?;

    tracing::info!("Skyproxy started");

    let mut failures = 0;
    for city in &cities {
        match service.fetch(city, mode).await {
            Ok(fetched) => {
                tracing::debug!(
                    cache = ?fetched.cache,
                    attempts = fetched.upstream_attempts,
                    "Served {}",
                    city
                );
                println!("{}", serde_json::to_string(&fetched.weather)?);
            }
            Err(e) => {
                failures += 1;
                tracing::error!("Weather lookup for {} failed: {}", city, e);
                eprintln!("{}: {} ({})", city, e.user_message(), e.status_code());
            }
        }
    }

    cache.close();

    if failures > 0 {
        anyhow::bail!("{failures} of {} lookup(s) failed", cities.len());
    }
    Ok(())
}
