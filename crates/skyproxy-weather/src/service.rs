//! Cache-aside weather fetch.
//!
//! `CacheLookup -> Fetch (with retries) -> Transform -> CacheWrite`, strictly
//! in that order per request. Concurrent misses for the same city are not
//! coalesced: each one calls upstream and writes the cache.

use skyproxy_cache::{CacheError, CacheKey, CacheStore, CacheStoreExt};
use skyproxy_core::{retry_if, Config, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::instrument;

use crate::provider::WeatherProvider;
use crate::types::{FailureClass, UpstreamError, WeatherError, WeatherResult};

/// Cache namespace for weather entries
pub const WEATHER_CACHE_NAMESPACE: &str = "weather";

/// Default lifetime of a cached result
pub const WEATHER_CACHE_TTL_SECONDS: u64 = 60;

/// Whether upstream calls go through the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One attempt
    Direct,
    /// Up to `max_retries + 1` attempts with exponential backoff
    Retrying,
}

/// What the cache said before we went upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    /// Backend unreachable or failing; treated as a miss
    Unavailable,
    /// Entry present but not a valid `WeatherResult`; treated as a miss
    Corrupt,
}

/// A fetched result plus how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub weather: WeatherResult,
    pub cache: CacheLookup,
    /// Upstream calls made for this request (0 on a cache hit)
    pub upstream_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub retry: RetryConfig,
    pub cache_ttl_seconds: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            cache_ttl_seconds: WEATHER_CACHE_TTL_SECONDS,
        }
    }
}

impl FetchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: config.retry.to_retry_config(),
            cache_ttl_seconds: config.weather.cache_ttl_seconds,
        }
    }
}

/// Weather fetch orchestrator
pub struct WeatherService {
    provider: WeatherProvider,
    cache: Arc<dyn CacheStore>,
    policy: FetchPolicy,
}

impl WeatherService {
    pub fn new(provider: WeatherProvider, cache: Arc<dyn CacheStore>, policy: FetchPolicy) -> Self {
        Self {
            provider,
            cache,
            policy,
        }
    }

    pub fn from_config(config: &Config, cache: Arc<dyn CacheStore>) -> Result<Self, WeatherError> {
        let provider = WeatherProvider::from_config(&config.weather)?;
        Ok(Self::new(provider, cache, FetchPolicy::from_config(config)))
    }

    /// Cached fetch with retry and backoff on transient upstream failures.
    ///
    /// # Errors
    /// `CityNotFound` (404), `RateLimited` (429), `UpstreamFailure` once
    /// retries are exhausted, `InvalidCity` for a blank name.
    pub async fn fetch_weather(&self, city: &str) -> Result<WeatherResult, WeatherError> {
        self.fetch(city, FetchMode::Retrying)
            .await
            .map(|fetched| fetched.weather)
    }

    /// Cached fetch with a single upstream attempt.
    pub async fn fetch_weather_direct(&self, city: &str) -> Result<WeatherResult, WeatherError> {
        self.fetch(city, FetchMode::Direct)
            .await
            .map(|fetched| fetched.weather)
    }

    /// Run one request through the pipeline and report how it was served.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(&self, city: &str, mode: FetchMode) -> Result<Fetched, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::InvalidCity);
        }

        let key = cache_key(city);

        let cached: Result<WeatherResult, CacheError> = self.cache.get_json(&key).await;
        let lookup = match cached {
            Ok(weather) => {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(Fetched {
                    weather,
                    cache: CacheLookup::Hit,
                    upstream_attempts: 0,
                });
            }
            Err(e) => classify_lookup(&key, &e),
        };

        tracing::info!("Fetching weather for city: {}", city);
        let (weather, upstream_attempts) = self.fetch_upstream(city, mode).await?;

        self.write_through(&key, &weather).await;

        Ok(Fetched {
            weather,
            cache: lookup,
            upstream_attempts,
        })
    }

    /// Store a result with no expiry, outside the read-through path.
    ///
    /// # Errors
    /// `WeatherError::Cache` if the backend rejects the write.
    pub async fn seed_cache(&self, city: &str, weather: &WeatherResult) -> Result<(), WeatherError> {
        let key = cache_key(city);
        self.cache.set_json(&key, weather).await?;
        tracing::debug!(key = %key, "Seeded cache entry");
        Ok(())
    }

    async fn fetch_upstream(
        &self,
        city: &str,
        mode: FetchMode,
    ) -> Result<(WeatherResult, u32), WeatherError> {
        let retry = match mode {
            FetchMode::Direct => RetryConfig::no_retry(),
            FetchMode::Retrying => self.policy.retry.clone(),
        };

        let attempts = AtomicU32::new(0);
        let provider = &self.provider;

        let result = retry_if(
            &retry,
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                provider.current(city)
            },
            UpstreamError::is_retryable,
        )
        .await;

        let attempts = attempts.into_inner();

        match result {
            Ok(api) => Ok((WeatherResult::from_api(&api), attempts)),
            Err(e) => Err(translate_failure(city, e, attempts)),
        }
    }

    async fn write_through(&self, key: &CacheKey, weather: &WeatherResult) {
        let ttl = self.policy.cache_ttl_seconds;
        if ttl == 0 {
            tracing::debug!(key = %key, "Cache TTL is 0, skipping write");
            return;
        }

        if let Err(e) = self.cache.set_json_with_expiry(key, weather, ttl).await {
            tracing::warn!(key = %key, "Failed to cache weather result: {}", e);
        }
    }
}

/// Cache key for a city; padding and case are ignored.
pub fn cache_key(city: &str) -> CacheKey {
    CacheKey::new(WEATHER_CACHE_NAMESPACE, city)
}

fn translate_failure(city: &str, error: UpstreamError, attempts: u32) -> WeatherError {
    match error.classify() {
        FailureClass::NotFound => WeatherError::CityNotFound(city.to_string()),
        FailureClass::RateLimited => WeatherError::RateLimited,
        FailureClass::Malformed | FailureClass::Retryable => {
            tracing::error!(
                attempts,
                "Failed to fetch weather for {}: {}",
                city,
                error
            );
            WeatherError::UpstreamFailure {
                attempts,
                source: error,
            }
        }
    }
}

fn classify_lookup(key: &CacheKey, error: &CacheError) -> CacheLookup {
    match error {
        CacheError::NotFound(_) => {
            tracing::debug!(key = %key, "Cache miss");
            CacheLookup::Miss
        }
        CacheError::Serialization(e) => {
            tracing::warn!(key = %key, "Discarding unreadable cache entry: {}", e);
            CacheLookup::Corrupt
        }
        other => {
            tracing::warn!(key = %key, "Cache unavailable, falling back to upstream: {}", other);
            CacheLookup::Unavailable
        }
    }
}
