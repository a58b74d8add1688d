//! Weather service for skyproxy
//!
//! Fetches current conditions from the OpenWeatherMap API with retry and
//! backoff, and serves repeat requests from the cache.

pub mod provider;
pub mod service;
pub mod types;

pub use provider::WeatherProvider;
pub use service::{
    cache_key, CacheLookup, FetchMode, FetchPolicy, Fetched, WeatherService,
    WEATHER_CACHE_NAMESPACE, WEATHER_CACHE_TTL_SECONDS,
};
pub use types::*;
