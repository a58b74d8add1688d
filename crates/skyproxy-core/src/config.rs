use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::retry::RetryConfig;

pub const DEFAULT_WEATHER_API_KEY: &str = "mock_key";
pub const DEFAULT_WEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_WEATHER_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_WEATHER_CACHE_TTL_SECONDS: u64 = 60;
pub const DEFAULT_CACHE_HOST: &str = "localhost";
pub const DEFAULT_CACHE_PORT: u16 = 6379;
pub const DEFAULT_CACHE_PASSWORD: &str = "password";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line summary of all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream weather API settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Cache backend connection
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry/backoff for upstream calls
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key (`appid` query parameter)
    pub api_key: String,

    /// Current-weather endpoint
    pub api_url: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// How long a fetched result stays cached
    pub cache_ttl_seconds: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_WEATHER_API_KEY.to_string(),
            api_url: DEFAULT_WEATHER_API_URL.to_string(),
            timeout_ms: DEFAULT_WEATHER_TIMEOUT_MS,
            cache_ttl_seconds: DEFAULT_WEATHER_CACHE_TTL_SECONDS,
        }
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Redis connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    /// Empty string means no AUTH
    pub password: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CACHE_HOST.to_string(),
            port: DEFAULT_CACHE_PORT,
            password: DEFAULT_CACHE_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: crate::retry::DEFAULT_MAX_RETRIES,
            initial_delay_ms: crate::retry::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: crate::retry::DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.initial_delay_ms, self.max_delay_ms)
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults there if
    /// the file is missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings
    /// are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Apply environment-style overrides.
    ///
    /// `lookup` maps a variable name to its value; unparseable numbers are
    /// ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WEATHER_API_KEY") {
            self.weather.api_key = v;
        }
        if let Some(v) = lookup("WEATHER_API_URL") {
            self.weather.api_url = v;
        }
        if let Some(v) = parse_override(&lookup, "WEATHER_TIMEOUT_MS") {
            self.weather.timeout_ms = v;
        }
        if let Some(v) = parse_override(&lookup, "WEATHER_CACHE_TTL_SECONDS") {
            self.weather.cache_ttl_seconds = v;
        }
        if let Some(v) = lookup("CACHE_HOST") {
            self.cache.host = v;
        }
        if let Some(v) = parse_override(&lookup, "CACHE_PORT") {
            self.cache.port = v;
        }
        if let Some(v) = lookup("CACHE_PASSWORD") {
            self.cache.password = v;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_url, "weather.api_url", &mut result);

        if self.weather.api_key.trim().is_empty() {
            result.add_error("weather.api_key", "API key must not be empty");
        } else if self.weather.api_key == DEFAULT_WEATHER_API_KEY {
            result.add_warning(
                "weather.api_key",
                "Using placeholder API key - upstream calls will be rejected",
            );
        }

        if self.weather.timeout_ms == 0 {
            result.add_error("weather.timeout_ms", "Timeout must be greater than 0");
        }

        if self.weather.cache_ttl_seconds == 0 {
            result.add_warning(
                "weather.cache_ttl_seconds",
                "Cache TTL is 0 - every request will hit the upstream API",
            );
        }

        if self.cache.host.trim().is_empty() {
            result.add_error("cache.host", "Cache host must not be empty");
        }

        if self.cache.port == 0 {
            result.add_error("cache.port", "Port cannot be 0");
        }

        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            result.add_warning(
                "retry.max_delay_ms",
                "max_delay_ms is below initial_delay_ms; every delay will be clamped",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skyproxy");

        Ok(config_dir.join("config.toml"))
    }
}

fn parse_override<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.weather.api_key, "mock_key");
        assert_eq!(config.weather.api_url, DEFAULT_WEATHER_API_URL);
        assert_eq!(config.weather.timeout(), Duration::from_secs(5));
        assert_eq!(config.weather.cache_ttl_seconds, 60);
        assert_eq!(config.cache.host, "localhost");
        assert_eq!(config.cache.port, 6379);
        assert_eq!(config.cache.password, "password");
        assert_eq!(config.retry.to_retry_config(), RetryConfig::default());
    }

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Placeholder key is only a warning
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.api_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.api_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.api_url = "ftp://example.com/weather".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_port_is_error() {
        let mut config = Config::default();
        config.cache.port = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "cache.port"));
    }

    #[test]
    fn test_inverted_retry_delays_is_warning() {
        let mut config = Config::default();
        config.retry.initial_delay_ms = 5000;
        config.retry.max_delay_ms = 100;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "retry.max_delay_ms"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("WEATHER_API_KEY", "real-key"),
            ("WEATHER_API_URL", "http://localhost:9000/weather"),
            ("CACHE_HOST", "redis.internal"),
            ("CACHE_PORT", "6380"),
            ("CACHE_PASSWORD", ""),
            ("WEATHER_CACHE_TTL_SECONDS", "120"),
        ]));

        assert_eq!(config.weather.api_key, "real-key");
        assert_eq!(config.weather.api_url, "http://localhost:9000/weather");
        assert_eq!(config.cache.host, "redis.internal");
        assert_eq!(config.cache.port, 6380);
        assert_eq!(config.cache.password, "");
        assert_eq!(config.weather.cache_ttl_seconds, 120);
    }

    #[test]
    fn test_bad_numeric_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("CACHE_PORT", "sixty-three-seventy-nine")]));
        assert_eq!(config.cache.port, DEFAULT_CACHE_PORT);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            [cache]
            host = "cache.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.host, "cache.example.com");
        assert_eq!(config.cache.port, DEFAULT_CACHE_PORT);
        assert_eq!(config.weather.api_url, DEFAULT_WEATHER_API_URL);
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn test_load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.cache.port, DEFAULT_CACHE_PORT);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.weather.api_url, config.weather.api_url);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
