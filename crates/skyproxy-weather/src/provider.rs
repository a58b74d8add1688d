//! Upstream weather API client.

use reqwest::Client;
use skyproxy_core::WeatherConfig;
use std::time::Duration;
use tracing::instrument;

use crate::types::{ApiWeatherResponse, UpstreamError, WeatherError};

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

impl WeatherProvider {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::new(&config.api_url, &config.api_key, config.timeout())
    }

    /// Fetch current weather for a city: `GET {api_url}?q={city}&appid={key}`.
    ///
    /// Non-2xx responses become `UpstreamError::Status` carrying the code.
    #[instrument(skip(self), level = "info")]
    pub async fn current(&self, city: &str) -> Result<ApiWeatherResponse, UpstreamError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Upstream returned {} for {}", status, city);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ApiWeatherResponse>()
            .await
            .map_err(UpstreamError::from_reqwest)
    }
}
