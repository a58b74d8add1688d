use serde::{Deserialize, Serialize};
use skyproxy_cache::CacheError;

/// Offset between Kelvin and Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// Conditions label used when upstream sends none
pub const UNKNOWN_CONDITIONS: &str = "Unknown";

/// Upstream current-weather payload (OpenWeatherMap shape)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiWeatherResponse {
    pub name: String,
    pub main: ApiMain,
    #[serde(default)]
    pub weather: Vec<ApiCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMain {
    /// Kelvin
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCondition {
    pub main: String,
    #[serde(default)]
    pub description: String,
}

/// Weather for a city, as returned to callers and stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub city: String,
    #[serde(rename = "temp")]
    pub temp_celsius: i32,
    pub conditions: String,
}

impl WeatherResult {
    pub fn from_api(api: &ApiWeatherResponse) -> Self {
        let conditions = api
            .weather
            .first()
            .map(|c| c.main.trim())
            .filter(|main| !main.is_empty())
            .unwrap_or(UNKNOWN_CONDITIONS)
            .to_string();

        Self {
            city: api.name.clone(),
            temp_celsius: kelvin_to_celsius(api.main.temp),
            conditions,
        }
    }
}

/// Convert Kelvin to whole degrees Celsius, rounding half away from zero.
pub fn kelvin_to_celsius(kelvin: f64) -> i32 {
    (kelvin - KELVIN_OFFSET).round() as i32
}

/// Failure of a single upstream call, decided where the response is read
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Unexpected upstream payload: {0}")]
    Decode(String),
}

/// How the orchestrator treats an upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 404: retrying won't make the city exist
    NotFound,
    /// 429: retrying makes it worse
    RateLimited,
    /// Payload we cannot read; the same bytes come back next time
    Malformed,
    /// Network error, timeout, 5xx and other statuses
    Retryable,
}

impl UpstreamError {
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error)
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn classify(&self) -> FailureClass {
        match self {
            Self::Status { status: 404, .. } => FailureClass::NotFound,
            Self::Status { status: 429, .. } => FailureClass::RateLimited,
            Self::Decode(_) => FailureClass::Malformed,
            _ => FailureClass::Retryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == FailureClass::Retryable
    }
}

/// Weather fetch errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("City is required")]
    InvalidCity,

    #[error("City \"{0}\" not found")]
    CityNotFound(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Failed to fetch weather data after {attempts} attempt(s): {source}")]
    UpstreamFailure {
        attempts: u32,
        #[source]
        source: UpstreamError,
    },

    #[error("Cache backend error: {0}")]
    Cache(#[from] CacheError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl WeatherError {
    /// HTTP status an HTTP boundary should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCity => 400,
            Self::CityNotFound(_) => 404,
            Self::RateLimited => 429,
            Self::UpstreamFailure { .. } | Self::Cache(_) | Self::Client(_) => 500,
        }
    }

    /// User-friendly error message
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCity => "Please enter a city name.",
            Self::CityNotFound(_) => "City not found. Check the spelling and try again.",
            Self::RateLimited => "Too many requests. Please wait and try again.",
            Self::UpstreamFailure { .. } => {
                "Weather service unavailable. Please try again later."
            }
            Self::Cache(_) => "Weather cache unavailable.",
            Self::Client(_) => "Weather service misconfigured.",
        }
    }
}
