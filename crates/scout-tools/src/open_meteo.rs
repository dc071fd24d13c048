//! Open-Meteo weather client
//!
//! Resolves a city name through the geocoding API, then fetches current
//! conditions from the forecast API. No API key required.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const GEOCODING_API: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_API: &str = "https://api.open-meteo.com/v1/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("City '{0}' not found")]
    CityNotFound(String),
    #[error("geocoding API error: {status}")]
    GeocodingApi { status: u16 },
    #[error("forecast API error: {status}")]
    ForecastApi { status: u16 },
}

#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
}

impl OpenMeteoClient {
    pub fn new() -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Resolve a city name to its best-matching location
    pub async fn geocode(&self, city: &str) -> Result<Location, WeatherError> {
        let response = self
            .client
            .get(GEOCODING_API)
            .query(&[
                ("name", city),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Geocoding for '{}' returned HTTP {}", city, status);
            return Err(WeatherError::GeocodingApi {
                status: status.as_u16(),
            });
        }

        let body: GeocodingResponse = response.json().await?;
        body.results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::CityNotFound(city.to_string()))
    }

    /// Current weather for a city
    pub async fn current_weather(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let location = self.geocode(city).await?;
        debug!(
            "Resolved '{}' to {} ({}, {})",
            city, location.name, location.latitude, location.longitude
        );

        let response = self
            .client
            .get(FORECAST_API)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,weather_code,wind_speed_10m".to_string(),
                ),
                ("temperature_unit", "celsius".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Forecast for '{}' returned HTTP {}", city, status);
            return Err(WeatherError::ForecastApi {
                status: status.as_u16(),
            });
        }

        let forecast: ForecastResponse = response.json().await?;
        Ok(WeatherReport::new(location, forecast.current.unwrap_or_default()))
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: Option<f64>,
    pub weather_code: Option<u8>,
    pub wind_speed_10m: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub location: Location,
    pub current: CurrentConditions,
}

impl WeatherReport {
    pub fn new(location: Location, current: CurrentConditions) -> Self {
        Self { location, current }
    }

    /// One-line summary for the model
    pub fn format(&self) -> String {
        let place = match &self.location.country {
            Some(country) => format!("{}, {}", self.location.name, country),
            None => self.location.name.clone(),
        };
        let temp = self
            .current
            .temperature_2m
            .map(|t| t.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let wind = self
            .current
            .wind_speed_10m
            .map(|w| w.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let mut out = format!(
            "Weather in {}: Temperature: {}°C, Wind Speed: {} km/h",
            place, temp, wind
        );
        if let Some(code) = self.current.weather_code {
            out.push_str(&format!(", Conditions: {}", describe_weather_code(code)));
        }
        out
    }
}

/// WMO weather interpretation code
pub fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}
