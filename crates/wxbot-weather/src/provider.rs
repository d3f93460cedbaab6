//! Forecast source: OpenWeatherMap 5 day / 3 hour forecast.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use wxbot_core::{with_retry, ForecastConfig, HttpConfig, RetryConfig};

use crate::error::FetchError;
use crate::types::ForecastPoint;

/// Anything that can produce forecast points for a coordinate.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, longitude: f64, latitude: f64) -> Result<Vec<ForecastPoint>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmEntry>,
    city: OwmCity,
}

#[derive(Debug, Deserialize)]
struct OwmCity {
    /// Seconds east of UTC
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwmEntry {
    dt: i64,
    main: OwmMain,
    wind: OwmWind,
    #[serde(default)]
    clouds: Option<OwmClouds>,
    #[serde(default)]
    rain: Option<OwmRain>,
    #[serde(default)]
    weather: Vec<OwmWeather>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
    #[serde(default)]
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    id: u16,
    description: String,
}

impl OwmForecastResponse {
    fn into_points(self) -> Result<Vec<ForecastPoint>, FetchError> {
        let offset = FixedOffset::east_opt(self.city.timezone).ok_or_else(|| {
            FetchError::Parse(format!("timezone offset out of range: {}", self.city.timezone))
        })?;

        self.list
            .into_iter()
            .map(|entry| {
                let utc = DateTime::from_timestamp(entry.dt, 0)
                    .ok_or_else(|| FetchError::Parse(format!("invalid timestamp: {}", entry.dt)))?;
                let (condition_code, description) = entry
                    .weather
                    .into_iter()
                    .next()
                    .map(|w| (w.id, w.description))
                    .unwrap_or((800, String::new()));

                Ok(ForecastPoint {
                    timestamp: utc.with_timezone(&offset),
                    temperature: entry.main.temp,
                    feels_like: entry.main.feels_like,
                    wind_speed: entry.wind.speed,
                    gust_speed: entry.wind.gust,
                    cloud_cover: entry.clouds.map_or(0.0, |c| c.all),
                    rain_3h: entry.rain.and_then(|r| r.three_hours),
                    condition_code,
                    description,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
    units: String,
    retry: RetryConfig,
}

impl OpenWeatherProvider {
    pub fn new(config: &ForecastConfig, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(http.timeout()).build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            units: config.units.clone(),
            retry: http.retry(),
        })
    }
}

#[async_trait]
impl ForecastSource for OpenWeatherProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, longitude: f64, latitude: f64) -> Result<Vec<ForecastPoint>, FetchError> {
        let url = format!("{}/forecast", self.base_url);
        let lat = latitude.to_string();
        let lon = longitude.to_string();

        let response = with_retry(&self.retry, || {
            self.client
                .get(&url)
                .query(&[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("appid", self.api_key.as_str()),
                    ("units", self.units.as_str()),
                ])
                .send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Forecast request returned status {}", status);
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        let body: OwmForecastResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        let points = body.into_points()?;
        tracing::debug!("Fetched {} forecast points", points.len());
        Ok(points)
    }
}
