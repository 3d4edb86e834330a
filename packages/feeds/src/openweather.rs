//! `OpenWeather` current weather, air pollution and weather alerts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landcover_models::Coordinates;
use landcover_models::readings::{
    AirQualityReading, DisasterEvent, DisasterKind, Severity, WeatherReading,
};
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{AirQualityFeed, DisasterFeed, FeedError, WeatherFeed, f64_at, str_at};

/// Alert descriptions are cut to this many characters.
pub const ALERT_DESCRIPTION_CHARS: usize = 200;

const SOURCE: &str = "OpenWeather";

pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    one_call_urls: Vec<String>,
    api_key: String,
    alert_keywords: Vec<String>,
}

impl OpenWeatherClient {
    /// Builds a client from the registry entry and `OPENWEATHER_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured or the key
    /// is missing.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_service(&crate::registered("openweather")?)
    }

    /// # Errors
    ///
    /// Returns [`FeedError`] if `service` is not an `OpenWeather` entry or
    /// its key variable is unset.
    pub fn from_service(service: &ServiceConfig) -> Result<Self, FeedError> {
        let ProviderConfig::OpenWeather {
            base_url,
            one_call_urls,
            api_key_env,
            alert_keywords,
        } = &service.provider
        else {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        };
        Ok(Self {
            client: crate::http_client(service)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            one_call_urls: one_call_urls.clone(),
            api_key: crate::api_key(api_key_env)?,
            alert_keywords: alert_keywords.clone(),
        })
    }

    async fn get(
        &self,
        url: &str,
        at: Coordinates,
        extra: &[(&str, &str)],
    ) -> Result<Value, FeedError> {
        let lat = at.lat.to_string();
        let lon = at.lon.to_string();
        retry::send_json(RetryPolicy::FEED, || {
            self.client
                .get(url)
                .query(&[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("appid", self.api_key.as_str()),
                ])
                .query(extra)
        })
        .await
    }

    /// Weather alerts near `at`, trying each One Call endpoint in turn.
    ///
    /// # Errors
    ///
    /// Returns the last endpoint's error if none answers.
    pub async fn alerts(&self, at: Coordinates) -> Result<Vec<DisasterEvent>, FeedError> {
        let mut last_error = FeedError::NotConfigured {
            id: "openweather one call".to_string(),
        };
        for url in &self.one_call_urls {
            match self
                .get(url, at, &[("exclude", "minutely,hourly,daily")])
                .await
            {
                Ok(body) => return Ok(parse_alerts(&body, &self.alert_keywords)),
                Err(e) => {
                    log::debug!("One Call endpoint {url} failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl WeatherFeed for OpenWeatherClient {
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherReading, FeedError> {
        let url = format!("{}/weather", self.base_url);
        let body = self.get(&url, at, &[("units", "metric")]).await?;
        parse_weather(&body)
    }
}

#[async_trait]
impl AirQualityFeed for OpenWeatherClient {
    async fn air_quality(&self, at: Coordinates) -> Result<AirQualityReading, FeedError> {
        let url = format!("{}/air_pollution", self.base_url);
        let body = self.get(&url, at, &[]).await?;
        parse_air_quality(&body)
    }
}

#[async_trait]
impl DisasterFeed for OpenWeatherClient {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn disasters(&self, at: Coordinates) -> Result<Vec<DisasterEvent>, FeedError> {
        self.alerts(at).await
    }
}

/// Parses a `/weather` body. Precipitation is last-hour rain, else
/// last-hour snow, else zero.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] if a `main` or `wind` field is missing.
pub fn parse_weather(body: &Value) -> Result<WeatherReading, FeedError> {
    let field = |pointer: &str| {
        f64_at(body, pointer)
            .ok_or_else(|| FeedError::parse(format!("weather response has no {pointer}")))
    };
    let precipitation_mm = f64_at(body, "/rain/1h")
        .or_else(|| f64_at(body, "/snow/1h"))
        .unwrap_or(0.0);

    Ok(WeatherReading {
        temperature_c: field("/main/temp")?,
        humidity_pct: field("/main/humidity")?,
        precipitation_mm,
        wind_speed_ms: field("/wind/speed")?,
        pressure_hpa: field("/main/pressure")?,
    })
}

/// Parses an `/air_pollution` body. CO arrives in µg/m³ and is stored in
/// mg/m³.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] if there is no reading or the level is
/// outside 1-5.
pub fn parse_air_quality(body: &Value) -> Result<AirQualityReading, FeedError> {
    let entry = body
        .pointer("/list/0")
        .ok_or_else(|| FeedError::parse("air pollution response has no readings"))?;
    let aqi = entry
        .pointer("/main/aqi")
        .and_then(Value::as_u64)
        .and_then(|level| u8::try_from(level).ok())
        .filter(|level| (1..=5).contains(level))
        .ok_or_else(|| FeedError::parse("air pollution level missing or outside 1-5"))?;
    let component = |name: &str| f64_at(entry, &format!("/components/{name}")).unwrap_or(0.0);

    Ok(AirQualityReading {
        aqi,
        pm25: component("pm2_5"),
        pm10: component("pm10"),
        co: component("co") / 1_000.0,
        no2: component("no2"),
        so2: component("so2"),
        o3: component("o3"),
    })
}

/// Extracts alerts whose event names one of `keywords`.
#[must_use]
pub fn parse_alerts(body: &Value, keywords: &[String]) -> Vec<DisasterEvent> {
    let Some(alerts) = body.get("alerts").and_then(Value::as_array) else {
        return vec![];
    };

    alerts
        .iter()
        .filter_map(|alert| {
            let event = str_at(alert, "/event").unwrap_or_default();
            let lowered = event.to_lowercase();
            if !keywords.iter().any(|k| lowered.contains(k.as_str())) {
                return None;
            }
            let description = str_at(alert, "/description")
                .filter(|d| !d.is_empty())
                .map_or_else(
                    || "Weather alert active".to_string(),
                    |d| d.chars().take(ALERT_DESCRIPTION_CHARS).collect(),
                );
            Some(DisasterEvent {
                kind: DisasterKind::WeatherAlert,
                title: event.to_string(),
                severity: alert_severity(str_at(alert, "/severity").unwrap_or_default()),
                distance_km: Some(0.0),
                time: alert
                    .get("start")
                    .and_then(Value::as_i64)
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                source: SOURCE.to_string(),
                description,
            })
        })
        .collect()
}

/// Extreme or severe is high, moderate is medium, anything else low.
#[must_use]
pub fn alert_severity(severity: &str) -> Severity {
    let lowered = severity.to_lowercase();
    if lowered.contains("extreme") || lowered.contains("severe") {
        Severity::High
    } else if lowered.contains("moderate") {
        Severity::Medium
    } else {
        Severity::Low
    }
}
