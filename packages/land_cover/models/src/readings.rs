//! Readings supplied by external feeds and consumed by the scorers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::Coordinates;

/// Current weather at a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    /// Air temperature in °C.
    pub temperature_c: f64,
    /// Relative humidity in percent.
    pub humidity_pct: f64,
    /// Precipitation over the last hour in mm.
    pub precipitation_mm: f64,
    /// Wind speed in m/s.
    pub wind_speed_ms: f64,
    /// Sea-level pressure in hPa.
    pub pressure_hpa: f64,
}

/// Air pollution at a coordinate.
///
/// `aqi` is the 1-5 level reported by the feed; concentrations are in
/// µg/m³ except `co`, which is in mg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityReading {
    pub aqi: u8,
    pub pm25: f64,
    pub pm10: f64,
    pub co: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
}

impl AirQualityReading {
    /// Name of the 1-5 level.
    #[must_use]
    pub const fn level_name(&self) -> &'static str {
        match self.aqi {
            1 => "Good",
            2 => "Fair",
            3 => "Moderate",
            4 => "Poor",
            5 => "Very Poor",
            _ => "Unknown",
        }
    }
}

/// Kind of a nearby hazard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisasterKind {
    Earthquake,
    Storm,
    WeatherAlert,
}

/// Three-level hazard severity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A hazard reported near the analysis center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterEvent {
    pub kind: DisasterKind,
    pub title: String,
    pub severity: Severity,
    /// Great-circle distance from the analysis center, when known.
    pub distance_km: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    /// Feed that reported the event.
    pub source: String,
    pub description: String,
}

/// A recent weather or climate news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsHeadline {
    pub title: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

/// A named sub-city place (suburb, neighbourhood or ward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locality {
    pub name: String,
    pub center: Coordinates,
    /// OSM `place` value or `admin_level=N`.
    pub place_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_quality_level_names() {
        let mut reading = AirQualityReading {
            aqi: 1,
            pm25: 0.0,
            pm10: 0.0,
            co: 0.0,
            no2: 0.0,
            so2: 0.0,
            o3: 0.0,
        };
        assert_eq!(reading.level_name(), "Good");
        reading.aqi = 5;
        assert_eq!(reading.level_name(), "Very Poor");
        reading.aqi = 9;
        assert_eq!(reading.level_name(), "Unknown");
    }

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(DisasterKind::WeatherAlert.to_string(), "weather_alert");
    }
}
