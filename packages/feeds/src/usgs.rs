//! USGS earthquake catalog.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use landcover_aoi::geometry::haversine_km;
use landcover_models::Coordinates;
use landcover_models::readings::{DisasterEvent, DisasterKind, Severity};
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{DisasterFeed, FeedError, f64_at, str_at};

const SOURCE: &str = "USGS";

pub struct UsgsClient {
    client: reqwest::Client,
    base_url: String,
    lookback_days: i64,
    min_magnitude: f64,
    max_radius_km: f64,
    min_distance_km: f64,
}

impl UsgsClient {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_service(&crate::registered("usgs")?)
    }

    /// # Errors
    ///
    /// Returns [`FeedError`] if `service` is not a USGS entry.
    pub fn from_service(service: &ServiceConfig) -> Result<Self, FeedError> {
        let ProviderConfig::Usgs {
            base_url,
            lookback_days,
            min_magnitude,
            max_radius_km,
            min_distance_km,
        } = &service.provider
        else {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        };
        Ok(Self {
            client: crate::http_client(service)?,
            base_url: base_url.clone(),
            lookback_days: *lookback_days,
            min_magnitude: *min_magnitude,
            max_radius_km: *max_radius_km,
            min_distance_km: *min_distance_km,
        })
    }
}

#[async_trait]
impl DisasterFeed for UsgsClient {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn disasters(&self, at: Coordinates) -> Result<Vec<DisasterEvent>, FeedError> {
        let start = (Utc::now() - Duration::days(self.lookback_days))
            .format("%Y-%m-%d")
            .to_string();
        let params = [
            ("format", "geojson".to_string()),
            ("latitude", at.lat.to_string()),
            ("longitude", at.lon.to_string()),
            ("maxradiuskm", self.max_radius_km.to_string()),
            ("starttime", start),
            ("minmagnitude", self.min_magnitude.to_string()),
        ];
        let body = retry::send_json(RetryPolicy::FEED, || {
            self.client.get(&self.base_url).query(&params)
        })
        .await?;
        Ok(parse_earthquakes(
            &body,
            at,
            self.min_distance_km,
            self.max_radius_km,
        ))
    }
}

/// Earthquakes between `min_km` and `max_km` of `center`.
#[must_use]
pub fn parse_earthquakes(
    body: &Value,
    center: Coordinates,
    min_km: f64,
    max_km: f64,
) -> Vec<DisasterEvent> {
    let Some(features) = body.get("features").and_then(Value::as_array) else {
        return vec![];
    };

    features
        .iter()
        .filter_map(|feature| {
            let lon = f64_at(feature, "/geometry/coordinates/0")?;
            let lat = f64_at(feature, "/geometry/coordinates/1")?;
            let distance = haversine_km(center, Coordinates::new(lat, lon));
            if !(min_km..=max_km).contains(&distance) {
                return None;
            }
            let magnitude = f64_at(feature, "/properties/mag").unwrap_or(0.0);
            let place = str_at(feature, "/properties/place").unwrap_or("Unknown location");
            Some(DisasterEvent {
                kind: DisasterKind::Earthquake,
                title: format!("Earthquake M{magnitude:.1}"),
                severity: earthquake_severity(magnitude),
                distance_km: Some(distance),
                time: feature
                    .pointer("/properties/time")
                    .and_then(Value::as_i64)
                    .and_then(DateTime::<Utc>::from_timestamp_millis),
                source: SOURCE.to_string(),
                description: format!("{place} ({distance:.0} km away)"),
            })
        })
        .collect()
}

/// M7 and above is high, M5.5 and above medium.
#[must_use]
pub fn earthquake_severity(magnitude: f64) -> Severity {
    if magnitude >= 7.0 {
        Severity::High
    } else if magnitude >= 5.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn quake(lat: f64, lon: f64, mag: f64) -> Value {
        json!({
            "properties": {"mag": mag, "place": "offshore", "time": 1_700_000_000_000_i64},
            "geometry": {"type": "Point", "coordinates": [lon, lat, 10.0]}
        })
    }

    #[test]
    fn keeps_only_the_distance_band() {
        let center = Coordinates::new(0.0, 0.0);
        // 1° of latitude is roughly 111 km.
        let body = json!({"features": [
            quake(1.0, 0.0, 6.0),
            quake(3.5, 0.0, 7.2),
            quake(6.0, 0.0, 5.0),
        ]});
        let events = parse_earthquakes(&body, center, 300.0, 500.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Earthquake M7.2");
        assert_eq!(events[0].severity, Severity::High);
        assert!(events[0].time.is_some());
        let distance = events[0].distance_km.unwrap();
        assert!((300.0..=500.0).contains(&distance));
    }

    #[test]
    fn severity_thresholds() {
        assert_eq!(earthquake_severity(7.0), Severity::High);
        assert_eq!(earthquake_severity(5.5), Severity::Medium);
        assert_eq!(earthquake_severity(4.9), Severity::Low);
    }

    #[test]
    fn missing_features_is_empty() {
        assert!(parse_earthquakes(&json!({}), Coordinates::new(0.0, 0.0), 0.0, 500.0).is_empty());
    }
}
