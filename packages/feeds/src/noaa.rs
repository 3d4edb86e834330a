//! NOAA National Hurricane Center active storms.

use async_trait::async_trait;
use landcover_aoi::geometry::haversine_km;
use landcover_models::Coordinates;
use landcover_models::readings::{DisasterEvent, DisasterKind, Severity};
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{DisasterFeed, FeedError};

const SOURCE: &str = "NOAA";

pub struct NoaaClient {
    client: reqwest::Client,
    url: String,
    max_distance_km: f64,
}

impl NoaaClient {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_service(&crate::registered("noaa")?)
    }

    /// # Errors
    ///
    /// Returns [`FeedError`] if `service` is not a NOAA entry.
    pub fn from_service(service: &ServiceConfig) -> Result<Self, FeedError> {
        let ProviderConfig::Noaa { url, max_distance_km } = &service.provider else {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        };
        Ok(Self {
            client: crate::http_client(service)?,
            url: url.clone(),
            max_distance_km: *max_distance_km,
        })
    }
}

#[async_trait]
impl DisasterFeed for NoaaClient {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn disasters(&self, at: Coordinates) -> Result<Vec<DisasterEvent>, FeedError> {
        let body = retry::send_json(RetryPolicy::FEED, || self.client.get(&self.url)).await?;
        Ok(parse_storms(&body, at, self.max_distance_km))
    }
}

fn number(storm: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        storm.get(*key).and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    })
}

/// Storms within `max_km` of `center`. The feed has used both
/// `storms` and `activeStorms`, and both short and long field names.
#[must_use]
pub fn parse_storms(body: &Value, center: Coordinates, max_km: f64) -> Vec<DisasterEvent> {
    let Some(storms) = body
        .get("storms")
        .or_else(|| body.get("activeStorms"))
        .and_then(Value::as_array)
    else {
        return vec![];
    };

    storms
        .iter()
        .filter_map(|storm| {
            let lat = number(storm, &["lat", "latitude"])?;
            let lon = number(storm, &["lon", "longitude"])?;
            let distance = haversine_km(center, Coordinates::new(lat, lon));
            if distance > max_km {
                return None;
            }
            let name = ["name", "stormName"]
                .iter()
                .find_map(|key| storm.get(*key).and_then(Value::as_str))
                .unwrap_or("Unnamed Storm");
            let category = storm.get("category").or_else(|| storm.get("intensity"));
            let label = category.map_or_else(String::new, |c| {
                c.as_str().map_or_else(|| c.to_string(), ToString::to_string)
            });
            Some(DisasterEvent {
                kind: DisasterKind::Storm,
                title: format!("Cyclone {name}"),
                severity: category.map_or(Severity::Low, storm_severity),
                distance_km: Some(distance),
                time: None,
                source: SOURCE.to_string(),
                description: if label.is_empty() {
                    format!("{distance:.0} km away")
                } else {
                    format!("{label}, {distance:.0} km away")
                },
            })
        })
        .collect()
}

/// Numeric categories 3+ are high and 1-2 medium; text categories are
/// matched on "MAJOR" and "CATEGORY N".
#[must_use]
pub fn storm_severity(category: &Value) -> Severity {
    if let Some(n) = category.as_f64() {
        return if n >= 3.0 {
            Severity::High
        } else if n >= 1.0 {
            Severity::Medium
        } else {
            Severity::Low
        };
    }

    let text = category
        .as_str()
        .map_or_else(|| category.to_string(), str::to_uppercase);
    if text.contains("MAJOR")
        || ["CATEGORY 3", "CATEGORY 4", "CATEGORY 5"]
            .iter()
            .any(|c| text.contains(c))
    {
        Severity::High
    } else if text.contains("CATEGORY 1") || text.contains("CATEGORY 2") {
        Severity::Medium
    } else {
        Severity::Low
    }
}
