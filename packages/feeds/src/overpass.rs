//! Named sub-city places from the Overpass API.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use landcover_aoi::{AoiError, LocalitySource};
use landcover_models::Coordinates;
use landcover_models::readings::Locality;
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{FeedError, f64_at, str_at};

/// Pause before moving on to the next mirror.
const MIRROR_PAUSE: Duration = Duration::from_secs(1);

pub struct OverpassClient {
    client: reqwest::Client,
    mirrors: Vec<String>,
}

impl OverpassClient {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_service(&crate::registered("overpass")?)
    }

    /// # Errors
    ///
    /// Returns [`FeedError`] if `service` is not an Overpass entry or
    /// lists no mirrors.
    pub fn from_service(service: &ServiceConfig) -> Result<Self, FeedError> {
        let ProviderConfig::Overpass { mirrors } = &service.provider else {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        };
        if mirrors.is_empty() {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        }
        Ok(Self {
            client: crate::http_client(service)?,
            mirrors: mirrors.clone(),
        })
    }

    async fn query_mirror(&self, mirror: &str, query: &str) -> Result<Value, FeedError> {
        let text = retry::send_text(RetryPolicy::ONCE, || {
            self.client.post(mirror).body(query.to_string())
        })
        .await?;
        parse_body(&text)
    }
}

#[async_trait]
impl LocalitySource for OverpassClient {
    async fn localities(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Locality>, AoiError> {
        let query = build_query(center, radius_km);
        let mut last_error = None;

        for (index, mirror) in self.mirrors.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(MIRROR_PAUSE).await;
            }
            match self.query_mirror(mirror, &query).await {
                Ok(body) => {
                    let localities = parse_localities(&body);
                    log::info!(
                        "{} localities within {radius_km} km from {mirror}",
                        localities.len()
                    );
                    return Ok(localities);
                }
                Err(e) => {
                    log::warn!("Overpass mirror {mirror} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        let suggested = if radius_km > 10.0 {
            (radius_km / 2.0).floor().max(5.0)
        } else {
            radius_km
        };
        Err(AoiError::Lookup {
            message: format!(
                "all {} Overpass mirrors failed (last error: {}); try a smaller radius \
                 (currently {radius_km} km, suggested {suggested} km) or retry later",
                self.mirrors.len(),
                last_error.map_or_else(|| "none".to_string(), |e| e.to_string()),
            ),
        })
    }
}

/// Server-side timeout, scaled with the radius between 15 and 30 s.
#[must_use]
pub fn query_timeout_secs(radius_km: f64) -> f64 {
    (radius_km * 2.0).clamp(15.0, 30.0)
}

/// Suburbs, neighbourhoods and admin level 9/10 wards around `center`,
/// returning only tags and centers.
#[must_use]
pub fn build_query(center: Coordinates, radius_km: f64) -> String {
    let radius_m = (radius_km * 1_000.0).round();
    let around = format!("(around:{radius_m},{},{})", center.lat, center.lon);
    format!(
        "[out:json][timeout:{timeout}];\n\
         (\n  \
         node[\"place\"~\"suburb|neighbourhood\"]{around};\n  \
         way[\"place\"~\"suburb|neighbourhood\"]{around};\n  \
         relation[\"place\"~\"suburb|neighbourhood\"]{around};\n  \
         relation[\"boundary\"=\"administrative\"][\"admin_level\"~\"9|10\"]{around};\n\
         );\n\
         out tags center;",
        timeout = query_timeout_secs(radius_km),
    )
}

/// Overloaded mirrors answer with an empty body or an HTML error page.
fn parse_body(text: &str) -> Result<Value, FeedError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FeedError::parse("empty response"));
    }
    if text.starts_with('<') {
        return Err(FeedError::parse(format!(
            "HTML error page instead of JSON: {}",
            text.chars().take(100).collect::<String>()
        )));
    }
    serde_json::from_str(text).map_err(|e| FeedError::parse(format!("invalid JSON: {e}")))
}

/// Extracts named places, deduplicated case-insensitively and sorted by
/// name.
#[must_use]
pub fn parse_localities(body: &Value) -> Vec<Locality> {
    let Some(elements) = body.get("elements").and_then(Value::as_array) else {
        return vec![];
    };

    let mut seen = BTreeSet::new();
    let mut localities: Vec<Locality> = elements
        .iter()
        .filter_map(|element| {
            let tags = element.get("tags")?;
            let name = ["name", "name:en", "alt_name"]
                .iter()
                .find_map(|key| tags.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|name| !name.is_empty())?;
            let center = f64_at(element, "/center/lat")
                .zip(f64_at(element, "/center/lon"))
                .or_else(|| f64_at(element, "/lat").zip(f64_at(element, "/lon")))
                .map(|(lat, lon)| Coordinates::new(lat, lon))?;
            if !seen.insert(name.to_lowercase()) {
                return None;
            }

            let place_type = str_at(tags, "/place").map_or_else(
                || {
                    if str_at(tags, "/boundary") == Some("administrative") {
                        str_at(tags, "/admin_level")
                            .map_or_else(|| "administrative".to_string(), |l| format!("ward_{l}"))
                    } else {
                        "locality".to_string()
                    }
                },
                ToString::to_string,
            );

            Some(Locality {
                name: name.to_string(),
                center,
                place_type,
            })
        })
        .collect();

    localities.sort_by_key(|l| l.name.to_lowercase());
    localities
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_scales_timeout_with_radius() {
        assert!((query_timeout_secs(2.0) - 15.0).abs() < 1e-9);
        assert!((query_timeout_secs(10.0) - 20.0).abs() < 1e-9);
        assert!((query_timeout_secs(50.0) - 30.0).abs() < 1e-9);

        let query = build_query(Coordinates::new(17.385, 78.4867), 10.0);
        assert!(query.starts_with("[out:json][timeout:20];"));
        assert!(query.contains("(around:10000,17.385,78.4867)"));
        assert!(query.contains("[\"admin_level\"~\"9|10\"]"));
        assert!(query.ends_with("out tags center;"));
    }

    #[test]
    fn parses_dedups_and_sorts() {
        let body = json!({"elements": [
            {"type": "node", "lat": 17.41, "lon": 78.44,
             "tags": {"name": "Banjara Hills", "place": "suburb"}},
            {"type": "way", "center": {"lat": 17.43, "lon": 78.41},
             "tags": {"name": "banjara hills", "place": "neighbourhood"}},
            {"type": "relation", "center": {"lat": 17.45, "lon": 78.38},
             "tags": {"name:en": "Ameerpet", "boundary": "administrative", "admin_level": "10"}},
            {"type": "relation", "center": {"lat": 17.40, "lon": 78.47},
             "tags": {"alt_name": "Old City", "boundary": "administrative"}},
            {"type": "node", "tags": {"name": "No Center", "place": "suburb"}},
            {"type": "node", "lat": 1.0, "lon": 1.0, "tags": {"place": "suburb"}}
        ]});
        let localities = parse_localities(&body);
        let names: Vec<_> = localities.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Ameerpet", "Banjara Hills", "Old City"]);
        assert_eq!(localities[0].place_type, "ward_10");
        assert_eq!(localities[1].place_type, "suburb");
        assert_eq!(localities[2].place_type, "administrative");
        assert!((localities[0].center.lat - 17.45).abs() < 1e-9);
    }

    #[test]
    fn html_and_empty_bodies_fail_over() {
        assert!(parse_body("   ").is_err());
        assert!(parse_body("<?xml version=\"1.0\"?><osm/>").is_err());
        assert!(parse_body("<!DOCTYPE html><p>rate_limited</p>").is_err());
        assert!(parse_body("{\"elements\": []}").is_ok());
    }
}
