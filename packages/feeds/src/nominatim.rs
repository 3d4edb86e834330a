//! Nominatim / `OpenStreetMap` geocoding and boundary lookup.
//!
//! The public instance allows **1 request per second** and requires a
//! `User-Agent`, both configured in `services/nominatim.toml`.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;
use landcover_aoi::{AdminTier, AoiError, Boundary, BoundarySource, Geocoder, geometry};
use landcover_models::Coordinates;
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{FeedError, str_at};

/// Admin levels that are states or districts, never a city.
const REJECTED_ADMIN_LEVELS: [u8; 2] = [4, 6];

/// OSM admin level of a municipality.
pub const CITY_ADMIN_LEVEL: u8 = 8;

pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    candidate_limit: String,
}

impl NominatimClient {
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_service(&crate::registered("nominatim")?)
    }

    /// # Errors
    ///
    /// Returns [`FeedError`] if `service` is not a Nominatim entry.
    pub fn from_service(service: &ServiceConfig) -> Result<Self, FeedError> {
        let ProviderConfig::Nominatim {
            base_url,
            candidate_limit,
        } = &service.provider
        else {
            return Err(FeedError::NotConfigured {
                id: service.id.clone(),
            });
        };
        Ok(Self {
            client: crate::http_client(service)?,
            base_url: base_url.clone(),
            candidate_limit: candidate_limit.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, AoiError> {
        let body = retry::send_json(RetryPolicy::PATIENT, || {
            self.client
                .get(&self.base_url)
                .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
        })
        .await?;
        Ok(parse_geocode(&body))
    }
}

#[async_trait]
impl BoundarySource for NominatimClient {
    async fn boundary(&self, query: &str, tier: AdminTier) -> Result<Option<Boundary>, AoiError> {
        let body = retry::send_json(RetryPolicy::PATIENT, || {
            self.client.get(&self.base_url).query(&[
                ("q", query),
                ("format", "geojson"),
                ("limit", self.candidate_limit.as_str()),
                ("polygon_geojson", "1"),
                ("addressdetails", "1"),
                ("extratags", "1"),
                ("namedetails", "1"),
            ])
        })
        .await?;
        let boundary = select_boundary(&body, tier);
        if boundary.is_none() {
            log::debug!("No {tier} boundary for {query:?}");
        }
        Ok(boundary)
    }
}

/// First result of a `jsonv2` search. Nominatim sends coordinates as
/// strings.
#[must_use]
pub fn parse_geocode(body: &Value) -> Option<Coordinates> {
    let first = body.as_array()?.first()?;
    let coord = |key: &str| {
        first.get(key).and_then(|v| {
            v.as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .or_else(|| v.as_f64())
        })
    };
    Some(Coordinates::new(coord("lat")?, coord("lon")?))
}

struct Candidate {
    boundary: Boundary,
    place: String,
}

fn candidate(feature: &Value) -> Option<Candidate> {
    let properties = feature.get("properties")?;
    let admin_level = str_at(properties, "/extratags/admin_level").and_then(|l| l.parse().ok());
    let place = str_at(properties, "/extratags/place")
        .unwrap_or_default()
        .to_lowercase();
    let geometry = geometry::parse_geojson(&feature.get("geometry")?.to_string()).ok()?;
    let name = str_at(properties, "/name")
        .filter(|n| !n.is_empty())
        .or_else(|| str_at(properties, "/display_name"))?
        .to_string();

    Some(Candidate {
        boundary: Boundary {
            name,
            geometry,
            center: None,
            admin_level,
        },
        place,
    })
}

/// Picks the boundary for `tier` from a `geojson` search.
///
/// Levels 4 and 6 and `place=region` are never returned. The city tier
/// takes a level-8 polygon over any other candidate; the locality tier
/// takes the first acceptable polygon. Point results are skipped.
#[must_use]
pub fn select_boundary(body: &Value, tier: AdminTier) -> Option<Boundary> {
    let features = body.get("features")?.as_array()?;
    let acceptable: Vec<Candidate> = features
        .iter()
        .filter_map(candidate)
        .filter(|c| {
            c.place != "region"
                && !c
                    .boundary
                    .admin_level
                    .is_some_and(|level| REJECTED_ADMIN_LEVELS.contains(&level))
        })
        .collect();

    let chosen = match tier {
        AdminTier::City => {
            let mut acceptable = acceptable;
            let position = acceptable
                .iter()
                .position(|c| c.boundary.admin_level == Some(CITY_ADMIN_LEVEL))
                .unwrap_or(0);
            (!acceptable.is_empty()).then(|| acceptable.swap_remove(position))
        }
        AdminTier::Locality => acceptable.into_iter().next(),
    };
    chosen.map(|c| c.boundary)
}
