#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area-of-interest construction.
//!
//! Turns a location string, explicit coordinates or a caller-supplied
//! polygon into a clean, size-bounded [`AreaOfInterest`]:
//!
//! - **Buffered**: circular buffer around a point, capped at
//!   [`BUFFER_AREA_CAP_KM2`].
//! - **Fixed**: 1 km × 1 km square on a locality centroid. Raw
//!   boundaries wider than [`FIXED_RAW_DIMENSION_CAP_KM`] are rejected.
//! - **Fallback**: 800 m square when a locality has no boundary.
//! - **Boundary**: administrative polygon of a whole city.
//! - **Custom**: caller `GeoJSON`.
//!
//! Every mode's geometry passes through [`geometry::repair`] before it is
//! returned.
//!
//! Name resolution is delegated to the [`Geocoder`], [`BoundarySource`]
//! and [`LocalitySource`] traits, implemented by HTTP clients elsewhere.

pub mod builder;
pub mod coords;
pub mod geometry;
pub mod resolve;

use async_trait::async_trait;
use geo::MultiPolygon;
use landcover_models::readings::Locality;
use landcover_models::{AoiMode, BoundingBox, Coordinates};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use coords::LocationQuery;

/// Largest area a buffered AOI may cover.
pub const BUFFER_AREA_CAP_KM2: f64 = 50.0;

/// Side of the fixed locality square.
pub const FIXED_SIDE_KM: f64 = 1.0;

/// Raw locality boundaries wider than this are not tight single-locality
/// shapes and are rejected.
pub const FIXED_RAW_DIMENSION_CAP_KM: f64 = 1.2;

/// Side of the square used when a locality has no boundary.
pub const FALLBACK_SIDE_KM: f64 = 0.8;

/// Half-width in degrees of the square used when a city has no boundary.
pub const BOUNDARY_FALLBACK_HALF_DEGREES: f64 = 0.09;

/// Douglas-Peucker tolerance applied during topology repair.
pub const SIMPLIFY_TOLERANCE_M: f64 = 200.0;

/// Outward buffer applied during topology repair.
pub const REPAIR_BUFFER_M: f64 = 1.0;

/// Most vertices a geometry may carry after repair.
pub const MAX_VERTICES: usize = 5_000;

/// Errors from building an area of interest.
#[derive(Debug, Error)]
pub enum AoiError {
    /// The input geometry or parameters are unusable.
    #[error("Invalid area of interest: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The AOI is larger than its mode allows.
    #[error(
        "{mode} area of interest exceeds its size cap: requested {requested:.3} {unit}, cap {cap} {unit}"
    )]
    SizeExceeded {
        /// Mode whose cap was exceeded.
        mode: AoiMode,
        /// The cap.
        cap: f64,
        /// The size that was requested.
        requested: f64,
        /// Unit of `cap` and `requested`.
        unit: &'static str,
    },

    /// A location name could not be resolved.
    #[error("Location not found: {query}")]
    NotFound {
        /// The name that was looked up.
        query: String,
    },

    /// `GeoJSON` input could not be parsed.
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A geocoder or boundary lookup failed upstream.
    #[error("Location lookup failed: {message}")]
    Lookup {
        /// Description of the upstream failure.
        message: String,
    },
}

impl AoiError {
    /// Whether this error stems from caller input rather than upstream
    /// lookups.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::SizeExceeded { .. } | Self::GeoJson(_)
        )
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// A clean analysis geometry plus the values derived from it.
///
/// Built per request and dropped when the analysis returns.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    /// Display name of the location.
    pub name: String,
    /// How the geometry was produced.
    pub mode: AoiMode,
    /// Canonical WGS84 geometry.
    pub geometry: MultiPolygon<f64>,
    /// Bounds of `geometry`.
    pub bbox: BoundingBox,
    /// Analysis center.
    pub center: Coordinates,
    /// Planar area of `geometry`.
    pub area_km2: f64,
}

impl AreaOfInterest {
    /// Area in square meters.
    #[must_use]
    pub fn area_m2(&self) -> f64 {
        self.area_km2 * 1_000_000.0
    }

    /// The geometry as a `GeoJSON` geometry object.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Geometry {
        geometry::to_geojson(&self.geometry)
    }
}

/// Administrative tier a boundary lookup should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AdminTier {
    /// Whole-city boundary, ideally OSM `admin_level=8`.
    City,
    /// Suburb, neighbourhood or ward.
    Locality,
}

/// A boundary returned by a [`BoundarySource`].
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    /// Display name reported by the source.
    pub name: String,
    /// Raw WGS84 geometry.
    pub geometry: MultiPolygon<f64>,
    /// Center reported by the source, when it gives one.
    pub center: Option<Coordinates>,
    /// OSM admin level, when known.
    pub admin_level: Option<u8>,
}

/// Resolves a location name to a point.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Looks up `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AoiError::Lookup`] if the upstream service fails.
    /// A name that simply does not exist yields `Ok(None)`.
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, AoiError>;
}

/// Resolves a location name to an administrative polygon.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Looks up the boundary of `query`, preferring `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`AoiError::Lookup`] if the upstream service fails.
    async fn boundary(&self, query: &str, tier: AdminTier)
    -> Result<Option<Boundary>, AoiError>;
}

/// Lists named sub-city places around a point.
#[async_trait]
pub trait LocalitySource: Send + Sync {
    /// Localities within `radius_km` of `center`.
    ///
    /// # Errors
    ///
    /// Returns [`AoiError::Lookup`] if every upstream mirror fails.
    async fn localities(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Locality>, AoiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_exceeded_names_cap_and_request() {
        let err = AoiError::SizeExceeded {
            mode: AoiMode::Buffered,
            cap: BUFFER_AREA_CAP_KM2,
            requested: 78.54,
            unit: "km²",
        };
        let message = err.to_string();
        assert!(message.contains("buffered"));
        assert!(message.contains("78.540 km²"));
        assert!(message.contains("cap 50 km²"));
        assert!(err.is_validation());
    }

    #[test]
    fn not_found_is_not_validation() {
        let err = AoiError::NotFound {
            query: "Atlantis".to_string(),
        };
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Location not found: Atlantis");
    }

    struct FixedLocalities;

    #[async_trait]
    impl LocalitySource for FixedLocalities {
        async fn localities(
            &self,
            center: Coordinates,
            _radius_km: f64,
        ) -> Result<Vec<Locality>, AoiError> {
            Ok(vec![Locality {
                name: "Koramangala".to_string(),
                center,
                place_type: "suburb".to_string(),
            }])
        }
    }

    #[tokio::test]
    async fn locality_source_returns_model_localities() {
        let source: &dyn LocalitySource = &FixedLocalities;
        let center = Coordinates::new(12.9352, 77.6245);
        let found = source.localities(center, 5.0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Koramangala");
        assert_eq!(found[0].place_type, "suburb");
        assert!((found[0].center.lat - 12.9352).abs() < 1e-9);
    }
}
