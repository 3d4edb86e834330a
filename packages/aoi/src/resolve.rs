//! Name-driven AOI construction on top of [`Geocoder`] and
//! [`BoundarySource`].

use landcover_models::Coordinates;

use crate::builder;
use crate::{AdminTier, AoiError, AreaOfInterest, BoundarySource, Geocoder, LocationQuery};

/// Resolves a location to a point, geocoding names.
///
/// # Errors
///
/// * [`AoiError::NotFound`] if the geocoder knows no such place
/// * [`AoiError::Lookup`] if the geocoder fails
pub async fn resolve_center(
    query: &LocationQuery,
    geocoder: &dyn Geocoder,
) -> Result<Coordinates, AoiError> {
    match query {
        LocationQuery::Coordinates(c) => Ok(*c),
        LocationQuery::Name(name) => {
            geocoder
                .geocode(name)
                .await?
                .ok_or_else(|| AoiError::NotFound {
                    query: name.clone(),
                })
        }
    }
}

/// Circular AOI of `radius_km` around a location.
///
/// # Errors
///
/// Propagates [`resolve_center`] and [`builder::buffered`] errors.
pub async fn buffered_aoi(
    location: &str,
    radius_km: f64,
    geocoder: &dyn Geocoder,
) -> Result<AreaOfInterest, AoiError> {
    let query = LocationQuery::parse(location);
    let center = resolve_center(&query, geocoder).await?;
    builder::buffered(query.display_name(), center, radius_km)
}

/// Whole-city AOI.
///
/// Prefers the city-tier administrative boundary; when none exists (or
/// the lookup fails) falls back to a fixed square around the geocoded
/// center. Explicit coordinates always take the square.
///
/// # Errors
///
/// * [`AoiError::NotFound`] if neither a boundary nor a center exists
/// * [`AoiError::Validation`] if the boundary cannot be repaired
pub async fn boundary_aoi(
    location: &str,
    geocoder: &dyn Geocoder,
    boundaries: &dyn BoundarySource,
) -> Result<AreaOfInterest, AoiError> {
    let query = LocationQuery::parse(location);

    if let LocationQuery::Name(name) = &query {
        match boundaries.boundary(name, AdminTier::City).await {
            Ok(Some(found)) => {
                log::debug!(
                    "Using {} boundary for {name} (admin_level={:?})",
                    found.name,
                    found.admin_level
                );
                return builder::boundary(name.clone(), &found.geometry, found.center);
            }
            Ok(None) => log::info!("No city boundary for {name}, using fallback square"),
            Err(e) => log::warn!("Boundary lookup for {name} failed: {e}"),
        }
    }

    let center = resolve_center(&query, geocoder).await?;
    builder::boundary_fallback(query.display_name(), center)
}

/// Fixed 1 km locality AOI.
///
/// Looks up the locality-tier boundary of `"{locality}, {city}"` and
/// squares it on its centroid. Without a boundary the 800 m fallback
/// square is used around `known_center`, or around the geocoded
/// locality when no center is known.
///
/// # Errors
///
/// * [`AoiError::SizeExceeded`] if the raw boundary is wider than 1.2 km
/// * [`AoiError::NotFound`] if the locality has neither a boundary nor
///   a center
pub async fn locality_aoi(
    city: &str,
    locality: &str,
    known_center: Option<Coordinates>,
    geocoder: &dyn Geocoder,
    boundaries: &dyn BoundarySource,
) -> Result<AreaOfInterest, AoiError> {
    let query = format!("{locality}, {city}");

    match boundaries.boundary(&query, AdminTier::Locality).await {
        Ok(Some(found)) => return builder::fixed(locality, &found.geometry),
        Ok(None) => log::info!("No boundary for {query}, using fallback square"),
        Err(e) => log::warn!("Boundary lookup for {query} failed: {e}"),
    }

    let center = match known_center {
        Some(center) => center,
        None => resolve_center(&LocationQuery::Name(query), geocoder).await?,
    };
    builder::fallback(locality, center)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use geo::MultiPolygon;
    use landcover_models::AoiMode;

    use super::*;
    use crate::Boundary;
    use crate::geometry::square;

    struct FakeGeocoder(BTreeMap<String, Coordinates>);

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, AoiError> {
            Ok(self.0.get(query).copied())
        }
    }

    struct FakeBoundaries(BTreeMap<String, MultiPolygon<f64>>);

    #[async_trait]
    impl BoundarySource for FakeBoundaries {
        async fn boundary(
            &self,
            query: &str,
            _tier: AdminTier,
        ) -> Result<Option<Boundary>, AoiError> {
            Ok(self.0.get(query).map(|geometry| Boundary {
                name: query.to_string(),
                geometry: geometry.clone(),
                center: None,
                admin_level: Some(8),
            }))
        }
    }

    struct FailingBoundaries;

    #[async_trait]
    impl BoundarySource for FailingBoundaries {
        async fn boundary(
            &self,
            _query: &str,
            _tier: AdminTier,
        ) -> Result<Option<Boundary>, AoiError> {
            Err(AoiError::Lookup {
                message: "503".to_string(),
            })
        }
    }

    fn jaipur() -> Coordinates {
        Coordinates::new(26.9124, 75.7873)
    }

    fn geocoder() -> FakeGeocoder {
        let mut known = BTreeMap::new();
        known.insert("Jaipur".to_string(), jaipur());
        known.insert("Malviya Nagar, Jaipur".to_string(), jaipur());
        FakeGeocoder(known)
    }

    #[tokio::test]
    async fn coordinates_skip_the_geocoder() {
        let aoi = buffered_aoi("26.9,75.8", 1.0, &FakeGeocoder(BTreeMap::new()))
            .await
            .unwrap();
        assert!((aoi.center.lat - 26.9).abs() < 1e-12);
        assert_eq!(aoi.name, "26.9000, 75.8000");
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let err = buffered_aoi("Atlantis", 1.0, &geocoder()).await.unwrap_err();
        assert!(matches!(err, AoiError::NotFound { query } if query == "Atlantis"));
    }

    #[tokio::test]
    async fn boundary_prefers_the_polygon() {
        let mut polygons = BTreeMap::new();
        polygons.insert(
            "Jaipur".to_string(),
            MultiPolygon::new(vec![square(jaipur(), 6.0)]),
        );
        let aoi = boundary_aoi("Jaipur", &geocoder(), &FakeBoundaries(polygons))
            .await
            .unwrap();
        assert_eq!(aoi.mode, AoiMode::Boundary);
        assert!(aoi.area_km2 > 35.9 && aoi.area_km2 < 36.2);
    }

    #[tokio::test]
    async fn boundary_failure_falls_back_to_square() {
        let aoi = boundary_aoi("Jaipur", &geocoder(), &FailingBoundaries)
            .await
            .unwrap();
        assert_eq!(aoi.mode, AoiMode::Boundary);
        assert!((aoi.bbox.height_km() - 0.18 * 111.0).abs() < 0.005);
    }

    #[tokio::test]
    async fn locality_without_boundary_uses_fallback() {
        let aoi = locality_aoi(
            "Jaipur",
            "Malviya Nagar",
            None,
            &geocoder(),
            &FakeBoundaries(BTreeMap::new()),
        )
        .await
        .unwrap();
        assert_eq!(aoi.mode, AoiMode::Fallback);
        assert!((aoi.area_km2 - 0.64).abs() < 0.005);
    }

    #[tokio::test]
    async fn locality_with_tight_boundary_is_fixed() {
        let mut polygons = BTreeMap::new();
        polygons.insert(
            "Malviya Nagar, Jaipur".to_string(),
            MultiPolygon::new(vec![square(jaipur(), 0.7)]),
        );
        let aoi = locality_aoi(
            "Jaipur",
            "Malviya Nagar",
            None,
            &geocoder(),
            &FakeBoundaries(polygons),
        )
        .await
        .unwrap();
        assert_eq!(aoi.mode, AoiMode::Fixed);
        assert!((aoi.area_km2 - 1.0).abs() < 0.005);
    }

    #[tokio::test]
    async fn unknown_locality_is_not_found() {
        let err = locality_aoi(
            "Jaipur",
            "Nowhere",
            None,
            &geocoder(),
            &FakeBoundaries(BTreeMap::new()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AoiError::NotFound { .. }));
    }
}
