//! Synchronous AOI constructors for each [`AoiMode`].

use geo::{Centroid, MultiPolygon};
use landcover_models::{AoiMode, BoundingBox, Coordinates};

use crate::geometry::{area_m2, bounding_box, circle, parse_geojson, rect_polygon, repair, square};
use crate::{
    AoiError, AreaOfInterest, BOUNDARY_FALLBACK_HALF_DEGREES, BUFFER_AREA_CAP_KM2,
    FALLBACK_SIDE_KM, FIXED_RAW_DIMENSION_CAP_KM, FIXED_SIDE_KM,
};

/// Vertices used to approximate a buffer circle.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Repairs `raw` and derives the AOI's bounds and area from the result.
/// Every constructor ends here, generated shapes included.
fn finish(
    name: impl Into<String>,
    mode: AoiMode,
    raw: &MultiPolygon<f64>,
    center: Option<Coordinates>,
) -> Result<AreaOfInterest, AoiError> {
    let geometry = repair(raw)?;
    let center = center.or_else(|| centroid_of(&geometry));
    let bbox = bounding_box(&geometry)
        .ok_or_else(|| AoiError::validation("geometry has no coordinates"))?;
    let area_km2 = area_m2(&geometry) / 1_000_000.0;
    if area_km2 <= 0.0 {
        return Err(AoiError::validation("geometry has zero area"));
    }
    Ok(AreaOfInterest {
        name: name.into(),
        mode,
        center: center.unwrap_or_else(|| bbox.center()),
        geometry,
        bbox,
        area_km2,
    })
}

fn centroid_of(geometry: &MultiPolygon<f64>) -> Option<Coordinates> {
    geometry
        .centroid()
        .map(|point| Coordinates::new(point.y(), point.x()))
}

/// Circular buffer of `radius_km` around `center`.
///
/// # Errors
///
/// * [`AoiError::Validation`] if `radius_km` is not a positive number
/// * [`AoiError::SizeExceeded`] if the circle covers more than
///   [`BUFFER_AREA_CAP_KM2`], measured before repair
pub fn buffered(
    name: impl Into<String>,
    center: Coordinates,
    radius_km: f64,
) -> Result<AreaOfInterest, AoiError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AoiError::validation(format!(
            "buffer radius must be a positive number of kilometers, got {radius_km}"
        )));
    }

    let raw = MultiPolygon::new(vec![circle(center, radius_km, CIRCLE_SEGMENTS)]);
    let requested = area_m2(&raw) / 1_000_000.0;
    if requested > BUFFER_AREA_CAP_KM2 {
        return Err(AoiError::SizeExceeded {
            mode: AoiMode::Buffered,
            cap: BUFFER_AREA_CAP_KM2,
            requested,
            unit: "km²",
        });
    }
    finish(name, AoiMode::Buffered, &raw, Some(center))
}

/// Fixed 1 km × 1 km square on the centroid of a raw locality boundary.
///
/// Only the centroid of `raw` is used. A raw boundary whose larger
/// dimension exceeds [`FIXED_RAW_DIMENSION_CAP_KM`] is rejected rather
/// than truncated.
///
/// # Errors
///
/// * [`AoiError::Validation`] if `raw` is empty
/// * [`AoiError::SizeExceeded`] if `raw` is too wide
pub fn fixed(name: impl Into<String>, raw: &MultiPolygon<f64>) -> Result<AreaOfInterest, AoiError> {
    let bbox = bounding_box(raw)
        .ok_or_else(|| AoiError::validation("locality boundary has no coordinates"))?;
    let dimension = bbox.max_dimension_km();
    if dimension > FIXED_RAW_DIMENSION_CAP_KM {
        return Err(AoiError::SizeExceeded {
            mode: AoiMode::Fixed,
            cap: FIXED_RAW_DIMENSION_CAP_KM,
            requested: dimension,
            unit: "km",
        });
    }

    let center = centroid_of(raw).unwrap_or_else(|| bbox.center());
    let geometry = MultiPolygon::new(vec![square(center, FIXED_SIDE_KM)]);
    finish(name, AoiMode::Fixed, &geometry, Some(center))
}

/// 800 m × 800 m square around the best-known center of a locality that
/// has no boundary.
///
/// # Errors
///
/// Returns [`AoiError::Validation`] for a non-finite center.
pub fn fallback(name: impl Into<String>, center: Coordinates) -> Result<AreaOfInterest, AoiError> {
    if !center.lat.is_finite() || !center.lon.is_finite() {
        return Err(AoiError::validation("fallback center is not a finite coordinate"));
    }
    let geometry = MultiPolygon::new(vec![square(center, FALLBACK_SIDE_KM)]);
    finish(name, AoiMode::Fallback, &geometry, Some(center))
}

/// Whole-city AOI from an administrative boundary, topology-repaired.
///
/// # Errors
///
/// Returns [`AoiError::Validation`] if the boundary is empty or cannot be
/// repaired within the vertex limit.
pub fn boundary(
    name: impl Into<String>,
    raw: &MultiPolygon<f64>,
    center: Option<Coordinates>,
) -> Result<AreaOfInterest, AoiError> {
    finish(name, AoiMode::Boundary, raw, center)
}

/// Whole-city AOI when no boundary exists: a square of
/// ±[`BOUNDARY_FALLBACK_HALF_DEGREES`] around the geocoded center.
///
/// # Errors
///
/// Returns [`AoiError::Validation`] for a non-finite center.
pub fn boundary_fallback(
    name: impl Into<String>,
    center: Coordinates,
) -> Result<AreaOfInterest, AoiError> {
    let half = BOUNDARY_FALLBACK_HALF_DEGREES;
    let bbox = BoundingBox::new(
        center.lon - half,
        center.lat - half,
        center.lon + half,
        center.lat + half,
    );
    let geometry = MultiPolygon::new(vec![rect_polygon(&bbox)]);
    finish(name, AoiMode::Boundary, &geometry, Some(center))
}

/// AOI from caller-supplied `GeoJSON`, topology-repaired.
///
/// # Errors
///
/// Returns [`AoiError::GeoJson`] for malformed input and
/// [`AoiError::Validation`] when it holds no usable polygon.
pub fn custom(name: impl Into<String>, geojson: &str) -> Result<AreaOfInterest, AoiError> {
    let raw = parse_geojson(geojson)?;
    finish(name, AoiMode::Custom, &raw, None)
}
