//! Planar geometry helpers.
//!
//! Distances and tolerances are expressed in meters by projecting into a
//! local equirectangular frame centered on the geometry
//! (`x = Δlon · 111 km · cos(lat₀)`, `y = Δlat · 111 km`). Over the few
//! tens of kilometers an analysis covers this matches the
//! degree-to-kilometer approximation used everywhere else.

use geo::orient::{Direction, Orient};
use geo::{
    Area, BooleanOps, BoundingRect, Buffer, Coord, CoordsIter, Distance, Haversine, LineString,
    MapCoords, MultiPolygon, Point, Polygon, Rect, RemoveRepeatedPoints, Simplify,
};
use geojson::GeoJson;
use landcover_models::{BoundingBox, Coordinates, KM_PER_DEGREE, km_per_degree_lon};

use crate::{AoiError, MAX_VERTICES, REPAIR_BUFFER_M, SIMPLIFY_TOLERANCE_M};

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = KM_PER_DEGREE * 1_000.0;

/// Equirectangular projection around a fixed origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    origin: Coordinates,
    meters_per_degree_lon: f64,
}

impl LocalFrame {
    /// Frame centered on `origin`.
    #[must_use]
    pub fn new(origin: Coordinates) -> Self {
        Self {
            origin,
            meters_per_degree_lon: km_per_degree_lon(origin.lat) * 1_000.0,
        }
    }

    /// Frame centered on the bounding box of `geometry`, or `None` for an
    /// empty geometry.
    #[must_use]
    pub fn for_geometry(geometry: &MultiPolygon<f64>) -> Option<Self> {
        bounding_box(geometry).map(|bbox| Self::new(bbox.center()))
    }

    /// Degrees to local meters.
    #[must_use]
    pub fn to_metric(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        let (lat0, lon0, kx) = (self.origin.lat, self.origin.lon, self.meters_per_degree_lon);
        geometry.map_coords(move |c| Coord {
            x: (c.x - lon0) * kx,
            y: (c.y - lat0) * METERS_PER_DEGREE,
        })
    }

    /// Local meters back to degrees.
    #[must_use]
    pub fn to_degrees(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        let (lat0, lon0, kx) = (self.origin.lat, self.origin.lon, self.meters_per_degree_lon);
        geometry.map_coords(move |c| Coord {
            x: lon0 + c.x / kx,
            y: lat0 + c.y / METERS_PER_DEGREE,
        })
    }
}

/// Bounds of `geometry`, or `None` when it has no coordinates.
#[must_use]
pub fn bounding_box(geometry: &MultiPolygon<f64>) -> Option<BoundingBox> {
    geometry
        .bounding_rect()
        .map(|rect| BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
}

/// Planar area of `geometry` in square meters.
#[must_use]
pub fn area_m2(geometry: &MultiPolygon<f64>) -> f64 {
    LocalFrame::for_geometry(geometry)
        .map_or(0.0, |frame| frame.to_metric(geometry).unsigned_area())
}

/// Total number of coordinates across every ring.
#[must_use]
pub fn vertex_count(geometry: &MultiPolygon<f64>) -> usize {
    geometry.coords_count()
}

/// Great-circle distance between two points.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    Haversine.distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat)) / 1_000.0
}

/// Axis-aligned square of side `side_km`, centered on `center`.
#[must_use]
pub fn square(center: Coordinates, side_km: f64) -> Polygon<f64> {
    let bbox = BoundingBox::around(center, side_km / 2.0);
    rect_polygon(&bbox)
}

/// Polygon covering `bbox`.
#[must_use]
pub fn rect_polygon(bbox: &BoundingBox) -> Polygon<f64> {
    Rect::new(
        Coord {
            x: bbox.min_lon,
            y: bbox.min_lat,
        },
        Coord {
            x: bbox.max_lon,
            y: bbox.max_lat,
        },
    )
    .to_polygon()
}

/// Circle of `radius_km` around `center`, round on the ground.
#[must_use]
pub fn circle(center: Coordinates, radius_km: f64, segments: usize) -> Polygon<f64> {
    let n = segments.max(8);
    let r = radius_km * 1_000.0;
    #[allow(clippy::cast_precision_loss)]
    let ring: Vec<Coord<f64>> = (0..=n)
        .map(|i| {
            let angle = std::f64::consts::TAU * (i % n) as f64 / n as f64;
            Coord {
                x: r * angle.cos(),
                y: r * angle.sin(),
            }
        })
        .collect();
    let metric = MultiPolygon::new(vec![Polygon::new(LineString::from(ring), vec![])]);
    LocalFrame::new(center)
        .to_degrees(&metric)
        .0
        .into_iter()
        .next()
        .unwrap_or_else(|| Polygon::new(LineString::new(vec![]), vec![]))
}

/// Grows `geometry` outward by `meters`.
#[must_use]
pub fn expand(geometry: &MultiPolygon<f64>, meters: f64) -> MultiPolygon<f64> {
    let Some(frame) = LocalFrame::for_geometry(geometry) else {
        return geometry.clone();
    };
    frame.to_degrees(&frame.to_metric(geometry).buffer(meters))
}

/// Topology repair for raw boundary shapes.
///
/// Simplifies with [`SIMPLIFY_TOLERANCE_M`] (rings keep at least a
/// closed triangle), buffers outward by
/// [`REPAIR_BUFFER_M`] to close self-intersections and slivers, then
/// [`canonicalize`]s.
///
/// # Errors
///
/// Returns [`AoiError::Validation`] for empty or zero-area input, or
/// when the repaired geometry still has more than [`MAX_VERTICES`].
pub fn repair(geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, AoiError> {
    let frame = LocalFrame::for_geometry(geometry)
        .ok_or_else(|| AoiError::validation("geometry has no coordinates"))?;
    let metric = frame.to_metric(geometry);
    let simplified = metric.simplify(SIMPLIFY_TOLERANCE_M);
    let buffered = simplified.buffer(REPAIR_BUFFER_M);
    canonicalize(&frame.to_degrees(&buffered))
}

/// Brings a geometry into canonical WGS84 form.
///
/// Drops repeated points and degenerate rings, orients exteriors
/// counter-clockwise and holes clockwise, and enforces the vertex limit.
///
/// # Errors
///
/// Returns [`AoiError::Validation`] when nothing with positive area is
/// left, or when the geometry has more than [`MAX_VERTICES`].
pub fn canonicalize(geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, AoiError> {
    let cleaned = geometry.remove_repeated_points();
    let polygons: Vec<Polygon<f64>> = cleaned
        .0
        .into_iter()
        .filter(|polygon| polygon.exterior().0.len() >= 4 && polygon.unsigned_area() > 0.0)
        .collect();
    if polygons.is_empty() {
        return Err(AoiError::validation("geometry has zero area"));
    }

    let oriented = MultiPolygon::new(polygons).orient(Direction::Default);
    let vertices = vertex_count(&oriented);
    if vertices > MAX_VERTICES {
        return Err(AoiError::validation(format!(
            "geometry has {vertices} vertices after repair, limit is {MAX_VERTICES}"
        )));
    }
    Ok(oriented)
}

/// One cell of a tiling grid, already intersected with the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub row: usize,
    pub col: usize,
    pub geometry: MultiPolygon<f64>,
    pub area_m2: f64,
}

/// Result of partitioning a geometry into tiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileGrid {
    /// Cells whose intersection with the geometry is large enough to query.
    pub tiles: Vec<Tile>,
    /// Cells in the grid, including skipped ones.
    pub cells: usize,
    /// Cells skipped because the intersection was negligible.
    pub skipped: usize,
}

/// Partitions the bounding box of `geometry` into cells of roughly
/// `tile_km` on a side and intersects each cell with the geometry.
///
/// Cell width in degrees of longitude comes from the bounding box's
/// average latitude. Intersections smaller than `min_area_m2` are
/// skipped.
#[must_use]
pub fn tile_grid(geometry: &MultiPolygon<f64>, tile_km: f64, min_area_m2: f64) -> TileGrid {
    let Some(bbox) = bounding_box(geometry) else {
        return TileGrid::default();
    };
    let step_lat = tile_km / KM_PER_DEGREE;
    let step_lon = tile_km / km_per_degree_lon(bbox.avg_lat());

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rows = (((bbox.max_lat - bbox.min_lat) / step_lat).ceil() as usize).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cols = (((bbox.max_lon - bbox.min_lon) / step_lon).ceil() as usize).max(1);

    let mut grid = TileGrid {
        cells: rows * cols,
        ..TileGrid::default()
    };

    for row in 0..rows {
        for col in 0..cols {
            #[allow(clippy::cast_precision_loss)]
            let (r, c) = (row as f64, col as f64);
            let cell = BoundingBox::new(
                bbox.min_lon + c * step_lon,
                bbox.min_lat + r * step_lat,
                (bbox.min_lon + (c + 1.0) * step_lon).min(bbox.max_lon),
                (bbox.min_lat + (r + 1.0) * step_lat).min(bbox.max_lat),
            );
            let clipped = geometry.intersection(&rect_polygon(&cell));
            let area = area_m2(&clipped);
            if area < min_area_m2 {
                grid.skipped += 1;
                continue;
            }
            grid.tiles.push(Tile {
                row,
                col,
                geometry: clipped,
                area_m2: area,
            });
        }
    }

    grid
}

/// Converts a geometry to a `GeoJSON` geometry object.
#[must_use]
pub fn to_geojson(geometry: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

/// Parses `GeoJSON` text into a multipolygon.
///
/// Accepts a bare geometry, a feature, or a feature collection whose
/// polygonal features are combined.
///
/// # Errors
///
/// Returns [`AoiError::GeoJson`] for malformed input and
/// [`AoiError::Validation`] when no polygon is present.
pub fn parse_geojson(input: &str) -> Result<MultiPolygon<f64>, AoiError> {
    let parsed: GeoJson = input.parse()?;
    let geometries: Vec<geojson::Geometry> = match parsed {
        GeoJson::Geometry(geometry) => vec![geometry],
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        match geo::Geometry::<f64>::try_from(geometry)? {
            geo::Geometry::Polygon(polygon) => polygons.push(polygon),
            geo::Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
            _ => {}
        }
    }

    if polygons.is_empty() {
        return Err(AoiError::validation(
            "GeoJSON must contain a Polygon or MultiPolygon",
        ));
    }
    Ok(MultiPolygon::new(polygons))
}
