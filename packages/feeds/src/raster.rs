//! JSON adapter for a remote raster histogram service.
//!
//! The service owns compositing, band math and reduction:
//!
//! - `POST {base}/images` with the request, answering `{id, acquired}`
//! - `POST {base}/histograms` with an image id and a geometry, answering
//!   `{bins: {label: value}}`

use async_trait::async_trait;
use chrono::NaiveDate;
use geo::MultiPolygon;
use landcover_aoi::geometry;
use landcover_models::imagery::ImageSource;
use landcover_models::{HistogramMeasure, PixelHistogram};
use landcover_raster::{ImageProduct, ImageRequest, RasterError, RasterImage, RasterService};
use serde::Serialize;
use serde_json::Value;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{ProviderConfig, ServiceConfig};
use crate::{FeedError, str_at};

pub struct HttpRasterService {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload<'a> {
    geometry: geojson::Geometry,
    source: ImageSource,
    start: NaiveDate,
    end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_cloud_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expression: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistogramPayload<'a> {
    image: &'a str,
    geometry: geojson::Geometry,
    resolution_m: f64,
    measure: HistogramMeasure,
}

impl HttpRasterService {
    /// Builds a client whose base URL is read from the variable named in
    /// the registry (`RASTER_SERVICE_URL`).
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the service is not configured or the URL
    /// variable is unset.
    pub fn from_env() -> Result<Self, FeedError> {
        let service = crate::registered("raster")?;
        let ProviderConfig::Raster { base_url_env } = &service.provider else {
            return Err(FeedError::NotConfigured { id: service.id });
        };
        let base_url = crate::api_key(base_url_env)?;
        Self::new(&service, &base_url)
    }

    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the client cannot be built.
    pub fn new(service: &ServiceConfig, base_url: &str) -> Result<Self, FeedError> {
        Ok(Self {
            client: crate::http_client(service)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, payload: &T) -> Result<Value, FeedError> {
        let url = format!("{}/{path}", self.base_url);
        retry::send_json(RetryPolicy::PATIENT, || self.client.post(&url).json(payload)).await
    }
}

fn image_payload(request: &ImageRequest) -> ImagePayload<'_> {
    ImagePayload {
        geometry: geometry::to_geojson(&request.geometry),
        source: request.source,
        start: request.dates.start,
        end: request.dates.end,
        max_cloud_pct: request.max_cloud_pct,
        expression: match &request.product {
            ImageProduct::Labels => None,
            ImageProduct::SpectralClasses { expression } => Some(expression.as_str()),
        },
    }
}

#[async_trait]
impl RasterService for HttpRasterService {
    async fn fetch_image(&self, request: &ImageRequest) -> Result<RasterImage, RasterError> {
        let no_imagery = || RasterError::NoImagery {
            image_source: request.source,
            start: request.dates.start,
            end: request.dates.end,
        };
        match self.post("images", &image_payload(request)).await {
            Ok(body) => parse_image(&body, request.source)?.ok_or_else(no_imagery),
            Err(FeedError::Status { status: 404, .. }) => Err(no_imagery()),
            Err(e) => Err(e.into()),
        }
    }

    async fn histogram_over(
        &self,
        image: &RasterImage,
        geometry: &MultiPolygon<f64>,
        resolution_m: f64,
        measure: HistogramMeasure,
    ) -> Result<PixelHistogram, RasterError> {
        let payload = HistogramPayload {
            image: &image.id,
            geometry: geometry::to_geojson(geometry),
            resolution_m,
            measure,
        };
        let body = self.post("histograms", &payload).await?;
        Ok(parse_histogram(&body, measure)?)
    }
}

/// Reads `{id, acquired}`; a null or missing id means no scene matched.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] if `acquired` is not a `YYYY-MM-DD` date.
pub fn parse_image(body: &Value, source: ImageSource) -> Result<Option<RasterImage>, FeedError> {
    let Some(id) = str_at(body, "/id").filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let acquired = str_at(body, "/acquired")
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| FeedError::parse(format!("bad acquisition date {date:?}: {e}")))
        })
        .transpose()?;

    Ok(Some(RasterImage {
        id: id.to_string(),
        source,
        acquired,
    }))
}

/// Reads `{bins: {label: value}}`. A missing or empty map is an empty
/// histogram, which the aggregation ladder escalates on.
///
/// # Errors
///
/// Returns [`FeedError::Parse`] for a non-integer label or non-numeric
/// value.
pub fn parse_histogram(
    body: &Value,
    measure: HistogramMeasure,
) -> Result<PixelHistogram, FeedError> {
    let Some(bins) = body.get("bins").and_then(Value::as_object) else {
        return Ok(PixelHistogram::new(measure));
    };

    let parsed = bins
        .iter()
        .map(|(label, value)| {
            let label = label
                .trim()
                .parse::<i32>()
                .map_err(|_| {
                    FeedError::parse(format!("histogram label {label:?} is not an integer"))
                })?;
            let value = value
                .as_f64()
                .ok_or_else(|| {
                    FeedError::parse(format!("histogram value for {label} is not a number"))
                })?;
            Ok((label, value))
        })
        .collect::<Result<Vec<_>, FeedError>>()?;

    Ok(PixelHistogram::from_bins(measure, parsed))
}
