#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Land-cover reconciliation.
//!
//! Two deterministic schemes turn a [`PixelHistogram`] into the four
//! standard fractions:
//!
//! - [`dynamic_world`]: folds the nine Dynamic World labels into four,
//!   with the small-forest and fallow-field rules.
//! - [`spectral`]: four labels produced by NDVI/MNDWI thresholds, with
//!   urban as the catch-all.
//!
//! [`normalize`] holds the two bounded presentation adjustments applied
//! afterwards.

pub mod dynamic_world;
pub mod normalize;
pub mod spectral;

use landcover_models::imagery::ImageSource;
use landcover_models::{HistogramMeasure, LandCoverResult, PixelHistogram};
use serde::Serialize;
use thiserror::Error;

pub use dynamic_world::DynamicWorldBreakdown;
pub use spectral::{SpectralBreakdown, SpectralThresholds};

/// Errors from reconciliation.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The histogram holds no usable pixels.
    #[error("No usable pixels: {message}")]
    NoData {
        /// What was missing.
        message: String,
    },

    /// Percentages or labels broke a pipeline invariant. Indicates a bug
    /// upstream and must not be corrected silently.
    #[error("Classification invariant violated: {message}")]
    ClassificationInvariant {
        /// Which invariant failed.
        message: String,
    },

    /// Inputs to the area conversion are unusable, or the converted
    /// percentages do not add up.
    #[error("Classification validation failed: {message}")]
    Validation {
        /// What was wrong.
        message: String,
    },
}

/// Scheme-specific detail attached to a classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum ClassificationDetails {
    DynamicWorld(DynamicWorldBreakdown),
    Spectral(SpectralBreakdown),
}

/// Output of [`Classifier::classify`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedCover {
    /// Raw percentages, before any presentation floor.
    pub cover: LandCoverResult,
    pub details: ClassificationDetails,
    /// Advisory notes; never fatal.
    pub warnings: Vec<String>,
}

/// The two reconciliation schemes, chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classifier {
    /// Dynamic World labels at `resolution_m` meters per pixel.
    DynamicWorld {
        /// Pixel size, used to turn tree pixel counts into area.
        resolution_m: f64,
    },
    /// Spectral-index classes.
    Spectral {
        /// Index thresholds.
        thresholds: SpectralThresholds,
    },
}

impl Classifier {
    /// Dynamic World at 30 m.
    #[must_use]
    pub const fn dynamic_world() -> Self {
        Self::DynamicWorld { resolution_m: 30.0 }
    }

    /// Spectral classification with default thresholds.
    #[must_use]
    pub const fn spectral() -> Self {
        Self::Spectral {
            thresholds: SpectralThresholds::DEFAULT,
        }
    }

    /// Image source the scheme reads.
    #[must_use]
    pub const fn source(&self) -> ImageSource {
        match self {
            Self::DynamicWorld { .. } => ImageSource::DynamicWorld,
            Self::Spectral { .. } => ImageSource::Sentinel2,
        }
    }

    /// Histogram measure the scheme wants from the raster service.
    #[must_use]
    pub const fn measure(&self) -> HistogramMeasure {
        match self {
            Self::DynamicWorld { .. } => HistogramMeasure::Count,
            Self::Spectral { .. } => HistogramMeasure::Area,
        }
    }

    /// Reconciles `histogram` into four percentages.
    ///
    /// `aoi_area_m2` is the area of the analysis geometry; the spectral
    /// scheme divides by it, the Dynamic World scheme ignores it.
    ///
    /// # Errors
    ///
    /// * [`ClassifyError::NoData`] for an empty histogram
    /// * [`ClassifyError::ClassificationInvariant`] for unknown spectral
    ///   labels or a Dynamic World total outside tolerance
    /// * [`ClassifyError::Validation`] for a spectral total outside
    ///   tolerance or a non-positive AOI area
    pub fn classify(
        &self,
        histogram: &PixelHistogram,
        aoi_area_m2: f64,
    ) -> Result<ClassifiedCover, ClassifyError> {
        match self {
            Self::DynamicWorld { resolution_m } => {
                let (cover, breakdown) = dynamic_world::reconcile(histogram, *resolution_m)?;
                Ok(ClassifiedCover {
                    cover,
                    details: ClassificationDetails::DynamicWorld(breakdown),
                    warnings: Vec::new(),
                })
            }
            Self::Spectral { .. } => {
                let (cover, breakdown) =
                    spectral::aggregate_areas_to_percentages(histogram, aoi_area_m2)?;
                let warnings = spectral::urban_validation_warnings(&cover);
                for warning in &warnings {
                    log::warn!("{warning}");
                }
                Ok(ClassifiedCover {
                    cover,
                    details: ClassificationDetails::Spectral(breakdown),
                    warnings,
                })
            }
        }
    }
}
