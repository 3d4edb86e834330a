//! Per-class pixel histograms returned by raster services.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Label used by raster services for masked / no-data pixels.
pub const MASKED_LABEL: i32 = -1;

/// What a histogram bin measures.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistogramMeasure {
    /// Number of pixels per label.
    #[default]
    Count,
    /// Area in square meters per label.
    Area,
}

/// Mapping from integer class label to pixel count or area.
///
/// Bins are summed on insert, so building a histogram from repeated
/// labels and merging two histograms are the same operation. The masked
/// label ([`MASKED_LABEL`]) may be present but never contributes to
/// [`Self::total`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelHistogram {
    measure: HistogramMeasure,
    bins: BTreeMap<i32, f64>,
}

impl PixelHistogram {
    /// Creates an empty histogram.
    #[must_use]
    pub const fn new(measure: HistogramMeasure) -> Self {
        Self {
            measure,
            bins: BTreeMap::new(),
        }
    }

    /// Builds a histogram from `(label, value)` pairs, summing duplicates.
    #[must_use]
    pub fn from_bins(
        measure: HistogramMeasure,
        bins: impl IntoIterator<Item = (i32, f64)>,
    ) -> Self {
        let mut histogram = Self::new(measure);
        for (label, value) in bins {
            histogram.add(label, value);
        }
        histogram
    }

    /// Adds `value` to the bin for `label`.
    ///
    /// Non-finite and non-positive values are ignored.
    pub fn add(&mut self, label: i32, value: f64) {
        if value.is_finite() && value > 0.0 {
            *self.bins.entry(label).or_insert(0.0) += value;
        }
    }

    /// The measure these bins are expressed in.
    #[must_use]
    pub const fn measure(&self) -> HistogramMeasure {
        self.measure
    }

    /// Value for `label`, or zero when absent.
    #[must_use]
    pub fn get(&self, label: i32) -> f64 {
        self.bins.get(&label).copied().unwrap_or(0.0)
    }

    /// Iterates over `(label, value)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.bins.iter().map(|(label, value)| (*label, *value))
    }

    /// Number of distinct labels, including the masked label if present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Value recorded under [`MASKED_LABEL`].
    #[must_use]
    pub fn masked(&self) -> f64 {
        self.get(MASKED_LABEL)
    }

    /// Sum of every bin except [`MASKED_LABEL`].
    #[must_use]
    pub fn total(&self) -> f64 {
        self.bins
            .iter()
            .filter(|(label, _)| **label != MASKED_LABEL)
            .map(|(_, value)| value)
            .sum()
    }

    /// Whether the histogram holds no usable (non-masked) data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() <= 0.0
    }

    /// Removes the masked bin in place.
    pub fn strip_masked(&mut self) {
        self.bins.remove(&MASKED_LABEL);
    }

    /// Copy without the masked bin.
    #[must_use]
    pub fn without_masked(&self) -> Self {
        let mut copy = self.clone();
        copy.strip_masked();
        copy
    }

    /// Sums `other` into `self`, label by label.
    pub fn merge(&mut self, other: &Self) {
        for (label, value) in other.iter() {
            self.add(label, value);
        }
    }

    /// Merges any number of histograms into a new one.
    #[must_use]
    pub fn merged<'a>(
        measure: HistogramMeasure,
        parts: impl IntoIterator<Item = &'a Self>,
    ) -> Self {
        let mut merged = Self::new(measure);
        for part in parts {
            merged.merge(part);
        }
        merged
    }
}
