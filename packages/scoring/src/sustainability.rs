//! Environmental Sustainability Index.

use landcover_models::LandCoverResult;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display, AsRefStr)]
pub enum EsiRating {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl EsiRating {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            Self::Excellent
        } else if score > 0.6 {
            Self::Good
        } else if score > 0.4 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainabilityIndex {
    pub score: f64,
    pub rating: EsiRating,
    pub green_fraction: f64,
    pub air_quality_score: f64,
}

/// `ESI = 0.6·green + 0.4·(1 − (level − 1)/4)`, with the air term 1.0
/// when the 1–5 level is unknown.
#[must_use]
pub fn sustainability_index(cover: &LandCoverResult, aqi_level: Option<u8>) -> SustainabilityIndex {
    let green_fraction = cover.green() / 100.0;
    let air_quality_score = aqi_level.map_or(1.0, |level| {
        (1.0 - (f64::from(level) - 1.0) / 4.0).max(0.0)
    });
    let score = 0.6f64.mul_add(green_fraction, 0.4 * air_quality_score);

    SustainabilityIndex {
        score,
        rating: EsiRating::from_score(score),
        green_fraction,
        air_quality_score,
    }
}
