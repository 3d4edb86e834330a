//! US EPA Air Quality Index from pollutant concentrations, plus the
//! health advisories shown next to air-quality readings.
//!
//! The final index is the largest of the PM2.5, PM10 and O₃ sub-indices.
//! Each sub-index is linear within its breakpoint band and truncated to
//! an integer; the open top band is capped at 500.

use landcover_models::readings::AirQualityReading;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Highest reportable index.
pub const AQI_MAX: u16 = 500;

/// One band of a breakpoint table: concentrations `c_lo..=c_hi` map
/// linearly onto `i_lo..=i_hi`.
#[derive(Debug, Clone, Copy)]
struct Band {
    c_lo: f64,
    c_hi: f64,
    i_lo: f64,
    i_hi: f64,
}

const fn band(c_lo: f64, c_hi: f64, i_lo: f64, i_hi: f64) -> Band {
    Band {
        c_lo,
        c_hi,
        i_lo,
        i_hi,
    }
}

/// Bands below the open top band, plus where the top band starts.
struct Table {
    bands: [Band; 5],
    top_c_lo: f64,
}

/// PM2.5, µg/m³, 24-hour.
const PM25: Table = Table {
    bands: [
        band(0.0, 12.0, 0.0, 50.0),
        band(12.1, 35.4, 51.0, 100.0),
        band(35.5, 55.4, 101.0, 150.0),
        band(55.5, 150.4, 151.0, 200.0),
        band(150.5, 250.4, 201.0, 300.0),
    ],
    top_c_lo: 250.5,
};

/// PM10, µg/m³, 24-hour.
const PM10: Table = Table {
    bands: [
        band(0.0, 54.0, 0.0, 50.0),
        band(55.0, 154.0, 51.0, 100.0),
        band(155.0, 254.0, 101.0, 150.0),
        band(255.0, 354.0, 151.0, 200.0),
        band(355.0, 424.0, 201.0, 300.0),
    ],
    top_c_lo: 425.0,
};

/// O₃, µg/m³, 8-hour.
const O3: Table = Table {
    bands: [
        band(0.0, 107.0, 0.0, 50.0),
        band(108.0, 137.0, 51.0, 100.0),
        band(138.0, 168.0, 101.0, 150.0),
        band(169.0, 208.0, 151.0, 200.0),
        band(209.0, 392.0, 201.0, 300.0),
    ],
    top_c_lo: 393.0,
};

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn truncate(value: f64) -> u16 {
    value.max(0.0) as u16
}

fn sub_index(concentration: f64, table: &Table) -> u16 {
    if !concentration.is_finite() || concentration <= 0.0 {
        return 0;
    }
    for b in &table.bands {
        if concentration <= b.c_hi {
            return interpolate(concentration, b);
        }
    }
    truncate(301.0 + (concentration - table.top_c_lo) / 100.0 * 199.0).min(AQI_MAX)
}

fn interpolate(concentration: f64, b: &Band) -> u16 {
    truncate(b.i_lo + (concentration - b.c_lo) / (b.c_hi - b.c_lo) * (b.i_hi - b.i_lo))
}

#[must_use]
pub fn pm25_sub_index(pm25: f64) -> u16 {
    sub_index(pm25, &PM25)
}

#[must_use]
pub fn pm10_sub_index(pm10: f64) -> u16 {
    sub_index(pm10, &PM10)
}

#[must_use]
pub fn o3_sub_index(o3: f64) -> u16 {
    sub_index(o3, &O3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
pub enum Pollutant {
    #[serde(rename = "PM2.5")]
    #[strum(serialize = "PM2.5")]
    Pm25,
    #[serde(rename = "PM10")]
    #[strum(serialize = "PM10")]
    Pm10,
    #[serde(rename = "O3")]
    #[strum(serialize = "O3")]
    O3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display, AsRefStr)]
pub enum AqiCategory {
    Good,
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    #[strum(serialize = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    #[strum(serialize = "Very Unhealthy")]
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    #[must_use]
    pub const fn from_value(value: u16) -> Self {
        match value {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitiveGroups,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubIndices {
    pub pm25: u16,
    pub pm10: u16,
    pub o3: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsAqi {
    pub value: u16,
    pub category: AqiCategory,
    pub dominant_pollutant: Pollutant,
    pub sub_indices: SubIndices,
}

/// US AQI by the dominant-pollutant method. Missing or negative PM10 and
/// O₃ readings contribute a zero sub-index.
#[must_use]
pub fn us_aqi(pm25: f64, pm10: Option<f64>, o3: Option<f64>) -> UsAqi {
    let sub_indices = SubIndices {
        pm25: pm25_sub_index(pm25),
        pm10: pm10.map_or(0, pm10_sub_index),
        o3: o3.map_or(0, o3_sub_index),
    };
    let value = sub_indices.pm25.max(sub_indices.pm10).max(sub_indices.o3);

    let dominant_pollutant = if sub_indices.pm10 > sub_indices.pm25
        && sub_indices.pm10 >= sub_indices.o3
    {
        Pollutant::Pm10
    } else if sub_indices.o3 > sub_indices.pm25 && sub_indices.o3 > sub_indices.pm10 {
        Pollutant::O3
    } else {
        Pollutant::Pm25
    };

    UsAqi {
        value,
        category: AqiCategory::from_value(value),
        dominant_pollutant,
        sub_indices,
    }
}

/// [`us_aqi`] over a feed reading.
#[must_use]
pub fn us_aqi_for(reading: &AirQualityReading) -> UsAqi {
    us_aqi(reading.pm25, Some(reading.pm10), Some(reading.o3))
}

/// Advisory for a 0–500 US AQI value.
#[must_use]
pub const fn us_aqi_advisory(value: u16) -> &'static str {
    match value {
        0..=50 => "Air quality is satisfactory. Air pollution poses little or no risk.",
        51..=100 => {
            "Air quality is acceptable. However, there may be a risk for some people, \
             particularly those who are unusually sensitive to air pollution."
        }
        101..=150 => {
            "Members of sensitive groups may experience health effects. \
             The general public is less likely to be affected."
        }
        151..=200 => {
            "Some members of the general public may experience health effects; \
             members of sensitive groups may experience more serious health effects."
        }
        201..=300 => {
            "Health alert: The risk of health effects is increased for everyone. \
             Everyone may begin to experience health effects."
        }
        _ => {
            "Health warning of emergency conditions: everyone is more likely to be affected. \
             Avoid all outdoor activities."
        }
    }
}

/// Advisory for the 1–5 level reported by the air-pollution feed.
#[must_use]
pub const fn level_advisory(level: u8) -> &'static str {
    match level {
        1 => "Air quality is satisfactory. No health concerns.",
        2 => {
            "Air quality is acceptable. Sensitive individuals may experience minor breathing \
             discomfort."
        }
        3 => {
            "Members of sensitive groups may experience health effects. General public unlikely \
             to be affected."
        }
        4 => {
            "Everyone may begin to experience health effects. Sensitive groups may experience \
             more serious effects."
        }
        5 => {
            "Health alert: Everyone may experience serious health effects. Avoid outdoor \
             activities."
        }
        _ => "Air quality data unavailable.",
    }
}

/// Links poor air to dense built-up cover: AQI ≥ 200 with urban > 70%, or
/// AQI ≥ 150 with urban > 60%.
#[must_use]
pub fn urban_density_note(urban_pct: f64, aqi: Option<u16>) -> Option<String> {
    let aqi = aqi?;
    if aqi >= 200 && urban_pct > 70.0 {
        Some(format!(
            "High US AQI ({aqi}) correlates with high urban density ({urban_pct:.1}%). Urban \
             areas typically have elevated pollution from traffic, industry, and reduced vegetation."
        ))
    } else if aqi >= 150 && urban_pct > 60.0 {
        Some(format!(
            "Moderate to unhealthy US AQI ({aqi}) with high urban density ({urban_pct:.1}%). \
             Urban areas may contribute to air quality concerns."
        ))
    } else {
        None
    }
}
