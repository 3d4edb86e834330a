//! Flood, heat and drought risk levels.

use landcover_models::LandCoverResult;
use landcover_models::readings::WeatherReading;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Three-level risk, or `Unknown` without weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display, AsRefStr)]
pub enum RiskLevel {
    Unknown,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateRisks {
    pub flood: RiskLevel,
    pub heat: RiskLevel,
    pub drought: RiskLevel,
}

/// High if water > 8% and rainfall > 10 mm; Medium if water > 5%.
#[must_use]
pub fn flood_risk(cover: &LandCoverResult, weather: &WeatherReading) -> RiskLevel {
    if cover.water > 8.0 && weather.precipitation_mm > 10.0 {
        RiskLevel::High
    } else if cover.water > 5.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// High if urban > 50% and temperature > 35 °C; Medium if urban > 40%.
#[must_use]
pub fn heat_risk(cover: &LandCoverResult, weather: &WeatherReading) -> RiskLevel {
    if cover.urban > 50.0 && weather.temperature_c > 35.0 {
        RiskLevel::High
    } else if cover.urban > 40.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// High if vegetation < 20% and rainfall < 5 mm; Medium if vegetation < 30%.
#[must_use]
pub fn drought_risk(cover: &LandCoverResult, weather: &WeatherReading) -> RiskLevel {
    if cover.vegetation < 20.0 && weather.precipitation_mm < 5.0 {
        RiskLevel::High
    } else if cover.vegetation < 30.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[must_use]
pub fn climate_risks(cover: &LandCoverResult, weather: Option<&WeatherReading>) -> ClimateRisks {
    weather.map_or(
        ClimateRisks {
            flood: RiskLevel::Unknown,
            heat: RiskLevel::Unknown,
            drought: RiskLevel::Unknown,
        },
        |weather| ClimateRisks {
            flood: flood_risk(cover, weather),
            heat: heat_risk(cover, weather),
            drought: drought_risk(cover, weather),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather(temperature_c: f64, precipitation_mm: f64) -> WeatherReading {
        WeatherReading {
            temperature_c,
            humidity_pct: 60.0,
            precipitation_mm,
            wind_speed_ms: 3.0,
            pressure_hpa: 1010.0,
        }
    }

    #[test]
    fn wet_hot_city() {
        let cover = LandCoverResult::new(70.0, 2.0, 18.0, 10.0);
        let risks = climate_risks(&cover, Some(&weather(38.0, 12.0)));
        assert_eq!(risks.flood, RiskLevel::High);
        assert_eq!(risks.heat, RiskLevel::High);
        assert_eq!(risks.drought, RiskLevel::Medium);
    }

    #[test]
    fn second_condition_alone_gives_medium() {
        let cover = LandCoverResult::new(45.0, 10.0, 39.0, 6.0);
        let w = weather(20.0, 0.0);
        assert_eq!(flood_risk(&cover, &w), RiskLevel::Medium);
        assert_eq!(heat_risk(&cover, &w), RiskLevel::Medium);
        assert_eq!(drought_risk(&cover, &w), RiskLevel::Low);
    }

    #[test]
    fn dry_sparse_area_is_high_drought() {
        let cover = LandCoverResult::new(30.0, 5.0, 15.0, 50.0);
        assert_eq!(drought_risk(&cover, &weather(25.0, 1.0)), RiskLevel::High);
        assert_eq!(heat_risk(&cover, &weather(40.0, 1.0)), RiskLevel::Low);
    }

    #[test]
    fn no_weather_means_unknown() {
        let risks = climate_risks(&LandCoverResult::new(90.0, 0.0, 5.0, 5.0), None);
        assert_eq!(risks.flood, RiskLevel::Unknown);
        assert_eq!(risks.heat, RiskLevel::Unknown);
        assert_eq!(risks.drought, RiskLevel::Unknown);
    }
}
