//! Turns a classified histogram plus context into an [`AnalysisReport`].

use chrono::{NaiveDate, Utc};
use landcover_analysis_models::{
    AggregationSummary, AirQualitySummary, AnalysisOptions, AnalysisReport, AoiSummary, Scores,
};
use landcover_aoi::AreaOfInterest;
use landcover_classify::ClassifiedCover;
use landcover_classify::normalize::urban_green_floor;
use landcover_feeds::FeedBundle;
use landcover_models::LandCoverResult;
use landcover_models::readings::{AirQualityReading, WeatherReading};
use landcover_scoring::air_quality::{
    level_advisory, urban_density_note, us_aqi_advisory, us_aqi_for,
};
use landcover_scoring::economic::DEFAULT_BASE_PROPERTY_VALUE_PER_KM2;
use landcover_scoring::{
    EconomicInputs, carbon_impact, climate_risks, economic_impact, sustainability_index,
    urbanisation_risk,
};

pub(crate) fn summarize(aoi: &AreaOfInterest) -> AoiSummary {
    AoiSummary {
        name: aoi.name.clone(),
        mode: aoi.mode,
        center: aoi.center,
        bbox: aoi.bbox,
        area_km2: aoi.area_km2,
    }
}

/// Residents per km², when a population was given for a non-empty area.
#[allow(clippy::cast_precision_loss)]
fn population_density(population: Option<u64>, area_km2: f64) -> Option<f64> {
    population
        .filter(|p| *p > 0)
        .filter(|_| area_km2 > 0.0)
        .map(|p| p as f64 / area_km2)
}

/// Every score, from the presented percentages.
pub(crate) fn scores(
    cover: &LandCoverResult,
    area_km2: f64,
    weather: Option<&WeatherReading>,
    air_quality: Option<&AirQualityReading>,
    options: &AnalysisOptions,
) -> Scores {
    let aqi_level = air_quality.map(|a| a.aqi);
    let economic = EconomicInputs {
        area_km2,
        population: options.population,
        base_property_value_per_km2: options
            .base_property_value_per_km2
            .unwrap_or(DEFAULT_BASE_PROPERTY_VALUE_PER_KM2),
    };

    Scores {
        climate: climate_risks(cover, weather),
        urbanisation: urbanisation_risk(
            cover,
            population_density(options.population, area_km2),
            aqi_level,
        ),
        sustainability: sustainability_index(cover, aqi_level),
        carbon: carbon_impact(cover, area_km2),
        economic: economic_impact(cover, &economic),
    }
}

fn air_quality_summary(reading: AirQualityReading, urban_pct: f64) -> AirQualitySummary {
    let us_aqi = us_aqi_for(&reading);
    AirQualitySummary {
        level_name: reading.level_name(),
        level_advisory: level_advisory(reading.aqi),
        us_aqi_advisory: us_aqi_advisory(us_aqi.value),
        urban_density_note: urban_density_note(urban_pct, Some(us_aqi.value)),
        us_aqi,
        reading,
    }
}

/// Applies the display floor, scores the presented cover and attaches
/// the context feeds.
pub(crate) fn build(
    aoi: &AreaOfInterest,
    classified: ClassifiedCover,
    aggregation: AggregationSummary,
    image_date: Option<NaiveDate>,
    context: FeedBundle,
    options: &AnalysisOptions,
) -> AnalysisReport {
    let normalization = urban_green_floor(&classified.cover);
    let presented = normalization.presented;

    let mut warnings = classified.warnings;
    if let Some(reason) = normalization.reason {
        warnings.push(reason.to_string());
    }

    let scores = scores(
        &presented,
        aoi.area_km2,
        context.weather.as_ref(),
        context.air_quality.as_ref(),
        options,
    );

    AnalysisReport {
        aoi: summarize(aoi),
        land_cover: presented,
        raw_land_cover: classified.cover,
        normalization,
        classification: classified.details,
        aggregation,
        image_date,
        weather: context.weather,
        air_quality: context
            .air_quality
            .map(|reading| air_quality_summary(reading, presented.urban)),
        scores,
        disasters: context.disasters,
        news: context.news,
        warnings,
        generated_at: Utc::now(),
    }
}
