#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the land-cover analysis modes.
//!
//! Each subcommand runs one analysis and prints its report to stdout as
//! JSON. Logs go to stderr and are controlled by `RUST_LOG`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use landcover_analysis::Analyzer;
use landcover_analysis_models::AnalysisOptions;
use landcover_cli_utils::{init_logger, print_json};
use landcover_models::imagery::DateRange;

#[derive(Parser)]
#[command(name = "landcover", about = "Satellite land-cover analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a whole city within its administrative boundary (Dynamic World)
    Boundary {
        /// City name or "lat, lon"
        location: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Analyse a circle around a location (Sentinel-2 spectral indices)
    Buffered {
        /// Place name or "lat, lon"
        location: String,
        /// Buffer radius in km. The circle may not exceed 50 km².
        #[arg(long, default_value = "2")]
        radius_km: f64,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Analyse a fixed 1 km square around a locality (Dynamic World)
    Locality {
        /// City the locality belongs to
        city: String,
        /// Locality, suburb or neighbourhood name
        locality: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Analyse a `GeoJSON` polygon (Sentinel-2 spectral indices)
    Polygon {
        /// Inline `GeoJSON` geometry, feature or feature collection
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        geojson: Option<String>,
        /// Read the `GeoJSON` from this file instead
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Track land cover of a buffered area over yearly windows
    TimeSeries {
        /// Place name or "lat, lon"
        location: String,
        /// Buffer radius in km
        #[arg(long, default_value = "2")]
        radius_km: f64,
        /// First window start (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last window start (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Years between windows
        #[arg(long, default_value = "1")]
        interval_years: u32,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// List named localities around a city
    Localities {
        /// City name or "lat, lon"
        city: String,
        /// Search radius in km
        #[arg(long, default_value = "10")]
        radius_km: f64,
    },
}

/// Flags shared by every analysis subcommand.
#[derive(Args)]
struct OptionArgs {
    /// Meters per pixel (defaults to the image source's resolution)
    #[arg(long)]
    resolution_m: Option<f64>,
    /// Residents of the area, for density and health estimates
    #[arg(long)]
    population: Option<u64>,
    /// Property value per km² used by the economic estimate
    #[arg(long)]
    property_value_per_km2: Option<f64>,
    /// Sentinel-2 window start (YYYY-MM-DD); needs --end
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,
    /// Sentinel-2 window end (YYYY-MM-DD); needs --start
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
    /// Tiles queried at once when the area has to be tiled
    #[arg(long, default_value = "1")]
    tile_concurrency: usize,
    /// Skip weather, air quality, hazard and news feeds
    #[arg(long)]
    no_context: bool,
    /// Neither read nor write the locality cache
    #[arg(long)]
    no_cache: bool,
}

impl From<OptionArgs> for AnalysisOptions {
    fn from(args: OptionArgs) -> Self {
        let dates = match (args.start, args.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        };
        Self {
            resolution_m: args.resolution_m,
            population: args.population,
            base_property_value_per_km2: args.property_value_per_km2,
            dates,
            tile_concurrency: args.tile_concurrency,
            include_context: !args.no_context,
            use_cache: !args.no_cache,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let cli = Cli::parse();
    let analyzer = Analyzer::from_env()?;

    match cli.command {
        Commands::Boundary { location, options } => {
            let report = analyzer
                .analyze_boundary(&location, &options.into())
                .await?;
            print_json(&report)?;
        }
        Commands::Buffered {
            location,
            radius_km,
            options,
        } => {
            let report = analyzer
                .analyze_buffered(&location, radius_km, &options.into())
                .await?;
            print_json(&report)?;
        }
        Commands::Locality {
            city,
            locality,
            options,
        } => {
            let report = analyzer
                .analyze_locality(&city, &locality, &options.into())
                .await?;
            print_json(&report)?;
        }
        Commands::Polygon {
            geojson,
            file,
            options,
        } => {
            let geojson = match (geojson, file) {
                (Some(inline), _) => inline,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await?,
                (None, None) => return Err("a GeoJSON argument or --file is required".into()),
            };
            let report = analyzer
                .analyze_polygon(&geojson, &options.into())
                .await?;
            print_json(&report)?;
        }
        Commands::TimeSeries {
            location,
            radius_km,
            from,
            to,
            interval_years,
            options,
        } => {
            let report = analyzer
                .analyze_time_series(
                    &location,
                    radius_km,
                    DateRange::new(from, to),
                    interval_years,
                    &options.into(),
                )
                .await?;
            if !report.skipped.is_empty() {
                log::warn!(
                    "{} of {} windows skipped",
                    report.skipped.len(),
                    report.skipped.len() + report.points.len()
                );
            }
            print_json(&report)?;
        }
        Commands::Localities { city, radius_km } => {
            let localities = analyzer.list_localities(&city, radius_km).await?;
            print_json(&localities)?;
        }
    }

    Ok(())
}
