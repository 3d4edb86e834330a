//! Image sources and acquisition windows.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Satellite product an analysis reads from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageSource {
    /// Dynamic World V1 label band (9 classes, 10 m native).
    DynamicWorld,
    /// Sentinel-2 surface reflectance (green, red, NIR, SWIR bands).
    Sentinel2,
}

impl ImageSource {
    /// Default analysis resolution in meters per pixel.
    #[must_use]
    pub const fn default_resolution_m(self) -> f64 {
        match self {
            Self::DynamicWorld => 30.0,
            Self::Sentinel2 => 10.0,
        }
    }
}

/// Inclusive calendar window for image selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a window from two dates.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The fixed January to March 2024 season used for every Dynamic
    /// World analysis so results are comparable across cities.
    #[must_use]
    pub fn dynamic_world_season() -> Self {
        Self::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap_or_default(),
        )
    }

    /// The calendar year ending at `end`.
    #[must_use]
    pub fn trailing_year(end: NaiveDate) -> Self {
        Self::new(end.checked_sub_months(Months::new(12)).unwrap_or(end), end)
    }

    /// Calendar year starting at `start`, ending the day before its
    /// anniversary.
    #[must_use]
    pub fn year_from(start: NaiveDate) -> Self {
        let end = start
            .checked_add_months(Months::new(12))
            .and_then(|next| next.checked_sub_days(Days::new(1)))
            .unwrap_or(start);
        Self::new(start, end)
    }

    /// Consecutive yearly windows starting at `start`, stepping by
    /// `interval_years` calendar years, up to and including a window
    /// that starts on or before `end`.
    ///
    /// Every window start is offset from `start` itself, so a 29 February
    /// start does not drift to the 28th after the first non-leap year.
    #[must_use]
    pub fn yearly_windows(start: NaiveDate, end: NaiveDate, interval_years: u32) -> Vec<Self> {
        let step = interval_years.max(1).saturating_mul(12);
        (0..)
            .map_while(|k: u32| {
                k.checked_mul(step)
                    .and_then(|months| start.checked_add_months(Months::new(months)))
            })
            .take_while(|current| *current <= end)
            .map(Self::year_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dynamic_world_season_is_fixed() {
        let season = DateRange::dynamic_world_season();
        assert_eq!(season.start, date(2024, 1, 1));
        assert_eq!(season.end, date(2024, 3, 31));
    }

    #[test]
    fn trailing_year_ends_on_the_given_day() {
        let range = DateRange::trailing_year(date(2025, 6, 1));
        assert_eq!(range.end, date(2025, 6, 1));
        assert_eq!(range.start, date(2024, 6, 1));
    }

    #[test]
    fn yearly_windows_cover_the_range() {
        let windows = DateRange::yearly_windows(date(2020, 1, 1), date(2022, 12, 31), 1);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start, date(2020, 1, 1));
        assert_eq!(windows[0].end, date(2020, 12, 31));
        assert_eq!(windows[1].start, date(2021, 1, 1));
        assert_eq!(windows[2].start, date(2022, 1, 1));
        assert_eq!(windows[2].end, date(2022, 12, 31));

        let sparse = DateRange::yearly_windows(date(2020, 1, 1), date(2024, 1, 1), 2);
        assert_eq!(sparse.len(), 3);
        assert_eq!(sparse[2].start, date(2024, 1, 1));
    }

    #[test]
    fn leap_day_start_keeps_its_anniversary() {
        let windows = DateRange::yearly_windows(date(2020, 2, 29), date(2024, 3, 1), 1);
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[1].start, date(2021, 2, 28));
        assert_eq!(windows[4].start, date(2024, 2, 29));
        assert_eq!(windows[0].end, date(2021, 2, 27));
    }

    #[test]
    fn empty_when_start_is_after_end() {
        assert!(DateRange::yearly_windows(date(2023, 1, 1), date(2022, 1, 1), 1).is_empty());
    }
}
