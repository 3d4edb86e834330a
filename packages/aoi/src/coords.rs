//! Detection of `lat,lon` input versus a place name.

use landcover_models::Coordinates;

/// A location as typed by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Explicit `lat,lon` coordinates.
    Coordinates(Coordinates),
    /// A name that needs geocoding.
    Name(String),
}

impl LocationQuery {
    /// Classifies `input`.
    ///
    /// Input is treated as coordinates only when it splits into exactly
    /// two comma-separated numbers with latitude in `[-90, 90]` and
    /// longitude in `[-180, 180]`. Anything else is a name.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        parse_coordinates(input).map_or_else(
            || Self::Name(input.trim().to_string()),
            Self::Coordinates,
        )
    }

    /// Text to show for this location.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Coordinates(c) => format!("{:.4}, {:.4}", c.lat, c.lon),
            Self::Name(name) => name.clone(),
        }
    }
}

/// Parses `"lat,lon"` into coordinates.
#[must_use]
pub fn parse_coordinates(input: &str) -> Option<Coordinates> {
    let mut parts = input.split(',');
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(Coordinates::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_coordinates() {
        let c = parse_coordinates("28.6139, 77.2090").unwrap();
        assert!((c.lat - 28.6139).abs() < 1e-9);
        assert!((c.lon - 77.2090).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_values_are_names() {
        assert!(parse_coordinates("91.0,10.0").is_none());
        assert!(parse_coordinates("10.0,-180.5").is_none());
        assert_eq!(
            LocationQuery::parse("95,200"),
            LocationQuery::Name("95,200".to_string())
        );
    }

    #[test]
    fn wrong_token_count_is_a_name() {
        assert!(parse_coordinates("12.9").is_none());
        assert!(parse_coordinates("12.9,77.5,3").is_none());
        assert!(parse_coordinates("Bengaluru, Karnataka").is_none());
        assert!(parse_coordinates("NaN,1").is_none());
    }

    #[test]
    fn names_are_trimmed() {
        assert_eq!(
            LocationQuery::parse("  Pune "),
            LocationQuery::Name("Pune".to_string())
        );
    }

    #[test]
    fn boundary_values_are_coordinates() {
        assert!(matches!(
            LocationQuery::parse("-90,180"),
            LocationQuery::Coordinates(_)
        ));
    }
}
