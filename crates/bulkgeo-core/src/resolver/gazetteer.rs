//! Offline resolver backed by a CSV lookup table.
//!
//! The table needs `name`, `lon` and `lat` columns; an `address` column, when
//! present, is what forward lookups match against (otherwise `name` is used).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use geo::{Haversine, Length, Line};
use geo_types::Coord;
use log::debug;
use serde::Deserialize;

use super::{Place, Resolver};
use crate::error::ResolveError;

/// Options for gazetteer lookups
#[derive(Debug, Clone, Default)]
pub struct GazetteerOptions {
    /// Maximum number of forward results (default: all matches)
    pub limit: Option<usize>,
    /// Reverse lookups farther than this many metres find nothing
    pub max_distance: Option<f64>,
}

impl GazetteerOptions {
    /// Create new options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of forward results
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the reverse search radius in metres
    #[must_use]
    pub fn with_max_distance(mut self, metres: f64) -> Self {
        self.max_distance = Some(metres);
        self
    }
}

#[derive(Debug, Deserialize)]
struct GazetteerRow {
    name: String,
    lon: f64,
    lat: f64,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    place: Place,
}

/// Resolver answering from an in-memory list of named places.
#[derive(Debug, Clone)]
pub struct GazetteerResolver {
    entries: Vec<Entry>,
    options: GazetteerOptions,
}

/// Lowercase and collapse runs of whitespace.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl GazetteerResolver {
    /// Build a gazetteer from places.
    #[must_use]
    pub fn new(places: impl IntoIterator<Item = (String, Place)>, options: GazetteerOptions) -> Self {
        let entries = places
            .into_iter()
            .map(|(address, place)| Entry {
                key: normalize(&address),
                place,
            })
            .collect();
        Self { entries, options }
    }

    /// Load a gazetteer CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_path(path: impl AsRef<Path>, options: GazetteerOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open gazetteer '{}'", path.display()))?;
        Self::from_reader(file, options)
            .with_context(|| format!("Failed to load gazetteer '{}'", path.display()))
    }

    /// Load a gazetteer from CSV data.
    ///
    /// # Errors
    ///
    /// Returns an error if a row is missing a column or has invalid coordinates.
    pub fn from_reader<R: Read>(reader: R, options: GazetteerOptions) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut places = Vec::new();
        for (index, row) in csv_reader.deserialize::<GazetteerRow>().enumerate() {
            // line 1 is the header
            let row = row.with_context(|| format!("Invalid gazetteer row at line {}", index + 2))?;
            if !(-180.0..=180.0).contains(&row.lon) || !(-90.0..=90.0).contains(&row.lat) {
                bail!(
                    "Coordinate ({}, {}) out of range at line {}",
                    row.lon,
                    row.lat,
                    index + 2
                );
            }
            let address = row
                .address
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| row.name.clone());
            places.push((address, Place::new(row.name, row.lon, row.lat)));
        }
        debug!("Loaded {} gazetteer entries", places.len());
        Ok(Self::new(places, options))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the gazetteer has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn distance_metres(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Line::new(a, b).length::<Haversine>()
}

#[async_trait]
impl Resolver for GazetteerResolver {
    fn name(&self) -> &str {
        "gazetteer"
    }

    async fn geocode(&self, address: &str) -> Result<Vec<Place>, ResolveError> {
        let key = normalize(address);
        let limit = self.options.limit.unwrap_or(usize::MAX);
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key == key)
            .take(limit)
            .map(|entry| entry.place.clone())
            .collect())
    }

    async fn reverse(&self, lon: f64, lat: f64) -> Result<Vec<Place>, ResolveError> {
        let target = Coord { x: lon, y: lat };
        let nearest = self
            .entries
            .iter()
            .map(|entry| (distance_metres(target, entry.place.point), entry))
            .min_by(|(a, _), (b, _)| a.total_cmp(b));

        match nearest {
            Some((distance, entry))
                if self.options.max_distance.is_none_or(|max| distance <= max) =>
            {
                Ok(vec![entry.place.clone()])
            },
            _ => Err(ResolveError::NoMatch {
                query: format!("({lon}, {lat})"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
name,lon,lat,address
Colosseo,12.4922,41.8902,Piazza del Colosseo 1 Roma
Duomo di Milano,9.1919,45.4641,Piazza del Duomo Milano
Duomo di Firenze,11.2560,43.7731,
Colosseo (ingresso),12.4930,41.8900,piazza del colosseo 1  roma
";

    fn gazetteer(options: GazetteerOptions) -> GazetteerResolver {
        GazetteerResolver::from_reader(TABLE.as_bytes(), options).unwrap()
    }

    #[tokio::test]
    async fn test_geocode_normalizes_address() {
        let places = gazetteer(GazetteerOptions::new())
            .geocode("  PIAZZA del Colosseo 1\tRoma ")
            .await
            .unwrap();
        let names: Vec<_> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Colosseo", "Colosseo (ingresso)"]);
    }

    #[tokio::test]
    async fn test_geocode_limit_and_name_fallback() {
        let resolver = gazetteer(GazetteerOptions::new().with_limit(1));
        assert_eq!(
            resolver.geocode("piazza del colosseo 1 roma").await.unwrap().len(),
            1
        );
        let places = resolver.geocode("duomo di firenze").await.unwrap();
        assert_eq!(places, vec![Place::new("Duomo di Firenze", 11.2560, 43.7731)]);
        assert!(resolver.geocode("Via Nuova").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_finds_nearest() {
        let resolver = gazetteer(GazetteerOptions::new());
        let places = resolver.reverse(9.19, 45.46).await.unwrap();
        assert_eq!(places[0].name, "Duomo di Milano");
    }

    #[tokio::test]
    async fn test_reverse_respects_max_distance() {
        let resolver = gazetteer(GazetteerOptions::new().with_max_distance(1_000.0));
        assert!(resolver.reverse(9.1920, 45.4640).await.is_ok());
        assert!(matches!(
            resolver.reverse(10.0, 45.0).await,
            Err(ResolveError::NoMatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_gazetteer_has_no_match() {
        let resolver = GazetteerResolver::new(Vec::new(), GazetteerOptions::new());
        assert!(resolver.is_empty());
        assert!(resolver.reverse(0.0, 0.0).await.is_err());
    }

    #[test]
    fn test_invalid_rows() {
        let err = GazetteerResolver::from_reader(
            "name,lon,lat\nA,east,10\n".as_bytes(),
            GazetteerOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid gazetteer row at line 2");

        let err = GazetteerResolver::from_reader(
            "name,lon,lat\nA,1,10\nB,200,10\n".as_bytes(),
            GazetteerOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Coordinate (200, 10) out of range at line 3");
    }

    #[test]
    fn test_distance_metres() {
        // Roma to Milano is roughly 477 km
        let d = distance_metres(Coord { x: 12.4964, y: 41.9028 }, Coord { x: 9.19, y: 45.4642 });
        assert!((470_000.0..485_000.0).contains(&d), "{d}");
    }
}
