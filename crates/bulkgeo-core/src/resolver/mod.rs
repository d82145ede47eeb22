//! Resolver services turning addresses into points and points into addresses.
//!
//! Resolvers are always passed explicitly to the bulk operations.

mod gazetteer;
mod nominatim;

use async_trait::async_trait;
use geo_types::Coord;

pub use gazetteer::{GazetteerOptions, GazetteerResolver};
pub use nominatim::{
    DEFAULT_ENDPOINT, NominatimConfig, NominatimResolver, parse_reverse_response,
    parse_search_response,
};

use crate::error::ResolveError;

/// One resolver result: a place description and its WGS84 location.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    /// Human readable place description
    pub name: String,
    /// Longitude (`x`) / latitude (`y`) in WGS84
    pub point: Coord<f64>,
}

impl Place {
    /// Create a new place.
    #[must_use]
    pub fn new(name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            name: name.into(),
            point: Coord { x: lon, y: lat },
        }
    }
}

/// A forward and reverse geocoding service.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Resolve a textual address. An empty vector means nothing was found.
    async fn geocode(&self, address: &str) -> Result<Vec<Place>, ResolveError>;

    /// Resolve a WGS84 location to place descriptions.
    async fn reverse(&self, lon: f64, lat: f64) -> Result<Vec<Place>, ResolveError>;
}
