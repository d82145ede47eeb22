//! Coordinate reference system identifiers.
//!
//! Only EPSG-coded systems are modeled. The transformations themselves live in
//! `bulkgeo-core`; this type is what sources declare and sinks are created with.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u32,
}

/// Error returned when a CRS identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized CRS identifier '{input}'")]
pub struct ParseCrsError {
    /// The rejected input
    pub input: String,
}

impl Crs {
    /// WGS84 geographic coordinates (EPSG:4326), longitude first.
    pub const WGS84: Crs = Crs { epsg: 4326 };

    /// Spherical Web Mercator (EPSG:3857).
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };

    /// Creates a CRS from an EPSG code.
    #[must_use]
    pub const fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Returns `true` for EPSG:4326.
    #[must_use]
    pub const fn is_wgs84(&self) -> bool {
        self.epsg == 4326
    }

    /// OGC URN form, as used by the legacy GeoJSON `crs` member.
    #[must_use]
    pub fn to_urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = ParseCrsError;

    /// Accepts `EPSG:3857`, `3857`, `urn:ogc:def:crs:EPSG::3857`,
    /// `urn:ogc:def:crs:EPSG:6.6:3857`, `CRS84`, `WGS84` and the OGC CRS84 URNs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let err = || ParseCrsError {
            input: s.to_string(),
        };

        if matches!(
            lower.as_str(),
            "wgs84" | "crs84" | "urn:ogc:def:crs:ogc:1.3:crs84" | "urn:ogc:def:crs:ogc::crs84"
        ) {
            return Ok(Self::WGS84);
        }

        let code = if let Some(rest) = lower.strip_prefix("epsg:") {
            rest
        } else if let Some(rest) = lower.strip_prefix("urn:ogc:def:crs:epsg:") {
            // Optional version segment: `urn:ogc:def:crs:EPSG:<version>:<code>`
            rest.rsplit(':').next().ok_or_else(err)?
        } else {
            lower.as_str()
        };

        code.parse::<u32>()
            .ok()
            .filter(|code| *code > 0)
            .map(Self::from_epsg)
            .ok_or_else(err)
    }
}
