//! `bulkgeo-core` is the core library for `bulkgeo`, providing bulk forward and reverse
//! geocoding of vector feature tables.
//!
//! This crate includes:
//! - **Operations**: the per-record resolution loops ([`operations::bulk_geocode`],
//!   [`operations::bulk_reverse_geocode`]) with per-record error isolation.
//! - **Resolvers**: the [`resolver::Resolver`] trait plus a Nominatim HTTP client and an
//!   offline gazetteer.
//! - **Reprojection**: point transforms between WGS84 and the supported CRSs.
//! - **Driver Registry**: the formats records can be read from and written to.
//! - **Feedback**: progress, info and per-record error reporting.

pub mod drivers;
pub mod error;
pub mod feedback;
pub mod operations;
pub mod reproject;
pub mod resolver;
pub mod types;

pub use bulkgeo_core_common as common;
