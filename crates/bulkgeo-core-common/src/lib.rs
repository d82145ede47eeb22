//! Common types and traits shared across `bulkgeo` crates.
//!
//! This crate provides the data model and I/O abstractions shared between
//! `bulkgeo-core` and the format crates, preventing circular dependencies.

pub mod crs;
pub mod drivers;
pub mod fields;
pub mod io;
pub mod record;

// Re-export commonly used types
pub use crs::{Crs, ParseCrsError};
pub use drivers::{Driver, DriverCapabilities, SupportStatus};
pub use fields::unique_field_name;
pub use io::{RecordSink, RecordSource, SinkFactory, SinkSchema};
pub use record::{
    AttributeValue, Field, FieldSet, FieldType, GeometryType, Record, RecordTable,
};
