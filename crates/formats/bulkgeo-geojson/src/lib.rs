//! GeoJSON record reader and streaming GeoJSON sink.

pub mod parser;
pub mod sink;

pub use parser::{parse_geojson_bytes, read_geojson_file};
pub use sink::{GeoJsonSink, GeoJsonWriterOptions};
