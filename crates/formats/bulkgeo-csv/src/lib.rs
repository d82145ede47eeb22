//! CSV record reader and streaming CSV sink.
//!
//! Geometries are read either from a WKT column or from a pair of X/Y columns, and
//! written back as a WKT column placed after the attribute fields.

pub mod reader;
pub mod sink;

pub use reader::{CsvReadOptions, GeometrySource, delimiter_for_path, read_csv, read_csv_file};
pub use sink::{CsvSink, CsvWriterOptions};
