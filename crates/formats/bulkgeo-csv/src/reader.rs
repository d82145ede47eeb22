//! CSV reader producing a [`RecordTable`].
//!
//! Every attribute column becomes a `String` field; empty cells are read as nulls.
//! A WKT geometry column is consumed and does not appear among the fields, while
//! X/Y columns stay attributes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use bulkgeo_core_common::{AttributeValue, Crs, FieldSet, FieldType, Record, RecordTable};
use geo_types::{Geometry, Point};
use geozero::ToGeo;
use geozero::wkt::Wkt;
use log::debug;

/// Where a record's geometry comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeometrySource {
    /// Attribute-only table
    #[default]
    None,
    /// WKT text in the named column
    Wkt {
        /// Column holding the WKT geometry
        column: String,
    },
    /// Point coordinates in two numeric columns
    XY {
        /// Column holding the X (longitude/easting) value
        x: String,
        /// Column holding the Y (latitude/northing) value
        y: String,
    },
}

/// Options for CSV reading
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    /// Column delimiter (default: tab for `.tsv` files, b',' otherwise)
    pub delimiter: Option<u8>,
    /// Geometry encoding (default: none)
    pub geometry: GeometrySource,
    /// CRS of the geometries (default: undeclared)
    pub crs: Option<Crs>,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            geometry: GeometrySource::None,
            crs: None,
        }
    }
}

impl CsvReadOptions {
    /// Create new read options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set column delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Read geometries from a WKT column
    #[must_use]
    pub fn with_wkt_column(mut self, column: impl Into<String>) -> Self {
        self.geometry = GeometrySource::Wkt {
            column: column.into(),
        };
        self
    }

    /// Read point geometries from X/Y columns
    #[must_use]
    pub fn with_xy_columns(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.geometry = GeometrySource::XY {
            x: x.into(),
            y: y.into(),
        };
        self
    }

    /// Declare the CRS of the geometries
    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }
}

/// Delimiter implied by the file extension of `path`.
#[must_use]
pub fn delimiter_for_path(path: impl AsRef<Path>) -> u8 {
    match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(extension) if extension.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Column indices resolved against the header row.
#[derive(Clone, Copy)]
enum GeometryColumns {
    None,
    Wkt(usize),
    XY(usize, usize),
}

/// Read a CSV file into a [`RecordTable`].
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its content cannot be parsed.
pub fn read_csv_file(path: impl AsRef<Path>, options: &CsvReadOptions) -> Result<RecordTable> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;
    let delimiter = options.delimiter.unwrap_or_else(|| delimiter_for_path(path));
    read_csv(file, &options.clone().with_delimiter(delimiter))
}

/// Read CSV data with a header row into a [`RecordTable`].
///
/// # Errors
///
/// Returns an error if:
/// - The header is missing, contains duplicate names or lacks a geometry column
/// - A row has a different number of cells than the header
/// - A geometry cell cannot be parsed
pub fn read_csv<R: Read>(reader: R, options: &CsvReadOptions) -> Result<RecordTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter.unwrap_or(b','))
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .clone();

    let column_index = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| anyhow!("Geometry column '{name}' not found in CSV header"))
    };

    let geometry_columns = match &options.geometry {
        GeometrySource::None => GeometryColumns::None,
        GeometrySource::Wkt { column } => GeometryColumns::Wkt(column_index(column)?),
        GeometrySource::XY { x, y } => GeometryColumns::XY(column_index(x)?, column_index(y)?),
    };

    let attribute_columns: Vec<usize> = (0..headers.len())
        .filter(|idx| !matches!(geometry_columns, GeometryColumns::Wkt(wkt) if wkt == *idx))
        .collect();

    let mut fields = FieldSet::new();
    for &idx in &attribute_columns {
        fields
            .push_field(&headers[idx], FieldType::String)
            .context("Invalid CSV header")?;
    }

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row.context("Failed to read CSV record")?;
        let line = row.position().map_or(0, csv::Position::line);

        let attributes = attribute_columns
            .iter()
            .map(|&idx| match row.get(idx) {
                Some(cell) if !cell.is_empty() => AttributeValue::String(cell.to_string()),
                _ => AttributeValue::Null,
            })
            .collect();

        let geometry = match geometry_columns {
            GeometryColumns::None => None,
            GeometryColumns::Wkt(idx) => parse_wkt(row.get(idx).unwrap_or_default(), line)?,
            GeometryColumns::XY(x, y) => parse_xy(
                row.get(x).unwrap_or_default(),
                row.get(y).unwrap_or_default(),
                line,
            )?,
        };

        records.push(Record::new(attributes, geometry));
    }

    debug!("Read {} CSV record(s) with {} field(s)", records.len(), fields.len());
    Ok(RecordTable::new(fields, records, options.crs))
}

fn parse_wkt(cell: &str, line: u64) -> Result<Option<Geometry<f64>>> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Wkt(trimmed)
        .to_geo()
        .map(Some)
        .map_err(|e| anyhow!("Invalid WKT geometry at line {line}: {e}"))
}

fn parse_xy(x: &str, y: &str, line: u64) -> Result<Option<Geometry<f64>>> {
    let (x, y) = (x.trim(), y.trim());
    if x.is_empty() && y.is_empty() {
        return Ok(None);
    }
    let parse = |value: &str| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| anyhow!("Invalid coordinate '{value}' at line {line}"))
    };
    Ok(Some(Geometry::Point(Point::new(parse(x)?, parse(y)?))))
}
