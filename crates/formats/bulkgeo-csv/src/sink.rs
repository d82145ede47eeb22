//! Streaming CSV sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use bulkgeo_core_common::{GeometryType, Record, RecordSink, SinkSchema, unique_field_name};
use geozero::ToWkt;

use crate::reader::delimiter_for_path;

/// Options for CSV writing
#[derive(Debug, Clone)]
pub struct CsvWriterOptions {
    /// Column delimiter (default: tab for `.tsv` files, b',' otherwise)
    pub delimiter: Option<u8>,
    /// Preferred name of the WKT geometry column (default: "geometry")
    pub geometry_column: String,
}

impl Default for CsvWriterOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            geometry_column: "geometry".to_string(),
        }
    }
}

impl CsvWriterOptions {
    /// Create new writer options with defaults
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

    /// Set the preferred geometry column name
    #[must_use]
    pub fn with_geometry_column(mut self, name: impl Into<String>) -> Self {
        self.geometry_column = name.into();
        self
    }
}

/// Writes one CSV row per record as records arrive.
///
/// The header is the output fields followed by a WKT column, named by
/// disambiguating [`CsvWriterOptions::geometry_column`] against the fields. Layers
/// without geometry get no WKT column.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    field_count: usize,
    has_geometry: bool,
    destination: String,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the header cannot be written.
    pub fn create(
        path: impl AsRef<Path>,
        schema: &SinkSchema,
        options: &CsvWriterOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
        let delimiter = options.delimiter.unwrap_or_else(|| delimiter_for_path(path));
        Self::new(
            BufWriter::new(file),
            schema,
            &options.clone().with_delimiter(delimiter),
            path.display().to_string(),
        )
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap `writer` and write the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(
        writer: W,
        schema: &SinkSchema,
        options: &CsvWriterOptions,
        destination: impl Into<String>,
    ) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter.unwrap_or(b','))
            .from_writer(writer);

        let has_geometry = schema.geometry_type != GeometryType::None;
        let mut header: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
        if has_geometry {
            header.push(unique_field_name(&options.geometry_column, &schema.fields));
        }
        writer
            .write_record(&header)
            .context("Failed to write CSV header")?;

        Ok(Self {
            writer,
            field_count: schema.fields.len(),
            has_geometry,
            destination: destination.into(),
        })
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered rows cannot be flushed.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV output: {}", e.error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn add_record(&mut self, record: &Record) -> Result<()> {
        if record.attributes.len() != self.field_count {
            bail!(
                "Record has {} attribute(s), expected {}",
                record.attributes.len(),
                self.field_count
            );
        }

        let mut row: Vec<String> = record.attributes.iter().map(ToString::to_string).collect();
        if self.has_geometry {
            let wkt = match &record.geometry {
                Some(geometry) => geometry
                    .to_wkt()
                    .map_err(|e| anyhow!("Failed to encode geometry as WKT: {e}"))?,
                None => String::new(),
            };
            row.push(wkt);
        }

        self.writer
            .write_record(&row)
            .context("Failed to write CSV record")
    }

    fn finish(self: Box<Self>) -> Result<String> {
        let mut sink = *self;
        sink.writer.flush().context("Failed to flush CSV output")?;
        Ok(sink.destination)
    }
}
