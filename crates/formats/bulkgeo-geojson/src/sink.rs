//! Streaming `GeoJSON` FeatureCollection sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use bulkgeo_core_common::{AttributeValue, Record, RecordSink, SinkSchema};
use geojson::{Feature, JsonObject, JsonValue};

/// Options for `GeoJSON` writing
#[derive(Debug, Clone)]
pub struct GeoJsonWriterOptions {
    /// Write a legacy named `crs` member for non-WGS84 output (default: true)
    pub write_crs: bool,
}

impl Default for GeoJsonWriterOptions {
    fn default() -> Self {
        Self { write_crs: true }
    }
}

impl GeoJsonWriterOptions {
    /// Create new writer options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the legacy `crs` member is written
    #[must_use]
    pub fn with_crs_member(mut self, write_crs: bool) -> Self {
        self.write_crs = write_crs;
        self
    }
}

/// Writes a FeatureCollection one feature at a time.
///
/// The collection is only well-formed once [`RecordSink::finish`] has run.
pub struct GeoJsonSink<W: Write> {
    writer: W,
    field_names: Vec<String>,
    written: usize,
    destination: String,
}

impl GeoJsonSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the collection header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(
        path: impl AsRef<Path>,
        schema: &SinkSchema,
        options: &GeoJsonWriterOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
        Self::new(
            BufWriter::new(file),
            schema,
            options,
            path.display().to_string(),
        )
    }
}

impl<W: Write> GeoJsonSink<W> {
    /// Wrap `writer` and write the collection header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(
        mut writer: W,
        schema: &SinkSchema,
        options: &GeoJsonWriterOptions,
        destination: impl Into<String>,
    ) -> Result<Self> {
        writer.write_all(br#"{"type":"FeatureCollection","#)?;
        if options.write_crs && !schema.crs.is_wgs84() {
            let crs = serde_json::json!({
                "type": "name",
                "properties": { "name": schema.crs.to_urn() },
            });
            write!(writer, r#""crs":{crs},"#)?;
        }
        writer.write_all(br#""features":["#)?;

        Ok(Self {
            writer,
            field_names: schema.fields.iter().map(|f| f.name.clone()).collect(),
            written: 0,
            destination: destination.into(),
        })
    }

    /// Close the collection and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the trailer cannot be written.
    pub fn into_inner(mut self) -> Result<W> {
        self.write_trailer()?;
        Ok(self.writer)
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.writer.write_all(b"\n]}\n")?;
        self.writer.flush().context("Failed to flush GeoJSON output")
    }
}

fn to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Boolean(b) => JsonValue::Bool(*b),
        AttributeValue::Integer(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        },
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

impl<W: Write> RecordSink for GeoJsonSink<W> {
    fn add_record(&mut self, record: &Record) -> Result<()> {
        if record.attributes.len() != self.field_names.len() {
            bail!(
                "Record has {} attribute(s), expected {}",
                record.attributes.len(),
                self.field_names.len()
            );
        }

        let properties: JsonObject = self
            .field_names
            .iter()
            .zip(&record.attributes)
            .map(|(name, value)| (name.clone(), to_json(value)))
            .collect();

        let feature = Feature {
            bbox: None,
            geometry: record
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        };

        if self.written > 0 {
            self.writer.write_all(b",")?;
        }
        self.writer.write_all(b"\n")?;
        serde_json::to_writer(&mut self.writer, &feature)
            .context("Failed to write GeoJSON feature")?;
        self.written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<String> {
        let mut sink = *self;
        sink.write_trailer()?;
        Ok(sink.destination)
    }
}
