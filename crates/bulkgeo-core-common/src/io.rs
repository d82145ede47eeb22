//! I/O traits for reading records and writing resolved features.
//!
//! Format crates implement [`RecordSink`]; [`RecordSource`] is implemented by the
//! in-memory [`RecordTable`] the readers produce.

use anyhow::Result;

use crate::crs::Crs;
use crate::record::{FieldSet, GeometryType, Record, RecordTable};

/// An ordered source of records.
pub trait RecordSource {
    /// Fields every record is aligned with.
    fn fields(&self) -> &FieldSet;

    /// Geometry type of the layer.
    fn geometry_type(&self) -> GeometryType;

    /// Declared CRS, if any.
    fn crs(&self) -> Option<Crs>;

    /// Number of records the source will yield.
    fn feature_count(&self) -> usize;

    /// Records in source order.
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_>;
}

impl RecordSource for RecordTable {
    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    fn crs(&self) -> Option<Crs> {
        self.crs
    }

    fn feature_count(&self) -> usize {
        self.records.len()
    }

    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        Box::new(self.records.iter())
    }
}

/// Layout of an output layer, fixed when the sink is created.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSchema {
    /// Output fields
    pub fields: FieldSet,
    /// Output geometry type
    pub geometry_type: GeometryType,
    /// CRS of the written geometries
    pub crs: Crs,
}

/// Destination for output records.
pub trait RecordSink {
    /// Writes one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    fn add_record(&mut self, record: &Record) -> Result<()>;

    /// Finalizes the layer and returns its destination identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if trailing output cannot be written or flushed.
    fn finish(self: Box<Self>) -> Result<String>;
}

/// Creates sinks once the output schema is known.
pub trait SinkFactory {
    /// Creates a sink for `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be opened.
    fn create_sink(&self, schema: &SinkSchema) -> Result<Box<dyn RecordSink>>;
}

impl<F> SinkFactory for F
where
    F: Fn(&SinkSchema) -> Result<Box<dyn RecordSink>>,
{
    fn create_sink(&self, schema: &SinkSchema) -> Result<Box<dyn RecordSink>> {
        self(schema)
    }
}
