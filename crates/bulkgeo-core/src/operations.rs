//! Bulk forward and reverse geocoding over a record source.
//!
//! Both operations stream: every input record is resolved and its output features
//! are written to the sink before the next record is read. A record that fails is
//! reported through [`Feedback::report_error`] and never stops the run.

use bulkgeo_core_common::{
    AttributeValue, Crs, FieldSet, FieldType, GeometryType, Record, RecordSink, RecordSource,
    SinkFactory, SinkSchema,
};
use geo::Centroid;
use geo_types::{Coord, Geometry, Point};
use log::{debug, info};

use crate::error::{
    ConfigError, CrsError, GeocodeError, RecordContext, RecordError, RecordFailure, ResolveError,
    Result,
};
use crate::feedback::Feedback;
use crate::reproject::{from_wgs84, is_supported, to_wgs84};
use crate::resolver::Resolver;
use crate::types::BulkReport;

/// Default name of the appended place attribute.
pub const DEFAULT_PLACE_FIELD: &str = "place";

/// Options for [`bulk_geocode`]
#[derive(Debug, Clone)]
pub struct ForwardOptions {
    /// Source attribute holding the address
    pub address_field: String,
    /// Desired name of the appended place attribute (default: `"place"`)
    pub place_field: String,
    /// CRS of the output points (default: EPSG:4326)
    pub target_crs: Crs,
}

impl ForwardOptions {
    /// Create options resolving `address_field`
    #[must_use]
    pub fn new(address_field: impl Into<String>) -> Self {
        Self {
            address_field: address_field.into(),
            place_field: DEFAULT_PLACE_FIELD.to_string(),
            target_crs: Crs::WGS84,
        }
    }

    /// Set the desired place attribute name
    #[must_use]
    pub fn with_place_field(mut self, name: impl Into<String>) -> Self {
        self.place_field = name.into();
        self
    }

    /// Set the output CRS
    #[must_use]
    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = crs;
        self
    }
}

/// Options for [`bulk_reverse_geocode`]
#[derive(Debug, Clone)]
pub struct ReverseOptions {
    /// Desired name of the appended place attribute (default: `"place"`)
    pub place_field: String,
}

impl Default for ReverseOptions {
    fn default() -> Self {
        Self {
            place_field: DEFAULT_PLACE_FIELD.to_string(),
        }
    }
}

impl ReverseOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the desired place attribute name
    #[must_use]
    pub fn with_place_field(mut self, name: impl Into<String>) -> Self {
        self.place_field = name.into();
        self
    }
}

/// Percentage of `done` out of `total`.
#[allow(clippy::cast_precision_loss)]
fn progress(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * done as f64 / total as f64
    }
}

fn output_fields(source: &FieldSet, place_field: &str) -> (FieldSet, String) {
    let mut fields = source.clone();
    let name = fields.push_unique(place_field, FieldType::String);
    (fields, name)
}

fn ensure_supported(crs: Crs) -> Result<()> {
    if is_supported(crs) {
        Ok(())
    } else {
        Err(CrsError::Unsupported { crs }.into())
    }
}

fn write(sink: &mut dyn RecordSink, record: &Record) -> std::result::Result<(), RecordFailure> {
    sink.add_record(record)
        .map_err(|e| RecordFailure::Sink(format!("{e:#}")))
}

/// Per-record bookkeeping shared by both loops.
struct Run<'a> {
    feedback: &'a mut dyn Feedback,
    report: BulkReport,
    total: usize,
}

impl Run<'_> {
    fn record_done(
        &mut self,
        index: usize,
        context: RecordContext,
        outcome: std::result::Result<(), RecordFailure>,
    ) {
        if let Err(failure) = outcome {
            if failure.is_no_match() {
                self.report.no_match += 1;
            } else {
                self.report.failed += 1;
            }
            self.feedback.report_error(&RecordError {
                index,
                context,
                failure,
            });
        }
        self.report.processed += 1;
        self.feedback
            .set_progress(progress(self.report.processed, self.total));
    }

    fn canceled(&mut self) -> bool {
        if self.feedback.is_canceled() {
            info!(
                "Canceled after {} of {} record(s)",
                self.report.processed, self.total
            );
            self.report.canceled = true;
        }
        self.report.canceled
    }

    fn finish(mut self, sink: Box<dyn RecordSink>) -> Result<BulkReport> {
        self.report.destination = sink.finish().map_err(GeocodeError::from_anyhow)?;
        info!(
            "Wrote {} feature(s) from {} record(s) to {} ({} without match, {} failed)",
            self.report.emitted,
            self.report.processed,
            self.report.destination,
            self.report.no_match,
            self.report.failed
        );
        Ok(self.report)
    }
}

/// Resolves an address attribute of every record to points.
///
/// The output layer has the source fields plus a String place field (named by
/// disambiguating `options.place_field`), `Point` geometries and
/// `options.target_crs`. Each (place, point) the resolver returns becomes one
/// output feature carrying the original attributes.
///
/// # Errors
///
/// Fails before anything is written if the address field does not exist, the
/// target CRS is unsupported or the sink cannot be created. Fails afterwards only
/// if the sink cannot be finalized. Per-record problems are sent to `feedback`.
pub async fn bulk_geocode(
    source: &dyn RecordSource,
    resolver: &dyn Resolver,
    options: &ForwardOptions,
    sink_factory: &dyn SinkFactory,
    feedback: &mut dyn Feedback,
) -> Result<BulkReport> {
    let address_index = source
        .fields()
        .index_of(&options.address_field)
        .ok_or_else(|| ConfigError::FieldNotFound {
            field: options.address_field.clone(),
            available: source.fields().names().join(", "),
        })?;
    ensure_supported(options.target_crs)?;

    let (fields, place_field) = output_fields(source.fields(), &options.place_field);
    let schema = SinkSchema {
        fields,
        geometry_type: GeometryType::Point,
        crs: options.target_crs,
    };
    let mut sink = sink_factory
        .create_sink(&schema)
        .map_err(GeocodeError::from_anyhow)?;
    info!(
        "Geocoding '{}' with {} into field '{place_field}'",
        options.address_field,
        resolver.name()
    );

    let mut run = Run {
        feedback,
        report: BulkReport::default(),
        total: source.feature_count(),
    };

    for (index, record) in source.records().enumerate() {
        if run.canceled() {
            break;
        }

        let address = record
            .get(address_index)
            .map(AttributeValue::to_string)
            .unwrap_or_default();
        run.feedback
            .push_info(&format!("Processing the following address: {address}"));

        let mut context = RecordContext {
            address: Some(address.clone()),
            ..RecordContext::default()
        };
        let outcome = geocode_record(
            record,
            &address,
            resolver,
            options.target_crs,
            sink.as_mut(),
            &mut context,
            &mut run.report.emitted,
        )
        .await;
        run.record_done(index, context, outcome);
    }

    run.finish(sink)
}

async fn geocode_record(
    record: &Record,
    address: &str,
    resolver: &dyn Resolver,
    target_crs: Crs,
    sink: &mut dyn RecordSink,
    context: &mut RecordContext,
    emitted: &mut usize,
) -> std::result::Result<(), RecordFailure> {
    if address.trim().is_empty() {
        return Err(RecordFailure::MissingAddress);
    }

    let places = resolver.geocode(address).await?;
    if places.is_empty() {
        return Err(ResolveError::NoMatch {
            query: format!("'{address}'"),
        }
        .into());
    }
    debug!("{} result(s) for '{address}'", places.len());

    for place in places {
        context.point = Some(place.point);
        context.place = Some(place.name.clone());

        let projected = from_wgs84(place.point, target_crs)?;
        let output = record.extended(
            AttributeValue::String(place.name),
            Some(Geometry::Point(Point::from(projected))),
        );
        write(sink, &output)?;
        *emitted += 1;
    }
    Ok(())
}

/// Resolves the centroid of every record's geometry to place descriptions.
///
/// The output layer has the source fields plus a String place field, the source
/// geometry type and the source CRS (EPSG:4326 when the source declares none).
/// Each place the resolver returns becomes one output feature carrying the
/// original attributes and the original geometry; the returned point is not used.
///
/// # Errors
///
/// Fails before anything is written if the source CRS is unsupported or the sink
/// cannot be created, and afterwards only if the sink cannot be finalized.
pub async fn bulk_reverse_geocode(
    source: &dyn RecordSource,
    resolver: &dyn Resolver,
    options: &ReverseOptions,
    sink_factory: &dyn SinkFactory,
    feedback: &mut dyn Feedback,
) -> Result<BulkReport> {
    let crs = source.crs().unwrap_or_default();
    ensure_supported(crs)?;

    let (fields, place_field) = output_fields(source.fields(), &options.place_field);
    let schema = SinkSchema {
        fields,
        geometry_type: source.geometry_type(),
        crs,
    };
    let mut sink = sink_factory
        .create_sink(&schema)
        .map_err(GeocodeError::from_anyhow)?;
    info!(
        "Reverse geocoding {} feature(s) in {crs} with {} into field '{place_field}'",
        source.feature_count(),
        resolver.name()
    );

    let mut run = Run {
        feedback,
        report: BulkReport::default(),
        total: source.feature_count(),
    };

    for (index, record) in source.records().enumerate() {
        if run.canceled() {
            break;
        }

        let mut context = RecordContext::default();
        let outcome = reverse_record(
            record,
            crs,
            resolver,
            sink.as_mut(),
            run.feedback,
            &mut context,
            &mut run.report.emitted,
        )
        .await;
        run.record_done(index, context, outcome);
    }

    run.finish(sink)
}

fn centroid(geometry: Option<&Geometry<f64>>) -> Option<Coord<f64>> {
    geometry?.centroid().map(|point| point.0)
}

async fn reverse_record(
    record: &Record,
    crs: Crs,
    resolver: &dyn Resolver,
    sink: &mut dyn RecordSink,
    feedback: &mut dyn Feedback,
    context: &mut RecordContext,
    emitted: &mut usize,
) -> std::result::Result<(), RecordFailure> {
    let center = centroid(record.geometry.as_ref()).ok_or(RecordFailure::MissingGeometry)?;
    let wgs84 = to_wgs84(center, crs)?;
    context.centroid = Some(wgs84);
    feedback.push_info(&format!(
        "Searching for centroid: ({},{})",
        wgs84.x, wgs84.y
    ));

    let places = resolver.reverse(wgs84.x, wgs84.y).await?;
    if places.is_empty() {
        return Err(ResolveError::NoMatch {
            query: format!("({}, {})", wgs84.x, wgs84.y),
        }
        .into());
    }

    for place in places {
        context.point = Some(place.point);
        context.place = Some(place.name.clone());

        let output = record.extended(AttributeValue::String(place.name), record.geometry.clone());
        write(sink, &output)?;
        *emitted += 1;
    }
    Ok(())
}
