//! Driver registry for the formats records are read from and written to.
//!
//! The registry is modeled after GDAL's driver list. Only drivers whose
//! capabilities are [`SupportStatus::Supported`] can be opened; the rest are
//! listed so users can see what is planned.
//!
//! # Examples
//!
//! ```
//! use bulkgeo_core::drivers::{find_driver, get_available_drivers};
//!
//! // Find a specific driver
//! let geojson = find_driver("GeoJSON").expect("GeoJSON driver should exist");
//! assert!(geojson.capabilities.read.is_supported());
//!
//! // List all drivers with supported operations
//! for driver in get_available_drivers() {
//!     println!("{}: {}", driver.short_name, driver.long_name);
//! }
//! ```

use std::path::{Path, PathBuf};

use bulkgeo_core_common::{Record, RecordSink, RecordTable, SinkFactory, SinkSchema};
use bulkgeo_csv::{CsvSink, read_csv_file};
use bulkgeo_geojson::{GeoJsonSink, read_geojson_file};
use log::info;

pub use bulkgeo_core_common::drivers::{Driver, DriverCapabilities, SupportStatus};
pub use bulkgeo_csv::{CsvReadOptions, CsvWriterOptions, GeometrySource};
pub use bulkgeo_geojson::GeoJsonWriterOptions;

use crate::error::{DriverError, IoError, IoErrorExt, Result, driver_not_found};

/// Returns the complete registry of known vector format drivers.
///
/// # Examples
///
/// ```
/// use bulkgeo_core::drivers::get_drivers;
///
/// let read_capable = get_drivers()
///     .iter()
///     .filter(|d| d.capabilities.read.is_supported())
///     .count();
/// assert_eq!(read_capable, 3);
/// ```
#[must_use]
pub fn get_drivers() -> Vec<Driver> {
    use SupportStatus::{NotSupported, Planned, Supported};

    vec![
        Driver::new(
            "CSV",
            "Comma Separated Value (.csv)",
            &["csv", "tsv"],
            Supported,
            Supported,
        ),
        Driver::new("GeoJSON", "GeoJSON", &["geojson", "json"], Supported, Supported),
        Driver::new(
            "GeoJSONSeq",
            "GeoJSONSeq: sequence of GeoJSON features",
            &["geojsonl", "geojsons", "ndjson"],
            Supported,
            Planned,
        ),
        Driver::new("GPKG", "GeoPackage vector", &["gpkg"], Planned, Planned),
        Driver::new(
            "ESRI Shapefile",
            "ESRI Shapefile / DBF",
            &["shp"],
            Planned,
            Planned,
        ),
        Driver::new("FlatGeobuf", "FlatGeobuf", &["fgb"], Planned, Planned),
        Driver::new("Parquet", "(Geo)Parquet", &["parquet"], Planned, Planned),
        Driver::new(
            "GML",
            "Geography Markup Language",
            &["gml"],
            NotSupported,
            NotSupported,
        ),
        Driver::new(
            "KML",
            "Keyhole Markup Language",
            &["kml"],
            NotSupported,
            NotSupported,
        ),
        Driver::new("GPX", "GPS Exchange Format", &["gpx"], NotSupported, NotSupported),
    ]
}

/// Returns drivers with at least one supported operation.
///
/// # Examples
///
/// ```
/// use bulkgeo_core::drivers::get_available_drivers;
///
/// let names: Vec<_> = get_available_drivers().iter().map(|d| d.short_name).collect();
/// assert_eq!(names, vec!["CSV", "GeoJSON", "GeoJSONSeq"]);
/// ```
#[must_use]
pub fn get_available_drivers() -> Vec<Driver> {
    get_drivers()
        .into_iter()
        .filter(|d| d.capabilities.read.is_supported() || d.capabilities.write.is_supported())
        .collect()
}

/// Finds a driver by its short name (case-insensitive).
///
/// # Examples
///
/// ```
/// use bulkgeo_core::drivers::find_driver;
///
/// let driver = find_driver("geojson").expect("GeoJSON should exist");
/// assert_eq!(driver.short_name, "GeoJSON");
/// assert!(find_driver("InvalidDriver").is_none());
/// ```
#[must_use]
pub fn find_driver(name: &str) -> Option<Driver> {
    get_drivers()
        .into_iter()
        .find(|d| d.short_name.eq_ignore_ascii_case(name))
}

/// Lists drivers fully supporting the requested operations.
///
/// A `false` argument means the operation is not required.
#[must_use]
pub fn list_drivers_with_capability(read: bool, write: bool) -> Vec<Driver> {
    get_drivers()
        .into_iter()
        .filter(|d| {
            let read_ok = !read || d.capabilities.read.is_supported();
            let write_ok = !write || d.capabilities.write.is_supported();
            read_ok && write_ok
        })
        .collect()
}

/// Returns all driver short names in alphabetical order.
///
/// # Examples
///
/// ```
/// use bulkgeo_core::drivers::get_driver_names;
///
/// let names = get_driver_names();
/// assert!(names.contains(&"CSV"));
///
/// let mut sorted = names.clone();
/// sorted.sort_unstable();
/// assert_eq!(names, sorted);
/// ```
#[must_use]
pub fn get_driver_names() -> Vec<&'static str> {
    let mut names: Vec<_> = get_drivers().iter().map(|d| d.short_name).collect();
    names.sort_unstable();
    names
}

/// Infers a driver from the file extension of `path`.
///
/// # Examples
///
/// ```
/// use bulkgeo_core::drivers::driver_for_path;
///
/// assert_eq!(driver_for_path("out/places.GeoJSON").unwrap().short_name, "GeoJSON");
/// assert!(driver_for_path("README").is_none());
/// ```
#[must_use]
pub fn driver_for_path(path: impl AsRef<Path>) -> Option<Driver> {
    let extension = path.as_ref().extension()?.to_str()?;
    get_drivers()
        .into_iter()
        .find(|d| d.matches_extension(extension))
}

/// Resolves an explicit driver name, or infers one from `path`.
///
/// # Errors
///
/// Returns [`DriverError::NotFound`] for unknown names and
/// [`DriverError::Undetermined`] when nothing matches the extension.
pub fn resolve_driver(name: Option<&str>, path: &Path) -> Result<Driver> {
    match name {
        Some(name) => find_driver(name).ok_or_else(|| driver_not_found(name).into()),
        None => driver_for_path(path).ok_or_else(|| {
            DriverError::Undetermined {
                path: path.to_path_buf(),
            }
            .into()
        }),
    }
}

fn require(driver: &Driver, status: SupportStatus, operation: &str) -> Result<()> {
    if status.is_supported() {
        Ok(())
    } else {
        Err(DriverError::OperationNotSupported {
            driver: driver.short_name.to_string(),
            operation: operation.to_string(),
        }
        .into())
    }
}

/// Reads the whole layer at `path` with `driver`.
///
/// `csv` only applies to the CSV driver.
///
/// # Errors
///
/// Returns an error if the driver cannot read, the file is missing or the data is invalid.
pub fn read_records(
    path: impl AsRef<Path>,
    driver: &Driver,
    csv: &CsvReadOptions,
) -> Result<RecordTable> {
    let path = path.as_ref();
    require(driver, driver.capabilities.read, "reading")?;
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    info!("Reading {} from {}", driver.short_name, path.display());
    let table = match driver.short_name {
        "CSV" => read_csv_file(path, csv).with_read_context("CSV", path)?,
        "GeoJSON" | "GeoJSONSeq" => {
            read_geojson_file(path).with_read_context(driver.short_name, path)?
        },
        _ => {
            return Err(DriverError::OperationNotSupported {
                driver: driver.short_name.to_string(),
                operation: "reading".to_string(),
            }
            .into());
        },
    };
    info!(
        "Read {} record(s) with {} field(s)",
        table.records.len(),
        table.fields.len()
    );
    Ok(table)
}

/// Creates file sinks for a driver once the output schema is known.
#[derive(Debug, Clone)]
pub struct FileSinkFactory {
    path: PathBuf,
    driver: Driver,
    csv: CsvWriterOptions,
    geojson: GeoJsonWriterOptions,
}

impl FileSinkFactory {
    /// Create a factory writing to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::OperationNotSupported`] if the driver cannot write.
    pub fn new(path: impl Into<PathBuf>, driver: Driver) -> Result<Self> {
        require(&driver, driver.capabilities.write, "writing")?;
        Ok(Self {
            path: path.into(),
            driver,
            csv: CsvWriterOptions::default(),
            geojson: GeoJsonWriterOptions::default(),
        })
    }

    /// Set the CSV writer options
    #[must_use]
    pub fn with_csv_options(mut self, options: CsvWriterOptions) -> Self {
        self.csv = options;
        self
    }

    /// Set the `GeoJSON` writer options
    #[must_use]
    pub fn with_geojson_options(mut self, options: GeoJsonWriterOptions) -> Self {
        self.geojson = options;
        self
    }

    /// Output path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SinkFactory for FileSinkFactory {
    fn create_sink(&self, schema: &SinkSchema) -> anyhow::Result<Box<dyn RecordSink>> {
        info!(
            "Writing {} {} layer to {}",
            self.driver.short_name,
            schema.geometry_type.as_str(),
            self.path.display()
        );
        let format = self.driver.short_name;
        let inner: Box<dyn RecordSink> = match format {
            "CSV" => Box::new(
                CsvSink::create(&self.path, schema, &self.csv)
                    .with_write_context(format, &self.path)?,
            ),
            "GeoJSON" => Box::new(
                GeoJsonSink::create(&self.path, schema, &self.geojson)
                    .with_write_context(format, &self.path)?,
            ),
            other => anyhow::bail!("Driver '{other}' does not support writing"),
        };
        Ok(Box::new(FileSink {
            inner,
            format,
            path: self.path.clone(),
        }))
    }
}

/// Attaches the output path to finalization failures.
struct FileSink {
    inner: Box<dyn RecordSink>,
    format: &'static str,
    path: PathBuf,
}

impl RecordSink for FileSink {
    fn add_record(&mut self, record: &Record) -> anyhow::Result<()> {
        self.inner.add_record(record)
    }

    fn finish(self: Box<Self>) -> anyhow::Result<String> {
        let FileSink {
            inner,
            format,
            path,
        } = *self;
        Ok(inner.finish().with_write_context(format, path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;

    #[test]
    fn test_find_driver_case_insensitive() {
        let driver = find_driver("csv").unwrap();
        assert_eq!(driver.short_name, "CSV");
    }

    #[test]
    fn test_list_read_write_drivers() {
        let drivers = list_drivers_with_capability(true, true);
        let names: Vec<_> = drivers.iter().map(|d| d.short_name).collect();
        assert_eq!(names, vec!["CSV", "GeoJSON"]);
        assert_eq!(list_drivers_with_capability(true, false).len(), 3);
    }

    #[test]
    fn test_driver_for_path() {
        assert_eq!(driver_for_path("a/b.csv").unwrap().short_name, "CSV");
        assert_eq!(driver_for_path("b.ndjson").unwrap().short_name, "GeoJSONSeq");
        assert_eq!(driver_for_path("c.gpkg").unwrap().short_name, "GPKG");
        assert!(driver_for_path("d.xyz").is_none());
    }

    #[test]
    fn test_resolve_driver() {
        let path = Path::new("input.geojson");
        assert_eq!(resolve_driver(None, path).unwrap().short_name, "GeoJSON");
        assert_eq!(resolve_driver(Some("CSV"), path).unwrap().short_name, "CSV");
        assert!(matches!(
            resolve_driver(Some("Nope"), path),
            Err(GeocodeError::Driver(DriverError::NotFound { .. }))
        ));
        assert!(matches!(
            resolve_driver(None, Path::new("input")),
            Err(GeocodeError::Driver(DriverError::Undetermined { .. }))
        ));
    }

    #[test]
    fn test_unsupported_operations() {
        let seq = find_driver("GeoJSONSeq").unwrap();
        assert!(matches!(
            FileSinkFactory::new("out.ndjson", seq),
            Err(GeocodeError::Driver(DriverError::OperationNotSupported { .. }))
        ));

        let gpkg = find_driver("GPKG").unwrap();
        let err = read_records("in.gpkg", &gpkg, &CsvReadOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Driver 'GPKG' does not support reading");
    }

    fn point_schema() -> SinkSchema {
        let mut fields = bulkgeo_core_common::FieldSet::new();
        fields
            .push_field("place", bulkgeo_core_common::FieldType::String)
            .unwrap();
        SinkSchema {
            fields,
            geometry_type: bulkgeo_core_common::GeometryType::Point,
            crs: bulkgeo_core_common::Crs::WGS84,
        }
    }

    #[test]
    fn test_uncreatable_output_is_write_error() {
        for (name, driver) in [("out.csv", "CSV"), ("out.geojson", "GeoJSON")] {
            let path = Path::new("no/such/dir").join(name);
            let factory = FileSinkFactory::new(&path, find_driver(driver).unwrap()).unwrap();
            let failure = factory.create_sink(&point_schema()).err().unwrap();
            let err = GeocodeError::from_anyhow(failure);
            match err {
                GeocodeError::Io(IoError::Write { format, path: failed, .. }) => {
                    assert_eq!(format, driver);
                    assert_eq!(failed, path);
                },
                other => panic!("expected a write error, got {other:?}"),
            }
        }
    }

    struct UnflushableSink;

    impl RecordSink for UnflushableSink {
        fn add_record(&mut self, _record: &Record) -> anyhow::Result<()> {
            Ok(())
        }

        fn finish(self: Box<Self>) -> anyhow::Result<String> {
            anyhow::bail!("device full")
        }
    }

    #[test]
    fn test_finish_failure_names_output() {
        let sink: Box<dyn RecordSink> = Box::new(FileSink {
            inner: Box::new(UnflushableSink),
            format: "CSV",
            path: PathBuf::from("out.csv"),
        });
        let err = GeocodeError::from_anyhow(sink.finish().unwrap_err());
        assert!(matches!(err, GeocodeError::Io(IoError::Write { .. })));
        assert_eq!(err.to_string(), "Failed to write CSV file 'out.csv': device full");
    }

    #[test]
    fn test_tsv_output_uses_tabs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("out.tsv");
        let driver = resolve_driver(None, &path).unwrap();
        assert_eq!(driver.short_name, "CSV");

        let mut fields = bulkgeo_core_common::FieldSet::new();
        for name in ["id", "place"] {
            fields
                .push_field(name, bulkgeo_core_common::FieldType::String)
                .unwrap();
        }
        let schema = SinkSchema {
            fields,
            geometry_type: bulkgeo_core_common::GeometryType::None,
            crs: bulkgeo_core_common::Crs::WGS84,
        };
        let mut sink = FileSinkFactory::new(&path, driver)
            .unwrap()
            .create_sink(&schema)
            .unwrap();
        sink.add_record(&Record::new(vec!["1".into(), "Roma, Lazio".into()], None))
            .unwrap();
        sink.finish().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "id\tplace\n1\tRoma, Lazio\n"
        );
    }

    #[test]
    fn test_read_missing_file() {
        let csv = find_driver("CSV").unwrap();
        let err = read_records("missing.csv", &csv, &CsvReadOptions::default()).unwrap_err();
        assert!(matches!(err, GeocodeError::Io(IoError::FileNotFound { .. })));
    }
}
