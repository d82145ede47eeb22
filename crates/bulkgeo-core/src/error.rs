//! Custom error types for `bulkgeo` operations.
//!
//! Two layers of errors exist:
//! - [`GeocodeError`] is fatal: the run cannot start or its output cannot be created.
//! - [`RecordError`] is per record and never stops a run. It is handed to the
//!   [`Feedback`](crate::feedback::Feedback) channel and the loop moves on.

use std::fmt;
use std::path::PathBuf;

use bulkgeo_core_common::Crs;
use geo_types::Coord;
use thiserror::Error;

/// Main error type for `bulkgeo` operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Driver-related errors (not found, unsupported operations, etc.)
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// I/O errors (file read/write, path issues)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Coordinate reference system errors
    #[error(transparent)]
    Crs(#[from] CrsError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic errors from dependencies
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Driver-related errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Driver was not found in the registry
    #[error("Driver '{name}' not found. Available drivers: {available}")]
    NotFound {
        /// The requested driver name
        name: String,
        /// Comma-separated list of available drivers
        available: String,
    },

    /// Driver does not support the requested operation
    #[error("Driver '{driver}' does not support {operation}")]
    OperationNotSupported {
        /// The driver name
        driver: String,
        /// The operation that's not supported (e.g., "reading", "writing")
        operation: String,
    },

    /// No driver could be inferred from a path
    #[error("Cannot infer a driver for '{path}'")]
    Undetermined {
        /// The path without a recognized extension
        path: PathBuf,
    },
}

/// I/O related errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file
    #[error("Failed to read {format} file '{path}': {source}")]
    Read {
        /// The format being read (e.g., "CSV", "`GeoJSON`")
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file
    #[error("Failed to write {format} file '{path}': {source}")]
    Write {
        /// The format being written
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },
}

/// Reprojection errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrsError {
    /// No transformation is implemented for the CRS
    #[error("Unsupported CRS {crs}")]
    Unsupported {
        /// The CRS
        crs: Crs,
    },

    /// The coordinate lies outside the valid area of the CRS
    #[error("Coordinate ({x}, {y}) is outside the valid range of {crs}")]
    OutOfBounds {
        /// X / longitude
        x: f64,
        /// Y / latitude
        y: f64,
        /// The CRS
        crs: Crs,
    },
}

/// Errors raised by a resolver service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The service could not be reached or answered with an error status
    #[error("Geocoding service unavailable: {message}")]
    ServiceUnavailable {
        /// Transport or status description
        message: String,
    },

    /// The service answered with a payload that could not be decoded
    #[error("Malformed geocoding response: {message}")]
    MalformedResponse {
        /// Decoding problem
        message: String,
    },

    /// The service found nothing for the query
    #[error("No match found for {query}")]
    NoMatch {
        /// The address or coordinate that was looked up
        query: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option: {option}")]
    MissingRequired {
        /// The missing option name
        option: String,
    },

    /// A named field does not exist in the source
    #[error("Field '{field}' not found. Available fields: {available}")]
    FieldNotFound {
        /// The requested field
        field: String,
        /// Comma-separated list of source fields
        available: String,
    },
}

/// Type alias for Results using `GeocodeError`.
pub type Result<T> = std::result::Result<T, GeocodeError>;

impl GeocodeError {
    /// Recover an error that crossed an `anyhow` boundary, such as a
    /// [`SinkFactory`](bulkgeo_core_common::SinkFactory).
    #[must_use]
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        err.downcast::<Self>().unwrap_or_else(Self::Other)
    }

    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Driver(e) => e.user_message(),
            Self::Io(e) => e.user_message(),
            Self::Crs(e) => format!("Reprojection error: {e}"),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Other(e) => format!("Error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Driver(e) => e.recovery_suggestion(),
            Self::Io(IoError::FileNotFound { .. }) => {
                Some("Check that the file path is correct and the file exists.".to_string())
            },
            Self::Crs(CrsError::Unsupported { .. }) => Some(
                "Supported CRSs are EPSG:4326, EPSG:3857 and the WGS84 UTM zones \
                 (EPSG:326xx / EPSG:327xx)."
                    .to_string(),
            ),
            Self::Config(ConfigError::FieldNotFound { .. }) => {
                Some("Field names are case-sensitive.".to_string())
            },
            _ => None,
        }
    }
}

impl DriverError {
    fn user_message(&self) -> String {
        match self {
            Self::NotFound { name, available } => {
                format!(
                    "Driver '{name}' not found.\n\nAvailable drivers:\n{}",
                    available
                        .split(", ")
                        .map(|d| format!("  - {d}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            },
            Self::OperationNotSupported { driver, operation } => {
                format!("The '{driver}' driver does not support {operation}.")
            },
            Self::Undetermined { .. } => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => {
                Some("Run 'bulkgeo drivers' to see all available drivers.".to_string())
            },
            Self::OperationNotSupported { .. } => {
                Some("Try using a different driver that supports this operation.".to_string())
            },
            Self::Undetermined { .. } => {
                Some("Pass --input-driver / --output-driver explicitly.".to_string())
            },
        }
    }
}

impl IoError {
    fn user_message(&self) -> String {
        match self {
            Self::Read { format, path, .. } => {
                format!("Failed to read {} file: {}", format, path.display())
            },
            Self::Write { format, path, .. } => {
                format!("Failed to write {} file: {}", format, path.display())
            },
            Self::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            },
        }
    }
}

/// Extension trait for adding I/O context to errors.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            GeocodeError::Io(IoError::Read {
                format: format.to_string(),
                path: path.into(),
                source: e.into(),
            })
        })
    }

    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            GeocodeError::Io(IoError::Write {
                format: format.to_string(),
                path: path.into(),
                source: e.into(),
            })
        })
    }
}

/// Why a single record produced no (or incomplete) output.
#[derive(Debug, Error)]
pub enum RecordFailure {
    /// The resolver failed or found nothing
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The address attribute is null or blank
    #[error("Address is empty")]
    MissingAddress,

    /// The record has no usable geometry
    #[error("Record has no geometry")]
    MissingGeometry,

    /// A point could not be reprojected
    #[error(transparent)]
    Reproject(#[from] CrsError),

    /// The sink rejected an output record
    #[error("Failed to write output feature: {0}")]
    Sink(String),
}

impl RecordFailure {
    /// Returns `true` when the resolver found nothing.
    #[must_use]
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::Resolve(ResolveError::NoMatch { .. }))
    }
}

/// Diagnostic values captured when a record fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordContext {
    /// Address being resolved (forward)
    pub address: Option<String>,
    /// Centroid in WGS84 (reverse)
    pub centroid: Option<Coord<f64>>,
    /// Last resolver point seen
    pub point: Option<Coord<f64>>,
    /// Last place name seen
    pub place: Option<String>,
}

impl fmt::Display for RecordContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(address) = &self.address {
            parts.push(format!("address: {address}"));
        }
        if let Some(c) = self.centroid {
            parts.push(format!("centroid: ({}, {})", c.x, c.y));
        }
        if let Some(p) = self.point {
            parts.push(format!("point: ({}, {})", p.x, p.y));
        }
        if let Some(place) = &self.place {
            parts.push(format!("place: {place}"));
        }
        f.write_str(&parts.join(", "))
    }
}

/// A non-fatal failure of one record.
#[derive(Debug)]
pub struct RecordError {
    /// Zero-based position of the record in the source
    pub index: usize,
    /// Values seen when the failure happened
    pub context: RecordContext,
    /// What went wrong
    pub failure: RecordFailure,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record {}: {}", self.index + 1, self.failure)?;
        let context = self.context.to_string();
        if !context.is_empty() {
            write!(f, " ({context})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Helper to create `DriverError::NotFound` with available drivers.
#[must_use]
pub fn driver_not_found(name: &str) -> DriverError {
    use crate::drivers::get_driver_names;

    let available = get_driver_names().join(", ");
    DriverError::NotFound {
        name: name.to_string(),
        available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_errors_are_distinct() {
        let unavailable = ResolveError::ServiceUnavailable {
            message: "connection refused".to_string(),
        };
        let malformed = ResolveError::MalformedResponse {
            message: "expected array".to_string(),
        };
        let no_match = ResolveError::NoMatch {
            query: "'Nowhere 1'".to_string(),
        };
        assert_eq!(
            unavailable.to_string(),
            "Geocoding service unavailable: connection refused"
        );
        assert_eq!(malformed.to_string(), "Malformed geocoding response: expected array");
        assert_eq!(no_match.to_string(), "No match found for 'Nowhere 1'");
        assert!(RecordFailure::from(no_match).is_no_match());
        assert!(!RecordFailure::from(unavailable).is_no_match());
    }

    #[test]
    fn test_record_error_display() {
        let error = RecordError {
            index: 2,
            context: RecordContext {
                address: Some("Via Roma 1".to_string()),
                point: Some(Coord { x: 12.5, y: 41.9 }),
                place: Some("Roma".to_string()),
                ..RecordContext::default()
            },
            failure: RecordFailure::Sink("disk full".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Record 3: Failed to write output feature: disk full \
             (address: Via Roma 1, point: (12.5, 41.9), place: Roma)"
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_record_error_without_context() {
        let error = RecordError {
            index: 0,
            context: RecordContext::default(),
            failure: RecordFailure::MissingGeometry,
        };
        assert_eq!(error.to_string(), "Record 1: Record has no geometry");
    }

    #[test]
    fn test_read_context_wraps_source() {
        let result: std::result::Result<(), anyhow::Error> = Err(anyhow::anyhow!("bad header"));
        let err = result.with_read_context("CSV", "in.csv").unwrap_err();
        assert_eq!(err.to_string(), "Failed to read CSV file 'in.csv': bad header");
        assert_eq!(err.user_message(), "Failed to read CSV file: in.csv");
    }

    #[test]
    fn test_from_anyhow_recovers_geocode_error() {
        let wrapped = anyhow::Error::from(GeocodeError::from(IoError::FileNotFound {
            path: PathBuf::from("out.csv"),
        }));
        assert!(matches!(
            GeocodeError::from_anyhow(wrapped),
            GeocodeError::Io(IoError::FileNotFound { .. })
        ));

        let other = GeocodeError::from_anyhow(anyhow::anyhow!("disk full"));
        assert!(matches!(other, GeocodeError::Other(_)));
        assert_eq!(other.user_message(), "Error: disk full");
    }

    #[test]
    fn test_driver_not_found_lists_drivers() {
        let err = GeocodeError::from(driver_not_found("GML"));
        assert!(err.to_string().contains("CSV"));
        assert!(err.user_message().contains("  - GeoJSON"));
        assert_eq!(
            err.recovery_suggestion().as_deref(),
            Some("Run 'bulkgeo drivers' to see all available drivers.")
        );
    }
}
