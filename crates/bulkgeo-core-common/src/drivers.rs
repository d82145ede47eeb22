//! Format driver descriptors.
//!
//! A driver names a vector format the bulk operations can read records from or
//! write results to. The registry of known drivers lives in `bulkgeo-core`.

/// Support status for a specific driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// The operation is implemented.
    Supported,
    /// The operation is not supported by the driver.
    NotSupported,
    /// The operation is planned for future implementation.
    Planned,
}

impl SupportStatus {
    /// Returns `true` if the operation is implemented.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportStatus::Supported)
    }

    /// Returns `true` if the operation is supported or planned.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, SupportStatus::NotSupported)
    }

    /// Returns the string representation of this support status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::NotSupported => "Not Supported",
            SupportStatus::Planned => "Planned",
        }
    }
}

/// Read and write capabilities of a driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverCapabilities {
    /// Whether records can be read from this format.
    pub read: SupportStatus,
    /// Whether resolved records can be written to this format.
    pub write: SupportStatus,
}

impl DriverCapabilities {
    /// Returns `true` if reading or writing is supported or planned.
    #[must_use]
    pub fn has_any_support(&self) -> bool {
        self.read.is_available() || self.write.is_available()
    }
}

/// A vector format driver.
#[derive(Debug, Clone)]
pub struct Driver {
    /// Short name used on the command line (e.g. `"GeoJSON"`).
    pub short_name: &'static str,
    /// Descriptive name for display.
    pub long_name: &'static str,
    /// Lowercase file extensions, without the dot, associated with the format.
    pub extensions: &'static [&'static str],
    /// Read/write support.
    pub capabilities: DriverCapabilities,
}

impl Driver {
    /// Creates a new driver definition.
    #[must_use]
    pub const fn new(
        short_name: &'static str,
        long_name: &'static str,
        extensions: &'static [&'static str],
        read: SupportStatus,
        write: SupportStatus,
    ) -> Self {
        Self {
            short_name,
            long_name,
            extensions,
            capabilities: DriverCapabilities { read, write },
        }
    }

    /// Returns `true` if `extension` (case-insensitive, no dot) belongs to this driver.
    #[must_use]
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_status() {
        assert!(SupportStatus::Supported.is_supported());
        assert!(SupportStatus::Planned.is_available());
        assert!(!SupportStatus::Planned.is_supported());
        assert!(!SupportStatus::NotSupported.is_available());
        assert_eq!(SupportStatus::NotSupported.as_str(), "Not Supported");
    }

    #[test]
    fn test_matches_extension() {
        let driver = Driver::new(
            "GeoJSON",
            "GeoJSON",
            &["geojson", "json"],
            SupportStatus::Supported,
            SupportStatus::Supported,
        );
        assert!(driver.matches_extension("GeoJSON"));
        assert!(driver.matches_extension("json"));
        assert!(!driver.matches_extension("csv"));
        assert!(driver.capabilities.has_any_support());
    }
}
