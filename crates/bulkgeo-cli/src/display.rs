//! Display utilities for formatting CLI output.

use tabled::{Table, Tabled};

use bulkgeo_core::drivers::Driver;
use bulkgeo_core::types::BulkReport;

/// Table row representation for displaying driver information.
#[derive(Tabled)]
pub struct DriverRow {
    /// Short identifier for the driver (e.g., `GeoJSON`, `CSV`).
    #[tabled(rename = "Short Name")]
    pub short_name: String,
    /// Full descriptive name of the driver format.
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    /// Support status for reading records from this format.
    #[tabled(rename = "Read")]
    pub read: String,
    /// Support status for writing resolved features to this format.
    #[tabled(rename = "Write")]
    pub write: String,
}

impl From<&Driver> for DriverRow {
    fn from(driver: &Driver) -> Self {
        Self {
            short_name: driver.short_name.to_string(),
            long_name: driver.long_name.to_string(),
            read: driver.capabilities.read.as_str().to_string(),
            write: driver.capabilities.write.as_str().to_string(),
        }
    }
}

/// Table row summarizing a bulk run.
#[derive(Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Output")]
    pub destination: String,
    #[tabled(rename = "Records")]
    pub processed: usize,
    #[tabled(rename = "Features")]
    pub emitted: usize,
    #[tabled(rename = "No Match")]
    pub no_match: usize,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&BulkReport> for SummaryRow {
    fn from(report: &BulkReport) -> Self {
        Self {
            destination: report.destination.clone(),
            processed: report.processed,
            emitted: report.emitted,
            no_match: report.no_match,
            failed: report.failed,
            status: if report.canceled {
                "Canceled"
            } else {
                "Completed"
            }
            .to_string(),
        }
    }
}

/// Render drivers as a table.
pub fn drivers_table(drivers: &[Driver]) -> String {
    Table::new(drivers.iter().map(DriverRow::from)).to_string()
}

/// Render a run summary as a one-row table.
pub fn summary_table(report: &BulkReport) -> String {
    Table::new([SummaryRow::from(report)]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkgeo_core::drivers::find_driver;

    #[test]
    fn test_driver_row_creation() {
        let row = DriverRow::from(&find_driver("GeoJSONSeq").unwrap());
        assert_eq!(row.short_name, "GeoJSONSeq");
        assert_eq!(row.read, "Supported");
        assert_eq!(row.write, "Planned");
    }

    #[test]
    fn test_drivers_table_has_header() {
        let table = drivers_table(&[find_driver("CSV").unwrap()]);
        assert!(table.contains("Short Name"));
        assert!(table.contains("Comma Separated Value"));
    }

    #[test]
    fn test_summary_row() {
        let report = BulkReport {
            destination: "out.geojson".to_string(),
            processed: 3,
            emitted: 4,
            no_match: 1,
            failed: 0,
            canceled: true,
        };
        let row = SummaryRow::from(&report);
        assert_eq!(row.status, "Canceled");
        assert_eq!(row.emitted, 4);

        let table = summary_table(&report);
        assert!(table.contains("No Match"));
        assert!(table.contains("out.geojson"));
    }
}
