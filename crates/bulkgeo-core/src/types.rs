//! Data types describing the outcome of a bulk run.

/// Summary of a bulk forward or reverse run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Destination identifier returned by the sink
    pub destination: String,
    /// Records taken from the source
    pub processed: usize,
    /// Output features written
    pub emitted: usize,
    /// Records for which the resolver found nothing
    pub no_match: usize,
    /// Records that failed for any other reason
    pub failed: usize,
    /// Whether the run stopped early because it was canceled
    pub canceled: bool,
}

impl BulkReport {
    /// Records that produced at least one feature without failing.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.processed
            .saturating_sub(self.no_match)
            .saturating_sub(self.failed)
    }
}
