//! Progress and diagnostics channel for the bulk operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::error::RecordError;

/// Receives progress, informational messages and per-record errors.
pub trait Feedback {
    /// An informational message about the current record.
    fn push_info(&mut self, message: &str);

    /// A record failed; the run continues.
    fn report_error(&mut self, error: &RecordError);

    /// Overall completion in percent (`0.0..=100.0`).
    fn set_progress(&mut self, percent: f64);

    /// Checked between records; `true` stops the run early.
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct LogFeedback {
    cancel: Option<Arc<AtomicBool>>,
}

impl LogFeedback {
    /// Create a feedback that is never canceled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe `flag`; setting it to `true` cancels the run.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

impl Feedback for LogFeedback {
    fn push_info(&mut self, message: &str) {
        info!("{message}");
    }

    fn report_error(&mut self, error: &RecordError) {
        warn!("{error}");
    }

    fn set_progress(&mut self, percent: f64) {
        debug!("Progress: {percent:.1}%");
    }

    fn is_canceled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let feedback = LogFeedback::new().with_cancel_flag(Arc::clone(&flag));
        assert!(!feedback.is_canceled());
        flag.store(true, Ordering::Relaxed);
        assert!(feedback.is_canceled());
        assert!(!LogFeedback::new().is_canceled());
    }
}
