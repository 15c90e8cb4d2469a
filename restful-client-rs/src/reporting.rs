//! Failure reporting
//!
//! A `Reporter` is told about every reportable failure (timeouts, missing
//! responses, server errors, undecodable bodies) and about services being
//! taken down. Reporting is fire-and-forget: the engine dispatches through
//! `dispatch_report`, which contains a panicking reporter.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::ServiceError;

/// Report kind for request failures
pub const REST_ERROR: &str = "RestError";

/// Report kind for a service being taken down by the health tracker
pub const CIRCUIT_BREAKER: &str = "CircuitBreaker";

/// Sink for structured failure events
pub trait Reporter: Send + Sync {
    fn report(&self, kind: &str, description: &str, cause: Option<&ServiceError>);
}

/// Send a report without letting a reporter failure reach the caller
pub(crate) fn dispatch_report(
    reporter: &dyn Reporter,
    kind: &str,
    description: &str,
    cause: Option<&ServiceError>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| reporter.report(kind, description, cause)));
    if outcome.is_err() {
        log::error!("Reporter panicked while reporting {}: {}", kind, description);
    }
}

/// Reporter that writes to the log. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, kind: &str, description: &str, cause: Option<&ServiceError>) {
        match cause {
            Some(cause) => log::error!("[{}] {} (cause: {})", kind, description, cause),
            None => log::error!("[{}] {}", kind, description),
        }
    }
}

/// Reporter that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _kind: &str, _description: &str, _cause: Option<&ServiceError>) {}
}

/// Adapts a closure into a reporter, e.g. to forward into an alerting pipeline
pub struct FnReporter<F>(pub F);

impl<F> Reporter for FnReporter<F>
where
    F: Fn(&str, &str, Option<&ServiceError>) + Send + Sync,
{
    fn report(&self, kind: &str, description: &str, cause: Option<&ServiceError>) {
        (self.0)(kind, description, cause)
    }
}

/// One recorded report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvent {
    pub kind: String,
    pub description: String,
    pub cause: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Reporter that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded events of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, kind: &str, description: &str, cause: Option<&ServiceError>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ReportEvent {
                kind: kind.to_string(),
                description: description.to_string(),
                cause: cause.map(|c| c.to_string()),
                timestamp: Utc::now(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct PanickingReporter;

    impl Reporter for PanickingReporter {
        fn report(&self, _kind: &str, _description: &str, _cause: Option<&ServiceError>) {
            panic!("alerting pipeline is down");
        }
    }

    #[test]
    fn test_panicking_reporter_is_contained() {
        dispatch_report(&PanickingReporter, REST_ERROR, "boom", None);
    }

    #[test]
    fn test_fn_reporter_forwards() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let reporter = FnReporter(move |kind: &str, _: &str, _: Option<&ServiceError>| {
            assert_eq!(kind, REST_ERROR);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        dispatch_report(&reporter, REST_ERROR, "timeout", None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_memory_reporter_records_cause() {
        let reporter = MemoryReporter::new();
        let cause = ServiceError::timeout("slow");
        reporter.report(REST_ERROR, "TimeoutOccured for: GET", Some(&cause));
        reporter.report(CIRCUIT_BREAKER, "posts went down", None);

        assert_eq!(reporter.count(REST_ERROR), 1);
        assert_eq!(reporter.count(CIRCUIT_BREAKER), 1);
        assert_eq!(
            reporter.events()[0].cause.as_deref(),
            Some("Timeout error: slow")
        );
    }
}
