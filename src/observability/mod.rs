//! Observability subsystem
//!
//! - Structured logging (JSON)
//! - Counter metrics
//! - Scoped begin/complete tracing of requests
//! - Query lifecycle observers
//!
//! Observability is read-only: nothing here changes how a request executes.
//!
//! ```ignore
//! use fq_connector::observability::{Event, Logger, ObservationScope};
//!
//! Logger::info(Event::SplitReadBegin.as_str(), &[("split_id", "0")]);
//!
//! let scope = ObservationScope::new("READ_SPLITS", &[("query_id", "q")]);
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod observer;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use observer::{MemoryQueryObserver, NoOpObserver, QueryObserver, QueryOutcome, QueryRecord};
pub use scope::ObservationScope;

/// Log a lifecycle event with fields
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    if event.is_fatal() {
        Logger::fatal(event.as_str(), fields);
    } else {
        Logger::info(event.as_str(), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::BootStart, &[]);
        log_event(Event::ConfigLoaded, &[("path", "/tmp/fq.json")]);
    }
}
