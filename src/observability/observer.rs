//! Query lifecycle observer
//!
//! The service reports every request to a `QueryObserver`. Production runs
//! with `NoOpObserver`; tests inject `MemoryQueryObserver` and inspect what
//! was recorded.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use uuid::Uuid;

use crate::api::{ReadStats, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Started,
    Finished,
    Failed,
}

impl QueryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Started => "STARTED",
            QueryOutcome::Finished => "FINISHED",
            QueryOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed lifecycle step of a request
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub query_id: Uuid,
    pub timestamp: SystemTime,
    pub method: String,
    pub outcome: QueryOutcome,
    pub stats: ReadStats,
    pub status: StatusCode,
    pub error_message: Option<String>,
}

impl QueryRecord {
    pub fn new(query_id: Uuid, method: impl Into<String>, outcome: QueryOutcome) -> Self {
        Self {
            query_id,
            timestamp: SystemTime::now(),
            method: method.into(),
            outcome,
            stats: ReadStats::default(),
            status: StatusCode::Success,
            error_message: None,
        }
    }

    pub fn with_stats(mut self, stats: ReadStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_error(mut self, status: StatusCode, message: impl Into<String>) -> Self {
        self.status = status;
        self.error_message = Some(message.into());
        self
    }
}

/// Receives request lifecycle records; must not block
pub trait QueryObserver: Send + Sync {
    fn observe(&self, record: QueryRecord);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl QueryObserver for NoOpObserver {
    fn observe(&self, _record: QueryRecord) {}
}

/// In-memory observer for testing.
#[derive(Debug, Default, Clone)]
pub struct MemoryQueryObserver {
    records: Arc<Mutex<Vec<QueryRecord>>>,
}

impl MemoryQueryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<QueryRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueryObserver for MemoryQueryObserver {
    fn observe(&self, record: QueryRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
