//! Read Limiter
//!
//! Admission control bounding the rows one request may read, shared by all
//! splits of the request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::api::{ConnectorError, ConnectorResult};
use crate::config::ReadLimitConfig;
use crate::observability::{Event, Logger};

#[derive(Debug, Clone)]
pub struct ReadLimiter {
    limit: Option<u64>,
    rows: Arc<AtomicU64>,
}

impl ReadLimiter {
    /// Limiter that accepts every row
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            rows: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_limit(rows: u64) -> Self {
        Self {
            limit: Some(rows),
            rows: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counts one row, failing once the limit has been reached
    pub fn add_row(&self) -> ConnectorResult<()> {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        self.rows
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| ConnectorError::ReadLimitExceeded(limit))
    }

}

/// Builds one limiter per request
#[derive(Debug, Clone, Default)]
pub struct ReadLimiterFactory {
    config: Option<ReadLimitConfig>,
}

impl ReadLimiterFactory {
    pub fn new(config: Option<ReadLimitConfig>) -> Self {
        Self { config }
    }

    pub fn make_read_limiter(&self, query_id: &str) -> ReadLimiter {
        match &self.config {
            Some(config) => {
                let rows = config.rows.to_string();
                Logger::warn(
                    Event::ReadLimitEnabled.as_str(),
                    &[("query_id", query_id), ("rows", &rows)],
                );
                ReadLimiter::with_limit(config.rows)
            }
            None => ReadLimiter::unlimited(),
        }
    }
}
