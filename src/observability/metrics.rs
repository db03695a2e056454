//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::api::StatusCode;

/// Operational counters of the connector
///
/// All counters use Relaxed ordering; readers only need eventual values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    describe_table_requests: AtomicU64,
    list_splits_requests: AtomicU64,
    read_splits_requests: AtomicU64,

    bad_request_failures: AtomicU64,
    not_found_failures: AtomicU64,
    unsupported_failures: AtomicU64,
    internal_failures: AtomicU64,
    cancelled_requests: AtomicU64,

    splits_listed: AtomicU64,
    splits_read: AtomicU64,
    pages_sent: AtomicU64,
    rows_sent: AtomicU64,
    bytes_sent: AtomicU64,

    read_limit_rejections: AtomicU64,
    pushdown_drops: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Requests

    pub fn increment_describe_table(&self) {
        self.describe_table_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_list_splits(&self) {
        self.list_splits_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_read_splits(&self) {
        self.read_splits_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a failed request under its status class
    pub fn record_failure(&self, status: StatusCode) {
        let counter = match status {
            StatusCode::Success => return,
            StatusCode::BadRequest => &self.bad_request_failures,
            StatusCode::NotFound => &self.not_found_failures,
            StatusCode::Unsupported => &self.unsupported_failures,
            StatusCode::InternalError => &self.internal_failures,
            StatusCode::Cancelled => &self.cancelled_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    // Data flow

    pub fn add_splits_listed(&self, count: u64) {
        self.splits_listed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_splits_read(&self) {
        self.splits_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one page handed to the transport
    pub fn record_page(&self, rows: u64, bytes: u64) {
        self.pages_sent.fetch_add(1, Ordering::Relaxed);
        self.rows_sent.fetch_add(rows, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_read_limit_rejections(&self) {
        self.read_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pushdown_drops(&self) {
        self.pushdown_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            describe_table_requests: self.describe_table_requests.load(Ordering::Relaxed),
            list_splits_requests: self.list_splits_requests.load(Ordering::Relaxed),
            read_splits_requests: self.read_splits_requests.load(Ordering::Relaxed),
            bad_request_failures: self.bad_request_failures.load(Ordering::Relaxed),
            not_found_failures: self.not_found_failures.load(Ordering::Relaxed),
            unsupported_failures: self.unsupported_failures.load(Ordering::Relaxed),
            internal_failures: self.internal_failures.load(Ordering::Relaxed),
            cancelled_requests: self.cancelled_requests.load(Ordering::Relaxed),
            splits_listed: self.splits_listed.load(Ordering::Relaxed),
            splits_read: self.splits_read.load(Ordering::Relaxed),
            pages_sent: self.pages_sent.load(Ordering::Relaxed),
            rows_sent: self.rows_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            read_limit_rejections: self.read_limit_rejections.load(Ordering::Relaxed),
            pushdown_drops: self.pushdown_drops.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub describe_table_requests: u64,
    pub list_splits_requests: u64,
    pub read_splits_requests: u64,
    pub bad_request_failures: u64,
    pub not_found_failures: u64,
    pub unsupported_failures: u64,
    pub internal_failures: u64,
    pub cancelled_requests: u64,
    pub splits_listed: u64,
    pub splits_read: u64,
    pub pages_sent: u64,
    pub rows_sent: u64,
    pub bytes_sent: u64,
    pub read_limit_rejections: u64,
    pub pushdown_drops: u64,
}
