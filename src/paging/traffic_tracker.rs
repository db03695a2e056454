//! Traffic Tracker
//!
//! Counts the rows and estimated bytes of the page being filled and of the
//! whole split, and decides whether the next row still fits into the page.

use super::acceptor::Acceptor;
use super::size::RowSizeEstimator;
use crate::api::{ConnectorError, ConnectorResult, ReadStats};
use crate::config::{PagingConfig, MAX_INTERCONNECT_MESSAGE_SIZE};

#[derive(Debug)]
pub struct TrafficTracker {
    estimator: RowSizeEstimator,
    bytes_per_page: u64,
    /// Zero means unlimited
    rows_per_page: u64,
    page: ReadStats,
    total: ReadStats,
}

impl TrafficTracker {
    pub fn new(config: &PagingConfig) -> Self {
        let bytes_per_page = match config.bytes_per_page {
            0 => MAX_INTERCONNECT_MESSAGE_SIZE,
            n => n.min(MAX_INTERCONNECT_MESSAGE_SIZE),
        };
        Self {
            estimator: RowSizeEstimator::new(),
            bytes_per_page,
            rows_per_page: config.rows_per_page,
            page: ReadStats::default(),
            total: ReadStats::default(),
        }
    }

    /// Accounts the row if it fits into the current page.
    ///
    /// Returns `Ok(false)` when the page must be flushed first; a row that
    /// cannot fit even into an empty page is `PageSizeExceeded`.
    pub fn try_add_row<A: Acceptor>(&mut self, row: &[A]) -> ConnectorResult<bool> {
        let row_bytes = self.estimator.estimate(row);

        if row_bytes > self.bytes_per_page {
            return Err(ConnectorError::PageSizeExceeded {
                row_bytes,
                page_bytes: self.bytes_per_page,
            });
        }
        if self.page.bytes + row_bytes > self.bytes_per_page {
            return Ok(false);
        }
        if self.rows_per_page > 0 && self.page.rows + 1 > self.rows_per_page {
            return Ok(false);
        }

        let delta = ReadStats {
            rows: 1,
            bytes: row_bytes,
        };
        self.page.add(delta);
        self.total.add(delta);
        Ok(true)
    }

    /// Counters of the current page
    pub fn page_stats(&self) -> ReadStats {
        self.page
    }

    /// Counters of every row accounted so far
    pub fn total_stats(&self) -> ReadStats {
        self.total
    }

    /// Starts a new page
    pub fn refresh(&mut self) {
        self.page = ReadStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::acceptor::NativeValue;

    fn row(n: i64) -> Vec<NativeValue> {
        vec![NativeValue::Int64(n)]
    }

    #[test]
    fn test_rows_threshold() {
        let mut tracker = TrafficTracker::new(&PagingConfig::with_rows_per_page(2));
        assert!(tracker.try_add_row(&row(1)).unwrap());
        assert!(tracker.try_add_row(&row(2)).unwrap());
        assert!(!tracker.try_add_row(&row(3)).unwrap());
        assert_eq!(tracker.page_stats(), ReadStats { rows: 2, bytes: 16 });

        tracker.refresh();
        assert!(tracker.try_add_row(&row(3)).unwrap());
        assert_eq!(tracker.page_stats().rows, 1);
        assert_eq!(tracker.total_stats(), ReadStats { rows: 3, bytes: 24 });
    }

    #[test]
    fn test_bytes_threshold() {
        let config = PagingConfig {
            bytes_per_page: 20,
            rows_per_page: 0,
            prefetch_queue_capacity: 1,
        };
        let mut tracker = TrafficTracker::new(&config);
        assert!(tracker.try_add_row(&row(1)).unwrap());
        assert!(tracker.try_add_row(&row(2)).unwrap());
        assert!(!tracker.try_add_row(&row(3)).unwrap());
        assert!(tracker.page_stats().bytes <= 20);
    }

    #[test]
    fn test_single_row_larger_than_page() {
        let config = PagingConfig {
            bytes_per_page: 4,
            rows_per_page: 0,
            prefetch_queue_capacity: 1,
        };
        let mut tracker = TrafficTracker::new(&config);
        let err = tracker
            .try_add_row(&[NativeValue::Text("too long".into())])
            .unwrap_err();
        assert!(matches!(err, ConnectorError::PageSizeExceeded { row_bytes: 8, page_bytes: 4 }));
    }

    #[test]
    fn test_interconnect_ceiling_applies_without_byte_threshold() {
        let mut tracker = TrafficTracker::new(&PagingConfig {
            bytes_per_page: 0,
            rows_per_page: 10,
            prefetch_queue_capacity: 1,
        });
        let huge = "x".repeat(MAX_INTERCONNECT_MESSAGE_SIZE as usize + 1);
        assert!(tracker.try_add_row(&[huge]).is_err());
    }
}
