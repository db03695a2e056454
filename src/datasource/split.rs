//! Split descriptions and partitioning policies
//!
//! A split's `description` bytes are opaque to the caller; backends in this
//! crate store a JSON `SplitDescription` there.

use serde::{Deserialize, Serialize};

use crate::api::{ConnectorError, ConnectorResult};
use crate::config::SplitPolicy;

/// Which rows of a select a split covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitDescription {
    WholeTable,
    /// Rows `offset..offset + limit` in table order
    RowRange { offset: u64, limit: u64 },
    /// Rows whose index is `index` modulo `count`
    Shard { index: u32, count: u32 },
    /// One object of an object store
    Object { key: String },
}

impl SplitDescription {
    pub fn encode(&self) -> ConnectorResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Empty bytes describe the whole table
    pub fn decode(bytes: &[u8]) -> ConnectorResult<Self> {
        if bytes.is_empty() {
            return Ok(SplitDescription::WholeTable);
        }
        serde_json::from_slice(bytes)
            .map_err(|e| ConnectorError::invalid_request(format!("split description: {}", e)))
    }

    /// Whether the row at `index` belongs to this split
    pub fn contains(&self, index: u64) -> bool {
        match self {
            SplitDescription::WholeTable | SplitDescription::Object { .. } => true,
            SplitDescription::RowRange { offset, limit } => {
                index >= *offset && index - offset < *limit
            }
            SplitDescription::Shard { index: shard, count } => {
                *count > 0 && index % u64::from(*count) == u64::from(*shard)
            }
        }
    }
}

/// Partitions a table of `row_count` rows.
///
/// A non-zero `max_split_count` caps the number of splits; an empty table
/// always yields one split so that reading it still returns its schema.
pub fn plan_splits(policy: SplitPolicy, row_count: u64, max_split_count: u32) -> Vec<SplitDescription> {
    match policy {
        SplitPolicy::WholeTable => vec![SplitDescription::WholeTable],
        SplitPolicy::BySize { rows_per_split } => {
            if row_count == 0 || rows_per_split == 0 {
                return vec![SplitDescription::WholeTable];
            }
            let mut limit = rows_per_split;
            if max_split_count > 0 {
                let min_limit = row_count.div_ceil(u64::from(max_split_count));
                limit = limit.max(min_limit);
            }
            (0..row_count)
                .step_by(limit as usize)
                .map(|offset| SplitDescription::RowRange { offset, limit })
                .collect()
        }
        SplitPolicy::FixedShards { shard_count } => {
            let mut count = shard_count.max(1);
            if max_split_count > 0 {
                count = count.min(max_split_count);
            }
            (0..count)
                .map(|index| SplitDescription::Shard { index, count })
                .collect()
        }
    }
}
