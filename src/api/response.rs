//! Response types, pages and the in-band error envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::StatusCode;
use super::request::Split;
use super::types::Schema;

/// Logical outcome carried in every response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn success() -> Self {
        Self {
            status: StatusCode::Success,
            message: "succeeded".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Byte and row counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    pub rows: u64,
    pub bytes: u64,
}

impl ReadStats {
    pub fn add(&mut self, other: ReadStats) {
        self.rows += other.rows;
        self.bytes += other.bytes;
    }
}

/// Values of one column in a column-set page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValues {
    pub name: String,
    pub values: Vec<Value>,
}

/// JSON columnar page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSet {
    pub columns: Vec<ColumnValues>,
    pub row_count: u64,
}

/// Serialized page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePayload {
    /// One Arrow IPC stream: schema message followed by one record batch
    ArrowIpc(#[serde(with = "super::bytes")] Vec<u8>),
    ColumnSet(ColumnSet),
}

impl PagePayload {
    /// Serialized size on the wire
    pub fn byte_len(&self) -> usize {
        match self {
            PagePayload::ArrowIpc(bytes) => bytes.len(),
            PagePayload::ColumnSet(set) => serde_json::to_vec(set).map(|v| v.len()).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeTableResponse {
    #[serde(default)]
    pub schema: Option<Schema>,
    pub error: ErrorEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSplitsResponse {
    #[serde(default)]
    pub splits: Vec<Split>,
    pub error: ErrorEnvelope,
}

/// One page of one split, or the failure that ended the split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadSplitsResponse {
    #[serde(default)]
    pub split_id: u64,
    #[serde(default)]
    pub payload: Option<PagePayload>,
    /// Counters of this page
    #[serde(default)]
    pub stats: ReadStats,
    /// Counters of the split so far, this page included
    #[serde(default)]
    pub total: ReadStats,
    pub error: ErrorEnvelope,
}

impl ReadSplitsResponse {
    pub fn failure(split_id: u64, error: ErrorEnvelope, total: ReadStats) -> Self {
        Self {
            split_id,
            payload: None,
            stats: ReadStats::default(),
            total,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let envelope = ErrorEnvelope::success();
        assert!(envelope.is_success());
        assert_eq!(envelope.message, "succeeded");
    }

    #[test]
    fn test_stats_add() {
        let mut total = ReadStats::default();
        total.add(ReadStats { rows: 2, bytes: 16 });
        total.add(ReadStats { rows: 1, bytes: 8 });
        assert_eq!(total, ReadStats { rows: 3, bytes: 24 });
    }

    #[test]
    fn test_arrow_payload_json_is_base64() {
        let payload = PagePayload::ArrowIpc(vec![1, 2, 3]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["arrow_ipc"], "AQID");
        assert_eq!(payload.byte_len(), 3);
    }

    #[test]
    fn test_failure_response_has_no_payload() {
        let response = ReadSplitsResponse::failure(
            7,
            ErrorEnvelope {
                status: StatusCode::BadRequest,
                message: "limit".into(),
            },
            ReadStats::default(),
        );
        assert!(response.payload.is_none());
        assert_eq!(response.split_id, 7);
        assert!(!response.error.is_success());
    }
}
