//! # Connector Errors
//!
//! The closed set of logical failures a request can end with, and their
//! mapping onto the protocol status codes carried in every response.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::response::ErrorEnvelope;

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Protocol status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Success,
    BadRequest,
    NotFound,
    Unsupported,
    InternalError,
    Cancelled,
}

impl StatusCode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::BadRequest => "BAD_REQUEST",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Unsupported => "UNSUPPORTED",
            StatusCode::InternalError => "INTERNAL_ERROR",
            StatusCode::Cancelled => "CANCELLED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connector errors
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    // ==================
    // Not Found
    // ==================
    /// Target table or object is absent
    #[error("table does not exist: {0}")]
    TableNotFound(String),

    // ==================
    // Request Errors
    // ==================
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("empty table name")]
    EmptyTableName,

    /// Admission control rejected further rows for this request
    #[error("can read only {0} line(s) from data source per request")]
    ReadLimitExceeded(u64),

    // ==================
    // Unsupported
    // ==================
    #[error("unsupported data source type: {0}")]
    DataSourceNotSupported(String),

    #[error("data type not supported: {0}")]
    DataTypeNotSupported(String),

    #[error("data type mismatch: {0}")]
    DataTypeMismatch(String),

    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    #[error("method not supported: {0}")]
    MethodNotSupported(String),

    /// Column-level; appenders recover it as a NULL
    #[error("value out of type bounds: {0}")]
    ValueOutOfTypeBounds(String),

    // ==================
    // Internal Errors
    // ==================
    #[error("page size exceeded: row of {row_bytes} bytes does not fit into a page of {page_bytes} bytes")]
    PageSizeExceeded { row_bytes: u64, page_bytes: u64 },

    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Backend connectivity or protocol failure
    #[error("data source failure: {0}")]
    Backend(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Protocol status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ConnectorError::TableNotFound(_) => StatusCode::NotFound,
            ConnectorError::InvalidRequest(_)
            | ConnectorError::EmptyTableName
            | ConnectorError::ReadLimitExceeded(_) => StatusCode::BadRequest,
            ConnectorError::DataSourceNotSupported(_)
            | ConnectorError::DataTypeNotSupported(_)
            | ConnectorError::DataTypeMismatch(_)
            | ConnectorError::UnsupportedPredicate(_)
            | ConnectorError::MethodNotSupported(_)
            | ConnectorError::ValueOutOfTypeBounds(_) => StatusCode::Unsupported,
            ConnectorError::PageSizeExceeded { .. }
            | ConnectorError::Conversion(_)
            | ConnectorError::Backend(_)
            | ConnectorError::InvariantViolation(_)
            | ConnectorError::Internal(_) => StatusCode::InternalError,
            ConnectorError::Cancelled => StatusCode::Cancelled,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::Backend(_) | ConnectorError::Cancelled)
    }

    /// Whether this is the column-level out-of-bounds condition
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, ConnectorError::ValueOutOfTypeBounds(_))
    }

    /// In-band envelope for this error
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            status: self.status(),
            message: self.to_string(),
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        ConnectorError::InvalidRequest(reason.into())
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        ConnectorError::Backend(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        ConnectorError::Internal(reason.into())
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        ConnectorError::InvariantViolation(reason.into())
    }
}

impl From<arrow::error::ArrowError> for ConnectorError {
    fn from(err: arrow::error::ArrowError) -> Self {
        ConnectorError::Internal(format!("arrow: {}", err))
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Internal(format!("json: {}", err))
    }
}
