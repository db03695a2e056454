//! Wire model of the connector protocol
//!
//! Every RPC exchanged with the federation engine is expressed in terms of
//! the types in this module:
//!
//! - `types`: column schemas and wire types
//! - `request`: data source instances, selects, splits and RPC requests
//! - `expr`: the typed predicate language carried in `Select::filter`
//! - `response`: pages, statistics and the in-band error envelope
//! - `errors`: the closed error taxonomy and its status mapping

pub mod bytes;
mod errors;
mod expr;
mod request;
mod response;
mod types;

pub use errors::{ConnectorError, ConnectorResult, StatusCode};
pub use expr::{ArithmeticOp, ComparisonOp, Expression, Predicate, TypedValue};
pub use request::{
    Credentials, DataSourceInstance, DataSourceKind, DateTimeFormat, DescribeTableRequest,
    Endpoint, Filtering, Format, ListSplitsRequest, ReadSplitsRequest, Select, Split,
    TypeMappingSettings,
};
pub use response::{
    ColumnSet, ColumnValues, DescribeTableResponse, ErrorEnvelope, ListSplitsResponse,
    PagePayload, ReadSplitsResponse, ReadStats,
};
pub use types::{Column, PrimitiveType, Schema, WireType};
