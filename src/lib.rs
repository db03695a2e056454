//! fq-connector - a query-federation connector
//!
//! Serves DescribeTable, ListSplits and ReadSplits over heterogeneous data
//! sources, streaming typed columnar pages under paging and read limits.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod conversion;
pub mod datasource;
pub mod observability;
pub mod paging;
pub mod server;
pub mod streaming;
