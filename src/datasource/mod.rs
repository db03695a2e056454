//! Data Sources
//!
//! A data source knows how to describe, partition and scan one kind of
//! backing store. The service reaches it through `DataSourceCollection`.
//!
//! - `filtering`: predicate pushdown policy shared by all backends
//! - `split`: split descriptions and partitioning policies
//! - `memory`: embedded relational catalog
//! - `object_storage`: CSV objects in an object store

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::api::{
    ConnectorResult, DataSourceKind, DescribeTableRequest, ListSplitsRequest, ReadSplitsRequest,
    Schema, Select, Split,
};
use crate::context::RequestContext;
use crate::paging::SinkFactory;

mod collection;
pub mod filtering;
pub mod memory;
pub mod object_storage;
pub mod split;

pub use collection::DataSourceCollection;
pub use filtering::{plan_pushdown, NoPushdown, PredicateSupport, PushdownPlan};
pub use memory::{MemoryCatalog, MemoryDataSource};
pub use object_storage::{LocalObjectStore, ObjectStorageDataSource, ObjectStore};

/// Boxed future returned by data source operations
pub type DataSourceFuture<'a, T> = Pin<Box<dyn Future<Output = ConnectorResult<T>> + Send + 'a>>;

/// One split produced by `list_splits`, before the streamer assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidate {
    pub select: Select,
    pub description: Vec<u8>,
}

/// A backing store the connector can read from
pub trait DataSource: Send + Sync {
    fn kind(&self) -> DataSourceKind;

    /// Schema of a table; `TableNotFound` when absent
    fn describe_table<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a DescribeTableRequest,
    ) -> DataSourceFuture<'a, Schema>;

    /// Pushes the splits of `select` into `results` as they are computed
    fn list_splits<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a ListSplitsRequest,
        select: &'a Select,
        results: &'a mpsc::Sender<SplitCandidate>,
    ) -> DataSourceFuture<'a, ()>;

    /// Scans one split into the single sink obtained from `sink_factory`.
    ///
    /// Returns once the sink is finished or the read failed; the caller
    /// delivers the outcome to the consumer.
    fn read_split<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a ReadSplitsRequest,
        split: &'a Split,
        sink_factory: &'a SinkFactory,
    ) -> DataSourceFuture<'a, ()>;
}
