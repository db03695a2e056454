//! Object storage data source
//!
//! Tables are CSV objects: the select's table names the object key and the
//! data source instance's database names the bucket.
//!
//! Without a predefined schema the first record is the header and every
//! column is `Optional<Utf8>`. A predefined schema describes headerless
//! objects positionally. Predicates are never pushed down.

mod store;
mod text;

pub use store::{LocalObjectStore, ObjectStore, StoreError, StoreResult};
pub use text::text_appender;

use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use tokio::sync::mpsc;

use super::filtering::{plan_pushdown, NoPushdown};
use super::split::SplitDescription;
use super::{DataSource, DataSourceFuture, SplitCandidate};
use crate::api::{
    Column, ConnectorError, ConnectorResult, DataSourceKind, DescribeTableRequest,
    ListSplitsRequest, PrimitiveType, ReadSplitsRequest, Schema, Select, Split, WireType,
};
use crate::context::RequestContext;
use crate::observability::MetricsRegistry;
use crate::paging::{RowTransformer, SinkFactory};

fn csv_error(key: &str, err: csv::Error) -> ConnectorError {
    ConnectorError::Conversion(format!("object {}: {}", key, err))
}

fn header_schema(header: &StringRecord) -> Schema {
    Schema::new(
        header
            .iter()
            .map(|name| {
                Column::new(
                    name,
                    WireType::optional(WireType::primitive(PrimitiveType::Utf8)),
                )
            })
            .collect(),
    )
}

pub struct ObjectStorageDataSource {
    store: Arc<dyn ObjectStore>,
    metrics: Arc<MetricsRegistry>,
}

impl ObjectStorageDataSource {
    pub fn new(store: Arc<dyn ObjectStore>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { store, metrics }
    }

    fn object(&self, bucket: &str, key: &str) -> ConnectorResult<Vec<u8>> {
        if key.is_empty() {
            return Err(ConnectorError::EmptyTableName);
        }
        Ok(self.store.read(bucket, key)?)
    }

    async fn scan(
        &self,
        ctx: &RequestContext,
        request: &ReadSplitsRequest,
        split: &Split,
        sink_factory: &SinkFactory,
    ) -> ConnectorResult<()> {
        let select = &split.select;
        let plan = plan_pushdown(ctx, select.filter.as_ref(), request.filtering, &NoPushdown)?;
        for _ in &plan.dropped {
            self.metrics.increment_pushdown_drops();
        }

        let key = match SplitDescription::decode(&split.description)? {
            SplitDescription::Object { key } => key,
            SplitDescription::WholeTable => select.table.clone(),
            other => {
                return Err(ConnectorError::invalid_request(format!(
                    "object storage cannot read split {:?}",
                    other
                )))
            }
        };
        let content = self.object(&select.data_source_instance.database, &key)?;

        let mut reader = ReaderBuilder::new()
            .has_headers(select.predefined_schema.is_none())
            .from_reader(content.as_slice());
        let schema = match &select.predefined_schema {
            Some(schema) => schema.clone(),
            None => header_schema(reader.headers().map_err(|e| csv_error(&key, e))?),
        };

        let mut appenders = Vec::with_capacity(select.what.len());
        let mut wanted = Vec::with_capacity(select.what.len());
        for column in &select.what {
            let index = schema.position(&column.name).ok_or_else(|| {
                ConnectorError::invalid_request(format!(
                    "column {} does not exist in object {}",
                    column.name, key
                ))
            })?;
            appenders.push(text_appender(&column.wire_type)?);
            wanted.push(index);
        }
        let width = schema.len();
        let mut transformer = RowTransformer::new(vec![String::new(); width], appenders, wanted)?;
        let mut sink = sink_factory.make_sink()?;

        let mut record = StringRecord::new();
        while reader
            .read_record(&mut record)
            .map_err(|e| csv_error(&key, e))?
        {
            if record.len() != width {
                return Err(ConnectorError::Conversion(format!(
                    "object {}: record of {} fields, expected {}",
                    key,
                    record.len(),
                    width
                )));
            }
            for (acceptor, field) in transformer.acceptors_mut().iter_mut().zip(record.iter()) {
                acceptor.clear();
                acceptor.push_str(field);
            }
            sink.add_row(&transformer).await?;
        }

        sink.finish().await
    }
}

impl DataSource for ObjectStorageDataSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::ObjectStorage
    }

    fn describe_table<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        request: &'a DescribeTableRequest,
    ) -> DataSourceFuture<'a, Schema> {
        Box::pin(async move {
            let content = self.object(&request.data_source_instance.database, &request.table)?;
            let mut reader = ReaderBuilder::new().from_reader(content.as_slice());
            let header = reader
                .headers()
                .map_err(|e| csv_error(&request.table, e))?;
            Ok(header_schema(header))
        })
    }

    fn list_splits<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _request: &'a ListSplitsRequest,
        select: &'a Select,
        results: &'a mpsc::Sender<SplitCandidate>,
    ) -> DataSourceFuture<'a, ()> {
        Box::pin(async move {
            if select.table.is_empty() {
                return Err(ConnectorError::EmptyTableName);
            }
            if !self
                .store
                .exists(&select.data_source_instance.database, &select.table)?
            {
                return Err(ConnectorError::TableNotFound(select.table.clone()));
            }
            let description = SplitDescription::Object {
                key: select.table.clone(),
            };
            let candidate = SplitCandidate {
                select: select.clone(),
                description: description.encode()?,
            };
            results
                .send(candidate)
                .await
                .map_err(|_| ConnectorError::Cancelled)
        })
    }

    fn read_split<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: &'a ReadSplitsRequest,
        split: &'a Split,
        sink_factory: &'a SinkFactory,
    ) -> DataSourceFuture<'a, ()> {
        Box::pin(self.scan(ctx, request, split, sink_factory))
    }
}
