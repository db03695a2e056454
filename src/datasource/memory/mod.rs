//! Memory data source
//!
//! Serves tables of an embedded catalog. Supports predicate pushdown and
//! all split policies.

mod catalog;
mod evaluator;
mod type_mapping;

pub use catalog::{CatalogColumn, MemoryCatalog, NativeType, Table};
pub use evaluator::{MemoryPredicateSupport, PredicateEvaluator};
pub use type_mapping::{appender_for, wire_type};

use std::sync::Arc;

use tokio::sync::mpsc;

use super::filtering::{plan_pushdown, NoPushdown, PredicateSupport};
use super::split::{plan_splits, SplitDescription};
use super::{DataSource, DataSourceFuture, SplitCandidate};
use crate::api::{
    ConnectorError, ConnectorResult, DataSourceKind, DescribeTableRequest, ListSplitsRequest,
    ReadSplitsRequest, Schema, Select, Split,
};
use crate::config::MemoryConfig;
use crate::context::RequestContext;
use crate::observability::MetricsRegistry;
use crate::paging::{NativeValue, RowTransformer, SinkFactory};

pub struct MemoryDataSource {
    catalog: Arc<MemoryCatalog>,
    config: MemoryConfig,
    metrics: Arc<MetricsRegistry>,
}

impl MemoryDataSource {
    pub fn new(catalog: MemoryCatalog, config: MemoryConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config,
            metrics,
        }
    }

    pub fn catalog(&self) -> &MemoryCatalog {
        &self.catalog
    }

    fn transformer(table: &Table, select: &Select) -> ConnectorResult<RowTransformer<NativeValue>> {
        let mut appenders = Vec::with_capacity(select.what.len());
        let mut wanted = Vec::with_capacity(select.what.len());
        for column in &select.what {
            let index = table.position(&column.name).ok_or_else(|| {
                ConnectorError::invalid_request(format!(
                    "column {} does not exist in table {}",
                    column.name, table.name
                ))
            })?;
            appenders.push(appender_for(
                table.columns[index].native_type,
                &column.wire_type,
            )?);
            wanted.push(index);
        }
        RowTransformer::new(
            vec![NativeValue::Null; table.columns.len()],
            appenders,
            wanted,
        )
    }

    async fn scan(
        &self,
        ctx: &RequestContext,
        request: &ReadSplitsRequest,
        split: &Split,
        sink_factory: &SinkFactory,
    ) -> ConnectorResult<()> {
        let table = self.catalog.table(&split.select.table)?;

        let support: Box<dyn PredicateSupport + '_> = if self.config.pushdown.enabled {
            Box::new(MemoryPredicateSupport::new(table))
        } else {
            Box::new(NoPushdown)
        };
        let plan = plan_pushdown(
            ctx,
            split.select.filter.as_ref(),
            request.filtering,
            support.as_ref(),
        )?;
        for _ in &plan.dropped {
            self.metrics.increment_pushdown_drops();
        }
        let filter = plan
            .predicate
            .map(|p| PredicateEvaluator::new(table, p))
            .transpose()?;

        let description = SplitDescription::decode(&split.description)?;
        let mut transformer = Self::transformer(table, &split.select)?;
        let mut sink = sink_factory.make_sink()?;

        for (index, row) in table.rows().iter().enumerate() {
            if sink_factory.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }
            if !description.contains(index as u64) {
                continue;
            }
            if let Some(filter) = &filter {
                if !filter.matches(row)? {
                    continue;
                }
            }
            transformer.set_acceptors(row)?;
            sink.add_row(&transformer).await?;
        }

        sink.finish().await
    }
}

impl DataSource for MemoryDataSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::Memory
    }

    fn describe_table<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        request: &'a DescribeTableRequest,
    ) -> DataSourceFuture<'a, Schema> {
        Box::pin(async move {
            let table = self.catalog.table(&request.table)?;
            let columns = table
                .columns
                .iter()
                .map(|c| {
                    crate::api::Column::new(
                        c.name.clone(),
                        wire_type(c, &request.type_mapping_settings),
                    )
                })
                .collect();
            Ok(Schema::new(columns))
        })
    }

    fn list_splits<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        request: &'a ListSplitsRequest,
        select: &'a Select,
        results: &'a mpsc::Sender<SplitCandidate>,
    ) -> DataSourceFuture<'a, ()> {
        Box::pin(async move {
            let table = self.catalog.table(&select.table)?;
            let descriptions =
                plan_splits(self.config.splitting, table.row_count(), request.max_split_count);
            for description in descriptions {
                let candidate = SplitCandidate {
                    select: select.clone(),
                    description: description.encode()?,
                };
                results
                    .send(candidate)
                    .await
                    .map_err(|_| ConnectorError::Cancelled)?;
            }
            Ok(())
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
