//! Connector service
//!
//! Implements the three RPCs on top of the data source collection. Every
//! request gets a `RequestContext`, an observation scope and observer
//! records; logical failures are answered in-band, transport failures are
//! returned to the caller.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::validate::{normalize_read_splits, validate_describe_table, validate_list_splits};
use crate::api::{
    ConnectorError, ConnectorResult, DescribeTableRequest, DescribeTableResponse, ErrorEnvelope,
    Format, ListSplitsRequest, ListSplitsResponse, ReadSplitsRequest, ReadSplitsResponse,
    ReadStats, Schema,
};
use crate::config::{ConfigResult, PagingConfig, ServerConfig};
use crate::context::RequestContext;
use crate::datasource::DataSourceCollection;
use crate::observability::{
    MetricsRegistry, NoOpObserver, ObservationScope, QueryObserver, QueryOutcome, QueryRecord,
};
use crate::paging::ReadLimiterFactory;
use crate::streaming::{ListSplitsStreamer, ReadSplitStreamer};

pub struct ConnectorService {
    sources: DataSourceCollection,
    paging: PagingConfig,
    default_format: Format,
    read_limiters: ReadLimiterFactory,
    metrics: Arc<MetricsRegistry>,
    observer: Arc<dyn QueryObserver>,
}

impl ConnectorService {
    pub fn new(
        config: &ServerConfig,
        sources: DataSourceCollection,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            sources,
            paging: config.paging,
            default_format: config.response_format_default,
            read_limiters: ReadLimiterFactory::new(config.read_limit),
            metrics,
            observer: Arc::new(NoOpObserver),
        }
    }

    /// Builds every configured data source
    pub fn from_config(config: &ServerConfig) -> ConfigResult<Self> {
        let metrics = Arc::new(MetricsRegistry::new());
        let sources = DataSourceCollection::from_config(&config.datasources, metrics.clone())?;
        Ok(Self::new(config, sources, metrics))
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn sources(&self) -> &DataSourceCollection {
        &self.sources
    }

    // ==================
    // DescribeTable
    // ==================

    pub async fn describe_table(&self, request: DescribeTableRequest) -> DescribeTableResponse {
        self.metrics.increment_describe_table();
        let ctx = RequestContext::new("describe_table")
            .with_annotation(
                "data_source_kind",
                request.data_source_instance.kind.as_str(),
            )
            .with_annotation("table", request.table.as_str());
        let scope = self.begin(&ctx, "DESCRIBE_TABLE");

        match self.describe(&ctx, &request).await {
            Ok(schema) => {
                self.end(&ctx, scope, ReadStats::default(), None);
                DescribeTableResponse {
                    schema: Some(schema),
                    error: ErrorEnvelope::success(),
                }
            }
            Err(err) => {
                let error = err.to_envelope();
                self.end(&ctx, scope, ReadStats::default(), Some(&err));
                DescribeTableResponse {
                    schema: None,
                    error,
                }
            }
        }
    }

    async fn describe(
        &self,
        ctx: &RequestContext,
        request: &DescribeTableRequest,
    ) -> ConnectorResult<Schema> {
        validate_describe_table(request)?;
        let source = self.sources.get(request.data_source_instance.kind)?;
        source.describe_table(ctx, request).await
    }

    // ==================
    // ListSplits
    // ==================

    /// Streams the splits of every select. `Err` means `out` closed.
    pub async fn list_splits(
        &self,
        request: ListSplitsRequest,
        out: &mpsc::Sender<ListSplitsResponse>,
    ) -> ConnectorResult<()> {
        self.metrics.increment_list_splits();
        let ctx = RequestContext::new("list_splits");
        let scope = self.begin(&ctx, "LIST_SPLITS");

        let result = self.list(&ctx, request, out).await;
        self.settle(&ctx, scope, ReadStats::default(), result)
    }

    async fn list(
        &self,
        ctx: &RequestContext,
        request: ListSplitsRequest,
        out: &mpsc::Sender<ListSplitsResponse>,
    ) -> ConnectorResult<Option<ConnectorError>> {
        if let Err(err) = validate_list_splits(&request) {
            return reject_listing(out, err).await;
        }

        let request = Arc::new(request);
        let mut next_id = 0;
        for select in &request.selects {
            let kind = select.data_source_instance.kind;
            let source = match self.sources.get(kind) {
                Ok(source) => source,
                Err(err) => return reject_listing(out, err).await,
            };
            let select_ctx = ctx
                .clone()
                .with_annotation("data_source_kind", kind.as_str())
                .with_annotation("table", select.table.as_str());
            let streamer = ListSplitsStreamer::new(
                source,
                select_ctx,
                request.clone(),
                select.clone(),
                self.metrics.clone(),
            );
            let outcome = streamer.run(next_id, out).await?;
            if outcome.error.is_some() {
                return Ok(outcome.error);
            }
            next_id = outcome.next_id;
        }
        Ok(None)
    }

    // ==================
    // ReadSplits
    // ==================

    /// Streams the pages of every split, one split after another. `Err`
    /// means `out` closed.
    pub async fn read_splits(
        &self,
        request: ReadSplitsRequest,
        out: &mpsc::Sender<ReadSplitsResponse>,
    ) -> ConnectorResult<()> {
        self.metrics.increment_read_splits();
        let ctx = RequestContext::new("read_splits");
        let scope = self.begin(&ctx, "READ_SPLITS");

        let mut total = ReadStats::default();
        let result = self.read(&ctx, request, out, &mut total).await;
        self.settle(&ctx, scope, total, result)
    }

    async fn read(
        &self,
        ctx: &RequestContext,
        request: ReadSplitsRequest,
        out: &mpsc::Sender<ReadSplitsResponse>,
        total: &mut ReadStats,
    ) -> ConnectorResult<Option<ConnectorError>> {
        let request = match normalize_read_splits(request, self.default_format) {
            Ok(request) => Arc::new(request),
            Err(err) => return reject_read(out, 0, err).await,
        };
        let read_limiter = self.read_limiters.make_read_limiter(ctx.query_id_str());

        for split in &request.splits {
            let kind = split.select.data_source_instance.kind;
            let source = match self.sources.get(kind) {
                Ok(source) => source,
                Err(err) => return reject_read(out, split.id, err).await,
            };
            let split_ctx = ctx
                .clone()
                .with_annotation("data_source_kind", kind.as_str())
                .with_annotation("table", split.select.table.as_str());
            let streamer = ReadSplitStreamer::new(
                source,
                split_ctx,
                request.clone(),
                split.clone(),
                self.paging,
                read_limiter.clone(),
                self.metrics.clone(),
            );
            let outcome = streamer.run(out).await?;
            total.add(outcome.total);
            if outcome.error.is_some() {
                return Ok(outcome.error);
            }
        }
        Ok(None)
    }

    // ==================
    // Request lifecycle
    // ==================

    fn begin(&self, ctx: &RequestContext, name: &str) -> ObservationScope {
        self.observer.observe(QueryRecord::new(
            ctx.query_id,
            ctx.method,
            QueryOutcome::Started,
        ));
        ObservationScope::new(name, &ctx.log_fields())
    }

    /// Closes a streaming request: `Ok(Some(_))` was answered in-band,
    /// `Err` is a transport failure passed on to the caller
    fn settle(
        &self,
        ctx: &RequestContext,
        scope: ObservationScope,
        total: ReadStats,
        result: ConnectorResult<Option<ConnectorError>>,
    ) -> ConnectorResult<()> {
        match result {
            Ok(error) => {
                self.end(ctx, scope, total, error.as_ref());
                Ok(())
            }
            Err(err) => {
                self.end(ctx, scope, total, Some(&err));
                Err(err)
            }
        }
    }

    fn end(
        &self,
        ctx: &RequestContext,
        scope: ObservationScope,
        total: ReadStats,
        error: Option<&ConnectorError>,
    ) {
        let elapsed = ctx.elapsed_ms().to_string();
        let rows = total.rows.to_string();

        match error {
            None => {
                scope.complete_with_fields(&[("elapsed_ms", &elapsed), ("total_rows", &rows)]);
                let record = QueryRecord::new(ctx.query_id, ctx.method, QueryOutcome::Finished);
                self.observer.observe(record.with_stats(total));
            }
            Some(err) => {
                let status = err.status();
                self.metrics.record_failure(status);
                scope.fail_with_fields(
                    &err.to_string(),
                    &[
                        ("elapsed_ms", &elapsed),
                        ("status", status.as_str()),
                        ("total_rows", &rows),
                    ],
                );
                let record = QueryRecord::new(ctx.query_id, ctx.method, QueryOutcome::Failed)
                    .with_stats(total)
                    .with_error(status, err.to_string());
                self.observer.observe(record);
            }
        }
    }
}

async fn reject_listing(
    out: &mpsc::Sender<ListSplitsResponse>,
    err: ConnectorError,
) -> ConnectorResult<Option<ConnectorError>> {
    let response = ListSplitsResponse {
        splits: Vec::new(),
        error: err.to_envelope(),
    };
    out.send(response)
        .await
        .map_err(|_| ConnectorError::Cancelled)?;
    Ok(Some(err))
}

async fn reject_read(
    out: &mpsc::Sender<ReadSplitsResponse>,
    split_id: u64,
    err: ConnectorError,
) -> ConnectorResult<Option<ConnectorError>> {
    let response = ReadSplitsResponse::failure(split_id, err.to_envelope(), ReadStats::default());
    out.send(response)
        .await
        .map_err(|_| ConnectorError::Cancelled)?;
    Ok(Some(err))
}
