//! Read-splits streamer

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{
    ConnectorError, ConnectorResult, ErrorEnvelope, ReadSplitsRequest, ReadSplitsResponse,
    ReadStats, Split,
};
use crate::config::PagingConfig;
use crate::context::RequestContext;
use crate::datasource::DataSource;
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::paging::{sink_channel, ColumnarBufferFactory, Page, ReadLimiter, SinkEvent, SinkReceiver};

/// How a split read ended when the outbound stream stayed open
#[derive(Debug)]
pub struct SplitOutcome {
    /// Counters of every page sent for the split
    pub total: ReadStats,
    /// The failure carried by the split's final response
    pub error: Option<ConnectorError>,
}

impl SplitOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Streams one split: the data source fills a sink on its own task while
/// this side writes each sealed page as one response.
pub struct ReadSplitStreamer {
    source: Arc<dyn DataSource>,
    ctx: RequestContext,
    request: Arc<ReadSplitsRequest>,
    split: Split,
    paging: PagingConfig,
    read_limiter: ReadLimiter,
    metrics: Arc<MetricsRegistry>,
}

impl ReadSplitStreamer {
    pub fn new(
        source: Arc<dyn DataSource>,
        ctx: RequestContext,
        request: Arc<ReadSplitsRequest>,
        split: Split,
        paging: PagingConfig,
        read_limiter: ReadLimiter,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let ctx = ctx.with_annotation("split_id", split.id.to_string());
        Self {
            source,
            ctx,
            request,
            split,
            paging,
            read_limiter,
            metrics,
        }
    }

    /// Runs the split to completion.
    ///
    /// A logical failure is sent as the final response and reported in the
    /// outcome. `Err` means the outbound stream closed; the producer is
    /// stopped before returning.
    pub async fn run(self, out: &mpsc::Sender<ReadSplitsResponse>) -> ConnectorResult<SplitOutcome> {
        let split_id = self.split.id;
        Logger::info(Event::SplitReadBegin.as_str(), &self.ctx.log_fields());
        self.metrics.increment_splits_read();

        let buffer_factory =
            match ColumnarBufferFactory::new(self.request.format, &self.split.select.what) {
                Ok(factory) => factory,
                Err(err) => {
                    let total = ReadStats::default();
                    self.log_failure(&err, total);
                    send(out, ReadSplitsResponse::failure(split_id, err.to_envelope(), total))
                        .await?;
                    return Ok(SplitOutcome {
                        total,
                        error: Some(err),
                    });
                }
            };

        let (sink_factory, mut receiver) =
            sink_channel(buffer_factory, self.paging, self.read_limiter.clone());

        let producer = {
            let source = self.source.clone();
            let ctx = self.ctx.clone();
            let request = self.request.clone();
            let split = self.split.clone();
            tokio::spawn(async move {
                let result = source
                    .read_split(&ctx, &request, &split, &sink_factory)
                    .await;
                sink_factory.finish(result).await;
            })
        };

        let drained = self.drain(&mut receiver, out).await;
        if drained.is_err() {
            receiver.close();
            Logger::warn(Event::StreamCancelled.as_str(), &self.ctx.log_fields());
        }
        // The producer observes the closed queue at its next row or page
        if let Err(err) = producer.await {
            if drained.is_ok() {
                return Err(ConnectorError::internal(format!("split producer panicked: {}", err)));
            }
        }
        drained
    }

    async fn drain(
        &self,
        receiver: &mut SinkReceiver,
        out: &mpsc::Sender<ReadSplitsResponse>,
    ) -> ConnectorResult<SplitOutcome> {
        let mut total = ReadStats::default();
        loop {
            let event = tokio::select! {
                event = receiver.next() => event,
                _ = out.closed() => return Err(ConnectorError::Cancelled),
            };

            match event {
                Some(SinkEvent::Page(page)) => {
                    total = page.total;
                    self.send_page(out, page).await?;
                }
                Some(SinkEvent::Finished) | None => {
                    let rows = total.rows.to_string();
                    let bytes = total.bytes.to_string();
                    let mut fields = self.ctx.log_fields();
                    fields.push(("total_rows", &rows));
                    fields.push(("total_bytes", &bytes));
                    Logger::info(Event::SplitReadComplete.as_str(), &fields);
                    return Ok(SplitOutcome { total, error: None });
                }
                Some(SinkEvent::Failed(err)) => {
                    self.log_failure(&err, total);
                    send(
                        out,
                        ReadSplitsResponse::failure(self.split.id, err.to_envelope(), total),
                    )
                    .await?;
                    return Ok(SplitOutcome {
                        total,
                        error: Some(err),
                    });
                }
            }
        }
    }

    async fn send_page(
        &self,
        out: &mpsc::Sender<ReadSplitsResponse>,
        page: Page,
    ) -> ConnectorResult<()> {
        self.metrics.record_page(page.stats.rows, page.stats.bytes);

        let rows = page.stats.rows.to_string();
        let mut fields = self.ctx.log_fields();
        fields.push(("rows", &rows));
        Logger::trace(Event::PageSent.as_str(), &fields);

        let response = ReadSplitsResponse {
            split_id: self.split.id,
            payload: Some(page.payload),
            stats: page.stats,
            total: page.total,
            error: ErrorEnvelope::success(),
        };
        send(out, response).await
    }

    fn log_failure(&self, err: &ConnectorError, total: ReadStats) {
        if let ConnectorError::ReadLimitExceeded(_) = err {
            self.metrics.increment_read_limit_rejections();
            Logger::warn(Event::ReadLimitExceeded.as_str(), &self.ctx.log_fields());
        }
        let reason = err.to_string();
        let rows = total.rows.to_string();
        let mut fields = self.ctx.log_fields();
        fields.push(("status", err.status().as_str()));
        fields.push(("reason", &reason));
        fields.push(("total_rows", &rows));
        Logger::error(Event::SplitReadFailed.as_str(), &fields);
    }
}

async fn send(
    out: &mpsc::Sender<ReadSplitsResponse>,
    response: ReadSplitsResponse,
) -> ConnectorResult<()> {
    out.send(response).await.map_err(|_| ConnectorError::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        Column, DataSourceInstance, DataSourceKind, Format, PagePayload, PrimitiveType, Select,
        StatusCode, WireType,
    };
    use crate::config::MemoryConfig;
    use crate::datasource::memory::{CatalogColumn, NativeType, Table};
    use crate::datasource::{MemoryCatalog, MemoryDataSource};
    use crate::paging::NativeValue;
    use std::time::Duration;

    fn source(rows: i64) -> Arc<dyn DataSource> {
        let table = Table::new("t", vec![CatalogColumn::new("id", NativeType::Int32)])
            .with_rows((0..rows).map(|n| vec![NativeValue::Int32(n as i32)]).collect())
            .unwrap();
        Arc::new(MemoryDataSource::new(
            MemoryCatalog::new().with_table(table),
            MemoryConfig::default(),
            Arc::new(MetricsRegistry::new()),
        ))
    }

    fn split(column: &str, wire: PrimitiveType) -> Split {
        Split {
            id: 3,
            select: Select::new(
                DataSourceInstance::new(DataSourceKind::Memory, "db"),
                "t",
                vec![Column::new(column, WireType::primitive(wire))],
            ),
            description: Vec::new(),
        }
    }

    fn streamer(
        source: Arc<dyn DataSource>,
        split: Split,
        paging: PagingConfig,
        limiter: ReadLimiter,
        metrics: Arc<MetricsRegistry>,
    ) -> ReadSplitStreamer {
        let request = Arc::new(ReadSplitsRequest {
            splits: vec![split.clone()],
            format: Format::ColumnSet,
            ..Default::default()
        });
        ReadSplitStreamer::new(
            source,
            RequestContext::new("read_splits"),
            request,
            split,
            paging,
            limiter,
            metrics,
        )
    }

    async fn collect(mut rx: mpsc::Receiver<ReadSplitsResponse>) -> Vec<ReadSplitsResponse> {
        let mut responses = Vec::new();
        while let Some(response) = rx.recv().await {
            responses.push(response);
        }
        responses
    }

    fn row_count(response: &ReadSplitsResponse) -> u64 {
        match &response.payload {
            Some(PagePayload::ColumnSet(set)) => set.row_count,
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pages_follow_paging_config() {
        let metrics = Arc::new(MetricsRegistry::new());
        let streamer = streamer(
            source(5),
            split("id", PrimitiveType::Int32),
            PagingConfig::with_rows_per_page(2),
            ReadLimiter::unlimited(),
            metrics.clone(),
        );
        let (tx, rx) = mpsc::channel(16);
        let outcome = streamer.run(&tx).await.unwrap();
        drop(tx);

        let responses = collect(rx).await;
        let rows: Vec<u64> = responses.iter().map(row_count).collect();
        assert_eq!(rows, vec![2, 2, 1]);
        assert!(responses.iter().all(|r| r.error.is_success() && r.split_id == 3));
        assert_eq!(responses[2].total.rows, 5);
        assert!(outcome.is_success());
        assert_eq!(outcome.total.rows, 5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pages_sent, 3);
        assert_eq!(snapshot.rows_sent, 5);
        assert_eq!(snapshot.splits_read, 1);
    }

    #[tokio::test]
    async fn test_empty_table_yields_one_empty_page() {
        let streamer = streamer(
            source(0),
            split("id", PrimitiveType::Int32),
            PagingConfig::default(),
            ReadLimiter::unlimited(),
            Arc::new(MetricsRegistry::new()),
        );
        let (tx, rx) = mpsc::channel(16);
        streamer.run(&tx).await.unwrap();
        drop(tx);

        let responses = collect(rx).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(row_count(&responses[0]), 0);
    }

    #[tokio::test]
    async fn test_read_limit_ends_with_error_response() {
        let metrics = Arc::new(MetricsRegistry::new());
        let streamer = streamer(
            source(5),
            split("id", PrimitiveType::Int32),
            PagingConfig::with_rows_per_page(2),
            ReadLimiter::with_limit(3),
            metrics.clone(),
        );
        let (tx, rx) = mpsc::channel(16);
        let outcome = streamer.run(&tx).await.unwrap();
        drop(tx);
        assert!(matches!(outcome.error, Some(ConnectorError::ReadLimitExceeded(3))));
        assert_eq!(outcome.total.rows, 2);

        let responses = collect(rx).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(row_count(&responses[0]), 2);
        let last = &responses[1];
        assert!(last.payload.is_none());
        assert_eq!(last.error.status, StatusCode::BadRequest);
        assert_eq!(metrics.snapshot().read_limit_rejections, 1);
    }

    #[tokio::test]
    async fn test_missing_column_reports_bad_request() {
        let streamer = streamer(
            source(2),
            split("ghost", PrimitiveType::Int32),
            PagingConfig::default(),
            ReadLimiter::unlimited(),
            Arc::new(MetricsRegistry::new()),
        );
        let (tx, rx) = mpsc::channel(16);
        streamer.run(&tx).await.unwrap();
        drop(tx);

        let responses = collect(rx).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].error.status, StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn test_closed_transport_stops_producer() {
        let streamer = streamer(
            source(1000),
            split("id", PrimitiveType::Int32),
            PagingConfig {
                prefetch_queue_capacity: 1,
                ..PagingConfig::with_rows_per_page(1)
            },
            ReadLimiter::unlimited(),
            Arc::new(MetricsRegistry::new()),
        );
        let (tx, mut rx) = mpsc::channel(1);
        let reader = tokio::spawn(async move {
            let first = rx.recv().await;
            drop(rx);
            first
        });

        let result = tokio::time::timeout(Duration::from_secs(5), streamer.run(&tx))
            .await
            .unwrap();
        assert!(matches!(result, Err(ConnectorError::Cancelled)));
        assert!(reader.await.unwrap().is_some());
    }
}
