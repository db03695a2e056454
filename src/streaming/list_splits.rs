//! List-splits streamer

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{
    ConnectorError, ConnectorResult, ErrorEnvelope, ListSplitsRequest, ListSplitsResponse, Select,
    Split,
};
use crate::context::RequestContext;
use crate::datasource::{DataSource, SplitCandidate};
use crate::observability::{Event, Logger, MetricsRegistry};

const CANDIDATE_QUEUE_CAPACITY: usize = 32;

/// How listing one select ended when the outbound stream stayed open
#[derive(Debug)]
pub struct ListingOutcome {
    /// First id not yet assigned
    pub next_id: u64,
    /// The failure carried by the final response
    pub error: Option<ConnectorError>,
}

/// Streams the splits of one select as the data source produces them.
///
/// Each split goes out in its own response. Ids are assigned here and keep
/// increasing across the selects of a request.
pub struct ListSplitsStreamer {
    source: Arc<dyn DataSource>,
    ctx: RequestContext,
    request: Arc<ListSplitsRequest>,
    select: Select,
    metrics: Arc<MetricsRegistry>,
}

impl ListSplitsStreamer {
    pub fn new(
        source: Arc<dyn DataSource>,
        ctx: RequestContext,
        request: Arc<ListSplitsRequest>,
        select: Select,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            source,
            ctx,
            request,
            select,
            metrics,
        }
    }

    /// Assigns ids starting at `first_id`. `Err` means the outbound stream
    /// closed.
    pub async fn run(
        self,
        first_id: u64,
        out: &mpsc::Sender<ListSplitsResponse>,
    ) -> ConnectorResult<ListingOutcome> {
        let (results, mut candidates) = mpsc::channel::<SplitCandidate>(CANDIDATE_QUEUE_CAPACITY);

        let producer = {
            let source = self.source.clone();
            let ctx = self.ctx.clone();
            let request = self.request.clone();
            let select = self.select.clone();
            tokio::spawn(async move { source.list_splits(&ctx, &request, &select, &results).await })
        };

        let mut next_id = first_id;
        let forwarded = loop {
            let candidate = tokio::select! {
                candidate = candidates.recv() => candidate,
                _ = out.closed() => break Err(ConnectorError::Cancelled),
            };
            let Some(candidate) = candidate else {
                break Ok(());
            };

            let split = Split {
                id: next_id,
                select: candidate.select,
                description: candidate.description,
            };
            let id = next_id.to_string();
            let mut fields = self.ctx.log_fields();
            fields.push(("split_id", &id));
            Logger::trace(Event::SplitListed.as_str(), &fields);

            let response = ListSplitsResponse {
                splits: vec![split],
                error: ErrorEnvelope::success(),
            };
            if out.send(response).await.is_err() {
                break Err(ConnectorError::Cancelled);
            }
            next_id += 1;
            self.metrics.add_splits_listed(1);
        };

        if let Err(err) = forwarded {
            candidates.close();
            Logger::warn(Event::StreamCancelled.as_str(), &self.ctx.log_fields());
            let _ = producer.await;
            return Err(err);
        }

        let error = producer
            .await
            .map_err(|e| ConnectorError::internal(format!("split lister panicked: {}", e)))
            .and_then(|result| result)
            .err();
        if let Some(err) = &error {
            let reason = err.to_string();
            let mut fields = self.ctx.log_fields();
            fields.push(("status", err.status().as_str()));
            fields.push(("reason", &reason));
            Logger::error(Event::SplitListFailed.as_str(), &fields);

            let response = ListSplitsResponse {
                splits: Vec::new(),
                error: err.to_envelope(),
            };
            out.send(response)
                .await
                .map_err(|_| ConnectorError::Cancelled)?;
        }
        Ok(ListingOutcome { next_id, error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DataSourceInstance, DataSourceKind, StatusCode};
    use crate::config::{MemoryConfig, SplitPolicy};
    use crate::datasource::memory::{CatalogColumn, NativeType, Table};
    use crate::datasource::{MemoryCatalog, MemoryDataSource};
    use crate::paging::NativeValue;

    fn source(policy: SplitPolicy) -> Arc<dyn DataSource> {
        let table = Table::new("t", vec![CatalogColumn::new("id", NativeType::Int64)])
            .with_rows((0..10).map(|n| vec![NativeValue::Int64(n)]).collect())
            .unwrap();
        Arc::new(MemoryDataSource::new(
            MemoryCatalog::new().with_table(table),
            MemoryConfig {
                splitting: policy,
                ..Default::default()
            },
            Arc::new(MetricsRegistry::new()),
        ))
    }

    fn select(table: &str) -> Select {
        Select::new(
            DataSourceInstance::new(DataSourceKind::Memory, "db"),
            table,
            Vec::new(),
        )
    }

    async fn list(
        source: Arc<dyn DataSource>,
        select: Select,
        first_id: u64,
        metrics: Arc<MetricsRegistry>,
    ) -> (ListingOutcome, Vec<ListSplitsResponse>) {
        let request = Arc::new(ListSplitsRequest {
            selects: vec![select.clone()],
            ..Default::default()
        });
        let streamer = ListSplitsStreamer::new(
            source,
            RequestContext::new("list_splits"),
            request,
            select,
            metrics,
        );
        let (tx, mut rx) = mpsc::channel(64);
        let outcome = streamer.run(first_id, &tx).await.unwrap();
        drop(tx);
        let mut responses = Vec::new();
        while let Some(response) = rx.recv().await {
            responses.push(response);
        }
        (outcome, responses)
    }

    #[tokio::test]
    async fn test_split_ids_continue_from_first_id() {
        let metrics = Arc::new(MetricsRegistry::new());
        let (outcome, responses) = list(
            source(SplitPolicy::BySize { rows_per_split: 4 }),
            select("t"),
            7,
            metrics.clone(),
        )
        .await;

        assert_eq!(outcome.next_id, 10);
        assert!(outcome.error.is_none());
        let ids: Vec<u64> = responses.iter().map(|r| r.splits[0].id).collect();
        assert_eq!(ids, vec![7, 8, 9]);
        assert!(responses.iter().all(|r| r.error.is_success()));
        assert_eq!(metrics.snapshot().splits_listed, 3);
    }

    #[tokio::test]
    async fn test_missing_table_single_error_response() {
        let (outcome, responses) = list(
            source(SplitPolicy::WholeTable),
            select("absent"),
            0,
            Arc::new(MetricsRegistry::new()),
        )
        .await;

        assert_eq!(outcome.next_id, 0);
        assert!(matches!(outcome.error, Some(ConnectorError::TableNotFound(_))));
        assert_eq!(responses.len(), 1);
        assert!(responses[0].splits.is_empty());
        assert_eq!(responses[0].error.status, StatusCode::NotFound);
    }
}
