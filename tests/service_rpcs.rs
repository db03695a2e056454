//! Service RPC Tests
//!
//! Request validation, schema description and split listing as seen
//! through `ConnectorService`:
//! - Described schemas follow the type mapping settings
//! - Malformed requests are answered in-band without touching a backend
//! - Split ids are unique across the selects of one request
//! - Every request is reported to the query observer

use std::sync::Arc;

use fq_connector::api::{
    Column, DataSourceInstance, DataSourceKind, DateTimeFormat, DescribeTableRequest, Endpoint,
    ListSplitsRequest, ListSplitsResponse, PrimitiveType, ReadSplitsRequest, Select, Split,
    StatusCode, TypeMappingSettings, WireType,
};
use fq_connector::config::{MemoryConfig, ServerConfig, SplitPolicy};
use fq_connector::datasource::memory::{CatalogColumn, NativeType, Table};
use fq_connector::datasource::{DataSourceCollection, MemoryCatalog, MemoryDataSource};
use fq_connector::observability::{MemoryQueryObserver, MetricsRegistry, QueryOutcome};
use fq_connector::paging::NativeValue;
use fq_connector::server::ConnectorService;
use tokio::sync::mpsc;

// =============================================================================
// Test Utilities
// =============================================================================

fn catalog() -> MemoryCatalog {
    let orders = Table::new(
        "orders",
        vec![
            CatalogColumn::new("id", NativeType::Uint32),
            CatalogColumn::new("placed", NativeType::Date).nullable(),
        ],
    )
    .with_rows(
        (1..=6)
            .map(|n| vec![NativeValue::Uint32(n), NativeValue::Null])
            .collect(),
    )
    .unwrap();
    let empty = Table::new("empty", vec![CatalogColumn::new("id", NativeType::Int64)]);
    MemoryCatalog::new().with_table(orders).with_table(empty)
}

fn service(splitting: SplitPolicy) -> (ConnectorService, MemoryQueryObserver) {
    let metrics = Arc::new(MetricsRegistry::new());
    let mut sources = DataSourceCollection::new();
    sources.register(Arc::new(MemoryDataSource::new(
        catalog(),
        MemoryConfig {
            splitting,
            ..Default::default()
        },
        metrics.clone(),
    )));
    let observer = MemoryQueryObserver::new();
    let service = ConnectorService::new(&ServerConfig::default(), sources, metrics)
        .with_observer(Arc::new(observer.clone()));
    (service, observer)
}

fn memory() -> DataSourceInstance {
    DataSourceInstance::new(DataSourceKind::Memory, "db")
}

fn describe_request(table: &str, date_time_format: DateTimeFormat) -> DescribeTableRequest {
    DescribeTableRequest {
        data_source_instance: memory(),
        table: table.to_string(),
        type_mapping_settings: TypeMappingSettings { date_time_format },
    }
}

fn select(table: &str) -> Select {
    Select::new(
        memory(),
        table,
        vec![Column::new("id", WireType::primitive(PrimitiveType::Uint32))],
    )
}

async fn list(service: &ConnectorService, request: ListSplitsRequest) -> Vec<ListSplitsResponse> {
    let (tx, mut rx) = mpsc::channel(64);
    service.list_splits(request, &tx).await.unwrap();
    drop(tx);

    let mut responses = Vec::new();
    while let Some(response) = rx.recv().await {
        responses.push(response);
    }
    responses
}

// =============================================================================
// DescribeTable
// =============================================================================

#[tokio::test]
async fn test_describe_native_date_types() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let response = service
        .describe_table(describe_request("orders", DateTimeFormat::YqlFormat))
        .await;

    assert!(response.error.is_success());
    let schema = response.schema.unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(
        schema.columns[0].wire_type,
        WireType::primitive(PrimitiveType::Uint32)
    );
    assert_eq!(
        schema.columns[1].wire_type,
        WireType::optional(WireType::primitive(PrimitiveType::Date))
    );
}

#[tokio::test]
async fn test_describe_string_date_types() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let response = service
        .describe_table(describe_request("orders", DateTimeFormat::StringFormat))
        .await;

    let schema = response.schema.unwrap();
    assert_eq!(
        schema.columns[1].wire_type,
        WireType::optional(WireType::primitive(PrimitiveType::Utf8))
    );
}

#[tokio::test]
async fn test_describe_empty_table_name() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let response = service
        .describe_table(describe_request("", DateTimeFormat::YqlFormat))
        .await;

    assert!(response.schema.is_none());
    assert_eq!(response.error.status, StatusCode::BadRequest);
}

#[tokio::test]
async fn test_describe_requires_endpoint_for_remote_kinds() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let mut request = describe_request("orders", DateTimeFormat::YqlFormat);
    request.data_source_instance = DataSourceInstance::new(DataSourceKind::Postgresql, "db");

    let response = service.describe_table(request.clone()).await;
    assert_eq!(response.error.status, StatusCode::BadRequest);

    // with an endpoint the request is valid, but no such backend is served
    request.data_source_instance.endpoint = Some(Endpoint {
        host: "db.internal".into(),
        port: 5432,
    });
    let response = service.describe_table(request).await;
    assert_eq!(response.error.status, StatusCode::Unsupported);
}

#[tokio::test]
async fn test_describe_reports_to_observer() {
    let (service, observer) = service(SplitPolicy::WholeTable);
    service
        .describe_table(describe_request("orders", DateTimeFormat::YqlFormat))
        .await;

    let records = observer.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].outcome, QueryOutcome::Started);
    assert_eq!(records[1].outcome, QueryOutcome::Finished);
    assert_eq!(records[0].query_id, records[1].query_id);
    assert_eq!(records[1].method, "describe_table");
}

// =============================================================================
// ListSplits
// =============================================================================

#[tokio::test]
async fn test_split_ids_unique_across_selects() {
    let (service, _) = service(SplitPolicy::FixedShards { shard_count: 3 });
    let responses = list(
        &service,
        ListSplitsRequest {
            selects: vec![select("orders"), select("orders")],
            ..Default::default()
        },
    )
    .await;

    let ids: Vec<u64> = responses
        .iter()
        .flat_map(|r| r.splits.iter().map(|s| s.id))
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    assert!(responses.iter().all(|r| r.error.is_success()));
    assert_eq!(service.metrics().snapshot().splits_listed, 6);
}

#[tokio::test]
async fn test_max_split_count_caps_shards() {
    let (service, _) = service(SplitPolicy::FixedShards { shard_count: 8 });
    let responses = list(
        &service,
        ListSplitsRequest {
            selects: vec![select("orders")],
            max_split_count: 2,
            ..Default::default()
        },
    )
    .await;

    let splits: usize = responses.iter().map(|r| r.splits.len()).sum();
    assert_eq!(splits, 2);
}

#[tokio::test]
async fn test_empty_table_lists_one_split() {
    let (service, _) = service(SplitPolicy::BySize { rows_per_split: 2 });
    let responses = list(
        &service,
        ListSplitsRequest {
            selects: vec![select("empty")],
            ..Default::default()
        },
    )
    .await;

    let splits: usize = responses.iter().map(|r| r.splits.len()).sum();
    assert_eq!(splits, 1);
}

#[tokio::test]
async fn test_listing_stops_at_missing_table() {
    let (service, observer) = service(SplitPolicy::WholeTable);
    let responses = list(
        &service,
        ListSplitsRequest {
            selects: vec![select("orders"), select("absent"), select("orders")],
            ..Default::default()
        },
    )
    .await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].splits.len(), 1);
    assert_eq!(responses[1].error.status, StatusCode::NotFound);
    assert!(responses[1].splits.is_empty());

    let records = observer.records();
    assert_eq!(records.last().unwrap().outcome, QueryOutcome::Failed);
    assert_eq!(records.last().unwrap().status, StatusCode::NotFound);
}

#[tokio::test]
async fn test_empty_select_list_rejected() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let responses = list(&service, ListSplitsRequest::default()).await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].error.status, StatusCode::BadRequest);
    assert_eq!(service.metrics().snapshot().bad_request_failures, 1);
}

// =============================================================================
// ReadSplits
// =============================================================================

#[tokio::test]
async fn test_empty_split_list_rejected() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let (tx, mut rx) = mpsc::channel(4);
    service
        .read_splits(ReadSplitsRequest::default(), &tx)
        .await
        .unwrap();
    drop(tx);

    let response = rx.recv().await.unwrap();
    assert_eq!(response.error.status, StatusCode::BadRequest);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_read_stops_after_failed_split() {
    let (service, _) = service(SplitPolicy::WholeTable);
    let split = |id, table: &str| Split {
        id,
        select: select(table),
        description: Vec::new(),
    };
    let (tx, mut rx) = mpsc::channel(64);
    service
        .read_splits(
            ReadSplitsRequest {
                splits: vec![split(0, "absent"), split(1, "orders")],
                ..Default::default()
            },
            &tx,
        )
        .await
        .unwrap();
    drop(tx);

    let mut responses = Vec::new();
    while let Some(response) = rx.recv().await {
        responses.push(response);
    }
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].split_id, 0);
    assert_eq!(responses[0].error.status, StatusCode::NotFound);
    assert_eq!(service.metrics().snapshot().splits_read, 1);
}

#[tokio::test]
async fn test_closed_response_stream_cancels_read() {
    let (service, observer) = service(SplitPolicy::WholeTable);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let result = service
        .read_splits(
            ReadSplitsRequest {
                splits: vec![Split {
                    id: 0,
                    select: select("orders"),
                    description: Vec::new(),
                }],
                ..Default::default()
            },
            &tx,
        )
        .await;

    assert!(result.is_err());
    assert_eq!(service.metrics().snapshot().cancelled_requests, 1);
    assert_eq!(
        observer.records().last().unwrap().status,
        StatusCode::Cancelled
    );
}
