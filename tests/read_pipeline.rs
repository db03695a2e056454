//! Read Pipeline Tests
//!
//! End-to-end ListSplits followed by ReadSplits through `ConnectorService`,
//! with the memory catalog loaded from disk the way `serve` loads it:
//! - Splits listed for a select can be read back in full
//! - Pages respect the row threshold and carry per-page and running stats
//! - Both page formats carry the same values
//! - The read limit spans every split of a request

use std::fs;
use std::path::Path;

use arrow::array::{Array, Int64Array, StringArray};
use fq_connector::api::{
    Column, DataSourceInstance, DataSourceKind, Format, ListSplitsRequest, PagePayload,
    PrimitiveType, ReadSplitsRequest, ReadSplitsResponse, Select, Split, StatusCode, WireType,
};
use fq_connector::config::ServerConfig;
use fq_connector::paging::read_ipc_stream;
use fq_connector::server::ConnectorService;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

// =============================================================================
// Test Utilities
// =============================================================================

const CATALOG: &str = r#"{"tables": [{
    "name": "users",
    "columns": [
        {"name": "id", "type": "int64"},
        {"name": "name", "type": "text", "nullable": true}
    ],
    "rows": [[1, "ann"], [2, null], [3, "cid"], [4, "dee"], [5, null]]
}]}"#;

fn write_catalog(dir: &Path) -> String {
    let path = dir.join("catalog.json");
    fs::write(&path, CATALOG).unwrap();
    path.display().to_string()
}

fn service_with(dir: &TempDir, extra: Value) -> ConnectorService {
    let mut config = json!({
        "paging": {"rows_per_page": 2},
        "datasources": {
            "memory": {
                "catalog_path": write_catalog(dir.path()),
                "splitting": {"policy": "by_size", "rows_per_split": 3}
            }
        }
    });
    if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    let config = ServerConfig::from_json(&config.to_string()).unwrap();
    ConnectorService::from_config(&config).unwrap()
}

fn users_select() -> Select {
    Select::new(
        DataSourceInstance::new(DataSourceKind::Memory, "db"),
        "users",
        vec![
            Column::new("id", WireType::primitive(PrimitiveType::Int64)),
            Column::new(
                "name",
                WireType::optional(WireType::primitive(PrimitiveType::Utf8)),
            ),
        ],
    )
}

async fn list(service: &ConnectorService, selects: Vec<Select>) -> Vec<Split> {
    let (tx, mut rx) = mpsc::channel(64);
    service
        .list_splits(
            ListSplitsRequest {
                selects,
                ..Default::default()
            },
            &tx,
        )
        .await
        .unwrap();
    drop(tx);

    let mut splits = Vec::new();
    while let Some(response) = rx.recv().await {
        assert_eq!(response.error.status, StatusCode::Success);
        splits.extend(response.splits);
    }
    splits
}

async fn read(service: &ConnectorService, request: ReadSplitsRequest) -> Vec<ReadSplitsResponse> {
    let (tx, mut rx) = mpsc::channel(64);
    service.read_splits(request, &tx).await.unwrap();
    drop(tx);

    let mut responses = Vec::new();
    while let Some(response) = rx.recv().await {
        responses.push(response);
    }
    responses
}

fn arrow_ids(response: &ReadSplitsResponse) -> Vec<i64> {
    let bytes = match &response.payload {
        Some(PagePayload::ArrowIpc(bytes)) => bytes,
        other => panic!("expected arrow page, got {:?}", other),
    };
    let batches = read_ipc_stream(bytes).unwrap();
    assert_eq!(batches.len(), 1);
    let ids = batches[0]
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    ids.values().to_vec()
}

// =============================================================================
// ListSplits -> ReadSplits
// =============================================================================

#[tokio::test]
async fn test_listed_splits_read_back_every_row() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({}));

    let splits = list(&service, vec![users_select()]).await;
    assert_eq!(splits.len(), 2);
    assert_eq!(splits[0].id, 0);
    assert_eq!(splits[1].id, 1);

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits,
            format: Format::ArrowIpcStreaming,
            ..Default::default()
        },
    )
    .await;

    // rows 1..=3 in split 0, rows 4..=5 in split 1, two rows per page
    let pages: Vec<(u64, Vec<i64>)> = responses
        .iter()
        .map(|r| {
            assert!(r.error.is_success());
            (r.split_id, arrow_ids(r))
        })
        .collect();
    assert_eq!(
        pages,
        vec![
            (0, vec![1, 2]),
            (0, vec![3]),
            (1, vec![4, 5]),
        ]
    );
}

#[tokio::test]
async fn test_page_stats_accumulate_per_split() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({}));
    let splits = list(&service, vec![users_select()]).await;

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits,
            ..Default::default()
        },
    )
    .await;

    assert_eq!(responses[0].stats.rows, 2);
    assert_eq!(responses[0].total.rows, 2);
    assert_eq!(responses[1].stats.rows, 1);
    assert_eq!(responses[1].total.rows, 3);
    // Running totals restart with each split
    assert_eq!(responses[2].total.rows, 2);
    assert!(responses.iter().all(|r| r.total.bytes >= r.stats.bytes));

    let metrics = service.metrics().snapshot();
    assert_eq!(metrics.pages_sent, 3);
    assert_eq!(metrics.rows_sent, 5);
    assert_eq!(metrics.splits_read, 2);
    assert_eq!(metrics.splits_listed, 2);
}

#[tokio::test]
async fn test_unspecified_format_defaults_to_arrow() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({}));
    let splits = list(&service, vec![users_select()]).await;

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits,
            format: Format::Unspecified,
            ..Default::default()
        },
    )
    .await;
    assert!(responses
        .iter()
        .all(|r| matches!(r.payload, Some(PagePayload::ArrowIpc(_)))));
}

#[tokio::test]
async fn test_arrow_page_carries_nulls() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({}));
    let splits = list(&service, vec![users_select()]).await;

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits: splits.into_iter().take(1).collect(),
            format: Format::ArrowIpcStreaming,
            ..Default::default()
        },
    )
    .await;

    let bytes = match &responses[0].payload {
        Some(PagePayload::ArrowIpc(bytes)) => bytes.clone(),
        other => panic!("expected arrow page, got {:?}", other),
    };
    let batch = &read_ipc_stream(&bytes).unwrap()[0];
    assert_eq!(batch.num_rows(), 2);
    let names = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(names.value(0), "ann");
    assert!(names.is_null(1));
}

#[tokio::test]
async fn test_column_set_pages_carry_same_values() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({}));
    let splits = list(&service, vec![users_select()]).await;

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits,
            format: Format::ColumnSet,
            ..Default::default()
        },
    )
    .await;

    let mut ids = Vec::new();
    let mut names = Vec::new();
    for response in &responses {
        let set = match &response.payload {
            Some(PagePayload::ColumnSet(set)) => set,
            other => panic!("expected column set, got {:?}", other),
        };
        assert_eq!(set.columns[0].name, "id");
        assert_eq!(set.columns[1].name, "name");
        assert_eq!(set.row_count as usize, set.columns[0].values.len());
        ids.extend(set.columns[0].values.iter().cloned());
        names.extend(set.columns[1].values.iter().cloned());
    }
    assert_eq!(ids, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
    assert_eq!(
        names,
        vec![json!("ann"), Value::Null, json!("cid"), json!("dee"), Value::Null]
    );
}

#[tokio::test]
async fn test_empty_projection_counts_rows() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({}));
    let select = Select::new(
        DataSourceInstance::new(DataSourceKind::Memory, "db"),
        "users",
        Vec::new(),
    );

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits: vec![Split {
                id: 0,
                select,
                description: Vec::new(),
            }],
            format: Format::ColumnSet,
            ..Default::default()
        },
    )
    .await;

    let rows: u64 = responses.iter().map(|r| r.stats.rows).sum();
    assert_eq!(rows, 5);
}

// =============================================================================
// Read Limit
// =============================================================================

#[tokio::test]
async fn test_read_limit_spans_splits_of_a_request() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({"read_limit": {"rows": 4}}));
    let splits = list(&service, vec![users_select()]).await;

    let responses = read(
        &service,
        ReadSplitsRequest {
            splits,
            ..Default::default()
        },
    )
    .await;

    // split 0 reads three rows, split 1 fails on its second row
    let last = responses.last().unwrap();
    assert_eq!(last.split_id, 1);
    assert!(last.payload.is_none());
    assert_eq!(last.error.status, StatusCode::BadRequest);

    let delivered: u64 = responses.iter().map(|r| r.stats.rows).sum();
    assert!(delivered <= 4);
    assert_eq!(service.metrics().snapshot().read_limit_rejections, 1);
}

#[tokio::test]
async fn test_read_limit_resets_between_requests() {
    let dir = TempDir::new().unwrap();
    let service = service_with(&dir, json!({"read_limit": {"rows": 3}}));
    let splits = list(&service, vec![users_select()]).await;
    let first = vec![splits[0].clone()];

    for _ in 0..2 {
        let responses = read(
            &service,
            ReadSplitsRequest {
                splits: first.clone(),
                ..Default::default()
            },
        )
        .await;
        assert!(responses.iter().all(|r| r.error.is_success()));
        let rows: u64 = responses.iter().map(|r| r.stats.rows).sum();
        assert_eq!(rows, 3);
    }
}
