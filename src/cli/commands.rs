//! CLI command implementations
//!
//! Every command loads and validates the configuration first. Request
//! commands run the service in-process and print each response as one JSON
//! line.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::api::{
    DataSourceInstance, DataSourceKind, DescribeTableRequest, ErrorEnvelope, ListSplitsRequest,
    ListSplitsResponse, ReadSplitsRequest, ReadSplitsResponse, TypeMappingSettings,
};
use crate::config::ServerConfig;
use crate::observability::{log_event, Event, Logger};
use crate::server::{ConnectorService, HttpServer};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_json};

/// Responses buffered between the service and stdout
const OUTPUT_QUEUE_CAPACITY: usize = 8;

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config } => serve(&config),
        Command::CheckConfig { config } => check_config(&config),
        Command::Describe {
            config,
            kind,
            database,
            table,
        } => describe(&config, kind.into(), database, table),
        Command::ListSplits { config } => list_splits(&config, read_request()?),
        Command::ReadSplits { config } => read_splits(&config, read_request()?),
    }
}

fn load(config_path: &Path) -> CliResult<ServerConfig> {
    let config = ServerConfig::load(config_path)?;
    Logger::set_min_severity(config.logger.min_severity);
    let path = config_path.display().to_string();
    log_event(Event::ConfigLoaded, &[("path", path.as_str())]);
    Ok(config)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Start the connector server and block until shutdown
pub fn serve(config_path: &Path) -> CliResult<()> {
    log_event(Event::BootStart, &[]);
    let result = boot_and_serve(config_path);
    if let Err(e) = &result {
        log_event(
            Event::BootFailed,
            &[("code", e.code_str()), ("reason", e.message())],
        );
    }
    result
}

fn boot_and_serve(config_path: &Path) -> CliResult<()> {
    let config = load(config_path)?;
    let service = ConnectorService::from_config(&config)?;
    let server = HttpServer::new(&config, Arc::new(service));

    let addr = server.socket_addr().to_string();
    log_event(Event::BootComplete, &[("addr", addr.as_str())]);

    runtime()?.block_on(server.start())?;
    Ok(())
}

/// Validate configuration and catalogs, report the enabled data sources
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load(config_path)?;
    let service = ConnectorService::from_config(&config)?;
    let kinds: Vec<&str> = service
        .sources()
        .kinds()
        .iter()
        .map(DataSourceKind::as_str)
        .collect();
    write_json(&serde_json::json!({
        "status": "ok",
        "endpoint": config.endpoint.socket_addr(),
        "data_sources": kinds,
    }))
}

pub fn describe(
    config_path: &Path,
    kind: DataSourceKind,
    database: String,
    table: String,
) -> CliResult<()> {
    let config = load(config_path)?;
    let service = ConnectorService::from_config(&config)?;
    let request = DescribeTableRequest {
        data_source_instance: DataSourceInstance::new(kind, database),
        table,
        type_mapping_settings: TypeMappingSettings::default(),
    };

    let response = runtime()?.block_on(service.describe_table(request));
    write_json(&response)?;
    ensure_success(&response.error)
}

pub fn list_splits(config_path: &Path, request: ListSplitsRequest) -> CliResult<()> {
    let config = load(config_path)?;
    let service = ConnectorService::from_config(&config)?;

    runtime()?.block_on(async {
        let (tx, rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
        let call = async move { service.list_splits(request, &tx).await };
        let (result, last) = tokio::join!(call, print_responses(rx));
        result.map_err(|e| CliError::request_failed(e.to_string()))?;
        ensure_success(&last?)
    })
}

pub fn read_splits(config_path: &Path, request: ReadSplitsRequest) -> CliResult<()> {
    let config = load(config_path)?;
    let service = ConnectorService::from_config(&config)?;

    runtime()?.block_on(async {
        let (tx, rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
        let call = async move { service.read_splits(request, &tx).await };
        let (result, last) = tokio::join!(call, print_responses(rx));
        result.map_err(|e| CliError::request_failed(e.to_string()))?;
        ensure_success(&last?)
    })
}

/// Print every response until the sender is dropped; returns the last envelope
async fn print_responses<R: Enveloped>(mut rx: mpsc::Receiver<R>) -> CliResult<ErrorEnvelope> {
    let mut last = ErrorEnvelope::success();
    while let Some(response) = rx.recv().await {
        write_json(&response)?;
        last = response.envelope().clone();
    }
    Ok(last)
}

/// Streamed responses carrying an in-band status
trait Enveloped: Serialize {
    fn envelope(&self) -> &ErrorEnvelope;
}

impl Enveloped for ListSplitsResponse {
    fn envelope(&self) -> &ErrorEnvelope {
        &self.error
    }
}

impl Enveloped for ReadSplitsResponse {
    fn envelope(&self) -> &ErrorEnvelope {
        &self.error
    }
}

fn ensure_success(envelope: &ErrorEnvelope) -> CliResult<()> {
    if envelope.is_success() {
        Ok(())
    } else {
        Err(CliError::request_failed(format!(
            "{}: {}",
            envelope.status, envelope.message
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StatusCode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_check_config_rejects_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"paging": {{"bytes_per_page": 0, "rows_per_page": 0}}}}"#).unwrap();
        let err = check_config(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "FQ_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_check_config_accepts_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"datasources": {{"memory": {{}}}}}}"#).unwrap();
        check_config(file.path()).unwrap();
    }

    #[test]
    fn test_ensure_success() {
        assert!(ensure_success(&ErrorEnvelope::success()).is_ok());
        let failed = ErrorEnvelope {
            status: StatusCode::NotFound,
            message: "table does not exist: t".into(),
        };
        let err = ensure_success(&failed).unwrap_err();
        assert_eq!(err.message(), "NOT_FOUND: table does not exist: t");
    }

    #[test]
    fn test_describe_missing_table_fails() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"datasources": {{"memory": {{}}}}}}"#).unwrap();
        let err = describe(file.path(), DataSourceKind::Memory, "db".into(), "t".into())
            .unwrap_err();
        assert_eq!(err.code_str(), "FQ_CLI_REQUEST_FAILED");
    }
}
