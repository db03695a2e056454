//! Top-level server configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::datasources::DataSourcesConfig;
use super::errors::{ConfigError, ConfigResult};
use crate::api::Format;
use crate::observability::Severity;

/// Largest message the federation engine accepts; no page may exceed it
pub const MAX_INTERCONNECT_MESSAGE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2130
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl EndpointConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

fn default_min_severity() -> Severity {
    Severity::Info
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_severity: default_min_severity(),
        }
    }
}

/// Page boundary thresholds; zero disables a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_bytes_per_page")]
    pub bytes_per_page: u64,
    #[serde(default)]
    pub rows_per_page: u64,
    /// Sealed pages buffered ahead of the network sender
    #[serde(default = "default_prefetch_queue_capacity")]
    pub prefetch_queue_capacity: usize,
}

fn default_bytes_per_page() -> u64 {
    4 * 1024 * 1024
}

fn default_prefetch_queue_capacity() -> usize {
    2
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            bytes_per_page: default_bytes_per_page(),
            rows_per_page: 0,
            prefetch_queue_capacity: default_prefetch_queue_capacity(),
        }
    }
}

impl PagingConfig {
    pub fn with_rows_per_page(rows_per_page: u64) -> Self {
        Self {
            rows_per_page,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.bytes_per_page == 0 && self.rows_per_page == 0 {
            return Err(ConfigError::invalid(
                "paging: at least one of bytes_per_page, rows_per_page must be set",
            ));
        }
        if self.bytes_per_page > MAX_INTERCONNECT_MESSAGE_SIZE {
            return Err(ConfigError::invalid(format!(
                "paging: bytes_per_page {} exceeds the interconnect limit of {} bytes",
                self.bytes_per_page, MAX_INTERCONNECT_MESSAGE_SIZE
            )));
        }
        if self.prefetch_queue_capacity == 0 {
            return Err(ConfigError::invalid("paging: prefetch_queue_capacity must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadLimitConfig {
    /// Maximum rows one request may read across all its splits
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub paging: PagingConfig,

    #[serde(default)]
    pub read_limit: Option<ReadLimitConfig>,

    /// Format used when a read request leaves it unspecified
    #[serde(default = "default_response_format")]
    pub response_format_default: Format,

    #[serde(default)]
    pub datasources: DataSourcesConfig,

    /// CORS allowed origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_response_format() -> Format {
    Format::ArrowIpcStreaming
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            logger: LoggerConfig::default(),
            paging: PagingConfig::default(),
            read_limit: None,
            response_format_default: default_response_format(),
            datasources: DataSourcesConfig::default(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: ServerConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(ConfigError::invalid("endpoint: host must not be empty"));
        }
        if self.endpoint.port == 0 {
            return Err(ConfigError::invalid("endpoint: port must be in 1..65535"));
        }

        self.paging.validate()?;

        if let Some(limit) = &self.read_limit {
            if limit.rows == 0 {
                return Err(ConfigError::invalid("read_limit: rows must be > 0"));
            }
        }

        if self.response_format_default == Format::Unspecified {
            return Err(ConfigError::invalid(
                "response_format_default must name a concrete format",
            ));
        }

        if let Some(memory) = &self.datasources.memory {
            memory.splitting.validate()?;
        }
        if let Some(object_storage) = &self.datasources.object_storage {
            if object_storage.root.as_os_str().is_empty() {
                return Err(ConfigError::invalid("object_storage: root must not be empty"));
            }
        }

        Ok(())
    }
}
