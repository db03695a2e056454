//! Server configuration
//!
//! A single JSON document, every field optional with a default, validated
//! once at startup. Paging thresholds are checked here so the read pipeline
//! never sees an inconsistent configuration at runtime.

mod datasources;
mod errors;
mod server;

pub use datasources::{
    DataSourcesConfig, MemoryConfig, ObjectStorageConfig, PushdownConfig, SplitPolicy,
};
pub use errors::{ConfigError, ConfigResult};
pub use server::{
    EndpointConfig, LoggerConfig, PagingConfig, ReadLimitConfig, ServerConfig,
    MAX_INTERCONNECT_MESSAGE_SIZE,
};
