//! Per-backend configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourcesConfig {
    #[serde(default)]
    pub memory: Option<MemoryConfig>,
    #[serde(default)]
    pub object_storage: Option<ObjectStorageConfig>,
}

/// Whether a backend evaluates predicates itself
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PushdownConfig {
    #[serde(default = "default_pushdown_enabled")]
    pub enabled: bool,
}

fn default_pushdown_enabled() -> bool {
    true
}

impl Default for PushdownConfig {
    fn default() -> Self {
        Self {
            enabled: default_pushdown_enabled(),
        }
    }
}

/// How a table is partitioned into splits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// One split per select
    #[default]
    WholeTable,
    /// Consecutive row ranges of at most `rows_per_split` rows
    BySize { rows_per_split: u64 },
    /// `shard_count` interleaved shards
    FixedShards { shard_count: u32 },
}

impl SplitPolicy {
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            SplitPolicy::BySize { rows_per_split: 0 } => {
                Err(ConfigError::invalid("splitting.rows_per_split must be > 0"))
            }
            SplitPolicy::FixedShards { shard_count: 0 } => {
                Err(ConfigError::invalid("splitting.shard_count must be > 0"))
            }
            _ => Ok(()),
        }
    }
}

/// Embedded relational catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// JSON catalog loaded at startup
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub pushdown: PushdownConfig,
    #[serde(default)]
    pub splitting: SplitPolicy,
}

/// CSV objects under a local root; each bucket is a directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    pub root: PathBuf,
}
