//! Registry of data sources keyed by kind

use std::collections::HashMap;
use std::sync::Arc;

use super::memory::{MemoryCatalog, MemoryDataSource};
use super::object_storage::{LocalObjectStore, ObjectStorageDataSource};
use super::DataSource;
use crate::api::{ConnectorError, ConnectorResult, DataSourceKind};
use crate::config::{ConfigResult, DataSourcesConfig};
use crate::observability::{Event, Logger, MetricsRegistry};

/// Data sources available to the service.
///
/// Built once at startup and shared by every request; tests register
/// their own sources.
#[derive(Default, Clone)]
pub struct DataSourceCollection {
    sources: HashMap<DataSourceKind, Arc<dyn DataSource>>,
}

impl DataSourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every backend enabled in the configuration
    pub fn from_config(
        config: &DataSourcesConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> ConfigResult<Self> {
        let mut collection = Self::new();

        if let Some(memory) = &config.memory {
            let catalog = match &memory.catalog_path {
                Some(path) => MemoryCatalog::load(path)?,
                None => MemoryCatalog::new(),
            };
            collection.register(Arc::new(MemoryDataSource::new(
                catalog,
                memory.clone(),
                metrics.clone(),
            )));
        }

        if let Some(object_storage) = &config.object_storage {
            let store = LocalObjectStore::new(&object_storage.root);
            collection.register(Arc::new(ObjectStorageDataSource::new(
                Arc::new(store),
                metrics,
            )));
        }

        Ok(collection)
    }

    /// Registers `source` under its kind, replacing any previous one
    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        let kind = source.kind();
        Logger::info(
            Event::DataSourceRegistered.as_str(),
            &[("data_source_kind", kind.as_str())],
        );
        self.sources.insert(kind, source);
    }

    pub fn get(&self, kind: DataSourceKind) -> ConnectorResult<Arc<dyn DataSource>> {
        self.sources
            .get(&kind)
            .cloned()
            .ok_or_else(|| ConnectorError::DataSourceNotSupported(kind.as_str().to_string()))
    }

    pub fn kinds(&self) -> Vec<DataSourceKind> {
        let mut kinds: Vec<_> = self.sources.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
