//! Request types for the three connector RPCs

use serde::{Deserialize, Serialize};

use super::expr::Predicate;
use super::types::{Column, Schema};

/// Kind of backing store behind a data source instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    #[default]
    Unspecified,
    /// Embedded relational catalog
    Memory,
    /// CSV objects in an object store
    ObjectStorage,
    Postgresql,
    Clickhouse,
    Mysql,
    Mongodb,
    Redis,
    Opensearch,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceKind::Unspecified => "unspecified",
            DataSourceKind::Memory => "memory",
            DataSourceKind::ObjectStorage => "object_storage",
            DataSourceKind::Postgresql => "postgresql",
            DataSourceKind::Clickhouse => "clickhouse",
            DataSourceKind::Mysql => "mysql",
            DataSourceKind::Mongodb => "mongodb",
            DataSourceKind::Redis => "redis",
            DataSourceKind::Opensearch => "opensearch",
        }
    }

    /// Whether instances of this kind are reached over the network
    pub fn requires_endpoint(&self) -> bool {
        !matches!(
            self,
            DataSourceKind::Unspecified | DataSourceKind::Memory | DataSourceKind::ObjectStorage
        )
    }
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Coordinates of one backing store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceInstance {
    pub kind: DataSourceKind,
    #[serde(default)]
    pub endpoint: Option<Endpoint>,
    /// Database name; the bucket for object storage
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub use_tls: bool,
}

impl DataSourceInstance {
    pub fn new(kind: DataSourceKind, database: impl Into<String>) -> Self {
        Self {
            kind,
            database: database.into(),
            ..Default::default()
        }
    }
}

/// How temporal native types are exposed in described schemas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeFormat {
    /// Native date/datetime/timestamp wire types
    #[default]
    YqlFormat,
    /// UTF-8 strings
    StringFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMappingSettings {
    #[serde(default)]
    pub date_time_format: DateTimeFormat,
}

/// The unit of logical intent: which columns of which table, under which filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub data_source_instance: DataSourceInstance,
    /// Table name, or object key for object storage
    pub table: String,
    #[serde(default)]
    pub what: Vec<Column>,
    #[serde(rename = "where", default)]
    pub filter: Option<Predicate>,
    /// Column layout for schemaless stores
    #[serde(default)]
    pub predefined_schema: Option<Schema>,
}

impl Select {
    pub fn new(instance: DataSourceInstance, table: impl Into<String>, what: Vec<Column>) -> Self {
        Self {
            data_source_instance: instance,
            table: table.into(),
            what,
            filter: None,
            predefined_schema: None,
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// One independently readable slice of a select's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub id: u64,
    pub select: Select,
    /// Backend-specific locator
    #[serde(with = "super::bytes", default)]
    pub description: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeTableRequest {
    pub data_source_instance: DataSourceInstance,
    pub table: String,
    #[serde(default)]
    pub type_mapping_settings: TypeMappingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSplitsRequest {
    pub selects: Vec<Select>,
    #[serde(default)]
    pub max_split_count: u32,
    #[serde(default)]
    pub split_number_limit: u64,
    #[serde(default)]
    pub split_size: u64,
}

/// Columnar encoding of result pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Resolved to the server's configured default
    #[default]
    Unspecified,
    ArrowIpcStreaming,
    ColumnSet,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Unspecified => "unspecified",
            Format::ArrowIpcStreaming => "arrow_ipc_streaming",
            Format::ColumnSet => "column_set",
        }
    }
}

/// Caller's policy for predicates a data source cannot push down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filtering {
    /// Treated as `Optional`
    #[default]
    Unspecified,
    Optional,
    Mandatory,
}

impl Filtering {
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Filtering::Mandatory)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadSplitsRequest {
    pub splits: Vec<Split>,
    #[serde(default)]
    pub format: Format,
    #[serde(default)]
    pub filtering: Filtering,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_read_splits_request_defaults() {
        let json = r#"{"splits": []}"#;
        let request: ReadSplitsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.format, Format::Unspecified);
        assert_eq!(request.filtering, Filtering::Unspecified);
        assert!(!request.filtering.is_mandatory());
    }

    #[test]
    fn test_select_where_field_name() {
        let json = r#"{
            "data_source_instance": {"kind": "memory", "database": "shop"},
            "table": "orders",
            "where": {"is_null": {"column": "note"}}
        }"#;
        let select: Select = serde_json::from_str(json).unwrap();
        assert_eq!(select.data_source_instance.kind, DataSourceKind::Memory);
        assert!(select.filter.is_some());
        assert!(select.what.is_empty());
    }

    #[test]
    fn test_requires_endpoint() {
        assert!(DataSourceKind::Postgresql.requires_endpoint());
        assert!(!DataSourceKind::Memory.requires_endpoint());
        assert!(!DataSourceKind::ObjectStorage.requires_endpoint());
    }
}
