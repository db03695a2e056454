//! Request Context
//!
//! Carried through one RPC from the service down to the data source.
//! Holds the query id and the annotations every log line of the request
//! repeats.

use std::collections::BTreeMap;
use std::time::Instant;

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub query_id: Uuid,

    /// RPC name, e.g. `read_splits`
    pub method: &'static str,

    query_id_text: String,
    annotations: BTreeMap<&'static str, String>,
    started_at: Instant,
}

impl RequestContext {
    pub fn new(method: &'static str) -> Self {
        let query_id = Uuid::new_v4();
        Self {
            query_id,
            method,
            query_id_text: query_id.to_string(),
            annotations: BTreeMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn query_id_str(&self) -> &str {
        &self.query_id_text
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Adds a log annotation such as `table` or `data_source_kind`
    pub fn with_annotation(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.annotate(key, value);
        self
    }

    pub fn annotate(&mut self, key: &'static str, value: impl Into<String>) {
        self.annotations.insert(key, value.into());
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// `method`, `query_id` and all annotations, ready for the logger
    pub fn log_fields(&self) -> Vec<(&str, &str)> {
        let mut fields = Vec::with_capacity(self.annotations.len() + 2);
        fields.push(("method", self.method));
        fields.push(("query_id", self.query_id_text.as_str()));
        fields.extend(self.annotations.iter().map(|(k, v)| (*k, v.as_str())));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_fields() {
        let ctx = RequestContext::new("read_splits")
            .with_annotation("table", "users")
            .with_annotation("data_source_kind", "memory");

        let fields = ctx.log_fields();
        assert_eq!(fields[0], ("method", "read_splits"));
        assert_eq!(fields[1].0, "query_id");
        assert_eq!(fields[1].1, ctx.query_id.to_string());
        assert!(fields.contains(&("table", "users")));
        assert!(fields.contains(&("data_source_kind", "memory")));
    }

    #[test]
    fn test_annotations_overwrite() {
        let mut ctx = RequestContext::new("describe_table");
        ctx.annotate("table", "a");
        ctx.annotate("table", "b");
        assert_eq!(ctx.annotation("table"), Some("b"));
        assert_eq!(ctx.log_fields().len(), 3);
    }

    #[test]
    fn test_unique_query_ids() {
        assert_ne!(
            RequestContext::new("list_splits").query_id,
            RequestContext::new("list_splits").query_id
        );
    }
}
