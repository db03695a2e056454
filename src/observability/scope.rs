//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when finished explicitly
//! - Logs `{name}_INCOMPLETE` on drop otherwise
//!
//! Fields given at creation are repeated on every line of the scope, so a
//! request's `query_id` ties its lines together.

use super::logger::Logger;

/// A scope that logs the start and end of one unit of work
///
/// ```ignore
/// let scope = ObservationScope::new("READ_SPLITS", &[("query_id", &id)]);
/// // ... do work ...
/// scope.complete_with_fields(&[("rows", "42")]);
/// ```
pub struct ObservationScope {
    name: String,
    completed: bool,
    fields: Vec<(String, String)>,
}

impl ObservationScope {
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name: name.to_string(),
            completed: false,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logs `{name}_COMPLETE` at INFO level.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let fields = self.merged(extra_fields);
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Logs `{name}_FAILED` at ERROR level.
    pub fn fail(self, reason: &str) {
        self.fail_with_fields(reason, &[]);
    }

    pub fn fail_with_fields(mut self, reason: &str, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let mut fields = self.merged(extra_fields);
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn merged<'s>(&'s self, extra_fields: &[(&'s str, &'s str)]) -> Vec<(&'s str, &'s str)> {
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fields.extend(extra_fields.iter().copied());
        fields
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            let mut fields = self.merged(&[]);
            fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
