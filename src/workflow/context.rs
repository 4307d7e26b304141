//! Workflow Context
//!
//! The accumulating field map that flows through a workflow. Each
//! successful step merges its input and its action's result into it.
//! Fields are only ever added or overwritten; the map is emptied only on
//! cancel, restart, or hand-off at the terminal step.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Fields submitted for a step, or returned by its action.
pub type ContextUpdate = BTreeMap<String, Value>;

/// Builds a [`ContextUpdate`] from key/value pairs.
///
/// ```
/// use otpflow::workflow::context_update;
///
/// let input = context_update([("identifier", "alice"), ("secret", "x")]);
/// assert_eq!(input.len(), 2);
/// ```
pub fn context_update<I, K, V>(pairs: I) -> ContextUpdate
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Append-only mapping from field name to value.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct WorkflowContext {
    fields: BTreeMap<String, Value>,
}

impl WorkflowContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a field's value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the field as a string slice if it holds a JSON string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Like [`get_str`](Self::get_str), but a missing or blank field is a
    /// [`ValidationError::MissingField`].
    pub fn require_str(&self, field: &str) -> Result<&str, ValidationError> {
        match self.get_str(field) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ValidationError::MissingField(field.to_string())),
        }
    }

    /// Returns true if the field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field has been collected.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Sets a single field, overwriting any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Merges an update in, overwriting fields that already exist.
    pub fn merge(&mut self, update: ContextUpdate) {
        self.fields.extend(update);
    }

    /// Returns a copy of this context with `update` merged in.
    pub fn merged_with(&self, update: &ContextUpdate) -> Self {
        let mut snapshot = self.clone();
        snapshot.merge(update.clone());
        snapshot
    }

    /// Removes every field.
    pub(crate) fn clear(&mut self) {
        self.fields.clear();
    }
}

// Values can hold secrets, so only field names are printed.
impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_adds_and_overwrites() {
        let mut ctx = WorkflowContext::new();
        ctx.merge(context_update([("email", "a@example.com")]));
        ctx.merge(context_update([("email", "b@example.com"), ("code", "123456")]));

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get_str("email"), Some("b@example.com"));
        assert_eq!(ctx.get_str("code"), Some("123456"));
    }

    #[test]
    fn test_merged_with_leaves_original_untouched() {
        let mut ctx = WorkflowContext::new();
        ctx.insert("identifier", "alice");

        let snapshot = ctx.merged_with(&context_update([("secret", "x")]));

        assert!(snapshot.contains("secret"));
        assert!(!ctx.contains("secret"));
    }

    #[test]
    fn test_require_str_rejects_blank() {
        let mut ctx = WorkflowContext::new();
        ctx.insert("email", "   ");
        ctx.insert("count", 3);

        assert_eq!(
            ctx.require_str("email"),
            Err(ValidationError::MissingField("email".to_string()))
        );
        assert!(ctx.require_str("count").is_err());
        assert!(ctx.require_str("missing").is_err());
    }

    #[test]
    fn test_debug_hides_values() {
        let mut ctx = WorkflowContext::new();
        ctx.insert("secret", "hunter2");

        let rendered = format!("{:?}", ctx);
        assert!(rendered.contains("secret"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut ctx = WorkflowContext::new();
        ctx.insert("user", json!({"id": "1"}));

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, json!({"user": {"id": "1"}}));
    }
}
