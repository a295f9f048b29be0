//! Value types exchanged between the planning engine and the provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One top-level attribute or block that differs between prior and planned
/// state. `before` is `None` for additions, `after` is `None` for removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute or block name, e.g. `description` or `handler`.
    pub path: String,
    /// Prior value.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// An attribute that was unset before.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// An attribute that is unset after.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }

    /// Whether this change adds a previously unset attribute.
    pub fn is_addition(&self) -> bool {
        self.before.is_none()
    }
}

/// Outcome of [`crate::plan::plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the apply step receives; `null` for a destroy.
    pub planned_state: Value,
    /// Differences against the prior state, sorted by name.
    pub changes: Vec<AttributeChange>,
    /// A `force_new` attribute such as a webhook `key` changed.
    pub requires_replace: bool,
}

impl PlanResult {
    pub(crate) fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan would do nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.requires_replace
    }

    /// Names of every changed attribute.
    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// A remote object brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name, e.g. `artifactory_build_webhook`.
    pub resource_type: String,
    /// State read from Artifactory.
    pub state: Value,
}

impl ImportedResource {
    /// Pair `state` with its resource type.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Registered types and capabilities of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    /// Optional protocol features.
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features a provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// `plan` accepts a `null` proposed state and reports a destroy.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_kinds() {
        let added = AttributeChange::added("key", json!("hook"));
        assert!(added.is_addition());
        assert_eq!(added.after, Some(json!("hook")));

        let removed = AttributeChange::removed("description", json!("old"));
        assert!(!removed.is_addition());
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("enabled", json!(true), json!(false));
        assert_eq!(modified.before, Some(json!(true)));
        assert_eq!(modified.after, Some(json!(false)));
    }

    #[test]
    fn test_plan_result_emptiness() {
        let unchanged = PlanResult::with_changes(json!({"id": "hook"}), Vec::new(), false);
        assert!(unchanged.is_empty());

        let update = PlanResult::with_changes(
            json!({"id": "hook", "description": "new"}),
            vec![AttributeChange::modified("description", json!("old"), json!("new"))],
            false,
        );
        assert!(!update.is_empty());
        assert_eq!(update.changed_paths(), vec!["description"]);
    }

    #[test]
    fn test_metadata_serializes_capabilities() {
        let metadata = ProviderMetadata {
            resources: vec!["artifactory_build_webhook".into()],
            data_sources: Vec::new(),
            capabilities: ServerCapabilities { plan_destroy: true },
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["capabilities"]["plan_destroy"], true);
    }
}
