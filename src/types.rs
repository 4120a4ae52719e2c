//! Convenience types for provider operations.

use serde::{Deserialize, Serialize};

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of sweeper names.
    pub sweepers: Vec<String>,
}
