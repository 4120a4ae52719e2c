//! Reconciliation state as recorded by the host.
//!
//! Each managed resource is stored under its address (`type.name`) with a
//! flat map of string attributes, the same shape the host hands to
//! post-apply checks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One managed resource in state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type, e.g. `azurerm_servicebus_namespace`.
    pub resource_type: String,
    /// Flat attributes. Map attributes are stored as `tags.%` and `tags.<key>`.
    pub attributes: BTreeMap<String, String>,
}

impl ResourceState {
    /// Build from a JSON resource state.
    pub fn from_value(resource_type: impl Into<String>, value: &Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: flatten_attributes(value),
        }
    }

    /// Look up a flat attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// All resources the host currently tracks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct State {
    /// Resources keyed by address.
    pub resources: BTreeMap<String, ResourceState>,
}

impl State {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource, replacing any previous entry at `address`.
    pub fn insert(&mut self, address: impl Into<String>, resource: ResourceState) {
        self.resources.insert(address.into(), resource);
    }

    /// Forget a resource.
    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        self.resources.remove(address)
    }

    /// Look up a resource by address.
    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Iterate resources of one type.
    pub fn of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a ResourceState)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }
}

/// Flatten a JSON object into string attributes.
///
/// Nulls are dropped; nested objects become `key.%` (count) plus `key.<k>`.
pub fn flatten_attributes(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Value::Object(map) = value {
        for (key, val) in map {
            flatten_into(key, val, &mut out);
        }
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {},
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        },
        Value::Bool(_) | Value::Number(_) => {
            out.insert(prefix.to_string(), value.to_string());
        },
        Value::Array(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", prefix, i), item, out);
            }
        },
        Value::Object(map) => {
            out.insert(format!("{}.%", prefix), map.len().to_string());
            for (key, val) in map {
                flatten_into(&format!("{}.{}", prefix, key), val, out);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_attributes() {
        let flat = flatten_attributes(&json!({
            "name": "ns1",
            "capacity": 2,
            "tags": {"env": "test"},
            "missing": null
        }));
        assert_eq!(flat["name"], "ns1");
        assert_eq!(flat["capacity"], "2");
        assert_eq!(flat["tags.%"], "1");
        assert_eq!(flat["tags.env"], "test");
        assert!(!flat.contains_key("missing"));
    }

    #[test]
    fn test_state_of_type() {
        let mut state = State::new();
        state.insert(
            "azurerm_servicebus_namespace.test",
            ResourceState::from_value("azurerm_servicebus_namespace", &json!({"name": "ns"})),
        );
        state.insert(
            "azurerm_resource_group.test",
            ResourceState::from_value("azurerm_resource_group", &json!({"name": "rg"})),
        );

        let namespaces: Vec<_> = state.of_type("azurerm_servicebus_namespace").collect();
        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[0].1.attribute("name"), Some("ns"));

        assert!(state.remove("azurerm_resource_group.test").is_some());
        assert!(state.get("azurerm_resource_group.test").is_none());
    }
}
