//! Schema types for describing the provider and the namespace resource.
//!
//! Schemas describe the shape of provider configuration and of the
//! `azurerm_servicebus_namespace` resource. They drive config validation and
//! plan computation (force-new and sensitive attributes, defaults).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type name of a Service Bus namespace.
pub const NAMESPACE_RESOURCE_TYPE: &str = "azurerm_servicebus_namespace";

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean value.
    Bool,
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider (read-only).
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// If set, values that differ only by ASCII case are the same value.
    #[serde(default)]
    pub case_insensitive: bool,
    /// Default value for the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            case_insensitive: false,
            default: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Create an optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Compare values of this attribute ignoring ASCII case.
    pub fn with_case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Whether only the provider sets this attribute.
    pub fn is_computed_only(&self) -> bool {
        self.flags.computed && !self.flags.optional && !self.flags.required
    }

    /// Whether two values of this attribute are semantically equal.
    ///
    /// Null and an empty map are the same as an absent value.
    pub fn values_equal(&self, a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> bool {
        let a = a.filter(|v| !is_empty_value(v));
        let b = b.filter(|v| !is_empty_value(v));
        match (a, b) {
            (Some(serde_json::Value::String(x)), Some(serde_json::Value::String(y)))
                if self.case_insensitive =>
            {
                x.eq_ignore_ascii_case(y)
            },
            _ => a == b,
        }
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Schema for a resource or for provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// The version of this schema (for state upgrades).
    #[serde(default)]
    pub version: u64,
    /// Attributes keyed by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::default()
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }
}

/// Schema for the provider configuration and its resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas for each resource type.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }
}

/// Schema of the provider block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "subscription_id",
            Attribute::optional_string()
                .with_description("Subscription to manage. Falls back to ARM_SUBSCRIPTION_ID."),
        )
        .with_attribute(
            "environment",
            Attribute::optional_string()
                .with_description("Cloud environment. Falls back to ARM_ENVIRONMENT, then public."),
        )
        .with_attribute("skip_provider_registration", Attribute::optional_bool())
}

/// Schema of `azurerm_servicebus_namespace`.
pub fn namespace_schema() -> Schema {
    Schema::v0()
        .with_attribute("name", Attribute::required_string().with_force_new())
        .with_attribute("location", Attribute::required_string().with_force_new())
        .with_attribute(
            "resource_group_name",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute(
            "sku",
            Attribute::required_string()
                .with_force_new()
                .with_case_insensitive()
                .with_description("One of basic, standard or premium."),
        )
        .with_attribute(
            "capacity",
            Attribute::optional_int64()
                .with_force_new()
                .with_default(serde_json::json!(1))
                .with_description("Messaging units for the premium tier: 1, 2 or 4."),
        )
        .with_attribute(
            "tags",
            Attribute::new(
                AttributeType::map(AttributeType::String),
                AttributeFlags::optional(),
            ),
        )
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "default_primary_connection_string",
            Attribute::computed_string().sensitive(),
        )
        .with_attribute(
            "default_secondary_connection_string",
            Attribute::computed_string().sensitive(),
        )
        .with_attribute("default_primary_key", Attribute::computed_string().sensitive())
        .with_attribute("default_secondary_key", Attribute::computed_string().sensitive())
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic blocks the operation.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
