//! Configuration validation.
//!
//! Field validators return a list of [`ValidationError`]s and never fail
//! eagerly; an empty list means the value is acceptable. [`validate`] checks
//! a JSON value against a [`Schema`] and [`validate_namespace_config`] runs
//! both the schema checks and the namespace field validators, producing
//! diagnostics for the host.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_servicebus::validation::validate_capacity;
//!
//! assert!(validate_capacity(2, "capacity").is_empty());
//!
//! let errors = validate_capacity(17, "capacity");
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].field, "capacity");
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::client::SkuName;
use crate::schema::{namespace_schema, Attribute, AttributeType, Diagnostic, Schema};

/// Messaging-unit counts accepted for a namespace.
pub const ALLOWED_CAPACITIES: [i64; 3] = [1, 2, 4];

const NAME_MIN_LEN: usize = 6;
const NAME_MAX_LEN: usize = 50;

/// A user-supplied value violates a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The configuration field at fault.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Field used for diagnostics that are not tied to one attribute.
const WHOLE_CONFIG: &str = "configuration";

impl From<Diagnostic> for ValidationError {
    fn from(diag: Diagnostic) -> Self {
        match (diag.attribute, diag.detail) {
            (Some(field), Some(detail)) => ValidationError::new(field, detail),
            (Some(field), None) => ValidationError::new(field, diag.summary),
            (None, Some(detail)) => {
                ValidationError::new(WHOLE_CONFIG, format!("{}: {}", diag.summary, detail))
            },
            (None, None) => ValidationError::new(WHOLE_CONFIG, diag.summary),
        }
    }
}

/// Error-level diagnostics of [`validate_namespace_config`], as field errors.
pub fn namespace_config_errors(config: &Value) -> Vec<ValidationError> {
    validate_namespace_config(config)
        .into_iter()
        .filter(Diagnostic::is_error)
        .map(ValidationError::from)
        .collect()
}

impl From<ValidationError> for Diagnostic {
    fn from(err: ValidationError) -> Self {
        Diagnostic::error(format!("Invalid value for attribute '{}'", err.field))
            .with_detail(err.message)
            .with_attribute(err.field)
    }
}

/// Validate a namespace capacity.
///
/// Returns exactly one error when `value` is not 1, 2 or 4.
pub fn validate_capacity(value: i64, field: &str) -> Vec<ValidationError> {
    if ALLOWED_CAPACITIES.contains(&value) {
        return Vec::new();
    }
    vec![ValidationError::new(
        field,
        format!(
            "must be one of 1, 2 or 4 for Premium SKU capacity, got {}",
            value
        ),
    )]
}

/// Validate a SKU name, ignoring case.
pub fn validate_sku(value: &str, field: &str) -> Vec<ValidationError> {
    match value.parse::<SkuName>() {
        Ok(_) => Vec::new(),
        Err(_) => vec![ValidationError::new(
            field,
            format!(
                "must be one of basic, standard or premium (case-insensitive), got {:?}",
                value
            ),
        )],
    }
}

/// Validate a namespace name.
///
/// Names are 6 to 50 characters of letters, digits and hyphens, start with a
/// letter and end with a letter or digit.
pub fn validate_namespace_name(value: &str, field: &str) -> Vec<ValidationError> {
    let len = value.chars().count();
    let valid_chars = value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    let starts_ok = value.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let ends_ok = value.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());

    if (NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) && valid_chars && starts_ok && ends_ok {
        return Vec::new();
    }
    vec![ValidationError::new(
        field,
        format!(
            "must be {}-{} characters of letters, numbers and hyphens, start with a letter and end with a letter or number, got {:?}",
            NAME_MIN_LEN, NAME_MAX_LEN, value
        ),
    )]
}

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attribute types must match the schema
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }
    diagnostics
}

/// Validate the configuration of an `azurerm_servicebus_namespace`.
///
/// Runs the schema type checks, then the field validators for every field
/// that has the right type. Any error diagnostic must block creation.
pub fn validate_namespace_config(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(&namespace_schema(), config);

    let field_errors = namespace_field_errors(config);
    diagnostics.extend(field_errors.into_iter().map(Diagnostic::from));
    diagnostics
}

/// Run the namespace field validators.
pub fn namespace_field_errors(config: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(name) = config.get("name").and_then(Value::as_str) {
        errors.extend(validate_namespace_name(name, "name"));
    }
    if let Some(sku) = config.get("sku").and_then(Value::as_str) {
        errors.extend(validate_sku(sku, "sku"));
    }
    if let Some(capacity) = config.get("capacity").and_then(Value::as_i64) {
        errors.extend(validate_capacity(capacity, "capacity"));
    }
    errors
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !value.is_i64() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_config() -> Value {
        json!({
            "name": "acctestservicebusnamespace-1234",
            "location": "westus",
            "resource_group_name": "acctestRG-1234",
            "sku": "basic"
        })
    }

    #[test]
    fn test_capacity_allowed_values() {
        for value in ALLOWED_CAPACITIES {
            assert!(validate_capacity(value, "capacity").is_empty());
        }
    }

    #[test]
    fn test_capacity_rejected_values() {
        for value in [17, 0, -1, 8, 3, i64::MAX, i64::MIN] {
            let errors = validate_capacity(value, "azurerm_servicebus_namespace");
            assert_eq!(errors.len(), 1, "expected one error for {}", value);
            assert_eq!(errors[0].field, "azurerm_servicebus_namespace");
            assert!(errors[0].message.contains(&value.to_string()));
            assert!(errors[0].message.contains("1, 2 or 4"));
        }
    }

    #[test]
    fn test_validation_error_display_and_diagnostic() {
        let err = validate_capacity(17, "capacity").remove(0);
        assert!(err.to_string().starts_with("capacity: "));

        let diag: Diagnostic = err.into();
        assert!(diag.is_error());
        assert_eq!(diag.attribute, Some("capacity".to_string()));
        assert!(diag.detail.unwrap().contains("17"));
    }

    #[test]
    fn test_validate_sku() {
        for sku in ["basic", "Basic", "STANDARD", "premium"] {
            assert!(validate_sku(sku, "sku").is_empty(), "{} should be valid", sku);
        }
        assert_eq!(validate_sku("gold", "sku").len(), 1);
        assert_eq!(validate_sku("", "sku").len(), 1);
    }

    #[test]
    fn test_validate_namespace_name() {
        assert!(validate_namespace_name("acctestservicebusnamespace-1", "name").is_empty());
        assert!(validate_namespace_name("abcdef", "name").is_empty());

        assert_eq!(validate_namespace_name("abc", "name").len(), 1);
        assert_eq!(validate_namespace_name("1abcdef", "name").len(), 1);
        assert_eq!(validate_namespace_name("abcdef-", "name").len(), 1);
        assert_eq!(validate_namespace_name("abc_def", "name").len(), 1);
        assert_eq!(validate_namespace_name(&"a".repeat(51), "name").len(), 1);
    }

    #[test]
    fn test_validate_namespace_config_valid() {
        assert!(validate_namespace_config(&valid_config()).is_empty());

        let mut config = valid_config();
        config["sku"] = json!("Premium");
        config["capacity"] = json!(4);
        config["tags"] = json!({"environment": "Production"});
        assert!(validate_namespace_config(&config).is_empty());
    }

    #[test]
    fn test_validate_namespace_config_bad_capacity() {
        let mut config = valid_config();
        config["capacity"] = json!(17);

        let diagnostics = validate_namespace_config(&config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("capacity".to_string()));
    }

    #[test]
    fn test_validate_namespace_config_missing_required() {
        let diagnostics = validate_namespace_config(&json!({"name": "acctestns-1"}));
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attrs, vec!["location", "resource_group_name", "sku"]);
    }

    #[test]
    fn test_validate_namespace_config_wrong_types() {
        let mut config = valid_config();
        config["capacity"] = json!("two");
        config["tags"] = json!({"count": 1});

        let diagnostics = validate_namespace_config(&config);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("tags.count")));
    }

    #[test]
    fn test_computed_attributes_are_not_validated() {
        let mut config = valid_config();
        config["default_primary_key"] = json!(123);
        assert!(validate_namespace_config(&config).is_empty());
    }

    #[test]
    fn test_namespace_config_errors() {
        assert!(namespace_config_errors(&valid_config()).is_empty());

        let mut config = valid_config();
        config["capacity"] = json!(17);
        config["sku"] = json!(3);
        let errors = namespace_config_errors(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .any(|e| e.field == "capacity" && e.message.contains("1, 2 or 4")));
        assert!(errors
            .iter()
            .any(|e| e.field == "sku" && e.message.contains("Expected string")));

        let errors = namespace_config_errors(&json!("nope"));
        assert_eq!(errors[0].field, "configuration");
        assert!(errors[0].message.contains("Expected object"));
    }

    #[test]
    fn test_validate_root_not_object() {
        let diagnostics = validate(&namespace_schema(), &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert_eq!(validate(&namespace_schema(), &json!([])).len(), 1);
    }
}
