//! Parsing of Azure Resource Manager resource identifiers.
//!
//! An identifier looks like:
//!
//! ```text
//! /subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.ServiceBus/namespaces/{name}
//! ```
//!
//! It is decomposed into key/value pairs where the key is the resource-type
//! segment and the value is the instance name.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_servicebus::resource_id::ResourceIdentifier;
//!
//! let id = ResourceIdentifier::parse(
//!     "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.ServiceBus/namespaces/ns1",
//! )
//! .unwrap();
//!
//! assert_eq!(id.resource_group, "rg1");
//! assert_eq!(id.path.get("namespaces").map(String::as_str), Some("ns1"));
//! assert_eq!(id.provider.as_deref(), Some("Microsoft.ServiceBus"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when an identifier does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The identifier was empty.
    #[error("cannot parse an empty resource ID")]
    Empty,

    /// The path does not decompose into key/value pairs.
    #[error("the number of path segments is not divisible by 2 in {0:?}")]
    OddSegments(String),

    /// A key or value segment was empty (e.g. `//` in the path).
    #[error("key/value cannot be empty strings in {path:?} (key: {key:?}, value: {value:?})")]
    EmptySegment {
        /// The offending path.
        path: String,
        /// The key segment.
        key: String,
        /// The value segment.
        value: String,
    },

    /// No `subscriptions` segment was present.
    #[error("no subscription ID found in {0:?}")]
    MissingSubscription(String),

    /// No `resourceGroups` segment was present.
    #[error("no resource group name found in {0:?}")]
    MissingResourceGroup(String),

    /// A typed segment required by the caller was missing.
    #[error("no {segment:?} segment found in {path:?}")]
    MissingSegment {
        /// The segment the caller asked for.
        segment: String,
        /// The offending path.
        path: String,
    },
}

/// A parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentifier {
    /// The subscription the resource lives in.
    pub subscription_id: String,
    /// The resource group name.
    pub resource_group: String,
    /// The resource provider namespace (e.g. `Microsoft.ServiceBus`), if any.
    pub provider: Option<String>,
    /// Remaining typed segments, keyed by resource type.
    pub path: BTreeMap<String, String>,
}

impl ResourceIdentifier {
    /// Parse a raw identifier string.
    ///
    /// Fails if the path has an odd number of segments, an empty key or
    /// value, or no subscription or resource group segment. Resource types
    /// that appear more than once keep their last value.
    pub fn parse(id: &str) -> Result<Self, ParseError> {
        let path = id.trim().trim_start_matches('/').trim_end_matches('/');
        if path.is_empty() {
            return Err(ParseError::Empty);
        }

        let components: Vec<&str> = path.split('/').collect();
        if components.len() % 2 != 0 {
            return Err(ParseError::OddSegments(path.to_string()));
        }

        let mut subscription_id = None;
        let mut segments = BTreeMap::new();

        for pair in components.chunks_exact(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(ParseError::EmptySegment {
                    path: path.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }

            // A nested `subscriptions` segment (topic subscriptions) must not
            // clobber the subscription id.
            if key == "subscriptions" && subscription_id.is_none() {
                subscription_id = Some(value.to_string());
            } else {
                segments.insert(key.to_string(), value.to_string());
            }
        }

        let subscription_id =
            subscription_id.ok_or_else(|| ParseError::MissingSubscription(path.to_string()))?;

        // Some APIs hand back the lower-case form.
        let resource_group = segments
            .remove("resourceGroups")
            .or_else(|| segments.remove("resourcegroups"))
            .ok_or_else(|| ParseError::MissingResourceGroup(path.to_string()))?;

        let provider = segments.remove("providers");

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path: segments,
        })
    }

    /// Look up the instance name for a resource type segment.
    pub fn segment(&self, resource_type: &str) -> Result<&str, ParseError> {
        self.path
            .get(resource_type)
            .map(String::as_str)
            .ok_or_else(|| ParseError::MissingSegment {
                segment: resource_type.to_string(),
                path: self.to_string(),
            })
    }
}

impl FromStr for ResourceIdentifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}

/// Build the identifier of a Service Bus namespace.
pub fn namespace_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ServiceBus/namespaces/{}",
        subscription_id, resource_group, name
    )
}
