//! The remote control-plane client abstraction.
//!
//! The concrete HTTP client lives outside this crate. Everything here models
//! only what the provider observes: status codes, error codes and the shape
//! of the namespace resource.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// HTTP status returned by the control plane for a missing resource.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Error codes that mean the resource (or its parent) is absent.
const NOT_FOUND_CODES: &[&str] = &[
    "NotFound",
    "ResourceNotFound",
    "ResourceGroupNotFound",
    "ParentResourceNotFound",
];

/// An error returned by the control-plane client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status: {}, code: {})",
    .status.map_or_else(|| "none".to_string(), |s| s.to_string()),
    .code.as_deref().unwrap_or("none"))]
pub struct ApiError {
    /// HTTP status code, if a response was received at all.
    pub status: Option<u16>,
    /// Service error code (e.g. `ResourceNotFound`).
    pub code: Option<String>,
    /// Raw error message.
    pub message: String,
}

impl ApiError {
    /// An error carrying an HTTP status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// A 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(STATUS_NOT_FOUND, message).with_code("ResourceNotFound")
    }

    /// An error raised before any response was received (network, auth, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Attach a service error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether this error means the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(STATUS_NOT_FOUND)
            || self
                .code
                .as_deref()
                .is_some_and(|c| NOT_FOUND_CODES.contains(&c))
    }
}

/// A response from the control plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body, if any.
    pub body: Option<T>,
}

impl<T> Response<T> {
    /// A 200 response with a body.
    pub fn ok(body: T) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    /// A response with only a status code.
    pub fn status(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Whether the status is 404.
    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_NOT_FOUND
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One page of a list operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation token for the next page, if any.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Service Bus pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuName {
    /// Basic tier.
    Basic,
    /// Standard tier.
    Standard,
    /// Premium tier (dedicated capacity units).
    Premium,
}

impl SkuName {
    /// All tiers.
    pub const ALL: [SkuName; 3] = [SkuName::Basic, SkuName::Standard, SkuName::Premium];

    /// The canonical name sent to the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkuName::Basic => "Basic",
            SkuName::Standard => "Standard",
            SkuName::Premium => "Premium",
        }
    }
}

impl fmt::Display for SkuName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkuName {
    type Err = String;

    /// Parses case-insensitively; `basic`, `Basic` and `BASIC` are the same tier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkuName::ALL
            .into_iter()
            .find(|sku| sku.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown SKU {:?}", s))
    }
}

/// SKU of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    /// Pricing tier.
    pub name: SkuName,
    /// Messaging units (premium only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

/// A Service Bus namespace as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// Opaque resource identifier.
    #[serde(default)]
    pub id: String,
    /// Namespace name.
    #[serde(default)]
    pub name: String,
    /// Region the namespace lives in.
    #[serde(default)]
    pub location: String,
    /// Pricing tier and capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    /// Resource tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// The `sb://` endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_bus_endpoint: Option<String>,
}

/// Parameters for `create_or_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceParams {
    /// Target region.
    pub location: String,
    /// Pricing tier and capacity.
    pub sku: Sku,
    /// Resource tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Keys of a shared access authorization rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeys {
    /// Rule name.
    pub key_name: String,
    /// Primary connection string (`Endpoint=sb://...`).
    pub primary_connection_string: String,
    /// Secondary connection string.
    pub secondary_connection_string: String,
    /// Primary key.
    pub primary_key: String,
    /// Secondary key.
    pub secondary_key: String,
}

/// Operations on Service Bus namespaces exposed by the control plane.
///
/// Implementations own retries, transport and credentials. Every method is a
/// single logical call; `delete` resolves only once the long-running
/// operation has finished.
#[async_trait]
pub trait NamespacesClient: Send + Sync {
    /// Fetch a namespace.
    async fn get(&self, resource_group: &str, name: &str) -> Result<Response<Namespace>, ApiError>;

    /// Fetch one page of every namespace in the subscription.
    ///
    /// Pass `None` for the first page and the previous page's `next` token after.
    async fn list_by_subscription(
        &self,
        continuation: Option<String>,
    ) -> Result<Page<Namespace>, ApiError>;

    /// Create a namespace or update it in place.
    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: NamespaceParams,
    ) -> Result<Response<Namespace>, ApiError>;

    /// Delete a namespace and wait for the operation to complete.
    async fn delete(&self, resource_group: &str, name: &str) -> Result<Response<()>, ApiError>;

    /// Read the keys of an authorization rule.
    async fn list_keys(
        &self,
        resource_group: &str,
        name: &str,
        authorization_rule: &str,
    ) -> Result<Response<AccessKeys>, ApiError>;
}

/// A shareable client handle.
pub type SharedClient = Arc<dyn NamespacesClient>;

/// Drain every page of `list_by_subscription`.
///
/// Fails if the client hands back a continuation token it already returned,
/// since following it would never terminate.
pub async fn list_all_by_subscription(
    client: &dyn NamespacesClient,
) -> Result<Vec<Namespace>, ApiError> {
    let mut namespaces = Vec::new();
    let mut continuation = None;
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = client.list_by_subscription(continuation.take()).await?;
        pages += 1;
        namespaces.extend(page.items);
        match page.next {
            Some(next) if !seen.insert(next.clone()) => {
                return Err(ApiError::transport(format!(
                    "list returned continuation token {:?} twice after {} pages",
                    next, pages
                )));
            },
            Some(next) => continuation = Some(next),
            None => break,
        }
    }

    debug!(pages, count = namespaces.len(), "Listed Service Bus namespaces");
    Ok(namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNamespacesClient;

    #[test]
    fn test_api_error_not_found_classification() {
        assert!(ApiError::not_found("gone").is_not_found());
        assert!(ApiError::new(404, "gone").is_not_found());
        assert!(ApiError::transport("x")
            .with_code("ResourceGroupNotFound")
            .is_not_found());
        assert!(!ApiError::new(500, "boom").is_not_found());
        assert!(!ApiError::new(409, "conflict").with_code("Conflict").is_not_found());
        assert!(!ApiError::transport("connection reset").is_not_found());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::new(429, "Too many requests").with_code("TooManyRequests");
        assert_eq!(
            err.to_string(),
            "Too many requests (status: 429, code: TooManyRequests)"
        );
        let err = ApiError::transport("dns failure");
        assert_eq!(err.to_string(), "dns failure (status: none, code: none)");
    }

    #[test]
    fn test_response_status_helpers() {
        let resp: Response<()> = Response::status(404);
        assert!(resp.is_not_found());
        assert!(!resp.is_success());
        assert!(Response::ok(()).is_success());
        assert!(Response::<()>::status(202).is_success());
    }

    #[test]
    fn test_sku_name_parsing_ignores_case() {
        assert_eq!("basic".parse::<SkuName>(), Ok(SkuName::Basic));
        assert_eq!("Basic".parse::<SkuName>(), Ok(SkuName::Basic));
        assert_eq!("PREMIUM".parse::<SkuName>(), Ok(SkuName::Premium));
        assert!("gold".parse::<SkuName>().is_err());
        assert_eq!(SkuName::Standard.to_string(), "Standard");
    }

    #[test]
    fn test_namespace_deserializes_arm_shape() {
        let ns: Namespace = serde_json::from_value(serde_json::json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns",
            "name": "ns",
            "location": "West Europe",
            "sku": {"name": "Standard"},
            "serviceBusEndpoint": "https://ns.servicebus.windows.net:443/"
        }))
        .unwrap();
        assert_eq!(ns.name, "ns");
        assert_eq!(ns.sku.unwrap().name, SkuName::Standard);
        assert!(ns.tags.is_empty());
        assert!(ns.service_bus_endpoint.is_some());
    }

    #[tokio::test]
    async fn test_list_all_drains_every_page() {
        let client = FakeNamespacesClient::new().with_page_size(2);
        for i in 0..5 {
            client.insert_namespace("rg1", &format!("ns{}", i), "westus");
        }

        let all = list_all_by_subscription(&client).await.unwrap();
        let names: Vec<_> = all.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["ns0", "ns1", "ns2", "ns3", "ns4"]);
        assert_eq!(client.list_calls(), 3);
    }

    /// Pages forever, always pointing back at the same token.
    struct LoopingPager;

    #[async_trait]
    impl NamespacesClient for LoopingPager {
        async fn get(&self, _: &str, _: &str) -> Result<Response<Namespace>, ApiError> {
            Ok(Response::status(404))
        }

        async fn list_by_subscription(
            &self,
            _continuation: Option<String>,
        ) -> Result<Page<Namespace>, ApiError> {
            Ok(Page {
                items: vec![Namespace::default()],
                next: Some("page-2".to_string()),
            })
        }

        async fn create_or_update(
            &self,
            _: &str,
            _: &str,
            _: NamespaceParams,
        ) -> Result<Response<Namespace>, ApiError> {
            Ok(Response::status(501))
        }

        async fn delete(&self, _: &str, _: &str) -> Result<Response<()>, ApiError> {
            Ok(Response::status(501))
        }

        async fn list_keys(&self, _: &str, _: &str, _: &str) -> Result<Response<AccessKeys>, ApiError> {
            Ok(Response::status(501))
        }
    }

    #[tokio::test]
    async fn test_list_all_stops_on_repeated_token() {
        let err = list_all_by_subscription(&LoopingPager).await.unwrap_err();
        assert!(err.message.contains("page-2"));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_all_propagates_errors() {
        let client = FakeNamespacesClient::new();
        client.fail_list(ApiError::new(403, "AuthorizationFailed"));
        let err = list_all_by_subscription(&client).await.unwrap_err();
        assert_eq!(err.status, Some(403));
    }
}
