//! The provider service and the `azurerm_servicebus_namespace` resource.
//!
//! [`ProviderService`] is the interface the host drives. [`NamespaceProvider`]
//! implements it for Service Bus namespaces on top of a [`NamespacesClient`].
//!
//! [`NamespacesClient`]: crate::client::NamespacesClient

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::{AccessKeys, ApiError, Namespace, NamespaceParams, Response, SharedClient, Sku};
use crate::config::{ProviderConfig, SweepConfig};
use crate::destroy::DestroyVerifier;
use crate::error::ProviderError;
use crate::existence::{classify, Existence, ExistenceChecker};
use crate::resource_id::ResourceIdentifier;
use crate::schema::{
    namespace_schema, provider_config_schema, Diagnostic, ProviderSchema, Schema,
    NAMESPACE_RESOURCE_TYPE,
};
use crate::sweep::{normalize_location, Sweeper, SWEEPER_NAME};
use crate::types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation::{namespace_config_errors, validate, validate_namespace_config};

/// Authorization rule every namespace is created with.
pub const ROOT_MANAGE_RULE: &str = "RootManageSharedAccessKey";

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: i64 = 1;

/// Trait the host drives to manage resources.
///
/// This uses plain JSON values for configuration and state, the same shape
/// the host stores.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.schema().resources.keys().cloned().collect(),
            sweepers: Vec::new(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider. Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. A null `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    ///
    /// Returns [`ProviderError::NotFound`] when the resource is gone, so the
    /// host can drop it from state.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// Configuration of a namespace resource, as written by the user.
#[derive(Debug, Clone, Deserialize)]
struct NamespaceConfig {
    name: String,
    location: String,
    resource_group_name: String,
    sku: String,
    #[serde(default)]
    capacity: Option<i64>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

impl NamespaceConfig {
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    fn params(&self) -> Result<NamespaceParams, ProviderError> {
        let name = self.sku.parse().map_err(ProviderError::Validation)?;
        Ok(NamespaceParams {
            location: normalize_location(&self.location),
            sku: Sku {
                name,
                capacity: Some(self.capacity.unwrap_or(DEFAULT_CAPACITY)),
            },
            tags: self.tags.clone().unwrap_or_default(),
        })
    }
}

/// Manages `azurerm_servicebus_namespace` resources.
pub struct NamespaceProvider {
    client: SharedClient,
    checker: ExistenceChecker,
    config: RwLock<Option<ProviderConfig>>,
}

impl NamespaceProvider {
    /// Create an unconfigured provider over `client`.
    pub fn new(client: SharedClient) -> Self {
        Self {
            checker: ExistenceChecker::new(client.clone()),
            client,
            config: RwLock::new(None),
        }
    }

    /// Create a provider that is already configured.
    pub fn with_config(client: SharedClient, config: ProviderConfig) -> Self {
        Self {
            checker: ExistenceChecker::new(client.clone()),
            client,
            config: RwLock::new(Some(config)),
        }
    }

    /// The current provider configuration, if `configure` has succeeded.
    pub async fn provider_config(&self) -> Option<ProviderConfig> {
        self.config.read().await.clone()
    }

    /// An existence checker sharing this provider's client.
    pub fn existence_checker(&self) -> ExistenceChecker {
        self.checker.clone()
    }

    /// A destroy verifier sharing this provider's client.
    pub fn destroy_verifier(&self) -> DestroyVerifier {
        DestroyVerifier::new(self.client.clone())
    }

    /// A sweeper sharing this provider's client.
    pub fn sweeper(&self, config: SweepConfig) -> Sweeper {
        Sweeper::new(self.client.clone(), config)
    }

    fn ensure_namespace_type(resource_type: &str) -> Result<(), ProviderError> {
        if resource_type == NAMESPACE_RESOURCE_TYPE {
            Ok(())
        } else {
            Err(ProviderError::UnknownResource(resource_type.to_string()))
        }
    }

    async fn read_namespace(&self, resource_group: &str, name: &str) -> Result<Value, ProviderError> {
        let namespace = match self.checker.check(resource_group, name).await {
            Existence::Found(namespace) => namespace,
            Existence::NotFound => {
                return Err(ProviderError::NotFound(format!(
                    "Service Bus Namespace {:?} (resource group: {:?})",
                    name, resource_group
                )))
            },
            Existence::Error(err) => {
                return Err(ProviderError::api(
                    format!(
                        "Error making Read request on Service Bus Namespace {:?} (resource group: {:?})",
                        name, resource_group
                    ),
                    err,
                ))
            },
        };

        let keys = self.read_keys(resource_group, name).await;
        Ok(namespace_state(&namespace, resource_group, keys.as_ref()))
    }

    /// Keys are best effort; a namespace without readable keys is still read.
    async fn read_keys(&self, resource_group: &str, name: &str) -> Option<AccessKeys> {
        match self.client.list_keys(resource_group, name, ROOT_MANAGE_RULE).await {
            Ok(Response {
                body: Some(keys), ..
            }) => Some(keys),
            Ok(resp) => {
                warn!(name = %name, status = resp.status, "Default keys response had no body");
                None
            },
            Err(err) => {
                warn!(name = %name, error = %err, "Unable to list default keys for Service Bus Namespace");
                None
            },
        }
    }

    async fn apply(&self, planned_state: &Value, verb: &str) -> Result<Value, ProviderError> {
        let errors = namespace_config_errors(planned_state);
        if let Some(err) = ProviderError::from_validation_errors(&errors) {
            warn!(error = %err, "Refusing to {} Service Bus Namespace with invalid configuration", verb);
            return Err(err);
        }

        let config = NamespaceConfig::from_value(planned_state)?;
        let params = config.params()?;

        info!(
            name = %config.name,
            resource_group = %config.resource_group_name,
            sku = %params.sku.name,
            "Submitting Service Bus Namespace"
        );
        let result = self
            .client
            .create_or_update(&config.resource_group_name, &config.name, params)
            .await;
        require_success(result, || {
            format!(
                "Error {} Service Bus Namespace {:?} (resource group: {:?})",
                verb, config.name, config.resource_group_name
            )
        })?;

        self.read_namespace(&config.resource_group_name, &config.name)
            .await
    }
}

#[async_trait::async_trait]
impl ProviderService for NamespaceProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(NAMESPACE_RESOURCE_TYPE, namespace_schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: vec![NAMESPACE_RESOURCE_TYPE.to_string()],
            sweepers: vec![SWEEPER_NAME.to_string()],
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        if config.is_null() {
            return Ok(vec![]);
        }
        Ok(validate(&provider_config_schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        match ProviderConfig::from_value(config) {
            Ok(parsed) => {
                info!(environment = %parsed.environment(), "Provider configured");
                *self.config.write().await = Some(parsed);
                Ok(vec![])
            },
            Err(err) => Ok(vec![Diagnostic::error(err.to_string())]),
        }
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        Ok(validate_namespace_config(&config))
    }

    #[instrument(skip(self, prior_state, proposed_state), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        let schema = namespace_schema();

        if proposed_state.is_null() {
            let changes = prior_state
                .as_ref()
                .and_then(|prior| prior.get("id"))
                .map(|id| vec![AttributeChange::removed("id", id.clone())])
                .unwrap_or_default();
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        }

        let proposed = normalized_proposal(&schema, proposed_state)?;

        let Some(prior) = prior_state else {
            let changes = schema
                .attributes
                .iter()
                .filter(|(_, attr)| !attr.is_computed_only())
                .filter_map(|(name, _)| {
                    proposed
                        .get(name)
                        .map(|value| AttributeChange::added(name.clone(), value.clone()))
                })
                .collect();
            return Ok(PlanResult::with_changes(Value::Object(proposed), changes, false));
        };

        let mut planned = prior.as_object().cloned().ok_or_else(|| {
            ProviderError::InvalidRequest("prior state must be an object".to_string())
        })?;
        let mut changes = Vec::new();
        let mut requires_replace = false;

        for (name, attr) in schema.attributes.iter().filter(|(_, a)| !a.is_computed_only()) {
            let before = planned.get(name).cloned();
            let after = proposed.get(name);
            if attr.values_equal(before.as_ref(), after) {
                continue;
            }

            requires_replace |= attr.force_new;
            changes.push(AttributeChange::new(name.clone(), before, after.cloned()));
            match after {
                Some(value) => planned.insert(name.clone(), value.clone()),
                None => planned.remove(name),
            };
        }

        if requires_replace {
            for (name, _) in schema.attributes.iter().filter(|(_, a)| a.is_computed_only()) {
                planned.remove(name);
            }
        }

        debug!(changes = changes.len(), requires_replace, "Planned Service Bus Namespace");
        Ok(PlanResult::with_changes(
            Value::Object(planned),
            changes,
            requires_replace,
        ))
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        self.apply(&planned_state, "creating").await
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        let (resource_group, name) = locate(&current_state)?;
        self.read_namespace(&resource_group, &name).await
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        let _ = prior_state;
        self.apply(&planned_state, "updating").await
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        let (resource_group, name) = locate(&current_state)?;

        info!(name = %name, resource_group = %resource_group, "Deleting Service Bus Namespace");
        match classify(self.client.delete(&resource_group, &name).await) {
            Existence::Found(_) => Ok(()),
            Existence::NotFound => {
                info!(name = %name, "Service Bus Namespace was already deleted");
                Ok(())
            },
            Existence::Error(err) => Err(ProviderError::api(
                format!(
                    "Error issuing delete request of Service Bus Namespace {:?} (resource group: {:?})",
                    name, resource_group
                ),
                err,
            )),
        }
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Self::ensure_namespace_type(resource_type)?;
        let parsed = ResourceIdentifier::parse(id)?;

        if let Some(config) = self.config.read().await.as_ref() {
            if !config.subscription_id.is_empty() && config.subscription_id != parsed.subscription_id {
                return Err(ProviderError::InvalidRequest(format!(
                    "resource ID belongs to subscription {:?}, provider is configured for {:?}",
                    parsed.subscription_id, config.subscription_id
                )));
            }
        }

        let name = parsed.segment("namespaces")?;
        let state = self.read_namespace(&parsed.resource_group, name).await?;
        Ok(vec![ImportedResource::new(NAMESPACE_RESOURCE_TYPE, state)])
    }
}

/// Resolve resource group and name from state, preferring the recorded ID.
fn locate(state: &Value) -> Result<(String, String), ProviderError> {
    if let Some(id) = state.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
        let parsed = ResourceIdentifier::parse(id)?;
        let name = parsed.segment("namespaces")?.to_string();
        return Ok((parsed.resource_group, name));
    }

    let name = state.get("name").and_then(Value::as_str);
    let resource_group = state.get("resource_group_name").and_then(Value::as_str);
    match (resource_group, name) {
        (Some(rg), Some(name)) => Ok((rg.to_string(), name.to_string())),
        _ => Err(ProviderError::InvalidRequest(
            "state has neither an id nor name and resource_group_name".to_string(),
        )),
    }
}

fn normalized_proposal(schema: &Schema, proposed: Value) -> Result<Map<String, Value>, ProviderError> {
    let Value::Object(mut proposed) = proposed else {
        return Err(ProviderError::InvalidRequest(
            "proposed state must be an object".to_string(),
        ));
    };

    proposed.retain(|_, v| !v.is_null());
    if let Some(Value::String(location)) = proposed.get("location") {
        let normalized = normalize_location(location);
        proposed.insert("location".to_string(), Value::String(normalized));
    }
    for (name, attr) in &schema.attributes {
        if let Some(default) = &attr.default {
            proposed.entry(name.clone()).or_insert_with(|| default.clone());
        }
    }
    Ok(proposed)
}

fn namespace_state(namespace: &Namespace, resource_group: &str, keys: Option<&AccessKeys>) -> Value {
    let mut state = json!({
        "id": namespace.id,
        "name": namespace.name,
        "location": normalize_location(&namespace.location),
        "resource_group_name": resource_group,
    });

    if let Some(sku) = &namespace.sku {
        state["sku"] = json!(sku.name.as_str().to_lowercase());
        state["capacity"] = json!(sku.capacity.unwrap_or(DEFAULT_CAPACITY));
    }
    if !namespace.tags.is_empty() {
        state["tags"] = json!(namespace.tags);
    }
    if let Some(keys) = keys {
        state["default_primary_connection_string"] = json!(keys.primary_connection_string);
        state["default_secondary_connection_string"] = json!(keys.secondary_connection_string);
        state["default_primary_key"] = json!(keys.primary_key);
        state["default_secondary_key"] = json!(keys.secondary_key);
    }
    state
}

fn require_success<T>(
    result: Result<Response<T>, ApiError>,
    context: impl FnOnce() -> String,
) -> Result<Response<T>, ProviderError> {
    match result {
        Ok(resp) if resp.is_success() => Ok(resp),
        Ok(resp) => Err(ProviderError::api(
            context(),
            ApiError::new(resp.status, format!("unexpected status code {}", resp.status)),
        )),
        Err(err) => Err(ProviderError::api(context(), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNamespacesClient, Op};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

    fn provider() -> (Arc<FakeNamespacesClient>, NamespaceProvider) {
        let client = Arc::new(FakeNamespacesClient::new());
        let provider = NamespaceProvider::new(client.clone());
        (client, provider)
    }

    fn config() -> Value {
        json!({
            "name": "acctestservicebusnamespace-42",
            "location": "West US",
            "resource_group_name": "acctestRG-42",
            "sku": "basic"
        })
    }

    #[tokio::test]
    async fn test_configure() {
        let (_, provider) = provider();
        let diagnostics = provider
            .configure(json!({"subscription_id": SUBSCRIPTION}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(
            provider.provider_config().await.unwrap().subscription_id,
            SUBSCRIPTION
        );
    }

    #[tokio::test]
    async fn test_configure_reports_bad_block() {
        let (_, provider) = provider();
        let diagnostics = provider
            .configure(json!({"subscription_id": 12}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(provider.provider_config().await.is_none());
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let (_, provider) = provider();
        assert!(provider.validate_provider_config(Value::Null).await.unwrap().is_empty());
        let diagnostics = provider
            .validate_provider_config(json!({"skip_provider_registration": "yes"}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let (_, provider) = provider();
        let err = provider.create("azurerm_eventhub", config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_create_populates_computed_attributes() {
        let (client, provider) = provider();
        let state = provider
            .create(NAMESPACE_RESOURCE_TYPE, config())
            .await
            .unwrap();

        assert_eq!(state["name"], "acctestservicebusnamespace-42");
        assert_eq!(state["location"], "westus");
        assert_eq!(state["sku"], "basic");
        assert_eq!(state["capacity"], 1);
        assert!(state["id"]
            .as_str()
            .unwrap()
            .ends_with("/namespaces/acctestservicebusnamespace-42"));
        assert!(state["default_primary_connection_string"]
            .as_str()
            .unwrap()
            .starts_with("Endpoint="));
        assert!(!state["default_secondary_key"].as_str().unwrap().is_empty());
        assert_eq!(client.calls(Op::CreateOrUpdate), 1);
    }

    #[tokio::test]
    async fn test_create_refuses_invalid_capacity() {
        let (client, provider) = provider();
        let mut cfg = config();
        cfg["sku"] = json!("premium");
        cfg["capacity"] = json!(17);

        let err = provider.create(NAMESPACE_RESOURCE_TYPE, cfg).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("capacity: must be one of 1, 2 or 4"));
        assert_eq!(client.calls(Op::CreateOrUpdate), 0);
    }

    #[tokio::test]
    async fn test_create_reports_every_invalid_field() {
        let (client, provider) = provider();
        let cfg = json!({"name": "acctestservicebusnamespace-42", "sku": 3, "capacity": 8});

        let err = provider.create(NAMESPACE_RESOURCE_TYPE, cfg).await.unwrap_err();
        let message = err.message();
        for field in ["location:", "resource_group_name:", "sku:", "capacity:"] {
            assert!(message.contains(field), "{} missing from {}", field, message);
        }
        assert_eq!(client.calls(Op::CreateOrUpdate), 0);
    }

    #[tokio::test]
    async fn test_create_surfaces_api_errors() {
        let (client, provider) = provider();
        client.fail_create(ApiError::new(400, "NamespaceNameInUse"));

        let err = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
        assert!(err.to_string().contains("Error creating"));
    }

    #[tokio::test]
    async fn test_create_tolerates_missing_keys() {
        let (client, provider) = provider();
        client.fail_list_keys(ApiError::new(403, "AuthorizationFailed"));

        let state = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap();
        assert!(state.get("default_primary_key").is_none());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let (_, provider) = provider();
        let err = provider
            .read(
                NAMESPACE_RESOURCE_TYPE,
                json!({"name": "acctestgone", "resource_group_name": "rg1"}),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_prefers_id() {
        let (client, provider) = provider();
        client.insert_namespace("rg1", "ns-by-id", "westus");
        let id = crate::resource_id::namespace_id(crate::testing::FAKE_SUBSCRIPTION, "rg1", "ns-by-id");

        let state = provider
            .read(NAMESPACE_RESOURCE_TYPE, json!({"id": id, "name": "stale"}))
            .await
            .unwrap();
        assert_eq!(state["name"], "ns-by-id");

        assert_err!(provider.read(NAMESPACE_RESOURCE_TYPE, json!({})).await);
    }

    #[tokio::test]
    async fn test_plan_create_applies_defaults() {
        let (_, provider) = provider();
        let plan = provider
            .plan(NAMESPACE_RESOURCE_TYPE, None, config())
            .await
            .unwrap();

        assert!(plan.has_changes());
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["capacity"], 1);
        assert_eq!(plan.planned_state["location"], "westus");
        assert!(plan.changes.iter().any(|c| c.path == "capacity"));
        assert!(plan.changes.iter().all(|c| c.before.is_none()));
    }

    #[tokio::test]
    async fn test_plan_ignores_sku_casing() {
        let (_, provider) = provider();
        let state = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap();

        let mut proposed = config();
        proposed["sku"] = json!("Basic");
        let plan = provider
            .plan(NAMESPACE_RESOURCE_TYPE, Some(state.clone()), proposed)
            .await
            .unwrap();

        assert!(!plan.has_changes(), "unexpected changes: {:?}", plan.changes);
        assert_eq!(plan.planned_state, state);
    }

    #[tokio::test]
    async fn test_plan_force_new_and_in_place() {
        let (_, provider) = provider();
        let state = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap();

        let mut proposed = config();
        proposed["tags"] = json!({"environment": "Production"});
        let plan = provider
            .plan(NAMESPACE_RESOURCE_TYPE, Some(state.clone()), proposed)
            .await
            .unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "tags");
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["id"], state["id"]);

        let mut proposed = config();
        proposed["sku"] = json!("standard");
        let plan = provider
            .plan(NAMESPACE_RESOURCE_TYPE, Some(state), proposed)
            .await
            .unwrap();
        assert!(plan.requires_replace);
        assert!(plan.planned_state.get("id").is_none());
    }

    #[tokio::test]
    async fn test_plan_destroy() {
        let (_, provider) = provider();
        let state = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap();
        let plan = provider
            .plan(NAMESPACE_RESOURCE_TYPE, Some(state), Value::Null)
            .await
            .unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes[0].path, "id");
        assert!(plan.changes[0].after.is_none());
    }

    #[tokio::test]
    async fn test_update_tags() {
        let (client, provider) = provider();
        let state = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap();

        let mut planned = state.clone();
        planned["tags"] = json!({"environment": "Production"});
        let updated = provider
            .update(NAMESPACE_RESOURCE_TYPE, state, planned)
            .await
            .unwrap();
        assert_eq!(updated["tags"]["environment"], "Production");
        assert_eq!(client.calls(Op::CreateOrUpdate), 2);
    }

    #[tokio::test]
    async fn test_delete_tolerates_not_found() {
        let (client, provider) = provider();
        let state = provider.create(NAMESPACE_RESOURCE_TYPE, config()).await.unwrap();

        assert_ok!(provider.delete(NAMESPACE_RESOURCE_TYPE, state.clone()).await);
        assert_ok!(provider.delete(NAMESPACE_RESOURCE_TYPE, state.clone()).await);
        assert_eq!(client.deletes().len(), 2);

        client.fail_delete_of("acctestservicebusnamespace-42", ApiError::new(500, "InternalError"));
        let err = provider.delete(NAMESPACE_RESOURCE_TYPE, state).await.unwrap_err();
        assert!(err.to_string().contains("InternalError"));
    }

    #[tokio::test]
    async fn test_import() {
        let (client, provider) = provider();
        client.insert_namespace("rg1", "acctestimported", "westeurope");
        let id = crate::resource_id::namespace_id(crate::testing::FAKE_SUBSCRIPTION, "rg1", "acctestimported");

        let imported = provider
            .import_resource(NAMESPACE_RESOURCE_TYPE, &id)
            .await
            .unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state["resource_group_name"], "rg1");

        let err = provider
            .import_resource(NAMESPACE_RESOURCE_TYPE, "/subscriptions/s/namespaces/x")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_import_rejects_other_subscription() {
        let client = Arc::new(FakeNamespacesClient::new());
        let provider = NamespaceProvider::with_config(
            client,
            ProviderConfig {
                subscription_id: SUBSCRIPTION.to_string(),
                ..Default::default()
            },
        );
        let id = crate::resource_id::namespace_id("another-sub", "rg1", "ns1");
        let err = provider
            .import_resource(NAMESPACE_RESOURCE_TYPE, &id)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_metadata() {
        let (_, provider) = provider();
        let metadata = provider.metadata();
        assert_eq!(metadata.resources, vec![NAMESPACE_RESOURCE_TYPE]);
        assert_eq!(metadata.sweepers, vec![SWEEPER_NAME]);
        assert!(provider.schema().resources.contains_key(NAMESPACE_RESOURCE_TYPE));
    }
}
