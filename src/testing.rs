//! Test tooling: an in-memory control plane and an acceptance-style harness.
//!
//! [`FakeNamespacesClient`] stands in for the Service Bus control plane.
//! It keeps namespaces in insertion order, pages its listings, counts calls
//! per operation and can be told to fail specific operations.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through plan/apply/destroy
//! and records the resulting state, so existence and destroy checks can run
//! against it the same way they do after a real apply.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hemmer_provider_servicebus::provider::NamespaceProvider;
//! use hemmer_provider_servicebus::testing::{FakeNamespacesClient, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_basic() {
//!     let client = Arc::new(FakeNamespacesClient::new());
//!     let provider = NamespaceProvider::new(client.clone());
//!     let verifier = provider.destroy_verifier();
//!     let tester = ProviderTester::new(provider);
//!
//!     tester.apply("azurerm_servicebus_namespace.test", "azurerm_servicebus_namespace", json!({
//!         "name": "acctestservicebusnamespace-1",
//!         "location": "westus",
//!         "resource_group_name": "acctestRG-1",
//!         "sku": "basic"
//!     })).await.unwrap();
//!
//!     let state = tester.destroy().await.unwrap();
//!     verifier.verify(&state).await.unwrap();
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{
    AccessKeys, ApiError, Namespace, NamespaceParams, NamespacesClient, Page, Response, Sku,
    SkuName,
};
use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::resource_id::{namespace_id, ResourceIdentifier};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::state::{ResourceState, State};
use crate::types::PlanResult;

/// Subscription the fake control plane pretends to serve.
pub const FAKE_SUBSCRIPTION: &str = "11111111-2222-3333-4444-555555555555";

const DEFAULT_PAGE_SIZE: usize = 100;

/// A control-plane operation, for call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Op {
    /// `get`
    Get,
    /// `list_by_subscription`
    List,
    /// `create_or_update`
    CreateOrUpdate,
    /// `delete`
    Delete,
    /// `list_keys`
    ListKeys,
}

#[derive(Default)]
struct FakeStore {
    /// `(resource_group, namespace)` in insertion order.
    namespaces: Vec<(String, Namespace)>,
    calls: BTreeMap<Op, usize>,
    deletes: Vec<(String, String)>,
    failures: BTreeMap<Op, ApiError>,
    delete_failures: BTreeMap<String, ApiError>,
}

impl FakeStore {
    fn record(&mut self, op: Op) {
        *self.calls.entry(op).or_default() += 1;
    }

    fn position(&self, resource_group: &str, name: &str) -> Option<usize> {
        self.namespaces
            .iter()
            .position(|(rg, ns)| rg == resource_group && ns.name == name)
    }
}

/// In-memory [`NamespacesClient`].
///
/// Failures injected with the `fail_*` methods stay in place until the
/// client is dropped. Deleting a namespace that does not exist answers
/// `204 No Content`, as the control plane does.
pub struct FakeNamespacesClient {
    page_size: usize,
    store: Mutex<FakeStore>,
}

impl Default for FakeNamespacesClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeNamespacesClient {
    /// An empty control plane.
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            store: Mutex::new(FakeStore::default()),
        }
    }

    /// Return listings `page_size` namespaces at a time.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn store(&self) -> MutexGuard<'_, FakeStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a standard-tier namespace.
    pub fn insert_namespace(&self, resource_group: &str, name: &str, location: &str) {
        let namespace = Namespace {
            id: namespace_id(FAKE_SUBSCRIPTION, resource_group, name),
            name: name.to_string(),
            location: location.to_string(),
            sku: Some(Sku {
                name: SkuName::Standard,
                capacity: Some(1),
            }),
            tags: BTreeMap::new(),
            service_bus_endpoint: Some(endpoint(name)),
        };
        self.store()
            .namespaces
            .push((resource_group.to_string(), namespace));
    }

    /// Seed a namespace exactly as given, including a malformed `id`.
    ///
    /// The resource group is taken from the id when it parses.
    pub fn insert_raw(&self, namespace: Namespace) {
        let resource_group = ResourceIdentifier::parse(&namespace.id)
            .map(|id| id.resource_group)
            .unwrap_or_default();
        self.store().namespaces.push((resource_group, namespace));
    }

    /// Number of namespaces currently stored.
    pub fn namespace_count(&self) -> usize {
        self.store().namespaces.len()
    }

    /// A stored namespace.
    pub fn namespace(&self, resource_group: &str, name: &str) -> Option<Namespace> {
        let store = self.store();
        store
            .position(resource_group, name)
            .map(|i| store.namespaces[i].1.clone())
    }

    /// Make every `get` fail with `err`.
    pub fn fail_get(&self, err: ApiError) {
        self.store().failures.insert(Op::Get, err);
    }

    /// Make every `list_by_subscription` fail with `err`.
    pub fn fail_list(&self, err: ApiError) {
        self.store().failures.insert(Op::List, err);
    }

    /// Make every `create_or_update` fail with `err`.
    pub fn fail_create(&self, err: ApiError) {
        self.store().failures.insert(Op::CreateOrUpdate, err);
    }

    /// Make every `list_keys` fail with `err`.
    pub fn fail_list_keys(&self, err: ApiError) {
        self.store().failures.insert(Op::ListKeys, err);
    }

    /// Make deletes of the namespace called `name` fail with `err`.
    pub fn fail_delete_of(&self, name: &str, err: ApiError) {
        self.store().delete_failures.insert(name.to_string(), err);
    }

    /// Number of calls issued for `op`.
    pub fn calls(&self, op: Op) -> usize {
        self.store().calls.get(&op).copied().unwrap_or_default()
    }

    /// Number of `get` calls issued.
    pub fn get_calls(&self) -> usize {
        self.calls(Op::Get)
    }

    /// Number of `list_by_subscription` calls issued.
    pub fn list_calls(&self) -> usize {
        self.calls(Op::List)
    }

    /// Every delete issued, failed ones included, as `(resource_group, name)`.
    pub fn deletes(&self) -> Vec<(String, String)> {
        self.store().deletes.clone()
    }
}

fn endpoint(name: &str) -> String {
    format!("https://{}.servicebus.windows.net:443/", name)
}

fn access_keys(name: &str, rule: &str) -> AccessKeys {
    let primary_key = format!("{}-primary", name);
    let secondary_key = format!("{}-secondary", name);
    let connection_string = |key: &str| {
        format!(
            "Endpoint=sb://{}.servicebus.windows.net/;SharedAccessKeyName={};SharedAccessKey={}",
            name, rule, key
        )
    };

    AccessKeys {
        key_name: rule.to_string(),
        primary_connection_string: connection_string(&primary_key),
        secondary_connection_string: connection_string(&secondary_key),
        primary_key,
        secondary_key,
    }
}

fn not_found(resource_group: &str, name: &str) -> ApiError {
    ApiError::not_found(format!(
        "The Resource 'Microsoft.ServiceBus/namespaces/{}' under resource group '{}' was not found.",
        name, resource_group
    ))
}

#[async_trait]
impl NamespacesClient for FakeNamespacesClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<Response<Namespace>, ApiError> {
        let mut store = self.store();
        store.record(Op::Get);
        if let Some(err) = store.failures.get(&Op::Get) {
            return Err(err.clone());
        }

        match store.position(resource_group, name) {
            Some(i) => Ok(Response::ok(store.namespaces[i].1.clone())),
            None => Err(not_found(resource_group, name)),
        }
    }

    async fn list_by_subscription(
        &self,
        continuation: Option<String>,
    ) -> Result<Page<Namespace>, ApiError> {
        let mut store = self.store();
        store.record(Op::List);
        if let Some(err) = store.failures.get(&Op::List) {
            return Err(err.clone());
        }

        let start = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ApiError::new(400, format!("invalid continuation token {:?}", token)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(store.namespaces.len());
        let items = store
            .namespaces
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|(_, ns)| ns.clone())
            .collect();

        Ok(Page {
            items,
            next: (end < store.namespaces.len()).then(|| end.to_string()),
        })
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        params: NamespaceParams,
    ) -> Result<Response<Namespace>, ApiError> {
        let mut store = self.store();
        store.record(Op::CreateOrUpdate);
        if let Some(err) = store.failures.get(&Op::CreateOrUpdate) {
            return Err(err.clone());
        }

        let namespace = Namespace {
            id: namespace_id(FAKE_SUBSCRIPTION, resource_group, name),
            name: name.to_string(),
            location: params.location,
            sku: Some(params.sku),
            tags: params.tags,
            service_bus_endpoint: Some(endpoint(name)),
        };
        match store.position(resource_group, name) {
            Some(i) => store.namespaces[i].1 = namespace.clone(),
            None => store
                .namespaces
                .push((resource_group.to_string(), namespace.clone())),
        }
        Ok(Response::ok(namespace))
    }

    async fn delete(&self, resource_group: &str, name: &str) -> Result<Response<()>, ApiError> {
        let mut store = self.store();
        store.record(Op::Delete);
        store
            .deletes
            .push((resource_group.to_string(), name.to_string()));
        if let Some(err) = store.delete_failures.get(name) {
            return Err(err.clone());
        }

        match store.position(resource_group, name) {
            Some(i) => {
                store.namespaces.remove(i);
                Ok(Response::status(200))
            },
            None => Ok(Response::status(204)),
        }
    }

    async fn list_keys(
        &self,
        resource_group: &str,
        name: &str,
        authorization_rule: &str,
    ) -> Result<Response<AccessKeys>, ApiError> {
        let mut store = self.store();
        store.record(Op::ListKeys);
        if let Some(err) = store.failures.get(&Op::ListKeys) {
            return Err(err.clone());
        }

        match store.position(resource_group, name) {
            Some(_) => Ok(Response::ok(access_keys(name, authorization_rule))),
            None => Err(not_found(resource_group, name)),
        }
    }
}

/// Acceptance-style harness for a [`ProviderService`].
///
/// Resources applied through the tester are recorded by address; the
/// recorded [`State`] is what existence and destroy checks run against.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
    resources: Mutex<BTreeMap<String, (String, Value)>>,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            resources: Mutex::new(BTreeMap::new()),
        }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn resources(&self) -> MutexGuard<'_, BTreeMap<String, (String, Value)>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration, failing on any error diagnostic.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan `config` against what is recorded at `address`.
    pub async fn plan(
        &self,
        address: &str,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let prior = self.recorded(address);
        self.provider.plan(resource_type, prior, config).await
    }

    /// Plan, then create, update or replace the resource at `address`.
    ///
    /// Returns the state read back after the change.
    pub async fn apply(
        &self,
        address: &str,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let prior = self.recorded(address);
        let plan = self
            .provider
            .plan(resource_type, prior.clone(), config)
            .await?;

        let applied = match prior {
            None => {
                self.provider
                    .create(resource_type, plan.planned_state)
                    .await?
            },
            Some(prior) if plan.requires_replace => {
                self.provider.delete(resource_type, prior).await?;
                self.provider
                    .create(resource_type, plan.planned_state)
                    .await?
            },
            Some(prior) if plan.has_changes() => {
                self.provider
                    .update(resource_type, prior, plan.planned_state)
                    .await?
            },
            Some(prior) => prior,
        };

        let state = self.provider.read(resource_type, applied).await?;
        self.resources().insert(
            address.to_string(),
            (resource_type.to_string(), state.clone()),
        );
        Ok(state)
    }

    /// Import `id` and record it at `address`.
    pub async fn import(
        &self,
        address: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let imported = self.provider.import_resource(resource_type, id).await?;
        let resource = imported.into_iter().next().ok_or_else(|| {
            ProviderError::NotFound(format!("import of {} returned nothing", id))
        })?;
        self.resources().insert(
            address.to_string(),
            (resource.resource_type, resource.state.clone()),
        );
        Ok(resource.state)
    }

    /// Delete every recorded resource.
    ///
    /// Returns the state as it was before the destroy, which is what
    /// destroy verification checks.
    pub async fn destroy(&self) -> Result<State, ProviderError> {
        let snapshot = self.state();
        let resources: Vec<_> = self.resources().clone().into_iter().collect();

        for (address, (resource_type, state)) in resources {
            self.provider.delete(&resource_type, state).await?;
            self.resources().remove(&address);
        }
        Ok(snapshot)
    }

    /// The recorded state.
    pub fn state(&self) -> State {
        let mut state = State::new();
        for (address, (resource_type, value)) in self.resources().iter() {
            state.insert(
                address.clone(),
                ResourceState::from_value(resource_type.clone(), value),
            );
        }
        state
    }

    fn recorded(&self, address: &str) -> Option<Value> {
        self.resources().get(address).map(|(_, v)| v.clone())
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires replacing the resource.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if no change touches `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that some error diagnostic mentions `substring` in its summary or detail.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matches = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(substring)
            || d.detail.as_deref().is_some_and(|detail| detail.contains(substring))
    });

    assert!(
        matches,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
