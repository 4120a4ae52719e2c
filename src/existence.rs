//! Existence checks against the control plane.
//!
//! [`classify`] is the single place where a client result is sorted into
//! found / not found / error. Callers decide what each outcome means: a
//! missing namespace fails [`ExistenceChecker::assert_exists`] but is exactly
//! what the destroy verifier wants to see.

use tracing::debug;

use crate::client::{ApiError, Namespace, Response, SharedClient};
use crate::error::ProviderError;
use crate::state::State;

/// Outcome of looking up a remote object.
#[derive(Debug, Clone, PartialEq)]
pub enum Existence<T> {
    /// The object exists.
    Found(T),
    /// The control plane reports the object as absent.
    NotFound,
    /// The lookup failed for any other reason; presence is unknown.
    Error(ApiError),
}

impl<T> Existence<T> {
    /// Whether the object exists.
    pub fn is_found(&self) -> bool {
        matches!(self, Existence::Found(_))
    }

    /// Whether the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Existence::NotFound)
    }
}

/// Classify a client result.
///
/// A 404 response or a not-found-class error is [`Existence::NotFound`]; a
/// 2xx response is [`Existence::Found`]; anything else is an error carrying
/// the raw failure.
pub fn classify<T>(result: Result<Response<T>, ApiError>) -> Existence<Response<T>> {
    match result {
        Ok(resp) if resp.is_not_found() => Existence::NotFound,
        Ok(resp) if resp.is_success() => Existence::Found(resp),
        Ok(resp) => Existence::Error(ApiError::new(
            resp.status,
            format!("unexpected status code {}", resp.status),
        )),
        Err(err) if err.is_not_found() => Existence::NotFound,
        Err(err) => Existence::Error(err),
    }
}

/// Looks up namespaces by resource group and name.
#[derive(Clone)]
pub struct ExistenceChecker {
    client: SharedClient,
}

impl ExistenceChecker {
    /// Create a checker over `client`.
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    /// Issue one `get` and classify the result. No retries.
    pub async fn check(&self, resource_group: &str, name: &str) -> Existence<Namespace> {
        let result = self.client.get(resource_group, name).await;
        let existence = match classify(result) {
            Existence::Found(Response {
                body: Some(namespace),
                ..
            }) => Existence::Found(namespace),
            Existence::Found(resp) => Existence::Error(ApiError::new(
                resp.status,
                "response did not include a namespace body",
            )),
            Existence::NotFound => Existence::NotFound,
            Existence::Error(err) => Existence::Error(err),
        };

        debug!(
            resource_group = %resource_group,
            name = %name,
            found = existence.is_found(),
            not_found = existence.is_not_found(),
            "Checked Service Bus Namespace existence"
        );
        existence
    }

    /// Assert that the namespace recorded at `address` exists remotely.
    pub async fn assert_exists(
        &self,
        state: &State,
        address: &str,
    ) -> Result<Namespace, ProviderError> {
        let resource = state
            .get(address)
            .ok_or_else(|| ProviderError::NotFound(format!("{} is not in state", address)))?;

        let name = resource.attribute("name").unwrap_or_default();
        let resource_group = resource.attribute("resource_group_name").ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "no resource group found in state for Service Bus Namespace: {}",
                name
            ))
        })?;

        match self.check(resource_group, name).await {
            Existence::Found(namespace) => Ok(namespace),
            Existence::NotFound => Err(ProviderError::NotFound(format!(
                "Service Bus Namespace {:?} (resource group: {:?}) does not exist",
                name, resource_group
            ))),
            Existence::Error(err) => Err(ProviderError::api(
                format!(
                    "Get on Service Bus Namespace {:?} (resource group: {:?})",
                    name, resource_group
                ),
                err,
            )),
        }
    }
}
