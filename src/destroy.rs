//! Post-destroy verification.
//!
//! After the host has destroyed everything, every namespace still recorded
//! in state must be absent remotely. An error that is not a not-found leaves
//! presence unproven and fails verification.

use tracing::{debug, warn};

use crate::client::SharedClient;
use crate::error::ProviderError;
use crate::existence::{Existence, ExistenceChecker};
use crate::schema::NAMESPACE_RESOURCE_TYPE;
use crate::state::State;

/// Confirms that declared namespaces are gone.
#[derive(Clone)]
pub struct DestroyVerifier {
    checker: ExistenceChecker,
}

impl DestroyVerifier {
    /// Create a verifier over `client`.
    pub fn new(client: SharedClient) -> Self {
        Self {
            checker: ExistenceChecker::new(client),
        }
    }

    /// Check every `azurerm_servicebus_namespace` in `state`.
    ///
    /// Stops at the first namespace that is still present or whose absence
    /// cannot be confirmed. A namespace that cannot be located from its state
    /// attributes counts as unconfirmed.
    pub async fn verify(&self, state: &State) -> Result<(), ProviderError> {
        for (address, resource) in state.of_type(NAMESPACE_RESOURCE_TYPE) {
            let (Some(name), Some(resource_group)) = (
                resource.attribute("name").filter(|v| !v.is_empty()),
                resource
                    .attribute("resource_group_name")
                    .filter(|v| !v.is_empty()),
            ) else {
                return Err(ProviderError::InvalidRequest(format!(
                    "{} has no name or resource_group_name in state, cannot confirm it was destroyed",
                    address
                )));
            };

            match self.checker.check(resource_group, name).await {
                Existence::NotFound => {
                    debug!(address = %address, name = %name, "Service Bus Namespace destroyed");
                },
                Existence::Found(namespace) => {
                    warn!(address = %address, name = %name, "Service Bus Namespace still exists");
                    return Err(ProviderError::StillExists(format!(
                        "Service Bus Namespace {:?} (resource group: {:?}) still exists:\n{:#?}",
                        name, resource_group, namespace
                    )));
                },
                Existence::Error(err) => {
                    warn!(
                        address = %address,
                        name = %name,
                        error = %err,
                        "Could not confirm Service Bus Namespace was destroyed"
                    );
                    return Err(ProviderError::api(
                        format!(
                            "Could not confirm Service Bus Namespace {:?} (resource group: {:?}) was destroyed",
                            name, resource_group
                        ),
                        err,
                    ));
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::state::ResourceState;
    use crate::testing::FakeNamespacesClient;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn state_for(names: &[&str]) -> State {
        let mut state = State::new();
        for name in names {
            state.insert(
                format!("azurerm_servicebus_namespace.{}", name),
                ResourceState::from_value(
                    NAMESPACE_RESOURCE_TYPE,
                    &json!({"name": name, "resource_group_name": "rg1"}),
                ),
            );
        }
        state.insert(
            "azurerm_resource_group.test",
            ResourceState::from_value("azurerm_resource_group", &json!({"name": "rg1"})),
        );
        state
    }

    #[tokio::test]
    async fn test_verify_succeeds_when_all_absent() {
        let client = Arc::new(FakeNamespacesClient::new());
        let verifier = DestroyVerifier::new(client.clone());

        assert_ok!(verifier.verify(&state_for(&["a", "b"])).await);
        // Only namespaces are checked, not the resource group.
        assert_eq!(client.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_verify_treats_not_found_error_as_destroyed() {
        let client = Arc::new(FakeNamespacesClient::new());
        client.fail_get(ApiError::transport("gone").with_code("ResourceGroupNotFound"));
        let verifier = DestroyVerifier::new(client);

        assert_ok!(verifier.verify(&state_for(&["a"])).await);
    }

    #[tokio::test]
    async fn test_verify_fails_when_still_present() {
        let client = Arc::new(FakeNamespacesClient::new());
        client.insert_namespace("rg1", "b", "westus");
        let verifier = DestroyVerifier::new(client);

        let err = verifier.verify(&state_for(&["a", "b"])).await.unwrap_err();
        assert!(matches!(err, ProviderError::StillExists(_)));
        assert!(err.to_string().contains("\"b\""));
    }

    #[tokio::test]
    async fn test_verify_fails_on_inconclusive_error() {
        let client = Arc::new(FakeNamespacesClient::new());
        client.fail_get(ApiError::new(503, "ServiceUnavailable"));
        let verifier = DestroyVerifier::new(client);

        let err = verifier.verify(&state_for(&["a"])).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
        assert!(err.to_string().contains("ServiceUnavailable"));
    }

    #[tokio::test]
    async fn test_verify_rejects_unlocatable_namespace() {
        let client = Arc::new(FakeNamespacesClient::new());
        client.insert_namespace("rg1", "acctestns-live", "westus");
        let verifier = DestroyVerifier::new(client.clone());

        let mut state = State::new();
        state.insert(
            "azurerm_servicebus_namespace.live",
            ResourceState::from_value(NAMESPACE_RESOURCE_TYPE, &json!({"name": "acctestns-live"})),
        );
        let err = verifier.verify(&state).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.to_string().contains("azurerm_servicebus_namespace.live"));
        assert_eq!(client.get_calls(), 0);

        let mut state = State::new();
        state.insert(
            "azurerm_servicebus_namespace.noname",
            ResourceState::from_value(NAMESPACE_RESOURCE_TYPE, &json!({"resource_group_name": "rg1"})),
        );
        assert!(matches!(
            verifier.verify(&state).await,
            Err(ProviderError::InvalidRequest(_))
        ));
        assert_eq!(client.namespace_count(), 1);
    }

    #[tokio::test]
    async fn test_verify_empty_state() {
        let verifier = DestroyVerifier::new(Arc::new(FakeNamespacesClient::new()));
        assert_ok!(verifier.verify(&State::new()).await);
    }
}
