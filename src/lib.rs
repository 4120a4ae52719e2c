//! Azure Service Bus namespaces for Hemmer.
//!
//! This crate manages the `azurerm_servicebus_namespace` resource and the
//! tooling around its acceptance tests:
//!
//! - **Resource identifiers**: parsing `/subscriptions/.../namespaces/...` IDs
//! - **Validation**: capacity, SKU and name checks run before any API call
//! - **Provider**: plan, create, read, update, delete and import of namespaces
//! - **Existence checks**: classifying lookups as found, not found or failed
//! - **Destroy verification**: confirming every namespace in state is gone
//! - **Sweeping**: deleting namespaces left behind by test runs
//!
//! The control plane itself is reached through the [`NamespacesClient`]
//! trait. [`testing::FakeNamespacesClient`] implements it in memory.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use hemmer_provider_servicebus::{
//!     init_logging, NamespaceProvider, ProviderService, SweepConfig,
//! };
//! use serde_json::json;
//!
//! init_logging();
//! let provider = NamespaceProvider::new(client);
//! provider.configure(json!({"subscription_id": "..."})).await?;
//!
//! let state = provider.create("azurerm_servicebus_namespace", json!({
//!     "name": "acctestservicebusnamespace-1",
//!     "location": "westeurope",
//!     "resource_group_name": "acctestRG-1",
//!     "sku": "standard"
//! })).await?;
//!
//! // Clean up anything a crashed run left behind.
//! provider.sweeper(SweepConfig::from_env()).sweep("westeurope").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod destroy;
pub mod error;
pub mod existence;
pub mod logging;
pub mod provider;
pub mod resource_id;
pub mod schema;
pub mod state;
pub mod sweep;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{ApiError, NamespacesClient, SharedClient};
pub use config::{ProviderConfig, SweepConfig};
pub use destroy::DestroyVerifier;
pub use error::ProviderError;
pub use existence::{classify, Existence, ExistenceChecker};
pub use logging::{init_logging, init_logging_with_default};
pub use provider::{NamespaceProvider, ProviderService};
pub use resource_id::{ParseError, ResourceIdentifier};
pub use schema::ProviderSchema;
pub use sweep::{Sweep, SweepReport, Sweeper, SweeperRegistry};
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{validate, validate_capacity, ValidationError};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
