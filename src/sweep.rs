//! Sweeping of namespaces left behind by acceptance test runs.
//!
//! A sweep lists every namespace in the subscription, keeps those in the
//! target region whose name carries the test prefix, and deletes them one at
//! a time in list order. Namespaces that are already gone count as swept, so
//! sweeps can be re-run or run concurrently. Any other failure stops the
//! sweep; whatever is left is picked up by the next run.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hemmer_provider_servicebus::sweep::{Sweeper, SweeperRegistry};
//! use hemmer_provider_servicebus::config::SweepConfig;
//!
//! let mut registry = SweeperRegistry::new();
//! registry.register(Arc::new(Sweeper::new(client, SweepConfig::from_env())))?;
//! registry.run("azurerm_servicebus_namespace", "westeurope").await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

use crate::client::{list_all_by_subscription, Namespace, SharedClient};
use crate::config::SweepConfig;
use crate::error::ProviderError;
use crate::existence::{classify, Existence};
use crate::resource_id::ResourceIdentifier;
use crate::schema::NAMESPACE_RESOURCE_TYPE;

/// Name the namespace sweeper is registered under.
pub const SWEEPER_NAME: &str = NAMESPACE_RESOURCE_TYPE;

/// Normalise a location for comparison: `West Europe` and `westeurope` match.
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Whether a listed namespace should be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    /// In the target region and named like a test resource.
    Delete,
    /// In a different region.
    SkipRegion,
    /// Not named like a test resource.
    SkipName,
}

impl SweepDecision {
    /// Decide for one namespace.
    pub fn for_namespace(namespace: &Namespace, region: &str, name_prefix: &str) -> Self {
        if !namespace
            .name
            .to_lowercase()
            .starts_with(&name_prefix.to_lowercase())
        {
            return SweepDecision::SkipName;
        }
        if normalize_location(&namespace.location) != normalize_location(region) {
            return SweepDecision::SkipRegion;
        }
        SweepDecision::Delete
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Namespaces returned by the listing.
    pub listed: usize,
    /// Namespaces left alone.
    pub skipped: usize,
    /// Namespaces deleted, as `resource_group/name`.
    pub deleted: Vec<String>,
    /// Namespaces that were already gone when deleted.
    pub already_gone: Vec<String>,
}

impl SweepReport {
    /// Number of delete calls issued.
    pub fn delete_calls(&self) -> usize {
        self.deleted.len() + self.already_gone.len()
    }
}

/// A named, on-demand cleanup routine.
#[async_trait]
pub trait Sweep: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Sweep `region`.
    async fn sweep(&self, region: &str) -> Result<SweepReport, ProviderError>;
}

/// Deletes test namespaces in a region.
pub struct Sweeper {
    client: SharedClient,
    config: SweepConfig,
}

impl Sweeper {
    /// Create a sweeper.
    pub fn new(client: SharedClient, config: SweepConfig) -> Self {
        Self { client, config }
    }

    /// Sweep the configured test location.
    pub async fn sweep_test_location(&self) -> Result<SweepReport, ProviderError> {
        let region = self.config.test_location.clone().ok_or_else(|| {
            ProviderError::Configuration(format!(
                "no region given and {} is not set",
                crate::config::ENV_TEST_LOCATION
            ))
        })?;
        self.sweep(&region).await
    }

    /// Sweep `region`.
    #[instrument(skip(self), fields(prefix = %self.config.name_prefix))]
    pub async fn sweep(&self, region: &str) -> Result<SweepReport, ProviderError> {
        if region.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "a region is required to sweep Service Bus Namespaces".to_string(),
            ));
        }

        if self.config.name_prefix.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "refusing to sweep Service Bus Namespaces without a name prefix".to_string(),
            ));
        }

        info!("Retrieving the Service Bus Namespaces");
        let namespaces = list_all_by_subscription(self.client.as_ref())
            .await
            .map_err(|e| ProviderError::api("Error listing Service Bus Namespaces", e))?;

        let mut report = SweepReport {
            listed: namespaces.len(),
            ..Default::default()
        };

        for namespace in &namespaces {
            match SweepDecision::for_namespace(namespace, region, &self.config.name_prefix) {
                SweepDecision::Delete => {},
                decision => {
                    debug!(name = %namespace.name, location = %namespace.location, ?decision, "Skipping");
                    report.skipped += 1;
                    continue;
                },
            }

            let id = ResourceIdentifier::parse(&namespace.id)?;
            let resource_group = id.resource_group.clone();
            let name = id.segment("namespaces")?.to_string();
            let key = format!("{}/{}", resource_group, name);

            info!(resource_group = %resource_group, name = %name, "Deleting Service Bus Namespace");
            match classify(self.client.delete(&resource_group, &name).await) {
                Existence::Found(_) => report.deleted.push(key),
                Existence::NotFound => {
                    info!(resource_group = %resource_group, name = %name, "Service Bus Namespace already gone");
                    report.already_gone.push(key);
                },
                Existence::Error(err) => {
                    error!(resource_group = %resource_group, name = %name, error = %err, "Delete failed");
                    return Err(ProviderError::api(
                        format!(
                            "Error deleting Service Bus Namespace {:?} (Resource Group {:?})",
                            name, resource_group
                        ),
                        err,
                    ));
                },
            }
        }

        info!(
            listed = report.listed,
            skipped = report.skipped,
            deleted = report.deleted.len(),
            already_gone = report.already_gone.len(),
            "Sweep complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl Sweep for Sweeper {
    fn name(&self) -> &str {
        SWEEPER_NAME
    }

    async fn sweep(&self, region: &str) -> Result<SweepReport, ProviderError> {
        Sweeper::sweep(self, region).await
    }
}

/// Sweepers available to a test-harness driver.
#[derive(Default, Clone)]
pub struct SweeperRegistry {
    sweepers: BTreeMap<String, Arc<dyn Sweep>>,
}

impl SweeperRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sweeper under its own name.
    pub fn register(&mut self, sweeper: Arc<dyn Sweep>) -> Result<(), ProviderError> {
        let name = sweeper.name().to_string();
        if self.sweepers.contains_key(&name) {
            return Err(ProviderError::Configuration(format!(
                "sweeper {:?} is already registered",
                name
            )));
        }
        self.sweepers.insert(name, sweeper);
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.sweepers.keys().map(String::as_str).collect()
    }

    /// Run one sweeper.
    pub async fn run(&self, name: &str, region: &str) -> Result<SweepReport, ProviderError> {
        let sweeper = self
            .sweepers
            .get(name)
            .ok_or_else(|| ProviderError::UnknownResource(format!("no sweeper named {:?}", name)))?;
        sweeper.sweep(region).await
    }

    /// Run every sweeper, stopping at the first failure.
    pub async fn run_all(
        &self,
        region: &str,
    ) -> Result<BTreeMap<String, SweepReport>, ProviderError> {
        let mut reports = BTreeMap::new();
        for (name, sweeper) in &self.sweepers {
            reports.insert(name.clone(), sweeper.sweep(region).await?);
        }
        Ok(reports)
    }
}
