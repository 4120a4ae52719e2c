//! Provider and sweeper configuration.
//!
//! Configuration is passed explicitly into each component's constructor;
//! nothing here is global. Values missing from the provider block fall back
//! to the usual `ARM_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Environment variable holding the subscription id.
pub const ENV_SUBSCRIPTION_ID: &str = "ARM_SUBSCRIPTION_ID";
/// Environment variable holding the cloud environment name.
pub const ENV_ENVIRONMENT: &str = "ARM_ENVIRONMENT";
/// Environment variable holding the location used by test runs.
pub const ENV_TEST_LOCATION: &str = "ARM_TEST_LOCATION";

/// Name prefix of resources created by acceptance tests.
pub const DEFAULT_TEST_PREFIX: &str = "acctest";

/// Cloud environment used when neither the block nor `ARM_ENVIRONMENT` sets one.
pub const DEFAULT_ENVIRONMENT: &str = "public";

/// Configuration of the provider block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Subscription to manage.
    #[serde(default)]
    pub subscription_id: String,
    /// Cloud environment (`public`, `usgovernment`, ...). `None` means unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Skip registering resource providers on first use.
    #[serde(default)]
    pub skip_provider_registration: bool,
}

impl ProviderConfig {
    /// Parse the provider block, filling gaps from the process environment.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Parse the provider block, filling gaps from `env`.
    ///
    /// Values set in the block always win over the environment.
    pub fn from_value_with_env(
        value: serde_json::Value,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut config: ProviderConfig = match value {
            serde_json::Value::Null => ProviderConfig::default(),
            other => serde_json::from_value(other)?,
        };

        if config.subscription_id.is_empty() {
            config.subscription_id = env(ENV_SUBSCRIPTION_ID).unwrap_or_default();
        }
        if config.environment.is_none() {
            config.environment = env(ENV_ENVIRONMENT).filter(|e| !e.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// The cloud environment, [`DEFAULT_ENVIRONMENT`] when unset.
    pub fn environment(&self) -> &str {
        self.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT)
    }

    fn validate(&self) -> Result<(), ProviderError> {
        if self.subscription_id.trim().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "subscription_id must be set in the provider block or via {}",
                ENV_SUBSCRIPTION_ID
            )));
        }
        Ok(())
    }
}

/// Configuration of the test-resource sweeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Only resources whose name starts with this prefix (ignoring case) are swept.
    #[serde(default = "default_prefix")]
    pub name_prefix: String,
    /// Location test resources are created in, if known.
    #[serde(default)]
    pub test_location: Option<String>,
}

fn default_prefix() -> String {
    DEFAULT_TEST_PREFIX.to_string()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_prefix(),
            test_location: None,
        }
    }
}

impl SweepConfig {
    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build from `env`.
    pub fn from_env_with(env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            test_location: env(ENV_TEST_LOCATION).filter(|l| !l.trim().is_empty()),
            ..Default::default()
        }
    }

    /// Override the name prefix.
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }
}
