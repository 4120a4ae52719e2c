//! Error types for the Service Bus namespace provider.

use thiserror::Error;

use crate::client::ApiError;
use crate::resource_id::ParseError;
use crate::validation::ValidationError;

/// Errors that can occur while managing Service Bus namespaces.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A resource identifier could not be parsed.
    #[error("Invalid resource ID: {0}")]
    Parse(#[from] ParseError),

    /// The control plane returned an error for a specific operation.
    #[error("{context}: {source}")]
    Api {
        /// What was being done, naming the resource and resource group.
        context: String,
        /// The raw error returned by the client.
        #[source]
        source: ApiError,
    },

    /// A resource that should have been destroyed is still present.
    #[error("Resource still exists: {0}")]
    StillExists(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Wrap a client error with the operation and resource it concerns.
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        Self::Api {
            context: context.into(),
            source,
        }
    }

    /// Collapse a list of validation errors into a single error.
    ///
    /// Returns `None` when the list is empty.
    pub fn from_validation_errors(errors: &[ValidationError]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Some(Self::Validation(joined))
    }

    /// Whether this error means the remote object is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Parse(_err) => "resource ID parse error (see Display output)",
            Self::Api { context, .. } => context,
            Self::StillExists(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }
}
