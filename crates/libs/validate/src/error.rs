//! Error types for RemoteMedia Validate

use thiserror::Error;

use crate::scenario::PipelineError;
use crate::sink::SinkError;

/// Result type alias for validation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while validating a pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Issue identifier is not of the form `area::name`
    #[error("Invalid issue id '{0}': expected exactly two non-empty components separated by '::'")]
    InvalidIssueId(String),

    /// Issue registered twice
    #[error("Issue '{0}' is already registered")]
    DuplicateIssue(String),

    /// Report raised for an issue that is not in the catalog
    #[error("Unknown issue '{0}'")]
    UnknownIssue(String),

    /// Issue catalog was installed after it had been initialized
    #[error("Issue catalog already initialized")]
    CatalogInitialized,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Scenario could not be loaded
    #[error("Scenario load error: {0}")]
    ScenarioLoad(String),

    /// Action executor failed
    #[error("Action '{action}' failed: {reason}")]
    Action {
        /// Action type name
        action: String,
        /// Failure description
        reason: String,
    },

    /// Error returned by the pipeline under test
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Output sink failure
    #[error("Output sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build an action failure
    pub fn action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Action {
            action: action.into(),
            reason: reason.into(),
        }
    }
}
