//! Error types for routing and startup

use thiserror::Error;

/// Result type alias for startup/configuration operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while wiring the router together
///
/// These are configuration errors: they surface at startup and abort the daemon,
/// never while messages are flowing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// A second reader tried to claim an already registered queue
    #[error("queue '{0}' is already registered")]
    DuplicateQueue(String),

    /// A destination name could not be resolved against the bus directory
    #[error("unknown destination '{0}'")]
    UnknownDestination(String),

    /// A module declared a dependency that no registered module provides
    #[error("module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },

    /// A module was registered twice with the scheduler
    #[error("module '{0}' is already scheduled")]
    DuplicateModule(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reasons a handler drops an envelope without producing output
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// No alert builder exists for the FRU type
    #[error("not a valid sensor type: {0}")]
    UnknownFruType(String),

    /// The request kind tag is not handled by this module
    #[error("unsupported request kind: {0}")]
    UnsupportedRequest(String),

    /// The body could not be parsed into the expected request
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for RoutingError {
    fn from(err: serde_json::Error) -> Self {
        RoutingError::Malformed(err.to_string())
    }
}
