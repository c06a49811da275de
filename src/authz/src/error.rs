//! Error types for the policy index

use thiserror::Error;

/// Policy index errors
///
/// Every variant is a deny outcome for callers answering access checks.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Namespace has never been built (distinct from "no access")
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Edge fetch or index construction failed
    #[error("Index build failed for namespace '{namespace}': {reason}")]
    BuildFailure { namespace: String, reason: String },

    /// Build exceeded the configured timeout
    #[error("Index build for namespace '{namespace}' timed out after {timeout_ms}ms")]
    BuildTimeout { namespace: String, timeout_ms: u64 },

    /// A namespace failed to build during startup
    #[error("Policy store initialization failed at namespace '{namespace}': {reason}")]
    FatalInitialization { namespace: String, reason: String },

    /// `initialize` called on a manager that is already serving
    #[error("Policy index manager is already initialized")]
    AlreadyInitialized,

    /// Manager has not completed `initialize`
    #[error("Policy index manager is not initialized")]
    NotInitialized,

    /// Edge source error
    #[error("Edge source error: {0}")]
    EdgeSource(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for policy index operations
pub type Result<T> = std::result::Result<T, AuthzError>;
