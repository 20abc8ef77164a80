//! Error types for function resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for function operations.
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Errors that can occur while resolving a function reference.
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error("Invalid function reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    #[error("unknown function type: {0}")]
    UnknownDomain(String),

    #[error("{module} is not a valid {domain} module")]
    UnknownModule { domain: String, module: String },

    #[error("{domain}.{module} requires the '{parameter}' parameter")]
    MissingParameter {
        domain: String,
        module: String,
        parameter: String,
    },

    #[error("Index {index} out of range for result with {len} element(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid result selection: {0}")]
    InvalidSelection(String),

    #[error("{domain} provider failed: {message}")]
    Provider { domain: String, message: String },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
