//! Error types for blueprints.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blueprint operations.
pub type BlueprintResult<T> = Result<T, BlueprintError>;

/// Errors that can occur while loading, composing, preparing or rendering
/// a blueprint.
#[derive(Error, Debug)]
pub enum BlueprintError {
    /// Malformed blueprint definition.
    #[error("{0}")]
    Schema(String),

    #[error("blueprint [{name}] not found in repository {repository}")]
    NotFound { name: String, repository: String },

    #[error("blueprint [{name}] included from [{parent}] not found in repository {repository}")]
    IncludeNotFound {
        name: String,
        parent: String,
        repository: String,
    },

    #[error("cyclic blueprint inclusion detected: {0}")]
    CyclicInclude(String),

    #[error("failed to resolve {field} of [{name}]: {message}")]
    Resolution {
        name: String,
        field: String,
        message: String,
    },

    #[error("invalid answer for variable [{variable}]: {message}")]
    InvalidAnswer { variable: String, message: String },

    #[error("no answer provided for variable [{0}] while strict answers mode is enabled")]
    MissingAnswer(String),

    #[error("answers file contains keys that match no variable: {0}")]
    UnknownAnswers(String),

    #[error("prompt for [{variable}] failed: {message}")]
    Prompt { variable: String, message: String },

    #[error("template rendering failed for {path}: {message}")]
    Render { path: String, message: String },

    #[error("invalid output path '{0}': must be relative and stay inside the output directory")]
    InvalidOutputPath(String),

    #[error("failed to {operation} {path:?}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expression error: {0}")]
    Expression(#[from] forge_expr::ExprError),

    #[error("Function error: {0}")]
    Function(#[from] forge_functions::FunctionError),
}

impl BlueprintError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }
}
