//! Error types for expression evaluation.

use thiserror::Error;

/// Result type alias for expression operations.
pub type ExprResult<T> = Result<T, ExprError>;

/// Errors that can occur while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("No parameter '{0}' found in scope")]
    UnknownIdentifier(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid regular expression '{pattern}': {message}")]
    Regex { pattern: String, message: String },

    #[error("Expression '{expression}' evaluated to '{value}', expected a boolean")]
    NotBoolean { expression: String, value: String },
}

impl ExprError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}
