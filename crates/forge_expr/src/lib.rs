//! # forge_expr
//!
//! Dependency expression evaluator for Blueprint Forge.
//!
//! Blueprints gate prompts, files and whole inclusions on small boolean
//! expressions over previously answered variables. This crate provides:
//!
//! - A tokenizer and recursive-descent parser for infix expressions
//! - Relational, logical, arithmetic and regex-match operators
//! - A handful of built-in functions (`strlen`, `max`, `min`, `ceil`,
//!   `floor`, `round`, `string`, `regex`)
//! - Consistent coercion of scope values (`"true"`/`"false"` are booleans,
//!   numeric strings compare numerically)
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use forge_expr::{evaluate_bool, Value};
//!
//! let mut scope = HashMap::new();
//! scope.insert("Replicas".to_string(), Value::from("3"));
//!
//! assert!(evaluate_bool("Replicas > 2", &scope).unwrap());
//! ```

pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{ExprError, ExprResult};
pub use eval::Expression;
pub use value::{format_number, EmptyScope, Scope, Value};

/// Parse and evaluate an expression in one step.
pub fn evaluate(expression: &str, scope: &dyn Scope) -> ExprResult<Value> {
    Expression::parse(expression)?.evaluate(scope)
}

/// Parse and evaluate an expression that must produce a boolean.
pub fn evaluate_bool(expression: &str, scope: &dyn Scope) -> ExprResult<bool> {
    Expression::parse(expression)?.evaluate_bool(scope)
}
