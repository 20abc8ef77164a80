//! Resolution of [`VarField`]s into concrete values.
//!
//! Literal fields resolve to themselves, `!fn` fields go through the
//! function registry and `!expression` fields are evaluated against the
//! data answered so far.

use forge_expr::{Scope, Value};
use forge_functions::FunctionRegistry;
use tracing::debug;

use crate::error::{BlueprintError, BlueprintResult};
use crate::varfield::{FieldTag, VarField};

/// A select option after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOption {
    pub label: String,
    pub value: String,
}

impl ResolvedOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Resolves fields against a function registry and a data scope.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    functions: &'a FunctionRegistry,
}

impl<'a> FieldResolver<'a> {
    pub fn new(functions: &'a FunctionRegistry) -> Self {
        Self { functions }
    }

    /// Resolve a field to its textual value.
    ///
    /// `owner` and `field_name` only label errors.
    pub fn resolve_value(
        &self,
        owner: &str,
        field_name: &str,
        field: &VarField,
        scope: &dyn Scope,
    ) -> BlueprintResult<String> {
        match field.tag {
            FieldTag::None => Ok(field.value.clone()),
            FieldTag::Fn => {
                let results = self.call(owner, field_name, field)?;
                results.into_iter().next().ok_or_else(|| {
                    resolution(owner, field_name, format!("{} returned no values", field.value))
                })
            }
            FieldTag::Expression => forge_expr::evaluate(&field.value, scope)
                .map(|value| value.to_string())
                .map_err(|e| resolution(owner, field_name, e.to_string())),
        }
    }

    /// Resolve a dependency field to a boolean.
    ///
    /// An unset field holds. A plain field is either a boolean literal or
    /// the name of a variable whose answer is used.
    pub fn resolve_bool(
        &self,
        owner: &str,
        field_name: &str,
        field: &VarField,
        scope: &dyn Scope,
    ) -> BlueprintResult<bool> {
        if !field.is_set() {
            return Ok(true);
        }

        let result = match field.tag {
            FieldTag::Fn => {
                let results = self.call(owner, field_name, field)?;
                let first = results.first().map(String::as_str).unwrap_or_default();
                parse_bool(first).ok_or_else(|| {
                    resolution(
                        owner,
                        field_name,
                        format!("{} returned '{}', expected true or false", field.value, first),
                    )
                })?
            }
            FieldTag::Expression => forge_expr::evaluate_bool(&field.value, scope)
                .map_err(|e| resolution(owner, field_name, e.to_string()))?,
            FieldTag::None if field.is_bool_literal() => field.bool,
            FieldTag::None => match scope.lookup(&field.value) {
                Some(Value::Bool(b)) => b,
                Some(Value::String(s)) if s.is_empty() => false,
                Some(other) => {
                    return Err(resolution(
                        owner,
                        field_name,
                        format!("value '{}' of [{}] is not a boolean", other, field.value),
                    ))
                }
                None => {
                    return Err(resolution(
                        owner,
                        field_name,
                        format!("variable [{}] has no value yet", field.value),
                    ))
                }
            },
        };

        debug!("{} of [{}]: {} -> {}", field_name, owner, field, result != field.invert_bool);
        Ok(result != field.invert_bool)
    }

    /// Resolve select options; a `!fn` option expands to every result.
    pub fn resolve_options(
        &self,
        owner: &str,
        options: &[VarField],
        scope: &dyn Scope,
    ) -> BlueprintResult<Vec<ResolvedOption>> {
        let mut resolved = Vec::new();
        for option in options {
            match option.tag {
                FieldTag::Fn => {
                    let results = self.call(owner, "options", option)?;
                    resolved.extend(results.into_iter().map(ResolvedOption::new));
                }
                _ => {
                    let value = self.resolve_value(owner, "options", option, scope)?;
                    let label = if option.label.is_empty() {
                        value.clone()
                    } else {
                        option.label.clone()
                    };
                    resolved.push(ResolvedOption { label, value });
                }
            }
        }
        Ok(resolved)
    }

    fn call(&self, owner: &str, field_name: &str, field: &VarField) -> BlueprintResult<Vec<String>> {
        debug!("Calling function {} for {} of [{}]", field.value, field_name, owner);
        self.functions
            .call(&field.value)
            .map_err(|e| resolution(owner, field_name, e.to_string()))
    }
}

/// Parse a strict `true`/`false` spelling.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn resolution(owner: &str, field_name: &str, message: impl Into<String>) -> BlueprintError {
    BlueprintError::Resolution {
        name: owner.to_string(),
        field: field_name.to_string(),
        message: message.into(),
    }
}
