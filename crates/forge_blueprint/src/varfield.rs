//! Normalized blueprint scalars.
//!
//! Every metadata field that may hold a literal, a boolean, a `!fn`
//! reference or an `!expression` is decoded into a [`VarField`].

use std::fmt;

use serde_yaml::{Number, Value};

use crate::error::{BlueprintError, BlueprintResult};

/// How a field's value is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FieldTag {
    /// Plain literal or variable reference.
    #[default]
    None,
    /// `!fn domain.module(params)` function reference.
    Fn,
    /// `!expression` evaluated against answered variables.
    Expression,
}

impl FieldTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTag::None => "",
            FieldTag::Fn => "!fn",
            FieldTag::Expression => "!expression",
        }
    }
}

/// A decoded metadata scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarField {
    /// Textual value: literal, variable name, function reference or expression.
    pub value: String,
    /// Boolean view, set when `value` is `true` or `false`.
    pub bool: bool,
    /// Display label, used by select options.
    pub label: String,
    pub tag: FieldTag,
    /// Negate the resolved boolean (dependency fields written as `"!Name"`).
    pub invert_bool: bool,
}

impl VarField {
    /// A literal field; `"true"`/`"false"` also set the boolean view.
    pub fn literal(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            bool: value == "true",
            value,
            ..Self::default()
        }
    }

    /// A boolean field.
    pub fn from_bool(b: bool) -> Self {
        Self {
            value: b.to_string(),
            bool: b,
            ..Self::default()
        }
    }

    /// A `!fn` reference.
    pub fn function(reference: impl Into<String>) -> Self {
        Self {
            value: reference.into(),
            tag: FieldTag::Fn,
            ..Self::default()
        }
    }

    /// An `!expression`.
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            value: expression.into(),
            tag: FieldTag::Expression,
            ..Self::default()
        }
    }

    /// Attach a display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Negate the field's boolean result.
    pub fn negated(mut self) -> Self {
        self.invert_bool = !self.invert_bool;
        self
    }

    /// Whether the field carries anything at all.
    pub fn is_set(&self) -> bool {
        !self.value.is_empty()
    }

    /// Whether the field must be resolved through a function or expression.
    pub fn is_dynamic(&self) -> bool {
        self.tag != FieldTag::None
    }

    /// Whether the literal text is a boolean spelling.
    pub fn is_bool_literal(&self) -> bool {
        self.tag == FieldTag::None && (self.value == "true" || self.value == "false")
    }

    /// Label for display, falling back to the value.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.value
        } else {
            &self.label
        }
    }
}

impl fmt::Display for VarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert_bool {
            write!(f, "!")?;
        }
        match self.tag {
            FieldTag::None => write!(f, "{}", self.value),
            tag => write!(f, "{} {}", tag.as_str(), self.value),
        }
    }
}

/// Canonical text of a YAML number: integers verbatim, floats with six
/// decimal places.
pub fn canonical_number(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        i.to_string()
    } else if let Some(u) = number.as_u64() {
        u.to_string()
    } else {
        format!("{:.6}", number.as_f64().unwrap_or_default())
    }
}

/// Decode any scalar-position YAML value.
pub(crate) fn decode_field(value: &Value, context: &str) -> BlueprintResult<VarField> {
    match value {
        Value::Null => Ok(VarField::default()),
        Value::Bool(b) => Ok(VarField::from_bool(*b)),
        Value::Number(n) => Ok(VarField::literal(canonical_number(n))),
        Value::String(s) => Ok(VarField::literal(s.as_str())),
        Value::Tagged(tagged) => {
            let text = match &tagged.value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => canonical_number(n),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(BlueprintError::schema(format!(
                        "tagged value {} in {} must be a scalar",
                        tagged.tag, context
                    )))
                }
            };
            if tagged.tag == "fn" {
                Ok(VarField::function(text))
            } else if tagged.tag == "expression" {
                Ok(VarField::expression(text))
            } else {
                Err(BlueprintError::schema(format!(
                    "unknown tag {} in {}",
                    tagged.tag, context
                )))
            }
        }
        Value::Sequence(_) | Value::Mapping(_) => Err(BlueprintError::schema(format!(
            "{} must be a scalar value",
            context
        ))),
    }
}

/// Decode a dependency field (`promptIf`, `writeIf`, `includeIf`).
///
/// A plain string starting with `!` references a variable whose value is
/// negated.
pub(crate) fn decode_dependency(value: &Value, context: &str) -> BlueprintResult<VarField> {
    let field = decode_field(value, context)?;
    if field.tag == FieldTag::None {
        if let Some(name) = field.value.strip_prefix('!') {
            return Ok(VarField::literal(name.trim()).negated());
        }
    }
    Ok(field)
}
