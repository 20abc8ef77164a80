//! Expression evaluation against a scope.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::error::{ExprError, ExprResult};
use crate::parser::{parse, BinaryOp, Expr, UnaryOp};
use crate::value::{Scope, Value};

/// A parsed expression, ready to be evaluated any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse an expression.
    pub fn parse(source: &str) -> ExprResult<Self> {
        let root = parse(source)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// The original expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all variables the expression refers to.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.root.collect_identifiers(&mut out);
        out
    }

    /// Evaluate the expression.
    ///
    /// Every referenced variable must be present in `scope`, even ones on
    /// a branch that would not be taken.
    pub fn evaluate(&self, scope: &dyn Scope) -> ExprResult<Value> {
        for name in self.variables() {
            if scope.lookup(&name).is_none() {
                return Err(ExprError::UnknownIdentifier(name));
            }
        }
        let value = eval(&self.root, scope)?;
        debug!("Evaluated expression '{}' to {:?}", self.source, value);
        Ok(value)
    }

    /// Evaluate the expression, requiring a boolean result.
    pub fn evaluate_bool(&self, scope: &dyn Scope) -> ExprResult<bool> {
        let value = self.evaluate(scope)?;
        value.as_bool().ok_or_else(|| ExprError::NotBoolean {
            expression: self.source.clone(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn eval(expr: &Expr, scope: &dyn Scope) -> ExprResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => scope
            .lookup(name)
            .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),
        Expr::Unary { op, operand } => {
            let value = eval(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!require_bool(&value, "!")?)),
                UnaryOp::Negate => Ok(Value::Number(-require_number(&value, "-")?)),
            }
        }
        Expr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => {
                if !require_bool(&eval(lhs, scope)?, "&&")? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(require_bool(&eval(rhs, scope)?, "&&")?))
            }
            BinaryOp::Or => {
                if require_bool(&eval(lhs, scope)?, "||")? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(require_bool(&eval(rhs, scope)?, "||")?))
            }
            _ => {
                let left = eval(lhs, scope)?;
                let right = eval(rhs, scope)?;
                binary(*op, &left, &right)
            }
        },
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            if require_bool(&eval(condition, scope)?, "?:")? {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<ExprResult<Vec<_>>>()?;
            call(name, &values)
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!equals(left, right))),
        BinaryOp::Match | BinaryOp::NotMatch => {
            let re = compile(&right.to_string())?;
            let matched = re.is_match(&left.to_string());
            Ok(Value::Bool(if op == BinaryOp::Match {
                matched
            } else {
                !matched
            }))
        }
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => {
            let ordering = compare(left, right, op)?;
            Ok(Value::Bool(match op {
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => ordering.is_le(),
            }))
        }
        BinaryOp::Add => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) if !is_bool(left) && !is_bool(right) => Ok(Value::Number(a + b)),
            _ => Ok(Value::String(format!("{}{}", left, right))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let symbol = match op {
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                _ => "%",
            };
            let a = require_number(left, symbol)?;
            let b = require_number(right, symbol)?;
            match op {
                BinaryOp::Sub => Ok(Value::Number(a - b)),
                BinaryOp::Mul => Ok(Value::Number(a * b)),
                _ if b == 0.0 => Err(ExprError::DivisionByZero),
                BinaryOp::Div => Ok(Value::Number(a / b)),
                _ => Ok(Value::Number(a % b)),
            }
        }
        BinaryOp::And => Ok(Value::Bool(
            require_bool(left, "&&")? && require_bool(right, "&&")?,
        )),
        BinaryOp::Or => Ok(Value::Bool(
            require_bool(left, "||")? || require_bool(right, "||")?,
        )),
    }
}

fn is_bool(value: &Value) -> bool {
    matches!(value, Value::Bool(_))
}

fn equals(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) {
        return a == b;
    }
    if !is_bool(left) && !is_bool(right) {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            return a == b;
        }
    }
    left.to_string() == right.to_string()
}

fn compare(left: &Value, right: &Value, op: BinaryOp) -> ExprResult<std::cmp::Ordering> {
    if is_bool(left) || is_bool(right) {
        return Err(ExprError::Type(format!(
            "cannot order {} and {} with {:?}",
            left.type_name(),
            right.type_name(),
            op
        )));
    }
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
            ExprError::Type(format!("cannot compare {} with {}", a, b))
        }),
        _ => Ok(left.to_string().cmp(&right.to_string())),
    }
}

fn require_bool(value: &Value, operator: &str) -> ExprResult<bool> {
    value.as_bool().ok_or_else(|| {
        ExprError::Type(format!(
            "operator '{}' expects a bool, got {} '{}'",
            operator,
            value.type_name(),
            value
        ))
    })
}

fn require_number(value: &Value, operator: &str) -> ExprResult<f64> {
    if is_bool(value) {
        return Err(ExprError::Type(format!(
            "operator '{}' expects a number, got bool",
            operator
        )));
    }
    value.as_number().ok_or_else(|| {
        ExprError::Type(format!(
            "operator '{}' expects a number, got {} '{}'",
            operator,
            value.type_name(),
            value
        ))
    })
}

fn compile(pattern: &str) -> ExprResult<Regex> {
    Regex::new(pattern).map_err(|e| ExprError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn arity(name: &str, args: &[Value], expected: usize) -> ExprResult<()> {
    if args.len() != expected {
        return Err(ExprError::Arity {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: args.len(),
        });
    }
    Ok(())
}

fn call(name: &str, args: &[Value]) -> ExprResult<Value> {
    match name {
        "strlen" => {
            arity(name, args, 1)?;
            Ok(Value::Number(args[0].to_string().chars().count() as f64))
        }
        "string" => {
            arity(name, args, 1)?;
            Ok(Value::String(args[0].to_string()))
        }
        "ceil" | "floor" | "round" => {
            arity(name, args, 1)?;
            let n = require_number(&args[0], name)?;
            Ok(Value::Number(match name {
                "ceil" => n.ceil(),
                "floor" => n.floor(),
                _ => n.round(),
            }))
        }
        "max" | "min" => {
            if args.is_empty() {
                return Err(ExprError::Arity {
                    name: name.to_string(),
                    expected: "at least 1".to_string(),
                    actual: 0,
                });
            }
            let numbers = args
                .iter()
                .map(|v| require_number(v, name))
                .collect::<ExprResult<Vec<_>>>()?;
            let pick: fn(f64, f64) -> f64 = if name == "max" { f64::max } else { f64::min };
            let first = numbers[0];
            Ok(Value::Number(numbers.into_iter().fold(first, pick)))
        }
        "regex" => {
            arity(name, args, 2)?;
            let re = compile(&args[0].to_string())?;
            Ok(Value::Bool(re.is_match(&args[1].to_string())))
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EmptyScope;
    use std::collections::HashMap;

    fn scope(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from_text(v)))
            .collect()
    }

    fn eval_str(source: &str, scope: &dyn Scope) -> ExprResult<Value> {
        Expression::parse(source)?.evaluate(scope)
    }

    #[test]
    fn test_constant_comparisons() {
        let expr = Expression::parse("2 > 1").unwrap();
        assert!(expr.evaluate_bool(&EmptyScope).unwrap());
        assert!(expr.evaluate_bool(&scope(&[("Foo", "1")])).unwrap());
        let expr = Expression::parse("1 > 2").unwrap();
        assert!(!expr.evaluate_bool(&EmptyScope).unwrap());
    }

    #[test]
    fn test_numeric_string_comparison() {
        let s = scope(&[("Foo", "3")]);
        assert_eq!(eval_str("Foo > 2", &s).unwrap(), Value::Bool(true));
        let s = scope(&[("Foo", "10")]);
        assert_eq!(eval_str("Foo > 9", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("Foo == 10.0", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_non_finite_spellings_compare_as_strings() {
        let s = scope(&[("Name", "NaN"), ("Other", "Infinity")]);
        assert_eq!(eval_str("Name == 'NaN'", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("Other == 'inf'", &s).unwrap(), Value::Bool(false));
        assert_eq!(eval_str("Other == 'Infinity'", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_bool_strings() {
        let s = scope(&[("Enabled", "true"), ("Other", "false")]);
        assert_eq!(eval_str("Enabled && !Other", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("Enabled == true", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("Other == 'false'", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_string_equality() {
        let s = scope(&[("Bar", "hello")]);
        assert_eq!(eval_str("Bar == 'testing'", &s).unwrap(), Value::Bool(false));
        assert_eq!(eval_str("Bar != \"testing\"", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unknown_identifier_is_error() {
        let err = eval_str("Missing == 'x'", &EmptyScope).unwrap_err();
        assert_eq!(err, ExprError::UnknownIdentifier("Missing".to_string()));
    }

    #[test]
    fn test_unknown_identifier_on_untaken_branch() {
        let s = scope(&[("A", "true")]);
        assert!(eval_str("A || Missing", &s).is_err());
    }

    #[test]
    fn test_arithmetic_and_functions() {
        let s = scope(&[("Disk", "100"), ("Name", "abc")]);
        assert_eq!(eval_str("Disk * 2 + 1", &s).unwrap(), Value::Number(201.0));
        assert_eq!(eval_str("strlen(Name)", &s).unwrap(), Value::Number(3.0));
        assert_eq!(eval_str("max(1, Disk, 7)", &s).unwrap(), Value::Number(100.0));
        assert_eq!(eval_str("ceil(1.2)", &s).unwrap(), Value::Number(2.0));
        assert_eq!(
            eval_str("Name + '-' + Disk", &s).unwrap(),
            Value::String("abc-100".to_string())
        );
    }

    #[test]
    fn test_ternary() {
        let s = scope(&[("Prod", "true")]);
        assert_eq!(
            eval_str("Prod ? 'large' : 'small'", &s).unwrap(),
            Value::String("large".to_string())
        );
    }

    #[test]
    fn test_regex() {
        let s = scope(&[("Name", "my-app")]);
        assert_eq!(eval_str("Name =~ '^my-'", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("regex('^[a-z]+$', Name)", &s).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            eval_str("1 / 0", &EmptyScope).unwrap_err(),
            ExprError::DivisionByZero
        );
        assert!(matches!(
            eval_str("nope(1)", &EmptyScope),
            Err(ExprError::UnknownFunction(_))
        ));
        assert!(matches!(
            eval_str("true > 1", &EmptyScope),
            Err(ExprError::Type(_))
        ));
        assert!(matches!(
            Expression::parse("'a'").unwrap().evaluate_bool(&EmptyScope),
            Err(ExprError::NotBoolean { .. })
        ));
    }
}
