//! Parser for function references.
//!
//! ```text
//! reference := DOMAIN '.' MODULE '(' [PARAM {',' PARAM}] ')' [selector]
//! selector  := '.' ATTR {'.' ATTR} | '[' INDEX ']'
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{FunctionError, FunctionResult};

/// What part of a function's result the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// The full result.
    #[default]
    All,
    /// A dotted attribute path into a structured result.
    Attribute(Vec<String>),
    /// A single element of a list result.
    Index(usize),
}

/// A parsed `domain.module(params)` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionReference {
    pub domain: String,
    pub module: String,
    pub params: Vec<String>,
    pub selector: Selector,
}

impl FunctionReference {
    /// Parse a reference string.
    pub fn parse(reference: &str) -> FunctionResult<Self> {
        Cursor::new(reference).reference()
    }
}

impl FromStr for FunctionReference {
    type Err = FunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.domain, self.module, self.params.join(", "))?;
        match &self.selector {
            Selector::All => Ok(()),
            Selector::Attribute(path) => write!(f, ".{}", path.join(".")),
            Selector::Index(index) => write!(f, "[{}]", index),
        }
    }
}

struct Cursor<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        let trimmed = source.trim();
        Self {
            source: trimmed,
            rest: trimmed,
        }
    }

    fn error(&self, message: impl Into<String>) -> FunctionError {
        FunctionError::InvalidReference {
            reference: self.source.to_string(),
            message: message.into(),
        }
    }

    fn eat(&mut self, c: char) -> bool {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, c: char) -> FunctionResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn identifier(&mut self, what: &str) -> FunctionResult<String> {
        let end = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error(format!("missing {}", what)));
        }
        let (ident, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(ident.to_string())
    }

    fn reference(mut self) -> FunctionResult<FunctionReference> {
        let domain = self.identifier("function domain")?;
        self.expect('.')?;
        let module = self.identifier("function module")?;
        self.expect('(')?;
        let params = self.params()?;
        let selector = self.selector()?;
        Ok(FunctionReference {
            domain,
            module,
            params,
            selector,
        })
    }

    fn params(&mut self) -> FunctionResult<Vec<String>> {
        let close = self
            .rest
            .find(')')
            .ok_or_else(|| self.error("unclosed parameter list"))?;
        let (inner, rest) = self.rest.split_at(close);
        self.rest = &rest[1..];

        if inner.contains('(') {
            return Err(self.error("nested parentheses are not allowed in parameters"));
        }
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(inner.split(',').map(|p| p.trim().to_string()).collect())
    }

    fn selector(&mut self) -> FunctionResult<Selector> {
        if self.rest.is_empty() {
            return Ok(Selector::All);
        }

        if self.eat('[') {
            let digits_end = self
                .rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(self.rest.len());
            if digits_end == 0 {
                return Err(self.error("index must be a non-negative integer"));
            }
            let (digits, rest) = self.rest.split_at(digits_end);
            self.rest = rest;
            let index = digits
                .parse::<usize>()
                .map_err(|e| self.error(format!("invalid index: {}", e)))?;
            self.expect(']')?;
            return self.finish(Selector::Index(index));
        }

        let mut path = Vec::new();
        while self.eat('.') {
            path.push(self.identifier("attribute name")?);
        }
        if path.is_empty() {
            return Err(self.error(format!("unexpected trailing input '{}'", self.rest)));
        }
        self.finish(Selector::Attribute(path))
    }

    fn finish(&self, selector: Selector) -> FunctionResult<Selector> {
        if self.rest.is_empty() {
            Ok(selector)
        } else {
            Err(self.error(format!(
                "unexpected trailing input '{}'; use either an attribute or an index",
                self.rest
            )))
        }
    }
}
