//! Recursive-descent parser producing an expression tree.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, `== != =~ !~`,
//! `> < >= <=`, `+ -`, `* / %`, unary `! -`.

use std::collections::BTreeSet;

use crate::error::{ExprError, ExprResult};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::value::Value;

/// Deepest expression tree the parser builds.
const MAX_DEPTH: usize = 128;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Match,
    NotMatch,
    Gt,
    Lt,
    Ge,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Collect every identifier referenced by this tree.
    pub fn collect_identifiers(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident(name) => {
                out.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_identifiers(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_identifiers(out);
                then.collect_identifiers(out);
                otherwise.collect_identifiers(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(out);
                }
            }
        }
    }
}

/// Parse an expression string into a tree.
pub fn parse(source: &str) -> ExprResult<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    if parser.peek() == &TokenKind::Eof {
        return Err(ExprError::syntax(0, "empty expression"));
    }

    let expr = parser.ternary()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        other => Err(ExprError::syntax(
            parser.position(),
            format!("unexpected token {:?}", other),
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> ExprResult<()> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(ExprError::syntax(
                self.position(),
                format!("expected {}, found {:?}", what, self.peek()),
            ))
        }
    }

    fn descend(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::syntax(
                self.position(),
                format!("expression nested deeper than {} levels", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    fn ternary(&mut self) -> ExprResult<Expr> {
        self.descend()?;
        let expr = self.conditional()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn conditional(&mut self) -> ExprResult<Expr> {
        let condition = self.or()?;
        if self.peek() != &TokenKind::Question {
            return Ok(condition);
        }
        self.advance();
        let then = self.ternary()?;
        self.expect(TokenKind::Colon, "':' in conditional expression")?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> ExprResult<Expr> {
        self.binary_level(Self::and, |kind| match kind {
            TokenKind::Or => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn and(&mut self) -> ExprResult<Expr> {
        self.binary_level(Self::equality, |kind| match kind {
            TokenKind::And => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn equality(&mut self) -> ExprResult<Expr> {
        self.binary_level(Self::comparison, |kind| match kind {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::Match => Some(BinaryOp::Match),
            TokenKind::NotMatch => Some(BinaryOp::NotMatch),
            _ => None,
        })
    }

    fn comparison(&mut self) -> ExprResult<Expr> {
        self.binary_level(Self::additive, |kind| match kind {
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            TokenKind::Le => Some(BinaryOp::Le),
            _ => None,
        })
    }

    fn additive(&mut self) -> ExprResult<Expr> {
        self.binary_level(Self::multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> ExprResult<Expr> {
        self.binary_level(Self::unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> ExprResult<Expr>,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> ExprResult<Expr> {
        let mut lhs = next(self)?;
        let mut levels = 0;
        while let Some(op) = op_for(self.peek()) {
            // Each operator in a chain deepens the left spine.
            self.descend()?;
            levels += 1;
            self.advance();
            let rhs = next(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= levels;
        Ok(lhs)
    }

    fn unary(&mut self) -> ExprResult<Expr> {
        let op = match self.peek() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            _ => return self.primary(),
        };
        self.advance();
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> ExprResult<Expr> {
        let position = self.position();
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::LParen => {
                let inner = self.ternary()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.peek() == &TokenKind::LParen {
                    self.advance();
                    let args = self.arguments()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            TokenKind::Eof => Err(ExprError::syntax(position, "unexpected end of expression")),
            other => Err(ExprError::syntax(
                position,
                format!("unexpected token {:?}", other),
            )),
        }
    }

    fn arguments(&mut self) -> ExprResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == &TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.ternary()?);
            match self.advance() {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                other => {
                    return Err(ExprError::syntax(
                        self.position(),
                        format!("expected ',' or ')' in argument list, found {:?}", other),
                    ))
                }
            }
        }
    }
}
