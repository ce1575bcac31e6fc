//! Recursive-descent parser and type checker.
//!
//! ```text
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | compare
//! compare := neg [("==" | "!=" | "<" | "<=" | ">" | ">=") neg]
//! neg     := "-" neg | atom
//! atom    := number | duration | "true" | "false" | variable | "(" or ")"
//! ```

use super::lexer::{Token, TokenKind};
use super::{ExpressionError, Metric, Scope, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn from_token(kind: &TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::Ne => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::Le => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::Ge => CmpOp::Ge,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Seconds.
    Duration(f64),
    Bool(bool),
    Var(Scope, Metric),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Static type, or the first type error found.
    pub fn ty(&self) -> Result<Type, ExpressionError> {
        match self {
            Expr::Number(_) => Ok(Type::Number),
            Expr::Duration(_) => Ok(Type::Duration),
            Expr::Bool(_) => Ok(Type::Bool),
            Expr::Var(_, metric) => Ok(metric.ty()),
            Expr::Neg(inner) => match inner.ty()? {
                Type::Bool => Err(ExpressionError::TypeMismatch {
                    op: "-",
                    left: Type::Bool,
                    right: None,
                }),
                t => Ok(t),
            },
            Expr::Not(inner) => match inner.ty()? {
                Type::Bool => Ok(Type::Bool),
                t => Err(ExpressionError::TypeMismatch {
                    op: "!",
                    left: t,
                    right: None,
                }),
            },
            Expr::Cmp(op, lhs, rhs) => {
                let (l, r) = (lhs.ty()?, rhs.ty()?);
                let ordered = !matches!(op, CmpOp::Eq | CmpOp::Ne);
                if l != r || (ordered && l == Type::Bool) {
                    return Err(ExpressionError::TypeMismatch {
                        op: op.as_str(),
                        left: l,
                        right: Some(r),
                    });
                }
                Ok(Type::Bool)
            }
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                let (l, r) = (lhs.ty()?, rhs.ty()?);
                if l != Type::Bool || r != Type::Bool {
                    return Err(ExpressionError::TypeMismatch {
                        op: if matches!(self, Expr::And(..)) { "&&" } else { "||" },
                        left: l,
                        right: Some(r),
                    });
                }
                Ok(Type::Bool)
            }
        }
    }

    /// Whether no variable occurs in the expression.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Duration(_) | Expr::Bool(_) => true,
            Expr::Var(..) => false,
            Expr::Neg(e) | Expr::Not(e) => e.is_constant(),
            Expr::Cmp(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                l.is_constant() && r.is_constant()
            }
        }
    }
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// End of the source, for errors at EOF.
    end: usize,
    /// Metric that bare `current` / `prev` / `diff` refer to.
    metric: Option<Metric>,
    depth: usize,
}

/// Limit on nesting plus `&&`/`||` chain length.
const MAX_DEPTH: usize = 128;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], end: usize, metric: Option<Metric>) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            metric,
            depth: 0,
        }
    }

    /// Parse the whole token stream.
    pub fn parse(mut self) -> Result<Expr, ExpressionError> {
        if self.tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let expr = self.or()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(self.unexpected(token)),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, token: &Token) -> ExpressionError {
        ExpressionError::Syntax {
            pos: token.pos,
            message: format!("unexpected {:?}", token.kind),
        }
    }

    fn eof(&self) -> ExpressionError {
        ExpressionError::Syntax {
            pos: self.end,
            message: "unexpected end of expression".to_string(),
        }
    }

    /// Take one level of the depth budget, failing beyond `MAX_DEPTH`.
    fn descend(&mut self) -> Result<(), ExpressionError> {
        if self.depth >= MAX_DEPTH {
            let pos = self.peek().map_or(self.end, |t| t.pos);
            return Err(ExpressionError::Syntax {
                pos,
                message: "expression nested too deeply".to_string(),
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Enter a nested production.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        self.descend()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// `&&` and `||` chains nest to the left, so every operator deepens
    /// the tree by one level.
    fn chain(
        &mut self,
        op: &TokenKind,
        operand: fn(&mut Self) -> Result<Expr, ExpressionError>,
        node: fn(Box<Expr>, Box<Expr>) -> Expr,
    ) -> Result<Expr, ExpressionError> {
        let start = self.depth;
        let result = self.chain_from(op, operand, node);
        self.depth = start;
        result
    }

    fn chain_from(
        &mut self,
        op: &TokenKind,
        operand: fn(&mut Self) -> Result<Expr, ExpressionError>,
        node: fn(Box<Expr>, Box<Expr>) -> Expr,
    ) -> Result<Expr, ExpressionError> {
        let mut lhs = operand(self)?;
        while self.eat(op) {
            self.descend()?;
            let rhs = operand(self)?;
            lhs = node(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        self.chain(&TokenKind::Or, Self::and, Expr::Or)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        self.chain(&TokenKind::And, Self::unary, Expr::And)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&TokenKind::Not) {
            return Ok(Expr::Not(Box::new(self.nested(Self::unary)?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.neg()?;
        let Some(op) = self.peek().and_then(|t| CmpOp::from_token(&t.kind)) else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.neg()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn neg(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Neg(Box::new(self.nested(Self::neg)?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.peek().ok_or_else(|| self.eof())?;
        self.pos += 1;
        match &token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(*n)),
            TokenKind::Duration(d) => Ok(Expr::Duration(*d)),
            TokenKind::Ident(name) => self.ident(name),
            TokenKind::LParen => {
                let inner = self.nested(Self::or)?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(match self.peek() {
                        Some(t) => self.unexpected(t),
                        None => self.eof(),
                    });
                }
                Ok(inner)
            }
            _ => Err(self.unexpected(token)),
        }
    }

    fn ident(&self, name: &str) -> Result<Expr, ExpressionError> {
        match name {
            "true" => return Ok(Expr::Bool(true)),
            "false" => return Ok(Expr::Bool(false)),
            _ => {}
        }

        let unknown = || ExpressionError::UnknownVariable(name.to_string());
        let (scope, metric) = match name.split_once('.') {
            Some((scope, metric)) => (
                Scope::from_name(scope).ok_or_else(unknown)?,
                Metric::from_name(metric).ok_or_else(unknown)?,
            ),
            None => (
                Scope::from_name(name).ok_or_else(unknown)?,
                self.metric.ok_or_else(unknown)?,
            ),
        };
        Ok(Expr::Var(scope, metric))
    }
}
