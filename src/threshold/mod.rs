//! Acceptability expressions.
//!
//! A small boolean language over the measured metrics of a run and of its
//! baseline, e.g.
//!
//! ```text
//! current.coverage >= 80% && diff.coverage >= -1
//! current.ratio >= 1:1.2 || current.time <= 1m30s
//! ```
//!
//! Variables are `<scope>.<metric>` with scope `current`, `prev` or `diff`
//! and metric `coverage` (percent), `ratio` (test lines per code line) or
//! `time` (test execution time). Expressions are type checked when they
//! are compiled, so a typo never surfaces only at evaluation time.

mod lexer;
mod parser;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::{CovgateError, Result};
use crate::report::Report;

use parser::{CmpOp, Expr, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Number,
    Duration,
    Bool,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Type::Number => "number",
            Type::Duration => "duration",
            Type::Bool => "bool",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,

    #[error("syntax error at {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("type mismatch: '{op}' applied to {}", operands(.left, .right))]
    TypeMismatch {
        op: &'static str,
        left: Type,
        right: Option<Type>,
    },

    #[error("expression evaluates to {0}, not bool")]
    NotBoolean(Type),
}

fn operands(left: &Type, right: &Option<Type>) -> String {
    match right {
        Some(right) => format!("{left} and {right}"),
        None => left.to_string(),
    }
}

/// Which run a variable reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Current,
    Prev,
    Diff,
}

impl Scope {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "current" => Some(Scope::Current),
            "prev" => Some(Scope::Prev),
            "diff" => Some(Scope::Diff),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Current => "current",
            Scope::Prev => "prev",
            Scope::Diff => "diff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Coverage,
    Ratio,
    Time,
}

impl Metric {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "coverage" => Some(Metric::Coverage),
            "ratio" => Some(Metric::Ratio),
            "time" => Some(Metric::Time),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Coverage => "coverage",
            Metric::Ratio => "ratio",
            Metric::Time => "time",
        }
    }

    fn ty(&self) -> Type {
        match self {
            Metric::Coverage | Metric::Ratio => Type::Number,
            Metric::Time => Type::Duration,
        }
    }
}

/// Metric values of one run. `None` means not measured.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricValues {
    pub coverage: Option<f64>,
    pub ratio: Option<f64>,
    pub time: Option<Duration>,
}

impl MetricValues {
    pub fn from_report(report: &Report) -> Self {
        Self {
            coverage: report.coverage_percent(),
            ratio: report.code_to_test_ratio(),
            time: report.test_execution_time,
        }
    }

    fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Coverage => self.coverage,
            Metric::Ratio => self.ratio,
            Metric::Time => self.time.map(|t| t.as_secs_f64()),
        }
    }
}

/// What an expression is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub current: MetricValues,
    /// Baseline run, if any. Without one, `prev` reads `current` and every
    /// `diff` is 0.
    pub prev: Option<MetricValues>,
}

impl Metrics {
    pub fn from_reports(current: &Report, baseline: Option<&Report>) -> Self {
        Self {
            current: MetricValues::from_report(current),
            prev: baseline.map(MetricValues::from_report),
        }
    }

    fn lookup(&self, scope: Scope, metric: Metric) -> Result<f64> {
        let current = || {
            self.current
                .get(metric)
                .ok_or_else(|| CovgateError::Unmeasured(format!("current.{}", metric.as_str())))
        };
        let baseline = self.prev.and_then(|p| p.get(metric));
        Ok(match scope {
            Scope::Current => current()?,
            Scope::Prev => match baseline {
                Some(prev) => prev,
                None => current()?,
            },
            Scope::Diff => {
                let current = current()?;
                current - baseline.unwrap_or(current)
            }
        })
    }
}

/// A compiled, type-checked acceptability expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    expr: Expr,
}

impl Expression {
    /// Compile an expression that uses fully qualified variables only.
    pub fn compile(src: &str) -> std::result::Result<Self, ExpressionError> {
        Self::build(src, None)
    }

    /// Compile an expression about one metric.
    ///
    /// Bare `current`, `prev` and `diff` refer to `metric`, and a constant
    /// is shorthand for `current >= c` (coverage, ratio) or
    /// `current <= c` (time).
    pub fn compile_for(metric: Metric, src: &str) -> std::result::Result<Self, ExpressionError> {
        Self::build(src, Some(metric))
    }

    fn build(src: &str, metric: Option<Metric>) -> std::result::Result<Self, ExpressionError> {
        let tokens = lexer::tokenize(src)?;
        let mut expr = Parser::new(&tokens, src.len(), metric).parse()?;

        if let Some(metric) = metric {
            if expr.is_constant() && expr.ty()? != Type::Bool {
                let op = match metric {
                    Metric::Time => CmpOp::Le,
                    Metric::Coverage | Metric::Ratio => CmpOp::Ge,
                };
                expr = Expr::Cmp(
                    op,
                    Box::new(Expr::Var(Scope::Current, metric)),
                    Box::new(expr),
                );
            }
        }

        match expr.ty()? {
            Type::Bool => Ok(Self {
                source: src.to_string(),
                expr,
            }),
            other => Err(ExpressionError::NotBoolean(other)),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, metrics: &Metrics) -> Result<bool> {
        eval_bool(&self.expr, metrics)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile `src` and evaluate it against `metrics`.
pub fn evaluate(src: &str, metrics: &Metrics) -> Result<bool> {
    Expression::compile(src)?.evaluate(metrics)
}

/// Parse a duration literal such as `1m30s` or `500ms`.
pub fn parse_duration(src: &str) -> std::result::Result<Duration, ExpressionError> {
    let tokens = lexer::tokenize(src)?;
    match tokens.as_slice() {
        [] => Err(ExpressionError::Empty),
        [lexer::Token {
            kind: lexer::TokenKind::Duration(secs),
            pos,
        }] => Duration::try_from_secs_f64(*secs).map_err(|e| ExpressionError::Syntax {
            pos: *pos,
            message: e.to_string(),
        }),
        [token, ..] => Err(ExpressionError::Syntax {
            pos: token.pos,
            message: "expected a duration such as 1m30s".to_string(),
        }),
    }
}

// Type checking guarantees every node is evaluated at its own type, so
// numbers and durations share `eval_num` (durations in seconds).

fn eval_num(expr: &Expr, metrics: &Metrics) -> Result<f64> {
    match expr {
        Expr::Number(n) | Expr::Duration(n) => Ok(*n),
        Expr::Var(scope, metric) => metrics.lookup(*scope, *metric),
        Expr::Neg(inner) => Ok(-eval_num(inner, metrics)?),
        _ => unreachable!("type-checked expression used as number"),
    }
}

fn eval_bool(expr: &Expr, metrics: &Metrics) -> Result<bool> {
    match expr {
        Expr::Bool(b) => Ok(*b),
        Expr::Not(inner) => Ok(!eval_bool(inner, metrics)?),
        Expr::And(l, r) => Ok(eval_bool(l, metrics)? && eval_bool(r, metrics)?),
        Expr::Or(l, r) => Ok(eval_bool(l, metrics)? || eval_bool(r, metrics)?),
        Expr::Cmp(op, l, r) if l.ty() == Ok(Type::Bool) => {
            let (l, r) = (eval_bool(l, metrics)?, eval_bool(r, metrics)?);
            Ok(match op {
                CmpOp::Eq => l == r,
                _ => l != r,
            })
        }
        Expr::Cmp(op, l, r) => {
            let (l, r) = (eval_num(l, metrics)?, eval_num(r, metrics)?);
            Ok(match op {
                CmpOp::Eq => (l - r).abs() < f64::EPSILON,
                CmpOp::Ne => (l - r).abs() >= f64::EPSILON,
                CmpOp::Lt => l < r,
                CmpOp::Le => l <= r,
                CmpOp::Gt => l > r,
                CmpOp::Ge => l >= r,
            })
        }
        _ => unreachable!("type-checked expression used as bool"),
    }
}
