//! Predicate DSL for dynamic WHERE fragments.
//!
//! This module provides the [`PredicateExpr`] tree which supports:
//! - AND/OR/NOT grouping
//! - Comparison, LIKE, IN, IS NULL and BETWEEN nodes
//! - Values that are either literals (materialized as generated bound
//!   parameters `p0`, `p1`, …) or references to method parameters (which
//!   reuse the method binding by name)
//!
//! Translation produces the condition fragment only; the caller adds the
//! `WHERE` keyword. Identifiers go through the dialect's quoting, so unsafe
//! column names are rejected rather than spliced.

use crate::dialect::DialectProfile;
use crate::error::{EngineError, EngineResult};
use crate::plan::{BindingSource, ParameterBinding};
use crate::types::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Comparison operator of a [`PredicateExpr::Cmp`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// A value position in a predicate: literal or method-parameter reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateValue {
    Literal(ScalarValue),
    Param(String),
}

impl PredicateValue {
    pub fn param(name: impl Into<String>) -> Self {
        PredicateValue::Param(name.into())
    }
}

impl<T: Into<ScalarValue>> From<T> for PredicateValue {
    fn from(v: T) -> Self {
        PredicateValue::Literal(v.into())
    }
}

/// Predicate node for dynamic WHERE clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateExpr {
    /// AND group: all conditions must be true.
    And(Vec<PredicateExpr>),

    /// OR group: at least one condition must be true.
    Or(Vec<PredicateExpr>),

    /// NOT: negate the inner expression.
    Not(Box<PredicateExpr>),

    /// Simple comparison: column op value
    Cmp {
        column: String,
        op: CmpOp,
        value: PredicateValue,
    },

    /// LIKE / NOT LIKE
    Like {
        column: String,
        pattern: PredicateValue,
        negated: bool,
    },

    /// IN list / NOT IN list
    In {
        column: String,
        values: Vec<PredicateValue>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { column: String, negated: bool },

    /// BETWEEN lo AND hi
    Between {
        column: String,
        lo: PredicateValue,
        hi: PredicateValue,
    },
}

impl PredicateExpr {
    pub fn and(exprs: Vec<PredicateExpr>) -> Self {
        PredicateExpr::And(exprs)
    }

    pub fn or(exprs: Vec<PredicateExpr>) -> Self {
        PredicateExpr::Or(exprs)
    }

    pub fn not(expr: PredicateExpr) -> Self {
        PredicateExpr::Not(Box::new(expr))
    }

    pub fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<PredicateValue>) -> Self {
        PredicateExpr::Cmp {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::cmp(column, CmpOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::cmp(column, CmpOp::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::cmp(column, CmpOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::cmp(column, CmpOp::Ge, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::cmp(column, CmpOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::cmp(column, CmpOp::Le, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<PredicateValue>) -> Self {
        PredicateExpr::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<PredicateValue>) -> Self {
        PredicateExpr::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: true,
        }
    }

    pub fn in_list(
        column: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<PredicateValue>>,
    ) -> Self {
        PredicateExpr::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in(
        column: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<PredicateValue>>,
    ) -> Self {
        PredicateExpr::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        PredicateExpr::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        PredicateExpr::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    pub fn between(
        column: impl Into<String>,
        lo: impl Into<PredicateValue>,
        hi: impl Into<PredicateValue>,
    ) -> Self {
        PredicateExpr::Between {
            column: column.into(),
            lo: lo.into(),
            hi: hi.into(),
        }
    }

    /// Check if this expression contains no conditions.
    pub fn is_empty(&self) -> bool {
        match self {
            PredicateExpr::And(exprs) | PredicateExpr::Or(exprs) => {
                exprs.is_empty() || exprs.iter().all(|e| e.is_empty())
            }
            PredicateExpr::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }
}

/// Generates collision-free names for literal bindings (`p0`, `p1`, …).
#[derive(Debug, Default)]
pub struct ParamNames {
    counter: usize,
    taken: HashSet<String>,
}

impl ParamNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve names that are already bound, so generated names skip them.
    pub fn with_reserved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counter: 0,
            taken: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Next free generated name.
    pub fn next_name(&mut self) -> String {
        loop {
            let candidate = format!("p{}", self.counter);
            self.counter += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// A translated condition fragment plus the bindings it introduced.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The condition SQL, without the `WHERE` keyword.
    pub sql: String,
    pub bindings: Vec<ParameterBinding>,
}

/// Translate a predicate tree into a condition fragment.
pub fn translate(
    expr: &PredicateExpr,
    dialect: &DialectProfile,
    names: &mut ParamNames,
) -> EngineResult<Condition> {
    let mut bindings = Vec::new();
    let sql = build(expr, dialect, names, &mut bindings)?;
    Ok(Condition { sql, bindings })
}

fn value_token(
    value: &PredicateValue,
    dialect: &DialectProfile,
    names: &mut ParamNames,
    bindings: &mut Vec<ParameterBinding>,
) -> String {
    match value {
        PredicateValue::Literal(v) => {
            let name = names.next_name();
            let token = dialect.param_token(&name);
            bindings.push(ParameterBinding::new(
                name,
                BindingSource::Literal(v.clone()),
                v.type_tag(),
            ));
            token
        }
        PredicateValue::Param(name) => {
            if !bindings.iter().any(|b| b.name == *name) {
                bindings.push(ParameterBinding::new(
                    name.clone(),
                    BindingSource::MethodParam(name.clone()),
                    None,
                ));
            }
            dialect.param_token(name)
        }
    }
}

fn build(
    expr: &PredicateExpr,
    dialect: &DialectProfile,
    names: &mut ParamNames,
    bindings: &mut Vec<ParameterBinding>,
) -> EngineResult<String> {
    match expr {
        PredicateExpr::And(exprs) => {
            let mut parts = Vec::with_capacity(exprs.len());
            for e in exprs.iter().filter(|e| !e.is_empty()) {
                let sql = build(e, dialect, names, bindings)?;
                if sql.is_empty() {
                    continue;
                }
                // Wrap OR groups in parentheses.
                if matches!(e, PredicateExpr::Or(_)) {
                    parts.push(format!("({sql})"));
                } else {
                    parts.push(sql);
                }
            }
            Ok(parts.join(" AND "))
        }
        PredicateExpr::Or(exprs) => {
            let mut parts = Vec::with_capacity(exprs.len());
            for e in exprs.iter().filter(|e| !e.is_empty()) {
                let sql = build(e, dialect, names, bindings)?;
                if sql.is_empty() {
                    continue;
                }
                // Wrap AND groups in parentheses.
                if matches!(e, PredicateExpr::And(_)) {
                    parts.push(format!("({sql})"));
                } else {
                    parts.push(sql);
                }
            }
            Ok(parts.join(" OR "))
        }
        PredicateExpr::Not(inner) => {
            let sql = build(inner, dialect, names, bindings)?;
            if sql.is_empty() {
                Ok(String::new())
            } else {
                Ok(format!("NOT ({sql})"))
            }
        }
        PredicateExpr::Cmp { column, op, value } => {
            let col = wrap_predicate_column(dialect, column)?;
            let token = value_token(value, dialect, names, bindings);
            Ok(format!("{col} {} {token}", op.as_sql()))
        }
        PredicateExpr::Like {
            column,
            pattern,
            negated,
        } => {
            let col = wrap_predicate_column(dialect, column)?;
            let token = value_token(pattern, dialect, names, bindings);
            let op = if *negated { "NOT LIKE" } else { "LIKE" };
            Ok(format!("{col} {op} {token}"))
        }
        PredicateExpr::In {
            column,
            values,
            negated,
        } => {
            if values.is_empty() {
                // An empty IN list matches nothing; NOT IN matches everything.
                return Ok(if *negated { "1=1" } else { "1=0" }.to_string());
            }
            let col = wrap_predicate_column(dialect, column)?;
            let mut tokens = Vec::with_capacity(values.len());
            for v in values {
                tokens.push(value_token(v, dialect, names, bindings));
            }
            let op = if *negated { "NOT IN" } else { "IN" };
            Ok(format!("{col} {op} ({})", tokens.join(", ")))
        }
        PredicateExpr::IsNull { column, negated } => {
            let col = wrap_predicate_column(dialect, column)?;
            if *negated {
                Ok(format!("{col} IS NOT NULL"))
            } else {
                Ok(format!("{col} IS NULL"))
            }
        }
        PredicateExpr::Between { column, lo, hi } => {
            let col = wrap_predicate_column(dialect, column)?;
            let lo_tok = value_token(lo, dialect, names, bindings);
            let hi_tok = value_token(hi, dialect, names, bindings);
            Ok(format!("{col} BETWEEN {lo_tok} AND {hi_tok}"))
        }
    }
}

fn wrap_predicate_column(dialect: &DialectProfile, column: &str) -> EngineResult<String> {
    if column.is_empty() {
        return Err(EngineError::UnsupportedPredicate {
            detail: "empty column reference".to_string(),
        });
    }
    dialect.wrap_column(column)
}
