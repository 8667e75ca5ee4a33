//! Call-time argument values.
//!
//! [`ArgValues`] carries the actual values of a method invocation into the
//! renderer, keyed by parameter name. A value is a scalar, a predicate DSL
//! tree, or a batch of entity rows already projected into column order.

use sqlforge::{PredicateExpr, ScalarValue};
use std::collections::HashMap;

/// One argument value as seen at call time.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeValue {
    Null,
    Scalar(ScalarValue),
    Predicate(PredicateExpr),
    /// Rows of scalar values, aligned with the plan's batch projection.
    Batch(Vec<Vec<ScalarValue>>),
}

impl RuntimeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null)
            || matches!(self, RuntimeValue::Scalar(ScalarValue::Null))
    }

    /// Emptiness as the conditional markers define it: strings of length 0
    /// and collections of count 0 are empty; NULL counts as empty.
    pub fn is_empty_like(&self) -> bool {
        match self {
            RuntimeValue::Null | RuntimeValue::Scalar(ScalarValue::Null) => true,
            RuntimeValue::Scalar(ScalarValue::Text(s)) => s.is_empty(),
            RuntimeValue::Scalar(_) => false,
            RuntimeValue::Predicate(p) => p.is_empty(),
            RuntimeValue::Batch(rows) => rows.is_empty(),
        }
    }
}

impl From<ScalarValue> for RuntimeValue {
    fn from(v: ScalarValue) -> Self {
        RuntimeValue::Scalar(v)
    }
}

impl From<PredicateExpr> for RuntimeValue {
    fn from(v: PredicateExpr) -> Self {
        RuntimeValue::Predicate(v)
    }
}

impl From<Vec<Vec<ScalarValue>>> for RuntimeValue {
    fn from(rows: Vec<Vec<ScalarValue>>) -> Self {
        RuntimeValue::Batch(rows)
    }
}

/// Named argument values for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgValues {
    map: HashMap<String, RuntimeValue>,
}

impl ArgValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<RuntimeValue>) -> Self {
        self.map.insert(name.into(), value.into());
        self
    }

    /// Builder-style insert of a scalar.
    pub fn scalar(self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.set(name, RuntimeValue::Scalar(value.into()))
    }

    /// Builder-style insert of an explicit NULL.
    pub fn null(self, name: impl Into<String>) -> Self {
        self.set(name, RuntimeValue::Null)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RuntimeValue>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&RuntimeValue> {
        self.map.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
