//! Execution plans: the immutable compiled representation of one method.
//!
//! A plan carries the final SQL (possibly containing deferred runtime
//! markers), the ordered parameter bindings, the result materialization
//! shape, the post-processing action and a capacity hint. Plans are created
//! by the planner, immutable thereafter, and handed to a [`PlanEmitter`].

use crate::dialect::{DialectKind, DialectProfile, InsertIdStrategy};
use crate::entity::EntityDescriptor;
use crate::method::MethodDescriptor;
use crate::template::ConditionalKind;
use crate::types::{DbType, ScalarValue};
use serde::{Deserialize, Serialize};

/// Rows pre-allocated for collection results when no capacity hint exists.
pub const DEFAULT_ROW_CAPACITY: usize = 16;

/// Where a bound parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    /// A method argument, by name.
    MethodParam(String),
    /// A field of an entity-valued method argument.
    EntityField { param: String, field: String },
    /// A literal value materialized at plan or render time.
    Literal(ScalarValue),
    /// The id generated by the preceding insert.
    GeneratedId,
}

/// A named parameter slot paired with its data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    pub source: BindingSource,
    /// Type tag when statically known.
    pub db_type: Option<DbType>,
}

impl ParameterBinding {
    pub fn new(name: impl Into<String>, source: BindingSource, db_type: Option<DbType>) -> Self {
        Self {
            name: name.into(),
            source,
            db_type,
        }
    }
}

/// One column of a result projection, in reader order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedColumn {
    /// Index of the column in the data reader.
    pub index: usize,
    pub field_name: String,
    pub db_type: DbType,
    pub is_nullable: bool,
}

/// How the result set materializes back into the method's return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    Unit,
    Scalar(DbType),
    Entity {
        entity: String,
        projection: Vec<ProjectedColumn>,
    },
    OptionalEntity {
        entity: String,
        projection: Vec<ProjectedColumn>,
    },
    Collection {
        entity: String,
        projection: Vec<ProjectedColumn>,
    },
    AffectedRows,
    GeneratedId(DbType),
}

/// Post-processing after command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostAction {
    None,
    ReturnAffectedRows,
    ReturnLastInsertId(InsertIdStrategy),
    /// The generated value arrives through an OUTPUT clause.
    ReturnOutputValue,
}

/// Pre-sizing hint for result collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityHint {
    None,
    ExplicitLimit(usize),
    FromParam(String),
}

/// Whether a deferred WHERE fragment opens the clause or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhereContext {
    /// No WHERE precedes the marker; render `WHERE <cond>`.
    AddWhere,
    /// A WHERE clause already exists; render `AND <cond>`.
    AddAnd,
}

/// One column of a deferred batch-VALUES projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchColumn {
    pub db_name: String,
    pub field_name: String,
    pub db_type: DbType,
}

/// A deferred runtime marker carried by a plan.
///
/// The marker token (`{{RUNTIME_…}}`) appears verbatim in the plan's SQL and
/// is replaced by the runtime renderer before the command reaches a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deferred {
    NullableLimit {
        param: String,
    },
    NullableOffset {
        param: String,
    },
    WhereExpr {
        param: String,
        context: WhereContext,
    },
    BatchValues {
        param: String,
        columns: Vec<BatchColumn>,
    },
    Conditional {
        id: u32,
        kind: ConditionalKind,
        param: String,
        inner_sql: String,
        else_sql: Option<String>,
    },
}

impl Deferred {
    /// The marker token as it appears in the plan's SQL.
    pub fn marker(&self) -> String {
        match self {
            Deferred::NullableLimit { param } => {
                format!("{{{{RUNTIME_NULLABLE_LIMIT_{param}}}}}")
            }
            Deferred::NullableOffset { param } => {
                format!("{{{{RUNTIME_NULLABLE_OFFSET_{param}}}}}")
            }
            Deferred::WhereExpr { param, .. } => format!("{{{{RUNTIME_WHERE_EXPR_{param}}}}}"),
            Deferred::BatchValues { param, .. } => {
                format!("{{{{RUNTIME_BATCH_VALUES_{param}}}}}")
            }
            Deferred::Conditional { id, .. } => format!("{{{{RUNTIME_COND_{id}}}}}"),
        }
    }
}

/// Kind of statement a plan executes, detected from the SQL head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Detect the statement kind from the first keyword of the SQL text.
    pub fn detect(sql: &str) -> StatementKind {
        let head = sql
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default();
        if head.eq_ignore_ascii_case("select") {
            StatementKind::Select
        } else if head.eq_ignore_ascii_case("insert") {
            StatementKind::Insert
        } else if head.eq_ignore_ascii_case("update") {
            StatementKind::Update
        } else if head.eq_ignore_ascii_case("delete") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }
}

/// The immutable compiled representation of one repository method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Method name the plan was compiled for.
    pub method: String,
    pub dialect: DialectKind,
    /// Final SQL, possibly containing deferred runtime markers.
    pub sql: String,
    /// Ordered parameter bindings, unique by name, first-appearance order.
    pub bindings: Vec<ParameterBinding>,
    /// Deferred markers, in order of appearance in `sql`.
    pub deferred: Vec<Deferred>,
    pub result: ResultShape,
    pub post: PostAction,
    pub capacity_hint: CapacityHint,
    pub statement_kind: StatementKind,
    /// Maximum tuples per batch command; larger batches are chunked.
    pub batch_max_size: Option<usize>,
}

impl ExecutionPlan {
    /// A plan with no deferred markers is static.
    pub fn is_static(&self) -> bool {
        self.deferred.is_empty()
    }

    /// Find a binding by parameter name.
    pub fn binding(&self, name: &str) -> Option<&ParameterBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Find the deferred descriptor behind a marker token.
    pub fn deferred_for(&self, marker: &str) -> Option<&Deferred> {
        self.deferred.iter().find(|d| d.marker() == marker)
    }

    /// Rows to pre-allocate for collection results.
    ///
    /// `FromParam` hints resolve at call time; until then the default
    /// applies.
    pub fn row_capacity(&self) -> usize {
        match &self.capacity_hint {
            CapacityHint::ExplicitLimit(n) => *n,
            CapacityHint::None | CapacityHint::FromParam(_) => DEFAULT_ROW_CAPACITY,
        }
    }
}

/// Boundary that hands finished plans to an external code emitter.
///
/// The core guarantees the plan is immutable, its binding order stable and
/// its SQL bytes deterministic for identical inputs.
pub trait PlanEmitter {
    fn emit(
        &mut self,
        plan: &ExecutionPlan,
        method: &MethodDescriptor,
        dialect: &DialectProfile,
    ) -> crate::error::EngineResult<()>;
}

/// An emitter that collects plans, mainly for tests and tooling.
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    pub plans: Vec<ExecutionPlan>,
}

impl PlanEmitter for CollectingEmitter {
    fn emit(
        &mut self,
        plan: &ExecutionPlan,
        _method: &MethodDescriptor,
        _dialect: &DialectProfile,
    ) -> crate::error::EngineResult<()> {
        self.plans.push(plan.clone());
        Ok(())
    }
}

/// Lookup of entity descriptors by (short or qualified) type name.
pub fn find_entity<'a>(
    entities: &'a [EntityDescriptor],
    type_name: &str,
) -> Option<&'a EntityDescriptor> {
    entities
        .iter()
        .find(|e| e.type_name == type_name || e.short_name() == type_name)
}
