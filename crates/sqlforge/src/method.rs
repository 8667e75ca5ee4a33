//! Method descriptors: the repository-method surface handed to the planner.

use crate::dialect::DialectKind;
use crate::types::DbType;
use serde::{Deserialize, Serialize};

/// What a method parameter contributes to the generated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    /// A plain scalar bound by name.
    Scalar,
    /// The entity whose fields feed `{{values}}` / `{{set}}`.
    EntityBody,
    /// A sequence of entities feeding `{{batch_values}}`.
    EntityCollection,
    /// A predicate DSL value feeding `{{where}}`.
    PredicateExpression,
    /// Passed through to the driver, never bound.
    CancellationToken,
    /// Passed through to the driver, never bound.
    Transaction,
}

/// A single method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodParam {
    pub name: String,
    pub db_type: DbType,
    pub is_nullable: bool,
    pub role: ParamRole,
}

impl MethodParam {
    pub fn scalar(name: impl Into<String>, type_name: &str) -> Self {
        let (db_type, is_nullable) = DbType::parse_nullable(type_name);
        Self {
            name: name.into(),
            db_type,
            is_nullable,
            role: ParamRole::Scalar,
        }
    }

    pub fn entity(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: DbType::Custom(entity_type.into()),
            is_nullable: false,
            role: ParamRole::EntityBody,
        }
    }

    pub fn collection(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: DbType::Custom(entity_type.into()),
            is_nullable: false,
            role: ParamRole::EntityCollection,
        }
    }

    pub fn predicate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: DbType::Custom("predicate".to_string()),
            is_nullable: true,
            role: ParamRole::PredicateExpression,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }
}

/// The shape a method returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnShape {
    Unit,
    Scalar(DbType),
    /// Exactly one entity of the named type.
    Entity(String),
    /// Zero or one entity.
    OptionalEntity(String),
    /// Any number of entities.
    Collection(String),
    /// The count of affected rows.
    AffectedRows,
    /// The database-generated id of an inserted row.
    GeneratedId(DbType),
}

impl ReturnShape {
    /// The entity type name this shape materializes, if any.
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            ReturnShape::Entity(t)
            | ReturnShape::OptionalEntity(t)
            | ReturnShape::Collection(t) => Some(t),
            _ => None,
        }
    }
}

/// Per-method planning flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFlags {
    pub enable_caching: bool,
    /// Maximum tuples per batch command; larger batches are chunked.
    pub batch_max_size: Option<usize>,
    pub dialect_override: Option<DialectKind>,
}

/// A repository method: name, parameters, return shape and SQL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub parameters: Vec<MethodParam>,
    pub return_shape: ReturnShape,
    pub sql_template: String,
    pub flags: MethodFlags,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, sql_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_shape: ReturnShape::Unit,
            sql_template: sql_template.into(),
            flags: MethodFlags::default(),
        }
    }

    pub fn with_param(mut self, param: MethodParam) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn returning(mut self, shape: ReturnShape) -> Self {
        self.return_shape = shape;
        self
    }

    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Find a parameter by name (ASCII case-insensitive, as placeholder
    /// auto-detection folds case).
    pub fn param(&self, name: &str) -> Option<&MethodParam> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Parameters with the given role, in declaration order.
    pub fn params_with_role(&self, role: ParamRole) -> impl Iterator<Item = &MethodParam> {
        self.parameters.iter().filter(move |p| p.role == role)
    }

    /// The single entity-body parameter, if exactly one exists.
    pub fn entity_body_param(&self) -> Option<&MethodParam> {
        let mut it = self.params_with_role(ParamRole::EntityBody);
        let first = it.next();
        if it.next().is_some() { None } else { first }
    }

    /// The single entity-collection parameter, if exactly one exists.
    pub fn entity_collection_param(&self) -> Option<&MethodParam> {
        let mut it = self.params_with_role(ParamRole::EntityCollection);
        let first = it.next();
        if it.next().is_some() { None } else { first }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_lookup_is_case_insensitive() {
        let m = MethodDescriptor::new("GetById", "SELECT 1")
            .with_param(MethodParam::scalar("Id", "i64"));
        assert!(m.param("id").is_some());
        assert!(m.param("ID").is_some());
        assert!(m.param("name").is_none());
    }

    #[test]
    fn nullable_scalar_param() {
        let p = MethodParam::scalar("limit", "Option<i32>");
        assert!(p.is_nullable);
        assert_eq!(p.db_type, DbType::Int32);
    }

    #[test]
    fn entity_body_param_requires_exactly_one() {
        let m = MethodDescriptor::new("Insert", "INSERT")
            .with_param(MethodParam::entity("user", "User"));
        assert_eq!(m.entity_body_param().unwrap().name, "user");

        let m = m.with_param(MethodParam::entity("other", "User"));
        assert!(m.entity_body_param().is_none());
    }

    #[test]
    fn return_shape_entity_type() {
        assert_eq!(
            ReturnShape::OptionalEntity("User".into()).entity_type(),
            Some("User")
        );
        assert_eq!(ReturnShape::AffectedRows.entity_type(), None);
    }
}
