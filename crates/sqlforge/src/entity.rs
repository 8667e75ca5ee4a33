//! Entity descriptors: the column-to-field mapping consumed by the renderer.
//!
//! An [`EntityDescriptor`] is an immutable record of an entity's columns in
//! declaration order. It is built from raw field definitions supplied by the
//! host front end; the builder applies the ignore filter, database-name
//! derivation and the closed type mapping, and rejects duplicate names.

use crate::error::{EngineError, EngineResult};
use crate::types::DbType;
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

/// One column of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name in the database.
    pub db_name: String,
    /// Field name on the entity type.
    pub field_name: String,
    pub db_type: DbType,
    pub is_nullable: bool,
    pub is_key: bool,
}

/// An immutable entity descriptor.
///
/// `columns` holds only non-ignored columns, in source declaration order.
/// Two descriptors compare equal iff all fields compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Fully qualified language type name.
    pub type_name: String,
    pub table_name: String,
    columns: Vec<ColumnMeta>,
}

impl EntityDescriptor {
    /// Start building a descriptor for the given type name.
    pub fn builder(type_name: impl Into<String>) -> EntityBuilder {
        EntityBuilder {
            type_name: type_name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Columns in declaration order (ignored fields already filtered).
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Find a column by field name.
    pub fn column_by_field(&self, field_name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.field_name == field_name)
    }

    /// Key columns, in declaration order.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.iter().filter(|c| c.is_key)
    }

    /// The short (unqualified) type name.
    pub fn short_name(&self) -> &str {
        self.type_name
            .rsplit("::")
            .next()
            .unwrap_or(&self.type_name)
    }
}

/// A raw field definition, prior to descriptor construction.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    pub db_name: Option<String>,
    pub is_key: bool,
    pub ignored: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            db_name: None,
            is_key: false,
            ignored: false,
        }
    }

    /// Mark this field as (part of) the primary key.
    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    /// Override the database column name (wins verbatim).
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
        self
    }

    /// Exclude this field from the column set.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// Builder for [`EntityDescriptor`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    type_name: String,
    table_name: Option<String>,
    fields: Vec<FieldDef>,
}

impl EntityBuilder {
    /// Set the table name explicitly (wins verbatim over derivation).
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Build the descriptor.
    ///
    /// Applies, in order: ignore filter, db-name derivation (explicit
    /// override, else snake_case of the field name), type mapping, and the
    /// declaration-order sort (stable by construction). Fails on duplicate
    /// field or column names and on nullable key columns.
    pub fn build(self) -> EngineResult<EntityDescriptor> {
        let short_name = self
            .type_name
            .rsplit("::")
            .next()
            .unwrap_or(&self.type_name)
            .to_string();
        let table_name = self
            .table_name
            .unwrap_or_else(|| pluralize(&short_name.to_snake_case()));

        let mut columns = Vec::with_capacity(self.fields.len());
        for field in self.fields.into_iter().filter(|f| !f.ignored) {
            let db_name = field
                .db_name
                .unwrap_or_else(|| field.name.to_snake_case());
            let (db_type, is_nullable) = DbType::parse_nullable(&field.type_name);

            if field.is_key && is_nullable {
                return Err(EngineError::validation(format!(
                    "Key column '{}' on entity '{}' must not be nullable",
                    field.name, short_name
                )));
            }
            if columns
                .iter()
                .any(|c: &ColumnMeta| c.field_name == field.name)
            {
                return Err(EngineError::DuplicateColumn {
                    entity: short_name,
                    name: field.name,
                });
            }
            if columns.iter().any(|c: &ColumnMeta| c.db_name == db_name) {
                return Err(EngineError::DuplicateColumn {
                    entity: short_name,
                    name: db_name,
                });
            }

            columns.push(ColumnMeta {
                db_name,
                field_name: field.name,
                db_type,
                is_nullable,
                is_key: field.is_key,
            });
        }

        Ok(EntityDescriptor {
            type_name: self.type_name,
            table_name,
            columns,
        })
    }
}

/// Naive English pluralization used for table-name derivation.
fn pluralize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    if let Some(stem) = name.strip_suffix('y') {
        let prev = stem.chars().last();
        if prev.is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{stem}ies");
        }
    }
    if name.ends_with('s')
        || name.ends_with('x')
        || name.ends_with('z')
        || name.ends_with("ch")
        || name.ends_with("sh")
    {
        return format!("{name}es");
    }
    format!("{name}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> EntityDescriptor {
        EntityDescriptor::builder("crate::model::User")
            .table("users")
            .field(FieldDef::new("id", "i64").key())
            .field(FieldDef::new("name", "String"))
            .field(FieldDef::new("email", "String"))
            .field(FieldDef::new("age", "i32"))
            .build()
            .unwrap()
    }

    #[test]
    fn column_order_is_declaration_order() {
        let e = user();
        let names: Vec<_> = e.columns().iter().map(|c| c.db_name.as_str()).collect();
        assert_eq!(names, ["id", "name", "email", "age"]);
    }

    #[test]
    fn db_name_derivation() {
        let e = EntityDescriptor::builder("Order")
            .field(FieldDef::new("orderId", "i64").key())
            .field(FieldDef::new("createdAt", "datetime"))
            .field(FieldDef::new("total", "decimal").db_name("grand_total"))
            .build()
            .unwrap();
        let names: Vec<_> = e.columns().iter().map(|c| c.db_name.as_str()).collect();
        assert_eq!(names, ["order_id", "created_at", "grand_total"]);
    }

    #[test]
    fn table_name_derived_when_unset() {
        let e = EntityDescriptor::builder("BlogCategory")
            .field(FieldDef::new("id", "i64").key())
            .build()
            .unwrap();
        assert_eq!(e.table_name, "blog_categories");
    }

    #[test]
    fn explicit_table_name_wins_verbatim() {
        let e = EntityDescriptor::builder("User")
            .table("TBL_USERS")
            .field(FieldDef::new("id", "i64").key())
            .build()
            .unwrap();
        assert_eq!(e.table_name, "TBL_USERS");
    }

    #[test]
    fn ignored_fields_filtered() {
        let e = EntityDescriptor::builder("User")
            .field(FieldDef::new("id", "i64").key())
            .field(FieldDef::new("scratch", "String").ignored())
            .build()
            .unwrap();
        assert_eq!(e.columns().len(), 1);
    }

    #[test]
    fn duplicate_field_rejected() {
        let result = EntityDescriptor::builder("User")
            .field(FieldDef::new("id", "i64").key())
            .field(FieldDef::new("id", "i32"))
            .build();
        assert!(matches!(result, Err(EngineError::DuplicateColumn { .. })));
    }

    #[test]
    fn duplicate_db_name_rejected() {
        let result = EntityDescriptor::builder("User")
            .field(FieldDef::new("userName", "String"))
            .field(FieldDef::new("user_name", "String"))
            .build();
        assert!(matches!(result, Err(EngineError::DuplicateColumn { .. })));
    }

    #[test]
    fn nullable_key_rejected() {
        let result = EntityDescriptor::builder("User")
            .field(FieldDef::new("id", "Option<i64>").key())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn nullable_fields_detected() {
        let e = EntityDescriptor::builder("User")
            .field(FieldDef::new("id", "i64").key())
            .field(FieldDef::new("nickname", "Option<String>"))
            .build()
            .unwrap();
        assert!(e.column_by_field("nickname").unwrap().is_nullable);
        assert!(!e.column_by_field("id").unwrap().is_nullable);
    }

    #[test]
    fn pluralize_rules() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("day"), "days");
    }

    #[test]
    fn descriptor_equality_is_field_wise() {
        assert_eq!(user(), user());
        let other = EntityDescriptor::builder("crate::model::User")
            .table("accounts")
            .field(FieldDef::new("id", "i64").key())
            .build()
            .unwrap();
        assert_ne!(user(), other);
    }
}
