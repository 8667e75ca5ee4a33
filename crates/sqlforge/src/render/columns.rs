//! Column-list placeholders: `{{columns}}`, `{{values}}`, `{{set}}` and the
//! shared filtering algebra.

use crate::diagnostics::codes;
use crate::entity::{ColumnMeta, EntityDescriptor};
use crate::error::{EngineError, EngineResult};
use crate::method::MethodParam;
use crate::plan::{BindingSource, ParameterBinding, ProjectedColumn};
use crate::render::{PlanBuilder, RenderContext};
use crate::template::{Placeholder, PlaceholderOptions};
use regex::Regex;

/// Apply `--include`, `--exclude` and `--regex` to an entity's columns.
///
/// Filters compose with AND: the include whitelist first, then the exclude
/// blacklist, then the regex match on the field name. Declaration order is
/// preserved.
pub(crate) fn filter_columns<'e>(
    entity: &'e EntityDescriptor,
    options: &PlaceholderOptions,
) -> EngineResult<Vec<&'e ColumnMeta>> {
    let include = options.list("include");
    let exclude = options.list("exclude");
    let pattern = match options.one("regex") {
        Some(raw) => Some(Regex::new(raw).map_err(|e| {
            EngineError::validation(format!("invalid --regex pattern '{raw}': {e}"))
        })?),
        None => None,
    };

    Ok(entity
        .columns()
        .iter()
        .filter(|c| {
            let field = c.field_name.as_str();
            if let Some(include) = &include {
                if !include.iter().any(|n| *n == field) {
                    return false;
                }
            }
            if let Some(exclude) = &exclude {
                if exclude.iter().any(|n| *n == field) {
                    return false;
                }
            }
            if let Some(pattern) = &pattern {
                if !pattern.is_match(field) {
                    return false;
                }
            }
            true
        })
        .collect())
}

fn require_entity<'a>(
    placeholder: &Placeholder,
    ctx: &RenderContext<'a>,
    out: &mut PlanBuilder,
) -> Option<&'a EntityDescriptor> {
    if ctx.entity.is_none() {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "{{{{{}}}}} requires an entity type on method '{}'",
                placeholder.name, ctx.method.name
            ),
        );
    }
    ctx.entity
}

fn require_entity_body<'a>(
    placeholder: &Placeholder,
    ctx: &RenderContext<'a>,
    out: &mut PlanBuilder,
) -> Option<&'a MethodParam> {
    let param = ctx.method.entity_body_param();
    if param.is_none() {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "{{{{{}}}}} requires an entity-body parameter on method '{}'",
                placeholder.name, ctx.method.name
            ),
        );
    }
    param
}

/// `{{columns}}`: comma-separated quoted column names.
///
/// Identifier quoting is always applied; `--quoted` is accepted as a no-op.
/// The first occurrence also fixes the result projection order.
pub(crate) fn columns(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(entity) = require_entity(p, ctx, out) else {
        return Ok(());
    };
    let cols = filter_columns(entity, &p.options)?;
    let alias = p.options.one("alias");

    let mut parts = Vec::with_capacity(cols.len());
    for col in &cols {
        let wrapped = ctx.dialect.wrap_column(&col.db_name)?;
        match alias {
            Some(a) => parts.push(format!("{a}.{wrapped}")),
            None => parts.push(wrapped),
        }
    }
    out.push(&parts.join(", "));

    if out.projection.is_none() {
        out.projection = Some(
            cols.iter()
                .enumerate()
                .map(|(index, col)| ProjectedColumn {
                    index,
                    field_name: col.field_name.clone(),
                    db_type: col.db_type.clone(),
                    is_nullable: col.is_nullable,
                })
                .collect(),
        );
    }
    Ok(())
}

/// `{{values}}`: parameter tokens aligned with `{{columns}}` under the same
/// filters, bound from the entity-body parameter's fields.
pub(crate) fn values(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(entity) = require_entity(p, ctx, out) else {
        return Ok(());
    };
    let Some(body) = require_entity_body(p, ctx, out) else {
        return Ok(());
    };
    let cols = filter_columns(entity, &p.options)?;

    let mut parts = Vec::with_capacity(cols.len());
    for col in cols {
        parts.push(ctx.dialect.param_token(&col.db_name));
        out.bind(ParameterBinding::new(
            col.db_name.clone(),
            BindingSource::EntityField {
                param: body.name.clone(),
                field: col.field_name.clone(),
            },
            Some(col.db_type.clone()),
        ));
    }
    out.push(&parts.join(", "));
    Ok(())
}

/// `{{set}}`: `col = token` assignments for non-key columns.
pub(crate) fn set(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(entity) = require_entity(p, ctx, out) else {
        return Ok(());
    };
    let Some(body) = require_entity_body(p, ctx, out) else {
        return Ok(());
    };
    let cols = filter_columns(entity, &p.options)?;

    let mut parts = Vec::new();
    for col in cols.into_iter().filter(|c| !c.is_key) {
        let wrapped = ctx.dialect.wrap_column(&col.db_name)?;
        let token = ctx.dialect.param_token(&col.db_name);
        parts.push(format!("{wrapped} = {token}"));
        out.bind(ParameterBinding::new(
            col.db_name.clone(),
            BindingSource::EntityField {
                param: body.name.clone(),
                field: col.field_name.clone(),
            },
            Some(col.db_type.clone()),
        ));
    }
    out.push(&parts.join(", "));
    Ok(())
}
