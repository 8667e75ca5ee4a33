//! Clause placeholders: table, where, ordering, pagination, args, batch
//! values and the minor clause helpers.

use crate::diagnostics::codes;
use crate::dialect::PaginationStyle;
use crate::error::{EngineError, EngineResult};
use crate::method::{MethodParam, ParamRole};
use crate::plan::{
    BatchColumn, BindingSource, CapacityHint, Deferred, ParameterBinding, WhereContext,
};
use crate::render::{PlanBuilder, RenderContext, filter_columns};
use crate::template::Placeholder;
use crate::types::DbType;

/// Fixed pagination modes for `{{limit:MODE}}`.
const LIMIT_MODES: &[(&str, usize)] = &[
    ("tiny", 5),
    ("small", 10),
    ("page", 20),
    ("medium", 50),
    ("large", 100),
];

/// `{{table}}`: the quoted table name, with optional `--schema` prefix and
/// `--alias` suffix.
pub(crate) fn table(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(entity) = ctx.entity else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "{{{{table}}}} requires an entity type on method '{}'",
                ctx.method.name
            ),
        );
        return Ok(());
    };

    if let Some(schema) = p.options.one("schema") {
        out.push(&ctx.dialect.wrap_column(schema)?);
        out.push(".");
    }
    out.push(&ctx.dialect.wrap_column(&entity.table_name)?);
    if let Some(alias) = p.options.one("alias") {
        out.push(" AS ");
        out.push(alias);
    }
    Ok(())
}

/// Resolve the predicate parameter for `{{where}}`: explicit `--param`
/// first, otherwise the method's sole predicate-expression parameter.
fn predicate_param<'a>(
    p: &Placeholder,
    ctx: &RenderContext<'a>,
    out: &mut PlanBuilder,
) -> EngineResult<Option<&'a MethodParam>> {
    if let Some(name) = p.options.one("param") {
        return match ctx.method.param(name) {
            Some(mp) if mp.role == ParamRole::PredicateExpression => Ok(Some(mp)),
            _ => {
                out.warn(
                    codes::UNBINDABLE_PLACEHOLDER,
                    format!(
                        "--param {name} does not name a predicate parameter of method '{}'",
                        ctx.method.name
                    ),
                );
                Ok(None)
            }
        };
    }

    let mut candidates = ctx.method.params_with_role(ParamRole::PredicateExpression);
    let first = candidates.next();
    if candidates.next().is_some() {
        return Err(EngineError::AmbiguousExpressionParameter {
            method: ctx.method.name.clone(),
        });
    }
    Ok(first)
}

/// `{{where}}`: a static soft-delete filter, a deferred predicate marker,
/// or nothing.
pub(crate) fn where_clause(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let soft = if p.options.has("soft") {
        ctx.entity.and_then(|entity| {
            entity
                .columns()
                .iter()
                .find(|c| c.db_type == DbType::Bool && c.field_name == "deleted")
                .map(|c| (c.db_name.clone(), false))
                .or_else(|| {
                    entity
                        .columns()
                        .iter()
                        .find(|c| c.db_type == DbType::Bool && c.field_name == "is_active")
                        .map(|c| (c.db_name.clone(), true))
                })
        })
    } else {
        None
    };

    let predicate = predicate_param(p, ctx, out)?;

    let mut wrote_where = false;
    if let Some((db_name, wanted)) = soft {
        out.push("WHERE ");
        out.push(&ctx.dialect.wrap_column(&db_name)?);
        out.push(" = ");
        out.push(ctx.dialect.bool_literal(wanted));
        wrote_where = true;
    }

    if let Some(param) = predicate {
        let context = if wrote_where || out.has_where() {
            WhereContext::AddAnd
        } else {
            WhereContext::AddWhere
        };
        if wrote_where {
            out.push(" ");
        }
        let deferred = Deferred::WhereExpr {
            param: param.name.clone(),
            context,
        };
        out.push(&deferred.marker());
        out.bind(ParameterBinding::new(
            param.name.clone(),
            BindingSource::MethodParam(param.name.clone()),
            None,
        ));
        out.deferred.push(deferred);
    }
    Ok(())
}

/// `{{orderby col}}` with optional `--desc`.
pub(crate) fn order_by(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(column) = p.shorthand.as_deref().or_else(|| p.options.one("param")) else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            "{{orderby}} requires a column argument",
        );
        return Ok(());
    };
    out.push("ORDER BY ");
    out.push(&ctx.dialect.wrap_column(column)?);
    if p.options.has("desc") {
        out.push(" DESC");
    }
    Ok(())
}

fn warn_offset_fetch_without_order_by(ctx: &RenderContext<'_>, out: &mut PlanBuilder) {
    if ctx.dialect.pagination_style == PaginationStyle::OffsetFetch && !out.has_order_by() {
        out.warn(
            codes::OFFSET_FETCH_WITHOUT_ORDER_BY,
            "OFFSET/FETCH pagination without ORDER BY has unspecified row order",
        );
    }
}

/// `{{limit}}` / `{{top}}` (aliases, identical SQL): a fixed mode, a direct
/// bound parameter, or a deferred marker for a nullable parameter.
pub(crate) fn limit(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    if let Some(mode) = &p.mode {
        let Some((_, n)) = LIMIT_MODES.iter().find(|(name, _)| *name == mode.as_str()) else {
            out.warn(
                codes::UNBINDABLE_PLACEHOLDER,
                format!("unknown limit mode ':{mode}'"),
            );
            return Ok(());
        };
        warn_offset_fetch_without_order_by(ctx, out);
        let has_order_by = out.has_order_by();
        out.push(&ctx.dialect.render_pagination(&n.to_string(), None, has_order_by));
        out.capacity = CapacityHint::ExplicitLimit(*n);
        return Ok(());
    }

    let requested = p.options.one("param").unwrap_or(&p.name);
    let param = ctx.method.param(requested).or_else(|| {
        // {{top}} also accepts a parameter named `limit`.
        if p.name == "top" {
            ctx.method.param("limit")
        } else {
            None
        }
    });
    let Some(param) = param else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "no parameter '{requested}' for {{{{{}}}}} on method '{}'",
                p.name, ctx.method.name
            ),
        );
        return Ok(());
    };

    if param.is_nullable {
        let deferred = Deferred::NullableLimit {
            param: param.name.clone(),
        };
        out.push(&deferred.marker());
        out.deferred.push(deferred);
    } else {
        warn_offset_fetch_without_order_by(ctx, out);
        let has_order_by = out.has_order_by();
        let token = ctx.dialect.param_token(&param.name);
        out.push(&ctx.dialect.render_pagination(&token, None, has_order_by));
    }
    out.bind(ParameterBinding::new(
        param.name.clone(),
        BindingSource::MethodParam(param.name.clone()),
        Some(param.db_type.clone()),
    ));
    out.capacity = CapacityHint::FromParam(param.name.clone());
    Ok(())
}

/// `{{offset}}`: symmetric to `{{limit}}`.
pub(crate) fn offset(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let requested = p.options.one("param").unwrap_or(&p.name);
    let Some(param) = ctx.method.param(requested) else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "no parameter '{requested}' for {{{{offset}}}} on method '{}'",
                ctx.method.name
            ),
        );
        return Ok(());
    };

    if param.is_nullable {
        let deferred = Deferred::NullableOffset {
            param: param.name.clone(),
        };
        out.push(&deferred.marker());
        out.deferred.push(deferred);
    } else {
        let token = ctx.dialect.param_token(&param.name);
        out.push(&ctx.dialect.render_offset(&token));
    }
    out.bind(ParameterBinding::new(
        param.name.clone(),
        BindingSource::MethodParam(param.name.clone()),
        Some(param.db_type.clone()),
    ));
    Ok(())
}

/// `{{arg NAME}}`: the dialect parameter token for a named method argument.
pub(crate) fn arg(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(name) = p.options.one("param").or(p.shorthand.as_deref()) else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            "{{arg}} requires a parameter name",
        );
        return Ok(());
    };
    let Some(param) = ctx.method.param(name) else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "no parameter '{name}' for {{{{arg}}}} on method '{}'",
                ctx.method.name
            ),
        );
        return Ok(());
    };

    out.push(&ctx.dialect.param_token(&param.name));
    out.bind(ParameterBinding::new(
        param.name.clone(),
        BindingSource::MethodParam(param.name.clone()),
        Some(param.db_type.clone()),
    ));
    Ok(())
}

/// `{{batch_values}}`: always deferred; the marker carries the filtered
/// column projection the runtime expands per item.
pub(crate) fn batch_values(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(entity) = ctx.entity else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "{{{{batch_values}}}} requires an entity type on method '{}'",
                ctx.method.name
            ),
        );
        return Ok(());
    };
    let Some(param) = ctx.method.entity_collection_param() else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "{{{{batch_values}}}} requires an entity-collection parameter on method '{}'",
                ctx.method.name
            ),
        );
        return Ok(());
    };

    let columns = filter_columns(entity, &p.options)?
        .into_iter()
        .map(|c| BatchColumn {
            db_name: c.db_name.clone(),
            field_name: c.field_name.clone(),
            db_type: c.db_type.clone(),
        })
        .collect();

    let deferred = Deferred::BatchValues {
        param: param.name.clone(),
        columns,
    };
    out.push(&deferred.marker());
    out.bind(ParameterBinding::new(
        param.name.clone(),
        BindingSource::MethodParam(param.name.clone()),
        None,
    ));
    out.deferred.push(deferred);
    Ok(())
}

/// `{{join --table t --on cond}}`; renders nothing without options.
pub(crate) fn join(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(table) = p.options.one("table") else {
        return Ok(());
    };
    out.push("JOIN ");
    out.push(&ctx.dialect.wrap_column(table)?);
    if let Some(alias) = p.options.one("alias") {
        out.push(" AS ");
        out.push(alias);
    }
    if let Some(cond) = p.options.one("on") {
        out.push(" ON ");
        out.push(cond);
    }
    Ok(())
}

/// `{{groupby col[,col]}}`; renders nothing without a column list.
pub(crate) fn group_by(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(raw) = p.shorthand.as_deref() else {
        return Ok(());
    };
    let mut parts = Vec::new();
    for column in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(ctx.dialect.wrap_column(column)?);
    }
    if parts.is_empty() {
        return Ok(());
    }
    out.push("GROUP BY ");
    out.push(&parts.join(", "));
    Ok(())
}

/// `{{having cond}}`; renders nothing without a condition.
pub(crate) fn having(
    p: &Placeholder,
    _ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(cond) = p.shorthand.as_deref() else {
        return Ok(());
    };
    out.push("HAVING ");
    out.push(cond);
    Ok(())
}
