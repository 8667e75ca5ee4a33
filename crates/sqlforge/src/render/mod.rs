//! Placeholder rendering: turns parsed template nodes into SQL fragments,
//! bindings and deferred runtime markers.
//!
//! Rendering appends into a [`PlanBuilder`], which accumulates the SQL
//! string, the deduplicated binding list, the deferred-marker table, the
//! warning diagnostics and the capacity hint while the planner walks the
//! template in order.

mod clauses;
mod columns;


pub(crate) use columns::filter_columns;

use crate::diagnostics::{Diagnostic, codes};
use crate::dialect::DialectProfile;
use crate::entity::EntityDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::method::MethodDescriptor;
use crate::plan::{
    BindingSource, CapacityHint, Deferred, ParameterBinding, ProjectedColumn,
};
use crate::template::{Conditional, Placeholder, TemplateNode};

/// Everything a placeholder may consult while rendering.
pub(crate) struct RenderContext<'a> {
    pub dialect: &'a DialectProfile,
    pub entity: Option<&'a EntityDescriptor>,
    pub method: &'a MethodDescriptor,
}

/// Mutable accumulation state for one method plan.
pub(crate) struct PlanBuilder {
    pub sql: String,
    pub bindings: Vec<ParameterBinding>,
    pub deferred: Vec<Deferred>,
    pub warnings: Vec<Diagnostic>,
    pub capacity: CapacityHint,
    /// Projection captured from the first `{{columns}}` occurrence.
    pub projection: Option<Vec<ProjectedColumn>>,
    next_cond_id: u32,
}

impl PlanBuilder {
    pub(crate) fn new() -> Self {
        Self {
            sql: String::new(),
            bindings: Vec::new(),
            deferred: Vec::new(),
            warnings: Vec::new(),
            capacity: CapacityHint::None,
            projection: None,
            next_cond_id: 0,
        }
    }

    pub(crate) fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Record a binding; duplicates by name are dropped (first wins).
    pub(crate) fn bind(&mut self, binding: ParameterBinding) {
        if !self.bindings.iter().any(|b| b.name == binding.name) {
            self.bindings.push(binding);
        }
    }

    pub(crate) fn warn(&mut self, code: &'static str, message: impl Into<String>) {
        self.warnings.push(Diagnostic::warning(code, message));
    }

    pub(crate) fn next_cond_id(&mut self) -> u32 {
        let id = self.next_cond_id;
        self.next_cond_id += 1;
        id
    }

    /// True when the SQL accumulated so far already opens a WHERE clause.
    pub(crate) fn has_where(&self) -> bool {
        crate::validate::contains_keyword(&self.sql, "where")
    }

    /// True when the SQL accumulated so far contains an ORDER BY.
    pub(crate) fn has_order_by(&self) -> bool {
        crate::validate::contains_keyword(&self.sql, "order")
    }
}

/// Render a node sequence into the builder.
pub(crate) fn render_nodes(
    nodes: &[TemplateNode],
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    for node in nodes {
        match node {
            TemplateNode::Literal(text) => push_literal(text, ctx, out),
            TemplateNode::Placeholder(p) => render_placeholder(p, ctx, out)?,
            TemplateNode::Conditional(c) => render_conditional(c, ctx, out)?,
        }
    }
    Ok(())
}

/// Render nodes into a detached fragment while bindings, markers and
/// warnings keep accumulating in the shared builder.
pub(crate) fn render_fragment(
    nodes: &[TemplateNode],
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<String> {
    let saved = std::mem::take(&mut out.sql);
    let result = render_nodes(nodes, ctx, out);
    let fragment = std::mem::replace(&mut out.sql, saved);
    result.map(|()| fragment)
}

fn render_placeholder(
    p: &Placeholder,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    match p.name.as_str() {
        "table" => clauses::table(p, ctx, out),
        "columns" => columns::columns(p, ctx, out),
        "values" => columns::values(p, ctx, out),
        "set" => columns::set(p, ctx, out),
        "where" => clauses::where_clause(p, ctx, out),
        "orderby" => clauses::order_by(p, ctx, out),
        "limit" | "top" => clauses::limit(p, ctx, out),
        "offset" => clauses::offset(p, ctx, out),
        "arg" => clauses::arg(p, ctx, out),
        "batch_values" => clauses::batch_values(p, ctx, out),
        "join" => clauses::join(p, ctx, out),
        "groupby" => clauses::group_by(p, ctx, out),
        "having" => clauses::having(p, ctx, out),
        "upsert" => {
            out.push(ctx.dialect.upsert_clause_head());
            Ok(())
        }
        "now" => {
            out.push(ctx.dialect.current_timestamp());
            Ok(())
        }
        "if" => {
            // Deprecated shorthand; kept only so old templates keep planning.
            out.warn(
                codes::DEPRECATED_PLACEHOLDER,
                "{{if}} is deprecated and renders nothing; use {{*ifnotnull ...}} blocks",
            );
            Ok(())
        }
        other => Err(EngineError::UnknownPlaceholder {
            name: other.to_string(),
        }),
    }
}

/// Conditionals over method parameters defer to a runtime marker carrying
/// the pre-rendered inner and else fragments.
fn render_conditional(
    c: &Conditional,
    ctx: &RenderContext<'_>,
    out: &mut PlanBuilder,
) -> EngineResult<()> {
    let Some(param) = ctx.method.param(&c.target) else {
        out.warn(
            codes::UNBINDABLE_PLACEHOLDER,
            format!(
                "conditional target '{}' is not a parameter of method '{}'",
                c.target, ctx.method.name
            ),
        );
        return Ok(());
    };

    let id = out.next_cond_id();
    let inner_sql = render_fragment(&c.inner, ctx, out)?;
    let else_sql = match &c.else_branch {
        Some(nodes) => Some(render_fragment(nodes, ctx, out)?),
        None => None,
    };

    let deferred = Deferred::Conditional {
        id,
        kind: c.kind,
        param: param.name.clone(),
        inner_sql,
        else_sql,
    };
    out.push(&deferred.marker());
    out.deferred.push(deferred);
    Ok(())
}

/// Append literal text, rewriting parameter tokens to the dialect prefix.
///
/// Tokens spelled with the canonical `@` prefix or with the dialect's own
/// prefix are recognized; a token naming a known method parameter is
/// rewritten to `dialect.param_prefix + name` and recorded as a binding.
/// Anything else passes through verbatim.
fn push_literal(text: &str, ctx: &RenderContext<'_>, out: &mut PlanBuilder) {
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };

        if c == '@' || c == ctx.dialect.param_prefix {
            let after = &rest[c.len_utf8()..];
            let len = ident_prefix_len(after);
            if len > 0 {
                let name = &after[..len];
                if let Some(param) = ctx.method.param(name) {
                    out.sql.push(ctx.dialect.param_prefix);
                    out.sql.push_str(&param.name);
                    out.bind(ParameterBinding::new(
                        param.name.clone(),
                        BindingSource::MethodParam(param.name.clone()),
                        Some(param.db_type.clone()),
                    ));
                    i += c.len_utf8() + len;
                    continue;
                }
            }
        }

        out.sql.push(c);
        i += c.len_utf8();
    }
}

/// Length of the leading `[A-Za-z_][A-Za-z0-9_]*` identifier, or 0.
fn ident_prefix_len(s: &str) -> usize {
    let mut len = 0;
    for (idx, ch) in s.char_indices() {
        let valid = if idx == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if !valid {
            break;
        }
        len = idx + ch.len_utf8();
    }
    len
}
