//! Method planning: from descriptors and a template to an [`ExecutionPlan`].
//!
//! Planning is a pure function of its inputs: two runs over identical
//! descriptors produce byte-identical SQL and identical binding order.
//! Hard errors abort only the offending method; [`plan_repository`] keeps
//! planning the remaining methods and streams every diagnostic to the sink.


use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::dialect::{DialectProfile, InsertIdStrategy};
use crate::entity::EntityDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::method::{MethodDescriptor, ParamRole, ReturnShape};
use crate::plan::{
    ExecutionPlan, PlanEmitter, PostAction, ProjectedColumn, ResultShape, StatementKind,
    find_entity,
};
use crate::render::{PlanBuilder, RenderContext, render_nodes};
use crate::template::Template;
use crate::types::DbType;
use crate::validate;
use std::collections::HashSet;

/// A successfully planned method: the plan plus its warning diagnostics.
#[derive(Debug, Clone)]
pub struct PlannedMethod {
    pub plan: ExecutionPlan,
    pub warnings: Vec<Diagnostic>,
}

/// Plan a single method against an optional entity descriptor and a dialect.
pub fn plan_method(
    method: &MethodDescriptor,
    entity: Option<&EntityDescriptor>,
    dialect: &DialectProfile,
) -> EngineResult<PlannedMethod> {
    let profile = method
        .flags
        .dialect_override
        .map(DialectProfile::for_kind)
        .unwrap_or(*dialect);

    check_parameter_surface(method)?;

    let template = Template::parse(&method.sql_template)?;
    validate::check_structure(&template)?;
    let mut warnings = validate::advisory_diagnostics(&template);

    let ctx = RenderContext {
        dialect: &profile,
        entity,
        method,
    };
    let mut builder = PlanBuilder::new();
    render_nodes(&template.nodes, &ctx, &mut builder)?;

    let statement_kind = StatementKind::detect(&builder.sql);
    let result = resolve_result_shape(method, entity, &builder)?;
    let post = resolve_post(method, &profile, statement_kind)?;

    warnings.append(&mut builder.warnings);
    dedupe_diagnostics(&mut warnings);

    let plan = ExecutionPlan {
        method: method.name.clone(),
        dialect: profile.kind,
        sql: builder.sql,
        bindings: builder.bindings,
        deferred: builder.deferred,
        result,
        post,
        capacity_hint: builder.capacity,
        statement_kind,
        batch_max_size: method.flags.batch_max_size,
    };

    tracing::debug!(
        target: "sqlforge::planner",
        method = %method.name,
        dialect = ?profile.kind,
        bindings = plan.bindings.len(),
        deferred = plan.deferred.len(),
        "planned method"
    );

    Ok(PlannedMethod { plan, warnings })
}

/// Plan every method of a repository surface, emitting surviving plans and
/// streaming all diagnostics. Returns the number of emitted plans.
pub fn plan_repository(
    methods: &[MethodDescriptor],
    entities: &[EntityDescriptor],
    dialect: &DialectProfile,
    emitter: &mut dyn PlanEmitter,
    sink: &mut dyn DiagnosticSink,
) -> usize {
    let mut seen = HashSet::new();
    let mut emitted = 0;

    for method in methods {
        if !seen.insert(method.name.to_ascii_lowercase()) {
            sink.report(
                EngineError::DuplicateVariable {
                    surface: "repository".to_string(),
                    name: method.name.clone(),
                }
                .to_diagnostic(),
            );
            continue;
        }

        let entity = method_entity(method, entities);
        let effective = method
            .flags
            .dialect_override
            .map(DialectProfile::for_kind)
            .unwrap_or(*dialect);
        match plan_method(method, entity, dialect) {
            Ok(PlannedMethod { plan, warnings }) => {
                for warning in warnings {
                    sink.report(warning);
                }
                match emitter.emit(&plan, method, &effective) {
                    Ok(()) => emitted += 1,
                    Err(err) => sink.report(err.to_diagnostic()),
                }
            }
            Err(err) => sink.report(err.to_diagnostic()),
        }
    }

    emitted
}

/// The entity descriptor a method operates on, resolved from its return
/// shape or its entity-valued parameters.
fn method_entity<'a>(
    method: &MethodDescriptor,
    entities: &'a [EntityDescriptor],
) -> Option<&'a EntityDescriptor> {
    let type_name = method.return_shape.entity_type().or_else(|| {
        method
            .entity_body_param()
            .or_else(|| method.entity_collection_param())
            .and_then(|p| match &p.db_type {
                DbType::Custom(name) => Some(name.as_str()),
                _ => None,
            })
    })?;
    find_entity(entities, type_name)
}

fn check_parameter_surface(method: &MethodDescriptor) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for param in &method.parameters {
        if !seen.insert(param.name.to_ascii_lowercase()) {
            return Err(EngineError::DuplicateVariable {
                surface: method.name.clone(),
                name: param.name.clone(),
            });
        }
    }

    let bodies = method.params_with_role(ParamRole::EntityBody).count();
    if bodies > 1 {
        return Err(EngineError::InvalidParameterShape {
            method: method.name.clone(),
            detail: format!("{bodies} entity-body parameters, at most one allowed"),
        });
    }
    let collections = method.params_with_role(ParamRole::EntityCollection).count();
    if collections > 1 {
        return Err(EngineError::InvalidParameterShape {
            method: method.name.clone(),
            detail: format!("{collections} entity-collection parameters, at most one allowed"),
        });
    }
    Ok(())
}

fn full_projection(entity: &EntityDescriptor) -> Vec<ProjectedColumn> {
    entity
        .columns()
        .iter()
        .enumerate()
        .map(|(index, col)| ProjectedColumn {
            index,
            field_name: col.field_name.clone(),
            db_type: col.db_type.clone(),
            is_nullable: col.is_nullable,
        })
        .collect()
}

fn resolve_result_shape(
    method: &MethodDescriptor,
    entity: Option<&EntityDescriptor>,
    builder: &PlanBuilder,
) -> EngineResult<ResultShape> {
    let projection_for = |entity: Option<&EntityDescriptor>| -> EngineResult<Vec<ProjectedColumn>> {
        if let Some(projection) = &builder.projection {
            return Ok(projection.clone());
        }
        let entity = entity.ok_or_else(|| EngineError::InvalidReturnType {
            method: method.name.clone(),
            detail: "entity return shape without an entity descriptor".to_string(),
        })?;
        Ok(full_projection(entity))
    };

    Ok(match &method.return_shape {
        ReturnShape::Unit => ResultShape::Unit,
        ReturnShape::Scalar(t) => ResultShape::Scalar(t.clone()),
        ReturnShape::AffectedRows => ResultShape::AffectedRows,
        ReturnShape::GeneratedId(t) => ResultShape::GeneratedId(t.clone()),
        ReturnShape::Entity(name) => ResultShape::Entity {
            entity: name.clone(),
            projection: projection_for(entity)?,
        },
        ReturnShape::OptionalEntity(name) => ResultShape::OptionalEntity {
            entity: name.clone(),
            projection: projection_for(entity)?,
        },
        ReturnShape::Collection(name) => ResultShape::Collection {
            entity: name.clone(),
            projection: projection_for(entity)?,
        },
    })
}

fn resolve_post(
    method: &MethodDescriptor,
    dialect: &DialectProfile,
    statement_kind: StatementKind,
) -> EngineResult<PostAction> {
    Ok(match &method.return_shape {
        ReturnShape::GeneratedId(_) => {
            if statement_kind != StatementKind::Insert {
                return Err(EngineError::InvalidReturnType {
                    method: method.name.clone(),
                    detail: "generated-id return requires an INSERT statement".to_string(),
                });
            }
            if dialect.insert_id_strategy == InsertIdStrategy::OutputInserted {
                PostAction::ReturnOutputValue
            } else {
                PostAction::ReturnLastInsertId(dialect.insert_id_strategy)
            }
        }
        ReturnShape::AffectedRows => PostAction::ReturnAffectedRows,
        _ => PostAction::None,
    })
}

fn dedupe_diagnostics(diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    diagnostics.retain(|d| seen.insert((d.code, d.message.clone())));
}
