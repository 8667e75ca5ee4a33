//! Deferred-marker resolution.
//!
//! Takes an [`ExecutionPlan`] and the actual call arguments and replaces
//! every `{{RUNTIME_…}}` marker before the SQL reaches a driver. The
//! renderer is a pure function over its inputs: the plan is read-only and
//! only the emitted string and binding list are allocated, so concurrent
//! calls over the same plan are safe.
//!
//! Rendering yields a *list* of commands: normally one, zero for an empty
//! batch (the caller executes nothing and reports 0 affected rows), and
//! several when a batch exceeds the plan's `batch_max_size` (the driver
//! executes them in a loop and sums the affected counts).

use crate::args::{ArgValues, RuntimeValue};
use crate::error::{RenderError, RenderResult};
use sqlforge::{
    BindingSource, ConditionalKind, Deferred, DialectProfile, ExecutionPlan, ParamNames,
    ScalarValue, WhereContext, translate,
};

/// A generated binding: name plus the value to send to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeBinding {
    pub name: String,
    pub value: ScalarValue,
}

/// One driver-ready command: final SQL plus the generated bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCommand {
    pub sql: String,
    pub bindings: Vec<RuntimeBinding>,
}

/// Resolve every runtime marker in a plan against the call arguments.
pub fn render(
    plan: &ExecutionPlan,
    dialect: &DialectProfile,
    args: &ArgValues,
) -> RenderResult<Vec<RenderedCommand>> {
    let batch_markers = plan
        .deferred
        .iter()
        .filter(|d| matches!(d, Deferred::BatchValues { .. }))
        .count();
    if batch_markers > 1 {
        return Err(RenderError::Unsupported(
            "a plan may carry at most one batch-values marker".to_string(),
        ));
    }

    let mut names = ParamNames::with_reserved(plan.bindings.iter().map(|b| b.name.clone()));
    let mut bindings = Vec::new();
    let resolved = resolve_text(&plan.sql, plan, dialect, args, &mut names, &mut bindings)?;

    let batch = plan
        .deferred
        .iter()
        .find(|d| matches!(d, Deferred::BatchValues { .. }));
    let Some(deferred @ Deferred::BatchValues { param, columns }) = batch else {
        return Ok(vec![RenderedCommand {
            sql: resolved,
            bindings,
        }]);
    };

    let rows: &[Vec<ScalarValue>] = match args.get(param) {
        None => {
            return Err(RenderError::MissingArgument {
                name: param.clone(),
            });
        }
        Some(RuntimeValue::Null) => &[],
        Some(RuntimeValue::Batch(rows)) => rows.as_slice(),
        Some(_) => {
            return Err(RenderError::TypeMismatch {
                name: param.clone(),
                expected: "batch",
            });
        }
    };

    // An empty batch executes nothing.
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(RenderError::BatchArityMismatch {
                expected: columns.len(),
                got: row.len(),
                row: index,
            });
        }
    }

    let chunk_size = plan.batch_max_size.unwrap_or(rows.len()).max(1);
    let marker = deferred.marker();
    let mut commands = Vec::with_capacity(rows.len().div_ceil(chunk_size));

    for chunk in rows.chunks(chunk_size) {
        let mut tuples = String::new();
        let mut chunk_bindings = bindings.clone();
        for (i, row) in chunk.iter().enumerate() {
            if i > 0 {
                tuples.push_str(", ");
            }
            tuples.push('(');
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    tuples.push_str(", ");
                }
                let name = format!("p_{i}_{j}");
                tuples.push_str(&dialect.param_token(&name));
                chunk_bindings.push(RuntimeBinding {
                    name,
                    value: value.clone(),
                });
            }
            tuples.push(')');
        }
        commands.push(RenderedCommand {
            sql: resolved.replace(&marker, &tuples),
            bindings: chunk_bindings,
        });
    }

    if commands.len() > 1 {
        tracing::debug!(
            target: "sqlforge_runtime",
            method = %plan.method,
            rows = rows.len(),
            chunks = commands.len(),
            "batch split into chunks"
        );
    }

    Ok(commands)
}

fn resolve_text(
    text: &str,
    plan: &ExecutionPlan,
    dialect: &DialectProfile,
    args: &ArgValues,
    names: &mut ParamNames,
    bindings: &mut Vec<RuntimeBinding>,
) -> RenderResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    loop {
        let Some(rel) = text[pos..].find("{{") else { break };
        let start = pos + rel;
        out.push_str(&text[pos..start]);
        pos = start;

        let Some(end_rel) = text[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + end_rel + 2;
        let token = &text[start..end];

        if !token.starts_with("{{RUNTIME_") {
            // Literal braces that survived planning pass through verbatim.
            out.push_str("{{");
            pos = start + 2;
            continue;
        }

        let Some(deferred) = plan.deferred_for(token) else {
            return Err(RenderError::UnknownMarker {
                marker: token.to_string(),
            });
        };

        match deferred {
            Deferred::BatchValues { .. } => {
                // Expanded per chunk by the caller.
                out.push_str(token);
            }
            Deferred::NullableLimit { param } => {
                if let Some(value) = scalar_or_none(args, param)? {
                    bindings.push(RuntimeBinding {
                        name: param.clone(),
                        value,
                    });
                    out.push_str(&dialect.render_pagination(
                        &dialect.param_token(param),
                        None,
                        true,
                    ));
                }
            }
            Deferred::NullableOffset { param } => {
                if let Some(value) = scalar_or_none(args, param)? {
                    bindings.push(RuntimeBinding {
                        name: param.clone(),
                        value,
                    });
                    out.push_str(&dialect.render_offset(&dialect.param_token(param)));
                }
            }
            Deferred::WhereExpr { param, context } => {
                resolve_where(param, *context, dialect, args, names, bindings, &mut out)?;
            }
            Deferred::Conditional {
                kind,
                param,
                inner_sql,
                else_sql,
                ..
            } => {
                let chosen = if condition_holds(*kind, args.get(param)) {
                    Some(inner_sql.as_str())
                } else {
                    else_sql.as_deref()
                };
                if let Some(fragment) = chosen {
                    let resolved =
                        resolve_text(fragment, plan, dialect, args, names, bindings)?;
                    out.push_str(&resolved);
                }
            }
        }
        pos = end;
    }

    out.push_str(&text[pos..]);
    Ok(out)
}

/// A nullable scalar argument: `Ok(None)` for absent/NULL, the value
/// otherwise. Non-scalar shapes are a type mismatch.
fn scalar_or_none(args: &ArgValues, param: &str) -> RenderResult<Option<ScalarValue>> {
    match args.get(param) {
        None | Some(RuntimeValue::Null) | Some(RuntimeValue::Scalar(ScalarValue::Null)) => {
            Ok(None)
        }
        Some(RuntimeValue::Scalar(v)) => Ok(Some(v.clone())),
        Some(_) => Err(RenderError::TypeMismatch {
            name: param.to_string(),
            expected: "scalar",
        }),
    }
}

fn resolve_where(
    param: &str,
    context: WhereContext,
    dialect: &DialectProfile,
    args: &ArgValues,
    names: &mut ParamNames,
    bindings: &mut Vec<RuntimeBinding>,
    out: &mut String,
) -> RenderResult<()> {
    let predicate = match args.get(param) {
        None | Some(RuntimeValue::Null) => return Ok(()),
        Some(RuntimeValue::Predicate(p)) => p,
        Some(_) => {
            return Err(RenderError::TypeMismatch {
                name: param.to_string(),
                expected: "predicate",
            });
        }
    };

    let condition = translate(predicate, dialect, names)?;
    if condition.sql.is_empty() {
        return Ok(());
    }

    out.push_str(match context {
        WhereContext::AddWhere => "WHERE ",
        WhereContext::AddAnd => "AND ",
    });
    out.push_str(&condition.sql);

    for binding in condition.bindings {
        let value = match binding.source {
            BindingSource::Literal(v) => v,
            BindingSource::MethodParam(name) => match args.get(&name) {
                Some(RuntimeValue::Scalar(v)) => v.clone(),
                Some(RuntimeValue::Null) => ScalarValue::Null,
                None => return Err(RenderError::MissingArgument { name }),
                Some(_) => {
                    return Err(RenderError::TypeMismatch {
                        name,
                        expected: "scalar",
                    });
                }
            },
            _ => continue,
        };
        if !bindings.iter().any(|b| b.name == binding.name) {
            bindings.push(RuntimeBinding {
                name: binding.name,
                value,
            });
        }
    }
    Ok(())
}

fn condition_holds(kind: ConditionalKind, value: Option<&RuntimeValue>) -> bool {
    let nullish = value.is_none_or(RuntimeValue::is_null);
    let empty = value.is_none_or(RuntimeValue::is_empty_like);
    match kind {
        ConditionalKind::IfNotNull => !nullish,
        ConditionalKind::IfNull => nullish,
        ConditionalKind::IfNotEmpty => !empty,
        ConditionalKind::IfEmpty => empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlforge::{
        DbType, EntityDescriptor, FieldDef, MethodDescriptor, MethodFlags, MethodParam,
        PredicateExpr, ReturnShape, plan_method,
    };

    fn user() -> EntityDescriptor {
        EntityDescriptor::builder("User")
            .table("users")
            .field(FieldDef::new("id", "i64").key())
            .field(FieldDef::new("name", "String"))
            .field(FieldDef::new("email", "String"))
            .field(FieldDef::new("age", "i32"))
            .build()
            .unwrap()
    }

    fn one(commands: Vec<RenderedCommand>) -> RenderedCommand {
        assert_eq!(commands.len(), 1);
        commands.into_iter().next().unwrap()
    }

    #[test]
    fn static_plan_passes_through() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "GetById",
            "SELECT {{columns}} FROM {{table}} WHERE id = @id",
        )
        .with_param(MethodParam::scalar("id", "i64"))
        .returning(ReturnShape::OptionalEntity("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(render(&plan, &dialect, &ArgValues::new()).unwrap());
        assert_eq!(command.sql, plan.sql);
        assert!(command.bindings.is_empty());
    }

    #[test]
    fn nullable_limit_present_and_absent() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "Page",
            "SELECT {{columns}} FROM {{table}} ORDER BY id {{limit}}",
        )
        .with_param(MethodParam::scalar("limit", "Option<i32>"))
        .returning(ReturnShape::Collection("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(
            render(&plan, &dialect, &ArgValues::new().scalar("limit", 10i32)).unwrap(),
        );
        assert_eq!(
            command.sql,
            "SELECT [id], [name], [email], [age] FROM [users] ORDER BY id LIMIT @limit"
        );
        assert_eq!(
            command.bindings,
            vec![RuntimeBinding {
                name: "limit".into(),
                value: ScalarValue::Int32(10)
            }]
        );

        let command = one(render(&plan, &dialect, &ArgValues::new().null("limit")).unwrap());
        assert_eq!(
            command.sql,
            "SELECT [id], [name], [email], [age] FROM [users] ORDER BY id "
        );
        assert!(command.bindings.is_empty());
    }

    #[test]
    fn where_expr_renders_where_keyword() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new("Find", "SELECT {{columns}} FROM {{table}} {{where}}")
            .with_param(MethodParam::predicate("filter"))
            .returning(ReturnShape::Collection("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let filter = PredicateExpr::and(vec![
            PredicateExpr::eq("status", "active"),
            PredicateExpr::gt("age", 18i32),
        ]);
        let command = one(
            render(&plan, &dialect, &ArgValues::new().set("filter", filter)).unwrap(),
        );
        assert_eq!(
            command.sql,
            "SELECT [id], [name], [email], [age] FROM [users] WHERE [status] = @p0 AND [age] > @p1"
        );
        assert_eq!(command.bindings.len(), 2);
        assert_eq!(command.bindings[0].value, ScalarValue::Text("active".into()));

        // Absent predicate renders nothing.
        let command = one(render(&plan, &dialect, &ArgValues::new()).unwrap());
        assert!(!command.sql.contains("WHERE"));
    }

    #[test]
    fn where_expr_extends_existing_where_with_and() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "Find",
            "SELECT {{columns}} FROM {{table}} WHERE age > @min {{where}}",
        )
        .with_param(MethodParam::scalar("min", "i32"))
        .with_param(MethodParam::predicate("filter"))
        .returning(ReturnShape::Collection("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(
            render(
                &plan,
                &dialect,
                &ArgValues::new().set("filter", PredicateExpr::eq("name", "bob")),
            )
            .unwrap(),
        );
        assert!(command.sql.ends_with("WHERE age > @min AND [name] = @p0"));
    }

    #[test]
    fn where_expr_param_reference_resolves_from_args() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new("Find", "SELECT {{columns}} FROM {{table}} {{where}}")
            .with_param(MethodParam::scalar("min_age", "i32"))
            .with_param(MethodParam::predicate("filter"))
            .returning(ReturnShape::Collection("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let filter = PredicateExpr::gt("age", sqlforge::PredicateValue::param("min_age"));
        let command = one(
            render(
                &plan,
                &dialect,
                &ArgValues::new()
                    .scalar("min_age", 21i32)
                    .set("filter", filter.clone()),
            )
            .unwrap(),
        );
        assert!(command.sql.ends_with("WHERE [age] > @min_age"));
        assert_eq!(
            command.bindings,
            vec![RuntimeBinding {
                name: "min_age".into(),
                value: ScalarValue::Int32(21)
            }]
        );

        let err = render(
            &plan,
            &dialect,
            &ArgValues::new().set("filter", filter),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::MissingArgument { .. }));
    }

    #[test]
    fn batch_values_expand_with_generated_names() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "InsertMany",
            "INSERT INTO {{table}} ({{columns --exclude id}}) VALUES {{batch_values --exclude id}}",
        )
        .with_param(MethodParam::collection("items", "User"))
        .returning(ReturnShape::AffectedRows);
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let rows = vec![
            vec![
                ScalarValue::Text("ann".into()),
                ScalarValue::Text("ann@x".into()),
                ScalarValue::Int32(30),
            ],
            vec![
                ScalarValue::Text("bob".into()),
                ScalarValue::Text("bob@x".into()),
                ScalarValue::Int32(41),
            ],
        ];
        let command = one(
            render(&plan, &dialect, &ArgValues::new().set("items", rows)).unwrap(),
        );
        assert_eq!(
            command.sql,
            "INSERT INTO [users] ([name], [email], [age]) VALUES (@p_0_0, @p_0_1, @p_0_2), (@p_1_0, @p_1_1, @p_1_2)"
        );
        assert_eq!(command.bindings.len(), 6);
        assert_eq!(command.bindings[0].name, "p_0_0");
        assert_eq!(command.bindings[5].value, ScalarValue::Int32(41));
    }

    #[test]
    fn empty_batch_executes_nothing() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "InsertMany",
            "INSERT INTO {{table}} ({{columns --exclude id}}) VALUES {{batch_values --exclude id}}",
        )
        .with_param(MethodParam::collection("items", "User"))
        .returning(ReturnShape::AffectedRows);
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let commands = render(
            &plan,
            &dialect,
            &ArgValues::new().set("items", Vec::<Vec<ScalarValue>>::new()),
        )
        .unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn batch_arity_mismatch_is_error() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "InsertMany",
            "INSERT INTO {{table}} ({{columns --exclude id}}) VALUES {{batch_values --exclude id}}",
        )
        .with_param(MethodParam::collection("items", "User"))
        .returning(ReturnShape::AffectedRows);
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let rows = vec![vec![ScalarValue::Text("ann".into())]];
        let err = render(&plan, &dialect, &ArgValues::new().set("items", rows)).unwrap_err();
        assert!(matches!(
            err,
            RenderError::BatchArityMismatch {
                expected: 3,
                got: 1,
                row: 0
            }
        ));
    }

    #[test]
    fn oversized_batch_chunks() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "InsertMany",
            "INSERT INTO {{table}} ({{columns --exclude id}}) VALUES {{batch_values --exclude id}}",
        )
        .with_param(MethodParam::collection("items", "User"))
        .returning(ReturnShape::AffectedRows)
        .with_flags(MethodFlags {
            batch_max_size: Some(2),
            ..MethodFlags::default()
        });
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let row = |name: &str| {
            vec![
                ScalarValue::Text(name.into()),
                ScalarValue::Text(format!("{name}@x")),
                ScalarValue::Int32(20),
            ]
        };
        let rows = vec![row("a"), row("b"), row("c"), row("d"), row("e")];
        let commands = render(&plan, &dialect, &ArgValues::new().set("items", rows)).unwrap();
        assert_eq!(commands.len(), 3);
        // Tuple indices restart per chunk so every command is self-contained.
        assert!(commands[2].sql.contains("(@p_0_0, @p_0_1, @p_0_2)"));
        assert_eq!(commands[0].bindings.len(), 6);
        assert_eq!(commands[2].bindings.len(), 3);
        assert_eq!(
            commands[2].bindings[0].value,
            ScalarValue::Text("e".into())
        );
    }

    #[test]
    fn conditional_chooses_branch() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "Find",
            "SELECT {{columns}} FROM {{table}} {{*ifnotnull name}}WHERE name = @name{{*else}}WHERE 1=1{{/ifnotnull}}",
        )
        .with_param(MethodParam::scalar("name", "Option<String>"))
        .returning(ReturnShape::Collection("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(
            render(&plan, &dialect, &ArgValues::new().scalar("name", "ann")).unwrap(),
        );
        assert!(command.sql.ends_with("WHERE name = @name"));

        let command = one(render(&plan, &dialect, &ArgValues::new().null("name")).unwrap());
        assert!(command.sql.ends_with("WHERE 1=1"));
    }

    #[test]
    fn empty_string_counts_as_empty() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "Find",
            "SELECT 1 FROM {{table}} {{*ifnotempty name}}WHERE name = @name{{/ifnotempty}}",
        )
        .with_param(MethodParam::scalar("name", "Option<String>"))
        .returning(ReturnShape::Scalar(DbType::Int64));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(
            render(&plan, &dialect, &ArgValues::new().scalar("name", "")).unwrap(),
        );
        assert!(!command.sql.contains("WHERE"));

        let command = one(
            render(&plan, &dialect, &ArgValues::new().scalar("name", "x")).unwrap(),
        );
        assert!(command.sql.contains("WHERE name = @name"));
    }

    #[test]
    fn nested_conditionals_resolve_recursively() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "Find",
            "SELECT 1 {{*ifnotnull a}}/*A*/{{*ifnotnull b}}/*B*/{{/ifnotnull}}{{/ifnotnull}}",
        )
        .with_param(MethodParam::scalar("a", "Option<i32>"))
        .with_param(MethodParam::scalar("b", "Option<i32>"))
        .returning(ReturnShape::Scalar(DbType::Int64));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(
            render(
                &plan,
                &dialect,
                &ArgValues::new().scalar("a", 1i32).scalar("b", 2i32),
            )
            .unwrap(),
        );
        assert!(command.sql.contains("/*A*/"));
        assert!(command.sql.contains("/*B*/"));

        let command = one(
            render(&plan, &dialect, &ArgValues::new().scalar("a", 1i32)).unwrap(),
        );
        assert!(command.sql.contains("/*A*/"));
        assert!(!command.sql.contains("/*B*/"));
    }

    #[test]
    fn generated_predicate_names_avoid_plan_bindings() {
        let entity = user();
        let dialect = DialectProfile::sqlite();
        let method = MethodDescriptor::new(
            "Find",
            "SELECT {{columns}} FROM {{table}} WHERE id = @p0 {{where}}",
        )
        .with_param(MethodParam::scalar("p0", "i64"))
        .with_param(MethodParam::predicate("filter"))
        .returning(ReturnShape::Collection("User".into()));
        let plan = plan_method(&method, Some(&entity), &dialect).unwrap().plan;

        let command = one(
            render(
                &plan,
                &dialect,
                &ArgValues::new().set("filter", PredicateExpr::eq("age", 5i32)),
            )
            .unwrap(),
        );
        // The literal's generated name skips the already-bound `p0`.
        assert!(command.sql.ends_with("AND [age] = @p1"));
    }
}
