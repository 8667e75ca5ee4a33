//! Single-pass template scanner.
//!
//! Grammar (informal):
//!
//! ```text
//! TEMPLATE    := (LITERAL | PLACEHOLDER | CONDITIONAL)*
//! PLACEHOLDER := '{{' NAME (':' MODE)? (OPT)* (SHORTHAND)? '}}'
//! OPT         := '--' OPTNAME (OPTVAL)?
//! CONDITIONAL := '{{*' KIND TARGET '}}' TEMPLATE ('{{*else}}' TEMPLATE)? '{{/' KIND '}}'
//! ```
//!
//! `{{{` and `}}}` collapse to literal `{{` / `}}`. Placeholder, option and
//! conditional-kind names are ASCII case-insensitive; values preserve case.
//! Parsing is deterministic: identical input yields structurally identical
//! nodes.

use crate::error::{EngineError, EngineResult};
use crate::template::ast::{
    Conditional, ConditionalKind, OptValue, Placeholder, PlaceholderOptions, Template,
    TemplateNode,
};
use std::ops::Range;

/// Options that consume a following value token.
const VALUED_OPTIONS: &[&str] = &[
    "param", "exclude", "include", "regex", "alias", "schema", "table", "on",
];

/// Options whose value is a comma-separated list.
const LIST_OPTIONS: &[&str] = &["exclude", "include"];

pub(crate) fn parse_template(source: &str) -> EngineResult<Template> {
    if source.trim().is_empty() {
        return Err(EngineError::EmptyTemplate);
    }
    let mut pos = 0;
    let (nodes, terminator) = parse_nodes(source, &mut pos, None)?;
    match terminator {
        Terminator::Eof => Ok(Template::from_parts(nodes, source.to_string())),
        Terminator::Else => Err(EngineError::UnbalancedConditional {
            detail: "{{*else}} outside of a conditional block".to_string(),
        }),
        Terminator::Close(kind) => Err(EngineError::UnbalancedConditional {
            detail: format!("{{{{/{}}}}} without an opening block", kind.as_str()),
        }),
    }
}

enum Terminator {
    Eof,
    Else,
    Close(ConditionalKind),
}

fn flush_literal(nodes: &mut Vec<TemplateNode>, literal: &mut String) {
    if !literal.is_empty() {
        nodes.push(TemplateNode::Literal(std::mem::take(literal)));
    }
}

fn parse_nodes(
    source: &str,
    pos: &mut usize,
    enclosing: Option<ConditionalKind>,
) -> EngineResult<(Vec<TemplateNode>, Terminator)> {
    let mut nodes = Vec::new();
    let mut literal = String::new();

    while *pos < source.len() {
        let rest = &source[*pos..];

        if rest.starts_with("{{{") {
            literal.push_str("{{");
            *pos += 3;
        } else if rest.starts_with("}}}") {
            literal.push_str("}}");
            *pos += 3;
        } else if rest.starts_with("{{*") {
            flush_literal(&mut nodes, &mut literal);
            let start = *pos;
            let end = find_close(source, *pos)?;
            let content = source[*pos + 3..end].trim();
            *pos = end + 2;

            if content.eq_ignore_ascii_case("else") {
                if enclosing.is_none() {
                    return Err(EngineError::UnbalancedConditional {
                        detail: "{{*else}} outside of a conditional block".to_string(),
                    });
                }
                return Ok((nodes, Terminator::Else));
            }

            let mut parts = content.split_whitespace();
            let kind_name = parts.next().unwrap_or_default();
            let kind = ConditionalKind::parse(kind_name).ok_or_else(|| {
                EngineError::UnknownConditionalKind {
                    name: kind_name.to_string(),
                }
            })?;
            let target = parts
                .next()
                .ok_or_else(|| EngineError::UnbalancedConditional {
                    detail: format!(
                        "conditional '{{{{*{kind_name}}}}}' is missing a target parameter"
                    ),
                })?
                .to_string();

            let (inner, term) = parse_nodes(source, pos, Some(kind))?;
            let (inner, else_branch) = match term {
                Terminator::Close(close_kind) => {
                    check_close(kind, close_kind)?;
                    (inner, None)
                }
                Terminator::Else => {
                    let (else_nodes, term2) = parse_nodes(source, pos, Some(kind))?;
                    match term2 {
                        Terminator::Close(close_kind) => {
                            check_close(kind, close_kind)?;
                            (inner, Some(else_nodes))
                        }
                        Terminator::Else => {
                            return Err(EngineError::UnbalancedConditional {
                                detail: "duplicate {{*else}} in conditional block".to_string(),
                            });
                        }
                        Terminator::Eof => return Err(missing_close(kind)),
                    }
                }
                Terminator::Eof => return Err(missing_close(kind)),
            };

            nodes.push(TemplateNode::Conditional(Conditional {
                kind,
                target,
                inner,
                else_branch,
                span: start..*pos,
            }));
        } else if rest.starts_with("{{/") {
            flush_literal(&mut nodes, &mut literal);
            let end = find_close(source, *pos)?;
            let kind_name = source[*pos + 3..end].trim();
            let kind = ConditionalKind::parse(kind_name).ok_or_else(|| {
                EngineError::UnknownConditionalKind {
                    name: kind_name.to_string(),
                }
            })?;
            *pos = end + 2;
            if enclosing.is_none() {
                return Err(EngineError::UnbalancedConditional {
                    detail: format!("{{{{/{kind_name}}}}} without an opening block"),
                });
            }
            return Ok((nodes, Terminator::Close(kind)));
        } else if rest.starts_with("{{") {
            flush_literal(&mut nodes, &mut literal);
            let start = *pos;
            let end = find_close(source, *pos)?;
            let content = &source[*pos + 2..end];
            *pos = end + 2;
            nodes.push(TemplateNode::Placeholder(parse_placeholder(
                content,
                start..*pos,
            )?));
        } else {
            // Plain literal character.
            if let Some(ch) = rest.chars().next() {
                literal.push(ch);
                *pos += ch.len_utf8();
            }
        }
    }

    flush_literal(&mut nodes, &mut literal);
    // EOF inside a block is reported as a missing close by the caller.
    Ok((nodes, Terminator::Eof))
}

fn check_close(open: ConditionalKind, close: ConditionalKind) -> EngineResult<()> {
    if open != close {
        return Err(EngineError::UnbalancedConditional {
            detail: format!(
                "{{{{*{}}}}} closed by {{{{/{}}}}}",
                open.as_str(),
                close.as_str()
            ),
        });
    }
    Ok(())
}

fn missing_close(kind: ConditionalKind) -> EngineError {
    EngineError::UnbalancedConditional {
        detail: format!("missing {{{{/{}}}}}", kind.as_str()),
    }
}

/// Index of the `}}` closing the token opened at `open_pos`.
fn find_close(source: &str, open_pos: usize) -> EngineResult<usize> {
    source[open_pos + 2..]
        .find("}}")
        .map(|i| open_pos + 2 + i)
        .ok_or(EngineError::UnterminatedPlaceholder { offset: open_pos })
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_placeholder(content: &str, span: Range<usize>) -> EngineResult<Placeholder> {
    let mut tokens = content.split_whitespace().peekable();
    let head = tokens.next().ok_or_else(|| EngineError::UnknownPlaceholder {
        name: String::new(),
    })?;

    let (name_raw, mode) = match head.split_once(':') {
        Some((n, m)) => (n, Some(m.to_ascii_lowercase())),
        None => (head, None),
    };
    let name = name_raw.to_ascii_lowercase();
    if !is_ident(&name) {
        return Err(EngineError::UnknownPlaceholder { name });
    }

    let mut options = PlaceholderOptions::new();
    let mut shorthand: Option<String> = None;

    while let Some(token) = tokens.next() {
        if let Some(opt_name) = token.strip_prefix("--") {
            let opt_name = opt_name.to_ascii_lowercase();
            let takes_value = VALUED_OPTIONS.contains(&opt_name.as_str());
            let next_is_value = tokens.peek().is_some_and(|t| !t.starts_with("--"));
            if takes_value && next_is_value {
                if let Some(raw) = tokens.next() {
                    let value = if LIST_OPTIONS.contains(&opt_name.as_str()) {
                        OptValue::List(
                            raw.split(',')
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                                .collect(),
                        )
                    } else {
                        OptValue::One(raw.to_string())
                    };
                    options.insert(opt_name, value);
                }
            } else {
                options.insert(opt_name, OptValue::Flag);
            }
        } else if shorthand.is_none() {
            shorthand = Some(token.to_string());
        }
        // Additional bare tokens are ignored; the first shorthand wins.
    }

    Ok(Placeholder {
        name,
        mode,
        options,
        shorthand,
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Template {
        parse_template(src).unwrap()
    }

    #[test]
    fn literal_only() {
        let t = parse("SELECT 1");
        assert_eq!(t.nodes, vec![TemplateNode::Literal("SELECT 1".into())]);
    }

    #[test]
    fn empty_template_is_error() {
        assert!(matches!(parse_template(""), Err(EngineError::EmptyTemplate)));
        assert!(matches!(
            parse_template("   \t\n"),
            Err(EngineError::EmptyTemplate)
        ));
    }

    #[test]
    fn simple_placeholder() {
        let t = parse("SELECT {{columns}} FROM {{table}}");
        assert_eq!(t.nodes.len(), 4);
        match &t.nodes[1] {
            TemplateNode::Placeholder(p) => assert_eq!(p.name, "columns"),
            other => panic!("expected placeholder, got {other:?}"),
        }
    }

    #[test]
    fn placeholder_names_fold_case() {
        let t = parse("{{COLUMNS}}");
        match &t.nodes[0] {
            TemplateNode::Placeholder(p) => assert_eq!(p.name, "columns"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn placeholder_with_mode() {
        let t = parse("{{limit:tiny}}");
        match &t.nodes[0] {
            TemplateNode::Placeholder(p) => {
                assert_eq!(p.name, "limit");
                assert_eq!(p.mode.as_deref(), Some("tiny"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn placeholder_options() {
        let t = parse("{{columns --exclude id,created_at --alias u --quoted}}");
        match &t.nodes[0] {
            TemplateNode::Placeholder(p) => {
                assert_eq!(
                    p.options.list("exclude").unwrap(),
                    vec!["id", "created_at"]
                );
                assert_eq!(p.options.one("alias"), Some("u"));
                assert!(p.options.has("quoted"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shorthand_argument() {
        let t = parse("{{arg id}}");
        match &t.nodes[0] {
            TemplateNode::Placeholder(p) => {
                assert_eq!(p.name, "arg");
                assert_eq!(p.shorthand.as_deref(), Some("id"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_option_preserved_as_flag() {
        let t = parse("{{columns --frobnicate}}");
        match &t.nodes[0] {
            TemplateNode::Placeholder(p) => assert!(p.options.has("frobnicate")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn escaped_braces() {
        let t = parse("json: {{{\"a\": 1}}}");
        assert_eq!(
            t.nodes,
            vec![TemplateNode::Literal("json: {{\"a\": 1}}".into())]
        );
    }

    #[test]
    fn unterminated_placeholder() {
        assert!(matches!(
            parse_template("SELECT {{columns"),
            Err(EngineError::UnterminatedPlaceholder { offset: 7 })
        ));
    }

    #[test]
    fn conditional_block() {
        let t = parse("SELECT * FROM t {{*ifnotnull name}}WHERE name = @name{{/ifnotnull}}");
        match &t.nodes[1] {
            TemplateNode::Conditional(c) => {
                assert_eq!(c.kind, ConditionalKind::IfNotNull);
                assert_eq!(c.target, "name");
                assert_eq!(
                    c.inner,
                    vec![TemplateNode::Literal("WHERE name = @name".into())]
                );
                assert!(c.else_branch.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn conditional_with_else() {
        let t = parse("{{*ifnull flag}}A{{*else}}B{{/ifnull}}");
        match &t.nodes[0] {
            TemplateNode::Conditional(c) => {
                assert_eq!(c.inner, vec![TemplateNode::Literal("A".into())]);
                assert_eq!(
                    c.else_branch,
                    Some(vec![TemplateNode::Literal("B".into())])
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_conditionals() {
        let t = parse(
            "{{*ifnotnull a}}X{{*ifnotempty b}}Y{{/ifnotempty}}{{/ifnotnull}}",
        );
        match &t.nodes[0] {
            TemplateNode::Conditional(outer) => {
                assert_eq!(outer.inner.len(), 2);
                assert!(matches!(outer.inner[1], TemplateNode::Conditional(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unbalanced_conditional() {
        assert!(matches!(
            parse_template("{{*ifnotnull a}}X"),
            Err(EngineError::UnbalancedConditional { .. })
        ));
        assert!(matches!(
            parse_template("X{{/ifnotnull}}"),
            Err(EngineError::UnbalancedConditional { .. })
        ));
        assert!(matches!(
            parse_template("{{*ifnotnull a}}X{{/ifnull}}"),
            Err(EngineError::UnbalancedConditional { .. })
        ));
    }

    #[test]
    fn unknown_conditional_kind() {
        assert!(matches!(
            parse_template("{{*ifmaybe a}}X{{/ifmaybe}}"),
            Err(EngineError::UnknownConditionalKind { .. })
        ));
    }

    #[test]
    fn conditional_kinds_fold_case() {
        let t = parse("{{*IfNotNull a}}X{{/IFNOTNULL}}");
        match &t.nodes[0] {
            TemplateNode::Conditional(c) => assert_eq!(c.kind, ConditionalKind::IfNotNull),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reparse_is_deterministic() {
        let src = "SELECT {{columns --exclude id}} FROM {{table}} {{*ifnotnull n}}WHERE n = @n{{/ifnotnull}}";
        assert_eq!(parse(src), parse(src));
    }

    #[test]
    fn serialize_round_trip() {
        let sources = [
            "SELECT {{columns}} FROM {{table}} WHERE id = @id",
            "SELECT {{columns --exclude id,age --alias u}} FROM {{table --alias u}}",
            "{{*ifnotnull name}}WHERE name = @name{{*else}}WHERE 1=1{{/ifnotnull}}",
            "escaped {{{literal}}} text {{arg id}}",
            "{{limit:page}}",
        ];
        for src in sources {
            let first = parse(src);
            let second = parse(&first.to_template_string());
            assert_eq!(first, second, "round trip failed for {src:?}");
        }
    }
}
