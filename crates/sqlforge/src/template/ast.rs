//! Template AST: literal text, placeholders and conditional blocks.
//!
//! Node equality ignores source spans, so two parses of equivalent template
//! text (e.g. the original and its re-serialized form) compare equal.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Kind of a `{{*...}}` conditional block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalKind {
    IfNotNull,
    IfNull,
    IfNotEmpty,
    IfEmpty,
}

impl ConditionalKind {
    /// Parse a conditional kind name (ASCII case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ifnotnull" => Some(Self::IfNotNull),
            "ifnull" => Some(Self::IfNull),
            "ifnotempty" => Some(Self::IfNotEmpty),
            "ifempty" => Some(Self::IfEmpty),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IfNotNull => "ifnotnull",
            Self::IfNull => "ifnull",
            Self::IfNotEmpty => "ifnotempty",
            Self::IfEmpty => "ifempty",
        }
    }
}

/// Value of a placeholder option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptValue {
    /// Option with no value, e.g. `--desc`.
    Flag,
    /// Single-token value, e.g. `--param id`.
    One(String),
    /// Comma-separated list, e.g. `--exclude id,created_at`.
    List(Vec<String>),
}

/// Ordered option map of a placeholder.
///
/// Option names are stored lowercased; insertion order is preserved so
/// re-serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderOptions {
    entries: Vec<(String, OptValue)>,
}

impl PlaceholderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, value: OptValue) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&OptValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// True when the option is present (with or without a value).
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Single-token value of an option, if present in that form.
    pub fn one(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(OptValue::One(v)) => Some(v),
            _ => None,
        }
    }

    /// List value of an option; a single-token value is one-element.
    pub fn list(&self, name: &str) -> Option<Vec<&str>> {
        match self.get(name) {
            Some(OptValue::List(vs)) => Some(vs.iter().map(String::as_str).collect()),
            Some(OptValue::One(v)) => Some(vec![v.as_str()]),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A `{{name[:mode] [--opt [value]]* [shorthand]}}` placeholder.
#[derive(Debug, Clone)]
pub struct Placeholder {
    /// Lowercased placeholder name.
    pub name: String,
    /// Lowercased `:mode` suffix, e.g. `tiny` in `{{limit:tiny}}`.
    pub mode: Option<String>,
    pub options: PlaceholderOptions,
    /// Bare trailing argument, e.g. `id` in `{{arg id}}`.
    pub shorthand: Option<String>,
    /// Byte range in the template source.
    pub span: Range<usize>,
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.mode == other.mode
            && self.options == other.options
            && self.shorthand == other.shorthand
    }
}

impl Eq for Placeholder {}

/// A `{{*kind target}} … [{{*else}} …] {{/kind}}` block.
#[derive(Debug, Clone)]
pub struct Conditional {
    pub kind: ConditionalKind,
    /// Target parameter name, verbatim.
    pub target: String,
    pub inner: Vec<TemplateNode>,
    pub else_branch: Option<Vec<TemplateNode>>,
    pub span: Range<usize>,
}

impl PartialEq for Conditional {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.target == other.target
            && self.inner == other.inner
            && self.else_branch == other.else_branch
    }
}

impl Eq for Conditional {}

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    Literal(String),
    Placeholder(Placeholder),
    Conditional(Conditional),
}

/// A parsed template: a finite, restartable node sequence.
#[derive(Debug, Clone)]
pub struct Template {
    pub nodes: Vec<TemplateNode>,
    source: String,
}

impl Template {
    /// Parse a template string. See [`crate::template::parser`].
    pub fn parse(source: &str) -> crate::error::EngineResult<Self> {
        crate::template::parser::parse_template(source)
    }

    pub(crate) fn from_parts(nodes: Vec<TemplateNode>, source: String) -> Self {
        Self { nodes, source }
    }

    /// The original template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Re-serialize the AST into canonical template text.
    ///
    /// Re-parsing the result yields a structurally equal AST.
    pub fn to_template_string(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        write_nodes(&self.nodes, &mut out);
        out
    }

    /// True when any placeholder in the template has the given name.
    pub fn has_placeholder(&self, name: &str) -> bool {
        fn walk(nodes: &[TemplateNode], name: &str) -> bool {
            nodes.iter().any(|n| match n {
                TemplateNode::Literal(_) => false,
                TemplateNode::Placeholder(p) => p.name == name,
                TemplateNode::Conditional(c) => {
                    walk(&c.inner, name)
                        || c.else_branch.as_deref().is_some_and(|e| walk(e, name))
                }
            })
        }
        walk(&self.nodes, name)
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Eq for Template {}

fn write_nodes(nodes: &[TemplateNode], out: &mut String) {
    for node in nodes {
        match node {
            TemplateNode::Literal(text) => {
                // Re-escape literal braces.
                out.push_str(&text.replace("{{", "{{{").replace("}}", "}}}"));
            }
            TemplateNode::Placeholder(p) => {
                out.push_str("{{");
                out.push_str(&p.name);
                if let Some(mode) = &p.mode {
                    out.push(':');
                    out.push_str(mode);
                }
                for (name, value) in p.options.iter() {
                    out.push_str(" --");
                    out.push_str(name);
                    match value {
                        OptValue::Flag => {}
                        OptValue::One(v) => {
                            out.push(' ');
                            out.push_str(v);
                        }
                        OptValue::List(vs) => {
                            out.push(' ');
                            out.push_str(&vs.join(","));
                        }
                    }
                }
                if let Some(shorthand) = &p.shorthand {
                    out.push(' ');
                    out.push_str(shorthand);
                }
                out.push_str("}}");
            }
            TemplateNode::Conditional(c) => {
                out.push_str("{{*");
                out.push_str(c.kind.as_str());
                out.push(' ');
                out.push_str(&c.target);
                out.push_str("}}");
                write_nodes(&c.inner, out);
                if let Some(else_nodes) = &c.else_branch {
                    out.push_str("{{*else}}");
                    write_nodes(else_nodes, out);
                }
                out.push_str("{{/");
                out.push_str(c.kind.as_str());
                out.push_str("}}");
            }
        }
    }
}
