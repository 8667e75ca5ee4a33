//! SQL template language: AST and parser.
//!
//! Templates mix literal SQL with `{{…}}` placeholders and `{{*…}}`
//! conditional blocks. Parsing is a pure, deterministic transform; the
//! planner renders the resulting nodes against a dialect, an entity
//! descriptor and a method descriptor.

pub mod ast;
pub(crate) mod parser;

pub use ast::{
    Conditional, ConditionalKind, OptValue, Placeholder, PlaceholderOptions, Template,
    TemplateNode,
};
