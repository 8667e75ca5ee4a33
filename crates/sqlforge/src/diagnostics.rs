//! Diagnostics emitted by the validator and the planner.
//!
//! Every diagnostic carries a stable code. Codes are a contract: they never
//! change meaning across versions, so host tooling can match on them.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Stable diagnostic codes.
pub mod codes {
    // Structural errors
    pub const EMPTY_TEMPLATE: &str = "E001";
    pub const UNTERMINATED_PLACEHOLDER: &str = "E002";
    pub const UNBALANCED_CONDITIONAL: &str = "E003";
    pub const UNKNOWN_PLACEHOLDER: &str = "E004";
    pub const UNKNOWN_CONDITIONAL_KIND: &str = "E005";
    pub const UNMATCHED_PARENS: &str = "E006";

    // Semantic errors
    pub const AMBIGUOUS_EXPRESSION_PARAM: &str = "E101";
    pub const DUPLICATE_COLUMN: &str = "E102";
    pub const DUPLICATE_VARIABLE: &str = "E103";
    pub const INVALID_RETURN_TYPE: &str = "E104";
    pub const INVALID_PARAMETER_SHAPE: &str = "E105";

    // Dialect errors
    pub const UNSAFE_IDENTIFIER: &str = "E201";
    pub const UNSUPPORTED_PREDICATE: &str = "E202";

    // Catch-all validation error
    pub const VALIDATION: &str = "E900";

    // Warnings
    pub const UNKNOWN_OPTION: &str = "W001";
    pub const UNBINDABLE_PLACEHOLDER: &str = "W002";
    pub const MISSING_WHERE: &str = "W003";
    pub const DEPRECATED_PLACEHOLDER: &str = "W004";
    pub const OFFSET_FETCH_WITHOUT_ORDER_BY: &str = "W101";

    // Suggestions
    pub const SELECT_STAR: &str = "S001";
    pub const ORDER_BY_WITHOUT_LIMIT: &str = "S002";
    pub const JOIN_WITHOUT_CONDITION: &str = "S003";
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Plan emission aborts for the offending method.
    Error,
    /// Potential issue, but may be intentional; the plan still emits.
    Warning,
    /// Advisory only.
    Suggestion,
}

/// A single diagnostic with a stable code and an optional source span.
///
/// Serialize-only: the static code field rules out deserialization, and
/// diagnostics only flow outward to the host's sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    /// Byte range into the template source, when known.
    pub span: Option<Range<usize>>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            span: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            span: None,
        }
    }

    pub fn suggestion(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Suggestion,
            message: message.into(),
            span: None,
        }
    }

    /// Attach a source span.
    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = Some(span);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}: {}", self.severity, self.code, self.message)
    }
}

/// Receives the diagnostic stream produced during repository planning.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}
