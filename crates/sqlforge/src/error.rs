//! Error types for sqlforge

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for template parsing, rendering and planning.
///
/// Structural and semantic errors abort the plan for the offending method
/// only; sibling methods still plan. Every variant maps to a stable
/// diagnostic code via [`EngineError::code`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Template is empty or all whitespace
    #[error("Template is empty")]
    EmptyTemplate,

    /// A `{{` was opened but never closed
    #[error("Unterminated placeholder starting at byte {offset}")]
    UnterminatedPlaceholder { offset: usize },

    /// A conditional block opener has no matching close (or vice versa)
    #[error("Unbalanced conditional block: {detail}")]
    UnbalancedConditional { detail: String },

    /// Placeholder name is not part of the template language
    #[error("Unknown placeholder '{{{{{name}}}}}'")]
    UnknownPlaceholder { name: String },

    /// Conditional kind is not one of ifnotnull/ifnull/ifnotempty/ifempty
    #[error("Unknown conditional kind '{name}'")]
    UnknownConditionalKind { name: String },

    /// Parentheses in literal SQL do not balance
    #[error("Unmatched parentheses in template")]
    UnmatchedParens,

    /// More than one predicate-expression parameter and no explicit `--param`
    #[error("Method '{method}' has more than one expression parameter; use --param to disambiguate")]
    AmbiguousExpressionParameter { method: String },

    /// Two columns share a field name or a database name
    #[error("Duplicate column '{name}' in entity '{entity}'")]
    DuplicateColumn { entity: String, name: String },

    /// Two parameters (or two methods) share a name
    #[error("Duplicate name '{name}' on '{surface}'")]
    DuplicateVariable { surface: String, name: String },

    /// Return shape is not valid for the statement the template produces
    #[error("Invalid return type for method '{method}': {detail}")]
    InvalidReturnType { method: String, detail: String },

    /// Parameter list shape is not valid (e.g. two entity-body parameters)
    #[error("Invalid parameter shape for method '{method}': {detail}")]
    InvalidParameterShape { method: String, detail: String },

    /// Identifier contains the dialect's closing quote character
    #[error("Unsafe identifier '{ident}': contains the closing quote character")]
    UnsafeIdentifier { ident: String },

    /// Predicate tree node cannot be translated
    #[error("Unsupported predicate node: {detail}")]
    UnsupportedPredicate { detail: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl EngineError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable diagnostic code for this error.
    ///
    /// Codes never change meaning across versions; see
    /// [`crate::diagnostics`] for the full registry.
    pub fn code(&self) -> &'static str {
        use crate::diagnostics::codes;
        match self {
            Self::EmptyTemplate => codes::EMPTY_TEMPLATE,
            Self::UnterminatedPlaceholder { .. } => codes::UNTERMINATED_PLACEHOLDER,
            Self::UnbalancedConditional { .. } => codes::UNBALANCED_CONDITIONAL,
            Self::UnknownPlaceholder { .. } => codes::UNKNOWN_PLACEHOLDER,
            Self::UnknownConditionalKind { .. } => codes::UNKNOWN_CONDITIONAL_KIND,
            Self::UnmatchedParens => codes::UNMATCHED_PARENS,
            Self::AmbiguousExpressionParameter { .. } => codes::AMBIGUOUS_EXPRESSION_PARAM,
            Self::DuplicateColumn { .. } => codes::DUPLICATE_COLUMN,
            Self::DuplicateVariable { .. } => codes::DUPLICATE_VARIABLE,
            Self::InvalidReturnType { .. } => codes::INVALID_RETURN_TYPE,
            Self::InvalidParameterShape { .. } => codes::INVALID_PARAMETER_SHAPE,
            Self::UnsafeIdentifier { .. } => codes::UNSAFE_IDENTIFIER,
            Self::UnsupportedPredicate { .. } => codes::UNSUPPORTED_PREDICATE,
            Self::Validation(_) => codes::VALIDATION,
        }
    }

    /// Check if this is a structural (parse-level) error
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::EmptyTemplate
                | Self::UnterminatedPlaceholder { .. }
                | Self::UnbalancedConditional { .. }
                | Self::UnknownPlaceholder { .. }
                | Self::UnknownConditionalKind { .. }
                | Self::UnmatchedParens
        )
    }

    /// Convert into an error-severity diagnostic carrying the stable code.
    pub fn to_diagnostic(&self) -> crate::diagnostics::Diagnostic {
        crate::diagnostics::Diagnostic::error(self.code(), self.to_string())
    }
}
