//! Error types for sqlforge-runtime

use thiserror::Error;

/// Result type alias for runtime rendering
pub type RenderResult<T> = Result<T, RenderError>;

/// Call-time rendering failures.
///
/// The renderer never silently swallows: every failure surfaces through
/// this enum to the caller's normal error channel.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A marker referenced an argument that was not supplied
    #[error("Missing argument '{name}'")]
    MissingArgument { name: String },

    /// An argument had the wrong runtime shape for its marker
    #[error("Argument '{name}' has the wrong shape: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// A batch row's width does not match the planned column projection
    #[error("Batch row {row} has {got} values, expected {expected}")]
    BatchArityMismatch {
        expected: usize,
        got: usize,
        row: usize,
    },

    /// The supplied predicate DSL value failed to translate
    #[error("Ill-formed predicate: {0}")]
    Predicate(#[from] sqlforge::EngineError),

    /// The plan's SQL carried a marker the plan does not describe
    #[error("Unknown runtime marker '{marker}'")]
    UnknownMarker { marker: String },

    /// The plan shape is not renderable
    #[error("Unsupported plan: {0}")]
    Unsupported(String),
}
