//! # sqlforge-runtime
//!
//! Call-time companion to `sqlforge`: resolves the deferred runtime markers
//! an [`ExecutionPlan`](sqlforge::ExecutionPlan) may carry (nullable
//! LIMIT/OFFSET, dynamic WHERE predicates, batch VALUES expansion and
//! conditional fragments) against the actual argument values, yielding
//! driver-ready SQL plus the generated binding list.
//!
//! The renderer is thread-safe by construction: plans are read-only and
//! each call allocates only the emitted string and bindings.

pub mod args;
pub mod error;
pub mod render;

pub use args::{ArgValues, RuntimeValue};
pub use error::{RenderError, RenderResult};
pub use render::{RenderedCommand, RuntimeBinding, render};
