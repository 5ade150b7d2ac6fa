use thiserror::Error;

use crate::ir::builder::BuildError;
use crate::ir::ScalarType;

/// Semantic errors raised while lowering one function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    /// A variable rebound with a different type
    #[error("'{name}' is bound as {previous} and cannot be rebound as {attempted}")]
    Redeclaration {
        name: String,
        previous: ScalarType,
        attempted: ScalarType,
    },
    /// A variable or function that was never defined
    #[error("name '{name}' is not defined")]
    UnboundName { name: String },
    /// An operand, argument or value of the wrong type
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },
    /// A call with the wrong number of arguments
    #[error("'{callee}' takes {expected} argument(s) but {found} were given")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },
    /// Division by a literal zero
    #[error("division by zero")]
    DivisionByZero,
    /// A statement after the block was closed
    #[error("unreachable code after 'return'")]
    DeadCode,
    /// A valued function that can fall off its end
    #[error("missing return: control can reach the end of a function returning {expected}")]
    MissingReturn { expected: ScalarType },
    /// Two definitions share a name
    #[error("function '{name}' is defined more than once")]
    DuplicateFunction { name: String },
    /// A `main` that cannot serve as the process entry point
    #[error("invalid entry point: {reason}")]
    InvalidEntryPoint { reason: String },
    /// Script statements next to an explicit `main`
    #[error("top-level statements cannot be combined with an explicit 'def main'")]
    ConflictingEntryPoint,
    /// Valid syntax the compiler does not handle
    #[error("{0} are not supported")]
    Unsupported(&'static str),
    /// The builder was misused
    #[error("internal builder error")]
    Build(#[from] BuildError),
}

impl CodegenError {
    pub(crate) fn mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        CodegenError::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
