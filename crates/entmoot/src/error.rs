//! Error types for executor and service operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for executor and service operations.
///
/// Every variant belongs to exactly one [`ErrorKind`], which is what travels
/// over the wire and what callers branch on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// A value reference is absent from the table (never issued, or disposed)
    #[error("Value reference not found: {value_ref}")]
    NotFound {
        /// The unresolved reference id
        value_ref: String,
    },

    /// Malformed request or ill-typed composition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Type mismatch between a value and the type it is used as
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type received
        got: String,
    },

    /// The executor variant does not implement the operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The backend failed while materializing a value
    #[error("Backend failure: {0}")]
    BackendFailure(String),

    /// Connection or framing failure in the transport harness
    #[error("Transport error: {0}")]
    Transport(String),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes surfaced to remote callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`ExecutorError::NotFound`]
    NotFound,
    /// See [`ExecutorError::InvalidArgument`] and [`ExecutorError::TypeMismatch`]
    InvalidArgument,
    /// See [`ExecutorError::Unsupported`]
    Unsupported,
    /// See [`ExecutorError::BackendFailure`]
    BackendFailure,
    /// See [`ExecutorError::Transport`]
    Transport,
    /// See [`ExecutorError::Internal`]
    Internal,
}

impl ExecutorError {
    /// Build a `NotFound` error for the given reference id.
    pub fn not_found(value_ref: impl Into<String>) -> Self {
        ExecutorError::NotFound {
            value_ref: value_ref.into(),
        }
    }

    /// Build an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ExecutorError::InvalidArgument(message.into())
    }

    /// Build a `TypeMismatch` error from anything displayable.
    pub fn type_mismatch(expected: impl std::fmt::Display, got: impl std::fmt::Display) -> Self {
        ExecutorError::TypeMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Build an `Unsupported` error naming the operation.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        ExecutorError::Unsupported(operation.into())
    }

    /// The error class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::NotFound { .. } => ErrorKind::NotFound,
            ExecutorError::InvalidArgument(_) | ExecutorError::TypeMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            ExecutorError::Unsupported(_) => ErrorKind::Unsupported,
            ExecutorError::BackendFailure(_) => ErrorKind::BackendFailure,
            ExecutorError::Transport(_) => ErrorKind::Transport,
            ExecutorError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message without the class prefix, as sent over the wire.
    pub fn message(&self) -> String {
        match self {
            ExecutorError::NotFound { value_ref } => value_ref.clone(),
            ExecutorError::TypeMismatch { expected, got } => {
                format!("expected {}, got {}", expected, got)
            }
            ExecutorError::InvalidArgument(m)
            | ExecutorError::Unsupported(m)
            | ExecutorError::BackendFailure(m)
            | ExecutorError::Transport(m)
            | ExecutorError::Internal(m) => m.clone(),
        }
    }

    /// Rebuild an error from its wire form.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NotFound => ExecutorError::NotFound { value_ref: message },
            ErrorKind::InvalidArgument => ExecutorError::InvalidArgument(message),
            ErrorKind::Unsupported => ExecutorError::Unsupported(message),
            ErrorKind::BackendFailure => ExecutorError::BackendFailure(message),
            ErrorKind::Transport => ExecutorError::Transport(message),
            ErrorKind::Internal => ExecutorError::Internal(message),
        }
    }
}

/// Errors raised by the evaluator's binding environment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    /// Call depth limit reached
    #[error("Stack overflow: call depth {depth} exceeds maximum {max}")]
    StackOverflow {
        /// Depth at the time of the failed call
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// Reference to a name with no binding
    #[error("Undefined variable: {name}")]
    UndefinedVariable {
        /// The unbound name
        name: String,
    },
}

/// Errors raised while evaluating a computation in the eager backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Operation applied to a value of the wrong kind
    #[error("Type error: {message}")]
    TypeError {
        /// Description of the mismatch
        message: String,
    },

    /// Arithmetic operands of incompatible types
    #[error("Invalid operands for `{op}`: {left_type} and {right_type}")]
    InvalidBinaryOperands {
        /// Operator name
        op: String,
        /// Left operand type
        left_type: String,
        /// Right operand type
        right_type: String,
    },

    /// Checked integer arithmetic overflowed
    #[error("Integer overflow in `{op}`")]
    IntegerOverflow {
        /// Operator name
        op: String,
    },

    /// Function called with the wrong number of arguments
    #[error("Arity mismatch: function expects {expected} argument(s), got {got}")]
    ArityMismatch {
        /// Expected count (0 or 1)
        expected: usize,
        /// Supplied count
        got: usize,
    },

    /// Selection did not resolve against the runtime tuple
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A function (or tuple containing one) was asked for its payload
    #[error("Cannot materialize a value of kind {kind}")]
    NotMaterializable {
        /// Kind of the offending value
        kind: String,
    },

    /// The backend cancelled its evaluations
    #[error("Evaluation cancelled")]
    Cancelled,

    /// Binding environment failure
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

impl From<EvalError> for ExecutorError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::NotMaterializable { .. } => ExecutorError::InvalidArgument(err.to_string()),
            other => ExecutorError::BackendFailure(other.to_string()),
        }
    }
}

/// Result type alias for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;
