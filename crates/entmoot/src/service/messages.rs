//! Request and response types of the executor protocol

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ExecutorError, Result};
use crate::executor::RawValue;
use crate::payload::Payload;
use crate::table::ValueRef;
use crate::types::{Selection, TypeSignature};

/// Embed a value or computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateValueRequest {
    /// Data or computation to embed
    pub value: RawValue,
    /// Required for data, optional for computations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_signature: Option<TypeSignature>,
}

/// Bind a function to an optional argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCallRequest {
    /// Reference to the function value
    pub function_ref: ValueRef,
    /// Reference to the argument, absent for nullary functions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_ref: Option<ValueRef>,
}

/// One element of a [`CreateTupleRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleElement {
    /// Optional element name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference to the element value
    pub value_ref: ValueRef,
}

/// Compose referenced values into a tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTupleRequest {
    /// Elements in order
    pub elements: Vec<TupleElement>,
}

/// Project an element out of a tuple.
///
/// Exactly one of `index` and `name` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSelectionRequest {
    /// Reference to the tuple value
    pub source_ref: ValueRef,
    /// Positional selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Named selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CreateSelectionRequest {
    /// Select by position.
    pub fn by_index(source_ref: ValueRef, index: usize) -> Self {
        Self {
            source_ref,
            index: Some(index),
            name: None,
        }
    }

    /// Select by name.
    pub fn by_name(source_ref: ValueRef, name: impl Into<String>) -> Self {
        Self {
            source_ref,
            index: None,
            name: Some(name.into()),
        }
    }

    /// Validate the selector.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when both or neither of `index` and `name`
    /// are set.
    pub fn selection(&self) -> Result<Selection> {
        match (self.index, &self.name) {
            (Some(index), None) => Ok(Selection::Index(index)),
            (None, Some(name)) => Ok(Selection::Name(name.clone())),
            (Some(_), Some(_)) => Err(ExecutorError::invalid_argument(
                "selection must set exactly one of index and name, got both",
            )),
            (None, None) => Err(ExecutorError::invalid_argument(
                "selection must set exactly one of index and name, got neither",
            )),
        }
    }
}

/// Materialize a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    /// Reference to materialize
    pub value_ref: ValueRef,
}

/// Release a value reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposeRequest {
    /// Reference to release
    pub value_ref: ValueRef,
}

/// Any request the service accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// See [`CreateValueRequest`]
    CreateValue(CreateValueRequest),
    /// See [`CreateCallRequest`]
    CreateCall(CreateCallRequest),
    /// See [`CreateTupleRequest`]
    CreateTuple(CreateTupleRequest),
    /// See [`CreateSelectionRequest`]
    CreateSelection(CreateSelectionRequest),
    /// See [`ComputeRequest`]
    Compute(ComputeRequest),
    /// See [`DisposeRequest`]
    Dispose(DisposeRequest),
}

impl Request {
    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Request::CreateValue(_) => "create_value",
            Request::CreateCall(_) => "create_call",
            Request::CreateTuple(_) => "create_tuple",
            Request::CreateSelection(_) => "create_selection",
            Request::Compute(_) => "compute",
            Request::Dispose(_) => "dispose",
        }
    }
}

/// A failure as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    /// Error class
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl From<&ExecutorError> for WireError {
    fn from(err: &ExecutorError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message(),
        }
    }
}

impl From<WireError> for ExecutorError {
    fn from(err: WireError) -> Self {
        ExecutorError::from_kind(err.kind, err.message)
    }
}

/// The service's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// A create operation succeeded
    Created {
        /// The freshly minted reference
        value_ref: ValueRef,
    },
    /// A compute operation succeeded
    Computed {
        /// The materialized payload
        payload: Payload,
    },
    /// A dispose operation succeeded
    Disposed,
    /// The operation failed
    Error {
        /// The failure
        error: WireError,
    },
}

impl Response {
    /// Build a response from an operation result.
    pub fn from_result<T>(result: Result<T>, ok: impl FnOnce(T) -> Response) -> Self {
        match result {
            Ok(value) => ok(value),
            Err(err) => Response::Error {
                error: WireError::from(&err),
            },
        }
    }

    /// Expect a `Created` response.
    pub fn into_value_ref(self) -> Result<ValueRef> {
        match self {
            Response::Created { value_ref } => Ok(value_ref),
            other => Err(other.unexpected("created")),
        }
    }

    /// Expect a `Computed` response.
    pub fn into_payload(self) -> Result<Payload> {
        match self {
            Response::Computed { payload } => Ok(payload),
            other => Err(other.unexpected("computed")),
        }
    }

    /// Expect a `Disposed` response.
    pub fn into_disposed(self) -> Result<()> {
        match self {
            Response::Disposed => Ok(()),
            other => Err(other.unexpected("disposed")),
        }
    }

    fn unexpected(self, expected: &str) -> ExecutorError {
        match self {
            Response::Error { error } => error.into(),
            other => ExecutorError::Transport(format!(
                "expected a {} response, got {:?}",
                expected, other
            )),
        }
    }
}
