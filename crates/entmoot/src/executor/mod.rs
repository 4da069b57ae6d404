//! The executor capability interface and its implementations
//!
//! An [`Executor`] embeds values and composes them lazily through four
//! operations. Nothing is materialized until [`ExecutorValue::compute`] is
//! called. Callers depend only on these traits, so a backend, a decorator
//! stack, or a remote proxy are interchangeable.

pub mod eager;
pub mod remote;
pub mod transforming;

pub use eager::{EagerExecutor, EagerValue};
pub use remote::{RemoteExecutor, RemoteValue};
pub use transforming::{TransformFn, TransformingExecutor};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::computation::Computation;
use crate::error::Result;
use crate::payload::Payload;
use crate::types::{Selection, TypeSignature};

/// What `create_value` embeds: plain data or a computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    /// Concrete data; requires an explicit type signature
    Data(Payload),
    /// A computation; its type signature can be derived
    Computation(Computation),
}

impl From<Payload> for RawValue {
    fn from(payload: Payload) -> Self {
        RawValue::Data(payload)
    }
}

impl From<Computation> for RawValue {
    fn from(computation: Computation) -> Self {
        RawValue::Computation(computation)
    }
}

/// A value embedded in an executor.
///
/// Values are immutable. Clones are handles to the same value, so
/// computing through any clone observes the same materialization.
#[async_trait]
pub trait ExecutorValue: Clone + Send + Sync + 'static {
    /// The value's type signature, fixed at creation
    fn type_signature(&self) -> &TypeSignature;

    /// Materialize the value.
    ///
    /// Idempotent: repeated calls return the same payload.
    async fn compute(&self) -> Result<Payload>;
}

/// Contract for all executors.
///
/// Any operation a variant does not support fails with
/// [`ExecutorError::Unsupported`](crate::ExecutorError::Unsupported).
#[async_trait]
pub trait Executor: Send + Sync {
    /// Values this executor creates and consumes
    type Value: ExecutorValue;

    /// Embed data or a computation.
    ///
    /// `type_signature` is required for data and optional for computations.
    async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<Self::Value>;

    /// Bind a function value to an optional argument, unmaterialized.
    async fn create_call(
        &self,
        function: Self::Value,
        argument: Option<Self::Value>,
    ) -> Result<Self::Value>;

    /// Compose named or positional elements into one tuple value.
    async fn create_tuple(
        &self,
        elements: Vec<(Option<String>, Self::Value)>,
    ) -> Result<Self::Value>;

    /// Project one element out of a tuple value.
    async fn create_selection(
        &self,
        source: Self::Value,
        selection: Selection,
    ) -> Result<Self::Value>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    type Value = E::Value;

    async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<Self::Value> {
        self.as_ref().create_value(value, type_signature).await
    }

    async fn create_call(
        &self,
        function: Self::Value,
        argument: Option<Self::Value>,
    ) -> Result<Self::Value> {
        self.as_ref().create_call(function, argument).await
    }

    async fn create_tuple(
        &self,
        elements: Vec<(Option<String>, Self::Value)>,
    ) -> Result<Self::Value> {
        self.as_ref().create_tuple(elements).await
    }

    async fn create_selection(
        &self,
        source: Self::Value,
        selection: Selection,
    ) -> Result<Self::Value> {
        self.as_ref().create_selection(source, selection).await
    }
}

/// Type of the tuple composed from `elements`.
pub fn named_tuple_type<V: ExecutorValue>(elements: &[(Option<String>, V)]) -> TypeSignature {
    TypeSignature::NamedTuple(
        elements
            .iter()
            .map(|(n, v)| (n.clone(), v.type_signature().clone()))
            .collect(),
    )
}

/// Type of the element `selection` addresses in a value of `source_type`.
pub fn select_type(source_type: &TypeSignature, selection: &Selection) -> Result<TypeSignature> {
    source_type.select(selection)
}

/// Derive or check the type signature for `create_value`.
///
/// # Errors
///
/// Returns `InvalidArgument` when data comes without a type, and
/// `TypeMismatch` when the given type does not fit the value.
pub fn check_value_type(
    value: &RawValue,
    type_signature: Option<TypeSignature>,
) -> Result<TypeSignature> {
    match (value, type_signature) {
        (RawValue::Data(payload), Some(ty)) => {
            if payload.conforms_to(&ty) {
                Ok(ty)
            } else {
                Err(crate::ExecutorError::type_mismatch(
                    ty,
                    payload.type_signature(),
                ))
            }
        }
        (RawValue::Data(_), None) => Err(crate::ExecutorError::invalid_argument(
            "a type signature is required for data values",
        )),
        (RawValue::Computation(comp), ty) => {
            let derived = comp.type_signature()?;
            match ty {
                Some(ty) if !ty.is_assignable_from(&derived) => {
                    Err(crate::ExecutorError::type_mismatch(ty, derived))
                }
                Some(ty) => Ok(ty),
                None => Ok(derived),
            }
        }
    }
}
