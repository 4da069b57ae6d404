//! Executor decorator that rewrites computations before delegating

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Executor, RawValue};
use crate::computation::Computation;
use crate::error::Result;
use crate::types::{Selection, TypeSignature};

/// A pure computation rewrite.
pub type TransformFn = Arc<dyn Fn(Computation) -> Computation + Send + Sync>;

/// Wraps an inner executor and applies a transformation to every
/// computation passed to `create_value`.
///
/// Data values and the other three operations are delegated unchanged, so
/// the inner executor never learns a rewrite took place. Stacking two
/// transforming executors applies the outer transform first.
///
/// # Examples
///
/// ```
/// use entmoot::computation::transformations::remove_identity_calls;
/// use entmoot::{EagerExecutor, TransformingExecutor};
///
/// let executor = TransformingExecutor::new(EagerExecutor::new(), |comp| {
///     remove_identity_calls(comp).0
/// });
/// # let _ = executor;
/// ```
pub struct TransformingExecutor<E> {
    inner: E,
    transform: TransformFn,
}

impl<E> TransformingExecutor<E> {
    /// Wrap `inner` with `transform`.
    pub fn new<F>(inner: E, transform: F) -> Self
    where
        F: Fn(Computation) -> Computation + Send + Sync + 'static,
    {
        Self {
            inner,
            transform: Arc::new(transform),
        }
    }

    /// Wrap `inner` with an already shared transform.
    pub fn from_shared(inner: E, transform: TransformFn) -> Self {
        Self { inner, transform }
    }

    /// The wrapped executor
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwrap the inner executor.
    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: fmt::Debug> fmt::Debug for TransformingExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformingExecutor")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: Executor> Executor for TransformingExecutor<E> {
    type Value = E::Value;

    async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<Self::Value> {
        let value = match value {
            RawValue::Computation(comp) => {
                let rewritten = (self.transform)(comp);
                tracing::trace!(computation = %rewritten, "transformed computation");
                RawValue::Computation(rewritten)
            }
            data => data,
        };
        self.inner.create_value(value, type_signature).await
    }

    async fn create_call(
        &self,
        function: Self::Value,
        argument: Option<Self::Value>,
    ) -> Result<Self::Value> {
        self.inner.create_call(function, argument).await
    }

    async fn create_tuple(
        &self,
        elements: Vec<(Option<String>, Self::Value)>,
    ) -> Result<Self::Value> {
        self.inner.create_tuple(elements).await
    }

    async fn create_selection(
        &self,
        source: Self::Value,
        selection: Selection,
    ) -> Result<Self::Value> {
        self.inner.create_selection(source, selection).await
    }
}
