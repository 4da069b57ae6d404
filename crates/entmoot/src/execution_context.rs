//! Synchronous-style driver over any executor
//!
//! [`ExecutionContext`] is what a caller uses to run a function-typed
//! computation end to end: ingest the argument, embed the computation, call
//! it, and materialize the result.

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;

use crate::computation::Computation;
use crate::error::{ExecutorError, Result};
use crate::executor::{Executor, ExecutorValue, RawValue};
use crate::payload::Payload;
use crate::types::TypeSignature;

/// Drives computations through an executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext<E> {
    executor: E,
}

impl<E: Executor> ExecutionContext<E> {
    /// Create a context backed by `executor`.
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// The backing executor
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Embed `payload` as a value of `type_signature`.
    ///
    /// Tuples are ingested element by element and composed with
    /// `create_tuple`, so each element becomes its own executor value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a tuple's element names differ from the
    /// names in `type_signature`, plus anything `create_value` reports.
    pub fn ingest<'a>(
        &'a self,
        payload: Payload,
        type_signature: &'a TypeSignature,
    ) -> BoxFuture<'a, Result<E::Value>> {
        async move {
            match (payload, type_signature) {
                (Payload::Tuple(elements), TypeSignature::NamedTuple(types)) => {
                    let value_names: Vec<_> = elements.iter().map(|(n, _)| n.as_deref()).collect();
                    let type_names: Vec<_> = types.iter().map(|(n, _)| n.as_deref()).collect();
                    if value_names != type_names {
                        return Err(ExecutorError::invalid_argument(format!(
                            "value with element names {:?} does not match type {}",
                            value_names, type_signature
                        )));
                    }
                    let ingested = try_join_all(
                        elements
                            .into_iter()
                            .zip(types)
                            .map(|((_, p), (_, t))| self.ingest(p, t)),
                    )
                    .await?;
                    let named = types.iter().map(|(n, _)| n.clone()).zip(ingested).collect();
                    self.executor.create_tuple(named).await
                }
                (payload, ty) => {
                    self.executor
                        .create_value(RawValue::Data(payload), Some(ty.clone()))
                        .await
                }
            }
        }
        .boxed()
    }

    /// Call `computation` on an optional, already ingested argument and
    /// materialize the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `computation` is not function-typed, plus
    /// anything the executor reports.
    pub async fn invoke(
        &self,
        computation: Computation,
        argument: Option<E::Value>,
    ) -> Result<Payload> {
        let ty = computation.type_signature()?;
        if !ty.is_function() {
            return Err(ExecutorError::invalid_argument(format!(
                "cannot invoke a computation of non-function type {}",
                ty
            )));
        }
        let function = self
            .executor
            .create_value(RawValue::Computation(computation), None)
            .await?;
        let result = self.executor.create_call(function, argument).await?;
        result.compute().await
    }

    /// Ingest `argument` (if any), then invoke `computation` on it.
    pub async fn run(
        &self,
        computation: Computation,
        argument: Option<(Payload, TypeSignature)>,
    ) -> Result<Payload> {
        let argument = match argument {
            Some((payload, ty)) => Some(self.ingest(payload, &ty).await?),
            None => None,
        };
        self.invoke(computation, argument).await
    }
}
