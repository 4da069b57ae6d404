//! The executor protocol endpoint
//!
//! An [`ExecutorService`] owns one executor and one [`ValueTable`]. Each
//! operation resolves its references, runs the executor operation on its own
//! task, and stores the result under a fresh [`ValueRef`]. A slow operation
//! only suspends the request that issued it.

pub mod messages;

pub use messages::{
    ComputeRequest, CreateCallRequest, CreateSelectionRequest, CreateTupleRequest,
    CreateValueRequest, DisposeRequest, Request, Response, TupleElement, WireError,
};

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ExecutorError, Result};
use crate::executor::{Executor, ExecutorValue};
use crate::payload::Payload;
use crate::table::{ValueRef, ValueTable};
use crate::types::TypeSignature;

/// Serves one executor to many concurrent callers.
pub struct ExecutorService<E: Executor> {
    executor: Arc<E>,
    table: ValueTable<E::Value>,
}

impl<E: Executor + 'static> ExecutorService<E> {
    /// Create a service over `executor`.
    pub fn new(executor: E) -> Self {
        Self::from_arc(Arc::new(executor))
    }

    /// Create a service over a shared executor.
    pub fn from_arc(executor: Arc<E>) -> Self {
        Self {
            executor,
            table: ValueTable::new(),
        }
    }

    /// The backing executor
    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Number of live value references
    pub fn live_refs(&self) -> usize {
        self.table.len()
    }

    /// Check whether `value_ref` is live.
    pub fn contains(&self, value_ref: &ValueRef) -> bool {
        self.table.contains(value_ref)
    }

    /// Run one executor operation on its own task.
    async fn run<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<E>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(operation(Arc::clone(&self.executor)));
        task.await
            .map_err(|e| ExecutorError::Internal(format!("executor task failed: {}", e)))?
    }

    /// Declared type of a live reference.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reference is not live.
    pub fn type_signature(&self, value_ref: &ValueRef) -> Result<TypeSignature> {
        Ok(self.table.get(value_ref)?.type_signature().clone())
    }

    fn register(&self, value: E::Value) -> Result<ValueRef> {
        let value_ref = ValueRef::generate();
        self.table.insert(value_ref.clone(), value)?;
        debug!(%value_ref, "registered value");
        Ok(value_ref)
    }

    /// Embed a value or computation.
    pub async fn create_value(&self, request: CreateValueRequest) -> Result<ValueRef> {
        let CreateValueRequest {
            value,
            type_signature,
        } = request;
        let value = self
            .run(move |executor| async move { executor.create_value(value, type_signature).await })
            .await?;
        self.register(value)
    }

    /// Bind a referenced function to an optional referenced argument.
    pub async fn create_call(&self, request: CreateCallRequest) -> Result<ValueRef> {
        let function = self.table.get(&request.function_ref)?;
        let argument = request
            .argument_ref
            .as_ref()
            .map(|r| self.table.get(r))
            .transpose()?;
        let value = self
            .run(move |executor| async move { executor.create_call(function, argument).await })
            .await?;
        self.register(value)
    }

    /// Compose referenced values into a tuple.
    pub async fn create_tuple(&self, request: CreateTupleRequest) -> Result<ValueRef> {
        let elements = request
            .elements
            .into_iter()
            .map(|element| Ok((element.name, self.table.get(&element.value_ref)?)))
            .collect::<Result<Vec<_>>>()?;
        let value = self
            .run(move |executor| async move { executor.create_tuple(elements).await })
            .await?;
        self.register(value)
    }

    /// Project one element out of a referenced tuple.
    pub async fn create_selection(&self, request: CreateSelectionRequest) -> Result<ValueRef> {
        let selection = request.selection()?;
        let source = self.table.get(&request.source_ref)?;
        let value = self
            .run(move |executor| async move { executor.create_selection(source, selection).await })
            .await?;
        self.register(value)
    }

    /// Materialize a referenced value.
    pub async fn compute(&self, request: ComputeRequest) -> Result<Payload> {
        let value = self.table.get(&request.value_ref)?;
        self.run(move |_| async move { value.compute().await }).await
    }

    /// Release a reference.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reference is not live.
    pub fn dispose(&self, request: DisposeRequest) -> Result<()> {
        if self.table.remove(&request.value_ref) {
            debug!(value_ref = %request.value_ref, "disposed value");
            Ok(())
        } else {
            Err(ExecutorError::not_found(request.value_ref.id()))
        }
    }

    /// Dispatch a request and wrap the outcome in a response.
    pub async fn handle(&self, request: Request) -> Response {
        let operation = request.name();
        debug!(operation, "handling request");
        let response = match request {
            Request::CreateValue(r) => {
                Response::from_result(self.create_value(r).await, created)
            }
            Request::CreateCall(r) => Response::from_result(self.create_call(r).await, created),
            Request::CreateTuple(r) => Response::from_result(self.create_tuple(r).await, created),
            Request::CreateSelection(r) => {
                Response::from_result(self.create_selection(r).await, created)
            }
            Request::Compute(r) => Response::from_result(self.compute(r).await, |payload| {
                Response::Computed { payload }
            }),
            Request::Dispose(r) => Response::from_result(self.dispose(r), |()| Response::Disposed),
        };
        if let Response::Error { error } = &response {
            warn!(operation, kind = ?error.kind, message = %error.message, "request failed");
        }
        response
    }

    /// Drop every live reference.
    pub fn shutdown(&self) {
        let live = self.table.len();
        self.table.clear();
        debug!(live, "service table cleared");
    }
}

fn created(value_ref: ValueRef) -> Response {
    Response::Created { value_ref }
}

impl<E: Executor> Drop for ExecutorService<E> {
    fn drop(&mut self) {
        self.table.clear();
    }
}
