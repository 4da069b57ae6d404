//! Reference backend that evaluates computations in-process
//!
//! `create_value` evaluates computations immediately: non-functional results
//! are stored as payloads, functional ones as closures ready to be called.
//! Calls, tuples and selections are lazy; their payload is produced on the
//! first `compute()` and cached for every later one. A call that yields a
//! function is evaluated once, the first time it is itself called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::OnceCell;

use super::{check_value_type, named_tuple_type, select_type, Executor, ExecutorValue, RawValue};
use crate::error::{EvalError, ExecutorError, Result};
use crate::eval::{self, Evaluate, RuntimeValue};
use crate::payload::Payload;
use crate::types::{Selection, TypeSignature};
use crate::{Environment, EvalContext};

/// State shared by an executor and every value it creates.
#[derive(Debug)]
struct Backend {
    context: EvalContext,
    evaluations: AtomicU64,
}

impl Backend {
    /// Run the evaluator on a blocking worker so that long evaluations never
    /// stall the async runtime.
    async fn run<F>(self: &Arc<Self>, job: F) -> Result<RuntimeValue>
    where
        F: FnOnce(&mut Environment, &EvalContext) -> std::result::Result<RuntimeValue, EvalError>
            + Send
            + 'static,
    {
        let backend = Arc::clone(self);
        let handle = tokio::task::spawn_blocking(move || {
            backend.evaluations.fetch_add(1, Ordering::SeqCst);
            let mut env = Environment::with_max_call_depth(backend.context.max_call_depth);
            job(&mut env, &backend.context)
        });
        let value = handle
            .await
            .map_err(|e| ExecutorError::Internal(format!("evaluation task failed: {}", e)))??;
        Ok(value)
    }
}

/// In-process executor backed by the tree-walking evaluator.
///
/// Safe to call concurrently; all values share one [`EvalContext`].
#[derive(Debug, Clone)]
pub struct EagerExecutor {
    backend: Arc<Backend>,
}

impl Default for EagerExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl EagerExecutor {
    /// Create an executor with the default evaluation context.
    pub fn new() -> Self {
        Self::with_context(EvalContext::default())
    }

    /// Create an executor evaluating under `context`.
    pub fn with_context(context: EvalContext) -> Self {
        Self {
            backend: Arc::new(Backend {
                context,
                evaluations: AtomicU64::new(0),
            }),
        }
    }

    /// The evaluation context shared by this executor's values.
    pub fn context(&self) -> &EvalContext {
        &self.backend.context
    }

    /// How many times the evaluator has run on behalf of this executor.
    pub fn evaluation_count(&self) -> u64 {
        self.backend.evaluations.load(Ordering::SeqCst)
    }

    /// Abort evaluations in flight and fail new ones with `BackendFailure`
    /// until [`resume`](Self::resume) is called.
    pub fn cancel(&self) {
        self.backend.context.cancel();
        tracing::debug!("eager evaluations cancelled");
    }

    /// Let evaluations run again after [`cancel`](Self::cancel).
    pub fn resume(&self) {
        self.backend.context.resume();
    }

    fn value(&self, type_signature: TypeSignature, repr: Repr) -> EagerValue {
        EagerValue {
            inner: Arc::new(Inner {
                type_signature,
                repr,
                cache: OnceCell::new(),
                runtime: OnceCell::new(),
                backend: Arc::clone(&self.backend),
            }),
        }
    }
}

#[derive(Debug)]
enum Repr {
    Data(Payload),
    Runtime(RuntimeValue),
    Call {
        function: EagerValue,
        argument: Option<EagerValue>,
    },
    Tuple(Vec<(Option<String>, EagerValue)>),
    Selection {
        source: EagerValue,
        selection: Selection,
    },
}

#[derive(Debug)]
struct Inner {
    type_signature: TypeSignature,
    repr: Repr,
    cache: OnceCell<Payload>,
    // functional call results, evaluated on first use as a callee
    runtime: OnceCell<RuntimeValue>,
    backend: Arc<Backend>,
}

/// A value created by an [`EagerExecutor`].
#[derive(Debug, Clone)]
pub struct EagerValue {
    inner: Arc<Inner>,
}

impl EagerValue {
    /// Whether the payload has already been materialized.
    pub fn is_materialized(&self) -> bool {
        matches!(self.inner.repr, Repr::Data(_)) || self.inner.cache.initialized()
    }

    /// The value as seen by the evaluator, functions included.
    fn to_runtime(&self) -> BoxFuture<'_, Result<RuntimeValue>> {
        async move {
            if !self.inner.type_signature.contains_function() {
                return Ok(RuntimeValue::from(self.compute().await?));
            }
            let backend = &self.inner.backend;
            match &self.inner.repr {
                Repr::Data(payload) => Ok(RuntimeValue::from(payload.clone())),
                Repr::Runtime(value) => Ok(value.clone()),
                Repr::Call { function, argument } => {
                    let value = self
                        .inner
                        .runtime
                        .get_or_try_init(|| async {
                            let func = function.to_runtime().await?;
                            let arg = match argument {
                                Some(a) => Some(a.to_runtime().await?),
                                None => None,
                            };
                            backend
                                .run(move |env, ctx| eval::call_value(func, arg, env, ctx))
                                .await
                        })
                        .await?;
                    Ok(value.clone())
                }
                Repr::Tuple(elements) => {
                    let values = try_join_all(elements.iter().map(|(_, v)| v.to_runtime())).await?;
                    Ok(RuntimeValue::Tuple(
                        elements
                            .iter()
                            .map(|(n, _)| n.clone())
                            .zip(values)
                            .collect(),
                    ))
                }
                Repr::Selection { source, selection } => {
                    let base = source.to_runtime().await?;
                    Ok(eval::select_value(base, selection)?)
                }
            }
        }
        .boxed()
    }

    async fn materialize(&self) -> Result<Payload> {
        let backend = &self.inner.backend;
        match &self.inner.repr {
            Repr::Data(payload) => Ok(payload.clone()),
            Repr::Runtime(value) => Ok(value.clone().into_payload()?),
            Repr::Call { function, argument } => {
                let func = function.to_runtime().await?;
                let arg = match argument {
                    Some(a) => Some(a.to_runtime().await?),
                    None => None,
                };
                let value = backend
                    .run(move |env, ctx| eval::call_value(func, arg, env, ctx))
                    .await?;
                Ok(value.into_payload()?)
            }
            Repr::Tuple(elements) => {
                let payloads = try_join_all(elements.iter().map(|(_, v)| v.compute())).await?;
                Ok(Payload::Tuple(
                    elements
                        .iter()
                        .map(|(n, _)| n.clone())
                        .zip(payloads)
                        .collect(),
                ))
            }
            Repr::Selection { source, selection } => source.compute().await?.select(selection),
        }
    }
}

#[async_trait]
impl ExecutorValue for EagerValue {
    fn type_signature(&self) -> &TypeSignature {
        &self.inner.type_signature
    }

    async fn compute(&self) -> Result<Payload> {
        if self.inner.type_signature.contains_function() {
            return Err(ExecutorError::invalid_argument(format!(
                "cannot materialize a value of functional type {}",
                self.inner.type_signature
            )));
        }
        let payload = self
            .inner
            .cache
            .get_or_try_init(|| self.materialize())
            .await?;
        Ok(payload.clone())
    }
}

#[async_trait]
impl Executor for EagerExecutor {
    type Value = EagerValue;

    async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<EagerValue> {
        let type_signature = check_value_type(&value, type_signature)?;
        let repr = match value {
            RawValue::Data(payload) => Repr::Data(payload),
            RawValue::Computation(comp) => {
                let value = self
                    .backend
                    .run(move |env, ctx| comp.eval(env, ctx))
                    .await?;
                if type_signature.contains_function() {
                    Repr::Runtime(value)
                } else {
                    Repr::Data(value.into_payload()?)
                }
            }
        };
        tracing::trace!(type_signature = %type_signature, "created eager value");
        Ok(self.value(type_signature, repr))
    }

    async fn create_call(
        &self,
        function: EagerValue,
        argument: Option<EagerValue>,
    ) -> Result<EagerValue> {
        let result = function
            .type_signature()
            .call_result(argument.as_ref().map(|a| a.type_signature()))?;
        Ok(self.value(result, Repr::Call { function, argument }))
    }

    async fn create_tuple(
        &self,
        elements: Vec<(Option<String>, EagerValue)>,
    ) -> Result<EagerValue> {
        let type_signature = named_tuple_type(&elements);
        Ok(self.value(type_signature, Repr::Tuple(elements)))
    }

    async fn create_selection(
        &self,
        source: EagerValue,
        selection: Selection,
    ) -> Result<EagerValue> {
        let type_signature = select_type(source.type_signature(), &selection)?;
        Ok(self.value(type_signature, Repr::Selection { source, selection }))
    }
}
