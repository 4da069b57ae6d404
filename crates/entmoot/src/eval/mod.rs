//! Tree-walking evaluation of computations for the eager backend

pub mod binary;
pub mod call;
mod context;
pub mod selection;
pub mod tuple;
mod value;

pub use context::{EvalContext, DEFAULT_MAX_CALL_DEPTH};
pub use value::{Closure, RuntimeValue};

use std::sync::Arc;

use crate::computation::Computation;
use crate::error::EvalError;
use crate::Environment;

/// Trait for evaluating computation nodes to runtime values.
pub trait Evaluate {
    /// Evaluate this node in the given environment.
    fn eval(&self, env: &mut Environment, ctx: &EvalContext) -> Result<RuntimeValue, EvalError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Main Dispatcher
// ═══════════════════════════════════════════════════════════════════════

impl Evaluate for Computation {
    fn eval(&self, env: &mut Environment, ctx: &EvalContext) -> Result<RuntimeValue, EvalError> {
        if ctx.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        if ctx.trace {
            tracing::trace!(node = %self, depth = env.call_depth(), "eval");
        }

        match self {
            Computation::Data { value, .. } => Ok(RuntimeValue::from(value.clone())),
            Computation::Reference { name, .. } => Ok(env.lookup(name)?.clone()),
            Computation::Lambda { parameter, body } => {
                Ok(RuntimeValue::Closure(Arc::new(Closure {
                    parameter: parameter.clone(),
                    body: body.as_ref().clone(),
                    captures: env.snapshot(),
                })))
            }
            Computation::Call { function, argument } => {
                call::eval_call(function, argument.as_deref(), env, ctx)
            }
            Computation::Tuple(elements) => tuple::eval_tuple(elements, env, ctx),
            Computation::Selection { source, selection } => {
                selection::eval_selection(source, selection, env, ctx)
            }
            Computation::Intrinsic(intrinsic) => Ok(RuntimeValue::Intrinsic(intrinsic.clone())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Convenience Functions
// ═══════════════════════════════════════════════════════════════════════

/// Evaluate a closed computation in a fresh environment.
pub fn eval_computation(comp: &Computation, ctx: &EvalContext) -> Result<RuntimeValue, EvalError> {
    let mut env = Environment::with_max_call_depth(ctx.max_call_depth);
    comp.eval(&mut env, ctx)
}

pub use call::call_value;
pub use selection::select_value;
