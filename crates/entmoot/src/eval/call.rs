//! Function call evaluation

use crate::computation::Computation;
use crate::error::EvalError;
use crate::{Environment, EvalContext};

use super::{binary, Closure, Evaluate, RuntimeValue};

/// Evaluate a call node: the callee, then the argument, then the call.
pub fn eval_call(
    function: &Computation,
    argument: Option<&Computation>,
    env: &mut Environment,
    ctx: &EvalContext,
) -> Result<RuntimeValue, EvalError> {
    let func = function.eval(env, ctx)?;
    let arg = argument.map(|a| a.eval(env, ctx)).transpose()?;
    call_value(func, arg, env, ctx)
}

/// Call a runtime value as a function.
///
/// # Errors
///
/// Returns `TypeError` if the value is not callable.
/// Returns `ArityMismatch` if argument presence doesn't match the parameter.
pub fn call_value(
    func: RuntimeValue,
    arg: Option<RuntimeValue>,
    env: &mut Environment,
    ctx: &EvalContext,
) -> Result<RuntimeValue, EvalError> {
    match func {
        RuntimeValue::Closure(c) => call_closure(&c, arg, env, ctx),
        RuntimeValue::Intrinsic(i) => binary::apply_intrinsic(&i, arg),
        other => Err(EvalError::TypeError {
            message: format!("expected function, found {}", other.kind_name()),
        }),
    }
}

/// Call a closure.
fn call_closure(
    closure: &Closure,
    arg: Option<RuntimeValue>,
    env: &mut Environment,
    ctx: &EvalContext,
) -> Result<RuntimeValue, EvalError> {
    let binding = match (&closure.parameter, arg) {
        (Some(param), Some(arg)) => Some((param.name.clone(), arg)),
        (None, None) => None,
        (param, arg) => {
            return Err(EvalError::ArityMismatch {
                expected: usize::from(param.is_some()),
                got: usize::from(arg.is_some()),
            })
        }
    };

    let mut frame = env.enter_frame()?;

    // Captures first so the parameter shadows them
    for (name, value) in closure.captures.iter() {
        frame.define(name.clone(), value.clone());
    }
    if let Some((name, arg)) = binding {
        frame.define(name, arg);
    }

    closure.body.eval(&mut frame, ctx)
}
