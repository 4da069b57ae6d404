//! Tuple construction evaluation

use crate::computation::Computation;
use crate::error::EvalError;
use crate::{Environment, EvalContext};

use super::{Evaluate, RuntimeValue};

/// Evaluate every element in order and assemble the tuple.
///
/// # Errors
///
/// Returns the first error from evaluating an element.
pub fn eval_tuple(
    elements: &[(Option<String>, Computation)],
    env: &mut Environment,
    ctx: &EvalContext,
) -> Result<RuntimeValue, EvalError> {
    let mut values = Vec::with_capacity(elements.len());
    for (name, element) in elements {
        values.push((name.clone(), element.eval(env, ctx)?));
    }
    Ok(RuntimeValue::Tuple(values))
}
