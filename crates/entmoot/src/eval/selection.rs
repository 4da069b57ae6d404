//! Selection (tuple projection) evaluation

use crate::computation::Computation;
use crate::error::EvalError;
use crate::types::{resolve_selection, Selection};
use crate::{Environment, EvalContext};

use super::{Evaluate, RuntimeValue};

/// Evaluate the source, then project the addressed element.
///
/// # Errors
///
/// Returns `InvalidSelection` for out of range indices and missing or
/// ambiguous names, `TypeError` if the source is not a tuple.
pub fn eval_selection(
    source: &Computation,
    selection: &Selection,
    env: &mut Environment,
    ctx: &EvalContext,
) -> Result<RuntimeValue, EvalError> {
    let base = source.eval(env, ctx)?;
    select_value(base, selection)
}

/// Project an element out of a runtime tuple.
pub fn select_value(base: RuntimeValue, selection: &Selection) -> Result<RuntimeValue, EvalError> {
    match base {
        RuntimeValue::Tuple(mut elements) => {
            let index = resolve_selection(&elements, selection)
                .map_err(|e| EvalError::InvalidSelection(e.message()))?;
            Ok(elements.swap_remove(index).1)
        }
        other => Err(EvalError::TypeError {
            message: format!("cannot select {} from {}", selection, other.kind_name()),
        }),
    }
}
