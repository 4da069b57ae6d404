//! Runtime values produced while evaluating a computation

use std::sync::Arc;

use crate::computation::{Computation, Intrinsic, Parameter};
use crate::error::EvalError;
use crate::Payload;

/// A value inside the evaluator.
///
/// Unlike a [`Payload`], a runtime value may be (or contain) a function.
/// Tuple payloads are lifted into [`RuntimeValue::Tuple`] on entry so that
/// selection works uniformly over data and functions.
#[derive(Debug, Clone)]
pub enum RuntimeValue {
    /// Scalar data
    Data(Payload),

    /// Ordered elements, each optionally named
    Tuple(Vec<(Option<String>, RuntimeValue)>),

    /// Lambda with captured environment
    Closure(Arc<Closure>),

    /// Built-in operator
    Intrinsic(Intrinsic),
}

/// A lambda closed over the bindings visible where it was evaluated.
#[derive(Debug)]
pub struct Closure {
    /// Optional parameter
    pub parameter: Option<Parameter>,

    /// The lambda body
    pub body: Computation,

    /// Captured variables (name -> value)
    pub captures: Vec<(String, RuntimeValue)>,
}

impl RuntimeValue {
    /// Human-readable kind for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            RuntimeValue::Data(_) => "data",
            RuntimeValue::Tuple(_) => "tuple",
            RuntimeValue::Closure(_) => "closure",
            RuntimeValue::Intrinsic(_) => "intrinsic",
        }
    }

    /// Check if value can be called
    pub fn is_callable(&self) -> bool {
        matches!(self, RuntimeValue::Closure(_) | RuntimeValue::Intrinsic(_))
    }

    /// Borrow scalar data
    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            RuntimeValue::Data(p) => Some(p),
            _ => None,
        }
    }

    /// Lower back to a payload.
    ///
    /// # Errors
    ///
    /// Returns `NotMaterializable` if any part of the value is a function.
    pub fn into_payload(self) -> Result<Payload, EvalError> {
        match self {
            RuntimeValue::Data(p) => Ok(p),
            RuntimeValue::Tuple(elements) => Ok(Payload::Tuple(
                elements
                    .into_iter()
                    .map(|(n, v)| Ok((n, v.into_payload()?)))
                    .collect::<Result<Vec<_>, EvalError>>()?,
            )),
            other => Err(EvalError::NotMaterializable {
                kind: other.kind_name().to_string(),
            }),
        }
    }
}

impl From<Payload> for RuntimeValue {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Tuple(elements) => RuntimeValue::Tuple(
                elements
                    .into_iter()
                    .map(|(n, p)| (n, RuntimeValue::from(p)))
                    .collect(),
            ),
            scalar => RuntimeValue::Data(scalar),
        }
    }
}
