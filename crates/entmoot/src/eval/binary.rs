//! Arithmetic intrinsic evaluation

use crate::computation::Intrinsic;
use crate::error::EvalError;
use crate::Payload;

use super::RuntimeValue;

/// Apply an intrinsic to its (optional) argument.
///
/// Arithmetic intrinsics take a two-element tuple of scalars of the same
/// dtype. Integer arithmetic is checked; floating point follows IEEE.
pub fn apply_intrinsic(
    intrinsic: &Intrinsic,
    arg: Option<RuntimeValue>,
) -> Result<RuntimeValue, EvalError> {
    match intrinsic {
        Intrinsic::Identity(_) => arg.ok_or(EvalError::ArityMismatch {
            expected: 1,
            got: 0,
        }),
        Intrinsic::Add(_) => {
            let (left, right) = operands("add", arg)?;
            eval_add(left, right).map(RuntimeValue::Data)
        }
        Intrinsic::Subtract(_) => {
            let (left, right) = operands("subtract", arg)?;
            eval_sub(left, right).map(RuntimeValue::Data)
        }
        Intrinsic::Multiply(_) => {
            let (left, right) = operands("multiply", arg)?;
            eval_mul(left, right).map(RuntimeValue::Data)
        }
    }
}

/// Destructure the `<left,right>` argument of a binary intrinsic.
fn operands(op: &str, arg: Option<RuntimeValue>) -> Result<(Payload, Payload), EvalError> {
    let arg = arg.ok_or(EvalError::ArityMismatch {
        expected: 1,
        got: 0,
    })?;
    match arg {
        RuntimeValue::Tuple(elements) if elements.len() == 2 => {
            let mut iter = elements.into_iter().map(|(_, v)| v);
            match (iter.next(), iter.next()) {
                (Some(RuntimeValue::Data(left)), Some(RuntimeValue::Data(right))) => {
                    Ok((left, right))
                }
                (left, right) => Err(EvalError::InvalidBinaryOperands {
                    op: op.to_string(),
                    left_type: left.map_or("?", |v| v.kind_name()).to_string(),
                    right_type: right.map_or("?", |v| v.kind_name()).to_string(),
                }),
            }
        }
        other => Err(EvalError::TypeError {
            message: format!("`{}` expects a pair of operands, found {}", op, other.kind_name()),
        }),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Arithmetic Operations
// ═══════════════════════════════════════════════════════════════════════

fn eval_add(left: Payload, right: Payload) -> Result<Payload, EvalError> {
    arithmetic(
        "add",
        left,
        right,
        i32::checked_add,
        i64::checked_add,
        |a, b| a + b,
        |a, b| a + b,
    )
}

fn eval_sub(left: Payload, right: Payload) -> Result<Payload, EvalError> {
    arithmetic(
        "subtract",
        left,
        right,
        i32::checked_sub,
        i64::checked_sub,
        |a, b| a - b,
        |a, b| a - b,
    )
}

fn eval_mul(left: Payload, right: Payload) -> Result<Payload, EvalError> {
    arithmetic(
        "multiply",
        left,
        right,
        i32::checked_mul,
        i64::checked_mul,
        |a, b| a * b,
        |a, b| a * b,
    )
}

/// Dispatch a binary operator over matching numeric dtypes.
// ALLOW: one function pointer per supported dtype
#[allow(clippy::too_many_arguments)]
fn arithmetic(
    op: &str,
    left: Payload,
    right: Payload,
    int32: fn(i32, i32) -> Option<i32>,
    int64: fn(i64, i64) -> Option<i64>,
    float32: fn(f32, f32) -> f32,
    float64: fn(f64, f64) -> f64,
) -> Result<Payload, EvalError> {
    let overflow = || EvalError::IntegerOverflow { op: op.to_string() };
    match (left, right) {
        (Payload::Int32(a), Payload::Int32(b)) => int32(a, b).map(Payload::Int32).ok_or_else(overflow),
        (Payload::Int64(a), Payload::Int64(b)) => int64(a, b).map(Payload::Int64).ok_or_else(overflow),
        (Payload::Float32(a), Payload::Float32(b)) => Ok(Payload::Float32(float32(a, b))),
        (Payload::Float64(a), Payload::Float64(b)) => Ok(Payload::Float64(float64(a, b))),
        (left, right) => Err(EvalError::InvalidBinaryOperands {
            op: op.to_string(),
            left_type: left.type_signature().to_string(),
            right_type: right.type_signature().to_string(),
        }),
    }
}
