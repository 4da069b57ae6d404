//! Payload implementations: constructors, extractors, typing, From traits

use super::*;
use crate::error::{ExecutorError, Result};
use crate::types::{resolve_selection, DType, Selection, TypeSignature};

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Payload {
    /// Create a string payload
    pub fn string(s: impl Into<String>) -> Self {
        Payload::String(s.into())
    }

    /// Create a tuple payload from named or positional elements
    pub fn tuple<N: Into<String>>(elements: Vec<(Option<N>, Payload)>) -> Self {
        Payload::Tuple(
            elements
                .into_iter()
                .map(|(n, p)| (n.map(Into::into), p))
                .collect(),
        )
    }

    /// Create a tuple payload with every element named
    pub fn named<N: Into<String>>(elements: Vec<(N, Payload)>) -> Self {
        Payload::Tuple(
            elements
                .into_iter()
                .map(|(n, p)| (Some(n.into()), p))
                .collect(),
        )
    }

    /// Create a tuple payload without element names
    pub fn unnamed(elements: Vec<Payload>) -> Self {
        Payload::Tuple(elements.into_iter().map(|p| (None, p)).collect())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Typing
    // ═══════════════════════════════════════════════════════════════════

    /// Dtype of a scalar payload, `None` for tuples
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Payload::Bool(_) => Some(DType::Bool),
            Payload::Int32(_) => Some(DType::Int32),
            Payload::Int64(_) => Some(DType::Int64),
            Payload::Float32(_) => Some(DType::Float32),
            Payload::Float64(_) => Some(DType::Float64),
            Payload::String(_) => Some(DType::String),
            Payload::Tuple(_) => None,
        }
    }

    /// The type signature this payload carries on its own.
    pub fn type_signature(&self) -> TypeSignature {
        match self {
            Payload::Tuple(elements) => TypeSignature::NamedTuple(
                elements
                    .iter()
                    .map(|(n, p)| (n.clone(), p.type_signature()))
                    .collect(),
            ),
            Payload::Bool(_) => DType::Bool.into(),
            Payload::Int32(_) => DType::Int32.into(),
            Payload::Int64(_) => DType::Int64.into(),
            Payload::Float32(_) => DType::Float32.into(),
            Payload::Float64(_) => DType::Float64.into(),
            Payload::String(_) => DType::String.into(),
        }
    }

    /// Whether this payload is a valid instance of `type_signature`.
    pub fn conforms_to(&self, type_signature: &TypeSignature) -> bool {
        type_signature.is_assignable_from(&self.type_signature())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Extractors (return Option for safe access)
    // ═══════════════════════════════════════════════════════════════════

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as i64 (widens int32)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Payload::Int32(n) => Some(*n as i64),
            Payload::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract as f64 (widens float32)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Payload::Float32(n) => Some(*n as f64),
            Payload::Float64(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract tuple elements
    pub fn elements(&self) -> Option<&[(Option<String>, Payload)]> {
        match self {
            Payload::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Project one element out of a tuple payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for non-tuples, out of range indices, and
    /// missing or ambiguous names.
    pub fn select(&self, selection: &Selection) -> Result<Payload> {
        let elements = self.elements().ok_or_else(|| {
            ExecutorError::invalid_argument(format!(
                "cannot select {} from non-tuple payload {}",
                selection, self
            ))
        })?;
        let index = resolve_selection(elements, selection)?;
        Ok(elements[index].1.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Trait Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

impl From<i32> for Payload {
    fn from(n: i32) -> Self {
        Payload::Int32(n)
    }
}

impl From<i64> for Payload {
    fn from(n: i64) -> Self {
        Payload::Int64(n)
    }
}

impl From<f32> for Payload {
    fn from(n: f32) -> Self {
        Payload::Float32(n)
    }
}

impl From<f64> for Payload {
    fn from(n: f64) -> Self {
        Payload::Float64(n)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::String(s)
    }
}
