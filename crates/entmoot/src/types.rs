//! Type signatures attached to every executor value

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, Result};

/// Element type of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// UTF-8 string
    String,
}

impl DType {
    /// The canonical lowercase name (`int32`, `float32`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::String => "string",
        }
    }

    /// Whether arithmetic intrinsics accept this dtype.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DType::Int32 | DType::Int64 | DType::Float32 | DType::Float64
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structural descriptor of a value's shape.
///
/// Signatures compare structurally; two independently built signatures for
/// the same shape are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeSignature {
    /// A scalar tensor of the given dtype
    Tensor(DType),

    /// Ordered elements, each optionally named. Duplicate names are allowed.
    NamedTuple(Vec<(Option<String>, TypeSignature)>),

    /// A function, with no parameter for nullary functions
    Function {
        /// Parameter type
        parameter: Option<Box<TypeSignature>>,
        /// Result type
        result: Box<TypeSignature>,
    },
}

/// Addresses one element of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// 0-based positional index
    Index(usize),
    /// Unique element name
    Name(String),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Index(i) => write!(f, "[{}]", i),
            Selection::Name(n) => write!(f, ".{}", n),
        }
    }
}

/// Resolve a selection against ordered, optionally named elements.
///
/// Name lookup fails when zero or more than one element carries the name.
pub fn resolve_selection<T>(elements: &[(Option<String>, T)], selection: &Selection) -> Result<usize> {
    match selection {
        Selection::Index(index) => {
            if *index < elements.len() {
                Ok(*index)
            } else {
                Err(ExecutorError::invalid_argument(format!(
                    "index {} out of range for tuple of {} elements",
                    index,
                    elements.len()
                )))
            }
        }
        Selection::Name(name) => {
            let mut matches = elements
                .iter()
                .enumerate()
                .filter(|(_, (n, _))| n.as_deref() == Some(name.as_str()))
                .map(|(i, _)| i);
            match (matches.next(), matches.next()) {
                (Some(i), None) => Ok(i),
                (None, _) => Err(ExecutorError::invalid_argument(format!(
                    "no element named `{}`",
                    name
                ))),
                (Some(_), Some(_)) => Err(ExecutorError::invalid_argument(format!(
                    "ambiguous name `{}`: more than one element matches",
                    name
                ))),
            }
        }
    }
}

impl TypeSignature {
    // ═══════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════

    /// Create a tensor type
    pub fn tensor(dtype: DType) -> Self {
        TypeSignature::Tensor(dtype)
    }

    /// Create a named tuple type
    pub fn named_tuple<N: Into<String>>(elements: Vec<(Option<N>, TypeSignature)>) -> Self {
        TypeSignature::NamedTuple(
            elements
                .into_iter()
                .map(|(n, t)| (n.map(Into::into), t))
                .collect(),
        )
    }

    /// Create a tuple type without element names
    pub fn unnamed_tuple(elements: Vec<TypeSignature>) -> Self {
        TypeSignature::NamedTuple(elements.into_iter().map(|t| (None, t)).collect())
    }

    /// Create a function type
    pub fn function(parameter: Option<TypeSignature>, result: TypeSignature) -> Self {
        TypeSignature::Function {
            parameter: parameter.map(Box::new),
            result: Box::new(result),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Predicates and Accessors
    // ═══════════════════════════════════════════════════════════════════

    /// Check if this is a function type
    pub fn is_function(&self) -> bool {
        matches!(self, TypeSignature::Function { .. })
    }

    /// Check if this is a tuple type
    pub fn is_tuple(&self) -> bool {
        matches!(self, TypeSignature::NamedTuple(_))
    }

    /// Whether any part of this type is functional.
    ///
    /// Such values cannot be materialized into a payload.
    pub fn contains_function(&self) -> bool {
        match self {
            TypeSignature::Tensor(_) => false,
            TypeSignature::NamedTuple(elements) => {
                elements.iter().any(|(_, t)| t.contains_function())
            }
            TypeSignature::Function { .. } => true,
        }
    }

    /// Tuple elements, if this is a tuple type
    pub fn elements(&self) -> Option<&[(Option<String>, TypeSignature)]> {
        match self {
            TypeSignature::NamedTuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Parameter and result types, if this is a function type
    pub fn as_function(&self) -> Option<(Option<&TypeSignature>, &TypeSignature)> {
        match self {
            TypeSignature::Function { parameter, result } => {
                Some((parameter.as_deref(), result.as_ref()))
            }
            _ => None,
        }
    }

    /// Type of the element addressed by `selection`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this is not a tuple type, the index is out
    /// of range, or the name is missing or ambiguous.
    pub fn select(&self, selection: &Selection) -> Result<TypeSignature> {
        let elements = self.elements().ok_or_else(|| {
            ExecutorError::invalid_argument(format!(
                "cannot select {} from non-tuple type {}",
                selection, self
            ))
        })?;
        let index = resolve_selection(elements, selection)?;
        Ok(elements[index].1.clone())
    }

    /// Result type of calling a value of this type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if this is not a function type or the
    /// argument's presence or type does not match the parameter.
    pub fn call_result(&self, argument: Option<&TypeSignature>) -> Result<TypeSignature> {
        let (parameter, result) = self.as_function().ok_or_else(|| {
            ExecutorError::invalid_argument(format!("value of type {} is not callable", self))
        })?;
        match (parameter, argument) {
            (None, None) => {}
            (Some(p), Some(a)) => {
                if !p.is_assignable_from(a) {
                    return Err(ExecutorError::type_mismatch(p, a));
                }
            }
            (Some(p), None) => {
                return Err(ExecutorError::invalid_argument(format!(
                    "function of type {} expects an argument of type {}",
                    self, p
                )))
            }
            (None, Some(a)) => {
                return Err(ExecutorError::invalid_argument(format!(
                    "function of type {} takes no argument, got {}",
                    self, a
                )))
            }
        }
        Ok(result.clone())
    }

    /// Whether a value of type `other` may be used where `self` is expected.
    ///
    /// Tuple element names on the target must match the source's names;
    /// unnamed target elements accept any name.
    pub fn is_assignable_from(&self, other: &TypeSignature) -> bool {
        match (self, other) {
            (TypeSignature::Tensor(a), TypeSignature::Tensor(b)) => a == b,
            (TypeSignature::NamedTuple(target), TypeSignature::NamedTuple(source)) => {
                target.len() == source.len()
                    && target.iter().zip(source).all(|((tn, tt), (sn, st))| {
                        let names_ok = match tn {
                            Some(name) => sn.as_deref() == Some(name.as_str()),
                            None => true,
                        };
                        names_ok && tt.is_assignable_from(st)
                    })
            }
            (TypeSignature::Function { .. }, TypeSignature::Function { .. }) => self == other,
            _ => false,
        }
    }
}

impl From<DType> for TypeSignature {
    fn from(dtype: DType) -> Self {
        TypeSignature::Tensor(dtype)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Tensor(dtype) => write!(f, "{}", dtype),
            TypeSignature::NamedTuple(elements) => {
                write!(f, "<")?;
                for (i, (name, ty)) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match name {
                        Some(name) => write!(f, "{}={}", name, ty)?,
                        None => write!(f, "{}", ty)?,
                    }
                }
                write!(f, ">")
            }
            TypeSignature::Function { parameter, result } => match parameter {
                Some(p) => write!(f, "({} -> {})", p, result),
                None => write!(f, "( -> {})", result),
            },
        }
    }
}
