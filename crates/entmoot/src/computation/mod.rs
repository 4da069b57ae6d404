//! Computation graphs: the deferred work an executor embeds and calls

mod display;
pub mod transformations;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, Result};
use crate::payload::Payload;
use crate::types::{DType, Selection, TypeSignature};

/// Built-in operators a backend knows how to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intrinsic {
    /// `<T,T> -> T` addition over a numeric dtype
    Add(DType),
    /// `<T,T> -> T` subtraction over a numeric dtype
    Subtract(DType),
    /// `<T,T> -> T` multiplication over a numeric dtype
    Multiply(DType),
    /// `T -> T`
    Identity(TypeSignature),
}

impl Intrinsic {
    /// Name used in the compact notation
    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::Add(_) => "add",
            Intrinsic::Subtract(_) => "subtract",
            Intrinsic::Multiply(_) => "multiply",
            Intrinsic::Identity(_) => "identity",
        }
    }

    /// Function type of this intrinsic.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for arithmetic over a non-numeric dtype.
    pub fn type_signature(&self) -> Result<TypeSignature> {
        match self {
            Intrinsic::Add(dtype) | Intrinsic::Subtract(dtype) | Intrinsic::Multiply(dtype) => {
                if !dtype.is_numeric() {
                    return Err(ExecutorError::invalid_argument(format!(
                        "{} is not defined over {}",
                        self.name(),
                        dtype
                    )));
                }
                let operand = TypeSignature::Tensor(*dtype);
                Ok(TypeSignature::function(
                    Some(TypeSignature::unnamed_tuple(vec![
                        operand.clone(),
                        operand.clone(),
                    ])),
                    operand,
                ))
            }
            Intrinsic::Identity(ty) => Ok(TypeSignature::function(Some(ty.clone()), ty.clone())),
        }
    }
}

/// The named, typed parameter of a lambda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name the body refers to
    pub name: String,
    /// Declared type
    pub type_signature: TypeSignature,
}

/// A computation graph.
///
/// Computations are immutable trees. Executors treat them as opaque beyond
/// their type signature; only a backend looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Computation {
    /// Embedded constant data
    Data {
        /// The constant
        value: Payload,
        /// Its declared type
        type_signature: TypeSignature,
    },

    /// Reference to a lambda parameter in scope
    Reference {
        /// Referenced name
        name: String,
        /// Type of the referenced binding
        type_signature: TypeSignature,
    },

    /// Function abstraction, nullary when `parameter` is `None`
    Lambda {
        /// Optional parameter
        parameter: Option<Parameter>,
        /// Function body
        body: Box<Computation>,
    },

    /// Function application
    Call {
        /// Callee
        function: Box<Computation>,
        /// Optional argument
        argument: Option<Box<Computation>>,
    },

    /// Tuple construction
    Tuple(Vec<(Option<String>, Computation)>),

    /// Tuple projection
    Selection {
        /// Tuple-typed source
        source: Box<Computation>,
        /// Element address
        selection: Selection,
    },

    /// Built-in operator
    Intrinsic(Intrinsic),
}

impl Computation {
    // ═══════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════

    /// Embed a payload, typed by its own signature
    pub fn literal(value: impl Into<Payload>) -> Self {
        let value = value.into();
        let type_signature = value.type_signature();
        Computation::Data {
            value,
            type_signature,
        }
    }

    /// Reference a bound name
    pub fn reference(name: impl Into<String>, type_signature: TypeSignature) -> Self {
        Computation::Reference {
            name: name.into(),
            type_signature,
        }
    }

    /// Create a unary lambda
    pub fn lambda(
        name: impl Into<String>,
        type_signature: TypeSignature,
        body: Computation,
    ) -> Self {
        Computation::Lambda {
            parameter: Some(Parameter {
                name: name.into(),
                type_signature,
            }),
            body: Box::new(body),
        }
    }

    /// Create a nullary lambda
    pub fn nullary(body: Computation) -> Self {
        Computation::Lambda {
            parameter: None,
            body: Box::new(body),
        }
    }

    /// Apply `function` to an optional argument
    pub fn call(function: Computation, argument: Option<Computation>) -> Self {
        Computation::Call {
            function: Box::new(function),
            argument: argument.map(Box::new),
        }
    }

    /// Build a tuple
    pub fn tuple<N: Into<String>>(elements: Vec<(Option<N>, Computation)>) -> Self {
        Computation::Tuple(
            elements
                .into_iter()
                .map(|(n, c)| (n.map(Into::into), c))
                .collect(),
        )
    }

    /// Build a tuple without element names
    pub fn unnamed_tuple(elements: Vec<Computation>) -> Self {
        Computation::Tuple(elements.into_iter().map(|c| (None, c)).collect())
    }

    /// Project an element out of `source`
    pub fn select(source: Computation, selection: Selection) -> Self {
        Computation::Selection {
            source: Box::new(source),
            selection,
        }
    }

    /// Wrap an intrinsic
    pub fn intrinsic(intrinsic: Intrinsic) -> Self {
        Computation::Intrinsic(intrinsic)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Typing
    // ═══════════════════════════════════════════════════════════════════

    /// Infer the type signature of this computation.
    ///
    /// References resolve against the parameters of enclosing lambdas; the
    /// innermost binding of a name wins.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` or `TypeMismatch` for ill-typed graphs:
    /// constants that do not match their declared type, unbound references,
    /// references whose type disagrees with their binding, calls of
    /// non-functions, mismatched arguments, and bad selections.
    pub fn type_signature(&self) -> Result<TypeSignature> {
        self.type_in(&mut Vec::new())
    }

    fn type_in<'a>(&'a self, scope: &mut Vec<&'a Parameter>) -> Result<TypeSignature> {
        match self {
            Computation::Data {
                value,
                type_signature,
            } => {
                if value.conforms_to(type_signature) {
                    Ok(type_signature.clone())
                } else {
                    Err(ExecutorError::type_mismatch(
                        type_signature,
                        value.type_signature(),
                    ))
                }
            }
            Computation::Reference {
                name,
                type_signature,
            } => match scope.iter().rev().find(|p| p.name == *name) {
                Some(bound) if bound.type_signature == *type_signature => {
                    Ok(type_signature.clone())
                }
                Some(bound) => Err(ExecutorError::type_mismatch(
                    &bound.type_signature,
                    type_signature,
                )),
                None => Err(ExecutorError::invalid_argument(format!(
                    "unbound reference `{}`",
                    name
                ))),
            },
            Computation::Lambda { parameter, body } => {
                if let Some(p) = parameter {
                    scope.push(p);
                }
                let result = body.type_in(scope);
                if parameter.is_some() {
                    scope.pop();
                }
                Ok(TypeSignature::function(
                    parameter.as_ref().map(|p| p.type_signature.clone()),
                    result?,
                ))
            }
            Computation::Call { function, argument } => {
                let argument_type = match argument {
                    Some(arg) => Some(arg.type_in(scope)?),
                    None => None,
                };
                function
                    .type_in(scope)?
                    .call_result(argument_type.as_ref())
            }
            Computation::Tuple(elements) => Ok(TypeSignature::NamedTuple(
                elements
                    .iter()
                    .map(|(n, c)| Ok((n.clone(), c.type_in(scope)?)))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Computation::Selection { source, selection } => {
                source.type_in(scope)?.select(selection)
            }
            Computation::Intrinsic(intrinsic) => intrinsic.type_signature(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Boundary
    // ═══════════════════════════════════════════════════════════════════

    /// Serialize to the byte form exchanged with other components.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if serialization fails.
    pub fn to_proto(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| ExecutorError::Internal(format!("cannot serialize computation: {}", e)))
    }

    /// Parse the byte form produced by [`Computation::to_proto`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed bytes.
    pub fn from_proto(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ExecutorError::invalid_argument(format!("malformed computation: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> TypeSignature {
        DType::Int32.into()
    }

    /// `x -> add(<x,1>)`
    fn add_one() -> Computation {
        Computation::lambda(
            "x",
            int32(),
            Computation::call(
                Computation::intrinsic(Intrinsic::Add(DType::Int32)),
                Some(Computation::unnamed_tuple(vec![
                    Computation::reference("x", int32()),
                    Computation::literal(1),
                ])),
            ),
        )
    }

    #[test]
    fn test_lambda_type() {
        assert_eq!(
            add_one().type_signature().unwrap(),
            TypeSignature::function(Some(int32()), int32())
        );
    }

    #[test]
    fn test_call_type_checks_argument() {
        let ok = Computation::call(add_one(), Some(Computation::literal(10)));
        assert_eq!(ok.type_signature().unwrap(), int32());

        let bad = Computation::call(add_one(), Some(Computation::literal(1.0f32)));
        assert!(matches!(
            bad.type_signature(),
            Err(ExecutorError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_call_of_non_function() {
        let bad = Computation::call(Computation::literal(3), None);
        assert!(matches!(
            bad.type_signature(),
            Err(ExecutorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_arithmetic_over_strings_rejected() {
        assert!(Intrinsic::Add(DType::String).type_signature().is_err());
    }

    #[test]
    fn test_data_must_match_declared_type() {
        let bad = Computation::Data {
            value: Payload::from(1),
            type_signature: DType::Float64.into(),
        };
        assert!(bad.type_signature().is_err());
    }

    #[test]
    fn test_reference_must_match_parameter_type() {
        let bad = Computation::lambda(
            "x",
            int32(),
            Computation::reference("x", DType::Float32.into()),
        );
        assert_eq!(
            bad.type_signature().unwrap_err(),
            ExecutorError::type_mismatch(int32(), TypeSignature::from(DType::Float32))
        );
    }

    #[test]
    fn test_unbound_reference_rejected() {
        let bad = Computation::lambda("x", int32(), Computation::reference("y", int32()));
        assert!(matches!(
            bad.type_signature(),
            Err(ExecutorError::InvalidArgument(_))
        ));
        assert!(Computation::reference("x", int32()).type_signature().is_err());
    }

    #[test]
    fn test_inner_parameter_shadows_outer() {
        // x:int32 -> (x:float32 -> x)
        let comp = Computation::lambda(
            "x",
            int32(),
            Computation::lambda(
                "x",
                DType::Float32.into(),
                Computation::reference("x", DType::Float32.into()),
            ),
        );
        assert_eq!(comp.type_signature().unwrap().to_string(), "(int32 -> (float32 -> float32))");

        // the outer binding is visible again once the inner lambda closes
        let outer = Computation::lambda(
            "x",
            int32(),
            Computation::unnamed_tuple(vec![
                Computation::nullary(Computation::literal(1)),
                Computation::reference("x", int32()),
            ]),
        );
        assert!(outer.type_signature().is_ok());
    }

    #[test]
    fn test_proto_boundary() {
        let comp = add_one();
        let bytes = comp.to_proto().unwrap();
        assert_eq!(Computation::from_proto(&bytes).unwrap(), comp);
        assert!(Computation::from_proto(b"not json").is_err());
    }
}
