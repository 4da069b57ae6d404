//! Graph-rewriting passes for use with a transforming executor
//!
//! Each pass is pure: it takes ownership of a computation and returns the
//! rewritten graph together with a flag saying whether anything changed.

use super::{Computation, Intrinsic};
use crate::types::resolve_selection;

/// Rewrite `comp` bottom-up, applying `rewrite` to every node after its
/// children have been rewritten.
pub fn transform_postorder<F>(comp: Computation, rewrite: &mut F) -> (Computation, bool)
where
    F: FnMut(Computation) -> (Computation, bool),
{
    let (comp, children_changed) = match comp {
        Computation::Lambda { parameter, body } => {
            let (body, changed) = transform_postorder(*body, rewrite);
            (
                Computation::Lambda {
                    parameter,
                    body: Box::new(body),
                },
                changed,
            )
        }
        Computation::Call { function, argument } => {
            let (function, function_changed) = transform_postorder(*function, rewrite);
            let (argument, argument_changed) = match argument {
                Some(arg) => {
                    let (arg, changed) = transform_postorder(*arg, rewrite);
                    (Some(Box::new(arg)), changed)
                }
                None => (None, false),
            };
            (
                Computation::Call {
                    function: Box::new(function),
                    argument,
                },
                function_changed || argument_changed,
            )
        }
        Computation::Tuple(elements) => {
            let mut changed = false;
            let elements = elements
                .into_iter()
                .map(|(name, element)| {
                    let (element, c) = transform_postorder(element, rewrite);
                    changed |= c;
                    (name, element)
                })
                .collect();
            (Computation::Tuple(elements), changed)
        }
        Computation::Selection { source, selection } => {
            let (source, changed) = transform_postorder(*source, rewrite);
            (Computation::select(source, selection), changed)
        }
        leaf => (leaf, false),
    };
    let (comp, changed) = rewrite(comp);
    (comp, children_changed || changed)
}

/// Whether `comp` is the identity intrinsic or a lambda of the form `x -> x`.
fn is_identity(comp: &Computation) -> bool {
    match comp {
        Computation::Intrinsic(Intrinsic::Identity(_)) => true,
        Computation::Lambda {
            parameter: Some(parameter),
            body,
        } => matches!(body.as_ref(), Computation::Reference { name, .. } if *name == parameter.name),
        _ => false,
    }
}

/// Replace every application of an identity function with its argument.
pub fn remove_identity_calls(comp: Computation) -> (Computation, bool) {
    transform_postorder(comp, &mut |node| match node {
        Computation::Call {
            function,
            argument: Some(argument),
        } if is_identity(&function) => (*argument, true),
        other => (other, false),
    })
}

/// Replace a selection from a tuple literal with the selected element.
///
/// Selections that do not resolve are left untouched; they fail at type
/// checking instead.
pub fn replace_selection_from_tuple(comp: Computation) -> (Computation, bool) {
    transform_postorder(comp, &mut |node| match node {
        Computation::Selection { source, selection } => match *source {
            Computation::Tuple(mut elements) => match resolve_selection(&elements, &selection) {
                Ok(index) => (elements.swap_remove(index).1, true),
                Err(_) => (
                    Computation::select(Computation::Tuple(elements), selection),
                    false,
                ),
            },
            other => (Computation::select(other, selection), false),
        },
        other => (other, false),
    })
}
