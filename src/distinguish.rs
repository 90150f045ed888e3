//! Distinguishability of specific procedures in a generic set (15.4.3.4.5).
//!
//! Two specifics may share a generic name only when no reference could be
//! resolved to both of them.

use log::trace;

use crate::characteristics::{
    DummyArgument, DummyDataObject, DummyDataObjectAttr, DummyKind, DummyProcedure, Procedure,
    TypeAndShape, TypeAndShapeAttr,
};
use crate::types::Intent;

/// For a generic name: true when no actual argument list can match both
/// `proc1` and `proc2`.
pub fn distinguishable(proc1: &Procedure, proc2: &Procedure) -> bool {
    let result = distinguishable_procedures(proc1, proc2);
    trace!("generic specifics distinguishable: {}", result);
    result
}

/// For a defined operator or assignment, where arguments are positional
/// and the arity is fixed.
pub fn distinguishable_op_or_assign(proc1: &Procedure, proc2: &Procedure) -> bool {
    let args1 = &proc1.dummy_arguments;
    let args2 = &proc2.dummy_arguments;
    let result = args1.len() != args2.len()
        || args1
            .iter()
            .zip(args2)
            .any(|(x, y)| distinguishable_dummies(x, y));
    trace!("operator specifics distinguishable: {}", result);
    result
}

fn distinguishable_procedures(proc1: &Procedure, proc2: &Procedure) -> bool {
    // (1) a function and a subroutine
    if proc1.is_function() != proc2.is_function() {
        return true;
    }
    let args1 = &proc1.dummy_arguments;
    let args2 = &proc2.dummy_arguments;
    // (2) more required arguments than the other has arguments at all
    if required_count(args1) > args2.len() || required_count(args2) > args1.len() {
        return true;
    }
    if distinguished_by_counts(args1, args2) || distinguished_by_counts(args2, args1) {
        return true;
    }
    // (3) distinguishable passed-object dummies
    if let (Some(pass1), Some(pass2)) = (passed_object(args1), passed_object(args2)) {
        if distinguishable_dummies(pass1, pass2) {
            return true;
        }
    }
    // (4) a dummy that disambiguates by position no later than one that
    // disambiguates by keyword
    rule4(args1, args2) || rule4(args2, args1)
}

fn required_count(args: &[DummyArgument]) -> usize {
    args.iter().filter(|arg| !arg.is_optional()).count()
}

fn passed_object(args: &[DummyArgument]) -> Option<&DummyArgument> {
    args.iter().find(|arg| arg.pass)
}

/// Does one procedure have more required dummy data objects TKR compatible
/// with some argument than the other has compatible dummies in total? The
/// same for dummy procedures.
fn distinguished_by_counts(args1: &[DummyArgument], args2: &[DummyArgument]) -> bool {
    for x in args1.iter().filter(|arg| !arg.is_optional() && !arg.pass) {
        let Some(object) = x.as_data_object() else {
            continue;
        };
        let required = args1
            .iter()
            .filter(|y| !y.is_optional() && !y.pass)
            .filter_map(DummyArgument::as_data_object)
            .filter(|y| tkr_compatible(object, y))
            .count();
        let available = args2
            .iter()
            .filter(|y| !y.pass)
            .filter_map(DummyArgument::as_data_object)
            .filter(|y| !distinguishable_objects(object, y))
            .count();
        if required > available {
            return true;
        }
    }
    let required_procedures = args1
        .iter()
        .filter(|arg| !arg.is_optional() && arg.as_procedure().is_some())
        .count();
    let procedures = args2
        .iter()
        .filter(|arg| arg.as_procedure().is_some())
        .count();
    required_procedures > procedures
}

fn rule4(args1: &[DummyArgument], args2: &[DummyArgument]) -> bool {
    let Some(position) = first_to_distinguish_by_position(args1, args2) else {
        return false;
    };
    last_to_distinguish_by_name(args1, args2).map_or(false, |name| position <= name)
}

/// The first required, non-passed dummy of `args1` whose effective position
/// in `args2` is missing or holds a distinguishable dummy.
fn first_to_distinguish_by_position(
    args1: &[DummyArgument],
    args2: &[DummyArgument],
) -> Option<usize> {
    let others: Vec<&DummyArgument> = args2.iter().filter(|arg| !arg.pass).collect();
    args1
        .iter()
        .enumerate()
        .filter(|(_, arg)| !arg.pass)
        .enumerate()
        .find(|(effective, (_, arg))| {
            !arg.is_optional()
                && others
                    .get(*effective)
                    .map_or(true, |other| distinguishable_dummies(arg, other))
        })
        .map(|(_, (index, _))| index)
}

/// The last required, non-passed dummy of `args1` whose name in `args2` is
/// missing or names a distinguishable dummy.
fn last_to_distinguish_by_name(args1: &[DummyArgument], args2: &[DummyArgument]) -> Option<usize> {
    args1
        .iter()
        .enumerate()
        .rev()
        .find(|(_, arg)| {
            !arg.pass
                && !arg.is_optional()
                && args2
                    .iter()
                    .find(|other| !arg.name.is_empty() && other.name == arg.name)
                    .map_or(true, |other| distinguishable_dummies(arg, other))
        })
        .map(|(index, _)| index)
}

/// 15.4.3.4.5 (3): are these two dummy arguments distinguishable?
fn distinguishable_dummies(x: &DummyArgument, y: &DummyArgument) -> bool {
    match (&x.kind, &y.kind) {
        (DummyKind::DataObject(x), DummyKind::DataObject(y)) => distinguishable_objects(x, y),
        (DummyKind::Procedure(x), DummyKind::Procedure(y)) => distinguishable_procedure_dummies(x, y),
        (DummyKind::AlternateReturn(_), DummyKind::AlternateReturn(_)) => false,
        _ => true,
    }
}

fn distinguishable_objects(x: &DummyDataObject, y: &DummyDataObject) -> bool {
    if !tkr_compatible(x, y) && !tkr_compatible(y, x) {
        return true;
    }
    let pointer_not_in = |object: &DummyDataObject| {
        object.has(DummyDataObjectAttr::Pointer) && object.intent != Intent::In
    };
    (x.has(DummyDataObjectAttr::Allocatable) && pointer_not_in(y))
        || (y.has(DummyDataObjectAttr::Allocatable) && pointer_not_in(x))
}

fn distinguishable_procedure_dummies(x: &DummyProcedure, y: &DummyProcedure) -> bool {
    let x_result = x.procedure.function_result.as_ref();
    let y_result = y.procedure.function_result.as_ref();
    match (x_result, y_result) {
        (Some(x_result), Some(y_result)) => {
            match (x_result.type_and_shape(), y_result.type_and_shape()) {
                (Some(x_shape), Some(y_shape)) => {
                    !tkr_compatible_shapes(x_shape, y_shape)
                        && !tkr_compatible_shapes(y_shape, x_shape)
                }
                _ => false,
            }
        }
        // A function with nonzero rank against something not known to be
        // a function.
        (Some(result), None) if !y.procedure.is_function() => {
            result.type_and_shape().map_or(false, |shape| shape.rank() > 0)
        }
        (None, Some(result)) if !x.procedure.is_function() => {
            result.type_and_shape().map_or(false, |shape| shape.rank() > 0)
        }
        _ => false,
    }
}

/// Type, kind and rank compatibility of `y` with `x`.
fn tkr_compatible(x: &DummyDataObject, y: &DummyDataObject) -> bool {
    tkr_compatible_shapes(&x.type_and_shape, &y.type_and_shape)
}

fn tkr_compatible_shapes(x: &TypeAndShape, y: &TypeAndShape) -> bool {
    x.dynamic_type().is_tk_compatible_with(y.dynamic_type())
        && (x.rank() == y.rank()
            || x.has(TypeAndShapeAttr::AssumedRank)
            || y.has(TypeAndShapeAttr::AssumedRank))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DynamicType;
    use std::collections::BTreeSet;

    fn arg(name: &str, dynamic_type: DynamicType) -> DummyArgument {
        DummyArgument::data_object(name, DummyDataObject::new(TypeAndShape::new(dynamic_type)))
    }

    fn sub(args: Vec<DummyArgument>) -> Procedure {
        Procedure::subroutine(args, BTreeSet::new())
    }

    #[test]
    fn allocatable_and_pointer_are_distinguishable() {
        let mut a = arg("x", DynamicType::real(4));
        let mut b = arg("x", DynamicType::real(4));
        if let DummyKind::DataObject(object) = &mut a.kind {
            object.attrs.insert(DummyDataObjectAttr::Allocatable);
        }
        if let DummyKind::DataObject(object) = &mut b.kind {
            object.attrs.insert(DummyDataObjectAttr::Pointer);
        }
        assert!(distinguishable(&sub(vec![a.clone()]), &sub(vec![b.clone()])));
        if let DummyKind::DataObject(object) = &mut b.kind {
            object.intent = Intent::In;
        }
        assert!(!distinguishable(&sub(vec![a]), &sub(vec![b])));
    }

    #[test]
    fn keyword_order_matters() {
        // s1(a: integer, b: real) and s2(b: integer, a: real): a call
        // s(1, 2.0) is unambiguous, but s(b=1, a=2.0) must also be.
        let p1 = sub(vec![arg("a", DynamicType::integer(4)), arg("b", DynamicType::real(4))]);
        let p2 = sub(vec![arg("b", DynamicType::integer(4)), arg("a", DynamicType::real(4))]);
        assert!(!distinguishable(&p1, &p2));
        assert!(!distinguishable(&p2, &p1));
    }
}
