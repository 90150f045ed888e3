mod common;

use common::*;
use f90check::characteristics::{FunctionResult, Procedure};
use f90check::distinguish::{distinguishable, distinguishable_op_or_assign};
use f90check::types::DynamicType;

use std::collections::BTreeSet;

fn both_ways(a: &Procedure, b: &Procedure) -> bool {
    let forward = distinguishable(a, b);
    assert_eq!(forward, distinguishable(b, a), "distinguishability is not symmetric");
    forward
}

#[test]
fn second_argument_type_distinguishes() {
    let a = subroutine(vec![integer_dummy("i"), real_dummy("x", &[])]);
    let b = subroutine(vec![integer_dummy("i"), integer_dummy("x")]);
    assert!(both_ways(&a, &b));
}

#[test]
fn trailing_optional_is_ambiguous() {
    let a = subroutine(vec![integer_dummy("i"), optional(real_dummy("x", &[]))]);
    let b = subroutine(vec![integer_dummy("i")]);
    assert!(!both_ways(&a, &b));
}

#[test]
fn function_and_subroutine_differ() {
    let f = Procedure::function(
        FunctionResult::of_type(DynamicType::real(4)),
        vec![integer_dummy("i")],
        BTreeSet::new(),
    );
    let s = subroutine(vec![integer_dummy("i")]);
    assert!(both_ways(&f, &s));
}

#[test]
fn required_count_exceeding_arity_differs() {
    let a = subroutine(vec![integer_dummy("i"), integer_dummy("j")]);
    let b = subroutine(vec![integer_dummy("i")]);
    assert!(both_ways(&a, &b));
}

#[test]
fn rank_distinguishes() {
    let a = subroutine(vec![real_dummy("x", &[])]);
    let b = subroutine(vec![real_dummy("x", &[3])]);
    assert!(both_ways(&a, &b));
}

#[test]
fn identical_interfaces_are_ambiguous() {
    let a = subroutine(vec![real_dummy("x", &[])]);
    assert!(!both_ways(&a, &a.clone()));
}

#[test]
fn swapped_keywords_with_same_types_are_ambiguous() {
    let a = subroutine(vec![real_dummy("x", &[]), integer_dummy("n")]);
    let b = subroutine(vec![real_dummy("y", &[]), integer_dummy("m")]);
    assert!(!both_ways(&a, &b));
}

#[test]
fn operators_only_compare_positions() {
    let a = Procedure::function(
        FunctionResult::of_type(DynamicType::real(4)),
        vec![real_dummy("a", &[]), integer_dummy("b")],
        BTreeSet::new(),
    );
    let b = Procedure::function(
        FunctionResult::of_type(DynamicType::real(4)),
        vec![integer_dummy("a"), real_dummy("b", &[])],
        BTreeSet::new(),
    );
    assert!(distinguishable_op_or_assign(&a, &b));
    assert!(!distinguishable_op_or_assign(&a, &a.clone()));
}

#[test]
fn operator_arity_differs() {
    let unary = Procedure::function(
        FunctionResult::of_type(DynamicType::real(4)),
        vec![real_dummy("a", &[])],
        BTreeSet::new(),
    );
    let binary = Procedure::function(
        FunctionResult::of_type(DynamicType::real(4)),
        vec![real_dummy("a", &[]), real_dummy("b", &[])],
        BTreeSet::new(),
    );
    assert!(distinguishable_op_or_assign(&unary, &binary));
}

