mod common;

use common::*;
use f90check::check_call::{check_arguments, check_explicit_interface, check_interface_for_generic};
use f90check::characteristics::{DummyDataObjectAttr, ProcedureAttr};
use f90check::expr::{ActualArgument, Expr};
use f90check::fold::FoldingContext;
use f90check::intrinsics::IntrinsicProcTable;
use f90check::messages::{Messages, Severity};
use f90check::symbol::{
    Attr, DeclTypeSpec, Details, ObjectEntityDetails, ScopeKind, SymbolTable,
};
use f90check::types::TypeCategory;

fn texts(messages: &Messages) -> Vec<String> {
    messages.iter().map(|m| m.text.clone()).collect()
}

#[test]
fn matching_extent_is_clean() {
    let mut f = Fixture::new();
    let a = f.variable("a", TypeCategory::Real, &[10]);
    let proc = subroutine(vec![real_dummy("x", &[10])]);
    let mut actuals = vec![actual(a)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
}

#[test]
fn shorter_actual_reports_one_shape_mismatch() {
    let mut f = Fixture::new();
    let a = f.variable("a", TypeCategory::Real, &[5]);
    let proc = subroutine(vec![real_dummy("x", &[10])]);
    let mut actuals = vec![actual(a)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Dimension 1 of dummy argument 'x=' has extent 10, but actual argument has extent 5"]
    );
    assert!(messages.any_fatal());
}

#[test]
fn type_mismatch_names_both_types() {
    let mut f = Fixture::new();
    let r = f.variable("r", TypeCategory::Real, &[]);
    let proc = subroutine(vec![integer_dummy("i")]);
    let mut actuals = vec![actual(r)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Actual argument type 'REAL(4)' is not compatible with dummy argument 'i=' type 'INTEGER(4)'"]
    );
}

#[test]
fn array_to_non_elemental_scalar_is_a_rank_error() {
    let mut f = Fixture::new();
    let a = f.variable("a", TypeCategory::Real, &[5]);
    let proc = subroutine(vec![real_dummy("x", &[])]);
    let mut actuals = vec![actual(a)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Rank of dummy argument 'x=' is 0, but actual argument has rank 1"]
    );
}

#[test]
fn elemental_reference_broadcasts_scalars() {
    let mut f = Fixture::new();
    let a = f.variable("a", TypeCategory::Real, &[5]);
    let s = f.variable("s", TypeCategory::Real, &[]);
    let proc = elemental_subroutine(vec![real_dummy("x", &[]), real_dummy("y", &[])]);
    let mut actuals = vec![actual(a), actual(s)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
}

#[test]
fn elemental_array_actuals_must_conform() {
    let mut f = Fixture::new();
    let a = f.variable("a", TypeCategory::Real, &[5]);
    let b = f.variable("b", TypeCategory::Real, &[6]);
    let proc = elemental_subroutine(vec![real_dummy("x", &[]), real_dummy("y", &[])]);
    let mut actuals = vec![actual(a), actual(b)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.any_fatal());
}

#[test]
fn omitted_optional_is_accepted() {
    let mut f = Fixture::new();
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let proc = subroutine(vec![integer_dummy("i"), optional(real_dummy("x", &[]))]);
    let mut actuals = vec![actual(n)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
    assert_eq!(actuals.len(), 2);
    assert!(actuals[1].is_none());
}

#[test]
fn missing_required_argument_is_reported() {
    let mut f = Fixture::new();
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let proc = subroutine(vec![integer_dummy("i"), real_dummy("x", &[])]);
    let mut actuals = vec![actual(n)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Dummy argument 'x=' (#2) is not OPTIONAL and is not associated with an actual argument in this procedure reference"]
    );
}

#[test]
fn keywords_are_moved_into_dummy_order() {
    let mut f = Fixture::new();
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let r = f.variable("r", TypeCategory::Real, &[]);
    let proc = subroutine(vec![integer_dummy("i"), real_dummy("x", &[])]);
    let mut actuals = vec![
        Some(ActualArgument::new(Expr::symbol(r)).with_keyword("x")),
        Some(ActualArgument::new(Expr::symbol(n)).with_keyword("i")),
    ];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
    let first = actuals[0].as_ref().and_then(|a| a.unwrap_expr()).and_then(Expr::last_symbol);
    assert_eq!(first, Some(n));
}

#[test]
fn unknown_keyword_is_reported() {
    let mut f = Fixture::new();
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let proc = subroutine(vec![integer_dummy("i")]);
    let mut actuals = vec![
        actual(n),
        Some(ActualArgument::new(Expr::int(1)).with_keyword("d")),
    ];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(texts(&messages)
        .iter()
        .any(|t| t == "Argument keyword 'd=' is not recognized for this procedure reference"));
}

#[test]
fn too_many_arguments_stop_checking() {
    let mut f = Fixture::new();
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let proc = subroutine(vec![integer_dummy("i")]);
    let mut actuals = vec![actual(n), actual(n)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Too many actual arguments (2) passed to procedure that expects only 1"]
    );
}

#[test]
fn intent_out_needs_a_variable() {
    let f = Fixture::new();
    let mut dummy = real_dummy("x", &[]);
    if let f90check::characteristics::DummyKind::DataObject(object) = &mut dummy.kind {
        object.intent = f90check::types::Intent::Out;
    }
    let proc = subroutine(vec![dummy]);
    let real_literal = f90check::expr::Literal::Real {
        text: "1.0".to_string(),
        kind: 4,
    };
    let mut actuals = vec![Some(ActualArgument::new(Expr::Literal(real_literal)))];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(texts(&messages)
        .iter()
        .any(|t| t.starts_with("Actual argument associated with INTENT(OUT) dummy argument 'x=' must be definable")));
}

#[test]
fn generic_candidates_ignore_warnings() {
    let mut f = Fixture::new();
    let r = f.variable("r", TypeCategory::Real, &[]);
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let proc = subroutine(vec![with_attr(real_dummy("x", &[]), DummyDataObjectAttr::Target)]);
    assert!(check_interface_for_generic(&proc, &vec![actual(r)], &f.ctx()));
    assert!(!check_interface_for_generic(&proc, &vec![actual(n)], &f.ctx()));
}

#[test]
fn implicit_interface_rejects_keywords() {
    let mut f = Fixture::new();
    let n = f.variable("n", TypeCategory::Integer, &[]);
    let proc = f90check::characteristics::Procedure::subroutine(
        Vec::new(),
        [ProcedureAttr::ImplicitInterface].into_iter().collect(),
    );
    let mut actuals = vec![Some(ActualArgument::new(Expr::symbol(n)).with_keyword("i"))];
    let mut messages = Messages::new();
    check_arguments(&proc, &mut actuals, &f.ctx(), f.scope, false, &mut messages);
    assert_eq!(
        texts(&messages),
        vec!["Keyword 'i=' may not appear in a reference to a procedure with an implicit interface"]
    );
}

#[test]
fn treating_external_as_implicit_downgrades_mismatches() {
    let mut f = Fixture::new();
    let a = f.variable("a", TypeCategory::Real, &[5]);
    let proc = subroutine(vec![real_dummy("x", &[10])]);
    let mut actuals = vec![actual(a)];
    let mut messages = Messages::new();
    check_arguments(&proc, &mut actuals, &f.ctx(), f.scope, true, &mut messages);
    let warning = messages.iter().next().expect("a warning");
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.attachments.len(), 1);
    assert!(!messages.any_fatal());
}

#[test]
fn implicit_interface_eligibility_per_attribute() {
    assert!(real_dummy("x", &[3]).can_be_passed_via_implicit_interface());
    for attr in [
        DummyDataObjectAttr::Allocatable,
        DummyDataObjectAttr::Asynchronous,
        DummyDataObjectAttr::Optional,
        DummyDataObjectAttr::Pointer,
        DummyDataObjectAttr::Target,
        DummyDataObjectAttr::Value,
        DummyDataObjectAttr::Volatile,
    ] {
        let dummy = with_attr(real_dummy("x", &[]), attr);
        assert!(!dummy.can_be_passed_via_implicit_interface(), "{:?}", attr);
        let proc = subroutine(vec![dummy]);
        assert!(!proc.can_be_called_via_implicit_interface(), "{:?}", attr);
    }
    assert!(subroutine(vec![real_dummy("x", &[])]).can_be_called_via_implicit_interface());
}

#[test]
fn alternate_return_needs_a_label() {
    let f = Fixture::new();
    let proc = subroutine(vec![
        f90check::characteristics::DummyArgument::alternate_return(),
    ]);
    let mut actuals = vec![Some(ActualArgument::alternate_return(10))];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));

    let mut actuals = vec![Some(ActualArgument::new(Expr::int(2)))];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Actual argument associated with an alternate return indicator must be a label"]
    );
}

#[test]
fn label_for_a_data_dummy_is_rejected() {
    let f = Fixture::new();
    let proc = subroutine(vec![integer_dummy("i")]);
    let mut actuals = vec![Some(ActualArgument::alternate_return(10))];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Alternate return label '*10' cannot be associated with dummy argument 'i='"]
    );
}

fn pointer_in_dummy() -> f90check::characteristics::DummyArgument {
    let mut dummy = with_attr(real_dummy("p", &[]), DummyDataObjectAttr::Pointer);
    if let f90check::characteristics::DummyKind::DataObject(object) = &mut dummy.kind {
        object.intent = f90check::types::Intent::In;
    }
    dummy
}

#[test]
fn pointer_intent_in_accepts_a_target() {
    let mut f = Fixture::new();
    let t = f.variable("t", TypeCategory::Real, &[]);
    f.symbols.get_mut(t).attrs.insert(Attr::Target);
    let proc = subroutine(vec![pointer_in_dummy()]);
    let mut actuals = vec![actual(t)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
}

#[test]
fn pointer_intent_in_rejects_a_plain_variable() {
    let mut f = Fixture::new();
    let v = f.variable("v", TypeCategory::Real, &[]);
    let proc = subroutine(vec![pointer_in_dummy()]);
    let mut actuals = vec![actual(v)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(
        texts(&messages),
        vec!["Actual argument associated with POINTER INTENT(IN) dummy argument 'p=' must be a pointer or a valid target"]
    );
}

#[test]
fn pointer_dummy_without_intent_needs_a_pointer() {
    let mut f = Fixture::new();
    let t = f.variable("t", TypeCategory::Real, &[]);
    f.symbols.get_mut(t).attrs.insert(Attr::Target);
    let proc = subroutine(vec![with_attr(real_dummy("p", &[]), DummyDataObjectAttr::Pointer)]);
    let mut actuals = vec![actual(t)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(texts(&messages).iter().any(|t| t
        == "Actual argument associated with POINTER dummy argument 'p=' must also be POINTER unless INTENT(IN)"));
}

#[test]
fn target_dummy_warns_for_non_target_variable() {
    let mut f = Fixture::new();
    let v = f.variable("v", TypeCategory::Real, &[]);
    let t = f.variable("t", TypeCategory::Real, &[]);
    f.symbols.get_mut(t).attrs.insert(Attr::Target);
    let proc = subroutine(vec![with_attr(real_dummy("x", &[]), DummyDataObjectAttr::Target)]);

    let mut actuals = vec![actual(v)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert_eq!(messages.len(), 1);
    let warning = messages.iter().next().expect("a warning");
    assert_eq!(warning.severity, Severity::Warning);
    assert!(warning.text.starts_with("Any pointer associated with TARGET dummy argument 'x='"));

    let mut actuals = vec![actual(t)];
    let messages = check_explicit_interface(&proc, &mut actuals, &f.ctx(), Some(f.scope));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
}

#[test]
fn protected_variable_is_not_definable_outside_its_module() {
    let mut symbols = SymbolTable::new();
    let global = symbols.global();
    let module = symbols.add_scope(ScopeKind::Module, Some("m".to_string()), global, None);
    let object = ObjectEntityDetails {
        type_spec: Some(DeclTypeSpec::Intrinsic {
            category: TypeCategory::Real,
            kind: 4,
            length: None,
        }),
        ..Default::default()
    };
    let attrs = [Attr::Protected].into_iter().collect();
    let state = symbols.add_symbol(module, "state", attrs, Details::Object(object), 0..0);
    let main = symbols.add_scope(ScopeKind::MainProgram, Some("main".to_string()), global, None);
    symbols.import(main, "state", state);
    let inner = symbols.add_scope(ScopeKind::Subprogram, Some("inner".to_string()), module, None);
    let intrinsics = IntrinsicProcTable::configure();
    let ctx = FoldingContext::new(&symbols, &intrinsics);

    let mut dummy = real_dummy("x", &[]);
    if let f90check::characteristics::DummyKind::DataObject(object) = &mut dummy.kind {
        object.intent = f90check::types::Intent::Out;
    }
    let proc = subroutine(vec![dummy]);

    let mut actuals = vec![actual(state)];
    let messages = check_explicit_interface(&proc, &mut actuals, &ctx, Some(main));
    assert_eq!(
        texts(&messages),
        vec!["Actual argument associated with INTENT(OUT) dummy argument 'x=' must be definable: 'state' is PROTECTED in this scope"]
    );

    let mut actuals = vec![actual(state)];
    let messages = check_explicit_interface(&proc, &mut actuals, &ctx, Some(inner));
    assert!(messages.is_empty(), "unexpected: {:?}", texts(&messages));
}
