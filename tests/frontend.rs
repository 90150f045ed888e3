mod common;

use common::*;
use f90check::characteristics::{DumpWith, Procedure, TypeAndShape};
use f90check::errors::CompileError;
use f90check::expr::Expr;
use f90check::messages::Messages;
use f90check::resolve::ResolvedProgram;
use f90check::sema::{self, SemaSettings};
use f90check::symbol::{Details, SymbolTable};
use f90check::types::TypeCategory;
use f90check::{lexer, parser, resolve};

fn resolve_source(src: &str) -> ResolvedProgram {
    let tokens = lexer::lex(src);
    let program = parser::parse(&tokens, src.len()).expect("source should parse");
    resolve::resolve(&program)
}

fn check_source(src: &str) -> Vec<CompileError> {
    let resolved = resolve_source(src);
    sema::analyze(&resolved, &SemaSettings::default())
}

fn find_subprogram(resolved: &ResolvedProgram, name: &str) -> Procedure {
    let ctx = resolved.folding_context();
    let id = resolved
        .symbols
        .symbols()
        .find(|(_, symbol)| symbol.name == name && matches!(symbol.details, Details::Subprogram(_)))
        .map(|(id, _)| id)
        .expect("subprogram should be declared");
    Procedure::characterize_symbol(id, &ctx).expect("subprogram should characterize")
}

const MODULE: &str = "
module m
  implicit none
  integer, parameter :: n = 10
contains
  subroutine take(x, k)
    real, intent(in) :: x(n)
    integer, optional :: k
  end subroutine take
end module m

program main
  use m
  implicit none
  real :: a(10), b(5)
  call take(a)
  call take(b, 3)
end program main
";

#[test]
fn characterization_is_deterministic() {
    let first = resolve_source(MODULE);
    let second = resolve_source(MODULE);
    let p1 = find_subprogram(&first, "take");
    let p2 = find_subprogram(&second, "take");
    assert_eq!(p1, p2);
    assert_eq!(
        p1.dump(&first.symbols).to_string(),
        p2.dump(&second.symbols).to_string()
    );
    assert!(!p1.can_be_called_via_implicit_interface());
}

#[test]
fn parameter_bounds_fold_into_the_shape() {
    let resolved = resolve_source(MODULE);
    let take = find_subprogram(&resolved, "take");
    let x = take.dummy_arguments[0].as_data_object().expect("data object");
    assert_eq!(x.type_and_shape.shape(), &vec![Some(Expr::int(10))]);
}

#[test]
fn only_the_short_actual_is_reported() {
    let errors = check_source(MODULE);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0]
        .message
        .contains("Dimension 1 of dummy argument 'x=' has extent 10, but actual argument has extent 5"));
}

#[test]
fn clean_program_has_no_diagnostics() {
    let src = "
subroutine s(i)
  integer, intent(in) :: i
end subroutine s

program main
  interface
    subroutine s(i)
      integer, intent(in) :: i
    end subroutine s
  end interface
  call s(1)
end program main
";
    assert!(check_source(src).is_empty());
}

#[test]
fn parameter_extent_in_symbol_table() {
    let mut f = Fixture::new();
    let n = f.parameter("n", 4);
    let a = f.variable("a", TypeCategory::Real, &[]);
    if let Details::Object(object) = &mut f.symbols.get_mut(a).details {
        object.shape = vec![f90check::symbol::ShapeSpec::Explicit {
            lower: None,
            upper: Expr::symbol(n),
        }];
    }
    let shape = TypeAndShape::characterize(a, &f.ctx()).expect("characterizes");
    assert_eq!(shape.rank(), 1);
    assert_eq!(f.ctx().fold_integer(shape.shape()[0].as_ref().expect("extent")), Some(4));
}

#[test]
fn results_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Procedure>();
    assert_send_sync::<SymbolTable>();
    assert_send_sync::<Messages>();
}

#[test]
fn huge_declared_bounds_leave_the_extent_unknown() {
    let src = "
module m
  implicit none
contains
  subroutine take(x)
    real, intent(in) :: x(10)
  end subroutine take
end module m

program main
  use m
  implicit none
  real :: a(-9223372036854775807:9223372036854775807)
  call take(a)
end program main
";
    let errors = check_source(src);
    assert!(errors.iter().all(|e| !e.message.contains("extent")), "{:?}", errors);
}

#[test]
fn huge_section_bounds_leave_the_extent_unknown() {
    let src = "
module m
  implicit none
contains
  subroutine take(x)
    real, intent(in) :: x(10)
  end subroutine take
end module m

program main
  use m
  implicit none
  real :: a(10)
  call take(a(-9223372036854775807:9223372036854775807))
end program main
";
    let errors = check_source(src);
    assert!(errors.iter().all(|e| !e.message.contains("extent")), "{:?}", errors);
}

#[test]
fn circular_named_constant_does_not_fold() {
    let mut f = Fixture::new();
    let n = f.parameter("n", 0);
    if let Details::Object(object) = &mut f.symbols.get_mut(n).details {
        object.init = Some(Expr::binary(
            f90check::expr::Operator::Add,
            Expr::symbol(n),
            Expr::int(1),
        ));
    }
    assert_eq!(f.ctx().fold_integer(&Expr::symbol(n)), None);

    let m = f.parameter("m", 0);
    if let Details::Object(object) = &mut f.symbols.get_mut(m).details {
        object.init = Some(Expr::binary(
            f90check::expr::Operator::Multiply,
            Expr::symbol(n),
            Expr::int(2),
        ));
    }
    assert_eq!(f.ctx().fold_integer(&Expr::symbol(m)), None);
}

#[test]
fn self_referencing_parameter_in_source_is_checked() {
    let src = "
program main
  integer, parameter :: n = n + 1
  real :: a(n)
  call s(a)
end program main
";
    let resolved = resolve_source(src);
    let _ = sema::analyze(&resolved, &SemaSettings::default());
}

#[test]
fn concatenation_length_overflow_is_unknown() {
    let mut f = Fixture::new();
    let n = f.parameter("big", i64::MAX);
    let object = f90check::symbol::ObjectEntityDetails {
        type_spec: Some(f90check::symbol::DeclTypeSpec::Intrinsic {
            category: TypeCategory::Character,
            kind: 1,
            length: Some(f90check::symbol::ParamValue::Explicit(Expr::symbol(n))),
        }),
        ..Default::default()
    };
    let c = f.symbols.add_symbol(
        f.scope,
        "c",
        Default::default(),
        Details::Object(object),
        0..0,
    );
    let concat = Expr::binary(f90check::expr::Operator::Concat, Expr::symbol(c), Expr::symbol(c));
    assert_eq!(f.ctx().char_length(&concat), None);
}
