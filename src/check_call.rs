//! Constraint checking for procedure references: actual arguments against
//! the characteristics of the called procedure.

use log::{debug, trace};

use crate::characteristics::{
    check_conformance, DummyArgument, DummyDataObject, DummyDataObjectAttr as DataAttr,
    DummyKind, DummyProcedure, DummyProcedureAttr, Procedure, ProcedureAttr, TypeAndShape,
    TypeAndShapeAttr,
};
use crate::expr::{ActualArgument, ActualArguments, ActualValue, Expr, ProcedureDesignator};
use crate::fold::FoldingContext;
use crate::messages::{ContextualMessages, Message, Messages};
use crate::symbol::{Attr, ScopeId};
use crate::types::{Intent, TypeCategory};

/// Moves keyword arguments into the positions of the dummies they name, so
/// that afterwards `actuals[j]` is associated with dummy `j`. Returns false
/// when the list cannot be matched at all.
pub fn rearrange_arguments(
    proc: &Procedure,
    actuals: &mut ActualArguments,
    messages: &mut ContextualMessages<'_>,
) -> bool {
    let dummy_count = proc.dummy_arguments.len();
    let positional_count = actuals
        .iter()
        .take_while(|actual| actual.as_ref().map_or(true, |a| a.keyword.is_none()))
        .count();
    if positional_count > dummy_count {
        messages.say(format!(
            "Too many actual arguments ({}) passed to procedure that expects only {}",
            actuals.len(),
            dummy_count
        ));
        return false;
    }
    let mut ok = true;
    let mut keywords: Vec<(String, ActualArgument)> = Vec::new();
    let mut seen_keyword = false;
    for (j, slot) in actuals.iter_mut().enumerate() {
        let Some(actual) = slot.take() else {
            continue;
        };
        match actual.keyword.clone() {
            Some(keyword) => {
                seen_keyword = true;
                if keywords.iter().any(|(name, _)| *name == keyword) {
                    messages.say_at(
                        actual.span.clone(),
                        format!(
                            "Argument keyword '{}=' appears on more than one effective argument in this procedure reference",
                            keyword
                        ),
                    );
                    ok = false;
                } else {
                    keywords.push((keyword, actual));
                }
            }
            None if seen_keyword => {
                messages.say_at(
                    actual.span.clone(),
                    format!(
                        "Actual argument #{} without a keyword may not follow an argument with a keyword",
                        j + 1
                    ),
                );
                ok = false;
            }
            None => *slot = Some(actual),
        }
    }
    actuals.resize(dummy_count, None);
    for (keyword, actual) in keywords {
        match proc
            .dummy_arguments
            .iter()
            .position(|dummy| !dummy.name.is_empty() && dummy.name == keyword)
        {
            Some(index) if actuals[index].is_some() => {
                messages.say_at(
                    actual.span.clone(),
                    format!(
                        "Keyword argument '{}=' has already been specified positionally (#{}) in this procedure reference",
                        keyword,
                        index + 1
                    ),
                );
                ok = false;
            }
            Some(index) => actuals[index] = Some(actual),
            None => {
                messages.say_at(
                    actual.span.clone(),
                    format!(
                        "Argument keyword '{}=' is not recognized for this procedure reference",
                        keyword
                    ),
                );
                ok = false;
            }
        }
    }
    trace!("rearranged {} actual arguments", actuals.len());
    ok
}

/// Checks actual arguments against a procedure with an explicit interface;
/// returns every problem found. The actuals are left in dummy order.
pub fn check_explicit_interface(
    proc: &Procedure,
    actuals: &mut ActualArguments,
    ctx: &FoldingContext<'_>,
    scope: Option<ScopeId>,
) -> Messages {
    let mut buffer = Messages::new();
    let mut messages = ContextualMessages::new(None, &mut buffer);
    if rearrange_arguments(proc, actuals, &mut messages) {
        for (index, (actual, dummy)) in actuals.iter().zip(&proc.dummy_arguments).enumerate() {
            match actual {
                Some(actual) => {
                    messages.set_at(actual.span.clone());
                    check_explicit_interface_arg(actual, dummy, proc, ctx, scope, &mut messages);
                }
                None if dummy.is_optional() => {}
                None => {
                    messages.set_at(None);
                    if dummy.name.is_empty() {
                        messages.say(format!(
                            "Dummy argument #{} is not OPTIONAL and is not associated with an actual argument in this procedure reference",
                            index + 1
                        ));
                    } else {
                        messages.say(format!(
                            "Dummy argument '{}=' (#{}) is not OPTIONAL and is not associated with an actual argument in this procedure reference",
                            dummy.name,
                            index + 1
                        ));
                    }
                }
            }
        }
        if proc.is_elemental() {
            messages.set_at(None);
            check_elemental_conformance(proc, actuals, ctx, &mut messages);
        }
    }
    if !buffer.is_empty() {
        debug!("{} problem(s) with an explicit interface reference", buffer.len());
    }
    buffer
}

/// Checks a reference and reports through `messages`. With
/// `treating_external_as_implicit`, `proc` describes an external procedure
/// whose definition is known but whose interface is not explicit at the
/// call: its mismatches become a warning and the implicit interface rules
/// apply as well.
pub fn check_arguments(
    proc: &Procedure,
    actuals: &mut ActualArguments,
    ctx: &FoldingContext<'_>,
    scope: ScopeId,
    treating_external_as_implicit: bool,
    messages: &mut Messages,
) {
    let explicit_interface = proc.has_explicit_interface();
    if explicit_interface {
        let buffer = check_explicit_interface(proc, actuals, ctx, Some(scope));
        if treating_external_as_implicit && !buffer.is_empty() {
            let warning = messages.say(Message::warning(
                "if the procedure's interface were explicit, this reference would be in error",
                None,
            ));
            buffer.attach_to(warning);
        } else {
            messages.annex(buffer);
        }
    }
    if !explicit_interface || treating_external_as_implicit {
        let mut contextual = ContextualMessages::new(None, messages);
        if treating_external_as_implicit {
            check_implicit_callability(proc, &mut contextual);
        }
        for actual in actuals.iter().flatten() {
            contextual.set_at(actual.span.clone());
            check_implicit_interface_arg(actual, ctx, &mut contextual);
        }
    }
}

/// Could these actual arguments be passed to this specific procedure of a
/// generic interface? Warnings do not disqualify it.
pub fn check_interface_for_generic(
    proc: &Procedure,
    actuals: &ActualArguments,
    ctx: &FoldingContext<'_>,
) -> bool {
    let mut actuals = actuals.clone();
    !check_explicit_interface(proc, &mut actuals, ctx, None).any_fatal()
}

fn dummy_name(dummy: &DummyArgument) -> String {
    if dummy.name.is_empty() {
        "dummy argument".to_string()
    } else {
        format!("dummy argument '{}='", dummy.name.to_ascii_lowercase())
    }
}

fn check_explicit_interface_arg(
    actual: &ActualArgument,
    dummy: &DummyArgument,
    proc: &Procedure,
    ctx: &FoldingContext<'_>,
    scope: Option<ScopeId>,
    messages: &mut ContextualMessages<'_>,
) {
    let name = dummy_name(dummy);
    if let ActualValue::AlternateReturn(label) = &actual.value {
        if !dummy.is_alternate_return() {
            messages.say(format!(
                "Alternate return label '*{}' cannot be associated with {}",
                label, name
            ));
        }
        return;
    }
    match &dummy.kind {
        DummyKind::DataObject(object) => match &actual.value {
            ActualValue::Expr(expr) => check_data_object_arg(object, &name, expr, proc, ctx, scope, messages),
            ActualValue::AssumedType(assumed) => {
                if !object.type_and_shape.dynamic_type().is_assumed_type() {
                    messages.say(format!(
                        "Assumed-type TYPE(*) '{}' may be associated only with an assumed-type TYPE(*) {}",
                        ctx.symbols.get(*assumed).name,
                        name
                    ));
                }
            }
            ActualValue::AlternateReturn(_) => {}
        },
        DummyKind::Procedure(procedure) => check_procedure_arg(actual, procedure, &name, ctx, messages),
        DummyKind::AlternateReturn(_) => {
            messages.say(
                "Actual argument associated with an alternate return indicator must be a label",
            );
        }
    }
}

fn check_data_object_arg(
    dummy: &DummyDataObject,
    name: &str,
    expr: &Expr,
    proc: &Procedure,
    ctx: &FoldingContext<'_>,
    scope: Option<ScopeId>,
    messages: &mut ContextualMessages<'_>,
) {
    let dummy_type = dummy.type_and_shape.dynamic_type();
    if expr.is_boz() {
        if !dummy_type.is_typeless_intrinsic_argument() {
            messages.say(format!(
                "BOZ literal may not be associated with {}",
                name
            ));
        }
        return;
    }
    if expr.is_null_pointer() {
        if dummy.has(DataAttr::Pointer) {
            if matches!(dummy.intent, Intent::Out | Intent::InOut) {
                messages.say(format!(
                    "A NULL() pointer may not be associated with {} {}",
                    dummy.intent, name
                ));
            }
        } else if !dummy.has(DataAttr::Optional) {
            messages.say(format!(
                "A NULL() pointer may not be associated with non-POINTER {}",
                name
            ));
        }
        return;
    }
    if expr.is_procedure_designator() {
        messages.say(format!(
            "Procedure '{}' may not be associated with data object {}",
            expr.as_fortran(ctx.symbols),
            name
        ));
        return;
    }
    let Some(actual) = TypeAndShape::characterize_expr(expr, ctx) else {
        messages.say("Actual argument is not a variable or typed expression");
        return;
    };
    let is_elemental = dummy.type_and_shape.rank() == 0 && proc.is_elemental();
    let actual_type = actual.dynamic_type();
    let actual_symbol = ctx.whole_symbol(expr);
    let actual_is_pointer = ctx.is_pointer(expr);
    let actual_is_allocatable = actual_symbol.map_or(false, |symbol| symbol.is_allocatable());
    let base_symbol = expr.last_symbol().map(|id| ctx.symbols.get(id));

    // A POINTER INTENT(IN) dummy may become associated with a target as if
    // by pointer assignment.
    let pointer_to_target = dummy.has(DataAttr::Pointer)
        && dummy.intent == Intent::In
        && !actual_is_pointer
        && base_symbol.map_or(false, |symbol| symbol.has(Attr::Target) || symbol.is_pointer());
    if pointer_to_target {
        dummy
            .type_and_shape
            .is_compatible_with(messages, &actual, "POINTER", "TARGET", false);
    } else {
        if !dummy_type.is_type_compatible_with(actual_type) {
            messages.say(format!(
                "Actual argument type '{}' is not compatible with {} type '{}'",
                actual.type_spelling(),
                name,
                dummy.type_and_shape.type_spelling()
            ));
        }
        check_rank_and_shape(dummy, name, expr, &actual, is_elemental, ctx, messages);
    }

    if let Some(designator) = expr.as_designator() {
        if designator.coindexed && dummy_type.is_polymorphic() {
            messages.say(format!(
                "Coindexed polymorphic object may not be associated with a polymorphic {}",
                name
            ));
        }
    }

    let actual_is_assumed_size = actual.has(TypeAndShapeAttr::AssumedSize);
    if actual_is_assumed_size {
        if dummy.type_and_shape.has(TypeAndShapeAttr::AssumedShape) {
            messages.say(format!(
                "Assumed-size array may not be associated with assumed-shape {}",
                name
            ));
        }
        if dummy.has(DataAttr::Value) {
            messages.say(format!(
                "Assumed-size array may not be associated with VALUE {}",
                name
            ));
        }
    }
    if dummy.has(DataAttr::Value) && actual.corank() > 0 {
        messages.say(format!("Coarray may not be associated with VALUE {}", name));
    }

    check_definability(dummy, name, expr, is_elemental, ctx, scope, messages);

    if (dummy.has(DataAttr::Asynchronous) || dummy.has(DataAttr::Volatile))
        && actual.rank() > 0
        && !ctx.is_simply_contiguous(expr)
    {
        let copies = !(dummy.type_and_shape.has(TypeAndShapeAttr::AssumedShape)
            || dummy.type_and_shape.has(TypeAndShapeAttr::AssumedRank)
            || dummy.has(DataAttr::Pointer))
            || dummy.has(DataAttr::Contiguous);
        if copies {
            messages.say(format!(
                "ASYNCHRONOUS or VOLATILE actual argument that is not simply contiguous may not be associated with a contiguous {}",
                name
            ));
        }
    }

    if dummy.has(DataAttr::Allocatable) {
        match expr.as_designator() {
            Some(designator) if designator.coindexed => {
                messages.say(format!(
                    "ALLOCATABLE {} must be associated with an ALLOCATABLE actual argument that is not coindexed",
                    name
                ));
            }
            _ if !actual_is_allocatable => {
                messages.say(format!(
                    "ALLOCATABLE {} must be associated with an ALLOCATABLE actual argument",
                    name
                ));
            }
            _ => {
                if dummy.type_and_shape.corank() != actual.corank() {
                    messages.say(format!(
                        "ALLOCATABLE {} has corank {} but actual argument has corank {}",
                        name,
                        dummy.type_and_shape.corank(),
                        actual.corank()
                    ));
                }
            }
        }
    }

    if dummy.has(DataAttr::Pointer) {
        if dummy.has(DataAttr::Contiguous)
            && actual_is_pointer
            && !actual_symbol.map_or(false, |symbol| symbol.has(Attr::Contiguous))
        {
            messages.say(format!(
                "Actual argument associated with CONTIGUOUS POINTER {} must be simply contiguous",
                name
            ));
        }
        if !actual_is_pointer {
            if dummy.intent != Intent::In {
                messages.say(format!(
                    "Actual argument associated with POINTER {} must also be POINTER unless INTENT(IN)",
                    name
                ));
            } else if !pointer_to_target {
                messages.say(format!(
                    "Actual argument associated with POINTER INTENT(IN) {} must be a pointer or a valid target",
                    name
                ));
            }
        }
    }

    if (dummy.has(DataAttr::Pointer) && actual_is_pointer)
        || (dummy.has(DataAttr::Allocatable) && actual_is_allocatable)
    {
        if dummy_type.is_unlimited_polymorphic() != actual_type.is_unlimited_polymorphic() {
            messages.say(
                "If a POINTER or ALLOCATABLE dummy or actual argument is unlimited polymorphic, both must be so",
            );
        } else if dummy_type.is_polymorphic() != actual_type.is_polymorphic() {
            messages.say(
                "If a POINTER or ALLOCATABLE dummy or actual argument is polymorphic, both must be so",
            );
        } else if !dummy_type.is_unlimited_polymorphic() && dummy_type.declared() != actual_type.declared() {
            messages.say(
                "POINTER or ALLOCATABLE dummy and actual arguments must have the same declared type",
            );
        }
    }

    if dummy.has(DataAttr::Target) {
        let is_target = base_symbol.map_or(false, |symbol| {
            symbol.has(Attr::Target) || symbol.is_pointer()
        });
        if ctx.is_variable(expr) && !is_target {
            messages.warn(format!(
                "Any pointer associated with TARGET {} during this call will not be associated with the value of '{}' afterwards",
                name,
                expr.as_fortran(ctx.symbols)
            ));
        }
    }

    check_character_length(dummy, expr, &actual, ctx, messages);
}

fn check_rank_and_shape(
    dummy: &DummyDataObject,
    name: &str,
    expr: &Expr,
    actual: &TypeAndShape,
    is_elemental: bool,
    ctx: &FoldingContext<'_>,
    messages: &mut ContextualMessages<'_>,
) {
    let dummy_shape = &dummy.type_and_shape;
    if is_elemental || dummy_shape.has(TypeAndShapeAttr::AssumedRank) {
        return;
    }
    if actual.has(TypeAndShapeAttr::AssumedRank) {
        messages.say(format!(
            "Assumed-rank array may not be associated with non-assumed-rank {}",
            name
        ));
        return;
    }
    let reshapes = dummy_shape.has(TypeAndShapeAttr::AssumedShape)
        || dummy_shape.has(TypeAndShapeAttr::DeferredShape)
        || dummy.has(DataAttr::Pointer)
        || dummy.has(DataAttr::Allocatable);
    if dummy_shape.rank() == 0 || reshapes {
        if dummy_shape.rank() > 0 && actual.rank() == 0 {
            scalar_to_array(dummy, name, expr, ctx, messages);
        } else {
            check_conformance(messages, dummy_shape.shape(), actual.shape(), name, "actual argument");
        }
        return;
    }
    // Explicit-shape and assumed-size dummies take part in sequence
    // association; only equal ranks are compared extent by extent.
    if actual.rank() == 0 {
        scalar_to_array(dummy, name, expr, ctx, messages);
    } else if actual.rank() == dummy_shape.rank() {
        check_conformance(messages, dummy_shape.shape(), actual.shape(), name, "actual argument");
    }
}

/// A scalar may be associated with an array dummy only as the start of a
/// sequence: an array element, or a character scalar.
fn scalar_to_array(
    dummy: &DummyDataObject,
    name: &str,
    expr: &Expr,
    ctx: &FoldingContext<'_>,
    messages: &mut ContextualMessages<'_>,
) {
    let explicit_or_assumed_size = !dummy.type_and_shape.has(TypeAndShapeAttr::AssumedShape)
        && !dummy.type_and_shape.has(TypeAndShapeAttr::DeferredShape)
        && !dummy.has(DataAttr::Pointer)
        && !dummy.has(DataAttr::Allocatable);
    let element_of = expr.as_designator().filter(|designator| !designator.is_whole());
    match element_of {
        Some(designator) if explicit_or_assumed_size => {
            let array = ctx.symbols.get(designator.symbol);
            if array.is_pointer() {
                messages.say(format!(
                    "Element of pointer array may not be associated with a {} array",
                    name
                ));
            } else if array.object().map_or(false, |object| {
                object.is_dummy && crate::symbol::is_colon_shape(&object.shape)
            }) {
                messages.say(format!(
                    "Element of assumed-shape array may not be associated with a {} array",
                    name
                ));
            }
        }
        _ if explicit_or_assumed_size
            && ctx.type_of(expr).map_or(false, |t| t.category() == TypeCategory::Character) => {}
        _ if ctx
            .type_of(expr)
            .map_or(false, |t| t.is_polymorphic()) =>
        {
            messages.say(format!(
                "Polymorphic scalar may not be associated with a {} array",
                name
            ));
        }
        _ => {
            messages.say(format!(
                "Whole scalar actual argument may not be associated with a {} array",
                name
            ));
        }
    }
}

fn check_definability(
    dummy: &DummyDataObject,
    name: &str,
    expr: &Expr,
    is_elemental: bool,
    ctx: &FoldingContext<'_>,
    scope: Option<ScopeId>,
    messages: &mut ContextualMessages<'_>,
) {
    let reason = match dummy.intent {
        Intent::Out => Some("INTENT(OUT)"),
        Intent::InOut => Some("INTENT(IN OUT)"),
        Intent::In | Intent::Default => None,
    };
    if let Some(reason) = reason {
        if !ctx.is_variable(expr) {
            messages.say(format!(
                "Actual argument associated with {} {} must be definable",
                reason, name
            ));
        } else if let Some(id) = expr.last_symbol() {
            let symbol = ctx.symbols.get(id);
            if symbol.is_dummy() && symbol.has(Attr::IntentIn) {
                messages.say(format!(
                    "Actual argument associated with {} {} must be definable: '{}' is an INTENT(IN) dummy argument",
                    reason, name, symbol.name
                ));
            } else if scope.map_or(false, |scope| ctx.symbols.is_protected_from(id, scope)) {
                messages.say(format!(
                    "Actual argument associated with {} {} must be definable: '{}' is PROTECTED in this scope",
                    reason, name, symbol.name
                ));
            }
        }
        if ctx.has_vector_subscript(expr) && !is_elemental && !dummy.has(DataAttr::Value) {
            messages.say(format!(
                "Actual argument associated with {} {} may not have a vector subscript",
                reason, name
            ));
        }
    }
    if (dummy.has(DataAttr::Asynchronous) || dummy.has(DataAttr::Volatile))
        && ctx.has_vector_subscript(expr)
    {
        messages.say(format!(
            "Actual argument associated with ASYNCHRONOUS or VOLATILE {} may not have a vector subscript",
            name
        ));
    }
}

fn check_character_length(
    dummy: &DummyDataObject,
    expr: &Expr,
    actual: &TypeAndShape,
    ctx: &FoldingContext<'_>,
    messages: &mut ContextualMessages<'_>,
) {
    let dummy_shape = &dummy.type_and_shape;
    if dummy_shape.dynamic_type().category() != TypeCategory::Character
        || actual.dynamic_type().category() != TypeCategory::Character
    {
        return;
    }
    let dummy_length = dummy_shape.length().and_then(|len| ctx.fold_integer(len));
    let actual_length = actual.length().and_then(|len| ctx.fold_integer(len));
    let (Some(dummy_length), Some(actual_length)) = (dummy_length, actual_length) else {
        return;
    };
    let exact = dummy.has(DataAttr::Pointer)
        || dummy.has(DataAttr::Allocatable)
        || dummy_shape.has(TypeAndShapeAttr::AssumedShape)
        || dummy_shape.has(TypeAndShapeAttr::AssumedRank);
    if exact && actual_length != dummy_length {
        messages.say(format!(
            "Actual argument variable length '{}' does not match the expected length '{}'",
            actual_length, dummy_length
        ));
    } else if actual_length < dummy_length && (dummy_shape.rank() == 0 || actual.rank() > 0) {
        let what = if ctx.is_variable(expr) { "variable" } else { "expression" };
        messages.say(format!(
            "Actual argument {} length '{}' is less than expected length '{}'",
            what, actual_length, dummy_length
        ));
    }
}

fn check_procedure_arg(
    actual: &ActualArgument,
    dummy: &DummyProcedure,
    name: &str,
    ctx: &FoldingContext<'_>,
    messages: &mut ContextualMessages<'_>,
) {
    let interface = &dummy.procedure;
    let Some(expr) = actual.unwrap_expr() else {
        messages.say(format!(
            "Actual argument associated with procedure {} is not a procedure",
            name
        ));
        return;
    };
    let (argument, is_intrinsic, is_pointer, spelling) = match expr {
        Expr::Procedure(designator) => {
            let is_intrinsic = match designator {
                ProcedureDesignator::Intrinsic(_) => true,
                ProcedureDesignator::Symbol(id) => ctx.symbols.get(*id).has(Attr::Intrinsic),
            };
            if is_intrinsic && !ctx.intrinsics.is_unrestricted_specific(designator.name(ctx.symbols)) {
                messages.say(format!(
                    "Intrinsic '{}' is not an unrestricted specific intrinsic and may not be associated with procedure {}",
                    designator.name(ctx.symbols),
                    name
                ));
                return;
            }
            let is_pointer = designator
                .symbol()
                .map_or(false, |id| ctx.symbols.get(id).is_pointer());
            (
                Procedure::characterize_designator(designator, ctx),
                is_intrinsic,
                is_pointer,
                designator.name(ctx.symbols).to_string(),
            )
        }
        Expr::FunctionRef(call) => match Procedure::characterize_ref(call, ctx) {
            Some(procedure) => (Some(procedure), false, true, expr.as_fortran(ctx.symbols)),
            None => {
                messages.say(format!(
                    "Actual argument associated with procedure {} is not a procedure",
                    name
                ));
                return;
            }
        },
        Expr::Null => {
            if !dummy.has(DummyProcedureAttr::Pointer) && !dummy.has(DummyProcedureAttr::Optional) {
                messages.say(format!(
                    "A NULL() pointer may be associated only with a POINTER or OPTIONAL procedure {}",
                    name
                ));
            }
            return;
        }
        _ => {
            messages.say(format!(
                "Actual argument associated with procedure {} is not a procedure",
                name
            ));
            return;
        }
    };
    if dummy.has(DummyProcedureAttr::Pointer) && dummy.intent != Intent::In && !is_pointer {
        messages.say(format!(
            "Actual argument associated with procedure pointer {} must be a POINTER unless INTENT(IN)",
            name
        ));
    }
    // Already diagnosed where it was declared.
    let Some(mut argument) = argument else {
        return;
    };
    if argument.is_elemental() && !is_intrinsic {
        messages.say(format!(
            "Non-intrinsic ELEMENTAL procedure '{}' may not be passed as an actual argument",
            spelling
        ));
        return;
    }
    if interface.has_explicit_interface() {
        if !argument.has_explicit_interface() {
            check_implicit_kind(interface, &argument, name, messages);
            return;
        }
        let mut expected = (**interface).clone();
        expected.attrs.remove(&ProcedureAttr::NullPointer);
        argument.attrs.remove(&ProcedureAttr::NullPointer);
        if !expected.is_pure() {
            argument.attrs.remove(&ProcedureAttr::Pure);
        }
        if is_intrinsic {
            argument.attrs.remove(&ProcedureAttr::Elemental);
            expected.attrs.remove(&ProcedureAttr::Elemental);
        }
        if expected != argument {
            debug!("procedure actual '{}' differs from its dummy interface", spelling);
            messages.say(format!(
                "Procedure actual argument '{}' does not match dummy procedure interface of {}",
                spelling, name
            ));
        }
    } else {
        check_implicit_kind(interface, &argument, name, messages);
        if argument.is_bind_c() && argument.dummy_arguments.iter().any(DummyArgument::is_optional) {
            messages.say(format!(
                "BIND(C) procedure '{}' with OPTIONAL dummy arguments may not be associated with {}, which has an implicit interface",
                spelling, name
            ));
        }
    }
}

/// Function versus subroutine, and the result type, when only one side
/// has an explicit interface.
fn check_implicit_kind(
    interface: &Procedure,
    argument: &Procedure,
    name: &str,
    messages: &mut ContextualMessages<'_>,
) {
    if interface.is_function() {
        if argument.is_subroutine() {
            messages.say(format!(
                "Actual argument associated with procedure {} is a subroutine but must be a function",
                name
            ));
        } else if let (Some(expected), Some(found)) = (
            interface
                .function_result
                .as_ref()
                .and_then(|r| r.type_and_shape()),
            argument
                .function_result
                .as_ref()
                .and_then(|r| r.type_and_shape()),
        ) {
            if expected.dynamic_type() != found.dynamic_type() {
                messages.say(format!(
                    "Actual argument function associated with procedure {} has result type '{}' but '{}' is expected",
                    name,
                    found.type_spelling(),
                    expected.type_spelling()
                ));
            }
        }
    } else if interface.is_subroutine() && argument.is_function() {
        messages.say(format!(
            "Actual argument associated with procedure {} is a function but must be a subroutine",
            name
        ));
    }
}

/// Array actual arguments of an elemental reference must conform with
/// each other.
fn check_elemental_conformance(
    proc: &Procedure,
    actuals: &ActualArguments,
    ctx: &FoldingContext<'_>,
    messages: &mut ContextualMessages<'_>,
) {
    let mut first: Option<(String, TypeAndShape)> = None;
    for (actual, dummy) in actuals.iter().zip(&proc.dummy_arguments) {
        let Some(object) = dummy.as_data_object() else {
            continue;
        };
        if object.type_and_shape.rank() > 0 {
            continue;
        }
        let Some(expr) = actual.as_ref().and_then(ActualArgument::unwrap_expr) else {
            continue;
        };
        let Some(shape) = TypeAndShape::characterize_expr(expr, ctx) else {
            continue;
        };
        if shape.rank() == 0 {
            continue;
        }
        let label = format!("actual argument associated with {}", dummy_name(dummy));
        match &first {
            Some((first_label, first_shape)) => {
                messages.set_at(actual.as_ref().and_then(|a| a.span.clone()));
                check_conformance(messages, first_shape.shape(), shape.shape(), first_label, &label);
            }
            None => first = Some((label, shape)),
        }
    }
}

/// Properties of the called procedure that no reference through an
/// implicit interface can honor.
fn check_implicit_callability(proc: &Procedure, messages: &mut ContextualMessages<'_>) {
    messages.set_at(None);
    if proc.is_elemental() {
        messages.say("An ELEMENTAL procedure requires an explicit interface");
    }
    if proc.is_bind_c() {
        messages.say("A BIND(C) procedure requires an explicit interface");
    }
    if let Some(result) = &proc.function_result {
        if !result.can_be_returned_via_implicit_interface() {
            messages.say("The function result requires an explicit interface");
        }
    }
    for dummy in &proc.dummy_arguments {
        if let Some(reason) = dummy.as_data_object().and_then(DummyDataObject::explicit_interface_reason) {
            messages.say(format!(
                "{} is {}, which requires an explicit interface",
                capitalize(&dummy_name(dummy)),
                reason
            ));
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn check_implicit_interface_arg(
    actual: &ActualArgument,
    ctx: &FoldingContext<'_>,
    messages: &mut ContextualMessages<'_>,
) {
    if let Some(keyword) = &actual.keyword {
        messages.say(format!(
            "Keyword '{}=' may not appear in a reference to a procedure with an implicit interface",
            keyword
        ));
    }
    let expr = match &actual.value {
        ActualValue::Expr(expr) => expr,
        ActualValue::AssumedType(_) => {
            messages.say("Assumed type argument requires an explicit interface");
            return;
        }
        ActualValue::AlternateReturn(_) => return,
    };
    if let Some(dynamic_type) = ctx.type_of(expr) {
        if dynamic_type.is_polymorphic() {
            messages.say("Polymorphic argument requires an explicit interface");
        }
    }
    if let Some(id) = expr.last_symbol() {
        let symbol = ctx.symbols.get(id);
        if symbol.corank() > 0 {
            messages.say("Coarray argument requires an explicit interface");
        }
        if symbol.object().map_or(false, |object| object.is_assumed_rank()) {
            messages.say("Assumed rank argument requires an explicit interface");
        }
        if symbol.has(Attr::Asynchronous) {
            messages.say("ASYNCHRONOUS argument requires an explicit interface");
        }
        if symbol.has(Attr::Volatile) {
            messages.say("VOLATILE argument requires an explicit interface");
        }
    }
}
