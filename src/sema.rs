//! Semantic checks over a resolved program: actual arguments at every
//! procedure reference, consistency of implicit interfaces, generic
//! distinguishability and type-bound overriding.

use std::collections::{HashMap, HashSet};

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{
    emit,
    termcolor::{ColorChoice, StandardStream},
    Config,
};
use log::{debug, trace};

use crate::characteristics::{DumpWith, Procedure};
use crate::check_call::check_arguments;
use crate::distinguish::{distinguishable, distinguishable_op_or_assign};
use crate::errors::{CompileError, CompileErrorKind, Span};
use crate::expr::ProcedureDesignator;
use crate::messages::{Messages, Severity};
use crate::resolve::ResolvedProgram;
use crate::symbol::{Attr, Details, SymbolId, SymbolTable};

#[derive(Debug, Clone, Default)]
pub struct SemaSettings {
    pub allow: HashSet<String>,
    pub deny: HashSet<String>,
    pub error: HashSet<String>,
    pub wall: bool,
    pub werror: bool,
    /// Check references to external procedures against their definitions
    /// in the same file.
    pub implicit_external: bool,
}

pub fn parse_directives(src: &str) -> SemaSettings {
    let mut s = SemaSettings::default();
    for line in src.lines() {
        let l = line.trim();
        if let Some(rest) = l.strip_prefix("!#") {
            let r = rest.trim();
            for (kw, set) in [
                ("allow", &mut s.allow),
                ("deny", &mut s.deny),
                ("error", &mut s.error),
            ] {
                let prefix = format!("{}(", kw);
                if r.starts_with(&prefix) && r.ends_with(')') {
                    let inner = &r[prefix.len()..r.len() - 1];
                    let name = inner.trim().to_ascii_lowercase();
                    set.insert(name);
                }
            }
        }
    }
    s
}

/// Warning groups, as named in `!#allow(..)` and friends.
pub const ARGUMENT: &str = "argument";
pub const EXTERNAL_INTERFACE: &str = "external_interface";
pub const IMPLICIT_INTERFACE: &str = "implicit_interface";
/// Only reported under `--Wall`.
pub const IMPLICIT_REFERENCE: &str = "implicit_reference";

struct Reporter<'a> {
    settings: &'a SemaSettings,
    output: Option<(StandardStream, SimpleFile<&'a str, &'a str>)>,
    errors: Vec<CompileError>,
}

impl<'a> Reporter<'a> {
    fn emit(&mut self, error: &CompileError) {
        let Some((stderr, file)) = &mut self.output else {
            return;
        };
        let diag = if error.is_error() {
            Diagnostic::error()
        } else {
            Diagnostic::warning()
        };
        let diag = diag
            .with_message(&error.message)
            .with_labels(vec![Label::primary((), error.span.clone())])
            .with_notes(error.notes.clone());
        let _ = emit(stderr, &Config::default(), file, &diag);
    }

    fn report_error(&mut self, error: CompileError) {
        self.emit(&error);
        self.errors.push(error);
    }

    fn warn_or_error(&mut self, kind_name: &str, mut error: CompileError) {
        let kn = kind_name.to_ascii_lowercase();

        if self.settings.allow.contains(&kn) {
            return;
        }

        let treat_as_error = self.settings.werror
            || self.settings.error.contains(&kn)
            || self.settings.deny.contains(&kn);
        error.kind = if treat_as_error {
            CompileErrorKind::Semantic
        } else {
            CompileErrorKind::Warning
        };
        self.emit(&error);
        self.errors.push(error);
    }

    fn report_messages(&mut self, kind_name: &str, messages: Messages, default_span: &Span) {
        for message in messages {
            let severity = message.severity;
            let error = message.into_compile_error(default_span.clone());
            match severity {
                Severity::Error => self.report_error(error),
                Severity::Warning => self.warn_or_error(kind_name, error),
            }
        }
    }
}

/// Runs every check and renders the resolution errors and findings
/// against the source.
pub fn analyze_with_src(
    resolved: &ResolvedProgram,
    src: &str,
    filename: &str,
    settings: &SemaSettings,
) -> Vec<CompileError> {
    let mut reporter = Reporter {
        settings,
        output: Some((
            StandardStream::stderr(ColorChoice::Auto),
            SimpleFile::new(filename, src),
        )),
        errors: Vec::new(),
    };
    run(resolved, &mut reporter);
    reporter.errors
}

/// Runs every check without rendering anything.
pub fn analyze(resolved: &ResolvedProgram, settings: &SemaSettings) -> Vec<CompileError> {
    let mut reporter = Reporter {
        settings,
        output: None,
        errors: Vec::new(),
    };
    run(resolved, &mut reporter);
    reporter.errors
}

fn run(resolved: &ResolvedProgram, reporter: &mut Reporter<'_>) {
    for error in &resolved.errors {
        reporter.report_error(error.clone());
    }
    check_references(resolved, reporter);
    check_generics(resolved, reporter);
    check_overrides(resolved, reporter);
    debug!("semantic checks produced {} diagnostics", reporter.errors.len());
}

/// The external subprogram defined in this file under `name`, if any.
fn external_definition(symbols: &SymbolTable, name: &str) -> Option<SymbolId> {
    let id = symbols.scope(symbols.global()).lookup(name)?;
    match symbols.get(id).subprogram() {
        Some(subprogram) if !subprogram.is_interface => Some(id),
        _ => None,
    }
}

fn check_references(resolved: &ResolvedProgram, reporter: &mut Reporter<'_>) {
    let ctx = resolved.folding_context();
    let symbols = &resolved.symbols;
    let mut inferred: HashMap<SymbolId, (Procedure, Span)> = HashMap::new();

    for reference in &resolved.references {
        let ProcedureDesignator::Symbol(id) = reference.designator else {
            continue;
        };
        let name = &symbols.get(id).name;
        let Some(mut procedure) = Procedure::characterize_designator(&reference.designator, &ctx)
        else {
            debug!("'{}' could not be characterized; reference not checked", name);
            continue;
        };

        let mut treating_external_as_implicit = false;
        if !procedure.has_explicit_interface() {
            if reporter.settings.wall {
                reporter.warn_or_error(
                    IMPLICIT_REFERENCE,
                    CompileError::new(
                        CompileErrorKind::Warning,
                        format!("'{}' is referenced through an implicit interface", name),
                        reference.span.clone(),
                    ),
                );
            }
            if let Some(call) = Procedure::infer_from_call(
                &reference.as_procedure_ref(),
                reference.is_function,
                &ctx,
            ) {
                match inferred.get(&id) {
                    Some((previous, previous_span)) if *previous != call => {
                        let notes = vec![format!(
                            "previous reference at bytes {}..{}: {}",
                            previous_span.start,
                            previous_span.end,
                            previous.dump(symbols)
                        )];
                        reporter.warn_or_error(
                            IMPLICIT_INTERFACE,
                            CompileError::new(
                                CompileErrorKind::Warning,
                                format!(
                                    "Reference to the procedure '{}' has an implicit interface that is distinct from another reference: {}",
                                    name,
                                    call.dump(symbols)
                                ),
                                reference.span.clone(),
                            )
                            .with_notes(notes),
                        );
                    }
                    Some(_) => {}
                    None => {
                        inferred.insert(id, (call, reference.span.clone()));
                    }
                }
            }
            if reporter.settings.implicit_external {
                if let Some(definition) = external_definition(symbols, name) {
                    if let Some(defined) = Procedure::characterize_symbol(definition, &ctx) {
                        trace!("checking '{}' against its external definition", name);
                        procedure = defined;
                        treating_external_as_implicit = true;
                    }
                }
            }
        }

        let mut actuals = reference.arguments.clone();
        let mut messages = Messages::new();
        check_arguments(
            &procedure,
            &mut actuals,
            &ctx,
            reference.scope,
            treating_external_as_implicit,
            &mut messages,
        );
        let kind = if treating_external_as_implicit {
            EXTERNAL_INTERFACE
        } else {
            ARGUMENT
        };
        reporter.report_messages(kind, messages, &reference.span);
    }
}

fn check_generics(resolved: &ResolvedProgram, reporter: &mut Reporter<'_>) {
    let ctx = resolved.folding_context();
    let symbols = &resolved.symbols;
    let mut reported: HashSet<(SymbolId, SymbolId)> = HashSet::new();

    for (_, symbol) in symbols.symbols() {
        let Some(generic) = symbol.generic() else {
            continue;
        };
        let specifics: Vec<(SymbolId, Procedure)> = generic
            .specifics
            .iter()
            .filter_map(|&id| Some((id, Procedure::characterize_symbol(id, &ctx)?)))
            .collect();
        let is_operator = generic.kind.is_operator_or_assignment();
        for (i, (id1, proc1)) in specifics.iter().enumerate() {
            for (id2, proc2) in &specifics[i + 1..] {
                if id1 == id2 || reported.contains(&(*id1, *id2)) {
                    continue;
                }
                let ok = if is_operator {
                    distinguishable_op_or_assign(proc1, proc2)
                } else {
                    distinguishable(proc1, proc2)
                };
                if !ok {
                    reported.insert((*id1, *id2));
                    reporter.report_error(CompileError::new(
                        CompileErrorKind::Semantic,
                        format!(
                            "Generic '{}' may not have specific procedures '{}' and '{}' as their interfaces are not distinguishable",
                            symbol.name,
                            symbols.get(*id1).name,
                            symbols.get(*id2).name
                        ),
                        symbol.span.clone(),
                    ));
                }
            }
        }
    }
}

/// The binding `name` inherited from an ancestor of `type_symbol`.
fn inherited_binding(symbols: &SymbolTable, type_symbol: SymbolId, name: &str) -> Option<SymbolId> {
    let Details::DerivedType(details) = &symbols.get(type_symbol).details else {
        return None;
    };
    let mut current = details.parent;
    while let Some(ancestor) = current {
        let Details::DerivedType(details) = &symbols.get(ancestor).details else {
            return None;
        };
        if let Some(found) = details
            .scope
            .and_then(|scope| symbols.scope(scope).lookup(name))
        {
            return matches!(symbols.get(found).details, Details::ProcBinding(_)).then_some(found);
        }
        current = details.parent;
    }
    None
}

fn check_overrides(resolved: &ResolvedProgram, reporter: &mut Reporter<'_>) {
    let ctx = resolved.folding_context();
    let symbols = &resolved.symbols;

    for (type_id, type_symbol) in symbols.symbols() {
        let Details::DerivedType(details) = &type_symbol.details else {
            continue;
        };
        if details.parent.is_none() {
            continue;
        }
        for &binding in &details.bindings {
            let symbol = symbols.get(binding);
            if !matches!(symbol.details, Details::ProcBinding(_)) {
                continue;
            }
            let Some(overridden) = inherited_binding(symbols, type_id, &symbol.name) else {
                continue;
            };
            let (Some(mine), Some(theirs)) = (
                Procedure::characterize_symbol(binding, &ctx),
                Procedure::characterize_symbol(overridden, &ctx),
            ) else {
                continue;
            };
            let pass_index = if symbol.has(Attr::NoPass) {
                None
            } else {
                mine.dummy_arguments.iter().position(|dummy| dummy.pass)
            };
            if !mine.can_override(&theirs, pass_index) {
                let owner = symbols.get(overridden).owner;
                let owner_name = symbols.scope(owner).name.clone().unwrap_or_default();
                reporter.report_error(
                    CompileError::new(
                        CompileErrorKind::Semantic,
                        "A type-bound procedure and its override must have compatible interfaces",
                        symbol.span.clone(),
                    )
                    .with_notes(vec![format!(
                        "overridden binding '{}' of type '{}'",
                        symbol.name, owner_name
                    )]),
                );
            }
        }
    }
}

/// The characteristics of every procedure in the program, one per line.
pub fn dump(resolved: &ResolvedProgram) -> String {
    let ctx = resolved.folding_context();
    let symbols = &resolved.symbols;
    let mut lines = Vec::new();

    for (id, symbol) in symbols.symbols() {
        if !matches!(
            symbol.details,
            Details::Subprogram(_) | Details::ProcEntity(_) | Details::ProcBinding(_)
        ) {
            continue;
        }
        let qualified = match &symbols.scope(symbol.owner).name {
            Some(scope) => format!("{}::{}", scope, symbol.name),
            None => symbol.name.clone(),
        };
        match Procedure::characterize_symbol(id, &ctx) {
            Some(procedure) => lines.push(format!("{}: {}", qualified, procedure.dump(symbols))),
            None => lines.push(format!("{}: (not a procedure)", qualified)),
        }
    }

    let mut seen = HashSet::new();
    for reference in &resolved.references {
        let ProcedureDesignator::Symbol(id) = reference.designator else {
            continue;
        };
        let implicit = matches!(&symbols.get(id).details,
            Details::ProcEntity(entity) if entity.interface.symbol.is_none());
        if !implicit || !seen.insert(id) {
            continue;
        }
        if let Some(inferred) =
            Procedure::infer_from_call(&reference.as_procedure_ref(), reference.is_function, &ctx)
        {
            lines.push(format!(
                "{} (inferred from first reference): {}",
                symbols.get(id).name,
                inferred.dump(symbols)
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_are_collected() {
        let settings = parse_directives("!#allow(argument)\n  !# deny(Implicit_Interface)\nprogram p\nend\n");
        assert!(settings.allow.contains("argument"));
        assert!(settings.deny.contains("implicit_interface"));
        assert!(settings.error.is_empty());
    }
}
