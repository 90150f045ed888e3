//! Name resolution: builds the symbol table from the parse tree, applies the
//! implicit typing rules, and turns parse-tree expressions into typed
//! expressions. Every procedure reference it meets is recorded for the
//! checker.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::ast::{
    self, Arg, ArgValue, AttrSpec, BinOp, Binding, Decl, DerivedTypeDef, DimSpec, DummyName,
    EntityDecl, ExprKind, GenericSpec, InterfaceBlock, InterfaceKind, IntentSpec, LenParam,
    LetterRange, Prefix, ProcInterfaceName, ProgramUnit, Stmt, Subprogram, SubprogramKind,
    TypeSpec, UnOp,
};
use crate::characteristics::Procedure;
use crate::check_call::check_interface_for_generic;
use crate::errors::{CompileError, CompileErrorKind, Span};
use crate::expr::{
    operation_result_type, ActualArgument, ActualArguments, Designator, Expr, Literal, Operator,
    ProcedureDesignator, ProcedureRef, RelationalOperator, Subscript,
};
use crate::fold::FoldingContext;
use crate::intrinsics::IntrinsicProcTable;
use crate::symbol::{
    ArraySpec, AssocEntityDetails, Attr, Attrs, DeclTypeSpec, DerivedTypeDetails, Details, Flag,
    GenericDetails, GenericKind, ObjectEntityDetails, ParamValue, ProcBindingDetails,
    ProcEntityDetails, ProcInterface, ScopeId, ScopeKind, ShapeSpec, SubprogramDetails, SymbolId,
    SymbolTable,
};
use crate::types::{DynamicType, TypeCategory};

const INTRINSIC_SUBROUTINES: &[&str] = &[
    "cpu_time",
    "date_and_time",
    "execute_command_line",
    "get_command",
    "get_command_argument",
    "get_environment_variable",
    "move_alloc",
    "mvbits",
    "random_number",
    "random_seed",
    "system_clock",
];

#[derive(Debug, Clone, Default)]
pub struct ImplicitTyping {
    pub disabled: bool,
    pub rules: Vec<ImplicitRule>,
}

#[derive(Debug, Clone)]
pub struct ImplicitRule {
    pub type_spec: TypeSpec,
    pub letter_ranges: Vec<LetterRange>,
}

impl ImplicitTyping {
    pub fn new() -> Self {
        Self {
            disabled: false,
            rules: Vec::new(),
        }
    }

    pub fn apply_implicit_none(&mut self) {
        self.disabled = true;
    }

    pub fn add_rule(&mut self, type_spec: TypeSpec, letter_ranges: Vec<LetterRange>) {
        self.disabled = false;
        self.rules.push(ImplicitRule {
            type_spec,
            letter_ranges,
        });
    }

    pub fn get_implicit_type(&self, name: &str) -> Option<TypeSpec> {
        let first_char = name.chars().next()?.to_ascii_lowercase();

        for rule in &self.rules {
            for range in &rule.letter_ranges {
                let matches = if let Some(end_char) = range.end {
                    first_char >= range.start && first_char <= end_char
                } else {
                    first_char == range.start
                };

                if matches {
                    return Some(rule.type_spec.clone());
                }
            }
        }

        if self.disabled {
            return None;
        }
        if matches!(first_char, 'i' | 'j' | 'k' | 'l' | 'm' | 'n') {
            Some(TypeSpec::Integer(None))
        } else {
            Some(TypeSpec::Real(None))
        }
    }
}

/// A call statement, function reference, defined operation or defined
/// assignment, with its actual arguments analyzed.
#[derive(Debug, Clone)]
pub struct ProcedureReference {
    pub scope: ScopeId,
    pub designator: ProcedureDesignator,
    /// The generic the reference was written with, when it was resolved to
    /// a specific.
    pub generic: Option<SymbolId>,
    pub arguments: ActualArguments,
    pub is_function: bool,
    pub span: Span,
}

impl ProcedureReference {
    pub fn as_procedure_ref(&self) -> ProcedureRef {
        ProcedureRef {
            designator: self.designator.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ResolvedProgram {
    pub symbols: SymbolTable,
    pub intrinsics: IntrinsicProcTable,
    pub references: Vec<ProcedureReference>,
    pub errors: Vec<CompileError>,
}

impl ResolvedProgram {
    pub fn folding_context(&self) -> FoldingContext<'_> {
        FoldingContext::new(&self.symbols, &self.intrinsics)
    }
}

pub fn resolve(program: &ast::Program) -> ResolvedProgram {
    let mut resolver = Resolver::new();
    resolver.resolve_program(program);
    debug!(
        "resolved {} procedure references, {} errors",
        resolver.references.len(),
        resolver.errors.len()
    );
    ResolvedProgram {
        symbols: resolver.symbols,
        intrinsics: resolver.intrinsics,
        references: resolver.references,
        errors: resolver.errors,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    External,
    Contained,
    Interface { is_abstract: bool },
}

struct PendingGeneric<'p> {
    scope: ScopeId,
    generic: SymbolId,
    names: &'p [(String, Span)],
}

struct PendingBindings<'p> {
    type_symbol: SymbolId,
    type_scope: ScopeId,
    scope: ScopeId,
    bindings: &'p [Binding],
}

/// A call through a component: a binding, a procedure pointer component, or
/// a generic binding.
struct ComponentCall {
    procedure: SymbolId,
    generic: Option<SymbolId>,
    arguments: ActualArguments,
}

struct Resolver<'p> {
    symbols: SymbolTable,
    intrinsics: IntrinsicProcTable,
    implicit: HashMap<ScopeId, ImplicitTyping>,
    default_private: HashSet<ScopeId>,
    modules: HashMap<String, ScopeId>,
    result_symbols: HashSet<SymbolId>,
    pending_generics: Vec<PendingGeneric<'p>>,
    pending_bindings: Vec<PendingBindings<'p>>,
    bodies: Vec<(ScopeId, &'p [Stmt])>,
    references: Vec<ProcedureReference>,
    errors: Vec<CompileError>,
}

fn generic_name(spec: &GenericSpec) -> (String, GenericKind) {
    match spec {
        GenericSpec::Name(name) => (name.clone(), GenericKind::Name),
        GenericSpec::Operator(op) => {
            const INTRINSIC_DOTTED: &[&str] = &[".and.", ".or.", ".not.", ".eqv.", ".neqv."];
            let kind = if op.starts_with('.') && !INTRINSIC_DOTTED.contains(&op.as_str()) {
                GenericKind::DefinedOperator(op.clone())
            } else {
                GenericKind::IntrinsicOperator(op.clone())
            };
            (format!("operator({})", op), kind)
        }
        GenericSpec::Assignment => ("assignment(=)".to_string(), GenericKind::Assignment),
    }
}

fn intrinsic_operator(op: BinOp) -> Operator {
    match op {
        BinOp::Add => Operator::Add,
        BinOp::Sub => Operator::Subtract,
        BinOp::Mul => Operator::Multiply,
        BinOp::Div => Operator::Divide,
        BinOp::Pow => Operator::Power,
        BinOp::Concat => Operator::Concat,
        BinOp::Eq => Operator::Relational(RelationalOperator::Eq),
        BinOp::Ne => Operator::Relational(RelationalOperator::Ne),
        BinOp::Lt => Operator::Relational(RelationalOperator::Lt),
        BinOp::Le => Operator::Relational(RelationalOperator::Le),
        BinOp::Gt => Operator::Relational(RelationalOperator::Gt),
        BinOp::Ge => Operator::Relational(RelationalOperator::Ge),
        BinOp::And => Operator::And,
        BinOp::Or => Operator::Or,
        BinOp::Eqv => Operator::Eqv,
        BinOp::Neqv => Operator::Neqv,
    }
}

impl<'p> Resolver<'p> {
    fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            intrinsics: IntrinsicProcTable::configure(),
            implicit: HashMap::new(),
            default_private: HashSet::new(),
            modules: HashMap::new(),
            result_symbols: HashSet::new(),
            pending_generics: Vec::new(),
            pending_bindings: Vec::new(),
            bodies: Vec::new(),
            references: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn ctx(&self) -> FoldingContext<'_> {
        FoldingContext::new(&self.symbols, &self.intrinsics)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        let message = message.into();
        trace!("resolution error: {}", message);
        self.errors
            .push(CompileError::new(CompileErrorKind::Semantic, message, span));
    }

    /// Looks a name up through the host scopes. The global scope is not a
    /// host: external subprograms are only known through interfaces.
    fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let global = self.symbols.global();
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == global {
                return None;
            }
            let scope = self.symbols.scope(id);
            if let Some(found) = scope.lookup(name) {
                return Some(found);
            }
            current = scope.parent;
        }
        None
    }

    // The enclosing scope that owns implicitly declared entities; ASSOCIATE
    // blocks do not.
    fn scoping_unit(&self, mut scope: ScopeId) -> ScopeId {
        while self.symbols.scope(scope).kind == ScopeKind::Block {
            match self.symbols.scope(scope).parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }

    fn implicit_for(&self, scope: ScopeId) -> ImplicitTyping {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(typing) = self.implicit.get(&id) {
                return typing.clone();
            }
            current = self.symbols.scope(id).parent;
        }
        ImplicitTyping::new()
    }

    fn implicit_mut(&mut self, scope: ScopeId) -> &mut ImplicitTyping {
        if !self.implicit.contains_key(&scope) {
            let inherited = self.implicit_for(scope);
            self.implicit.insert(scope, inherited);
        }
        self.implicit.entry(scope).or_default()
    }

    fn implicit_type(&mut self, scope: ScopeId, name: &str, span: &Span) -> Option<DeclTypeSpec> {
        let type_spec = self.implicit_for(scope).get_implicit_type(name)?;
        self.decl_type_spec(scope, &type_spec, None, span)
    }

    // ---- declarations ----

    fn resolve_program(&mut self, program: &'p ast::Program) {
        let global = self.symbols.global();
        for unit in &program.units {
            match unit {
                ProgramUnit::Module(module) => {
                    let scope = self.symbols.add_scope(
                        ScopeKind::Module,
                        Some(module.name.clone()),
                        global,
                        None,
                    );
                    let id = self.symbols.add_symbol(
                        global,
                        &module.name,
                        Attrs::new(),
                        Details::Module(scope),
                        module.span.clone(),
                    );
                    self.symbols.scope_mut(scope).symbol = Some(id);
                    self.modules.insert(module.name.clone(), scope);
                    self.declare_scoping_unit(scope, &module.spec, &module.contains, &[], None);
                }
                ProgramUnit::Main(main) => {
                    let name = main.name.clone().unwrap_or_else(|| "_main".to_string());
                    let scope =
                        self.symbols
                            .add_scope(ScopeKind::MainProgram, Some(name.clone()), global, None);
                    let id = self.symbols.add_symbol(
                        global,
                        &name,
                        Attrs::new(),
                        Details::MainProgram(scope),
                        main.span.clone(),
                    );
                    self.symbols.scope_mut(scope).symbol = Some(id);
                    self.declare_scoping_unit(scope, &main.spec, &main.contains, &main.body, None);
                }
                ProgramUnit::Subprogram(subprogram) => {
                    let (_, scope) = self.declare_subprogram(global, subprogram, Role::External);
                    self.declare_scoping_unit(
                        scope,
                        &subprogram.spec,
                        &subprogram.contains,
                        &subprogram.body,
                        Some(subprogram),
                    );
                }
            }
        }
        for (scope, stmts) in std::mem::take(&mut self.bodies) {
            self.analyze_stmts(scope, stmts);
        }
        self.check_untyped();
    }

    fn declare_scoping_unit(
        &mut self,
        scope: ScopeId,
        spec: &'p [Decl],
        contains: &'p [Subprogram],
        body: &'p [Stmt],
        header: Option<&'p Subprogram>,
    ) {
        for decl in spec {
            self.declare(scope, decl);
        }
        if let Some(subprogram) = header {
            self.type_function_result(scope, subprogram);
        }
        let mut children = Vec::with_capacity(contains.len());
        for child in contains {
            let (_, child_scope) = self.declare_subprogram(scope, child, Role::Contained);
            children.push((child_scope, child));
        }
        self.resolve_pending();
        self.apply_implicit_types(scope);
        if !body.is_empty() {
            self.bodies.push((scope, body));
        }
        for (child_scope, child) in children {
            self.declare_scoping_unit(
                child_scope,
                &child.spec,
                &child.contains,
                &child.body,
                Some(child),
            );
        }
    }

    fn declare_subprogram(
        &mut self,
        host: ScopeId,
        subprogram: &'p Subprogram,
        role: Role,
    ) -> (SymbolId, ScopeId) {
        let mut attrs = Attrs::new();
        for prefix in &subprogram.prefixes {
            match prefix {
                Prefix::Pure => attrs.insert(Attr::Pure),
                Prefix::Impure => attrs.insert(Attr::Impure),
                Prefix::Elemental => attrs.insert(Attr::Elemental),
                Prefix::Recursive => attrs.insert(Attr::Recursive),
                Prefix::Module => continue,
            };
        }
        if subprogram.bind_c {
            attrs.insert(Attr::BindC);
        }
        let is_interface = matches!(role, Role::Interface { .. });
        if role == (Role::Interface { is_abstract: true }) {
            attrs.insert(Attr::Abstract);
        }

        let existing = self
            .symbols
            .scope(host)
            .lookup(&subprogram.name)
            .filter(|id| self.symbols.get(*id).owner == host);
        let mut is_dummy = false;
        let id = match existing {
            Some(id) if is_interface && self.symbols.get(id).is_dummy() => {
                is_dummy = true;
                id
            }
            // named earlier in an attribute statement, e.g. PRIVATE or OPTIONAL
            Some(id)
                if matches!(&self.symbols.get(id).details,
                    Details::Object(object) if object.type_spec.is_none() && !object.is_array()) =>
            {
                id
            }
            Some(_) => {
                self.error(
                    format!("'{}' is already declared in this scoping unit", subprogram.name),
                    subprogram.span.clone(),
                );
                self.symbols.add_symbol(
                    host,
                    &subprogram.name,
                    Attrs::new(),
                    Details::Error,
                    subprogram.span.clone(),
                )
            }
            None => self.symbols.add_symbol(
                host,
                &subprogram.name,
                Attrs::new(),
                Details::Error,
                subprogram.span.clone(),
            ),
        };

        let kind = if is_interface {
            ScopeKind::Interface
        } else {
            ScopeKind::Subprogram
        };
        let scope = self
            .symbols
            .add_scope(kind, Some(subprogram.name.clone()), host, Some(id));
        if is_interface {
            // interface bodies start from the default implicit rules
            self.symbols.scope_mut(scope).implicit_none = false;
            self.implicit.insert(scope, ImplicitTyping::new());
        }

        let dummy_args = subprogram
            .dummies
            .iter()
            .map(|dummy| match dummy {
                DummyName::Name(name, span) => Some(self.symbols.add_symbol(
                    scope,
                    name,
                    Attrs::new(),
                    Details::Object(ObjectEntityDetails {
                        is_dummy: true,
                        ..Default::default()
                    }),
                    span.clone(),
                )),
                DummyName::Star(_) => None,
            })
            .collect();
        let result = match &subprogram.kind {
            SubprogramKind::Function { result, .. } => {
                let name = result.as_deref().unwrap_or(&subprogram.name);
                let result = self.symbols.add_symbol(
                    scope,
                    name,
                    Attrs::new(),
                    Details::Object(ObjectEntityDetails::default()),
                    subprogram.span.clone(),
                );
                self.result_symbols.insert(result);
                Some(result)
            }
            SubprogramKind::Subroutine => None,
        };

        let symbol = self.symbols.get_mut(id);
        symbol.attrs.extend(attrs);
        symbol.details = Details::Subprogram(SubprogramDetails {
            dummy_args,
            result,
            is_interface,
            is_dummy,
            scope: Some(scope),
        });
        trace!("declared subprogram '{}' ({:?})", subprogram.name, role);
        (id, scope)
    }

    fn type_function_result(&mut self, scope: ScopeId, subprogram: &'p Subprogram) {
        let SubprogramKind::Function {
            type_spec: Some(type_spec),
            ..
        } = &subprogram.kind
        else {
            return;
        };
        let Some(result) = self
            .symbols
            .scope(scope)
            .symbol
            .and_then(|id| self.symbols.get(id).subprogram())
            .and_then(|details| details.result)
        else {
            return;
        };
        let decl_type = self.decl_type_spec(scope, type_spec, None, &subprogram.span);
        let duplicate = match &mut self.symbols.get_mut(result).details {
            Details::Object(object) if object.type_spec.is_none() => {
                object.type_spec = decl_type;
                false
            }
            Details::Object(_) => true,
            _ => false,
        };
        if duplicate {
            self.error(
                format!(
                    "The type of function result '{}' is declared more than once",
                    subprogram.name
                ),
                subprogram.span.clone(),
            );
        }
    }

    fn declare(&mut self, scope: ScopeId, decl: &'p Decl) {
        match decl {
            Decl::Use { module, span } => self.use_module(scope, module, span),
            Decl::ImplicitNone { .. } => {
                self.implicit_mut(scope).apply_implicit_none();
                self.symbols.scope_mut(scope).implicit_none = true;
            }
            Decl::Implicit { rules, .. } => {
                for rule in rules {
                    self.implicit_mut(scope)
                        .add_rule(rule.type_spec.clone(), rule.letter_ranges.clone());
                }
            }
            Decl::TypeDecl {
                type_spec,
                attrs,
                entities,
                ..
            } => {
                for entity in entities {
                    self.declare_entity(scope, type_spec, attrs, entity);
                }
            }
            Decl::AttrStmt { attr, names, .. } => {
                if names.is_empty() {
                    if matches!(attr, AttrSpec::Private) {
                        self.default_private.insert(scope);
                    }
                    return;
                }
                for (name, span) in names {
                    let id = self.local_entity(scope, name, span);
                    if let AttrSpec::Dimension(dims) = attr {
                        let shape = self.array_spec(scope, dims);
                        if let Details::Object(object) = &mut self.symbols.get_mut(id).details {
                            object.shape = shape;
                        }
                    } else {
                        self.apply_attr(id, attr, span);
                    }
                }
            }
            Decl::ProcedureDecl {
                interface,
                attrs,
                names,
                span,
            } => self.declare_procedure_entities(scope, interface.as_ref(), attrs, names, span),
            Decl::Interface(block) => self.declare_interface(scope, block),
            Decl::DerivedType(def) => self.declare_derived_type(scope, def),
        }
    }

    fn use_module(&mut self, scope: ScopeId, module: &str, span: &Span) {
        let Some(&module_scope) = self.modules.get(module) else {
            self.error(format!("Module '{}' not found", module), span.clone());
            return;
        };
        let default_private = self.default_private.contains(&module_scope);
        let exported: Vec<(String, SymbolId)> = self
            .symbols
            .scope(module_scope)
            .symbols()
            .filter(|(_, id)| {
                let symbol = self.symbols.get(*id);
                symbol.has(Attr::Public) || (!symbol.has(Attr::Private) && !default_private)
            })
            .map(|(name, id)| (name.to_string(), id))
            .collect();
        trace!("use {}: {} names", module, exported.len());
        for (name, id) in exported {
            self.symbols.import(scope, &name, id);
        }
    }

    // The symbol for `name` declared in `scope` itself, created as an
    // untyped object when this is its first appearance.
    fn local_entity(&mut self, scope: ScopeId, name: &str, span: &Span) -> SymbolId {
        if let Some(id) = self.symbols.scope(scope).lookup(name) {
            if self.symbols.get(id).owner == scope {
                return id;
            }
            self.error(
                format!("'{}' is use-associated and may not be redeclared", name),
                span.clone(),
            );
        }
        self.symbols.add_symbol(
            scope,
            name,
            Attrs::new(),
            Details::Object(ObjectEntityDetails::default()),
            span.clone(),
        )
    }

    fn declare_entity(
        &mut self,
        scope: ScopeId,
        type_spec: &TypeSpec,
        attrs: &[AttrSpec],
        entity: &EntityDecl,
    ) {
        let decl_type = self.decl_type_spec(scope, type_spec, entity.len.as_ref(), &entity.span);
        let id = self.local_entity(scope, &entity.name, &entity.span);
        let dims = entity.dims.as_ref().or_else(|| {
            attrs.iter().find_map(|attr| match attr {
                AttrSpec::Dimension(dims) => Some(dims),
                _ => None,
            })
        });
        let shape = dims.map(|dims| self.array_spec(scope, dims)).unwrap_or_default();
        let codims = entity.codims.as_ref().or_else(|| {
            attrs.iter().find_map(|attr| match attr {
                AttrSpec::Codimension(dims) => Some(dims),
                _ => None,
            })
        });
        let coshape = codims.map(|dims| self.array_spec(scope, dims)).unwrap_or_default();
        let init = entity
            .init
            .as_ref()
            .and_then(|init| self.analyze_expr(scope, init))
            .map(|init| self.fold_kind_inquiry(init));

        for attr in attrs {
            self.apply_attr(id, attr, &entity.span);
        }
        let symbol = self.symbols.get_mut(id);
        let mut redeclared = false;
        match &mut symbol.details {
            Details::Object(object) => {
                if object.type_spec.is_some() {
                    redeclared = true;
                }
                object.type_spec = decl_type;
                if !shape.is_empty() {
                    object.shape = shape;
                }
                if !coshape.is_empty() {
                    object.coshape = coshape;
                }
                object.init = init;
            }
            Details::ProcEntity(entity) => {
                if entity.interface.type_spec.is_some() || entity.interface.symbol.is_some() {
                    redeclared = true;
                }
                entity.interface.type_spec = decl_type;
            }
            _ => redeclared = true,
        }
        if redeclared {
            self.error(
                format!("The type of '{}' has already been declared", entity.name),
                entity.span.clone(),
            );
        }
    }

    fn apply_attr(&mut self, id: SymbolId, attr: &AttrSpec, span: &Span) {
        let attr = match attr {
            AttrSpec::Allocatable => Attr::Allocatable,
            AttrSpec::Asynchronous => Attr::Asynchronous,
            AttrSpec::BindC => Attr::BindC,
            AttrSpec::Contiguous => Attr::Contiguous,
            AttrSpec::Intent(IntentSpec::In) => Attr::IntentIn,
            AttrSpec::Intent(IntentSpec::Out) => Attr::IntentOut,
            AttrSpec::Intent(IntentSpec::InOut) => Attr::IntentInOut,
            AttrSpec::Optional => Attr::Optional,
            AttrSpec::Parameter => Attr::Parameter,
            AttrSpec::Pointer => Attr::Pointer,
            AttrSpec::Private => Attr::Private,
            AttrSpec::Protected => Attr::Protected,
            AttrSpec::Public => Attr::Public,
            AttrSpec::Save => Attr::Save,
            AttrSpec::Target => Attr::Target,
            AttrSpec::Value => Attr::Value,
            AttrSpec::Volatile => Attr::Volatile,
            AttrSpec::NoPass => Attr::NoPass,
            AttrSpec::Deferred => Attr::Deferred,
            AttrSpec::External => {
                self.convert_to_proc_entity(id);
                Attr::External
            }
            AttrSpec::Intrinsic => {
                let name = self.symbols.get(id).name.clone();
                if !self.intrinsics.is_intrinsic(&name) {
                    self.error(
                        format!("'{}' is not a known intrinsic procedure", name),
                        span.clone(),
                    );
                }
                self.convert_to_proc_entity(id);
                Attr::Intrinsic
            }
            AttrSpec::Pass(name) => {
                if let Details::ProcEntity(entity) = &mut self.symbols.get_mut(id).details {
                    entity.pass_name = name.clone();
                }
                return;
            }
            AttrSpec::Dimension(_) | AttrSpec::Codimension(_) => return,
        };
        self.symbols.get_mut(id).attrs.insert(attr);
    }

    // An object named as a procedure becomes a procedure entity; its
    // declared type, if any, becomes the result type.
    fn convert_to_proc_entity(&mut self, id: SymbolId) {
        let symbol = self.symbols.get_mut(id);
        if let Details::Object(object) = &symbol.details {
            if object.is_array() {
                return;
            }
            let details = ProcEntityDetails {
                interface: ProcInterface {
                    symbol: None,
                    type_spec: object.type_spec.clone(),
                },
                is_dummy: object.is_dummy,
                pass_name: None,
            };
            trace!("'{}' is a procedure entity", symbol.name);
            symbol.details = Details::ProcEntity(details);
        }
    }

    fn declare_procedure_entities(
        &mut self,
        scope: ScopeId,
        interface: Option<&ProcInterfaceName>,
        attrs: &[AttrSpec],
        names: &[(String, Span)],
        span: &Span,
    ) {
        let interface = match interface {
            Some(ProcInterfaceName::Name(name)) => match self.lookup(scope, name) {
                Some(id) if self.symbols.get(id).is_procedure() => ProcInterface {
                    symbol: Some(id),
                    type_spec: None,
                },
                _ => {
                    self.error(format!("Procedure interface '{}' not found", name), span.clone());
                    ProcInterface::default()
                }
            },
            Some(ProcInterfaceName::Type(type_spec)) => ProcInterface {
                symbol: None,
                type_spec: self.decl_type_spec(scope, type_spec, None, span),
            },
            None => ProcInterface::default(),
        };
        for (name, name_span) in names {
            let id = self.local_entity(scope, name, name_span);
            let symbol = self.symbols.get_mut(id);
            let is_dummy = symbol.is_dummy();
            symbol.details = Details::ProcEntity(ProcEntityDetails {
                interface: interface.clone(),
                is_dummy,
                pass_name: None,
            });
            for attr in attrs {
                self.apply_attr(id, attr, name_span);
            }
        }
    }

    fn declare_interface(&mut self, scope: ScopeId, block: &'p InterfaceBlock) {
        let spec = match &block.kind {
            InterfaceKind::Unnamed | InterfaceKind::Abstract => {
                let is_abstract = matches!(block.kind, InterfaceKind::Abstract);
                for body in &block.bodies {
                    let (_, body_scope) =
                        self.declare_subprogram(scope, body, Role::Interface { is_abstract });
                    self.declare_scoping_unit(body_scope, &body.spec, &[], &[], Some(body));
                }
                return;
            }
            InterfaceKind::Generic(spec) => spec,
        };
        let (name, kind) = generic_name(spec);
        let generic = self.generic_symbol(scope, &name, kind, &block.span);
        let mut specifics = Vec::with_capacity(block.bodies.len());
        for body in &block.bodies {
            let (id, body_scope) =
                self.declare_subprogram(scope, body, Role::Interface { is_abstract: false });
            self.declare_scoping_unit(body_scope, &body.spec, &[], &[], Some(body));
            specifics.push(id);
        }
        // a specific may share the generic's name
        self.symbols.import(scope, &name, generic);
        if let Details::Generic(details) = &mut self.symbols.get_mut(generic).details {
            details.specifics.extend(specifics);
        }
        if !block.module_procedures.is_empty() {
            self.pending_generics.push(PendingGeneric {
                scope,
                generic,
                names: &block.module_procedures,
            });
        }
    }

    // The generic `name` local to `scope`; one visible from elsewhere is
    // extended by a local copy.
    fn generic_symbol(&mut self, scope: ScopeId, name: &str, kind: GenericKind, span: &Span) -> SymbolId {
        let mut inherited = Vec::new();
        if let Some(id) = self.lookup(scope, name) {
            let symbol = self.symbols.get(id);
            if let Some(generic) = symbol.generic() {
                if symbol.owner == scope {
                    return id;
                }
                inherited = generic.specifics.clone();
            }
        }
        self.symbols.add_symbol(
            scope,
            name,
            Attrs::new(),
            Details::Generic(GenericDetails {
                kind,
                specifics: inherited,
            }),
            span.clone(),
        )
    }

    fn declare_derived_type(&mut self, scope: ScopeId, def: &'p DerivedTypeDef) {
        let parent = match &def.extends {
            Some(parent) => match self.lookup(scope, parent) {
                Some(id) if matches!(self.symbols.get(id).details, Details::DerivedType(_)) => Some(id),
                _ => {
                    self.error(
                        format!("Parent type '{}' of '{}' not found", parent, def.name),
                        def.span.clone(),
                    );
                    None
                }
            },
            None => None,
        };
        let mut attrs = Attrs::new();
        if def.is_abstract {
            attrs.insert(Attr::Abstract);
        }
        let id = self.symbols.add_symbol(
            scope,
            &def.name,
            attrs,
            Details::DerivedType(DerivedTypeDetails {
                parent,
                ..Default::default()
            }),
            def.span.clone(),
        );
        let type_scope =
            self.symbols
                .add_scope(ScopeKind::DerivedType, Some(def.name.clone()), scope, Some(id));
        let first = self.symbols.symbols().count();
        for decl in &def.components {
            self.declare(type_scope, decl);
        }
        let components: Vec<SymbolId> = self
            .symbols
            .symbols()
            .skip(first)
            .filter(|(_, symbol)| symbol.owner == type_scope)
            .map(|(id, _)| id)
            .collect();
        if let Details::DerivedType(details) = &mut self.symbols.get_mut(id).details {
            details.components = components;
            details.scope = Some(type_scope);
        }
        if !def.bindings.is_empty() {
            self.pending_bindings.push(PendingBindings {
                type_symbol: id,
                type_scope,
                scope,
                bindings: &def.bindings,
            });
        }
    }

    fn resolve_pending(&mut self) {
        for pending in std::mem::take(&mut self.pending_generics) {
            let mut specifics = Vec::with_capacity(pending.names.len());
            for (name, span) in pending.names {
                match self.lookup(pending.scope, name) {
                    Some(id) if self.symbols.get(id).subprogram().is_some() => specifics.push(id),
                    Some(id)
                        if matches!(&self.symbols.get(id).details,
                            Details::ProcEntity(entity) if entity.interface.symbol.is_some()) =>
                    {
                        specifics.push(id)
                    }
                    Some(_) => self.error(
                        format!("'{}' is not a procedure with an explicit interface", name),
                        span.clone(),
                    ),
                    None => self.error(format!("Procedure '{}' not found", name), span.clone()),
                }
            }
            if let Details::Generic(details) = &mut self.symbols.get_mut(pending.generic).details {
                details.specifics.extend(specifics);
            }
        }
        for pending in std::mem::take(&mut self.pending_bindings) {
            self.declare_bindings(pending);
        }
    }

    fn declare_bindings(&mut self, pending: PendingBindings<'p>) {
        let type_name = self.symbols.get(pending.type_symbol).name.clone();
        for binding in pending.bindings {
            match binding {
                Binding::Specific {
                    name,
                    procedure,
                    interface,
                    attrs,
                    span,
                } => {
                    let target_name = interface.as_ref().or(procedure.as_ref()).unwrap_or(name);
                    let target = self
                        .lookup(pending.scope, target_name)
                        .filter(|id| self.symbols.get(*id).is_procedure());
                    let Some(target) = target else {
                        self.error(
                            format!("Procedure '{}' of binding '{}' not found", target_name, name),
                            span.clone(),
                        );
                        continue;
                    };
                    let mut binding_attrs = Attrs::new();
                    let mut pass_name = None;
                    for attr in attrs {
                        match attr {
                            AttrSpec::NoPass => {
                                binding_attrs.insert(Attr::NoPass);
                            }
                            AttrSpec::Deferred => {
                                binding_attrs.insert(Attr::Deferred);
                            }
                            AttrSpec::Private => {
                                binding_attrs.insert(Attr::Private);
                            }
                            AttrSpec::Public => {
                                binding_attrs.insert(Attr::Public);
                            }
                            AttrSpec::Pass(name) => pass_name = name.clone(),
                            _ => {}
                        }
                    }
                    let id = self.symbols.add_symbol(
                        pending.type_scope,
                        name,
                        binding_attrs,
                        Details::ProcBinding(ProcBindingDetails {
                            procedure: target,
                            pass_name,
                        }),
                        span.clone(),
                    );
                    if let Details::DerivedType(details) =
                        &mut self.symbols.get_mut(pending.type_symbol).details
                    {
                        details.bindings.push(id);
                    }
                }
                Binding::Generic {
                    spec,
                    specifics,
                    span,
                } => {
                    let (generic_name, kind) = generic_name(spec);
                    let mut ids = match self.find_component(pending.type_symbol, &generic_name) {
                        Some(id) => self
                            .symbols
                            .get(id)
                            .generic()
                            .map(|generic| generic.specifics.clone())
                            .unwrap_or_default(),
                        None => Vec::new(),
                    };
                    for specific in specifics {
                        match self.find_component(pending.type_symbol, specific) {
                            Some(id)
                                if matches!(self.symbols.get(id).details, Details::ProcBinding(_)) =>
                            {
                                ids.push(id)
                            }
                            _ => self.error(
                                format!(
                                    "'{}' is not a type-bound procedure of type '{}'",
                                    specific, type_name
                                ),
                                span.clone(),
                            ),
                        }
                    }
                    let local = self
                        .symbols
                        .scope(pending.type_scope)
                        .lookup(&generic_name)
                        .filter(|id| self.symbols.get(*id).generic().is_some());
                    match local {
                        Some(id) => {
                            if let Details::Generic(details) = &mut self.symbols.get_mut(id).details {
                                details.specifics = ids;
                            }
                        }
                        None => {
                            let id = self.symbols.add_symbol(
                                pending.type_scope,
                                &generic_name,
                                Attrs::new(),
                                Details::Generic(GenericDetails {
                                    kind,
                                    specifics: ids,
                                }),
                                span.clone(),
                            );
                            if let Details::DerivedType(details) =
                                &mut self.symbols.get_mut(pending.type_symbol).details
                            {
                                details.bindings.push(id);
                            }
                        }
                    }
                }
            }
        }
    }

    fn find_component(&self, type_symbol: SymbolId, name: &str) -> Option<SymbolId> {
        let mut current = Some(type_symbol);
        while let Some(id) = current {
            let Details::DerivedType(details) = &self.symbols.get(id).details else {
                return None;
            };
            if let Some(found) = details
                .scope
                .and_then(|scope| self.symbols.scope(scope).lookup(name))
            {
                return Some(found);
            }
            current = details.parent;
        }
        None
    }

    fn apply_implicit_types(&mut self, scope: ScopeId) {
        let untyped: Vec<(String, SymbolId, Span)> = self
            .symbols
            .scope(scope)
            .symbols()
            .filter_map(|(name, id)| {
                let symbol = self.symbols.get(id);
                match &symbol.details {
                    Details::Object(object) if symbol.owner == scope && object.type_spec.is_none() => {
                        Some((name.to_string(), id, symbol.span.clone()))
                    }
                    _ => None,
                }
            })
            .collect();
        for (name, id, span) in untyped {
            if let Some(type_spec) = self.implicit_type(scope, &name, &span) {
                let symbol = self.symbols.get_mut(id);
                symbol.flags.insert(Flag::ImplicitlyTyped);
                if let Details::Object(object) = &mut symbol.details {
                    object.type_spec = Some(type_spec);
                }
            }
        }
    }

    fn check_untyped(&mut self) {
        let untyped: Vec<(String, Span)> = self
            .symbols
            .symbols()
            .filter(|(_, symbol)| {
                matches!(&symbol.details, Details::Object(object) if object.type_spec.is_none())
            })
            .map(|(_, symbol)| (symbol.name.clone(), symbol.span.clone()))
            .collect();
        for (name, span) in untyped {
            self.error(format!("No explicit type declared for '{}'", name), span);
        }
    }

    // ---- types ----

    fn decl_type_spec(
        &mut self,
        scope: ScopeId,
        type_spec: &TypeSpec,
        entity_len: Option<&LenParam>,
        span: &Span,
    ) -> Option<DeclTypeSpec> {
        let intrinsic = |category, kind| DeclTypeSpec::Intrinsic {
            category,
            kind,
            length: None,
        };
        match type_spec {
            TypeSpec::Integer(kind) => {
                let kind = self.kind_param(scope, TypeCategory::Integer, kind.as_ref(), span)?;
                Some(intrinsic(TypeCategory::Integer, kind))
            }
            TypeSpec::Real(kind) => {
                let kind = self.kind_param(scope, TypeCategory::Real, kind.as_ref(), span)?;
                Some(intrinsic(TypeCategory::Real, kind))
            }
            TypeSpec::DoublePrecision => Some(intrinsic(TypeCategory::Real, 8)),
            TypeSpec::Complex(kind) => {
                let kind = self.kind_param(scope, TypeCategory::Complex, kind.as_ref(), span)?;
                Some(intrinsic(TypeCategory::Complex, kind))
            }
            TypeSpec::Logical(kind) => {
                let kind = self.kind_param(scope, TypeCategory::Logical, kind.as_ref(), span)?;
                Some(intrinsic(TypeCategory::Logical, kind))
            }
            TypeSpec::Character { len, kind } => {
                let kind = self.kind_param(scope, TypeCategory::Character, kind.as_ref(), span)?;
                let length = match entity_len.or(len.as_ref()) {
                    Some(LenParam::Expr(len)) => {
                        let len = self.analyze_expr(scope, len)?;
                        Some(ParamValue::Explicit(self.ctx().fold(&len)))
                    }
                    Some(LenParam::Star) => Some(ParamValue::Assumed),
                    Some(LenParam::Colon) => Some(ParamValue::Deferred),
                    None => None,
                };
                Some(DeclTypeSpec::Intrinsic {
                    category: TypeCategory::Character,
                    kind,
                    length,
                })
            }
            TypeSpec::Type(name) | TypeSpec::Class(name) => {
                let found = self
                    .lookup(scope, name)
                    .filter(|id| matches!(self.symbols.get(*id).details, Details::DerivedType(_)));
                match found {
                    Some(id) if matches!(type_spec, TypeSpec::Class(_)) => Some(DeclTypeSpec::ClassDerived(id)),
                    Some(id) => Some(DeclTypeSpec::TypeDerived(id)),
                    None => {
                        self.error(format!("Derived type '{}' not found", name), span.clone());
                        None
                    }
                }
            }
            TypeSpec::TypeStar => Some(DeclTypeSpec::TypeStar),
            TypeSpec::ClassStar => Some(DeclTypeSpec::ClassStar),
        }
    }

    fn kind_param(
        &mut self,
        scope: ScopeId,
        category: TypeCategory,
        kind: Option<&ast::Expr>,
        span: &Span,
    ) -> Option<u8> {
        let Some(kind) = kind else {
            return Some(category.default_kind());
        };
        let kind = self.analyze_expr(scope, kind)?;
        let kind = self.fold_kind_inquiry(kind);
        match self.ctx().fold_integer(&kind) {
            Some(value) if category.is_valid_kind(value) => u8::try_from(value).ok(),
            Some(value) => {
                self.error(
                    format!("{:?} kind {} is not supported", category, value),
                    span.clone(),
                );
                None
            }
            None => {
                self.error("Kind parameter must be a constant expression", span.clone());
                None
            }
        }
    }

    // Evaluates `KIND()`, `SELECTED_INT_KIND()` and `SELECTED_REAL_KIND()`
    // of constants so that named kind parameters fold.
    fn fold_kind_inquiry(&self, expr: Expr) -> Expr {
        let value = match &expr {
            Expr::FunctionRef(call) => match &call.designator {
                ProcedureDesignator::Intrinsic(name) => {
                    let ctx = self.ctx();
                    let first = call
                        .arguments
                        .first()
                        .and_then(|arg| arg.as_ref())
                        .and_then(|arg| arg.unwrap_expr());
                    match name.as_str() {
                        "kind" => first.and_then(|arg| ctx.type_of(arg)).map(|t| i64::from(t.kind())),
                        "selected_int_kind" => first.and_then(|arg| ctx.fold_integer(arg)).map(|range| {
                            match range {
                                i64::MIN..=2 => 1,
                                3..=4 => 2,
                                5..=9 => 4,
                                10..=18 => 8,
                                _ => 16,
                            }
                        }),
                        "selected_real_kind" => first
                            .and_then(|arg| ctx.fold_integer(arg))
                            .map(|precision| match precision {
                                i64::MIN..=6 => 4,
                                7..=15 => 8,
                                _ => 16,
                            }),
                        _ => None,
                    }
                }
                ProcedureDesignator::Symbol(_) => None,
            },
            _ => None,
        };
        match value {
            Some(value) => Expr::int(value),
            None => expr,
        }
    }

    fn literal_kind(&mut self, scope: ScopeId, kind: Option<&String>, default: u8, span: &Span) -> Option<u8> {
        let Some(kind) = kind else {
            return Some(default);
        };
        if let Ok(value) = kind.parse::<u8>() {
            return Some(value);
        }
        let value = self
            .lookup(scope, kind)
            .and_then(|id| self.ctx().fold_integer(&Expr::symbol(id)))
            .and_then(|value| u8::try_from(value).ok());
        if value.is_none() {
            self.error(
                format!("Kind parameter '{}' is not a named integer constant", kind),
                span.clone(),
            );
        }
        value
    }

    fn array_spec(&mut self, scope: ScopeId, dims: &[DimSpec]) -> ArraySpec {
        let bound = |resolver: &mut Self, expr: &ast::Expr| {
            resolver
                .analyze_expr(scope, expr)
                .map(|expr| resolver.ctx().fold(&expr))
        };
        let mut shape = Vec::with_capacity(dims.len());
        for dim in dims {
            let spec = match dim {
                DimSpec::Explicit { lower, upper } => {
                    let lower = lower.as_ref().and_then(|lower| bound(self, lower));
                    match bound(self, upper) {
                        Some(upper) => ShapeSpec::Explicit { lower, upper },
                        None => continue,
                    }
                }
                DimSpec::Colon { lower } => ShapeSpec::Colon {
                    lower: lower.as_ref().and_then(|lower| bound(self, lower)),
                },
                DimSpec::Star { lower } => ShapeSpec::AssumedSize {
                    lower: lower.as_ref().and_then(|lower| bound(self, lower)),
                },
                DimSpec::AssumedRank => ShapeSpec::AssumedRank,
            };
            shape.push(spec);
        }
        shape
    }

    // ---- expressions ----

    fn analyze_expr(&mut self, scope: ScopeId, expr: &ast::Expr) -> Option<Expr> {
        let span = &expr.span;
        match &expr.kind {
            ExprKind::Int { digits, kind } => {
                let kind = self.literal_kind(scope, kind.as_ref(), 4, span)?;
                match digits.parse::<i64>() {
                    Ok(value) => Some(Expr::Literal(Literal::Integer { value, kind })),
                    Err(_) => {
                        self.error(format!("Integer literal '{}' is too large", digits), span.clone());
                        None
                    }
                }
            }
            ExprKind::Real { text, kind } => {
                let default = if text.contains(['d', 'D']) { 8 } else { 4 };
                let kind = self.literal_kind(scope, kind.as_ref(), default, span)?;
                Some(Expr::Literal(Literal::Real {
                    text: text.clone(),
                    kind,
                }))
            }
            ExprKind::Complex(re, im) => {
                let re = self.analyze_expr(scope, re);
                let im = self.analyze_expr(scope, im);
                let (re, im) = (re?, im?);
                let ctx = self.ctx();
                let kind = [&re, &im]
                    .iter()
                    .filter_map(|part| ctx.type_of(part))
                    .filter(|t| t.category() == TypeCategory::Real)
                    .map(|t| t.kind())
                    .max()
                    .unwrap_or(4);
                Some(Expr::Literal(Literal::Complex {
                    re: re.as_fortran(&self.symbols),
                    im: im.as_fortran(&self.symbols),
                    kind,
                }))
            }
            ExprKind::Str(value) => Some(Expr::Literal(Literal::Character {
                value: value.clone(),
                kind: 1,
            })),
            ExprKind::Logical(value) => Some(Expr::Literal(Literal::Logical {
                value: *value,
                kind: 4,
            })),
            ExprKind::Boz(text) => Some(Expr::Boz(text.clone())),
            ExprKind::Name(name) => self.analyze_name(scope, name, span),
            ExprKind::Call(target, args) => match &target.kind {
                ExprKind::Name(name) => self.analyze_function_call(scope, name, args, span),
                ExprKind::Component(base, name) => {
                    self.analyze_component_call(scope, base, name, args, true, span)
                }
                _ => {
                    self.error("Unsupported procedure reference", span.clone());
                    None
                }
            },
            ExprKind::Component(base, name) => {
                let base = self.analyze_expr(scope, base)?;
                let component = self.component_of(&base, name, span)?;
                match &self.symbols.get(component).details {
                    Details::Object(_) => Some(Expr::symbol(component)),
                    _ => Some(Expr::Procedure(ProcedureDesignator::Symbol(component))),
                }
            }
            ExprKind::Coindexed(inner) => match self.analyze_expr(scope, inner)? {
                Expr::Designator(mut designator) => {
                    designator.coindexed = true;
                    Some(Expr::Designator(designator))
                }
                _ => {
                    self.error("Only a variable may be coindexed", span.clone());
                    None
                }
            },
            ExprKind::ArrayCtor(values) => {
                let mut analyzed = Vec::with_capacity(values.len());
                for value in values {
                    analyzed.push(self.analyze_expr(scope, value));
                }
                let values: Vec<Expr> = analyzed.into_iter().collect::<Option<_>>()?;
                let element_type = values
                    .first()
                    .and_then(|value| self.ctx().type_of(value))
                    .unwrap_or_else(|| DynamicType::integer(4));
                Some(Expr::ArrayConstructor {
                    element_type,
                    values,
                })
            }
            ExprKind::Paren(inner) => {
                let inner = self.analyze_expr(scope, inner)?;
                Some(Expr::unary(Operator::Parentheses, inner))
            }
            ExprKind::Bin(op, left, right) => {
                let left = self.analyze_expr(scope, left);
                let right = self.analyze_expr(scope, right);
                let (left, right) = (left?, right?);
                let operator = intrinsic_operator(*op);
                let ctx = self.ctx();
                let types = [ctx.type_of(&left), ctx.type_of(&right)];
                let derived = types
                    .iter()
                    .flatten()
                    .any(|t| t.category() == TypeCategory::Derived);
                let invalid = matches!(&types, [Some(_), Some(_)])
                    && operation_result_type(operator, &types).is_none();
                if derived || invalid {
                    let spelling = operator.spelling().to_ascii_lowercase();
                    self.defined_operation(scope, &spelling, vec![left, right], span)
                } else {
                    Some(Expr::binary(operator, left, right))
                }
            }
            ExprKind::Un(op, operand) => {
                let operand = self.analyze_expr(scope, operand)?;
                let derived = self
                    .ctx()
                    .type_of(&operand)
                    .map_or(false, |t| t.category() == TypeCategory::Derived);
                let (operator, spelling) = match op {
                    UnOp::Plus if !derived => return Some(operand),
                    UnOp::Plus => (Operator::Add, "+"),
                    UnOp::Neg => (Operator::Negate, "-"),
                    UnOp::Not => (Operator::Not, ".not."),
                };
                if derived {
                    self.defined_operation(scope, spelling, vec![operand], span)
                } else {
                    Some(Expr::unary(operator, operand))
                }
            }
            ExprKind::DefinedBin(op, left, right) => {
                let left = self.analyze_expr(scope, left);
                let right = self.analyze_expr(scope, right);
                let (left, right) = (left?, right?);
                self.defined_operation(scope, &format!(".{}.", op), vec![left, right], span)
            }
            ExprKind::DefinedUn(op, operand) => {
                let operand = self.analyze_expr(scope, operand)?;
                self.defined_operation(scope, &format!(".{}.", op), vec![operand], span)
            }
        }
    }

    fn analyze_name(&mut self, scope: ScopeId, name: &str, span: &Span) -> Option<Expr> {
        let Some(id) = self.lookup(scope, name) else {
            let id = self.implicit_variable(scope, name, span)?;
            return Some(Expr::symbol(id));
        };
        match &self.symbols.get(id).details {
            Details::Object(_) | Details::Assoc(_) => Some(Expr::symbol(id)),
            Details::ProcEntity(_) | Details::Subprogram(_) | Details::Generic(_) => {
                Some(Expr::Procedure(ProcedureDesignator::Symbol(id)))
            }
            Details::Error => None,
            _ => {
                self.error(format!("'{}' is not a data object", name), span.clone());
                None
            }
        }
    }

    fn implicit_variable(&mut self, scope: ScopeId, name: &str, span: &Span) -> Option<SymbolId> {
        let unit = self.scoping_unit(scope);
        let type_spec = self.implicit_type(unit, name, span);
        let details = match &type_spec {
            Some(_) => Details::Object(ObjectEntityDetails {
                type_spec,
                ..Default::default()
            }),
            None => {
                self.error(format!("No explicit type declared for '{}'", name), span.clone());
                Details::Error
            }
        };
        let ok = matches!(details, Details::Object(_));
        let id = self
            .symbols
            .add_symbol(unit, name, Attrs::new(), details, span.clone());
        self.symbols.get_mut(id).flags.insert(Flag::ImplicitlyTyped);
        ok.then_some(id)
    }

    fn implicit_procedure(&mut self, scope: ScopeId, name: &str, span: &Span, flag: Flag) -> SymbolId {
        let unit = self.scoping_unit(scope);
        let type_spec = if flag == Flag::Function {
            let type_spec = self.implicit_type(unit, name, span);
            if type_spec.is_none() {
                self.error(format!("No explicit type declared for '{}'", name), span.clone());
            }
            type_spec
        } else {
            None
        };
        let id = self.symbols.add_symbol(
            unit,
            name,
            Attrs::new(),
            Details::ProcEntity(ProcEntityDetails {
                interface: ProcInterface {
                    symbol: None,
                    type_spec,
                },
                ..Default::default()
            }),
            span.clone(),
        );
        let symbol = self.symbols.get_mut(id);
        symbol.flags.insert(flag);
        if flag == Flag::Function {
            symbol.flags.insert(Flag::ImplicitlyTyped);
        }
        debug!("'{}' has an implicit interface", name);
        id
    }

    fn analyze_subscripts(&mut self, scope: ScopeId, args: &[Arg]) -> Option<Vec<Subscript>> {
        let mut subscripts = Vec::with_capacity(args.len());
        let mut ok = true;
        for arg in args {
            if arg.keyword.is_some() {
                self.error("A subscript may not have a keyword", arg.span.clone());
                ok = false;
                continue;
            }
            let subscript = match &arg.value {
                ArgValue::Expr(expr) => self.analyze_expr(scope, expr).map(Subscript::Index),
                ArgValue::Triplet {
                    lower,
                    upper,
                    stride,
                } => {
                    let mut bound = |expr: &Option<ast::Expr>| match expr {
                        Some(expr) => self.analyze_expr(scope, expr).map(Some),
                        None => Some(None),
                    };
                    match (bound(lower), bound(upper), bound(stride)) {
                        (Some(lower), Some(upper), Some(stride)) => Some(Subscript::Triplet {
                            lower,
                            upper,
                            stride,
                        }),
                        _ => None,
                    }
                }
                ArgValue::Label(_) => {
                    self.error("An alternate return label is not a subscript", arg.span.clone());
                    None
                }
            };
            match subscript {
                Some(subscript) => subscripts.push(subscript),
                None => ok = false,
            }
        }
        ok.then_some(subscripts)
    }

    fn analyze_actuals(&mut self, scope: ScopeId, args: &[Arg]) -> Option<ActualArguments> {
        let mut actuals = Vec::with_capacity(args.len());
        let mut ok = true;
        for arg in args {
            match self.analyze_actual(scope, arg) {
                Some(actual) => actuals.push(Some(actual)),
                None => ok = false,
            }
        }
        ok.then_some(actuals)
    }

    fn analyze_actual(&mut self, scope: ScopeId, arg: &Arg) -> Option<ActualArgument> {
        let actual = match &arg.value {
            ArgValue::Label(label) => ActualArgument::alternate_return(*label),
            ArgValue::Triplet { .. } => {
                self.error(
                    "A subscript triplet may not appear as an actual argument",
                    arg.span.clone(),
                );
                return None;
            }
            ArgValue::Expr(expr) => match self.procedure_or_assumed_type(scope, expr) {
                Some(actual) => actual,
                None => ActualArgument::new(self.analyze_expr(scope, expr)?),
            },
        };
        let actual = actual.with_span(arg.span.clone());
        Some(match &arg.keyword {
            Some(keyword) => actual.with_keyword(keyword.clone()),
            None => actual,
        })
    }

    fn procedure_or_assumed_type(&mut self, scope: ScopeId, expr: &ast::Expr) -> Option<ActualArgument> {
        let name = expr.name()?;
        let id = self.lookup(scope, name)?;
        let symbol = self.symbols.get(id);
        match &symbol.details {
            Details::Subprogram(_) | Details::ProcEntity(_) => Some(ActualArgument::new(
                Expr::Procedure(ProcedureDesignator::Symbol(id)),
            )),
            Details::Generic(generic) => {
                let specific = generic
                    .specifics
                    .iter()
                    .copied()
                    .find(|specific| self.symbols.get(*specific).name == symbol.name);
                match specific {
                    Some(specific) => Some(ActualArgument::new(Expr::Procedure(
                        ProcedureDesignator::Symbol(specific),
                    ))),
                    None => {
                        self.error(
                            format!("Generic '{}' may not be passed as an actual argument", name),
                            expr.span.clone(),
                        );
                        Some(ActualArgument::new(Expr::Procedure(ProcedureDesignator::Symbol(id))))
                    }
                }
            }
            Details::Object(object)
                if object.is_dummy && object.type_spec == Some(DeclTypeSpec::TypeStar) =>
            {
                Some(ActualArgument::assumed_type(id))
            }
            _ => None,
        }
    }

    fn reference(
        &mut self,
        scope: ScopeId,
        procedure: ProcedureDesignator,
        generic: Option<SymbolId>,
        arguments: ActualArguments,
        is_function: bool,
        span: &Span,
    ) -> Expr {
        trace!(
            "reference to '{}' with {} arguments",
            procedure.name(&self.symbols),
            arguments.len()
        );
        self.references.push(ProcedureReference {
            scope,
            designator: procedure.clone(),
            generic,
            arguments: arguments.clone(),
            is_function,
            span: span.clone(),
        });
        Expr::FunctionRef(Box::new(ProcedureRef {
            designator: procedure,
            arguments,
        }))
    }

    fn analyze_function_call(&mut self, scope: ScopeId, name: &str, args: &[Arg], span: &Span) -> Option<Expr> {
        let Some(mut id) = self.lookup(scope, name) else {
            if name == "null" {
                return Some(Expr::Null);
            }
            let arguments = self.analyze_actuals(scope, args)?;
            if self.intrinsics.is_intrinsic(name) {
                return Some(Expr::FunctionRef(Box::new(ProcedureRef {
                    designator: ProcedureDesignator::Intrinsic(name.to_string()),
                    arguments,
                })));
            }
            let id = self.implicit_procedure(scope, name, span, Flag::Function);
            return Some(self.reference(scope, ProcedureDesignator::Symbol(id), None, arguments, true, span));
        };

        if self.result_symbols.contains(&id) {
            let is_array = self.symbols.get(id).object().map_or(false, |o| o.is_array());
            if !is_array {
                // a recursive reference through the function's own name
                match self.symbols.scope(self.symbols.get(id).owner).symbol {
                    Some(function) => id = function,
                    None => return None,
                }
            }
        }

        let symbol = self.symbols.get(id);
        match &symbol.details {
            Details::Object(_) | Details::Assoc(_) => {
                let rank = self.ctx().symbol_shape(id).map_or(1, |shape| shape.len());
                let is_character = self
                    .ctx()
                    .symbol_type(id)
                    .map_or(false, |t| t.category() == TypeCategory::Character);
                if rank > 0 {
                    let subscripts = self.analyze_subscripts(scope, args)?;
                    return Some(Expr::Designator(Designator {
                        symbol: id,
                        subscripts,
                        coindexed: false,
                    }));
                }
                if is_character {
                    // substring
                    self.analyze_subscripts(scope, args)?;
                    return Some(Expr::symbol(id));
                }
                if matches!(symbol.details, Details::Assoc(_)) {
                    self.error(format!("'{}' is not a function", name), span.clone());
                    return None;
                }
                self.convert_to_proc_entity(id);
                self.symbols.get_mut(id).flags.insert(Flag::Function);
                let arguments = self.analyze_actuals(scope, args)?;
                Some(self.reference(scope, ProcedureDesignator::Symbol(id), None, arguments, true, span))
            }
            Details::Subprogram(subprogram) => {
                if !subprogram.is_function() {
                    self.error(
                        format!("'{}' is a subroutine and may not be referenced as a function", name),
                        span.clone(),
                    );
                    return None;
                }
                let arguments = self.analyze_actuals(scope, args)?;
                Some(self.reference(scope, ProcedureDesignator::Symbol(id), None, arguments, true, span))
            }
            Details::ProcEntity(entity) => {
                let implicit = entity.interface.symbol.is_none();
                if implicit && symbol.test(Flag::Subroutine) {
                    self.error(
                        format!("'{}' is referenced both as a subroutine and as a function", name),
                        span.clone(),
                    );
                    return None;
                }
                if implicit && !symbol.has(Attr::Intrinsic) {
                    self.symbols.get_mut(id).flags.insert(Flag::Function);
                }
                let arguments = self.analyze_actuals(scope, args)?;
                Some(self.reference(scope, ProcedureDesignator::Symbol(id), None, arguments, true, span))
            }
            Details::Generic(_) => {
                let arguments = self.analyze_actuals(scope, args)?;
                let specific = self.resolve_generic(id, &arguments, true, span)?;
                Some(self.reference(
                    scope,
                    ProcedureDesignator::Symbol(specific),
                    Some(id),
                    arguments,
                    true,
                    span,
                ))
            }
            Details::Error => None,
            _ => {
                self.error(format!("'{}' is not a function", name), span.clone());
                None
            }
        }
    }

    fn find_specific(&self, generic: SymbolId, actuals: &ActualArguments, is_function: bool) -> Option<SymbolId> {
        let ctx = self.ctx();
        let specifics = &self.symbols.get(generic).generic()?.specifics;
        specifics.iter().copied().find(|specific| {
            match Procedure::characterize_symbol(*specific, &ctx) {
                Some(procedure) => {
                    procedure.is_function() == is_function
                        && check_interface_for_generic(&procedure, actuals, &ctx)
                }
                None => false,
            }
        })
    }

    fn resolve_generic(
        &mut self,
        generic: SymbolId,
        actuals: &ActualArguments,
        is_function: bool,
        span: &Span,
    ) -> Option<SymbolId> {
        let found = self.find_specific(generic, actuals, is_function);
        match found {
            Some(specific) => {
                debug!(
                    "generic '{}' resolved to '{}'",
                    self.symbols.get(generic).name,
                    self.symbols.get(specific).name
                );
            }
            None => {
                let kind = if is_function { "function" } else { "subroutine" };
                self.error(
                    format!(
                        "No specific {} of generic '{}' matches the actual arguments",
                        kind,
                        self.symbols.get(generic).name
                    ),
                    span.clone(),
                );
            }
        }
        found
    }

    fn derived_type_of(&self, expr: &Expr) -> Option<SymbolId> {
        let id = expr.last_symbol()?;
        if let Details::Assoc(assoc) = &self.symbols.get(id).details {
            return self.derived_type_of(&assoc.expr);
        }
        match self.ctx().symbol_type_spec(id)? {
            DeclTypeSpec::TypeDerived(id) | DeclTypeSpec::ClassDerived(id) => Some(*id),
            _ => None,
        }
    }

    fn component_of(&mut self, base: &Expr, name: &str, span: &Span) -> Option<SymbolId> {
        let Some(type_symbol) = self.derived_type_of(base) else {
            self.error(
                format!(
                    "'{}' is not an object of derived type",
                    base.as_fortran(&self.symbols)
                ),
                span.clone(),
            );
            return None;
        };
        let found = self.find_component(type_symbol, name);
        if found.is_none() {
            self.error(
                format!(
                    "'{}' is not a component or binding of type '{}'",
                    name,
                    self.symbols.get(type_symbol).name
                ),
                span.clone(),
            );
        }
        found
    }

    fn pass_index(&self, procedure: SymbolId) -> Option<usize> {
        let ctx = self.ctx();
        let symbol = self.symbols.get(procedure);
        if symbol.has(Attr::NoPass) {
            return None;
        }
        let characteristics = Procedure::characterize_symbol(procedure, &ctx)?;
        match &symbol.details {
            Details::ProcBinding(_) => characteristics
                .dummy_arguments
                .iter()
                .position(|dummy| dummy.pass),
            Details::ProcEntity(entity) if characteristics.has_explicit_interface() => {
                characteristics.find_pass_index(entity.pass_name.as_deref())
            }
            _ => None,
        }
    }

    fn analyze_component_call(
        &mut self,
        scope: ScopeId,
        base: &ast::Expr,
        name: &str,
        args: &[Arg],
        is_function: bool,
        span: &Span,
    ) -> Option<Expr> {
        let object = self.analyze_expr(scope, base)?;
        let component = self.component_of(&object, name, span)?;
        if let Details::Object(_) = self.symbols.get(component).details {
            if !is_function {
                self.error(format!("'{}' is not a subroutine", name), span.clone());
                return None;
            }
            let subscripts = self.analyze_subscripts(scope, args)?;
            return Some(Expr::Designator(Designator {
                symbol: component,
                subscripts,
                coindexed: false,
            }));
        }
        let actuals = self.analyze_actuals(scope, args)?;
        let call = self.component_call(component, &object, actuals, is_function, span)?;
        Some(self.reference(
            scope,
            ProcedureDesignator::Symbol(call.procedure),
            call.generic,
            call.arguments,
            is_function,
            span,
        ))
    }

    fn component_call(
        &mut self,
        component: SymbolId,
        object: &Expr,
        actuals: ActualArguments,
        is_function: bool,
        span: &Span,
    ) -> Option<ComponentCall> {
        let with_object = |index: Option<usize>, mut actuals: ActualArguments| {
            if let Some(index) = index {
                let positional = actuals
                    .iter()
                    .take_while(|actual| actual.as_ref().map_or(true, |a| a.keyword.is_none()))
                    .count();
                let mut passed = ActualArgument::new(object.clone()).with_span(span.clone());
                passed.is_passed_object = true;
                actuals.insert(index.min(positional), Some(passed));
            }
            actuals
        };
        match &self.symbols.get(component).details {
            Details::ProcBinding(_) | Details::ProcEntity(_) => {
                let arguments = with_object(self.pass_index(component), actuals);
                Some(ComponentCall {
                    procedure: component,
                    generic: None,
                    arguments,
                })
            }
            Details::Generic(generic) => {
                let ctx = self.ctx();
                let found = generic.specifics.iter().copied().find_map(|specific| {
                    let procedure = Procedure::characterize_symbol(specific, &ctx)?;
                    let arguments = with_object(self.pass_index(specific), actuals.clone());
                    (procedure.is_function() == is_function
                        && check_interface_for_generic(&procedure, &arguments, &ctx))
                    .then_some((specific, arguments))
                });
                match found {
                    Some((procedure, arguments)) => Some(ComponentCall {
                        procedure,
                        generic: Some(component),
                        arguments,
                    }),
                    None => {
                        self.error(
                            format!(
                                "No specific binding of generic '{}' matches the actual arguments",
                                self.symbols.get(component).name
                            ),
                            span.clone(),
                        );
                        None
                    }
                }
            }
            _ => {
                self.error(
                    format!("'{}' is not a procedure", self.symbols.get(component).name),
                    span.clone(),
                );
                None
            }
        }
    }

    // Generics for an operator or assignment: the one in scope, then those
    // bound to the operands' types.
    fn operator_generics(&self, scope: ScopeId, name: &str, operands: &[Expr]) -> Vec<SymbolId> {
        let mut generics = Vec::new();
        if let Some(id) = self.lookup(scope, name) {
            if self.symbols.get(id).generic().is_some() {
                generics.push(id);
            }
        }
        for operand in operands {
            if let Some(bound) = self
                .derived_type_of(operand)
                .and_then(|type_symbol| self.find_component(type_symbol, name))
            {
                if !generics.contains(&bound) && self.symbols.get(bound).generic().is_some() {
                    generics.push(bound);
                }
            }
        }
        generics
    }

    fn defined_operation(&mut self, scope: ScopeId, op: &str, operands: Vec<Expr>, span: &Span) -> Option<Expr> {
        let name = format!("operator({})", op);
        let actuals: ActualArguments = operands
            .iter()
            .map(|operand| Some(ActualArgument::new(operand.clone()).with_span(span.clone())))
            .collect();
        let found = self
            .operator_generics(scope, &name, &operands)
            .into_iter()
            .find_map(|generic| Some((generic, self.find_specific(generic, &actuals, true)?)));
        match found {
            Some((generic, specific)) => Some(self.reference(
                scope,
                ProcedureDesignator::Symbol(specific),
                Some(generic),
                actuals,
                true,
                span,
            )),
            None => {
                let ctx = self.ctx();
                let types: Vec<String> = operands
                    .iter()
                    .map(|operand| match ctx.type_of(operand) {
                        Some(t) => t.to_string(),
                        None => "untyped".to_string(),
                    })
                    .collect();
                self.error(
                    format!(
                        "No intrinsic or user-defined OPERATOR({}) matches operand types {}",
                        op.to_ascii_uppercase(),
                        types.join(" and ")
                    ),
                    span.clone(),
                );
                None
            }
        }
    }

    // ---- statements ----

    fn analyze_stmts(&mut self, scope: ScopeId, stmts: &[Stmt]) {
        for stmt in stmts {
            self.analyze_stmt(scope, stmt);
        }
    }

    fn analyze_stmt(&mut self, scope: ScopeId, stmt: &Stmt) {
        match stmt {
            Stmt::Call { target, args, span } => self.analyze_call_stmt(scope, target, args, span),
            Stmt::Assign { lhs, rhs, span } => {
                let lhs = self.analyze_variable(scope, lhs);
                let rhs = self.analyze_expr(scope, rhs);
                if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                    self.defined_assignment(scope, lhs, rhs, span);
                }
            }
            Stmt::Associate { names, body, .. } => {
                let block = self.symbols.add_scope(ScopeKind::Block, None, scope, None);
                for (name, expr) in names {
                    if let Some(selector) = self.analyze_expr(scope, expr) {
                        self.symbols.add_symbol(
                            block,
                            name,
                            Attrs::new(),
                            Details::Assoc(AssocEntityDetails { expr: selector }),
                            expr.span.clone(),
                        );
                    }
                }
                self.analyze_stmts(block, body);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                self.analyze_expr(scope, cond);
                self.analyze_stmts(scope, then_body);
                self.analyze_stmts(scope, else_body);
            }
            Stmt::Do { control, body, span } => {
                if let Some(control) = control {
                    self.analyze_name(scope, &control.var, span);
                    self.analyze_expr(scope, &control.start);
                    self.analyze_expr(scope, &control.end);
                    if let Some(step) = &control.step {
                        self.analyze_expr(scope, step);
                    }
                }
                self.analyze_stmts(scope, body);
            }
            Stmt::Print { items, .. } => {
                for item in items {
                    self.analyze_expr(scope, item);
                }
            }
            Stmt::Return { .. } => {}
        }
    }

    fn analyze_variable(&mut self, scope: ScopeId, lhs: &ast::Expr) -> Option<Expr> {
        if let ExprKind::Call(target, args) = &lhs.kind {
            if let Some(name) = target.name() {
                let is_object = self.lookup(scope, name).map_or(false, |id| {
                    matches!(self.symbols.get(id).details, Details::Object(_) | Details::Assoc(_))
                        && (self.ctx().symbol_shape(id).map_or(true, |shape| !shape.is_empty())
                            || self
                                .ctx()
                                .symbol_type(id)
                                .map_or(false, |t| t.category() == TypeCategory::Character))
                });
                if !is_object {
                    trace!("statement function '{}' is not analyzed", name);
                    return None;
                }
                return self.analyze_function_call(scope, name, args, &lhs.span);
            }
        }
        self.analyze_expr(scope, lhs)
    }

    fn defined_assignment(&mut self, scope: ScopeId, lhs: Expr, rhs: Expr, span: &Span) {
        let ctx = self.ctx();
        let derived = [&lhs, &rhs].iter().any(|side| {
            ctx.type_of(side)
                .map_or(false, |t| t.category() == TypeCategory::Derived)
        });
        if !derived {
            return;
        }
        let operands = [lhs, rhs];
        let actuals: ActualArguments = operands
            .iter()
            .map(|operand| Some(ActualArgument::new(operand.clone()).with_span(span.clone())))
            .collect();
        let found = self
            .operator_generics(scope, "assignment(=)", &operands)
            .into_iter()
            .find_map(|generic| Some((generic, self.find_specific(generic, &actuals, false)?)));
        if let Some((generic, specific)) = found {
            self.reference(
                scope,
                ProcedureDesignator::Symbol(specific),
                Some(generic),
                actuals,
                false,
                span,
            );
        }
    }

    fn analyze_call_stmt(&mut self, scope: ScopeId, target: &ast::Expr, args: &[Arg], span: &Span) {
        let name = match &target.kind {
            ExprKind::Name(name) => name,
            ExprKind::Component(base, name) => {
                self.analyze_component_call(scope, base, name, args, false, span);
                return;
            }
            _ => {
                self.error("Unsupported CALL target", span.clone());
                return;
            }
        };
        let Some(arguments) = self.analyze_actuals(scope, args) else {
            return;
        };
        let id = match self.lookup(scope, name) {
            Some(id) => id,
            None if INTRINSIC_SUBROUTINES.contains(&name.as_str()) => return,
            None => self.implicit_procedure(scope, name, span, Flag::Subroutine),
        };
        let symbol = self.symbols.get(id);
        match &symbol.details {
            Details::Subprogram(subprogram) => {
                if subprogram.is_function() {
                    self.error(
                        format!("'{}' is a function and may not be called as a subroutine", name),
                        span.clone(),
                    );
                    return;
                }
            }
            Details::ProcEntity(entity) => {
                if entity.interface.symbol.is_none() {
                    if symbol.test(Flag::Function) {
                        self.error(
                            format!("'{}' is referenced both as a function and as a subroutine", name),
                            span.clone(),
                        );
                        return;
                    }
                    self.symbols.get_mut(id).flags.insert(Flag::Subroutine);
                }
            }
            Details::Object(object) if object.is_dummy && !object.is_array() => {
                self.convert_to_proc_entity(id);
                self.symbols.get_mut(id).flags.insert(Flag::Subroutine);
            }
            Details::Generic(_) => {
                if let Some(specific) = self.resolve_generic(id, &arguments, false, span) {
                    self.reference(
                        scope,
                        ProcedureDesignator::Symbol(specific),
                        Some(id),
                        arguments,
                        false,
                        span,
                    );
                }
                return;
            }
            Details::Error => return,
            _ => {
                self.error(format!("'{}' is not a subroutine", name), span.clone());
                return;
            }
        }
        self.reference(scope, ProcedureDesignator::Symbol(id), None, arguments, false, span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn resolve_src(src: &str) -> ResolvedProgram {
        let tokens = lex(src);
        let program = match parse(&tokens, src.len()) {
            Ok(program) => program,
            Err(errs) => panic!("parse failed: {:?}", errs),
        };
        resolve(&program)
    }

    #[test]
    fn implicit_none_reports_untyped_dummy() {
        let resolved = resolve_src("subroutine s(x)\n  implicit none\nend subroutine\n");
        assert_eq!(resolved.errors.len(), 1);
        assert!(resolved.errors[0].message.contains("'x'"));
    }

    #[test]
    fn default_implicit_rule() {
        let resolved = resolve_src("subroutine s(i, x)\nend subroutine\n");
        assert!(resolved.errors.is_empty());
        let ctx = resolved.folding_context();
        let (i, _) = resolved
            .symbols
            .symbols()
            .find(|(_, symbol)| symbol.name == "i")
            .unwrap();
        assert_eq!(ctx.symbol_type(i), Some(DynamicType::integer(4)));
    }

    #[test]
    fn generic_call_resolves_to_specific() {
        let resolved = resolve_src(
            "module m\n  interface g\n    module procedure gi, gr\n  end interface\ncontains\n  subroutine gi(i)\n    integer :: i\n  end subroutine\n  subroutine gr(x)\n    real :: x\n  end subroutine\nend module\nprogram p\n  use m\n  call g(1.0)\nend program\n",
        );
        assert!(resolved.errors.is_empty(), "{:?}", resolved.errors);
        assert_eq!(resolved.references.len(), 1);
        let reference = &resolved.references[0];
        assert_eq!(reference.designator.name(&resolved.symbols), "gr");
        assert!(reference.generic.is_some());
    }

    #[test]
    fn type_bound_call_passes_object() {
        let resolved = resolve_src(
            "module shapes\n  type :: circle\n    real :: r\n  contains\n    procedure :: area\n  end type\ncontains\n  real function area(self)\n    class(circle) :: self\n    area = 3.14 * self%r**2\n  end function\nend module\nprogram p\n  use shapes\n  type(circle) :: c\n  real :: a\n  a = c%area()\nend program\n",
        );
        assert!(resolved.errors.is_empty(), "{:?}", resolved.errors);
        let reference = resolved
            .references
            .iter()
            .find(|reference| reference.designator.name(&resolved.symbols) == "area")
            .unwrap();
        assert_eq!(reference.arguments.len(), 1);
        assert!(reference.arguments[0].as_ref().unwrap().is_passed_object);
    }
}
