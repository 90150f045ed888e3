//! The symbol table: an arena of symbols and scopes. Name resolution fills it
//! in; characterization and call checking only ever read it.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::Span;
use crate::expr::Expr;
use crate::types::{DerivedTypeSpec, Intent, TypeCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attr {
    Abstract,
    Allocatable,
    Asynchronous,
    BindC,
    Contiguous,
    Deferred,
    Elemental,
    External,
    Impure,
    IntentIn,
    IntentInOut,
    IntentOut,
    Intrinsic,
    NoPass,
    Optional,
    Parameter,
    Pointer,
    Private,
    Protected,
    Public,
    Pure,
    Recursive,
    Save,
    Target,
    Value,
    Volatile,
}

pub type Attrs = BTreeSet<Attr>;

/// How a procedure name has been used; an `EXTERNAL` symbol that is never
/// referenced carries neither flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    Function,
    Subroutine,
    ImplicitlyTyped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Explicit(Expr),
    // `*`
    Assumed,
    // `:`
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclTypeSpec {
    Intrinsic {
        category: TypeCategory,
        kind: u8,
        length: Option<ParamValue>,
    },
    TypeDerived(SymbolId),
    ClassDerived(SymbolId),
    // `TYPE(*)`
    TypeStar,
    // `CLASS(*)`
    ClassStar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeSpec {
    Explicit { lower: Option<Expr>, upper: Expr },
    /// `[lower]:` -- assumed shape for a plain dummy, deferred shape for a
    /// pointer or allocatable.
    Colon { lower: Option<Expr> },
    /// `[lower:]*` in the last dimension.
    AssumedSize { lower: Option<Expr> },
    // `..`
    AssumedRank,
}

pub type ArraySpec = Vec<ShapeSpec>;

pub fn is_assumed_rank(spec: &ArraySpec) -> bool {
    matches!(spec.as_slice(), [ShapeSpec::AssumedRank])
}

pub fn is_assumed_size(spec: &ArraySpec) -> bool {
    matches!(spec.last(), Some(ShapeSpec::AssumedSize { .. }))
}

pub fn is_colon_shape(spec: &ArraySpec) -> bool {
    !spec.is_empty()
        && spec
            .iter()
            .all(|dim| matches!(dim, ShapeSpec::Colon { .. }))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectEntityDetails {
    pub type_spec: Option<DeclTypeSpec>,
    pub shape: ArraySpec,
    pub coshape: ArraySpec,
    pub init: Option<Expr>,
    pub is_dummy: bool,
}

impl ObjectEntityDetails {
    pub fn is_array(&self) -> bool {
        !self.shape.is_empty()
    }

    pub fn is_coarray(&self) -> bool {
        !self.coshape.is_empty()
    }

    pub fn is_assumed_rank(&self) -> bool {
        is_assumed_rank(&self.shape)
    }

    pub fn is_assumed_size(&self) -> bool {
        is_assumed_size(&self.shape)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocEntityDetails {
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcInterface {
    pub symbol: Option<SymbolId>,
    pub type_spec: Option<DeclTypeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcEntityDetails {
    pub interface: ProcInterface,
    pub is_dummy: bool,
    /// `PASS(name)` on a procedure pointer component.
    pub pass_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubprogramDetails {
    /// `None` marks an alternate-return dummy (`*`).
    pub dummy_args: Vec<Option<SymbolId>>,
    pub result: Option<SymbolId>,
    pub is_interface: bool,
    pub is_dummy: bool,
    pub scope: Option<ScopeId>,
}

impl SubprogramDetails {
    pub fn is_function(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericKind {
    Name,
    DefinedOperator(String),
    IntrinsicOperator(String),
    Assignment,
}

impl GenericKind {
    pub fn is_operator_or_assignment(&self) -> bool {
        !matches!(self, GenericKind::Name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericDetails {
    pub kind: GenericKind,
    pub specifics: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivedTypeDetails {
    pub parent: Option<SymbolId>,
    pub components: Vec<SymbolId>,
    pub bindings: Vec<SymbolId>,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcBindingDetails {
    pub procedure: SymbolId,
    pub pass_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Details {
    Object(ObjectEntityDetails),
    Assoc(AssocEntityDetails),
    ProcEntity(ProcEntityDetails),
    Subprogram(SubprogramDetails),
    Generic(GenericDetails),
    DerivedType(DerivedTypeDetails),
    ProcBinding(ProcBindingDetails),
    Module(ScopeId),
    MainProgram(ScopeId),
    /// A name that could not be resolved; already diagnosed upstream.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub attrs: Attrs,
    pub flags: BTreeSet<Flag>,
    pub details: Details,
    pub owner: ScopeId,
    pub span: Span,
}

impl Symbol {
    pub fn has(&self, attr: Attr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn test(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn intent(&self) -> Intent {
        if self.has(Attr::IntentIn) {
            Intent::In
        } else if self.has(Attr::IntentOut) {
            Intent::Out
        } else if self.has(Attr::IntentInOut) {
            Intent::InOut
        } else {
            Intent::Default
        }
    }

    pub fn object(&self) -> Option<&ObjectEntityDetails> {
        match &self.details {
            Details::Object(details) => Some(details),
            _ => None,
        }
    }

    pub fn subprogram(&self) -> Option<&SubprogramDetails> {
        match &self.details {
            Details::Subprogram(details) => Some(details),
            _ => None,
        }
    }

    pub fn generic(&self) -> Option<&GenericDetails> {
        match &self.details {
            Details::Generic(details) => Some(details),
            _ => None,
        }
    }

    pub fn is_dummy(&self) -> bool {
        match &self.details {
            Details::Object(details) => details.is_dummy,
            Details::ProcEntity(details) => details.is_dummy,
            Details::Subprogram(details) => details.is_dummy,
            _ => false,
        }
    }

    pub fn is_procedure(&self) -> bool {
        matches!(
            self.details,
            Details::ProcEntity(_) | Details::Subprogram(_) | Details::ProcBinding(_)
        )
    }

    pub fn is_pointer(&self) -> bool {
        self.has(Attr::Pointer)
    }

    pub fn is_allocatable(&self) -> bool {
        self.has(Attr::Allocatable)
    }

    pub fn rank(&self) -> usize {
        match &self.details {
            Details::Object(details) if !details.is_assumed_rank() => details.shape.len(),
            _ => 0,
        }
    }

    pub fn corank(&self) -> usize {
        match &self.details {
            Details::Object(details) => details.coshape.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    MainProgram,
    Subprogram,
    Interface,
    DerivedType,
    Block,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub symbol: Option<SymbolId>,
    pub implicit_none: bool,
    symbols: BTreeMap<String, SymbolId>,
}

impl Scope {
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.symbols.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, SymbolId)> {
        self.symbols.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                name: None,
                parent: None,
                symbol: None,
                implicit_none: false,
                symbols: BTreeMap::new(),
            }],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn add_scope(
        &mut self,
        kind: ScopeKind,
        name: Option<String>,
        parent: ScopeId,
        symbol: Option<SymbolId>,
    ) -> ScopeId {
        let implicit_none = self.scope(parent).implicit_none;
        self.scopes.push(Scope {
            kind,
            name,
            parent: Some(parent),
            symbol,
            implicit_none,
            symbols: BTreeMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Creates a symbol in `scope`; a previous entry with the same name is
    /// shadowed in that scope's map but stays in the arena.
    pub fn add_symbol(
        &mut self,
        scope: ScopeId,
        name: &str,
        attrs: Attrs,
        details: Details,
        span: Span,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_ascii_lowercase(),
            attrs,
            flags: BTreeSet::new(),
            details,
            owner: scope,
            span,
        });
        self.scopes[scope.0]
            .symbols
            .insert(name.to_ascii_lowercase(), id);
        id
    }

    pub fn import(&mut self, scope: ScopeId, name: &str, symbol: SymbolId) {
        self.scopes[scope.0]
            .symbols
            .insert(name.to_ascii_lowercase(), symbol);
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(index, symbol)| (SymbolId(index), symbol))
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(index, scope)| (ScopeId(index), scope))
    }

    pub fn find(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(symbol) = scope.lookup(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }
        None
    }

    pub fn is_within(&self, inner: ScopeId, outer: ScopeId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.scope(id).parent;
        }
        false
    }

    pub fn containing_module(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.scope(id).kind == ScopeKind::Module {
                return Some(id);
            }
            current = self.scope(id).parent;
        }
        None
    }

    pub fn derived_type_spec(&self, id: SymbolId) -> Option<DerivedTypeSpec> {
        let symbol = self.get(id);
        match &symbol.details {
            Details::DerivedType(details) => {
                let mut spec = DerivedTypeSpec::new(symbol.name.clone());
                if let Some(parent) = details.parent {
                    spec = spec.with_parent(self.derived_type_spec(parent)?);
                }
                Some(spec)
            }
            _ => None,
        }
    }

    /// True when `symbol` is PROTECTED and `scope` is outside the module that
    /// declares it.
    pub fn is_protected_from(&self, symbol: SymbolId, scope: ScopeId) -> bool {
        let symbol = self.get(symbol);
        symbol.has(Attr::Protected)
            && match self.containing_module(symbol.owner) {
                Some(module) => !self.is_within(scope, module),
                None => false,
            }
    }
}
