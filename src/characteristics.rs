//! Characteristics of procedures, dummy arguments and function results
//! (F2018 15.3): the spelling-independent description of an interface that
//! call checking and generic resolution compare.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, trace};

use crate::expr::{ActualValue, Expr, Operator, ProcedureDesignator, ProcedureRef};
use crate::fold::{FoldingContext, Shape};
use crate::intrinsics::SpecificIntrinsic;
use crate::messages::ContextualMessages;
use crate::symbol::{
    is_colon_shape, AssocEntityDetails, Attr, DeclTypeSpec, Details, Flag, ParamValue,
    ProcInterface, ShapeSpec, Symbol, SymbolId, SymbolTable,
};
use crate::types::{DynamicType, Intent, TypeCategory};

/// Writes a characteristics value; expressions inside it need the symbol
/// table to be spelled.
pub trait DumpWith {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result;

    fn dump<'a>(&'a self, symbols: &'a SymbolTable) -> Dump<'a, Self>
    where
        Self: Sized,
    {
        Dump {
            value: self,
            symbols,
        }
    }
}

pub struct Dump<'a, T> {
    value: &'a T,
    symbols: &'a SymbolTable,
}

impl<T: DumpWith> fmt::Display for Dump<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.write_dump(f, self.symbols)
    }
}

fn write_attrs<A: fmt::Debug>(f: &mut fmt::Formatter<'_>, attrs: &BTreeSet<A>) -> fmt::Result {
    for attr in attrs {
        write!(f, "{} ", format!("{:?}", attr).to_ascii_uppercase())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeAndShapeAttr {
    AssumedRank,
    AssumedShape,
    AssumedSize,
    DeferredShape,
    Coarray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAndShape {
    dynamic_type: DynamicType,
    length: Option<Expr>,
    shape: Shape,
    attrs: BTreeSet<TypeAndShapeAttr>,
    corank: usize,
}

impl TypeAndShape {
    pub fn new(dynamic_type: DynamicType) -> Self {
        Self::with_shape(dynamic_type, Vec::new())
    }

    pub fn with_rank(dynamic_type: DynamicType, rank: usize) -> Self {
        Self::with_shape(dynamic_type, vec![None; rank])
    }

    pub fn with_shape(dynamic_type: DynamicType, shape: Shape) -> Self {
        Self {
            dynamic_type,
            length: None,
            shape,
            attrs: BTreeSet::new(),
            corank: 0,
        }
    }

    pub fn set_type(&mut self, dynamic_type: DynamicType) -> &mut Self {
        self.dynamic_type = dynamic_type;
        self
    }

    pub fn set_length(&mut self, length: Option<Expr>) -> &mut Self {
        self.length = length;
        self
    }

    pub fn set_attr(&mut self, attr: TypeAndShapeAttr) -> &mut Self {
        if attr == TypeAndShapeAttr::AssumedRank {
            self.shape.clear();
        }
        self.attrs.insert(attr);
        self
    }

    pub fn set_corank(&mut self, corank: usize) -> &mut Self {
        self.corank = corank;
        if corank > 0 {
            self.attrs.insert(TypeAndShapeAttr::Coarray);
        } else {
            self.attrs.remove(&TypeAndShapeAttr::Coarray);
        }
        self
    }

    pub fn dynamic_type(&self) -> &DynamicType {
        &self.dynamic_type
    }

    pub fn length(&self) -> Option<&Expr> {
        self.length.as_ref()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn attrs(&self) -> &BTreeSet<TypeAndShapeAttr> {
        &self.attrs
    }

    pub fn has(&self, attr: TypeAndShapeAttr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn corank(&self) -> usize {
        self.corank
    }

    pub fn characterize(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<TypeAndShape> {
        let symbol = ctx.symbols.get(id);
        match &symbol.details {
            Details::Object(_) => Self::characterize_object(id, ctx),
            Details::Assoc(assoc) => Self::characterize_assoc(assoc, ctx),
            Details::ProcEntity(entity) => Self::characterize_interface(&entity.interface, ctx),
            Details::Subprogram(subprogram) => Self::characterize(subprogram.result?, ctx),
            _ => None,
        }
    }

    pub fn characterize_object(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<TypeAndShape> {
        let symbol = ctx.symbols.get(id);
        let object = symbol.object()?;
        let mut result = TypeAndShape::new(ctx.decl_type(object.type_spec.as_ref()?)?);
        if result.dynamic_type.category() == TypeCategory::Character {
            result.length = ctx.symbol_length(id);
        }
        if object.is_assumed_rank() {
            result.set_attr(TypeAndShapeAttr::AssumedRank);
        } else {
            result.shape = ctx.symbol_shape(id).unwrap_or_default();
            if object.is_assumed_size() {
                result.set_attr(TypeAndShapeAttr::AssumedSize);
            } else if is_colon_shape(&object.shape) {
                if symbol.is_pointer() || symbol.is_allocatable() {
                    result.set_attr(TypeAndShapeAttr::DeferredShape);
                } else {
                    result.set_attr(TypeAndShapeAttr::AssumedShape);
                }
            }
        }
        result.set_corank(object.coshape.len());
        Some(result)
    }

    pub fn characterize_assoc(
        assoc: &AssocEntityDetails,
        ctx: &FoldingContext<'_>,
    ) -> Option<TypeAndShape> {
        Self::characterize_expr(&assoc.expr, ctx)
    }

    pub fn characterize_interface(
        interface: &ProcInterface,
        ctx: &FoldingContext<'_>,
    ) -> Option<TypeAndShape> {
        match (interface.symbol, &interface.type_spec) {
            (Some(symbol), _) => Self::characterize(symbol, ctx),
            (None, Some(spec)) => Self::characterize_decl_type(spec, ctx),
            (None, None) => None,
        }
    }

    pub fn characterize_decl_type(
        spec: &DeclTypeSpec,
        ctx: &FoldingContext<'_>,
    ) -> Option<TypeAndShape> {
        let mut result = TypeAndShape::new(ctx.decl_type(spec)?);
        if let DeclTypeSpec::Intrinsic {
            category: TypeCategory::Character,
            length,
            ..
        } = spec
        {
            result.length = match length {
                Some(ParamValue::Explicit(len)) => Some(ctx.fold(len)),
                Some(_) => None,
                None => Some(Expr::int(1)),
            };
        }
        Some(result)
    }

    // Characterizes the value of an expression. A whole object keeps its
    // declared attributes; anything else gets only a type and shape.
    pub fn characterize_expr(expr: &Expr, ctx: &FoldingContext<'_>) -> Option<TypeAndShape> {
        if let Some(symbol) = ctx.whole_symbol(expr) {
            if let Expr::Designator(designator) = expr {
                match &symbol.details {
                    Details::Object(_) => return Self::characterize_object(designator.symbol, ctx),
                    Details::Assoc(assoc) => return Self::characterize_assoc(assoc, ctx),
                    _ => {}
                }
            }
        }
        let dynamic_type = ctx.type_of(expr)?;
        let shape = ctx.get_shape(expr)?;
        let mut result = TypeAndShape::with_shape(dynamic_type, shape);
        if result.dynamic_type.category() == TypeCategory::Character {
            result.length = ctx.char_length(expr);
        }
        Some(result)
    }

    /// Can an entity characterized by `that` be associated with one
    /// characterized by `self`? Type compatibility always, shape conformance
    /// unless the reference is elemental.
    pub fn is_compatible_with(
        &self,
        messages: &mut ContextualMessages<'_>,
        that: &TypeAndShape,
        this_is: &str,
        that_is: &str,
        is_elemental: bool,
    ) -> bool {
        if !self.dynamic_type.is_type_compatible_with(&that.dynamic_type) {
            messages.say(format!(
                "{} type '{}' is not compatible with {} type '{}'",
                that_is,
                that.type_spelling(),
                this_is,
                self.type_spelling()
            ));
            return false;
        }
        is_elemental || check_conformance(messages, &self.shape, &that.shape, this_is, that_is)
    }

    pub fn type_spelling(&self) -> String {
        let length = self
            .length
            .as_ref()
            .and_then(Expr::as_int_literal)
            .map(|len| len.to_string());
        self.dynamic_type.as_fortran(length.as_deref())
    }
}

impl DumpWith for TypeAndShape {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result {
        let length = self.length.as_ref().map(|len| len.as_fortran(symbols));
        write!(f, "{}", self.dynamic_type.as_fortran(length.as_deref()))?;
        for attr in &self.attrs {
            write!(f, " {:?}", attr)?;
        }
        if !self.shape.is_empty() {
            let extents: Vec<String> = self
                .shape
                .iter()
                .map(|extent| match extent {
                    Some(extent) => extent.as_fortran(symbols),
                    None => ":".to_string(),
                })
                .collect();
            write!(f, " DIMENSION({})", extents.join(","))?;
        }
        if self.corank > 0 {
            write!(f, " CORANK({})", self.corank)?;
        }
        Ok(())
    }
}

/// Checks that two shapes have the same rank and, where both extents are
/// known constants, the same extents.
pub fn check_conformance(
    messages: &mut ContextualMessages<'_>,
    left: &Shape,
    right: &Shape,
    left_is: &str,
    right_is: &str,
) -> bool {
    if left.len() != right.len() {
        messages.say(format!(
            "Rank of {} is {}, but {} has rank {}",
            left_is,
            left.len(),
            right_is,
            right.len()
        ));
        return false;
    }
    for (j, (left_dim, right_dim)) in left.iter().zip(right).enumerate() {
        let left_extent = left_dim.as_ref().and_then(Expr::as_int_literal);
        let right_extent = right_dim.as_ref().and_then(Expr::as_int_literal);
        if let (Some(l), Some(r)) = (left_extent, right_extent) {
            if l != r {
                messages.say(format!(
                    "Dimension {} of {} has extent {}, but {} has extent {}",
                    j + 1,
                    left_is,
                    l,
                    right_is,
                    r
                ));
                return false;
            }
        }
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DummyDataObjectAttr {
    Optional,
    Allocatable,
    Asynchronous,
    Contiguous,
    Value,
    Volatile,
    Pointer,
    Target,
}

const DATA_OBJECT_ATTRS: [(Attr, DummyDataObjectAttr); 8] = [
    (Attr::Optional, DummyDataObjectAttr::Optional),
    (Attr::Allocatable, DummyDataObjectAttr::Allocatable),
    (Attr::Asynchronous, DummyDataObjectAttr::Asynchronous),
    (Attr::Contiguous, DummyDataObjectAttr::Contiguous),
    (Attr::Value, DummyDataObjectAttr::Value),
    (Attr::Volatile, DummyDataObjectAttr::Volatile),
    (Attr::Pointer, DummyDataObjectAttr::Pointer),
    (Attr::Target, DummyDataObjectAttr::Target),
];

fn copy_attrs<A: Ord + Copy>(symbol: &Symbol, map: &[(Attr, A)]) -> BTreeSet<A> {
    map.iter()
        .filter(|(attr, _)| symbol.has(*attr))
        .map(|(_, mapped)| *mapped)
        .collect()
}

/// 15.3.2.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyDataObject {
    pub type_and_shape: TypeAndShape,
    pub coshape: Vec<Expr>,
    pub intent: Intent,
    pub attrs: BTreeSet<DummyDataObjectAttr>,
}

impl DummyDataObject {
    pub fn new(type_and_shape: TypeAndShape) -> Self {
        Self {
            type_and_shape,
            coshape: Vec::new(),
            intent: Intent::Default,
            attrs: BTreeSet::new(),
        }
    }

    pub fn has(&self, attr: DummyDataObjectAttr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn characterize(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<DummyDataObject> {
        let symbol = ctx.symbols.get(id);
        let object = symbol.object()?;
        let mut result = DummyDataObject::new(TypeAndShape::characterize_object(id, ctx)?);
        result.attrs = copy_attrs(symbol, &DATA_OBJECT_ATTRS);
        result.intent = symbol.intent();
        result.coshape = object
            .coshape
            .iter()
            .filter_map(|dim| match dim {
                ShapeSpec::Explicit { lower, upper } => Some(match lower {
                    Some(lower) => ctx.fold(&Expr::binary(
                        Operator::Add,
                        Expr::binary(Operator::Subtract, upper.clone(), lower.clone()),
                        Expr::int(1),
                    )),
                    None => ctx.fold(upper),
                }),
                _ => None,
            })
            .collect();
        Some(result)
    }

    // The attribute or property of this dummy that a caller can only
    // honor through an explicit interface.
    pub fn explicit_interface_reason(&self) -> Option<&'static str> {
        const EXPLICIT_ONLY: [(DummyDataObjectAttr, &str); 7] = [
            (DummyDataObjectAttr::Allocatable, "ALLOCATABLE"),
            (DummyDataObjectAttr::Asynchronous, "ASYNCHRONOUS"),
            (DummyDataObjectAttr::Optional, "OPTIONAL"),
            (DummyDataObjectAttr::Pointer, "POINTER"),
            (DummyDataObjectAttr::Target, "TARGET"),
            (DummyDataObjectAttr::Value, "VALUE"),
            (DummyDataObjectAttr::Volatile, "VOLATILE"),
        ];
        const SHAPES: [(TypeAndShapeAttr, &str); 3] = [
            (TypeAndShapeAttr::AssumedShape, "assumed-shape"),
            (TypeAndShapeAttr::AssumedRank, "assumed-rank"),
            (TypeAndShapeAttr::Coarray, "a coarray"),
        ];
        if let Some((_, reason)) = EXPLICIT_ONLY.iter().find(|(attr, _)| self.has(*attr)) {
            Some(*reason)
        } else if let Some((_, reason)) = SHAPES
            .iter()
            .find(|(attr, _)| self.type_and_shape.has(*attr))
        {
            Some(*reason)
        } else if self.type_and_shape.dynamic_type().is_polymorphic() {
            Some("polymorphic")
        } else {
            None
        }
    }

    pub fn can_be_passed_via_implicit_interface(&self) -> bool {
        self.explicit_interface_reason().is_none()
    }
}

impl DumpWith for DummyDataObject {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result {
        write_attrs(f, &self.attrs)?;
        if self.intent != Intent::Default {
            write!(f, "{} ", self.intent)?;
        }
        self.type_and_shape.write_dump(f, symbols)?;
        if !self.coshape.is_empty() {
            let extents: Vec<String> = self.coshape.iter().map(|e| e.as_fortran(symbols)).collect();
            write!(f, " [{}]", extents.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DummyProcedureAttr {
    Pointer,
    Optional,
}

/// 15.3.2.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyProcedure {
    pub procedure: Box<Procedure>,
    pub intent: Intent,
    pub attrs: BTreeSet<DummyProcedureAttr>,
}

impl DummyProcedure {
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure: Box::new(procedure),
            intent: Intent::Default,
            attrs: BTreeSet::new(),
        }
    }

    pub fn has(&self, attr: DummyProcedureAttr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn characterize(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<DummyProcedure> {
        let mut procedure = Procedure::characterize_symbol(id, ctx)?;
        // Dummy procedures are never elemental; an elemental intrinsic
        // interface loses the attribute.
        procedure.attrs.remove(&ProcedureAttr::Elemental);
        let symbol = ctx.symbols.get(id);
        let mut result = DummyProcedure::new(procedure);
        result.attrs = copy_attrs(
            symbol,
            &[
                (Attr::Optional, DummyProcedureAttr::Optional),
                (Attr::Pointer, DummyProcedureAttr::Pointer),
            ],
        );
        result.intent = symbol.intent();
        Some(result)
    }
}

impl DumpWith for DummyProcedure {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result {
        write_attrs(f, &self.attrs)?;
        if self.intent != Intent::Default {
            write!(f, "{} ", self.intent)?;
        }
        write!(f, "PROCEDURE(")?;
        self.procedure.write_dump(f, symbols)?;
        write!(f, ")")
    }
}

/// 15.3.2.4: the `*` dummy of a subroutine with alternate returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlternateReturn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyKind {
    DataObject(DummyDataObject),
    Procedure(DummyProcedure),
    AlternateReturn(AlternateReturn),
}

/// 15.3.2.1. `name` and `pass` are not characteristics: they take no part in
/// equality, but distinguishability by keyword and type-bound dispatch need
/// them.
#[derive(Debug, Clone)]
pub struct DummyArgument {
    pub name: String,
    pub pass: bool,
    pub kind: DummyKind,
}

impl PartialEq for DummyArgument {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for DummyArgument {}

pub type DummyArguments = Vec<DummyArgument>;

impl DummyArgument {
    pub fn data_object(name: impl Into<String>, object: DummyDataObject) -> Self {
        Self {
            name: name.into(),
            pass: false,
            kind: DummyKind::DataObject(object),
        }
    }

    pub fn procedure(name: impl Into<String>, procedure: DummyProcedure) -> Self {
        Self {
            name: name.into(),
            pass: false,
            kind: DummyKind::Procedure(procedure),
        }
    }

    pub fn alternate_return() -> Self {
        Self {
            name: String::new(),
            pass: false,
            kind: DummyKind::AlternateReturn(AlternateReturn),
        }
    }

    pub fn as_data_object(&self) -> Option<&DummyDataObject> {
        match &self.kind {
            DummyKind::DataObject(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&DummyProcedure> {
        match &self.kind {
            DummyKind::Procedure(procedure) => Some(procedure),
            _ => None,
        }
    }

    pub fn is_alternate_return(&self) -> bool {
        matches!(self.kind, DummyKind::AlternateReturn(_))
    }

    pub fn characterize(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<DummyArgument> {
        let symbol = ctx.symbols.get(id);
        let result = if symbol.object().is_some() {
            DummyDataObject::characterize(id, ctx)
                .map(|object| DummyArgument::data_object(symbol.name.clone(), object))
        } else {
            DummyProcedure::characterize(id, ctx)
                .map(|procedure| DummyArgument::procedure(symbol.name.clone(), procedure))
        };
        if result.is_none() {
            debug!("dummy argument '{}' cannot be characterized", symbol.name);
        }
        result
    }

    pub fn from_actual(
        name: impl Into<String>,
        expr: &Expr,
        ctx: &FoldingContext<'_>,
    ) -> Option<DummyArgument> {
        match expr {
            Expr::Boz(_) | Expr::Null => Some(DummyArgument::data_object(
                name,
                DummyDataObject::new(TypeAndShape::new(
                    DynamicType::typeless_intrinsic_argument(),
                )),
            )),
            Expr::Procedure(designator) => Procedure::characterize_designator(designator, ctx)
                .map(|procedure| DummyArgument::procedure(name, DummyProcedure::new(procedure))),
            _ => TypeAndShape::characterize_expr(expr, ctx).map(|type_and_shape| {
                DummyArgument::data_object(name, DummyDataObject::new(type_and_shape))
            }),
        }
    }

    pub fn is_optional(&self) -> bool {
        match &self.kind {
            DummyKind::DataObject(object) => object.has(DummyDataObjectAttr::Optional),
            DummyKind::Procedure(procedure) => procedure.has(DummyProcedureAttr::Optional),
            DummyKind::AlternateReturn(_) => false,
        }
    }

    pub fn set_optional(&mut self, optional: bool) {
        match &mut self.kind {
            DummyKind::DataObject(object) => {
                if optional {
                    object.attrs.insert(DummyDataObjectAttr::Optional);
                } else {
                    object.attrs.remove(&DummyDataObjectAttr::Optional);
                }
            }
            DummyKind::Procedure(procedure) => {
                if optional {
                    procedure.attrs.insert(DummyProcedureAttr::Optional);
                } else {
                    procedure.attrs.remove(&DummyProcedureAttr::Optional);
                }
            }
            DummyKind::AlternateReturn(_) => {}
        }
    }

    pub fn can_be_passed_via_implicit_interface(&self) -> bool {
        match &self.kind {
            DummyKind::DataObject(object) => object.can_be_passed_via_implicit_interface(),
            DummyKind::Procedure(_) | DummyKind::AlternateReturn(_) => true,
        }
    }
}

impl DumpWith for DummyArgument {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result {
        if !self.name.is_empty() {
            write!(f, "{}=", self.name)?;
        }
        match &self.kind {
            DummyKind::DataObject(object) => object.write_dump(f, symbols)?,
            DummyKind::Procedure(procedure) => procedure.write_dump(f, symbols)?,
            DummyKind::AlternateReturn(_) => write!(f, "*")?,
        }
        if self.pass {
            write!(f, " (PASS)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionResultAttr {
    Allocatable,
    Pointer,
    Contiguous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionResultKind {
    Data(TypeAndShape),
    ProcedurePointer(Box<Procedure>),
}

/// 15.3.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    pub attrs: BTreeSet<FunctionResultAttr>,
    pub kind: FunctionResultKind,
}

impl FunctionResult {
    pub fn new(type_and_shape: TypeAndShape) -> Self {
        Self {
            attrs: BTreeSet::new(),
            kind: FunctionResultKind::Data(type_and_shape),
        }
    }

    pub fn of_type(dynamic_type: DynamicType) -> Self {
        Self::new(TypeAndShape::new(dynamic_type))
    }

    pub fn procedure_pointer(procedure: Procedure) -> Self {
        Self {
            attrs: [FunctionResultAttr::Pointer].into_iter().collect(),
            kind: FunctionResultKind::ProcedurePointer(Box::new(procedure)),
        }
    }

    pub fn has(&self, attr: FunctionResultAttr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn type_and_shape(&self) -> Option<&TypeAndShape> {
        match &self.kind {
            FunctionResultKind::Data(type_and_shape) => Some(type_and_shape),
            FunctionResultKind::ProcedurePointer(_) => None,
        }
    }

    pub fn is_procedure_pointer(&self) -> Option<&Procedure> {
        match &self.kind {
            FunctionResultKind::ProcedurePointer(procedure) => Some(procedure),
            FunctionResultKind::Data(_) => None,
        }
    }

    pub fn set_type(&mut self, dynamic_type: DynamicType) {
        if let FunctionResultKind::Data(type_and_shape) = &mut self.kind {
            type_and_shape.set_type(dynamic_type);
        }
    }

    pub fn characterize(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<FunctionResult> {
        let symbol = ctx.symbols.get(id);
        if symbol.object().is_some() {
            let mut result = FunctionResult::new(TypeAndShape::characterize_object(id, ctx)?);
            result.attrs = copy_attrs(
                symbol,
                &[
                    (Attr::Allocatable, FunctionResultAttr::Allocatable),
                    (Attr::Contiguous, FunctionResultAttr::Contiguous),
                    (Attr::Pointer, FunctionResultAttr::Pointer),
                ],
            );
            Some(result)
        } else {
            Procedure::characterize_symbol(id, ctx).map(FunctionResult::procedure_pointer)
        }
    }

    pub fn is_assumed_length_character(&self) -> bool {
        match &self.kind {
            FunctionResultKind::Data(type_and_shape) => {
                type_and_shape.dynamic_type().category() == TypeCategory::Character
                    && type_and_shape.length().is_none()
                    && !self.has(FunctionResultAttr::Pointer)
                    && !self.has(FunctionResultAttr::Allocatable)
            }
            FunctionResultKind::ProcedurePointer(_) => false,
        }
    }

    pub fn can_be_returned_via_implicit_interface(&self) -> bool {
        if self.has(FunctionResultAttr::Pointer) || self.has(FunctionResultAttr::Allocatable) {
            return false;
        }
        match &self.kind {
            FunctionResultKind::Data(type_and_shape) => {
                if type_and_shape.rank() > 0 {
                    return false;
                }
                let dynamic_type = type_and_shape.dynamic_type();
                match dynamic_type.category() {
                    TypeCategory::Character => type_and_shape
                        .length()
                        .map_or(true, |length| length.as_int_literal().is_some()),
                    TypeCategory::Derived => !dynamic_type.is_polymorphic(),
                    _ => true,
                }
            }
            FunctionResultKind::ProcedurePointer(_) => false,
        }
    }
}

impl DumpWith for FunctionResult {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result {
        write_attrs(f, &self.attrs)?;
        match &self.kind {
            FunctionResultKind::Data(type_and_shape) => type_and_shape.write_dump(f, symbols),
            FunctionResultKind::ProcedurePointer(procedure) => {
                write!(f, "PROCEDURE(")?;
                procedure.write_dump(f, symbols)?;
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcedureAttr {
    Pure,
    Elemental,
    BindC,
    ImplicitInterface,
    NullPointer,
    Subroutine,
}

/// 15.3.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    pub function_result: Option<FunctionResult>,
    pub dummy_arguments: DummyArguments,
    pub attrs: BTreeSet<ProcedureAttr>,
}

impl Procedure {
    pub fn function(
        result: FunctionResult,
        dummy_arguments: DummyArguments,
        attrs: BTreeSet<ProcedureAttr>,
    ) -> Self {
        Self {
            function_result: Some(result),
            dummy_arguments,
            attrs,
        }
    }

    pub fn subroutine(dummy_arguments: DummyArguments, mut attrs: BTreeSet<ProcedureAttr>) -> Self {
        attrs.insert(ProcedureAttr::Subroutine);
        Self {
            function_result: None,
            dummy_arguments,
            attrs,
        }
    }

    pub fn null_pointer() -> Self {
        Self {
            function_result: None,
            dummy_arguments: Vec::new(),
            attrs: [ProcedureAttr::NullPointer].into_iter().collect(),
        }
    }

    // At most one of these holds; neither does for an EXTERNAL procedure
    // that is never referenced.
    pub fn is_function(&self) -> bool {
        self.function_result.is_some()
    }

    pub fn is_subroutine(&self) -> bool {
        self.attrs.contains(&ProcedureAttr::Subroutine)
    }

    pub fn is_pure(&self) -> bool {
        self.attrs.contains(&ProcedureAttr::Pure)
    }

    pub fn is_elemental(&self) -> bool {
        self.attrs.contains(&ProcedureAttr::Elemental)
    }

    pub fn is_bind_c(&self) -> bool {
        self.attrs.contains(&ProcedureAttr::BindC)
    }

    pub fn has_explicit_interface(&self) -> bool {
        !self.attrs.contains(&ProcedureAttr::ImplicitInterface)
    }

    /// Characterizes the procedure a symbol denotes: a subprogram, a
    /// procedure entity (possibly an unrestricted specific intrinsic), or a
    /// type-bound binding.
    pub fn characterize_symbol(id: SymbolId, ctx: &FoldingContext<'_>) -> Option<Procedure> {
        let symbol = ctx.symbols.get(id);
        trace!("characterizing procedure '{}'", symbol.name);
        let mut attrs = copy_attrs(
            symbol,
            &[
                (Attr::Pure, ProcedureAttr::Pure),
                (Attr::Elemental, ProcedureAttr::Elemental),
                (Attr::BindC, ProcedureAttr::BindC),
            ],
        );
        if attrs.contains(&ProcedureAttr::Elemental) && !symbol.has(Attr::Impure) {
            attrs.insert(ProcedureAttr::Pure);
        }
        match &symbol.details {
            Details::Subprogram(subprogram) => {
                let function_result = match subprogram.result {
                    Some(result) => Some(FunctionResult::characterize(result, ctx)?),
                    None => {
                        attrs.insert(ProcedureAttr::Subroutine);
                        None
                    }
                };
                let mut dummy_arguments = Vec::with_capacity(subprogram.dummy_args.len());
                for dummy in &subprogram.dummy_args {
                    match dummy {
                        Some(dummy) => dummy_arguments.push(DummyArgument::characterize(*dummy, ctx)?),
                        None => dummy_arguments.push(DummyArgument::alternate_return()),
                    }
                }
                Some(Procedure {
                    function_result,
                    dummy_arguments,
                    attrs,
                })
            }
            Details::ProcEntity(entity) => {
                if symbol.has(Attr::Intrinsic) {
                    return ctx
                        .intrinsics
                        .lookup_specific(&symbol.name)
                        .map(Procedure::from_specific_intrinsic);
                }
                if let Some(interface) = entity.interface.symbol {
                    return Procedure::characterize_symbol(interface, ctx);
                }
                attrs.insert(ProcedureAttr::ImplicitInterface);
                if symbol.test(Flag::Subroutine) {
                    // any implicit typing is ignored
                    attrs.insert(ProcedureAttr::Subroutine);
                    return Some(Procedure {
                        function_result: None,
                        dummy_arguments: Vec::new(),
                        attrs,
                    });
                }
                let function_result = match &entity.interface.type_spec {
                    Some(spec) => Some(FunctionResult::of_type(ctx.decl_type(spec)?)),
                    None if symbol.test(Flag::Function) => return None,
                    None => None,
                };
                Some(Procedure {
                    function_result,
                    dummy_arguments: Vec::new(),
                    attrs,
                })
            }
            Details::ProcBinding(binding) => {
                let mut result = Procedure::characterize_symbol(binding.procedure, ctx)?;
                if !symbol.has(Attr::NoPass) {
                    match result.find_pass_index(binding.pass_name.as_deref()) {
                        Some(index) => result.dummy_arguments[index].pass = true,
                        None => debug!("binding '{}' has no passed-object dummy", symbol.name),
                    }
                }
                Some(result)
            }
            _ => None,
        }
    }

    pub fn characterize_designator(
        designator: &ProcedureDesignator,
        ctx: &FoldingContext<'_>,
    ) -> Option<Procedure> {
        match designator {
            ProcedureDesignator::Symbol(id) => Procedure::characterize_symbol(*id, ctx),
            ProcedureDesignator::Intrinsic(name) => ctx
                .intrinsics
                .lookup_specific(name)
                .map(Procedure::from_specific_intrinsic),
        }
    }

    // The procedure a reference evaluates to: the interface of a
    // procedure pointer function result.
    pub fn characterize_ref(call: &ProcedureRef, ctx: &FoldingContext<'_>) -> Option<Procedure> {
        let callee = Procedure::characterize_designator(&call.designator, ctx)?;
        callee
            .function_result?
            .is_procedure_pointer()
            .cloned()
    }

    pub fn infer_from_call(
        call: &ProcedureRef,
        is_function: bool,
        ctx: &FoldingContext<'_>,
    ) -> Option<Procedure> {
        let mut dummy_arguments = Vec::with_capacity(call.arguments.len());
        for (j, actual) in call.arguments.iter().enumerate() {
            let Some(actual) = actual else {
                return None;
            };
            let dummy = match &actual.value {
                ActualValue::Expr(expr) => DummyArgument::from_actual(format!("x{}", j + 1), expr, ctx)?,
                ActualValue::AssumedType(dummy) => {
                    let mut type_and_shape = TypeAndShape::characterize_object(*dummy, ctx)?;
                    type_and_shape.set_type(DynamicType::assumed_type());
                    DummyArgument::data_object(format!("x{}", j + 1), DummyDataObject::new(type_and_shape))
                }
                ActualValue::AlternateReturn(_) => DummyArgument::alternate_return(),
            };
            dummy_arguments.push(dummy);
        }
        let mut attrs: BTreeSet<ProcedureAttr> = [ProcedureAttr::ImplicitInterface].into_iter().collect();
        if is_function {
            let result_type = call
                .designator
                .symbol()
                .and_then(|symbol| ctx.symbol_type(symbol))?;
            Some(Procedure::function(
                FunctionResult::of_type(result_type),
                dummy_arguments,
                attrs,
            ))
        } else {
            attrs.insert(ProcedureAttr::Subroutine);
            Some(Procedure {
                function_result: None,
                dummy_arguments,
                attrs,
            })
        }
    }

    pub fn from_specific_intrinsic(specific: &SpecificIntrinsic) -> Procedure {
        let dummy_arguments = specific
            .dummies
            .iter()
            .map(|dummy| {
                let mut object = DummyDataObject::new(TypeAndShape::new(dummy.dynamic_type.clone()));
                object.intent = Intent::In;
                DummyArgument::data_object(dummy.name, object)
            })
            .collect();
        let mut attrs = BTreeSet::from([ProcedureAttr::Pure]);
        if specific.elemental {
            attrs.insert(ProcedureAttr::Elemental);
        }
        Procedure::function(FunctionResult::of_type(specific.result.clone()), dummy_arguments, attrs)
    }

    /// The index of the passed-object dummy: the one named `name`, or the
    /// first data object dummy.
    pub fn find_pass_index(&self, name: Option<&str>) -> Option<usize> {
        match name {
            Some(name) => self
                .dummy_arguments
                .iter()
                .position(|dummy| dummy.name.eq_ignore_ascii_case(name)),
            None => self
                .dummy_arguments
                .iter()
                .position(|dummy| dummy.as_data_object().is_some()),
        }
    }

    pub fn can_be_called_via_implicit_interface(&self) -> bool {
        if self.is_elemental() || self.is_bind_c() {
            false
        } else if let Some(result) = &self.function_result {
            result.can_be_returned_via_implicit_interface()
                && self.all_dummies_pass_implicitly()
        } else {
            self.all_dummies_pass_implicitly()
        }
    }

    fn all_dummies_pass_implicitly(&self) -> bool {
        self.dummy_arguments
            .iter()
            .all(DummyArgument::can_be_passed_via_implicit_interface)
    }

    /// Can `self` override the binding `that` (7.5.7.3)? Apart from the
    /// passed-object dummy, the characteristics must be the same.
    pub fn can_override(&self, that: &Procedure, pass_index: Option<usize>) -> bool {
        // A PURE procedure may override an impure one, not the reverse.
        if (that.is_pure() && !self.is_pure())
            || that.is_elemental() != self.is_elemental()
            || self.function_result != that.function_result
            || self.dummy_arguments.len() != that.dummy_arguments.len()
        {
            return false;
        }
        self.dummy_arguments
            .iter()
            .zip(&that.dummy_arguments)
            .enumerate()
            .all(|(j, (mine, theirs))| {
                if Some(j) == pass_index {
                    match (mine.as_data_object(), theirs.as_data_object()) {
                        (Some(mine), Some(theirs)) => {
                            mine.type_and_shape.rank() == theirs.type_and_shape.rank()
                                && theirs
                                    .type_and_shape
                                    .dynamic_type()
                                    .is_type_compatible_with(mine.type_and_shape.dynamic_type())
                        }
                        _ => false,
                    }
                } else {
                    mine == theirs
                }
            })
    }
}

impl DumpWith for Procedure {
    fn write_dump(&self, f: &mut fmt::Formatter<'_>, symbols: &SymbolTable) -> fmt::Result {
        let attrs: BTreeSet<ProcedureAttr> = self
            .attrs
            .iter()
            .copied()
            .filter(|attr| *attr != ProcedureAttr::Subroutine)
            .collect();
        write_attrs(f, &attrs)?;
        match &self.function_result {
            Some(_) => write!(f, "FUNCTION(")?,
            None if self.is_subroutine() => write!(f, "SUBROUTINE(")?,
            None => write!(f, "PROCEDURE(")?,
        }
        for (j, dummy) in self.dummy_arguments.iter().enumerate() {
            if j > 0 {
                write!(f, ", ")?;
            }
            dummy.write_dump(f, symbols)?;
        }
        write!(f, ")")?;
        if let Some(result) = &self.function_result {
            write!(f, " RESULT(")?;
            result.write_dump(f, symbols)?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real_vector(extent: i64) -> DummyDataObject {
        DummyDataObject::new(TypeAndShape::with_shape(
            DynamicType::real(4),
            vec![Some(Expr::int(extent))],
        ))
    }

    #[test]
    fn equality_ignores_names_and_pass() {
        let mut a = DummyArgument::data_object("x", real_vector(10));
        let b = DummyArgument::data_object("y", real_vector(10));
        a.pass = true;
        assert_eq!(a, b);
        assert_ne!(a, DummyArgument::data_object("x", real_vector(5)));
    }

    #[test]
    fn assumed_rank_has_no_shape() {
        let mut ts = TypeAndShape::with_rank(DynamicType::integer(4), 2);
        ts.set_attr(TypeAndShapeAttr::AssumedRank);
        assert_eq!(ts.rank(), 0);
        ts.set_corank(1);
        assert!(ts.has(TypeAndShapeAttr::Coarray));
    }

    #[test]
    fn optional_round_trip() {
        let mut dummy = DummyArgument::data_object("x", real_vector(1));
        assert!(!dummy.is_optional());
        dummy.set_optional(true);
        assert!(dummy.is_optional());
        assert!(!dummy.can_be_passed_via_implicit_interface());
    }

    #[test]
    fn pointer_result_needs_explicit_interface() {
        let mut result = FunctionResult::of_type(DynamicType::real(4));
        assert!(result.can_be_returned_via_implicit_interface());
        result.attrs.insert(FunctionResultAttr::Pointer);
        assert!(!result.can_be_returned_via_implicit_interface());
    }

    #[test]
    fn dump_of_subroutine() {
        let symbols = SymbolTable::new();
        let mut object = real_vector(10);
        object.intent = Intent::In;
        let procedure = Procedure::subroutine(
            vec![DummyArgument::data_object("x", object)],
            BTreeSet::new(),
        );
        assert_eq!(
            procedure.dump(&symbols).to_string(),
            "SUBROUTINE(x=INTENT(IN) REAL(4) DIMENSION(10))"
        );
    }

    #[test]
    fn specific_intrinsics_keep_their_class() {
        let table = crate::intrinsics::IntrinsicProcTable::configure();
        let len = Procedure::from_specific_intrinsic(table.lookup_specific("len").expect("len"));
        assert!(len.attrs.contains(&ProcedureAttr::Pure));
        assert!(!len.attrs.contains(&ProcedureAttr::Elemental));
        let abs = Procedure::from_specific_intrinsic(table.lookup_specific("abs").expect("abs"));
        assert!(abs.attrs.contains(&ProcedureAttr::Elemental));
    }
}
