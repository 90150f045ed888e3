//! The folding context: integer constant folding, static shapes and types
//! of expressions. This is only as much evaluation as characterization and
//! call checking need.

use crate::expr::{
    operation_result_type, Designator, Expr, Literal, Operator, ProcedureDesignator, Subscript,
};
use crate::intrinsics::IntrinsicProcTable;
use crate::symbol::{
    Attr, DeclTypeSpec, Details, ParamValue, ShapeSpec, Symbol, SymbolId, SymbolTable,
};
use crate::types::{DynamicType, TypeCategory};

/// One optional extent per dimension; `None` where the extent is not known.
pub type Shape = Vec<Option<Expr>>;

#[derive(Clone, Copy)]
pub struct FoldingContext<'a> {
    pub symbols: &'a SymbolTable,
    pub intrinsics: &'a IntrinsicProcTable,
}

impl<'a> FoldingContext<'a> {
    pub fn new(symbols: &'a SymbolTable, intrinsics: &'a IntrinsicProcTable) -> Self {
        Self {
            symbols,
            intrinsics,
        }
    }

    pub fn fold_integer(&self, expr: &Expr) -> Option<i64> {
        self.fold_integer_within(expr, &mut Vec::new())
    }

    /// `pending` holds the named constants whose values are being folded;
    /// meeting one of them again means its definition is circular.
    fn fold_integer_within(&self, expr: &Expr, pending: &mut Vec<SymbolId>) -> Option<i64> {
        match expr {
            Expr::Literal(Literal::Integer { value, .. }) => Some(*value),
            Expr::Designator(designator) if designator.is_whole() => {
                let id = designator.symbol;
                let symbol = self.symbols.get(id);
                if !symbol.has(Attr::Parameter) || pending.contains(&id) {
                    return None;
                }
                pending.push(id);
                let value = symbol
                    .object()
                    .and_then(|object| object.init.as_ref())
                    .and_then(|init| self.fold_integer_within(init, pending));
                pending.pop();
                value
            }
            Expr::Operation(operation) => match (operation.op, operation.operands.as_slice()) {
                (Operator::Parentheses, [x]) => self.fold_integer_within(x, pending),
                (Operator::Negate, [x]) => self.fold_integer_within(x, pending)?.checked_neg(),
                (op, [x, y]) => {
                    let x = self.fold_integer_within(x, pending)?;
                    let y = self.fold_integer_within(y, pending)?;
                    match op {
                        Operator::Add => x.checked_add(y),
                        Operator::Subtract => x.checked_sub(y),
                        Operator::Multiply => x.checked_mul(y),
                        Operator::Divide => x.checked_div(y),
                        Operator::Power => u32::try_from(y).ok().and_then(|y| x.checked_pow(y)),
                        _ => None,
                    }
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Replaces an integer expression by its value when it folds.
    pub fn fold(&self, expr: &Expr) -> Expr {
        match self.fold_integer(expr) {
            Some(value) => Expr::int(value),
            None => expr.clone(),
        }
    }

    pub fn symbol_type(&self, id: SymbolId) -> Option<DynamicType> {
        let symbol = self.symbols.get(id);
        match &symbol.details {
            Details::Object(object) => self.decl_type(object.type_spec.as_ref()?),
            Details::Assoc(assoc) => self.type_of(&assoc.expr),
            Details::ProcEntity(entity) => match (&entity.interface.type_spec, entity.interface.symbol) {
                (Some(spec), _) => self.decl_type(spec),
                (None, Some(interface)) => self.symbol_type(interface),
                (None, None) => None,
            },
            Details::Subprogram(subprogram) => self.symbol_type(subprogram.result?),
            Details::ProcBinding(binding) => self.symbol_type(binding.procedure),
            _ => None,
        }
    }

    pub fn decl_type(&self, spec: &DeclTypeSpec) -> Option<DynamicType> {
        match spec {
            DeclTypeSpec::Intrinsic { category, kind, .. } => {
                Some(DynamicType::intrinsic(*category, *kind))
            }
            DeclTypeSpec::TypeDerived(id) => {
                Some(DynamicType::derived(self.symbols.derived_type_spec(*id)?))
            }
            DeclTypeSpec::ClassDerived(id) => {
                Some(DynamicType::class(self.symbols.derived_type_spec(*id)?))
            }
            DeclTypeSpec::TypeStar => Some(DynamicType::assumed_type()),
            DeclTypeSpec::ClassStar => Some(DynamicType::unlimited_polymorphic()),
        }
    }

    /// The declared type spec of a data entity or function.
    pub fn symbol_type_spec(&self, id: SymbolId) -> Option<&'a DeclTypeSpec> {
        let symbols: &'a SymbolTable = self.symbols;
        match &symbols.get(id).details {
            Details::Object(object) => object.type_spec.as_ref(),
            Details::ProcEntity(entity) => match (&entity.interface.type_spec, entity.interface.symbol) {
                (Some(spec), _) => Some(spec),
                (None, Some(interface)) => self.symbol_type_spec(interface),
                (None, None) => None,
            },
            Details::Subprogram(subprogram) => self.symbol_type_spec(subprogram.result?),
            _ => None,
        }
    }

    /// The character length of an entity when it is given by an expression;
    /// assumed (`*`) and deferred (`:`) lengths have none.
    pub fn symbol_length(&self, id: SymbolId) -> Option<Expr> {
        if let Details::Assoc(assoc) = &self.symbols.get(id).details {
            return self.char_length(&assoc.expr);
        }
        match self.symbol_type_spec(id)? {
            DeclTypeSpec::Intrinsic {
                category: TypeCategory::Character,
                length,
                ..
            } => match length {
                Some(ParamValue::Explicit(len)) => Some(self.fold(len)),
                Some(ParamValue::Assumed | ParamValue::Deferred) => None,
                None => Some(Expr::int(1)),
            },
            _ => None,
        }
    }

    pub fn has_assumed_length(&self, id: SymbolId) -> bool {
        matches!(
            self.symbol_type_spec(id),
            Some(DeclTypeSpec::Intrinsic {
                category: TypeCategory::Character,
                length: Some(ParamValue::Assumed),
                ..
            })
        )
    }

    /// Shape of a declared entity; `None` for assumed rank.
    pub fn symbol_shape(&self, id: SymbolId) -> Option<Shape> {
        let symbol = self.symbols.get(id);
        match &symbol.details {
            Details::Object(object) => {
                if object.is_assumed_rank() {
                    return None;
                }
                Some(object.shape.iter().map(|dim| self.extent(dim)).collect())
            }
            Details::Assoc(assoc) => self.get_shape(&assoc.expr),
            Details::Subprogram(subprogram) => match subprogram.result {
                Some(result) => self.symbol_shape(result),
                None => Some(Vec::new()),
            },
            _ => Some(Vec::new()),
        }
    }

    fn extent(&self, dim: &ShapeSpec) -> Option<Expr> {
        match dim {
            ShapeSpec::Explicit { lower, upper } => self.extent_of(lower.as_ref(), upper),
            _ => None,
        }
    }

    fn extent_of(&self, lower: Option<&Expr>, upper: &Expr) -> Option<Expr> {
        let lower_value = match lower {
            Some(lower) => self.fold_integer(lower),
            None => Some(1),
        };
        match (lower_value, self.fold_integer(upper)) {
            (Some(lb), Some(ub)) => ub
                .checked_sub(lb)
                .and_then(|extent| extent.checked_add(1))
                .map(|extent| Expr::int(extent.max(0))),
            (Some(1), None) => Some(upper.clone()),
            (_, _) => {
                let lower = lower?.clone();
                Some(Expr::binary(
                    Operator::Add,
                    Expr::binary(Operator::Subtract, upper.clone(), lower),
                    Expr::int(1),
                ))
            }
        }
    }

    fn declared_bounds(&self, id: SymbolId, dim: usize) -> (Option<Expr>, Option<Expr>) {
        match self.symbols.get(id).object().and_then(|o| o.shape.get(dim)) {
            Some(ShapeSpec::Explicit { lower, upper }) => (
                Some(lower.clone().unwrap_or_else(|| Expr::int(1))),
                Some(upper.clone()),
            ),
            Some(ShapeSpec::Colon { lower } | ShapeSpec::AssumedSize { lower }) => {
                (Some(lower.clone().unwrap_or_else(|| Expr::int(1))), None)
            }
            _ => (None, None),
        }
    }

    pub fn get_shape(&self, expr: &Expr) -> Option<Shape> {
        match expr {
            Expr::Literal(_) | Expr::Null | Expr::Boz(_) | Expr::Procedure(_) => Some(Vec::new()),
            Expr::ArrayConstructor { values, .. } => {
                let mut count = 0i64;
                for value in values {
                    let shape = self.get_shape(value)?;
                    let mut size = 1i64;
                    for extent in &shape {
                        match extent.as_ref().and_then(|e| self.fold_integer(e)) {
                            Some(n) => size *= n,
                            None => return Some(vec![None]),
                        }
                    }
                    count += size;
                }
                Some(vec![Some(Expr::int(count))])
            }
            Expr::Designator(designator) => self.designator_shape(designator),
            Expr::FunctionRef(call) => {
                if let ProcedureDesignator::Intrinsic(name) = &call.designator {
                    if self.intrinsics.has_scalar_result(name) {
                        return Some(Vec::new());
                    }
                    return self.elemental_shape(call.arguments.iter().flatten().filter_map(|a| a.unwrap_expr()));
                }
                let symbol = call.designator.symbol()?;
                if self.is_elemental_procedure(symbol) {
                    self.elemental_shape(call.arguments.iter().flatten().filter_map(|a| a.unwrap_expr()))
                } else {
                    self.function_result_shape(symbol)
                }
            }
            Expr::Operation(operation) => self.elemental_shape(operation.operands.iter()),
        }
    }

    fn elemental_shape<'e>(&self, operands: impl Iterator<Item = &'e Expr>) -> Option<Shape> {
        let mut result = Vec::new();
        for operand in operands {
            let shape = self.get_shape(operand)?;
            if shape.len() > result.len() {
                result = shape;
            }
        }
        Some(result)
    }

    fn function_result_shape(&self, id: SymbolId) -> Option<Shape> {
        match &self.symbols.get(id).details {
            Details::Subprogram(subprogram) => self.symbol_shape(subprogram.result?),
            Details::ProcEntity(entity) => match entity.interface.symbol {
                Some(interface) => self.function_result_shape(interface),
                None => Some(Vec::new()),
            },
            Details::ProcBinding(binding) => self.function_result_shape(binding.procedure),
            _ => self.symbol_shape(id),
        }
    }

    fn is_elemental_procedure(&self, id: SymbolId) -> bool {
        let symbol = self.symbols.get(id);
        if symbol.has(Attr::Elemental) {
            return true;
        }
        match &symbol.details {
            Details::ProcEntity(entity) => entity
                .interface
                .symbol
                .map_or(false, |interface| self.is_elemental_procedure(interface)),
            Details::ProcBinding(binding) => self.is_elemental_procedure(binding.procedure),
            _ => false,
        }
    }

    fn designator_shape(&self, designator: &Designator) -> Option<Shape> {
        if designator.is_whole() {
            return self.symbol_shape(designator.symbol);
        }
        let mut shape = Vec::new();
        for (dim, subscript) in designator.subscripts.iter().enumerate() {
            match subscript {
                Subscript::Index(index) => {
                    let index_shape = self.get_shape(index)?;
                    if let [extent] = index_shape.as_slice() {
                        shape.push(extent.clone());
                    }
                }
                Subscript::Triplet {
                    lower,
                    upper,
                    stride,
                } => {
                    let (declared_lower, declared_upper) =
                        self.declared_bounds(designator.symbol, dim);
                    let lower = lower.clone().or(declared_lower);
                    let upper = upper.clone().or(declared_upper);
                    let stride = stride.as_ref().map_or(Some(1), |s| self.fold_integer(s));
                    shape.push(self.triplet_extent(lower.as_ref(), upper.as_ref(), stride));
                }
            }
        }
        Some(shape)
    }

    fn triplet_extent(&self, lower: Option<&Expr>, upper: Option<&Expr>, stride: Option<i64>) -> Option<Expr> {
        let lower = self.fold_integer(lower?)?;
        let upper = self.fold_integer(upper?)?;
        let stride = stride.filter(|&s| s != 0)?;
        let extent = upper
            .checked_sub(lower)?
            .checked_add(stride)?
            .checked_div(stride)?;
        Some(Expr::int(extent.max(0)))
    }

    pub fn rank(&self, expr: &Expr) -> Option<usize> {
        self.get_shape(expr).map(|shape| shape.len())
    }

    /// True for an array whose rank is not known because it is assumed.
    pub fn is_assumed_rank(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Designator(designator) if designator.is_whole() => self
                .symbols
                .get(designator.symbol)
                .object()
                .map_or(false, |object| object.is_assumed_rank()),
            _ => false,
        }
    }

    pub fn type_of(&self, expr: &Expr) -> Option<DynamicType> {
        match expr {
            Expr::Literal(literal) => Some(literal.dynamic_type()),
            Expr::ArrayConstructor { element_type, .. } => Some(element_type.clone()),
            Expr::Designator(designator) => self.symbol_type(designator.symbol),
            Expr::FunctionRef(call) => match &call.designator {
                ProcedureDesignator::Intrinsic(name) => {
                    let arguments: Vec<Option<DynamicType>> = call
                        .arguments
                        .iter()
                        .map(|arg| arg.as_ref().and_then(|a| a.unwrap_expr()).and_then(|e| self.type_of(e)))
                        .collect();
                    self.intrinsics.result_type(name, &arguments)
                }
                ProcedureDesignator::Symbol(id) => self.symbol_type(*id),
            },
            Expr::Operation(operation) => {
                let operands: Vec<Option<DynamicType>> =
                    operation.operands.iter().map(|x| self.type_of(x)).collect();
                operation_result_type(operation.op, &operands)
            }
            Expr::Null | Expr::Procedure(_) => None,
            Expr::Boz(_) => Some(DynamicType::typeless_intrinsic_argument()),
        }
    }

    pub fn char_length(&self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Literal(Literal::Character { value, .. }) => {
                Some(Expr::int(value.chars().count() as i64))
            }
            Expr::Designator(designator) => self.symbol_length(designator.symbol),
            Expr::FunctionRef(call) => self.symbol_length(call.designator.symbol()?),
            Expr::Operation(operation) => match (operation.op, operation.operands.as_slice()) {
                (Operator::Parentheses, [x]) => self.char_length(x),
                (Operator::Concat, [x, y]) => {
                    let x = self.fold_integer(&self.char_length(x)?)?;
                    let y = self.fold_integer(&self.char_length(y)?)?;
                    Some(Expr::int(x.checked_add(y)?))
                }
                _ => None,
            },
            Expr::ArrayConstructor { values, .. } => self.char_length(values.first()?),
            _ => None,
        }
    }

    /// A variable is a designator of a data object that is not a named
    /// constant.
    pub fn is_variable(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Designator(designator) => {
                let symbol = self.symbols.get(designator.symbol);
                match &symbol.details {
                    Details::Object(_) => !symbol.has(Attr::Parameter),
                    Details::Assoc(assoc) => self.is_variable(&assoc.expr),
                    _ => false,
                }
            }
            Expr::FunctionRef(call) => call
                .designator
                .symbol()
                .and_then(|id| self.function_result_symbol(id))
                .map_or(false, |result| self.symbols.get(result).is_pointer()),
            _ => false,
        }
    }

    fn function_result_symbol(&self, id: SymbolId) -> Option<SymbolId> {
        match &self.symbols.get(id).details {
            Details::Subprogram(subprogram) => subprogram.result,
            Details::ProcEntity(entity) => self.function_result_symbol(entity.interface.symbol?),
            _ => None,
        }
    }

    pub fn has_vector_subscript(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Designator(designator) => designator.subscripts.iter().any(|subscript| {
                matches!(subscript, Subscript::Index(index) if self.rank(index).unwrap_or(0) > 0)
            }),
            _ => false,
        }
    }

    /// Whether the designated object is known to be simply contiguous.
    pub fn is_simply_contiguous(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Designator(designator) => {
                let symbol = self.symbols.get(designator.symbol);
                if symbol.is_pointer() && !symbol.has(Attr::Contiguous) {
                    return false;
                }
                let assumed_shape = symbol.object().map_or(false, |object| {
                    object.is_dummy
                        && !symbol.is_allocatable()
                        && !symbol.is_pointer()
                        && object.shape.iter().any(|d| matches!(d, ShapeSpec::Colon { .. }))
                });
                if assumed_shape && !symbol.has(Attr::Contiguous) {
                    return false;
                }
                designator.subscripts.iter().all(|subscript| match subscript {
                    Subscript::Index(index) => self.rank(index).unwrap_or(0) == 0,
                    Subscript::Triplet { stride, .. } => stride
                        .as_ref()
                        .map_or(true, |stride| self.fold_integer(stride) == Some(1)),
                })
            }
            _ => !matches!(expr, Expr::FunctionRef(_)),
        }
    }

    /// The symbol that determines whether an actual argument is a pointer,
    /// allocatable, or otherwise carries declared attributes.
    pub fn whole_symbol(&self, expr: &Expr) -> Option<&'a Symbol> {
        let symbols: &'a SymbolTable = self.symbols;
        match expr {
            Expr::Designator(designator) if designator.is_whole() && !designator.coindexed => {
                Some(symbols.get(designator.symbol))
            }
            _ => None,
        }
    }

    /// Is this expression a pointer: a whole pointer object or a reference to
    /// a function with a pointer result.
    pub fn is_pointer(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Designator(designator) if designator.is_whole() => {
                self.symbols.get(designator.symbol).is_pointer()
            }
            Expr::FunctionRef(_) => self.is_variable(expr),
            Expr::Null => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Attrs, ObjectEntityDetails, SymbolTable};

    fn array(symbols: &mut SymbolTable, name: &str, upper: i64) -> SymbolId {
        let scope = symbols.global();
        symbols.add_symbol(
            scope,
            name,
            Attrs::new(),
            Details::Object(ObjectEntityDetails {
                type_spec: Some(DeclTypeSpec::Intrinsic {
                    category: TypeCategory::Real,
                    kind: 4,
                    length: None,
                }),
                shape: vec![ShapeSpec::Explicit {
                    lower: None,
                    upper: Expr::int(upper),
                }],
                ..Default::default()
            }),
            0..0,
        )
    }

    #[test]
    fn section_extent() {
        let mut symbols = SymbolTable::new();
        let a = array(&mut symbols, "a", 10);
        let intrinsics = IntrinsicProcTable::configure();
        let ctx = FoldingContext::new(&symbols, &intrinsics);
        let section = Expr::Designator(Designator {
            symbol: a,
            subscripts: vec![Subscript::Triplet {
                lower: Some(Expr::int(2)),
                upper: None,
                stride: Some(Expr::int(3)),
            }],
            coindexed: false,
        });
        let shape = ctx.get_shape(&section).unwrap();
        assert_eq!(shape, vec![Some(Expr::int(3))]);
        assert!(!ctx.is_simply_contiguous(&section));
    }

    #[test]
    fn element_is_scalar() {
        let mut symbols = SymbolTable::new();
        let a = array(&mut symbols, "a", 10);
        let intrinsics = IntrinsicProcTable::configure();
        let ctx = FoldingContext::new(&symbols, &intrinsics);
        let element = Expr::Designator(Designator {
            symbol: a,
            subscripts: vec![Subscript::Index(Expr::int(1))],
            coindexed: false,
        });
        assert_eq!(ctx.rank(&element), Some(0));
        assert_eq!(ctx.rank(&Expr::symbol(a)), Some(1));
        assert!(ctx.is_variable(&element));
    }

    #[test]
    fn folds_arithmetic() {
        let symbols = SymbolTable::new();
        let intrinsics = IntrinsicProcTable::configure();
        let ctx = FoldingContext::new(&symbols, &intrinsics);
        let expr = Expr::binary(
            Operator::Multiply,
            Expr::int(3),
            Expr::unary(Operator::Negate, Expr::int(4)),
        );
        assert_eq!(ctx.fold_integer(&expr), Some(-12));
    }
}
