//! Typed expressions and actual arguments, as handed to the checker by the
//! expression-analysis pass.

use crate::errors::Span;
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::{DynamicType, TypeCategory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer { value: i64, kind: u8 },
    Real { text: String, kind: u8 },
    Complex { re: String, im: String, kind: u8 },
    Character { value: String, kind: u8 },
    Logical { value: bool, kind: u8 },
}

impl Literal {
    pub fn dynamic_type(&self) -> DynamicType {
        match self {
            Literal::Integer { kind, .. } => DynamicType::integer(*kind),
            Literal::Real { kind, .. } => DynamicType::real(*kind),
            Literal::Complex { kind, .. } => DynamicType::complex(*kind),
            Literal::Character { kind, .. } => DynamicType::character(*kind),
            Literal::Logical { kind, .. } => DynamicType::logical(*kind),
        }
    }

    fn as_fortran(&self) -> String {
        match self {
            Literal::Integer { value, kind } if *kind == 4 => value.to_string(),
            Literal::Integer { value, kind } => format!("{}_{}", value, kind),
            Literal::Real { text, .. } => text.clone(),
            Literal::Complex { re, im, .. } => format!("({},{})", re, im),
            Literal::Character { value, .. } => format!("'{}'", value.replace('\'', "''")),
            Literal::Logical { value: true, .. } => ".TRUE.".to_string(),
            Literal::Logical { value: false, .. } => ".FALSE.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Parentheses,
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Relational(RelationalOperator),
    Not,
    And,
    Or,
    Eqv,
    Neqv,
}

impl Operator {
    pub fn spelling(self) -> &'static str {
        match self {
            Operator::Parentheses => "()",
            Operator::Negate | Operator::Subtract => "-",
            Operator::Add => "+",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Power => "**",
            Operator::Concat => "//",
            Operator::Relational(RelationalOperator::Eq) => "==",
            Operator::Relational(RelationalOperator::Ne) => "/=",
            Operator::Relational(RelationalOperator::Lt) => "<",
            Operator::Relational(RelationalOperator::Le) => "<=",
            Operator::Relational(RelationalOperator::Gt) => ">",
            Operator::Relational(RelationalOperator::Ge) => ">=",
            Operator::Not => ".NOT.",
            Operator::And => ".AND.",
            Operator::Or => ".OR.",
            Operator::Eqv => ".EQV.",
            Operator::Neqv => ".NEQV.",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Parentheses | Operator::Negate | Operator::Not)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub op: Operator,
    pub operands: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscript {
    Index(Expr),
    Triplet {
        lower: Option<Expr>,
        upper: Option<Expr>,
        stride: Option<Expr>,
    },
}

/// A reference to a named data entity, possibly subscripted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Designator {
    pub symbol: SymbolId,
    pub subscripts: Vec<Subscript>,
    pub coindexed: bool,
}

impl Designator {
    pub fn whole(symbol: SymbolId) -> Self {
        Self {
            symbol,
            subscripts: Vec::new(),
            coindexed: false,
        }
    }

    pub fn is_whole(&self) -> bool {
        self.subscripts.is_empty()
    }

    pub fn has_triplet(&self) -> bool {
        self.subscripts
            .iter()
            .any(|subscript| matches!(subscript, Subscript::Triplet { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureDesignator {
    Symbol(SymbolId),
    /// A specific intrinsic function known by name to the intrinsic table.
    Intrinsic(String),
}

impl ProcedureDesignator {
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            ProcedureDesignator::Symbol(id) => Some(*id),
            ProcedureDesignator::Intrinsic(_) => None,
        }
    }

    pub fn name<'a>(&'a self, symbols: &'a SymbolTable) -> &'a str {
        match self {
            ProcedureDesignator::Symbol(id) => symbols.get(*id).name.as_str(),
            ProcedureDesignator::Intrinsic(name) => name.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRef {
    pub designator: ProcedureDesignator,
    pub arguments: ActualArguments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    ArrayConstructor {
        element_type: DynamicType,
        values: Vec<Expr>,
    },
    Designator(Designator),
    FunctionRef(Box<ProcedureRef>),
    Operation(Box<Operation>),
    /// A reference to the intrinsic `NULL()`.
    Null,
    Boz(String),
    Procedure(ProcedureDesignator),
}

impl Expr {
    pub fn int(value: i64) -> Expr {
        Expr::Literal(Literal::Integer { value, kind: 4 })
    }

    pub fn symbol(id: SymbolId) -> Expr {
        Expr::Designator(Designator::whole(id))
    }

    pub fn binary(op: Operator, left: Expr, right: Expr) -> Expr {
        Expr::Operation(Box::new(Operation {
            op,
            operands: vec![left, right],
        }))
    }

    pub fn unary(op: Operator, operand: Expr) -> Expr {
        Expr::Operation(Box::new(Operation {
            op,
            operands: vec![operand],
        }))
    }

    pub fn as_designator(&self) -> Option<&Designator> {
        match self {
            Expr::Designator(designator) => Some(designator),
            _ => None,
        }
    }

    pub fn as_int_literal(&self) -> Option<i64> {
        match self {
            Expr::Literal(Literal::Integer { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// The symbol named by a designator, the "last symbol" of the reference.
    pub fn last_symbol(&self) -> Option<SymbolId> {
        self.as_designator().map(|designator| designator.symbol)
    }

    pub fn is_null_pointer(&self) -> bool {
        matches!(self, Expr::Null)
    }

    pub fn is_boz(&self) -> bool {
        matches!(self, Expr::Boz(_))
    }

    pub fn is_procedure_designator(&self) -> bool {
        matches!(self, Expr::Procedure(_))
    }

    /// Structural constancy: literals and operations over literals.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Boz(_) => true,
            Expr::ArrayConstructor { values, .. } => values.iter().all(Expr::is_constant),
            Expr::Operation(op) => op.operands.iter().all(Expr::is_constant),
            _ => false,
        }
    }

    pub fn is_character_literal(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Character { .. }))
    }

    pub fn as_fortran(&self, symbols: &SymbolTable) -> String {
        match self {
            Expr::Literal(literal) => literal.as_fortran(),
            Expr::ArrayConstructor { values, .. } => {
                let items: Vec<String> = values.iter().map(|v| v.as_fortran(symbols)).collect();
                format!("[{}]", items.join(","))
            }
            Expr::Designator(designator) => designator_as_fortran(designator, symbols),
            Expr::FunctionRef(call) => {
                let args: Vec<String> = call
                    .arguments
                    .iter()
                    .flatten()
                    .map(|arg| arg.as_fortran(symbols))
                    .collect();
                format!("{}({})", call.designator.name(symbols), args.join(","))
            }
            Expr::Operation(op) => match (op.op, op.operands.as_slice()) {
                (Operator::Parentheses, [x]) => format!("({})", x.as_fortran(symbols)),
                (Operator::Negate, [x]) => format!("-{}", x.as_fortran(symbols)),
                (Operator::Not, [x]) => format!(".NOT.{}", x.as_fortran(symbols)),
                (binary, [x, y]) => format!(
                    "{}{}{}",
                    x.as_fortran(symbols),
                    binary.spelling(),
                    y.as_fortran(symbols)
                ),
                (other, operands) => {
                    let items: Vec<String> =
                        operands.iter().map(|v| v.as_fortran(symbols)).collect();
                    format!("{}({})", other.spelling(), items.join(","))
                }
            },
            Expr::Null => "NULL()".to_string(),
            Expr::Boz(text) => text.clone(),
            Expr::Procedure(designator) => designator.name(symbols).to_string(),
        }
    }
}

fn designator_as_fortran(designator: &Designator, symbols: &SymbolTable) -> String {
    let mut out = symbols.get(designator.symbol).name.clone();
    if !designator.subscripts.is_empty() {
        let subscripts: Vec<String> = designator
            .subscripts
            .iter()
            .map(|subscript| match subscript {
                Subscript::Index(index) => index.as_fortran(symbols),
                Subscript::Triplet {
                    lower,
                    upper,
                    stride,
                } => {
                    let mut text = String::new();
                    if let Some(lower) = lower {
                        text.push_str(&lower.as_fortran(symbols));
                    }
                    text.push(':');
                    if let Some(upper) = upper {
                        text.push_str(&upper.as_fortran(symbols));
                    }
                    if let Some(stride) = stride {
                        text.push(':');
                        text.push_str(&stride.as_fortran(symbols));
                    }
                    text
                }
            })
            .collect();
        out.push('(');
        out.push_str(&subscripts.join(","));
        out.push(')');
    }
    if designator.coindexed {
        out.push_str("[*]");
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActualValue {
    Expr(Expr),
    /// A `TYPE(*)` dummy argument forwarded to another procedure.
    AssumedType(SymbolId),
    /// `*label`
    AlternateReturn(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActualArgument {
    pub keyword: Option<String>,
    pub value: ActualValue,
    pub is_passed_object: bool,
    pub span: Option<Span>,
}

impl ActualArgument {
    pub fn new(expr: Expr) -> Self {
        Self {
            keyword: None,
            value: ActualValue::Expr(expr),
            is_passed_object: false,
            span: None,
        }
    }

    pub fn alternate_return(label: u64) -> Self {
        Self {
            value: ActualValue::AlternateReturn(label),
            ..Self::new(Expr::Null)
        }
    }

    pub fn assumed_type(dummy: SymbolId) -> Self {
        Self {
            value: ActualValue::AssumedType(dummy),
            ..Self::new(Expr::Null)
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into().to_ascii_lowercase());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn unwrap_expr(&self) -> Option<&Expr> {
        match &self.value {
            ActualValue::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn assumed_type_dummy(&self) -> Option<SymbolId> {
        match &self.value {
            ActualValue::AssumedType(symbol) => Some(*symbol),
            _ => None,
        }
    }

    pub fn is_alternate_return(&self) -> bool {
        matches!(self.value, ActualValue::AlternateReturn(_))
    }

    pub fn as_fortran(&self, symbols: &SymbolTable) -> String {
        let value = match &self.value {
            ActualValue::Expr(expr) => expr.as_fortran(symbols),
            ActualValue::AssumedType(symbol) => symbols.get(*symbol).name.clone(),
            ActualValue::AlternateReturn(label) => format!("*{}", label),
        };
        match &self.keyword {
            Some(keyword) => format!("{}={}", keyword, value),
            None => value,
        }
    }
}

pub type ActualArguments = Vec<Option<ActualArgument>>;

/// Result category of an intrinsic operation; `None` when the operands
/// cannot be combined.
pub fn operation_result_type(
    op: Operator,
    operands: &[Option<DynamicType>],
) -> Option<DynamicType> {
    match op {
        Operator::Parentheses | Operator::Negate => operands.first()?.clone(),
        Operator::Not | Operator::And | Operator::Or | Operator::Eqv | Operator::Neqv => {
            Some(DynamicType::logical(4))
        }
        Operator::Relational(_) => Some(DynamicType::logical(4)),
        Operator::Concat => operands.first()?.clone(),
        Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::Power => {
            let left = operands.first()?.as_ref()?;
            let right = operands.get(1)?.as_ref()?;
            numeric_result(left, right)
        }
    }
}

fn numeric_result(left: &DynamicType, right: &DynamicType) -> Option<DynamicType> {
    let rank = |category: TypeCategory| match category {
        TypeCategory::Integer => Some(0),
        TypeCategory::Real => Some(1),
        TypeCategory::Complex => Some(2),
        _ => None,
    };
    let l = rank(left.category())?;
    let r = rank(right.category())?;
    if l == r {
        Some(DynamicType::intrinsic(
            left.category(),
            left.kind().max(right.kind()),
        ))
    } else if l > r {
        Some(left.clone())
    } else {
        Some(right.clone())
    }
}
