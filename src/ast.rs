use crate::errors::Span;

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub units: Vec<ProgramUnit>,
}

#[derive(Debug, Clone)]
pub enum ProgramUnit {
    Main(MainProgram),
    Module(Module),
    Subprogram(Subprogram),
}

#[derive(Debug, Clone)]
pub struct MainProgram {
    pub name: Option<String>,
    pub spec: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub contains: Vec<Subprogram>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub spec: Vec<Decl>,
    pub contains: Vec<Subprogram>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Pure,
    Impure,
    Elemental,
    Recursive,
    Module,
}

#[derive(Debug, Clone)]
pub enum SubprogramKind {
    Subroutine,
    Function {
        result: Option<String>,
        type_spec: Option<TypeSpec>,
    },
}

#[derive(Debug, Clone)]
pub enum DummyName {
    Name(String, Span),
    /// `*`, an alternate return
    Star(Span),
}

#[derive(Debug, Clone)]
pub struct Subprogram {
    pub kind: SubprogramKind,
    pub name: String,
    pub prefixes: Vec<Prefix>,
    pub dummies: Vec<DummyName>,
    pub bind_c: bool,
    pub spec: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub contains: Vec<Subprogram>,
    pub span: Span,
}

impl Subprogram {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, SubprogramKind::Function { .. })
    }
}

#[derive(Debug, Clone)]
pub struct LetterRange {
    pub start: char,
    pub end: Option<char>,
}

#[derive(Debug, Clone)]
pub struct Implicit {
    pub type_spec: TypeSpec,
    pub letter_ranges: Vec<LetterRange>,
}

#[derive(Debug, Clone)]
pub enum LenParam {
    Expr(Expr),
    /// `*`
    Star,
    /// `:`
    Colon,
}

#[derive(Debug, Clone)]
pub enum TypeSpec {
    Integer(Option<Expr>),
    Real(Option<Expr>),
    DoublePrecision,
    Complex(Option<Expr>),
    Character {
        len: Option<LenParam>,
        kind: Option<Expr>,
    },
    Logical(Option<Expr>),
    Type(String),
    Class(String),
    /// `TYPE(*)`
    TypeStar,
    /// `CLASS(*)`
    ClassStar,
}

#[derive(Debug, Clone)]
pub enum DimSpec {
    Explicit { lower: Option<Expr>, upper: Expr },
    Colon { lower: Option<Expr> },
    Star { lower: Option<Expr> },
    /// `..`
    AssumedRank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSpec {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone)]
pub enum AttrSpec {
    Allocatable,
    Asynchronous,
    BindC,
    Codimension(Vec<DimSpec>),
    Contiguous,
    Dimension(Vec<DimSpec>),
    External,
    Intent(IntentSpec),
    Intrinsic,
    Optional,
    Parameter,
    Pointer,
    Private,
    Protected,
    Public,
    Save,
    Target,
    Value,
    Volatile,
    // procedure components and bindings
    Pass(Option<String>),
    NoPass,
    Deferred,
}

#[derive(Debug, Clone)]
pub struct EntityDecl {
    pub name: String,
    pub dims: Option<Vec<DimSpec>>,
    pub codims: Option<Vec<DimSpec>>,
    pub len: Option<LenParam>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ProcInterfaceName {
    Name(String),
    Type(TypeSpec),
}

#[derive(Debug, Clone)]
pub enum GenericSpec {
    Name(String),
    /// `OPERATOR(.op.)` or `OPERATOR(+)`
    Operator(String),
    Assignment,
}

#[derive(Debug, Clone)]
pub enum InterfaceKind {
    Unnamed,
    Abstract,
    Generic(GenericSpec),
}

#[derive(Debug, Clone)]
pub struct InterfaceBlock {
    pub kind: InterfaceKind,
    pub bodies: Vec<Subprogram>,
    pub module_procedures: Vec<(String, Span)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Binding {
    Specific {
        name: String,
        procedure: Option<String>,
        interface: Option<String>,
        attrs: Vec<AttrSpec>,
        span: Span,
    },
    Generic {
        spec: GenericSpec,
        specifics: Vec<String>,
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub struct DerivedTypeDef {
    pub name: String,
    pub extends: Option<String>,
    pub is_abstract: bool,
    pub components: Vec<Decl>,
    pub bindings: Vec<Binding>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Use {
        module: String,
        span: Span,
    },
    ImplicitNone {
        span: Span,
    },
    Implicit {
        rules: Vec<Implicit>,
        span: Span,
    },
    TypeDecl {
        type_spec: TypeSpec,
        attrs: Vec<AttrSpec>,
        entities: Vec<EntityDecl>,
        span: Span,
    },
    /// `OPTIONAL :: x`, `EXTERNAL f`, `INTENT(IN) :: y`, ...
    AttrStmt {
        attr: AttrSpec,
        names: Vec<(String, Span)>,
        span: Span,
    },
    ProcedureDecl {
        interface: Option<ProcInterfaceName>,
        attrs: Vec<AttrSpec>,
        names: Vec<(String, Span)>,
        span: Span,
    },
    Interface(InterfaceBlock),
    DerivedType(DerivedTypeDef),
}

#[derive(Debug, Clone)]
pub enum ArgValue {
    Expr(Expr),
    /// `*label`
    Label(u64),
    Triplet {
        lower: Option<Expr>,
        upper: Option<Expr>,
        stride: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub keyword: Option<String>,
    pub value: ArgValue,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Eqv,
    Neqv,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int { digits: String, kind: Option<String> },
    Real { text: String, kind: Option<String> },
    Complex(Box<Expr>, Box<Expr>),
    Str(String),
    Logical(bool),
    Boz(String),
    Name(String),
    /// `f(...)`: a function reference or an array element or section,
    /// told apart during name resolution.
    Call(Box<Expr>, Vec<Arg>),
    Component(Box<Expr>, String),
    Coindexed(Box<Expr>),
    ArrayCtor(Vec<Expr>),
    Paren(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Un(UnOp, Box<Expr>),
    DefinedBin(String, Box<Expr>, Box<Expr>),
    DefinedUn(String, Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        let span = l.span.start..r.span.end;
        Expr::new(ExprKind::Bin(op, Box::new(l), Box::new(r)), span)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DoControl {
    pub var: String,
    pub start: Expr,
    pub end: Expr,
    pub step: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Call {
        target: Expr,
        args: Vec<Arg>,
        span: Span,
    },
    Assign {
        lhs: Expr,
        rhs: Expr,
        span: Span,
    },
    Associate {
        names: Vec<(String, Expr)>,
        body: Vec<Stmt>,
        span: Span,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    Do {
        control: Option<DoControl>,
        body: Vec<Stmt>,
        span: Span,
    },
    Print {
        items: Vec<Expr>,
        span: Span,
    },
    Return {
        span: Span,
    },
}
