use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum TokenKind {
    #[regex(r"[ \t\r\f]+", logos::skip)]
    _WS,
    // `!#` directives are read from the raw source, not from tokens.
    #[regex(r"![^\n]*", logos::skip)]
    _COMMENT,
    #[regex(r"&[ \t]*(![^\n]*)?\r?\n([ \t\r\n]*&)?", logos::skip)]
    _CONTINUATION,
    #[token("\n")]
    #[token(";")]
    Newline,
    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_ascii_lowercase())]
    Ident(String),
    #[regex(r#""([^"\n]|"")*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("\"\"", "\"")
    })]
    #[regex(r"'([^'\n]|'')*'", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("''", "'")
    })]
    Str(String),
    #[regex(r"[bBoOzZ]'[0-9A-Fa-f]+'", |lex| lex.slice().to_string())]
    #[regex(r#"[bBoOzZ]"[0-9A-Fa-f]+""#, |lex| lex.slice().to_string())]
    Boz(String),
    #[regex(r"([0-9]+\.[0-9]*|\.[0-9]+)([eEdD][+-]?[0-9]+)?(_[A-Za-z0-9_]+)?", |lex| lex.slice().to_string())]
    #[regex(r"[0-9]+[eEdD][+-]?[0-9]+(_[A-Za-z0-9_]+)?", |lex| lex.slice().to_string())]
    Float(String),
    #[regex(r"[0-9]+(_[A-Za-z0-9_]+)?", |lex| lex.slice().to_string())]
    Integer(String),
    #[token(".true.", ignore(ascii_case))]
    True,
    #[token(".false.", ignore(ascii_case))]
    False,
    #[regex(r"\.[A-Za-z]+\.", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_ascii_lowercase()
    })]
    DefinedOp(String),
    #[token("program", ignore(ascii_case))]
    KwProgram,
    #[token("end", ignore(ascii_case))]
    KwEnd,
    #[token("module", ignore(ascii_case))]
    KwModule,
    #[token("contains", ignore(ascii_case))]
    KwContains,
    #[token("use", ignore(ascii_case))]
    KwUse,
    #[token("implicit", ignore(ascii_case))]
    KwImplicit,
    #[token("none", ignore(ascii_case))]
    KwNone,
    #[token("subroutine", ignore(ascii_case))]
    KwSubroutine,
    #[token("function", ignore(ascii_case))]
    KwFunction,
    #[token("result", ignore(ascii_case))]
    KwResult,
    #[token("recursive", ignore(ascii_case))]
    KwRecursive,
    #[token("pure", ignore(ascii_case))]
    KwPure,
    #[token("impure", ignore(ascii_case))]
    KwImpure,
    #[token("elemental", ignore(ascii_case))]
    KwElemental,
    #[token("interface", ignore(ascii_case))]
    KwInterface,
    #[token("abstract", ignore(ascii_case))]
    KwAbstract,
    #[token("procedure", ignore(ascii_case))]
    KwProcedure,
    #[token("operator", ignore(ascii_case))]
    KwOperator,
    #[token("assignment", ignore(ascii_case))]
    KwAssignment,
    #[token("type", ignore(ascii_case))]
    KwType,
    #[token("class", ignore(ascii_case))]
    KwClass,
    #[token("extends", ignore(ascii_case))]
    KwExtends,
    #[token("integer", ignore(ascii_case))]
    KwInteger,
    #[token("real", ignore(ascii_case))]
    KwReal,
    #[token("double", ignore(ascii_case))]
    KwDouble,
    #[token("precision", ignore(ascii_case))]
    KwPrecision,
    #[token("complex", ignore(ascii_case))]
    KwComplex,
    #[token("character", ignore(ascii_case))]
    KwCharacter,
    #[token("logical", ignore(ascii_case))]
    KwLogical,
    #[token("dimension", ignore(ascii_case))]
    KwDimension,
    #[token("intent", ignore(ascii_case))]
    KwIntent,
    #[token("in", ignore(ascii_case))]
    KwIn,
    #[token("out", ignore(ascii_case))]
    KwOut,
    #[token("inout", ignore(ascii_case))]
    KwInOut,
    #[token("optional", ignore(ascii_case))]
    KwOptional,
    #[token("pointer", ignore(ascii_case))]
    KwPointer,
    #[token("target", ignore(ascii_case))]
    KwTarget,
    #[token("allocatable", ignore(ascii_case))]
    KwAllocatable,
    #[token("value", ignore(ascii_case))]
    KwValue,
    #[token("volatile", ignore(ascii_case))]
    KwVolatile,
    #[token("asynchronous", ignore(ascii_case))]
    KwAsynchronous,
    #[token("contiguous", ignore(ascii_case))]
    KwContiguous,
    #[token("parameter", ignore(ascii_case))]
    KwParameter,
    #[token("save", ignore(ascii_case))]
    KwSave,
    #[token("external", ignore(ascii_case))]
    KwExternal,
    #[token("intrinsic", ignore(ascii_case))]
    KwIntrinsic,
    #[token("protected", ignore(ascii_case))]
    KwProtected,
    #[token("private", ignore(ascii_case))]
    KwPrivate,
    #[token("public", ignore(ascii_case))]
    KwPublic,
    #[token("bind", ignore(ascii_case))]
    KwBind,
    #[token("call", ignore(ascii_case))]
    KwCall,
    #[token("associate", ignore(ascii_case))]
    KwAssociate,
    #[token("len", ignore(ascii_case))]
    KwLen,
    #[token("kind", ignore(ascii_case))]
    KwKind,
    #[token("pass", ignore(ascii_case))]
    KwPass,
    #[token("nopass", ignore(ascii_case))]
    KwNoPass,
    #[token("deferred", ignore(ascii_case))]
    KwDeferred,
    #[token("generic", ignore(ascii_case))]
    KwGeneric,
    #[token("print", ignore(ascii_case))]
    KwPrint,
    #[token("if", ignore(ascii_case))]
    KwIf,
    #[token("then", ignore(ascii_case))]
    KwThen,
    #[token("else", ignore(ascii_case))]
    KwElse,
    #[token("do", ignore(ascii_case))]
    KwDo,
    #[token("return", ignore(ascii_case))]
    KwReturn,
    #[token("**")]
    Pow,
    #[token("//")]
    Concat,
    #[token("==")]
    #[token(".eq.", ignore(ascii_case))]
    EqEq,
    #[token("/=")]
    #[token(".ne.", ignore(ascii_case))]
    Ne,
    #[token("<=")]
    #[token(".le.", ignore(ascii_case))]
    Le,
    #[token(">=")]
    #[token(".ge.", ignore(ascii_case))]
    Ge,
    #[token("<")]
    #[token(".lt.", ignore(ascii_case))]
    Lt,
    #[token(">")]
    #[token(".gt.", ignore(ascii_case))]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("/")]
    Slash,
    #[token("*")]
    Star,
    #[token("::")]
    DColon,
    #[token(":")]
    Colon,
    #[token("..")]
    DotDot,
    #[token("=>")]
    Arrow,
    #[token("=")]
    Eq,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("%")]
    Percent,
    #[token(".and.", ignore(ascii_case))]
    And,
    #[token(".or.", ignore(ascii_case))]
    Or,
    #[token(".not.", ignore(ascii_case))]
    Not,
    #[token(".eqv.", ignore(ascii_case))]
    Eqv,
    #[token(".neqv.", ignore(ascii_case))]
    Neqv,
    Error(String),
}

impl TokenKind {
    /// Keywords are not reserved in Fortran: where a name is expected, a
    /// keyword token stands for the identifier with the same spelling.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::KwProgram => "program",
            TokenKind::KwEnd => "end",
            TokenKind::KwModule => "module",
            TokenKind::KwContains => "contains",
            TokenKind::KwUse => "use",
            TokenKind::KwImplicit => "implicit",
            TokenKind::KwNone => "none",
            TokenKind::KwSubroutine => "subroutine",
            TokenKind::KwFunction => "function",
            TokenKind::KwResult => "result",
            TokenKind::KwRecursive => "recursive",
            TokenKind::KwPure => "pure",
            TokenKind::KwImpure => "impure",
            TokenKind::KwElemental => "elemental",
            TokenKind::KwInterface => "interface",
            TokenKind::KwAbstract => "abstract",
            TokenKind::KwProcedure => "procedure",
            TokenKind::KwOperator => "operator",
            TokenKind::KwAssignment => "assignment",
            TokenKind::KwType => "type",
            TokenKind::KwClass => "class",
            TokenKind::KwExtends => "extends",
            TokenKind::KwInteger => "integer",
            TokenKind::KwReal => "real",
            TokenKind::KwDouble => "double",
            TokenKind::KwPrecision => "precision",
            TokenKind::KwComplex => "complex",
            TokenKind::KwCharacter => "character",
            TokenKind::KwLogical => "logical",
            TokenKind::KwDimension => "dimension",
            TokenKind::KwIntent => "intent",
            TokenKind::KwIn => "in",
            TokenKind::KwOut => "out",
            TokenKind::KwInOut => "inout",
            TokenKind::KwOptional => "optional",
            TokenKind::KwPointer => "pointer",
            TokenKind::KwTarget => "target",
            TokenKind::KwAllocatable => "allocatable",
            TokenKind::KwValue => "value",
            TokenKind::KwVolatile => "volatile",
            TokenKind::KwAsynchronous => "asynchronous",
            TokenKind::KwContiguous => "contiguous",
            TokenKind::KwParameter => "parameter",
            TokenKind::KwSave => "save",
            TokenKind::KwExternal => "external",
            TokenKind::KwIntrinsic => "intrinsic",
            TokenKind::KwProtected => "protected",
            TokenKind::KwPrivate => "private",
            TokenKind::KwPublic => "public",
            TokenKind::KwBind => "bind",
            TokenKind::KwCall => "call",
            TokenKind::KwAssociate => "associate",
            TokenKind::KwLen => "len",
            TokenKind::KwKind => "kind",
            TokenKind::KwPass => "pass",
            TokenKind::KwNoPass => "nopass",
            TokenKind::KwDeferred => "deferred",
            TokenKind::KwGeneric => "generic",
            TokenKind::KwPrint => "print",
            TokenKind::KwIf => "if",
            TokenKind::KwThen => "then",
            TokenKind::KwElse => "else",
            TokenKind::KwDo => "do",
            TokenKind::KwReturn => "return",
            _ => return None,
        };
        Some(text)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: std::ops::Range<usize>,
}

pub fn lex(input: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(res) = lexer.next() {
        match res {
            Ok(kind) => {
                if matches!(
                    kind,
                    TokenKind::_WS | TokenKind::_COMMENT | TokenKind::_CONTINUATION
                ) {
                    continue;
                }
                let span = lexer.span();
                tokens.push(Token { kind, span });
            }
            Err(_) => {
                let span = lexer.span();
                let text = input.get(span.clone()).unwrap_or("").to_string();
                tokens.push(Token {
                    kind: TokenKind::Error(text),
                    span,
                });
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn continuation_joins_lines() {
        let got = kinds("call s(a, &\n    & b)\n");
        assert_eq!(
            got,
            vec![
                TokenKind::KwCall,
                TokenKind::Ident("s".into()),
                TokenKind::LParen,
                TokenKind::Ident("a".into()),
                TokenKind::Comma,
                TokenKind::Ident("b".into()),
                TokenKind::RParen,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn operators_and_literals() {
        let got = kinds("x = 1.5d0 .myop. z'ff' .EQ. 2_8");
        assert_eq!(
            got,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Float("1.5d0".into()),
                TokenKind::DefinedOp("myop".into()),
                TokenKind::Boz("z'ff'".into()),
                TokenKind::EqEq,
                TokenKind::Integer("2_8".into()),
            ]
        );
    }
}
