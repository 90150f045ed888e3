use log::trace;

use crate::ast::*;
use crate::errors::{CompileError, CompileErrorKind, Span};
use crate::lexer::{Token, TokenKind};

type PResult<T> = Result<T, CompileError>;

fn human_token(tok: &TokenKind) -> String {
    if let Some(keyword) = tok.keyword_text() {
        return format!("keyword {}", keyword);
    }
    match tok {
        TokenKind::Newline => "end of statement".into(),
        TokenKind::Ident(s) => format!("identifier {}", s),
        TokenKind::Str(s) => format!("string literal {:?}", s),
        TokenKind::Boz(s) => format!("BOZ literal {}", s),
        TokenKind::Float(x) => format!("real literal {}", x),
        TokenKind::Integer(i) => format!("integer literal {}", i),
        TokenKind::True => ".true.".into(),
        TokenKind::False => ".false.".into(),
        TokenKind::DefinedOp(op) => format!("operator .{}.", op),
        TokenKind::Comma => "','".into(),
        TokenKind::Star => "'*'".into(),
        TokenKind::LParen => "'('".into(),
        TokenKind::RParen => "')'".into(),
        TokenKind::LBracket => "'['".into(),
        TokenKind::RBracket => "']'".into(),
        TokenKind::DColon => "'::'".into(),
        TokenKind::Colon => "':'".into(),
        TokenKind::DotDot => "'..'".into(),
        TokenKind::Arrow => "'=>'".into(),
        TokenKind::Percent => "'%'".into(),
        TokenKind::Eq => "'='".into(),
        TokenKind::Plus => "'+'".into(),
        TokenKind::Minus => "'-'".into(),
        TokenKind::Slash => "'/'".into(),
        TokenKind::Pow => "'**'".into(),
        TokenKind::Concat => "'//'".into(),
        TokenKind::EqEq => "'=='".into(),
        TokenKind::Ne => "'/='".into(),
        TokenKind::Le => "'<='".into(),
        TokenKind::Ge => "'>='".into(),
        TokenKind::Lt => "'<'".into(),
        TokenKind::Gt => "'>'".into(),
        TokenKind::And => "'.and.'".into(),
        TokenKind::Or => "'.or.'".into(),
        TokenKind::Not => "'.not.'".into(),
        TokenKind::Eqv => "'.eqv.'".into(),
        TokenKind::Neqv => "'.neqv.'".into(),
        TokenKind::_WS => "whitespace".into(),
        TokenKind::_COMMENT => "comment".into(),
        TokenKind::_CONTINUATION => "continuation".into(),
        TokenKind::Error(e) => format!("error: {}", e),
        _ => format!("{:?}", tok),
    }
}

fn is_type_keyword(tok: &TokenKind) -> bool {
    matches!(
        tok,
        TokenKind::KwInteger
            | TokenKind::KwReal
            | TokenKind::KwDouble
            | TokenKind::KwComplex
            | TokenKind::KwCharacter
            | TokenKind::KwLogical
    )
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    src_len: usize,
    errors: Vec<CompileError>,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token], src_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            src_len,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, n: usize) -> Option<&'t TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn at_eol(&self) -> bool {
        matches!(self.peek(), None | Some(TokenKind::Newline))
    }

    fn span_here(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(t) => t.span.clone(),
            None => self.src_len..self.src_len,
        }
    }

    fn start(&self) -> usize {
        self.span_here().start
    }

    fn prev_end(&self) -> usize {
        match self.pos.checked_sub(1).and_then(|p| self.tokens.get(p)) {
            Some(t) => t.span.end,
            None => 0,
        }
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let msg = match self.peek() {
            Some(tok) => format!("unexpected {}: expected {}", human_token(tok), expected),
            None => format!("unexpected end of input, expected {}", expected),
        };
        CompileError::new(CompileErrorKind::Parse, msg, self.span_here())
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> PResult<Span> {
        if self.at(kind) {
            let span = self.span_here();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_eol(&mut self) -> PResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(TokenKind::Newline) => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(self.unexpected("end of statement")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    /// Error recovery: drop the rest of the current statement.
    fn skip_line(&mut self) {
        while let Some(tok) = self.peek() {
            self.pos += 1;
            if *tok == TokenKind::Newline {
                break;
            }
        }
    }

    fn recover(&mut self, err: CompileError) {
        trace!("parse error: {}", err.message);
        self.errors.push(err);
        self.skip_line();
    }

    fn name_at(&self, n: usize) -> Option<String> {
        match self.peek_at(n)? {
            TokenKind::Ident(s) => Some(s.clone()),
            other => other.keyword_text().map(str::to_string),
        }
    }

    fn name(&mut self) -> PResult<(String, Span)> {
        match self.name_at(0) {
            Some(name) => {
                let span = self.span_here();
                self.pos += 1;
                Ok((name, span))
            }
            None => Err(self.unexpected("a name")),
        }
    }

    fn at_word(&self, word: &str) -> bool {
        self.name_at(0).as_deref() == Some(word)
    }

    /// `end`, `end <what>` or `end<what>` at the start of a statement: the
    /// word after `end`, or an empty string.
    fn end_keyword(&self) -> Option<String> {
        match self.peek()? {
            TokenKind::KwEnd => match self.peek_at(1) {
                None | Some(TokenKind::Newline) => Some(String::new()),
                Some(_) => Some(self.name_at(1).unwrap_or_default()),
            },
            TokenKind::Ident(word) => {
                const FUSED: &[&str] = &[
                    "subroutine",
                    "function",
                    "module",
                    "program",
                    "interface",
                    "type",
                    "do",
                    "if",
                    "associate",
                ];
                let rest = word.strip_prefix("end")?;
                FUSED.contains(&rest).then(|| rest.to_string())
            }
            _ => None,
        }
    }

    /// Consumes `end [what [name]]`.
    fn consume_end(&mut self, what: &[&str]) -> PResult<()> {
        match self.end_keyword() {
            Some(word) if word.is_empty() => {
                self.pos += 1;
            }
            Some(word) if what.contains(&word.as_str()) => {
                if self.at(&TokenKind::KwEnd) {
                    self.pos += 2;
                } else {
                    self.pos += 1;
                }
                // optional construct name, or the generic spec of an
                // interface block
                while !self.at_eol() {
                    self.pos += 1;
                }
            }
            _ => return Err(self.unexpected(&format!("end {}", what[0]))),
        }
        self.expect_eol()
    }

    // ---- program units ----

    fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                break;
            }
            match self.parse_unit() {
                Ok(unit) => program.units.push(unit),
                Err(err) => self.recover(err),
            }
        }
        program
    }

    fn parse_unit(&mut self) -> PResult<ProgramUnit> {
        if self.at_subprogram_start() {
            return Ok(ProgramUnit::Subprogram(self.parse_subprogram()?));
        }
        match self.peek() {
            Some(TokenKind::KwModule) => self.parse_module().map(ProgramUnit::Module),
            _ => self.parse_main().map(ProgramUnit::Main),
        }
    }

    fn parse_main(&mut self) -> PResult<MainProgram> {
        let start = self.start();
        let mut name = None;
        if self.eat(&TokenKind::KwProgram) {
            name = Some(self.name()?.0);
            self.expect_eol()?;
        }
        let spec = self.parse_spec_part();
        let body = self.parse_exec_part();
        let contains = self.parse_contains()?;
        self.consume_end(&["program"])?;
        Ok(MainProgram {
            name,
            spec,
            body,
            contains,
            span: start..self.prev_end(),
        })
    }

    fn parse_module(&mut self) -> PResult<Module> {
        let start = self.start();
        self.expect(&TokenKind::KwModule, "keyword module")?;
        let (name, _) = self.name()?;
        self.expect_eol()?;
        let spec = self.parse_spec_part();
        let contains = self.parse_contains()?;
        self.consume_end(&["module"])?;
        Ok(Module {
            name,
            spec,
            contains,
            span: start..self.prev_end(),
        })
    }

    fn parse_contains(&mut self) -> PResult<Vec<Subprogram>> {
        let mut subprograms = Vec::new();
        self.skip_newlines();
        if !self.eat(&TokenKind::KwContains) {
            return Ok(subprograms);
        }
        self.expect_eol()?;
        loop {
            self.skip_newlines();
            if self.peek().is_none() || self.end_keyword().is_some() {
                break;
            }
            if self.at_subprogram_start() {
                match self.parse_subprogram() {
                    Ok(subprogram) => subprograms.push(subprogram),
                    Err(err) => self.recover(err),
                }
            } else {
                let err = self.unexpected("a subroutine or function");
                self.recover(err);
            }
        }
        Ok(subprograms)
    }

    fn at_subprogram_start(&self) -> bool {
        let mut i = 0;
        loop {
            match self.peek_at(i) {
                Some(TokenKind::KwPure | TokenKind::KwImpure | TokenKind::KwElemental | TokenKind::KwRecursive) => {
                    i += 1
                }
                Some(TokenKind::KwModule) => match self.peek_at(i + 1) {
                    Some(TokenKind::KwSubroutine | TokenKind::KwFunction) => i += 1,
                    Some(tok) if is_type_keyword(tok) => i += 1,
                    Some(TokenKind::KwPure | TokenKind::KwImpure | TokenKind::KwElemental | TokenKind::KwRecursive) => {
                        i += 1
                    }
                    _ => return false,
                },
                Some(tok)
                    if is_type_keyword(tok)
                        || (matches!(tok, TokenKind::KwType | TokenKind::KwClass)
                            && self.peek_at(i + 1) == Some(&TokenKind::LParen)) =>
                {
                    i += 1;
                    if self.peek_at(i) == Some(&TokenKind::KwPrecision) {
                        i += 1;
                    }
                    if self.peek_at(i) == Some(&TokenKind::Star) {
                        i += 2;
                    }
                    if self.peek_at(i) == Some(&TokenKind::LParen) {
                        let mut depth = 0usize;
                        loop {
                            match self.peek_at(i) {
                                Some(TokenKind::LParen) => depth += 1,
                                Some(TokenKind::RParen) => {
                                    depth -= 1;
                                    if depth == 0 {
                                        i += 1;
                                        break;
                                    }
                                }
                                None | Some(TokenKind::Newline) => return false,
                                _ => {}
                            }
                            i += 1;
                        }
                    }
                }
                Some(TokenKind::KwSubroutine | TokenKind::KwFunction) => {
                    return self.name_at(i + 1).is_some();
                }
                _ => return false,
            }
        }
    }

    fn parse_subprogram(&mut self) -> PResult<Subprogram> {
        let start = self.start();
        let mut prefixes = Vec::new();
        let mut type_spec = None;
        let is_function = loop {
            match self.peek() {
                Some(TokenKind::KwPure) => prefixes.push(Prefix::Pure),
                Some(TokenKind::KwImpure) => prefixes.push(Prefix::Impure),
                Some(TokenKind::KwElemental) => prefixes.push(Prefix::Elemental),
                Some(TokenKind::KwRecursive) => prefixes.push(Prefix::Recursive),
                Some(TokenKind::KwModule) => prefixes.push(Prefix::Module),
                Some(TokenKind::KwSubroutine) => {
                    self.pos += 1;
                    break false;
                }
                Some(TokenKind::KwFunction) => {
                    self.pos += 1;
                    break true;
                }
                _ => {
                    type_spec = Some(self.parse_type_spec()?);
                    continue;
                }
            }
            self.pos += 1;
        };
        let (name, _) = self.name()?;
        let mut dummies = Vec::new();
        if self.eat(&TokenKind::LParen) {
            if !self.eat(&TokenKind::RParen) {
                loop {
                    if self.at(&TokenKind::Star) {
                        dummies.push(DummyName::Star(self.span_here()));
                        self.pos += 1;
                    } else {
                        let (dummy, span) = self.name()?;
                        dummies.push(DummyName::Name(dummy, span));
                    }
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
            }
        }
        let mut result = None;
        let mut bind_c = false;
        loop {
            if is_function && self.eat(&TokenKind::KwResult) {
                self.expect(&TokenKind::LParen, "'('")?;
                result = Some(self.name()?.0);
                self.expect(&TokenKind::RParen, "')'")?;
            } else if self.at(&TokenKind::KwBind) {
                self.parse_bind_c()?;
                bind_c = true;
            } else {
                break;
            }
        }
        self.expect_eol()?;
        let spec = self.parse_spec_part();
        let body = self.parse_exec_part();
        let contains = self.parse_contains()?;
        self.consume_end(&["subroutine", "function", "procedure"])?;
        let kind = if is_function {
            SubprogramKind::Function { result, type_spec }
        } else {
            SubprogramKind::Subroutine
        };
        Ok(Subprogram {
            kind,
            name,
            prefixes,
            dummies,
            bind_c,
            spec,
            body,
            contains,
            span: start..self.prev_end(),
        })
    }

    fn parse_bind_c(&mut self) -> PResult<()> {
        self.expect(&TokenKind::KwBind, "keyword bind")?;
        self.expect(&TokenKind::LParen, "'('")?;
        if !self.at_word("c") {
            return Err(self.unexpected("C"));
        }
        let mut depth = 1usize;
        while depth > 0 && !self.at_eol() {
            match self.peek() {
                Some(TokenKind::LParen) => depth += 1,
                Some(TokenKind::RParen) => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        Ok(())
    }

    // ---- specification part ----

    fn parse_spec_part(&mut self) -> Vec<Decl> {
        let mut decls = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none() || self.end_keyword().is_some() || self.is_assignment() {
                break;
            }
            if self.at_subprogram_start() {
                break;
            }
            let result = match self.peek() {
                Some(TokenKind::KwUse) => self.parse_use(),
                Some(TokenKind::KwImplicit) => self.parse_implicit(),
                Some(tok) if is_type_keyword(tok) => self.parse_type_decl(),
                Some(TokenKind::KwType) if self.peek_at(1) == Some(&TokenKind::LParen) => {
                    self.parse_type_decl()
                }
                Some(TokenKind::KwClass) => self.parse_type_decl(),
                Some(TokenKind::KwType) => self.parse_derived_type().map(Decl::DerivedType),
                Some(TokenKind::KwProcedure) => self.parse_procedure_decl(),
                Some(TokenKind::KwInterface) => self.parse_interface(false).map(Decl::Interface),
                Some(TokenKind::KwAbstract) if self.peek_at(1) == Some(&TokenKind::KwInterface) => {
                    self.pos += 1;
                    self.parse_interface(true).map(Decl::Interface)
                }
                Some(
                    TokenKind::KwOptional
                    | TokenKind::KwExternal
                    | TokenKind::KwIntrinsic
                    | TokenKind::KwIntent
                    | TokenKind::KwPointer
                    | TokenKind::KwTarget
                    | TokenKind::KwAllocatable
                    | TokenKind::KwValue
                    | TokenKind::KwVolatile
                    | TokenKind::KwAsynchronous
                    | TokenKind::KwContiguous
                    | TokenKind::KwSave
                    | TokenKind::KwProtected
                    | TokenKind::KwPrivate
                    | TokenKind::KwPublic,
                ) => self.parse_attr_stmt(),
                _ => break,
            };
            match result {
                Ok(decl) => decls.push(decl),
                Err(err) => self.recover(err),
            }
        }
        decls
    }

    fn parse_use(&mut self) -> PResult<Decl> {
        let start = self.start();
        self.expect(&TokenKind::KwUse, "keyword use")?;
        if self.eat(&TokenKind::Comma) {
            // module nature: intrinsic or non_intrinsic
            self.name()?;
            self.expect(&TokenKind::DColon, "'::'")?;
        } else {
            self.eat(&TokenKind::DColon);
        }
        let (module, _) = self.name()?;
        let span = start..self.prev_end();
        // rename and ONLY lists are not modelled
        self.skip_line();
        Ok(Decl::Use { module, span })
    }

    fn parse_implicit(&mut self) -> PResult<Decl> {
        let start = self.start();
        self.expect(&TokenKind::KwImplicit, "keyword implicit")?;
        if self.eat(&TokenKind::KwNone) {
            let span = start..self.prev_end();
            self.expect_eol()?;
            return Ok(Decl::ImplicitNone { span });
        }
        let mut rules = Vec::new();
        loop {
            let type_spec = self.parse_type_spec()?;
            self.expect(&TokenKind::LParen, "'('")?;
            let mut letter_ranges = Vec::new();
            loop {
                let (first, _) = self.name()?;
                let start = first.chars().next().unwrap_or('a');
                let end = if self.eat(&TokenKind::Minus) {
                    self.name()?.0.chars().next()
                } else {
                    None
                };
                letter_ranges.push(LetterRange { start, end });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "')'")?;
            rules.push(Implicit {
                type_spec,
                letter_ranges,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Decl::Implicit { rules, span })
    }

    fn parse_kind_selector(&mut self) -> PResult<Option<Expr>> {
        if !self.eat(&TokenKind::LParen) {
            return Ok(None);
        }
        if self.at(&TokenKind::KwKind) && self.peek_at(1) == Some(&TokenKind::Eq) {
            self.pos += 2;
        }
        let kind = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Some(kind))
    }

    fn parse_len_param(&mut self) -> PResult<LenParam> {
        if self.eat(&TokenKind::Star) {
            Ok(LenParam::Star)
        } else if self.eat(&TokenKind::Colon) {
            Ok(LenParam::Colon)
        } else {
            Ok(LenParam::Expr(self.parse_expr()?))
        }
    }

    fn parse_type_spec(&mut self) -> PResult<TypeSpec> {
        let tok = self.peek().cloned();
        match tok {
            Some(TokenKind::KwInteger) => {
                self.pos += 1;
                Ok(TypeSpec::Integer(self.parse_kind_selector()?))
            }
            Some(TokenKind::KwReal) => {
                self.pos += 1;
                Ok(TypeSpec::Real(self.parse_kind_selector()?))
            }
            Some(TokenKind::KwDouble) => {
                self.pos += 1;
                self.expect(&TokenKind::KwPrecision, "keyword precision")?;
                Ok(TypeSpec::DoublePrecision)
            }
            Some(TokenKind::KwComplex) => {
                self.pos += 1;
                Ok(TypeSpec::Complex(self.parse_kind_selector()?))
            }
            Some(TokenKind::KwLogical) => {
                self.pos += 1;
                Ok(TypeSpec::Logical(self.parse_kind_selector()?))
            }
            Some(TokenKind::KwCharacter) => {
                self.pos += 1;
                let mut len = None;
                let mut kind = None;
                if self.eat(&TokenKind::Star) {
                    if self.eat(&TokenKind::LParen) {
                        len = Some(self.parse_len_param()?);
                        self.expect(&TokenKind::RParen, "')'")?;
                    } else {
                        len = Some(LenParam::Expr(self.parse_primary()?));
                    }
                } else if self.eat(&TokenKind::LParen) {
                    loop {
                        if self.at(&TokenKind::KwLen) && self.peek_at(1) == Some(&TokenKind::Eq) {
                            self.pos += 2;
                            len = Some(self.parse_len_param()?);
                        } else if self.at(&TokenKind::KwKind) && self.peek_at(1) == Some(&TokenKind::Eq) {
                            self.pos += 2;
                            kind = Some(self.parse_expr()?);
                        } else if len.is_none() {
                            len = Some(self.parse_len_param()?);
                        } else {
                            kind = Some(self.parse_expr()?);
                        }
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                }
                Ok(TypeSpec::Character { len, kind })
            }
            Some(TokenKind::KwType | TokenKind::KwClass) => {
                let is_class = tok == Some(TokenKind::KwClass);
                self.pos += 1;
                self.expect(&TokenKind::LParen, "'('")?;
                let spec = if self.eat(&TokenKind::Star) {
                    if is_class {
                        TypeSpec::ClassStar
                    } else {
                        TypeSpec::TypeStar
                    }
                } else {
                    let (name, _) = self.name()?;
                    if is_class {
                        TypeSpec::Class(name)
                    } else {
                        TypeSpec::Type(name)
                    }
                };
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(spec)
            }
            _ => Err(self.unexpected("a type specification")),
        }
    }

    fn parse_dim_list(&mut self, close: &TokenKind) -> PResult<Vec<DimSpec>> {
        let mut dims = Vec::new();
        loop {
            let dim = if self.eat(&TokenKind::DotDot) {
                DimSpec::AssumedRank
            } else if self.eat(&TokenKind::Star) {
                DimSpec::Star { lower: None }
            } else if self.eat(&TokenKind::Colon) {
                DimSpec::Colon { lower: None }
            } else {
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::Colon) {
                    if self.eat(&TokenKind::Star) {
                        DimSpec::Star { lower: Some(first) }
                    } else if self.at(&TokenKind::Comma) || self.at(close) {
                        DimSpec::Colon { lower: Some(first) }
                    } else {
                        DimSpec::Explicit {
                            lower: Some(first),
                            upper: self.parse_expr()?,
                        }
                    }
                } else {
                    DimSpec::Explicit {
                        lower: None,
                        upper: first,
                    }
                }
            };
            dims.push(dim);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, &human_token(close))?;
        Ok(dims)
    }

    fn parse_intent(&mut self) -> PResult<IntentSpec> {
        self.expect(&TokenKind::LParen, "'('")?;
        let intent = match self.peek() {
            Some(TokenKind::KwIn) => {
                self.pos += 1;
                if self.eat(&TokenKind::KwOut) {
                    IntentSpec::InOut
                } else {
                    IntentSpec::In
                }
            }
            Some(TokenKind::KwOut) => {
                self.pos += 1;
                IntentSpec::Out
            }
            Some(TokenKind::KwInOut) => {
                self.pos += 1;
                IntentSpec::InOut
            }
            _ => return Err(self.unexpected("IN, OUT or INOUT")),
        };
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(intent)
    }

    fn parse_attr(&mut self) -> PResult<AttrSpec> {
        let tok = self.peek().cloned();
        if tok.as_ref() == Some(&TokenKind::KwBind) {
            self.parse_bind_c()?;
            return Ok(AttrSpec::BindC);
        }
        if self.at_word("codimension") {
            self.pos += 1;
            self.expect(&TokenKind::LBracket, "'['")?;
            return Ok(AttrSpec::Codimension(self.parse_dim_list(&TokenKind::RBracket)?));
        }
        self.pos += 1;
        let attr = match tok {
            Some(TokenKind::KwAllocatable) => AttrSpec::Allocatable,
            Some(TokenKind::KwAsynchronous) => AttrSpec::Asynchronous,
            Some(TokenKind::KwContiguous) => AttrSpec::Contiguous,
            Some(TokenKind::KwDimension) => {
                self.expect(&TokenKind::LParen, "'('")?;
                AttrSpec::Dimension(self.parse_dim_list(&TokenKind::RParen)?)
            }
            Some(TokenKind::KwExternal) => AttrSpec::External,
            Some(TokenKind::KwIntent) => AttrSpec::Intent(self.parse_intent()?),
            Some(TokenKind::KwIntrinsic) => AttrSpec::Intrinsic,
            Some(TokenKind::KwOptional) => AttrSpec::Optional,
            Some(TokenKind::KwParameter) => AttrSpec::Parameter,
            Some(TokenKind::KwPointer) => AttrSpec::Pointer,
            Some(TokenKind::KwPrivate) => AttrSpec::Private,
            Some(TokenKind::KwProtected) => AttrSpec::Protected,
            Some(TokenKind::KwPublic) => AttrSpec::Public,
            Some(TokenKind::KwSave) => AttrSpec::Save,
            Some(TokenKind::KwTarget) => AttrSpec::Target,
            Some(TokenKind::KwValue) => AttrSpec::Value,
            Some(TokenKind::KwVolatile) => AttrSpec::Volatile,
            Some(TokenKind::KwPass) => {
                if self.eat(&TokenKind::LParen) {
                    let (name, _) = self.name()?;
                    self.expect(&TokenKind::RParen, "')'")?;
                    AttrSpec::Pass(Some(name))
                } else {
                    AttrSpec::Pass(None)
                }
            }
            Some(TokenKind::KwNoPass) => AttrSpec::NoPass,
            Some(TokenKind::KwDeferred) => AttrSpec::Deferred,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("an attribute"));
            }
        };
        Ok(attr)
    }

    fn parse_attr_list(&mut self) -> PResult<Vec<AttrSpec>> {
        let mut attrs = Vec::new();
        while self.eat(&TokenKind::Comma) {
            attrs.push(self.parse_attr()?);
        }
        Ok(attrs)
    }

    fn parse_type_decl(&mut self) -> PResult<Decl> {
        let start = self.start();
        let type_spec = self.parse_type_spec()?;
        let attrs = self.parse_attr_list()?;
        self.eat(&TokenKind::DColon);
        let mut entities = Vec::new();
        loop {
            let (name, name_span) = self.name()?;
            let mut entity = EntityDecl {
                name,
                dims: None,
                codims: None,
                len: None,
                init: None,
                span: name_span,
            };
            if self.eat(&TokenKind::LParen) {
                entity.dims = Some(self.parse_dim_list(&TokenKind::RParen)?);
            }
            if self.eat(&TokenKind::LBracket) {
                entity.codims = Some(self.parse_dim_list(&TokenKind::RBracket)?);
            }
            if self.eat(&TokenKind::Star) {
                if self.eat(&TokenKind::LParen) {
                    entity.len = Some(self.parse_len_param()?);
                    self.expect(&TokenKind::RParen, "')'")?;
                } else {
                    entity.len = Some(LenParam::Expr(self.parse_primary()?));
                }
            }
            if self.eat(&TokenKind::Eq) || self.eat(&TokenKind::Arrow) {
                entity.init = Some(self.parse_expr()?);
            }
            entities.push(entity);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Decl::TypeDecl {
            type_spec,
            attrs,
            entities,
            span,
        })
    }

    fn parse_name_list(&mut self) -> PResult<Vec<(String, Span)>> {
        let mut names = Vec::new();
        if self.at_eol() {
            return Ok(names);
        }
        loop {
            names.push(self.name()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(names)
    }

    fn parse_attr_stmt(&mut self) -> PResult<Decl> {
        let start = self.start();
        let attr = self.parse_attr()?;
        self.eat(&TokenKind::DColon);
        let names = self.parse_name_list()?;
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Decl::AttrStmt { attr, names, span })
    }

    fn parse_proc_interface(&mut self) -> PResult<Option<ProcInterfaceName>> {
        if !self.eat(&TokenKind::LParen) {
            return Ok(None);
        }
        if self.eat(&TokenKind::RParen) {
            return Ok(None);
        }
        let interface = match self.peek() {
            Some(tok) if is_type_keyword(tok) => ProcInterfaceName::Type(self.parse_type_spec()?),
            Some(TokenKind::KwType | TokenKind::KwClass) if self.peek_at(1) == Some(&TokenKind::LParen) => {
                ProcInterfaceName::Type(self.parse_type_spec()?)
            }
            _ => ProcInterfaceName::Name(self.name()?.0),
        };
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Some(interface))
    }

    fn parse_procedure_decl(&mut self) -> PResult<Decl> {
        let start = self.start();
        self.expect(&TokenKind::KwProcedure, "keyword procedure")?;
        let interface = self.parse_proc_interface()?;
        let attrs = self.parse_attr_list()?;
        self.eat(&TokenKind::DColon);
        let mut names = Vec::new();
        loop {
            names.push(self.name()?);
            if self.eat(&TokenKind::Arrow) {
                // initial target, `=> NULL()`
                self.parse_expr()?;
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Decl::ProcedureDecl {
            interface,
            attrs,
            names,
            span,
        })
    }

    fn parse_generic_spec(&mut self) -> PResult<GenericSpec> {
        if self.at(&TokenKind::KwOperator) && self.peek_at(1) == Some(&TokenKind::LParen) {
            self.pos += 2;
            let op = match self.bump().map(|t| &t.kind) {
                Some(TokenKind::DefinedOp(op)) => format!(".{}.", op),
                Some(TokenKind::Plus) => "+".into(),
                Some(TokenKind::Minus) => "-".into(),
                Some(TokenKind::Star) => "*".into(),
                Some(TokenKind::Slash) => "/".into(),
                Some(TokenKind::Pow) => "**".into(),
                Some(TokenKind::Concat) => "//".into(),
                Some(TokenKind::EqEq) => "==".into(),
                Some(TokenKind::Ne) => "/=".into(),
                Some(TokenKind::Lt) => "<".into(),
                Some(TokenKind::Le) => "<=".into(),
                Some(TokenKind::Gt) => ">".into(),
                Some(TokenKind::Ge) => ">=".into(),
                Some(TokenKind::And) => ".and.".into(),
                Some(TokenKind::Or) => ".or.".into(),
                Some(TokenKind::Not) => ".not.".into(),
                Some(TokenKind::Eqv) => ".eqv.".into(),
                Some(TokenKind::Neqv) => ".neqv.".into(),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("an operator"));
                }
            };
            self.expect(&TokenKind::RParen, "')'")?;
            Ok(GenericSpec::Operator(op))
        } else if self.at(&TokenKind::KwAssignment) && self.peek_at(1) == Some(&TokenKind::LParen) {
            self.pos += 2;
            self.expect(&TokenKind::Eq, "'='")?;
            self.expect(&TokenKind::RParen, "')'")?;
            Ok(GenericSpec::Assignment)
        } else {
            Ok(GenericSpec::Name(self.name()?.0))
        }
    }

    fn parse_interface(&mut self, is_abstract: bool) -> PResult<InterfaceBlock> {
        let start = self.start();
        self.expect(&TokenKind::KwInterface, "keyword interface")?;
        let kind = if is_abstract {
            InterfaceKind::Abstract
        } else if self.at_eol() {
            InterfaceKind::Unnamed
        } else {
            InterfaceKind::Generic(self.parse_generic_spec()?)
        };
        self.expect_eol()?;
        let mut block = InterfaceBlock {
            kind,
            bodies: Vec::new(),
            module_procedures: Vec::new(),
            span: start..start,
        };
        loop {
            self.skip_newlines();
            if self.peek().is_none() || self.end_keyword().is_some() {
                break;
            }
            if self.at_subprogram_start() {
                match self.parse_subprogram() {
                    Ok(body) => block.bodies.push(body),
                    Err(err) => self.recover(err),
                }
                continue;
            }
            let is_module_procedure = self.at(&TokenKind::KwModule)
                && self.peek_at(1) == Some(&TokenKind::KwProcedure);
            if is_module_procedure || self.at(&TokenKind::KwProcedure) {
                self.pos += if is_module_procedure { 2 } else { 1 };
                self.eat(&TokenKind::DColon);
                match self.parse_name_list().and_then(|names| {
                    self.expect_eol()?;
                    Ok(names)
                }) {
                    Ok(names) => block.module_procedures.extend(names),
                    Err(err) => self.recover(err),
                }
                continue;
            }
            let err = self.unexpected("an interface body or procedure statement");
            self.recover(err);
        }
        self.consume_end(&["interface"])?;
        block.span = start..self.prev_end();
        Ok(block)
    }

    fn parse_derived_type(&mut self) -> PResult<DerivedTypeDef> {
        let start = self.start();
        self.expect(&TokenKind::KwType, "keyword type")?;
        let mut extends = None;
        let mut is_abstract = false;
        while self.eat(&TokenKind::Comma) {
            match self.peek() {
                Some(TokenKind::KwExtends) => {
                    self.pos += 1;
                    self.expect(&TokenKind::LParen, "'('")?;
                    extends = Some(self.name()?.0);
                    self.expect(&TokenKind::RParen, "')'")?;
                }
                Some(TokenKind::KwAbstract) => {
                    self.pos += 1;
                    is_abstract = true;
                }
                Some(TokenKind::KwBind) => self.parse_bind_c()?,
                Some(TokenKind::KwPublic | TokenKind::KwPrivate) => self.pos += 1,
                _ => return Err(self.unexpected("a type attribute")),
            }
        }
        self.eat(&TokenKind::DColon);
        let (name, _) = self.name()?;
        self.expect_eol()?;
        let mut def = DerivedTypeDef {
            name,
            extends,
            is_abstract,
            components: Vec::new(),
            bindings: Vec::new(),
            span: start..start,
        };
        loop {
            self.skip_newlines();
            if self.peek().is_none() || self.end_keyword().is_some() || self.at(&TokenKind::KwContains) {
                break;
            }
            let result = match self.peek() {
                Some(TokenKind::KwProcedure) => self.parse_procedure_decl().map(Some),
                Some(TokenKind::KwPrivate | TokenKind::KwPublic) => {
                    self.skip_line();
                    Ok(None)
                }
                Some(_) if self.at_word("sequence") => {
                    self.skip_line();
                    Ok(None)
                }
                _ => self.parse_type_decl().map(Some),
            };
            match result {
                Ok(Some(decl)) => def.components.push(decl),
                Ok(None) => {}
                Err(err) => self.recover(err),
            }
        }
        if self.eat(&TokenKind::KwContains) {
            self.expect_eol()?;
            loop {
                self.skip_newlines();
                if self.peek().is_none() || self.end_keyword().is_some() {
                    break;
                }
                match self.parse_bindings() {
                    Ok(bindings) => def.bindings.extend(bindings),
                    Err(err) => self.recover(err),
                }
            }
        }
        self.consume_end(&["type"])?;
        def.span = start..self.prev_end();
        Ok(def)
    }

    fn parse_bindings(&mut self) -> PResult<Vec<Binding>> {
        let start = self.start();
        match self.peek() {
            Some(TokenKind::KwProcedure) => {
                self.pos += 1;
                let interface = match self.parse_proc_interface()? {
                    Some(ProcInterfaceName::Name(name)) => Some(name),
                    Some(ProcInterfaceName::Type(_)) => return Err(self.unexpected("an interface name")),
                    None => None,
                };
                let attrs = self.parse_attr_list()?;
                self.eat(&TokenKind::DColon);
                let mut bindings = Vec::new();
                loop {
                    let (name, name_span) = self.name()?;
                    let procedure = if self.eat(&TokenKind::Arrow) {
                        Some(self.name()?.0)
                    } else {
                        None
                    };
                    bindings.push(Binding::Specific {
                        name,
                        procedure,
                        interface: interface.clone(),
                        attrs: attrs.clone(),
                        span: name_span.start..self.prev_end(),
                    });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_eol()?;
                Ok(bindings)
            }
            Some(TokenKind::KwGeneric) => {
                self.pos += 1;
                while self.eat(&TokenKind::Comma) {
                    self.pos += 1;
                }
                self.expect(&TokenKind::DColon, "'::'")?;
                let spec = self.parse_generic_spec()?;
                self.expect(&TokenKind::Arrow, "'=>'")?;
                let specifics = self
                    .parse_name_list()?
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect();
                let span = start..self.prev_end();
                self.expect_eol()?;
                Ok(vec![Binding::Generic {
                    spec,
                    specifics,
                    span,
                }])
            }
            _ => {
                // FINAL, PRIVATE and the like
                self.skip_line();
                Ok(Vec::new())
            }
        }
    }

    // ---- execution part ----

    /// Does the statement start with a designator followed by `=` or `=>`?
    fn is_assignment(&self) -> bool {
        if self.name_at(0).is_none() {
            return false;
        }
        let mut i = 1;
        loop {
            match self.peek_at(i) {
                Some(TokenKind::LParen | TokenKind::LBracket) => {
                    let mut depth = 0usize;
                    loop {
                        match self.peek_at(i) {
                            Some(TokenKind::LParen | TokenKind::LBracket) => depth += 1,
                            Some(TokenKind::RParen | TokenKind::RBracket) => {
                                depth = depth.saturating_sub(1);
                                if depth == 0 {
                                    break;
                                }
                            }
                            None | Some(TokenKind::Newline) => return false,
                            _ => {}
                        }
                        i += 1;
                    }
                    i += 1;
                }
                Some(TokenKind::Percent) => {
                    if self.name_at(i + 1).is_none() {
                        return false;
                    }
                    i += 2;
                }
                Some(TokenKind::Eq | TokenKind::Arrow) => return true,
                _ => return false,
            }
        }
    }

    fn parse_exec_part(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none()
                || self.at(&TokenKind::KwContains)
                || self.end_keyword().is_some()
                || self.at(&TokenKind::KwElse)
                || self.at_word("elseif")
            {
                break;
            }
            match self.parse_stmt() {
                Ok(Some(stmt)) => stmts.push(stmt),
                Ok(None) => {}
                Err(err) => self.recover(err),
            }
        }
        stmts
    }

    fn parse_stmt(&mut self) -> PResult<Option<Stmt>> {
        // statement label
        if matches!(self.peek(), Some(TokenKind::Integer(_))) {
            self.pos += 1;
        }
        if self.is_assignment() {
            return self.parse_assignment().map(Some);
        }
        let stmt = match self.peek() {
            Some(TokenKind::KwCall) => self.parse_call()?,
            Some(TokenKind::KwIf) => self.parse_if()?,
            Some(TokenKind::KwDo) => self.parse_do()?,
            Some(TokenKind::KwPrint) => self.parse_print()?,
            Some(TokenKind::KwAssociate) => self.parse_associate()?,
            Some(TokenKind::KwReturn) => {
                let span = self.span_here();
                self.pos += 1;
                self.expect_eol()?;
                Stmt::Return { span }
            }
            _ => {
                trace!("skipping statement at {:?}", self.span_here());
                self.skip_line();
                return Ok(None);
            }
        };
        Ok(Some(stmt))
    }

    fn parse_assignment(&mut self) -> PResult<Stmt> {
        let start = self.start();
        let lhs = self.parse_postfix()?;
        if !self.eat(&TokenKind::Eq) {
            self.expect(&TokenKind::Arrow, "'='")?;
        }
        let rhs = self.parse_expr()?;
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Stmt::Assign { lhs, rhs, span })
    }

    fn parse_call(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&TokenKind::KwCall, "keyword call")?;
        let (name, name_span) = self.name()?;
        let mut target = Expr::new(ExprKind::Name(name), name_span);
        while self.eat(&TokenKind::Percent) {
            let (component, span) = self.name()?;
            let span = target.span.start..span.end;
            target = Expr::new(ExprKind::Component(Box::new(target), component), span);
        }
        let args = if self.at(&TokenKind::LParen) {
            self.parse_args()?
        } else {
            Vec::new()
        };
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Stmt::Call { target, args, span })
    }

    fn parse_args(&mut self) -> PResult<Vec<Arg>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            let start = self.start();
            let mut keyword = None;
            if self.peek_at(1) == Some(&TokenKind::Eq) {
                if let Some(name) = self.name_at(0) {
                    keyword = Some(name);
                    self.pos += 2;
                }
            }
            let value = if self.at(&TokenKind::Star) {
                self.pos += 1;
                match self.bump().map(|t| &t.kind) {
                    Some(TokenKind::Integer(label)) => {
                        ArgValue::Label(label.parse().unwrap_or_default())
                    }
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("a statement label"));
                    }
                }
            } else if self.at(&TokenKind::Colon) {
                self.parse_triplet(None)?
            } else {
                let expr = self.parse_expr()?;
                if self.at(&TokenKind::Colon) {
                    self.parse_triplet(Some(expr))?
                } else {
                    ArgValue::Expr(expr)
                }
            };
            args.push(Arg {
                keyword,
                value,
                span: start..self.prev_end(),
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_triplet(&mut self, lower: Option<Expr>) -> PResult<ArgValue> {
        self.expect(&TokenKind::Colon, "':'")?;
        let at_bound_end = |p: &Self| {
            matches!(
                p.peek(),
                Some(TokenKind::Comma | TokenKind::RParen | TokenKind::Colon)
            )
        };
        let upper = if at_bound_end(self) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let stride = if self.eat(&TokenKind::Colon) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(ArgValue::Triplet {
            lower,
            upper,
            stride,
        })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&TokenKind::KwIf, "keyword if")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        if !self.eat(&TokenKind::KwThen) {
            let then_body = self.parse_stmt()?.into_iter().collect();
            return Ok(Stmt::If {
                cond,
                then_body,
                else_body: Vec::new(),
                span: start..self.prev_end(),
            });
        }
        self.expect_eol()?;
        self.parse_if_tail(start, cond)
    }

    /// The rest of an IF construct after `IF (cond) THEN`; an ELSE IF
    /// becomes a nested construct sharing the same END IF.
    fn parse_if_tail(&mut self, start: usize, cond: Expr) -> PResult<Stmt> {
        let then_body = self.parse_exec_part();
        let mut else_body = Vec::new();
        let else_if = (self.at(&TokenKind::KwElse) && self.peek_at(1) == Some(&TokenKind::KwIf))
            || self.at_word("elseif");
        if else_if {
            let nested_start = self.start();
            self.pos += if self.at(&TokenKind::KwElse) { 2 } else { 1 };
            self.expect(&TokenKind::LParen, "'('")?;
            let nested_cond = self.parse_expr()?;
            self.expect(&TokenKind::RParen, "')'")?;
            self.expect(&TokenKind::KwThen, "keyword then")?;
            self.expect_eol()?;
            else_body.push(self.parse_if_tail(nested_start, nested_cond)?);
        } else {
            if self.eat(&TokenKind::KwElse) {
                self.expect_eol()?;
                else_body = self.parse_exec_part();
            }
            self.consume_end(&["if"])?;
        }
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
            span: start..self.prev_end(),
        })
    }

    fn parse_do(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&TokenKind::KwDo, "keyword do")?;
        let mut control = None;
        if self.at_word("while") {
            self.pos += 1;
            self.expect(&TokenKind::LParen, "'('")?;
            self.parse_expr()?;
            self.expect(&TokenKind::RParen, "')'")?;
        } else if !self.at_eol() {
            let (var, _) = self.name()?;
            self.expect(&TokenKind::Eq, "'='")?;
            let from = self.parse_expr()?;
            self.expect(&TokenKind::Comma, "','")?;
            let to = self.parse_expr()?;
            let step = if self.eat(&TokenKind::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            control = Some(DoControl {
                var,
                start: from,
                end: to,
                step,
            });
        }
        self.expect_eol()?;
        let body = self.parse_exec_part();
        self.consume_end(&["do"])?;
        Ok(Stmt::Do {
            control,
            body,
            span: start..self.prev_end(),
        })
    }

    fn parse_print(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&TokenKind::KwPrint, "keyword print")?;
        if !self.eat(&TokenKind::Star) {
            self.parse_expr()?;
        }
        let mut items = Vec::new();
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_expr()?);
        }
        let span = start..self.prev_end();
        self.expect_eol()?;
        Ok(Stmt::Print { items, span })
    }

    fn parse_associate(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect(&TokenKind::KwAssociate, "keyword associate")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut names = Vec::new();
        loop {
            let (name, _) = self.name()?;
            self.expect(&TokenKind::Arrow, "'=>'")?;
            names.push((name, self.parse_expr()?));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect_eol()?;
        let body = self.parse_exec_part();
        self.consume_end(&["associate"])?;
        Ok(Stmt::Associate {
            names,
            body,
            span: start..self.prev_end(),
        })
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equiv()?;
        while let Some(TokenKind::DefinedOp(op)) = self.peek() {
            self.pos += 1;
            let rhs = self.parse_equiv()?;
            let span = lhs.span.start..rhs.span.end;
            lhs = Expr::new(ExprKind::DefinedBin(op.clone(), Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_equiv(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_or()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Eqv) => BinOp::Eqv,
                Some(TokenKind::Neqv) => BinOp::Neqv,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::bin(op, lhs, self.parse_or()?);
        }
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            lhs = Expr::bin(BinOp::Or, lhs, self.parse_and()?);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            lhs = Expr::bin(BinOp::And, lhs, self.parse_not()?);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        let start = self.start();
        if self.eat(&TokenKind::Not) {
            let operand = self.parse_not()?;
            let span = start..operand.span.end;
            return Ok(Expr::new(ExprKind::Un(UnOp::Not, Box::new(operand)), span));
        }
        self.parse_rel()
    }

    fn parse_rel(&mut self) -> PResult<Expr> {
        let lhs = self.parse_concat()?;
        let op = match self.peek() {
            Some(TokenKind::EqEq) => BinOp::Eq,
            Some(TokenKind::Ne) => BinOp::Ne,
            Some(TokenKind::Lt) => BinOp::Lt,
            Some(TokenKind::Le) => BinOp::Le,
            Some(TokenKind::Gt) => BinOp::Gt,
            Some(TokenKind::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        Ok(Expr::bin(op, lhs, self.parse_concat()?))
    }

    fn parse_concat(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_add()?;
        while self.eat(&TokenKind::Concat) {
            lhs = Expr::bin(BinOp::Concat, lhs, self.parse_add()?);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> PResult<Expr> {
        let start = self.start();
        let sign = match self.peek() {
            Some(TokenKind::Minus) => Some(UnOp::Neg),
            Some(TokenKind::Plus) => Some(UnOp::Plus),
            _ => None,
        };
        if sign.is_some() {
            self.pos += 1;
        }
        let mut lhs = self.parse_mul()?;
        if let Some(sign) = sign {
            let span = start..lhs.span.end;
            lhs = Expr::new(ExprKind::Un(sign, Box::new(lhs)), span);
        }
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::bin(op, lhs, self.parse_mul()?);
        }
    }

    fn parse_mul(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::bin(op, lhs, self.parse_pow()?);
        }
    }

    fn parse_pow(&mut self) -> PResult<Expr> {
        let base = self.parse_defined_unary()?;
        if self.eat(&TokenKind::Pow) {
            let exponent = if matches!(self.peek(), Some(TokenKind::Minus | TokenKind::Plus)) {
                self.parse_add()?
            } else {
                self.parse_pow()?
            };
            return Ok(Expr::bin(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_defined_unary(&mut self) -> PResult<Expr> {
        let start = self.start();
        if let Some(TokenKind::DefinedOp(op)) = self.peek() {
            self.pos += 1;
            let operand = self.parse_defined_unary()?;
            let span = start..operand.span.end;
            return Ok(Expr::new(ExprKind::DefinedUn(op.clone(), Box::new(operand)), span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(TokenKind::LParen)
                    if matches!(expr.kind, ExprKind::Name(_) | ExprKind::Component(..)) =>
                {
                    let args = self.parse_args()?;
                    let span = expr.span.start..self.prev_end();
                    expr = Expr::new(ExprKind::Call(Box::new(expr), args), span);
                }
                Some(TokenKind::Percent) => {
                    self.pos += 1;
                    let (component, _) = self.name()?;
                    let span = expr.span.start..self.prev_end();
                    expr = Expr::new(ExprKind::Component(Box::new(expr), component), span);
                }
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    while !self.eat(&TokenKind::RBracket) {
                        if self.at_eol() {
                            return Err(self.unexpected("']'"));
                        }
                        self.pos += 1;
                    }
                    let span = expr.span.start..self.prev_end();
                    expr = Expr::new(ExprKind::Coindexed(Box::new(expr)), span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.span_here();
        let tok = match self.peek() {
            Some(tok) => tok.clone(),
            None => return Err(self.unexpected("an expression")),
        };
        let kind = match tok {
            TokenKind::Integer(text) => {
                self.pos += 1;
                let (digits, kind) = split_kind(&text);
                ExprKind::Int { digits, kind }
            }
            TokenKind::Float(text) => {
                self.pos += 1;
                let (text, kind) = split_kind(&text);
                ExprKind::Real { text, kind }
            }
            TokenKind::Str(s) => {
                self.pos += 1;
                ExprKind::Str(s)
            }
            TokenKind::True => {
                self.pos += 1;
                ExprKind::Logical(true)
            }
            TokenKind::False => {
                self.pos += 1;
                ExprKind::Logical(false)
            }
            TokenKind::Boz(text) => {
                self.pos += 1;
                ExprKind::Boz(text)
            }
            TokenKind::LParen => {
                self.pos += 1;
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::Comma) {
                    let second = self.parse_expr()?;
                    self.expect(&TokenKind::RParen, "')'")?;
                    ExprKind::Complex(Box::new(first), Box::new(second))
                } else {
                    self.expect(&TokenKind::RParen, "')'")?;
                    ExprKind::Paren(Box::new(first))
                }
            }
            TokenKind::LBracket => {
                self.pos += 1;
                let mut values = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        values.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                ExprKind::ArrayCtor(values)
            }
            _ => match self.name_at(0) {
                Some(name) => {
                    self.pos += 1;
                    ExprKind::Name(name)
                }
                None => return Err(self.unexpected("an expression")),
            },
        };
        Ok(Expr::new(kind, span.start..self.prev_end()))
    }
}

/// Splits `12_8` or `1.0_dp` into the literal and its kind parameter.
fn split_kind(text: &str) -> (String, Option<String>) {
    match text.split_once('_') {
        Some((value, kind)) => (value.to_string(), Some(kind.to_ascii_lowercase())),
        None => (text.to_string(), None),
    }
}

pub fn parse_with_src(
    src: &str,
    tokens: &[Token],
    filename: &str,
) -> Result<Program, Vec<CompileError>> {
    use codespan_reporting::diagnostic::{Diagnostic, Label};
    use codespan_reporting::files::SimpleFile;
    use codespan_reporting::term::{
        emit,
        termcolor::{ColorChoice, StandardStream},
        Config,
    };

    let mut errs: Vec<CompileError> = Vec::new();

    let file = SimpleFile::new(filename, src);
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);

    for t in tokens {
        if let TokenKind::Error(text) = &t.kind {
            let msg = format!("unrecognized token `{}`", text);
            let span = t.span.clone();
            let diag = Diagnostic::error()
                .with_message(&msg)
                .with_labels(vec![Label::primary((), span.clone())]);
            let _ = emit(&mut stderr, &Config::default(), &file, &diag);
            errs.push(CompileError::new(CompileErrorKind::Lex, msg, span));
        }
    }
    if !errs.is_empty() {
        return Err(errs);
    }

    let mut parser = Parser::new(tokens, src.len());
    let program = parser.parse_program();
    for err in parser.errors {
        let diag = Diagnostic::error()
            .with_message(&err.message)
            .with_labels(vec![Label::primary((), err.span.clone())]);
        let _ = emit(&mut stderr, &Config::default(), &file, &diag);
        errs.push(err);
    }

    if errs.is_empty() {
        Ok(program)
    } else {
        Err(errs)
    }
}

/// Parses without rendering diagnostics.
pub fn parse(tokens: &[Token], src_len: usize) -> Result<Program, Vec<CompileError>> {
    let mut parser = Parser::new(tokens, src_len);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(parser.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_src(src: &str) -> Program {
        let tokens = lex(src);
        match parse(&tokens, src.len()) {
            Ok(program) => program,
            Err(errs) => panic!("parse failed: {:?}", errs),
        }
    }

    #[test]
    fn subroutine_with_declarations() {
        let program = parse_src(
            "subroutine s(x, n)\n  integer, intent(in) :: n\n  real :: x(n)\nend subroutine s\n",
        );
        let [ProgramUnit::Subprogram(s)] = program.units.as_slice() else {
            panic!("expected one subprogram");
        };
        assert_eq!(s.name, "s");
        assert_eq!(s.dummies.len(), 2);
        assert_eq!(s.spec.len(), 2);
    }

    #[test]
    fn generic_interface_and_call() {
        let program = parse_src(
            "module m\n  interface g\n    module procedure a, b\n  end interface\ncontains\n  subroutine a(i)\n    integer :: i\n  end subroutine\n  subroutine b(x)\n    real :: x\n  end subroutine\nend module\nprogram p\n  use m\n  call g(1)\nend program\n",
        );
        assert_eq!(program.units.len(), 2);
        let ProgramUnit::Module(m) = &program.units[0] else {
            panic!("expected a module");
        };
        assert_eq!(m.contains.len(), 2);
        let ProgramUnit::Main(main) = &program.units[1] else {
            panic!("expected a main program");
        };
        assert!(matches!(main.body.as_slice(), [Stmt::Call { .. }]));
    }

    #[test]
    fn keyword_names_and_sections() {
        let program = parse_src("program p\n  real :: value(10)\n  value(2:8:2) = 1.0\n  call s(len=3, *10)\nend\n");
        let ProgramUnit::Main(main) = &program.units[0] else {
            panic!("expected a main program");
        };
        assert_eq!(main.body.len(), 2);
        let Stmt::Call { args, .. } = &main.body[1] else {
            panic!("expected a call");
        };
        assert_eq!(args[0].keyword.as_deref(), Some("len"));
        assert!(matches!(args[1].value, ArgValue::Label(10)));
    }
}
