//! Recursive-descent JavaScript parser.
//!
//! Expressions use precedence climbing; statements are straightforward
//! dispatch on the leading token. Module items are accepted at any position
//! and `return` is accepted at the top level, since obfuscation inputs are
//! frequently fragments rather than whole modules.
//!
//! Arrow functions are recognized by backtracking: on `(` the parser
//! attempts a parameter list and rewinds when no `=>` follows.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Kw, Token, TokenKind};

/// Parse failure with the offending span.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self { message: message.into(), span }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    source: &'a str,
    /// When false, `in` is not a binary operator (for-in heads).
    allow_in: bool,
    /// End offset of the previously consumed token, for node spans.
    prev_end: u32,
    ast: Ast,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            source,
            allow_in: true,
            prev_end: 0,
            ast: Ast::new(source.to_string()),
        }
    }

    /// Parse the whole source into an [`Ast`].
    pub fn parse(mut self) -> Result<Ast, ParseError> {
        let mut body = Vec::new();
        while !self.is_eof() {
            body.push(self.parse_stmt()?);
        }
        let end = self.source.len() as u32;
        let root = self.ast.alloc(NodeKind::Program { body }, Span::new(0, end));
        self.ast.root = root;
        self.ast.hashbang = self.lexer.hashbang().map(str::to_string);
        self.ast.comments = self.lexer.take_comments();
        Ok(self.ast)
    }

    // =========================================================================
    // Token handling
    // =========================================================================

    fn peek(&self) -> &TokenKind {
        &self.current.kind
    }

    fn start(&self) -> u32 {
        self.current.span.start
    }

    fn advance(&mut self) -> Token {
        self.prev_end = self.current.span.end;
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn check_kw(&self, kw: Kw) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == kw)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(s) if s == name)
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: Kw) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?}", kind, self.peek())))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current.span)
    }

    /// Automatic semicolon insertion.
    fn expect_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_eof()
            || self.current.had_newline_before
        {
            return Ok(());
        }
        Err(self.error("Expected semicolon"))
    }

    /// Peek one token past the current one.
    fn peek2(&self) -> TokenKind {
        self.lexer.clone().next_token().kind
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end)
    }

    /// Consume an identifier (or keyword-as-name, for member properties).
    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        let span = self.current.span;
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.error("Expected identifier")),
        }
    }

    fn ident_node(&mut self) -> Result<NodeId, ParseError> {
        let (name, span) = self.expect_ident()?;
        Ok(self.ast.alloc(NodeKind::Ident { name }, span))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_stmt(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        match self.peek() {
            TokenKind::Keyword(Kw::Var) => {
                self.advance();
                self.parse_var_decl(start, VarKind::Var, true)
            }
            TokenKind::Keyword(Kw::Const) => {
                self.advance();
                self.parse_var_decl(start, VarKind::Const, true)
            }
            TokenKind::Ident(name) if name == "let" && self.let_starts_decl() => {
                self.advance();
                self.parse_var_decl(start, VarKind::Let, true)
            }
            TokenKind::Keyword(Kw::Function) => {
                self.advance();
                let parts = self.parse_function_parts(true)?;
                Ok(self.ast.alloc(NodeKind::FunctionDecl(parts), self.span_from(start)))
            }
            TokenKind::Ident(name)
                if name == "async"
                    && matches!(self.peek2(), TokenKind::Keyword(Kw::Function)) =>
            {
                self.advance();
                self.advance();
                let mut parts = self.parse_function_parts(true)?;
                parts.is_async = true;
                Ok(self.ast.alloc(NodeKind::FunctionDecl(parts), self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Class) => {
                self.advance();
                let parts = self.parse_class_parts(true)?;
                Ok(self.ast.alloc(NodeKind::ClassDecl(parts), self.span_from(start)))
            }
            TokenKind::LBrace => {
                let body = self.parse_block_body()?;
                Ok(self.ast.alloc(NodeKind::Block { body }, self.span_from(start)))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Empty, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::If) => self.parse_if(start),
            TokenKind::Keyword(Kw::Switch) => self.parse_switch(start),
            TokenKind::Keyword(Kw::For) => self.parse_for(start),
            TokenKind::Keyword(Kw::While) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_stmt()?;
                Ok(self.ast.alloc(NodeKind::While { test, body }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Do) => {
                self.advance();
                let body = self.parse_stmt()?;
                if !self.eat_kw(Kw::While) {
                    return Err(self.error("Expected `while` after do body"));
                }
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                self.eat(&TokenKind::Semicolon);
                Ok(self.ast.alloc(NodeKind::DoWhile { body, test }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Break) => {
                self.advance();
                let label = self.parse_label()?;
                self.expect_semicolon()?;
                Ok(self.ast.alloc(NodeKind::Break { label }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Continue) => {
                self.advance();
                let label = self.parse_label()?;
                self.expect_semicolon()?;
                Ok(self.ast.alloc(NodeKind::Continue { label }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Return) => {
                self.advance();
                let arg = if self.check(&TokenKind::Semicolon)
                    || self.check(&TokenKind::RBrace)
                    || self.is_eof()
                    || self.current.had_newline_before
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_semicolon()?;
                Ok(self.ast.alloc(NodeKind::Return { arg }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Throw) => {
                self.advance();
                if self.current.had_newline_before {
                    return Err(self.error("Illegal newline after throw"));
                }
                let arg = self.parse_expr()?;
                self.expect_semicolon()?;
                Ok(self.ast.alloc(NodeKind::Throw { arg }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Try) => self.parse_try(start),
            TokenKind::Keyword(Kw::Debugger) => {
                self.advance();
                self.expect_semicolon()?;
                Ok(self.ast.alloc(NodeKind::Debugger, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::With) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let object = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_stmt()?;
                Ok(self.ast.alloc(NodeKind::With { object, body }, self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Import)
                if !matches!(self.peek2(), TokenKind::LParen | TokenKind::Dot) =>
            {
                self.parse_import_decl(start)
            }
            TokenKind::Keyword(Kw::Export) => self.parse_export_decl(start),
            TokenKind::Ident(_) if matches!(self.peek2(), TokenKind::Colon) => {
                let (label, _) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let body = self.parse_stmt()?;
                Ok(self.ast.alloc(NodeKind::Labeled { label, body }, self.span_from(start)))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect_semicolon()?;
                Ok(self.ast.alloc(NodeKind::ExprStmt { expr }, self.span_from(start)))
            }
        }
    }

    /// Whether `let` at the current position begins a declaration.
    fn let_starts_decl(&self) -> bool {
        matches!(
            self.peek2(),
            TokenKind::Ident(_) | TokenKind::LBracket | TokenKind::LBrace
        )
    }

    fn parse_label(&mut self) -> Result<Option<String>, ParseError> {
        if self.current.had_newline_before {
            return Ok(None);
        }
        if let TokenKind::Ident(_) = self.peek() {
            let (name, _) = self.expect_ident()?;
            Ok(Some(name))
        } else {
            Ok(None)
        }
    }

    fn parse_var_decl(
        &mut self,
        start: u32,
        kind: VarKind,
        semicolon: bool,
    ) -> Result<NodeId, ParseError> {
        let mut decls = Vec::new();
        loop {
            let decl_start = self.start();
            let id = self.parse_binding()?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_assign()?)
            } else {
                None
            };
            decls.push(
                self.ast
                    .alloc(NodeKind::VarDeclarator { id, init }, self.span_from(decl_start)),
            );
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if semicolon {
            self.expect_semicolon()?;
        }
        Ok(self.ast.alloc(NodeKind::VarDecl { kind, decls }, self.span_from(start)))
    }

    fn parse_if(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let test = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let consequent = self.parse_stmt()?;
        let alternate = if self.eat_kw(Kw::Else) {
            Some(self.parse_stmt()?)
        } else {
            None
        };
        Ok(self
            .ast
            .alloc(NodeKind::If { test, consequent, alternate }, self.span_from(start)))
    }

    fn parse_switch(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let discriminant = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            let case_start = self.start();
            let test = if self.eat_kw(Kw::Case) {
                Some(self.parse_expr()?)
            } else if self.eat_kw(Kw::Default) {
                None
            } else {
                return Err(self.error("Expected `case` or `default` in switch body"));
            };
            self.expect(&TokenKind::Colon)?;
            let mut body = Vec::new();
            while !self.check(&TokenKind::RBrace)
                && !self.check_kw(Kw::Case)
                && !self.check_kw(Kw::Default)
                && !self.is_eof()
            {
                body.push(self.parse_stmt()?);
            }
            cases.push(
                self.ast
                    .alloc(NodeKind::SwitchCase { test, body }, self.span_from(case_start)),
            );
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(self
            .ast
            .alloc(NodeKind::Switch { discriminant, cases }, self.span_from(start)))
    }

    fn parse_for(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance();
        let is_await = self.eat_kw(Kw::Await);
        self.expect(&TokenKind::LParen)?;

        // Empty init.
        if self.eat(&TokenKind::Semicolon) {
            return self.parse_for_tail(start, None);
        }

        let decl_kind = if self.eat_kw(Kw::Var) {
            Some(VarKind::Var)
        } else if self.eat_kw(Kw::Const) {
            Some(VarKind::Const)
        } else if self.is_ident("let") && self.let_starts_decl() {
            self.advance();
            Some(VarKind::Let)
        } else {
            None
        };

        if let Some(kind) = decl_kind {
            let decl_start = self.start();
            let id = self.parse_binding()?;
            // for-in / for-of with a declaration head.
            if self.check_kw(Kw::In) || self.is_ident("of") {
                let declarator = self
                    .ast
                    .alloc(NodeKind::VarDeclarator { id, init: None }, self.span_from(decl_start));
                let left = self.ast.alloc(
                    NodeKind::VarDecl { kind, decls: vec![declarator] },
                    self.span_from(decl_start),
                );
                return self.parse_for_in_of(start, left, is_await);
            }
            let init = if self.eat(&TokenKind::Eq) {
                let saved = self.allow_in;
                self.allow_in = false;
                let init = self.parse_assign()?;
                self.allow_in = saved;
                Some(init)
            } else {
                None
            };
            let mut decls = vec![self
                .ast
                .alloc(NodeKind::VarDeclarator { id, init }, self.span_from(decl_start))];
            while self.eat(&TokenKind::Comma) {
                let d_start = self.start();
                let id = self.parse_binding()?;
                let init = if self.eat(&TokenKind::Eq) {
                    Some(self.parse_assign()?)
                } else {
                    None
                };
                decls.push(
                    self.ast
                        .alloc(NodeKind::VarDeclarator { id, init }, self.span_from(d_start)),
                );
            }
            let init_decl = self
                .ast
                .alloc(NodeKind::VarDecl { kind, decls }, self.span_from(decl_start));
            self.expect(&TokenKind::Semicolon)?;
            return self.parse_for_tail(start, Some(init_decl));
        }

        // Expression head.
        let saved = self.allow_in;
        self.allow_in = false;
        let head = self.parse_expr()?;
        self.allow_in = saved;

        if self.check_kw(Kw::In) || self.is_ident("of") {
            self.to_pattern(head)?;
            return self.parse_for_in_of(start, head, is_await);
        }
        self.expect(&TokenKind::Semicolon)?;
        self.parse_for_tail(start, Some(head))
    }

    fn parse_for_in_of(
        &mut self,
        start: u32,
        left: NodeId,
        is_await: bool,
    ) -> Result<NodeId, ParseError> {
        let is_of = self.is_ident("of");
        self.advance(); // `in` or `of`
        let right = if is_of { self.parse_assign()? } else { self.parse_expr()? };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_stmt()?;
        let kind = if is_of {
            NodeKind::ForOf { left, right, body, is_await }
        } else {
            NodeKind::ForIn { left, right, body }
        };
        Ok(self.ast.alloc(kind, self.span_from(start)))
    }

    fn parse_for_tail(&mut self, start: u32, init: Option<NodeId>) -> Result<NodeId, ParseError> {
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_stmt()?;
        Ok(self
            .ast
            .alloc(NodeKind::For { init, test, update, body }, self.span_from(start)))
    }

    fn parse_try(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance();
        let block_start = self.start();
        let body = self.parse_block_body()?;
        let block = self.ast.alloc(NodeKind::Block { body }, self.span_from(block_start));
        let handler = if self.check_kw(Kw::Catch) {
            let catch_start = self.start();
            self.advance();
            let param = if self.eat(&TokenKind::LParen) {
                let p = self.parse_binding()?;
                self.expect(&TokenKind::RParen)?;
                Some(p)
            } else {
                None
            };
            let body_start = self.start();
            let body = self.parse_block_body()?;
            let body = self.ast.alloc(NodeKind::Block { body }, self.span_from(body_start));
            Some(
                self.ast
                    .alloc(NodeKind::Catch { param, body }, self.span_from(catch_start)),
            )
        } else {
            None
        };
        let finalizer = if self.eat_kw(Kw::Finally) {
            let fin_start = self.start();
            let body = self.parse_block_body()?;
            Some(self.ast.alloc(NodeKind::Block { body }, self.span_from(fin_start)))
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }
        Ok(self
            .ast
            .alloc(NodeKind::Try { block, handler, finalizer }, self.span_from(start)))
    }

    fn parse_block_body(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            body.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(body)
    }

    // =========================================================================
    // Modules
    // =========================================================================

    fn parse_string_node(&mut self) -> Result<NodeId, ParseError> {
        let span = self.current.span;
        match self.peek().clone() {
            TokenKind::Str(value) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Str(value), span))
            }
            _ => Err(self.error("Expected string literal")),
        }
    }

    fn parse_import_decl(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance(); // `import`
        let mut specifiers = Vec::new();

        if !self.check(&TokenKind::Str(String::new())) {
            if let TokenKind::Ident(_) = self.peek() {
                let spec_start = self.start();
                let local = self.ident_node()?;
                specifiers.push(
                    self.ast
                        .alloc(NodeKind::ImportDefault { local }, self.span_from(spec_start)),
                );
                self.eat(&TokenKind::Comma);
            }
            if self.check(&TokenKind::Star) {
                let spec_start = self.start();
                self.advance();
                if !self.is_ident("as") {
                    return Err(self.error("Expected `as` in namespace import"));
                }
                self.advance();
                let local = self.ident_node()?;
                specifiers.push(
                    self.ast
                        .alloc(NodeKind::ImportNamespace { local }, self.span_from(spec_start)),
                );
            } else if self.eat(&TokenKind::LBrace) {
                while !self.check(&TokenKind::RBrace) {
                    let spec_start = self.start();
                    let (imported, imported_span) = self.expect_ident()?;
                    let local = if self.is_ident("as") {
                        self.advance();
                        self.ident_node()?
                    } else {
                        self.ast
                            .alloc(NodeKind::Ident { name: imported.clone() }, imported_span)
                    };
                    specifiers.push(self.ast.alloc(
                        NodeKind::ImportNamed { imported, local },
                        self.span_from(spec_start),
                    ));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
            }
            if !self.is_ident("from") {
                return Err(self.error("Expected `from` in import declaration"));
            }
            self.advance();
        }

        let source = self.parse_string_node()?;
        self.expect_semicolon()?;
        Ok(self
            .ast
            .alloc(NodeKind::ImportDecl { specifiers, source }, self.span_from(start)))
    }

    fn parse_export_decl(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance(); // `export`

        if self.eat_kw(Kw::Default) {
            let decl = match self.peek() {
                TokenKind::Keyword(Kw::Function) => {
                    let f_start = self.start();
                    self.advance();
                    let parts = self.parse_function_parts(false)?;
                    self.ast.alloc(NodeKind::FunctionDecl(parts), self.span_from(f_start))
                }
                TokenKind::Keyword(Kw::Class) => {
                    let c_start = self.start();
                    self.advance();
                    let parts = self.parse_class_parts(false)?;
                    self.ast.alloc(NodeKind::ClassDecl(parts), self.span_from(c_start))
                }
                _ => {
                    let expr = self.parse_assign()?;
                    self.expect_semicolon()?;
                    expr
                }
            };
            return Ok(self.ast.alloc(NodeKind::ExportDefault { decl }, self.span_from(start)));
        }

        if self.check(&TokenKind::Star) {
            self.advance();
            let exported = if self.is_ident("as") {
                self.advance();
                Some(self.expect_ident()?.0)
            } else {
                None
            };
            if !self.is_ident("from") {
                return Err(self.error("Expected `from` in export declaration"));
            }
            self.advance();
            let source = self.parse_string_node()?;
            self.expect_semicolon()?;
            return Ok(self
                .ast
                .alloc(NodeKind::ExportAll { exported, source }, self.span_from(start)));
        }

        if self.eat(&TokenKind::LBrace) {
            let mut specifiers = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                let spec_start = self.start();
                let (local, _) = self.expect_ident()?;
                let exported = if self.is_ident("as") {
                    self.advance();
                    self.expect_ident()?.0
                } else {
                    local.clone()
                };
                specifiers.push(self.ast.alloc(
                    NodeKind::ExportSpecifier { local, exported },
                    self.span_from(spec_start),
                ));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBrace)?;
            let source = if self.is_ident("from") {
                self.advance();
                Some(self.parse_string_node()?)
            } else {
                None
            };
            self.expect_semicolon()?;
            return Ok(self
                .ast
                .alloc(NodeKind::ExportNamed { specifiers, source }, self.span_from(start)));
        }

        let decl = self.parse_stmt()?;
        Ok(self.ast.alloc(NodeKind::ExportDecl { decl }, self.span_from(start)))
    }

    // =========================================================================
    // Functions and classes
    // =========================================================================

    /// After `function` has been consumed.
    fn parse_function_parts(&mut self, named: bool) -> Result<FunctionParts, ParseError> {
        let is_generator = self.eat(&TokenKind::Star);
        let id = if let TokenKind::Ident(_) = self.peek() {
            Some(self.ident_node()?)
        } else if named {
            return Err(self.error("Expected function name"));
        } else {
            None
        };
        let params = self.parse_params()?;
        let body_start = self.start();
        let body = self.parse_block_body()?;
        let body = self.ast.alloc(NodeKind::Block { body }, self.span_from(body_start));
        Ok(FunctionParts { id, params, body, is_async: false, is_generator })
    }

    fn parse_params(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::DotDotDot) {
                let rest_start = self.start();
                self.advance();
                let arg = self.parse_binding()?;
                params.push(
                    self.ast
                        .alloc(NodeKind::RestElement { arg }, self.span_from(rest_start)),
                );
            } else {
                params.push(self.parse_binding_element()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    /// After `class` has been consumed.
    fn parse_class_parts(&mut self, named: bool) -> Result<ClassParts, ParseError> {
        let id = if let TokenKind::Ident(_) = self.peek() {
            Some(self.ident_node()?)
        } else if named {
            return Err(self.error("Expected class name"));
        } else {
            None
        };
        let super_class = if self.eat_kw(Kw::Extends) {
            Some(self.parse_call_member(true)?)
        } else {
            None
        };
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            body.push(self.parse_class_member()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(ClassParts { id, super_class, body })
    }

    fn parse_class_member(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let mut is_static = false;
        if self.is_ident("static")
            && !matches!(self.peek2(), TokenKind::LParen | TokenKind::Eq)
        {
            self.advance();
            is_static = true;
            if self.check(&TokenKind::LBrace) {
                let body = self.parse_block_body()?;
                return Ok(self.ast.alloc(NodeKind::StaticBlock { body }, self.span_from(start)));
            }
        }

        let mut is_async = false;
        let mut is_generator = false;
        let mut kind = MethodKind::Method;
        if self.is_ident("async") && !matches!(self.peek2(), TokenKind::LParen | TokenKind::Eq) {
            self.advance();
            is_async = true;
        }
        if self.eat(&TokenKind::Star) {
            is_generator = true;
        }
        if (self.is_ident("get") || self.is_ident("set"))
            && !matches!(self.peek2(), TokenKind::LParen | TokenKind::Eq)
        {
            kind = if self.is_ident("get") { MethodKind::Get } else { MethodKind::Set };
            self.advance();
        }

        let (key, computed) = self.parse_property_key()?;

        if self.check(&TokenKind::LParen) {
            if kind == MethodKind::Method && !computed {
                if let NodeKind::Ident { name } = self.ast.kind(key) {
                    if name == "constructor" {
                        kind = MethodKind::Constructor;
                    }
                }
            }
            let params = self.parse_params()?;
            let body_start = self.start();
            let body = self.parse_block_body()?;
            let body = self.ast.alloc(NodeKind::Block { body }, self.span_from(body_start));
            let value = self.ast.alloc(
                NodeKind::FunctionExpr(FunctionParts {
                    id: None,
                    params,
                    body,
                    is_async,
                    is_generator,
                }),
                self.span_from(start),
            );
            return Ok(self.ast.alloc(
                NodeKind::MethodDef { key, value, kind, computed, is_static },
                self.span_from(start),
            ));
        }

        let value = if self.eat(&TokenKind::Eq) {
            Some(self.parse_assign()?)
        } else {
            None
        };
        self.expect_semicolon()?;
        Ok(self.ast.alloc(
            NodeKind::PropertyDef { key, value, computed, is_static },
            self.span_from(start),
        ))
    }

    /// Property keys: identifier, keyword-as-name, string, number, computed.
    fn parse_property_key(&mut self) -> Result<(NodeId, bool), ParseError> {
        let span = self.current.span;
        match self.peek().clone() {
            TokenKind::LBracket => {
                self.advance();
                let key = self.parse_assign()?;
                self.expect(&TokenKind::RBracket)?;
                Ok((key, true))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok((self.ast.alloc(NodeKind::Str(value), span), false))
            }
            TokenKind::Num(value) => {
                self.advance();
                Ok((self.ast.alloc(NodeKind::Num(value), span), false))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok((self.ast.alloc(NodeKind::Ident { name }, span), false))
            }
            TokenKind::Keyword(kw) => {
                self.advance();
                Ok((
                    self.ast.alloc(NodeKind::Ident { name: kw.as_str().to_string() }, span),
                    false,
                ))
            }
            _ => Err(self.error("Expected property key")),
        }
    }

    // =========================================================================
    // Bindings (patterns)
    // =========================================================================

    fn parse_binding(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        match self.peek() {
            TokenKind::Ident(_) => self.ident_node(),
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    if self.eat(&TokenKind::Comma) {
                        elements.push(None);
                        continue;
                    }
                    if self.check(&TokenKind::DotDotDot) {
                        let rest_start = self.start();
                        self.advance();
                        let arg = self.parse_binding()?;
                        elements.push(Some(
                            self.ast
                                .alloc(NodeKind::RestElement { arg }, self.span_from(rest_start)),
                        ));
                    } else {
                        elements.push(Some(self.parse_binding_element()?));
                    }
                    if !self.check(&TokenKind::RBracket) {
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(self.ast.alloc(NodeKind::ArrayPattern { elements }, self.span_from(start)))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut props = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    if self.check(&TokenKind::DotDotDot) {
                        let rest_start = self.start();
                        self.advance();
                        let arg = self.parse_binding()?;
                        props.push(
                            self.ast
                                .alloc(NodeKind::RestElement { arg }, self.span_from(rest_start)),
                        );
                    } else {
                        let prop_start = self.start();
                        let (key, computed) = self.parse_property_key()?;
                        let (value, shorthand) = if self.eat(&TokenKind::Colon) {
                            (self.parse_binding_element()?, false)
                        } else {
                            // Shorthand: the key identifier is also the binding.
                            let name = match self.ast.kind(key) {
                                NodeKind::Ident { name } => name.clone(),
                                _ => return Err(self.error("Invalid shorthand pattern")),
                            };
                            let key_span = self.ast.span(key);
                            let binding =
                                self.ast.alloc(NodeKind::Ident { name }, key_span);
                            let value = if self.eat(&TokenKind::Eq) {
                                let default = self.parse_assign()?;
                                self.ast.alloc(
                                    NodeKind::AssignPattern { target: binding, default },
                                    self.span_from(prop_start),
                                )
                            } else {
                                binding
                            };
                            (value, true)
                        };
                        props.push(self.ast.alloc(
                            NodeKind::Property {
                                key,
                                value,
                                kind: PropertyKind::Init,
                                computed,
                                shorthand,
                            },
                            self.span_from(prop_start),
                        ));
                    }
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                Ok(self.ast.alloc(NodeKind::ObjectPattern { props }, self.span_from(start)))
            }
            _ => Err(self.error("Expected binding pattern")),
        }
    }

    fn parse_binding_element(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let target = self.parse_binding()?;
        if self.eat(&TokenKind::Eq) {
            let default = self.parse_assign()?;
            return Ok(self
                .ast
                .alloc(NodeKind::AssignPattern { target, default }, self.span_from(start)));
        }
        Ok(target)
    }

    /// Rewrite an expression in place into a pattern (destructuring targets).
    fn to_pattern(&mut self, id: NodeId) -> Result<(), ParseError> {
        match self.ast.kind(id).clone() {
            NodeKind::Ident { .. }
            | NodeKind::Member { .. }
            | NodeKind::ArrayPattern { .. }
            | NodeKind::ObjectPattern { .. }
            | NodeKind::RestElement { .. }
            | NodeKind::AssignPattern { .. } => Ok(()),
            NodeKind::Array { elements } => {
                for element in elements.iter().flatten() {
                    self.to_pattern(*element)?;
                }
                self.ast.set_kind(id, NodeKind::ArrayPattern { elements });
                Ok(())
            }
            NodeKind::Object { props } => {
                for prop in &props {
                    match self.ast.kind(*prop).clone() {
                        NodeKind::Property { value, .. } => self.to_pattern(value)?,
                        NodeKind::Spread { arg } => {
                            self.to_pattern(arg)?;
                            self.ast.set_kind(*prop, NodeKind::RestElement { arg });
                        }
                        _ => return Err(ParseError::new(
                            "Invalid destructuring property",
                            self.ast.span(*prop),
                        )),
                    }
                }
                self.ast.set_kind(id, NodeKind::ObjectPattern { props });
                Ok(())
            }
            NodeKind::Spread { arg } => {
                self.to_pattern(arg)?;
                self.ast.set_kind(id, NodeKind::RestElement { arg });
                Ok(())
            }
            NodeKind::Assign { op: AssignOp::Assign, target, value } => {
                self.to_pattern(target)?;
                self.ast
                    .set_kind(id, NodeKind::AssignPattern { target, default: value });
                Ok(())
            }
            _ => Err(ParseError::new("Invalid assignment target", self.ast.span(id))),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let first = self.parse_assign()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assign()?);
        }
        Ok(self.ast.alloc(NodeKind::Sequence { exprs }, self.span_from(start)))
    }

    fn parse_assign(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();

        // Arrow functions.
        if let Some(arrow) = self.try_parse_arrow(start)? {
            return Ok(arrow);
        }

        if self.check_kw(Kw::Yield) {
            self.advance();
            let delegate = self.eat(&TokenKind::Star);
            let arg = if self.current.had_newline_before
                || self.check(&TokenKind::Semicolon)
                || self.check(&TokenKind::RParen)
                || self.check(&TokenKind::RBrace)
                || self.check(&TokenKind::RBracket)
                || self.check(&TokenKind::Comma)
                || self.check(&TokenKind::Colon)
                || self.is_eof()
            {
                None
            } else {
                Some(self.parse_assign()?)
            };
            return Ok(self
                .ast
                .alloc(NodeKind::Yield { arg, delegate }, self.span_from(start)));
        }

        let left = self.parse_conditional()?;

        let op = match self.peek() {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Sub),
            TokenKind::StarEq => Some(AssignOp::Mul),
            TokenKind::StarStarEq => Some(AssignOp::Pow),
            TokenKind::SlashEq => Some(AssignOp::Div),
            TokenKind::PercentEq => Some(AssignOp::Mod),
            TokenKind::ShlEq => Some(AssignOp::Shl),
            TokenKind::ShrEq => Some(AssignOp::Shr),
            TokenKind::UShrEq => Some(AssignOp::UShr),
            TokenKind::AmpEq => Some(AssignOp::BitAnd),
            TokenKind::PipeEq => Some(AssignOp::BitOr),
            TokenKind::CaretEq => Some(AssignOp::BitXor),
            TokenKind::AmpAmpEq => Some(AssignOp::And),
            TokenKind::PipePipeEq => Some(AssignOp::Or),
            TokenKind::QuestionQuestionEq => Some(AssignOp::Nullish),
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        self.advance();
        if op == AssignOp::Assign {
            self.to_pattern(left)?;
        }
        let value = self.parse_assign()?;
        Ok(self
            .ast
            .alloc(NodeKind::Assign { op, target: left, value }, self.span_from(start)))
    }

    /// Attempt arrow-function parses, rewinding on failure.
    fn try_parse_arrow(&mut self, start: u32) -> Result<Option<NodeId>, ParseError> {
        let is_async = self.is_ident("async")
            && !self.current.had_newline_before
            && matches!(self.peek2(), TokenKind::Ident(_) | TokenKind::LParen);

        // Single-identifier arrow: `x => …` / `async x => …`.
        if !is_async {
            if let TokenKind::Ident(_) = self.peek() {
                if matches!(self.peek2(), TokenKind::Arrow) {
                    let param = self.ident_node()?;
                    self.expect(&TokenKind::Arrow)?;
                    return Ok(Some(self.parse_arrow_body(start, vec![param], false)?));
                }
            }
            if !self.check(&TokenKind::LParen) {
                return Ok(None);
            }
        }

        let snapshot = (self.lexer.clone(), self.current.clone(), self.prev_end);
        if is_async {
            self.advance(); // `async`
            if let TokenKind::Ident(_) = self.peek() {
                if matches!(self.peek2(), TokenKind::Arrow) {
                    let param = self.ident_node()?;
                    self.expect(&TokenKind::Arrow)?;
                    return Ok(Some(self.parse_arrow_body(start, vec![param], true)?));
                }
                // `async` used as a plain identifier.
                (self.lexer, self.current, self.prev_end) = snapshot;
                return Ok(None);
            }
        }

        let attempt = (|| -> Result<Vec<NodeId>, ParseError> {
            let params = self.parse_params()?;
            if !self.check(&TokenKind::Arrow) {
                return Err(self.error("not an arrow"));
            }
            Ok(params)
        })();

        match attempt {
            Ok(params) => {
                self.expect(&TokenKind::Arrow)?;
                Ok(Some(self.parse_arrow_body(start, params, is_async)?))
            }
            Err(_) => {
                (self.lexer, self.current, self.prev_end) = snapshot;
                Ok(None)
            }
        }
    }

    fn parse_arrow_body(
        &mut self,
        start: u32,
        params: Vec<NodeId>,
        is_async: bool,
    ) -> Result<NodeId, ParseError> {
        let (body, expression) = if self.check(&TokenKind::LBrace) {
            let body_start = self.start();
            let body = self.parse_block_body()?;
            (self.ast.alloc(NodeKind::Block { body }, self.span_from(body_start)), false)
        } else {
            (self.parse_assign()?, true)
        };
        Ok(self.ast.alloc(
            NodeKind::Arrow { params, body, expression, is_async },
            self.span_from(start),
        ))
    }

    fn parse_conditional(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let test = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let saved = self.allow_in;
        self.allow_in = true;
        let consequent = self.parse_assign()?;
        self.allow_in = saved;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assign()?;
        Ok(self.ast.alloc(
            NodeKind::Conditional { test, consequent, alternate },
            self.span_from(start),
        ))
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8, bool)> {
        use TokenKind::*;
        // (operator, binding power, right-associative)
        Some(match self.peek() {
            QuestionQuestion => (BinaryOp::Nullish, 1, false),
            PipePipe => (BinaryOp::Or, 2, false),
            AmpAmp => (BinaryOp::And, 3, false),
            Pipe => (BinaryOp::BitOr, 4, false),
            Caret => (BinaryOp::BitXor, 5, false),
            Amp => (BinaryOp::BitAnd, 6, false),
            EqEq => (BinaryOp::Eq, 7, false),
            NotEq => (BinaryOp::NotEq, 7, false),
            EqEqEq => (BinaryOp::StrictEq, 7, false),
            NotEqEq => (BinaryOp::StrictNotEq, 7, false),
            Lt => (BinaryOp::Lt, 8, false),
            LtEq => (BinaryOp::LtEq, 8, false),
            Gt => (BinaryOp::Gt, 8, false),
            GtEq => (BinaryOp::GtEq, 8, false),
            Keyword(Kw::Instanceof) => (BinaryOp::Instanceof, 8, false),
            Keyword(Kw::In) if self.allow_in => (BinaryOp::In, 8, false),
            Shl => (BinaryOp::Shl, 9, false),
            Shr => (BinaryOp::Shr, 9, false),
            UShr => (BinaryOp::UShr, 9, false),
            Plus => (BinaryOp::Add, 10, false),
            Minus => (BinaryOp::Sub, 10, false),
            Star => (BinaryOp::Mul, 11, false),
            Slash => (BinaryOp::Div, 11, false),
            Percent => (BinaryOp::Mod, 11, false),
            StarStar => (BinaryOp::Pow, 12, true),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<NodeId, ParseError> {
        let start = self.start();
        let mut left = self.parse_unary()?;
        while let Some((op, bp, right_assoc)) = self.binary_op() {
            if bp < min_bp {
                break;
            }
            self.advance();
            let next_bp = if right_assoc { bp } else { bp + 1 };
            let right = self.parse_binary(next_bp)?;
            left = self
                .ast
                .alloc(NodeKind::Binary { op, left, right }, self.span_from(start));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let op = match self.peek() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Keyword(Kw::Typeof) => Some(UnaryOp::Typeof),
            TokenKind::Keyword(Kw::Void) => Some(UnaryOp::Void),
            TokenKind::Keyword(Kw::Delete) => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.parse_unary()?;
            return Ok(self.ast.alloc(NodeKind::Unary { op, arg }, self.span_from(start)));
        }
        if self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus) {
            let op = if self.check(&TokenKind::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            let arg = self.parse_unary()?;
            return Ok(self
                .ast
                .alloc(NodeKind::Update { op, prefix: true, arg }, self.span_from(start)));
        }
        if self.check_kw(Kw::Await) {
            self.advance();
            let arg = self.parse_unary()?;
            return Ok(self.ast.alloc(NodeKind::Await { arg }, self.span_from(start)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let arg = self.parse_call_member(true)?;
        if !self.current.had_newline_before
            && (self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus))
        {
            let op = if self.check(&TokenKind::PlusPlus) {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            };
            self.advance();
            return Ok(self
                .ast
                .alloc(NodeKind::Update { op, prefix: false, arg }, self.span_from(start)));
        }
        Ok(arg)
    }

    fn parse_call_member(&mut self, allow_call: bool) -> Result<NodeId, ParseError> {
        let start = self.start();

        let mut expr = if self.check_kw(Kw::New) {
            self.advance();
            if self.eat(&TokenKind::Dot) {
                let (property, _) = self.expect_ident()?;
                self.ast.alloc(
                    NodeKind::MetaProperty { meta: "new".to_string(), property },
                    self.span_from(start),
                )
            } else {
                let callee = self.parse_call_member(false)?;
                let args = if self.check(&TokenKind::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                self.ast
                    .alloc(NodeKind::New { callee, args }, self.span_from(start))
            }
        } else {
            self.parse_primary()?
        };

        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    expr = self.ast.alloc(
                        NodeKind::Member { object: expr, property, computed: false, optional: false },
                        self.span_from(start),
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let property = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = self.ast.alloc(
                        NodeKind::Member { object: expr, property, computed: true, optional: false },
                        self.span_from(start),
                    );
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    if self.check(&TokenKind::LParen) {
                        let args = self.parse_args()?;
                        expr = self.ast.alloc(
                            NodeKind::Call { callee: expr, args, optional: true },
                            self.span_from(start),
                        );
                    } else if self.eat(&TokenKind::LBracket) {
                        let property = self.parse_expr()?;
                        self.expect(&TokenKind::RBracket)?;
                        expr = self.ast.alloc(
                            NodeKind::Member { object: expr, property, computed: true, optional: true },
                            self.span_from(start),
                        );
                    } else {
                        let property = self.parse_member_name()?;
                        expr = self.ast.alloc(
                            NodeKind::Member { object: expr, property, computed: false, optional: true },
                            self.span_from(start),
                        );
                    }
                }
                TokenKind::LParen if allow_call => {
                    let args = self.parse_args()?;
                    expr = self.ast.alloc(
                        NodeKind::Call { callee: expr, args, optional: false },
                        self.span_from(start),
                    );
                }
                TokenKind::TemplatePart { .. } => {
                    let quasi = self.parse_template()?;
                    expr = self.ast.alloc(
                        NodeKind::TaggedTemplate { tag: expr, quasi },
                        self.span_from(start),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// A member name after `.`: identifiers and keywords both allowed.
    fn parse_member_name(&mut self) -> Result<NodeId, ParseError> {
        let span = self.current.span;
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Ident { name }, span))
            }
            TokenKind::Keyword(kw) => {
                self.advance();
                Ok(self
                    .ast
                    .alloc(NodeKind::Ident { name: kw.as_str().to_string() }, span))
            }
            _ => Err(self.error("Expected property name")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if self.check(&TokenKind::DotDotDot) {
                let spread_start = self.start();
                self.advance();
                let arg = self.parse_assign()?;
                args.push(
                    self.ast
                        .alloc(NodeKind::Spread { arg }, self.span_from(spread_start)),
                );
            } else {
                args.push(self.parse_assign()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let span = self.current.span;
        match self.peek().clone() {
            TokenKind::Num(value) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Num(value), span))
            }
            TokenKind::BigInt(text) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::BigInt(text), span))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Str(value), span))
            }
            TokenKind::Regex { pattern, flags } => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Regex { pattern, flags }, span))
            }
            TokenKind::TemplatePart { .. } => self.parse_template(),
            TokenKind::Keyword(Kw::Null) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Null, span))
            }
            TokenKind::Keyword(Kw::True) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Bool(true), span))
            }
            TokenKind::Keyword(Kw::False) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Bool(false), span))
            }
            TokenKind::Keyword(Kw::This) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::This, span))
            }
            TokenKind::Keyword(Kw::Super) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Super, span))
            }
            TokenKind::Keyword(Kw::Function) => {
                self.advance();
                let parts = self.parse_function_parts(false)?;
                Ok(self.ast.alloc(NodeKind::FunctionExpr(parts), self.span_from(start)))
            }
            TokenKind::Ident(name)
                if name == "async"
                    && matches!(self.peek2(), TokenKind::Keyword(Kw::Function)) =>
            {
                self.advance();
                self.advance();
                let mut parts = self.parse_function_parts(false)?;
                parts.is_async = true;
                Ok(self.ast.alloc(NodeKind::FunctionExpr(parts), self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Class) => {
                self.advance();
                let parts = self.parse_class_parts(false)?;
                Ok(self.ast.alloc(NodeKind::ClassExpr(parts), self.span_from(start)))
            }
            TokenKind::Keyword(Kw::Import) => {
                self.advance();
                if self.eat(&TokenKind::Dot) {
                    let (property, _) = self.expect_ident()?;
                    return Ok(self.ast.alloc(
                        NodeKind::MetaProperty { meta: "import".to_string(), property },
                        self.span_from(start),
                    ));
                }
                self.expect(&TokenKind::LParen)?;
                let arg = self.parse_assign()?;
                self.eat(&TokenKind::Comma);
                self.expect(&TokenKind::RParen)?;
                Ok(self.ast.alloc(NodeKind::ImportCall { arg }, self.span_from(start)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.ast.alloc(NodeKind::Ident { name }, span))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    if self.eat(&TokenKind::Comma) {
                        elements.push(None);
                        continue;
                    }
                    if self.check(&TokenKind::DotDotDot) {
                        let spread_start = self.start();
                        self.advance();
                        let arg = self.parse_assign()?;
                        elements.push(Some(
                            self.ast
                                .alloc(NodeKind::Spread { arg }, self.span_from(spread_start)),
                        ));
                    } else {
                        elements.push(Some(self.parse_assign()?));
                    }
                    if !self.check(&TokenKind::RBracket) {
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(self.ast.alloc(NodeKind::Array { elements }, self.span_from(start)))
            }
            TokenKind::LBrace => self.parse_object_literal(start),
            _ => Err(self.error(format!("Unexpected token {:?}", self.peek()))),
        }
    }

    fn parse_object_literal(&mut self, start: u32) -> Result<NodeId, ParseError> {
        self.advance(); // `{`
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::DotDotDot) {
                let spread_start = self.start();
                self.advance();
                let arg = self.parse_assign()?;
                props.push(
                    self.ast
                        .alloc(NodeKind::Spread { arg }, self.span_from(spread_start)),
                );
            } else {
                props.push(self.parse_object_property()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(self.ast.alloc(NodeKind::Object { props }, self.span_from(start)))
    }

    fn parse_object_property(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();

        let mut is_async = false;
        let mut is_generator = false;
        let mut accessor = None;
        if self.is_ident("async")
            && !matches!(
                self.peek2(),
                TokenKind::Colon | TokenKind::Comma | TokenKind::RBrace | TokenKind::LParen
                    | TokenKind::Eq
            )
        {
            self.advance();
            is_async = true;
        }
        if self.eat(&TokenKind::Star) {
            is_generator = true;
        }
        if (self.is_ident("get") || self.is_ident("set"))
            && !matches!(
                self.peek2(),
                TokenKind::Colon | TokenKind::Comma | TokenKind::RBrace | TokenKind::LParen
                    | TokenKind::Eq
            )
        {
            accessor = Some(if self.is_ident("get") {
                PropertyKind::Get
            } else {
                PropertyKind::Set
            });
            self.advance();
        }

        let (key, computed) = self.parse_property_key()?;

        // Method shorthand.
        if self.check(&TokenKind::LParen) {
            let params = self.parse_params()?;
            let body_start = self.start();
            let body = self.parse_block_body()?;
            let body = self.ast.alloc(NodeKind::Block { body }, self.span_from(body_start));
            let value = self.ast.alloc(
                NodeKind::FunctionExpr(FunctionParts {
                    id: None,
                    params,
                    body,
                    is_async,
                    is_generator,
                }),
                self.span_from(start),
            );
            return Ok(self.ast.alloc(
                NodeKind::Property {
                    key,
                    value,
                    kind: accessor.unwrap_or(PropertyKind::Init),
                    computed,
                    shorthand: false,
                },
                self.span_from(start),
            ));
        }

        if self.eat(&TokenKind::Colon) {
            let value = self.parse_assign()?;
            return Ok(self.ast.alloc(
                NodeKind::Property {
                    key,
                    value,
                    kind: PropertyKind::Init,
                    computed,
                    shorthand: false,
                },
                self.span_from(start),
            ));
        }

        // Shorthand `{ x }` or cover-grammar default `{ x = 1 }`.
        let name = match self.ast.kind(key) {
            NodeKind::Ident { name } => name.clone(),
            _ => return Err(self.error("Expected `:` after property key")),
        };
        let key_span = self.ast.span(key);
        let reference = self.ast.alloc(NodeKind::Ident { name }, key_span);
        let value = if self.eat(&TokenKind::Eq) {
            let default = self.parse_assign()?;
            self.ast.alloc(
                NodeKind::AssignPattern { target: reference, default },
                self.span_from(start),
            )
        } else {
            reference
        };
        Ok(self.ast.alloc(
            NodeKind::Property {
                key,
                value,
                kind: PropertyKind::Init,
                computed: false,
                shorthand: true,
            },
            self.span_from(start),
        ))
    }

    fn parse_template(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        loop {
            let TokenKind::TemplatePart { cooked, tail } = self.peek().clone() else {
                return Err(self.error("Expected template literal piece"));
            };
            quasis.push(cooked);
            if tail {
                self.advance();
                break;
            }
            self.advance();
            exprs.push(self.parse_expr()?);
            if !self.check(&TokenKind::RBrace) {
                return Err(self.error("Expected `}` in template substitution"));
            }
            // Resume the literal directly after the `}` instead of lexing
            // normally.
            self.prev_end = self.current.span.end;
            self.current = self.lexer.template_continue();
        }
        Ok(self
            .ast
            .alloc(NodeKind::Template { quasis, exprs }, self.span_from(start)))
    }
}

/// Parse JavaScript source into an [`Ast`].
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_kinds(source: &str) -> Vec<NodeKind> {
        let ast = parse(source).unwrap();
        ast.program_body().iter().map(|&id| ast.kind(id).clone()).collect()
    }

    #[test]
    fn test_variable_declaration() {
        let ast = parse("var test = 31;").unwrap();
        let body = ast.program_body();
        assert_eq!(body.len(), 1);
        let NodeKind::VarDecl { kind, decls } = ast.kind(body[0]) else {
            panic!("expected var decl");
        };
        assert_eq!(*kind, VarKind::Var);
        let NodeKind::VarDeclarator { id, init } = ast.kind(decls[0]) else {
            panic!("expected declarator");
        };
        assert_eq!(ast.kind(*id), &NodeKind::Ident { name: "test".into() });
        assert_eq!(ast.kind(init.unwrap()), &NodeKind::Num(31.0));
    }

    #[test]
    fn test_binary_precedence() {
        let ast = parse("1 + 2 * 3;").unwrap();
        let NodeKind::ExprStmt { expr } = ast.kind(ast.program_body()[0]) else {
            panic!();
        };
        let NodeKind::Binary { op: BinaryOp::Add, right, .. } = ast.kind(*expr) else {
            panic!("expected + at the top");
        };
        assert!(matches!(ast.kind(*right), NodeKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_arrow_function() {
        let ast = parse("const add = (a, b) => a + b;").unwrap();
        let NodeKind::VarDecl { decls, .. } = ast.kind(ast.program_body()[0]) else {
            panic!();
        };
        let NodeKind::VarDeclarator { init, .. } = ast.kind(decls[0]) else { panic!() };
        assert!(matches!(
            ast.kind(init.unwrap()),
            NodeKind::Arrow { expression: true, .. }
        ));
    }

    #[test]
    fn test_paren_expr_not_arrow() {
        let ast = parse("(a, b);").unwrap();
        let NodeKind::ExprStmt { expr } = ast.kind(ast.program_body()[0]) else { panic!() };
        assert!(matches!(ast.kind(*expr), NodeKind::Sequence { .. }));
    }

    #[test]
    fn test_class_and_members() {
        let ast = parse("class Foo extends Bar { constructor() {} get x() { return 1; } static m() {} }")
            .unwrap();
        let NodeKind::ClassDecl(parts) = ast.kind(ast.program_body()[0]) else { panic!() };
        assert_eq!(parts.body.len(), 3);
        assert!(matches!(
            ast.kind(parts.body[0]),
            NodeKind::MethodDef { kind: MethodKind::Constructor, .. }
        ));
    }

    #[test]
    fn test_for_of_destructuring() {
        let ast = parse("for (const [a, b] of pairs) {}").unwrap();
        assert!(matches!(ast.kind(ast.program_body()[0]), NodeKind::ForOf { .. }));
    }

    #[test]
    fn test_destructuring_assignment() {
        let ast = parse("[a, b] = c;").unwrap();
        let NodeKind::ExprStmt { expr } = ast.kind(ast.program_body()[0]) else { panic!() };
        let NodeKind::Assign { target, .. } = ast.kind(*expr) else { panic!() };
        assert!(matches!(ast.kind(*target), NodeKind::ArrayPattern { .. }));
    }

    #[test]
    fn test_template_literal() {
        let ast = parse("`a${x}b${y}c`;").unwrap();
        let NodeKind::ExprStmt { expr } = ast.kind(ast.program_body()[0]) else { panic!() };
        let NodeKind::Template { quasis, exprs } = ast.kind(*expr) else { panic!() };
        assert_eq!(quasis, &["a", "b", "c"]);
        assert_eq!(exprs.len(), 2);
    }

    #[test]
    fn test_optional_chain() {
        let ast = parse("a?.b?.(1);").unwrap();
        let NodeKind::ExprStmt { expr } = ast.kind(ast.program_body()[0]) else { panic!() };
        assert!(matches!(ast.kind(*expr), NodeKind::Call { optional: true, .. }));
    }

    #[test]
    fn test_asi() {
        let kinds = body_kinds("a\nb");
        assert_eq!(kinds.len(), 2);
    }

    #[test]
    fn test_modules_anywhere() {
        let kinds = body_kinds("var a = 1;\nimport x from 'm';\nexport { a };");
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[1], NodeKind::ImportDecl { .. }));
        assert!(matches!(kinds[2], NodeKind::ExportNamed { .. }));
    }

    #[test]
    fn test_top_level_return() {
        assert!(matches!(body_kinds("return 1;")[0], NodeKind::Return { .. }));
    }

    #[test]
    fn test_labeled_and_switch() {
        let kinds = body_kinds("outer: for (;;) { break outer; }\nswitch (x) { case 1: break; default: }");
        assert!(matches!(kinds[0], NodeKind::Labeled { .. }));
        assert!(matches!(kinds[1], NodeKind::Switch { .. }));
    }

    #[test]
    fn test_parse_error_position() {
        let err = parse("var = 1;").unwrap_err();
        assert_eq!(err.span.start, 4);
    }

    #[test]
    fn test_comments_and_hashbang() {
        let ast = parse("#!/usr/bin/env node\n// hi\nvar a;").unwrap();
        assert_eq!(ast.hashbang.as_deref(), Some("#!/usr/bin/env node"));
        assert_eq!(ast.comments.len(), 1);
    }
}
