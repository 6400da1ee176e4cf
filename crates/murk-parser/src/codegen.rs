//! JavaScript code generator.
//!
//! Walks the arena AST and emits source text, with a compact mode that
//! collapses whitespace and drops redundant semicolons. Parentheses are
//! re-derived from operator precedence rather than preserved from the input.
//!
//! A node carrying `verbatim` text is emitted as that text, whatever its
//! kind. Nodes with non-empty spans contribute source-map segments.

use crate::ast::*;
use crate::span::Span;

/// Code generation options.
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// Collapse whitespace and drop redundant semicolons.
    pub compact: bool,
    /// Emit top-level leading comments (spaced mode only).
    pub comments: bool,
    /// Collect source-map segments.
    pub source_map: bool,
}

/// Generation failure: a node kind appeared in a position the generator
/// cannot emit.
#[derive(Debug, Clone)]
pub struct GenError {
    pub message: String,
}

impl GenError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for GenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GenError {}

/// One source-map segment: a generated position mapped back to an original
/// byte offset.
#[derive(Debug, Clone, Copy)]
pub struct SourceMapping {
    pub gen_line: u32,
    pub gen_col: u32,
    pub orig_offset: u32,
}

// Expression precedence levels, loosest binding first.
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_NULLISH: u8 = 3;
const PREC_OR: u8 = 4;
const PREC_AND: u8 = 5;
const PREC_BIT_OR: u8 = 6;
const PREC_BIT_XOR: u8 = 7;
const PREC_BIT_AND: u8 = 8;
const PREC_EQUALITY: u8 = 9;
const PREC_RELATIONAL: u8 = 10;
const PREC_SHIFT: u8 = 11;
const PREC_ADDITIVE: u8 = 12;
const PREC_MULTIPLICATIVE: u8 = 13;
const PREC_EXPONENT: u8 = 14;
const PREC_UNARY: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_CALL: u8 = 18;
const PREC_PRIMARY: u8 = 20;

fn binary_prec(op: BinaryOp) -> u8 {
    use BinaryOp::*;
    match op {
        Nullish => PREC_NULLISH,
        Or => PREC_OR,
        And => PREC_AND,
        BitOr => PREC_BIT_OR,
        BitXor => PREC_BIT_XOR,
        BitAnd => PREC_BIT_AND,
        Eq | NotEq | StrictEq | StrictNotEq => PREC_EQUALITY,
        Lt | LtEq | Gt | GtEq | In | Instanceof => PREC_RELATIONAL,
        Shl | Shr | UShr => PREC_SHIFT,
        Add | Sub => PREC_ADDITIVE,
        Mul | Div | Mod => PREC_MULTIPLICATIVE,
        Pow => PREC_EXPONENT,
    }
}

/// The code generator.
pub struct Codegen<'a> {
    ast: &'a Ast,
    options: CodegenOptions,
    out: String,
    line: u32,
    col: u32,
    indent: usize,
    needs_space: bool,
    needs_semicolon: bool,
    mappings: Vec<SourceMapping>,
    comments_emitted: usize,
}

impl<'a> Codegen<'a> {
    pub fn new(ast: &'a Ast, options: CodegenOptions) -> Self {
        Self {
            ast,
            options,
            out: String::new(),
            line: 0,
            col: 0,
            indent: 0,
            needs_space: false,
            needs_semicolon: false,
            mappings: Vec::new(),
            comments_emitted: 0,
        }
    }

    /// Emit the whole program. Returns the code and the collected source-map
    /// segments (empty unless enabled).
    pub fn generate(mut self) -> Result<(String, Vec<SourceMapping>), GenError> {
        let body = self.ast.program_body().to_vec();
        for (i, stmt) in body.iter().copied().enumerate() {
            if self.options.comments && !self.options.compact {
                self.flush_comments_before(self.ast.span(stmt).start);
            }
            self.emit_stmt(stmt)?;
            if !self.options.compact && i + 1 < body.len() {
                self.newline();
            }
        }
        if self.options.comments && !self.options.compact {
            self.flush_comments_before(u32::MAX);
        }
        if !self.out.is_empty() && !self.options.compact {
            self.push_raw("\n");
        }
        Ok((self.out, self.mappings))
    }

    // =========================================================================
    // Output plumbing
    // =========================================================================

    fn push_raw(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
        self.out.push_str(s);
    }

    fn emit(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.needs_semicolon {
            // The statement separator is redundant right before a closing
            // brace.
            if !s.starts_with('}') {
                self.push_raw(";");
            }
            self.needs_semicolon = false;
        }
        if self.needs_space {
            let first = s.chars().next().unwrap();
            if first.is_alphanumeric() || first == '_' || first == '$' || first == '\\' {
                self.push_raw(" ");
            }
            self.needs_space = false;
        }
        self.push_raw(s);
    }

    /// Emit a word that must stay separated from a following word.
    fn word(&mut self, s: &str) {
        self.emit(s);
        self.needs_space = true;
    }

    fn space(&mut self) {
        if !self.options.compact {
            self.emit(" ");
        }
    }

    fn newline(&mut self) {
        if self.options.compact {
            return;
        }
        if self.needs_semicolon {
            self.push_raw(";");
            self.needs_semicolon = false;
        }
        self.needs_space = false;
        self.push_raw("\n");
        for _ in 0..self.indent {
            self.push_raw("  ");
        }
    }

    fn semicolon(&mut self) {
        if self.options.compact {
            self.needs_semicolon = true;
        } else {
            self.emit(";");
        }
    }

    fn map_to(&mut self, span: Span) {
        if self.options.source_map && !span.is_empty() {
            // Flush any pending separator so the position points at the token.
            if self.needs_semicolon {
                self.push_raw(";");
                self.needs_semicolon = false;
            }
            self.mappings.push(SourceMapping {
                gen_line: self.line,
                gen_col: self.col + u32::from(self.needs_space),
                orig_offset: span.start,
            });
        }
    }

    fn flush_comments_before(&mut self, offset: u32) {
        while self.comments_emitted < self.ast.comments.len() {
            let comment = &self.ast.comments[self.comments_emitted];
            if comment.span.end > offset {
                break;
            }
            let text = comment.text.clone();
            if comment.block {
                self.emit("/*");
                self.push_raw(&text);
                self.emit("*/");
            } else {
                self.emit("//");
                self.push_raw(&text);
            }
            self.newline();
            self.comments_emitted += 1;
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn emit_stmt(&mut self, id: NodeId) -> Result<(), GenError> {
        if let Some(text) = self.ast.verbatim(id) {
            let text = text.to_string();
            self.map_to(self.ast.span(id));
            self.emit(&text);
            return Ok(());
        }
        self.map_to(self.ast.span(id));
        match self.ast.kind(id).clone() {
            NodeKind::VarDecl { kind, decls } => {
                self.emit_var_decl(kind, &decls)?;
                self.semicolon();
            }
            NodeKind::FunctionDecl(parts) => self.emit_function(&parts)?,
            NodeKind::ClassDecl(parts) => self.emit_class(&parts)?,
            NodeKind::Block { body } => self.emit_block(&body)?,
            NodeKind::If { test, consequent, alternate } => {
                self.emit("if");
                self.space();
                self.emit("(");
                self.emit_expr(test, PREC_SEQUENCE)?;
                self.emit(")");
                // A dangling-else consequent needs braces to keep the else
                // attached to this `if`.
                let needs_braces = alternate.is_some()
                    && matches!(self.ast.kind(consequent), NodeKind::If { alternate: None, .. });
                if needs_braces {
                    self.space();
                    self.emit("{");
                    self.indent += 1;
                    self.newline();
                    self.emit_stmt(consequent)?;
                    self.indent -= 1;
                    self.newline();
                    self.emit("}");
                } else {
                    self.emit_nested_stmt(consequent)?;
                }
                if let Some(alternate) = alternate {
                    if !needs_braces && !matches!(self.ast.kind(consequent), NodeKind::Block { .. })
                    {
                        // `else` must not absorb the consequent's pending
                        // separator.
                        if self.needs_semicolon {
                            self.push_raw(";");
                            self.needs_semicolon = false;
                        }
                        if !self.options.compact {
                            self.newline();
                        }
                    } else {
                        self.space();
                    }
                    self.word("else");
                    if matches!(self.ast.kind(alternate), NodeKind::If { .. }) {
                        self.needs_space = true;
                        self.emit_stmt(alternate)?;
                    } else {
                        self.emit_nested_stmt(alternate)?;
                    }
                }
            }
            NodeKind::Switch { discriminant, cases } => {
                self.emit("switch");
                self.space();
                self.emit("(");
                self.emit_expr(discriminant, PREC_SEQUENCE)?;
                self.emit(")");
                self.space();
                self.emit("{");
                self.indent += 1;
                for case in cases {
                    self.newline();
                    self.emit_switch_case(case)?;
                }
                self.indent -= 1;
                self.newline();
                self.emit("}");
            }
            NodeKind::For { init, test, update, body } => {
                self.emit("for");
                self.space();
                self.emit("(");
                if let Some(init) = init {
                    match self.ast.kind(init).clone() {
                        NodeKind::VarDecl { kind, decls } => self.emit_var_decl(kind, &decls)?,
                        _ => self.emit_expr(init, PREC_SEQUENCE)?,
                    }
                }
                self.emit(";");
                if let Some(test) = test {
                    self.space();
                    self.emit_expr(test, PREC_SEQUENCE)?;
                }
                self.emit(";");
                if let Some(update) = update {
                    self.space();
                    self.emit_expr(update, PREC_SEQUENCE)?;
                }
                self.emit(")");
                self.emit_nested_stmt(body)?;
            }
            NodeKind::ForIn { left, right, body } => {
                self.emit("for");
                self.space();
                self.emit("(");
                self.emit_for_head(left)?;
                self.word("in");
                self.emit_expr(right, PREC_SEQUENCE)?;
                self.emit(")");
                self.emit_nested_stmt(body)?;
            }
            NodeKind::ForOf { left, right, body, is_await } => {
                self.emit("for");
                if is_await {
                    self.needs_space = true;
                    self.word("await");
                }
                self.space();
                self.emit("(");
                self.emit_for_head(left)?;
                self.word("of");
                self.emit_expr(right, PREC_ASSIGN)?;
                self.emit(")");
                self.emit_nested_stmt(body)?;
            }
            NodeKind::While { test, body } => {
                self.emit("while");
                self.space();
                self.emit("(");
                self.emit_expr(test, PREC_SEQUENCE)?;
                self.emit(")");
                self.emit_nested_stmt(body)?;
            }
            NodeKind::DoWhile { body, test } => {
                self.word("do");
                self.emit_nested_stmt(body)?;
                self.space();
                self.emit("while");
                self.space();
                self.emit("(");
                self.emit_expr(test, PREC_SEQUENCE)?;
                self.emit(")");
                self.semicolon();
            }
            NodeKind::Break { label } => {
                self.emit("break");
                if let Some(label) = label {
                    self.needs_space = true;
                    self.emit(&label);
                }
                self.semicolon();
            }
            NodeKind::Continue { label } => {
                self.emit("continue");
                if let Some(label) = label {
                    self.needs_space = true;
                    self.emit(&label);
                }
                self.semicolon();
            }
            NodeKind::Return { arg } => {
                self.emit("return");
                if let Some(arg) = arg {
                    self.needs_space = true;
                    self.emit_expr(arg, PREC_SEQUENCE)?;
                }
                self.semicolon();
            }
            NodeKind::Throw { arg } => {
                self.word("throw");
                self.emit_expr(arg, PREC_SEQUENCE)?;
                self.semicolon();
            }
            NodeKind::Try { block, handler, finalizer } => {
                self.emit("try");
                self.space();
                self.emit_stmt(block)?;
                if let Some(handler) = handler {
                    let NodeKind::Catch { param, body } = self.ast.kind(handler).clone() else {
                        return Err(GenError::new("try handler is not a catch clause"));
                    };
                    self.space();
                    self.emit("catch");
                    if let Some(param) = param {
                        self.space();
                        self.emit("(");
                        self.emit_expr(param, PREC_ASSIGN)?;
                        self.emit(")");
                    }
                    self.space();
                    self.emit_stmt(body)?;
                }
                if let Some(finalizer) = finalizer {
                    self.space();
                    self.emit("finally");
                    self.space();
                    self.emit_stmt(finalizer)?;
                }
            }
            NodeKind::Labeled { label, body } => {
                self.emit(&label);
                self.emit(":");
                self.space();
                self.emit_stmt(body)?;
            }
            NodeKind::ExprStmt { expr } => {
                if self.stmt_needs_parens(expr) {
                    self.emit("(");
                    self.emit_expr(expr, PREC_SEQUENCE)?;
                    self.emit(")");
                } else {
                    self.emit_expr(expr, PREC_SEQUENCE)?;
                }
                self.semicolon();
            }
            NodeKind::Empty => self.emit(";"),
            NodeKind::Debugger => {
                self.emit("debugger");
                self.semicolon();
            }
            NodeKind::With { object, body } => {
                self.emit("with");
                self.space();
                self.emit("(");
                self.emit_expr(object, PREC_SEQUENCE)?;
                self.emit(")");
                self.emit_nested_stmt(body)?;
            }
            NodeKind::ImportDecl { specifiers, source } => {
                self.emit_import(&specifiers, source)?;
            }
            NodeKind::ExportNamed { specifiers, source } => {
                self.word("export");
                self.emit("{");
                for (i, spec) in specifiers.iter().enumerate() {
                    if i > 0 {
                        self.emit(",");
                        self.space();
                    }
                    let NodeKind::ExportSpecifier { local, exported } =
                        self.ast.kind(*spec).clone()
                    else {
                        return Err(GenError::new("bad export specifier"));
                    };
                    self.emit(&local);
                    if exported != local {
                        self.needs_space = true;
                        self.word("as");
                        self.emit(&exported);
                    }
                }
                self.emit("}");
                if let Some(source) = source {
                    self.needs_space = true;
                    self.word("from");
                    self.emit_expr(source, PREC_PRIMARY)?;
                }
                self.semicolon();
            }
            NodeKind::ExportDefault { decl } => {
                self.word("export");
                self.word("default");
                match self.ast.kind(decl) {
                    NodeKind::FunctionDecl(_) | NodeKind::ClassDecl(_) => {
                        self.emit_stmt(decl)?;
                    }
                    _ => {
                        self.emit_expr(decl, PREC_ASSIGN)?;
                        self.semicolon();
                    }
                }
            }
            NodeKind::ExportDecl { decl } => {
                self.word("export");
                self.emit_stmt(decl)?;
            }
            NodeKind::ExportAll { exported, source } => {
                self.word("export");
                self.emit("*");
                if let Some(exported) = exported {
                    self.word("as");
                    self.word(&exported);
                }
                self.needs_space = true;
                self.word("from");
                self.emit_expr(source, PREC_PRIMARY)?;
                self.semicolon();
            }
            other => {
                return Err(GenError::new(format!(
                    "cannot emit {other:?} in statement position"
                )))
            }
        }
        Ok(())
    }

    /// Loop and conditional bodies: inline in compact mode, indented blocks
    /// keep their braces.
    fn emit_nested_stmt(&mut self, id: NodeId) -> Result<(), GenError> {
        if matches!(self.ast.kind(id), NodeKind::Block { .. }) {
            self.space();
            self.emit_stmt(id)
        } else if self.options.compact {
            self.emit_stmt(id)
        } else {
            self.indent += 1;
            self.newline();
            self.emit_stmt(id)?;
            self.indent -= 1;
            Ok(())
        }
    }

    fn emit_block(&mut self, body: &[NodeId]) -> Result<(), GenError> {
        self.emit("{");
        if body.is_empty() {
            self.emit("}");
            return Ok(());
        }
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.emit_stmt(*stmt)?;
        }
        self.indent -= 1;
        self.newline();
        self.emit("}");
        Ok(())
    }

    fn emit_switch_case(&mut self, id: NodeId) -> Result<(), GenError> {
        let NodeKind::SwitchCase { test, body } = self.ast.kind(id).clone() else {
            return Err(GenError::new("bad switch case"));
        };
        self.map_to(self.ast.span(id));
        match test {
            Some(test) => {
                self.word("case");
                self.emit_expr(test, PREC_SEQUENCE)?;
            }
            None => self.emit("default"),
        }
        self.emit(":");
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.emit_stmt(stmt)?;
        }
        self.indent -= 1;
        Ok(())
    }

    fn emit_var_decl(&mut self, kind: VarKind, decls: &[NodeId]) -> Result<(), GenError> {
        self.word(kind.as_str());
        for (i, decl) in decls.iter().enumerate() {
            if i > 0 {
                self.emit(",");
                self.space();
            }
            let NodeKind::VarDeclarator { id, init } = self.ast.kind(*decl).clone() else {
                return Err(GenError::new("bad variable declarator"));
            };
            self.map_to(self.ast.span(*decl));
            self.emit_expr(id, PREC_ASSIGN)?;
            if let Some(init) = init {
                self.space();
                self.emit("=");
                self.space();
                self.emit_expr(init, PREC_ASSIGN)?;
            }
        }
        Ok(())
    }

    fn emit_for_head(&mut self, left: NodeId) -> Result<(), GenError> {
        match self.ast.kind(left).clone() {
            NodeKind::VarDecl { kind, decls } => self.emit_var_decl(kind, &decls)?,
            _ => self.emit_expr(left, PREC_ASSIGN)?,
        }
        self.needs_space = true;
        Ok(())
    }

    fn emit_import(&mut self, specifiers: &[NodeId], source: NodeId) -> Result<(), GenError> {
        self.word("import");
        if specifiers.is_empty() {
            self.emit_expr(source, PREC_PRIMARY)?;
            self.semicolon();
            return Ok(());
        }
        let mut named_open = false;
        for (i, spec) in specifiers.iter().enumerate() {
            if i > 0 && !named_open {
                self.emit(",");
                self.space();
            }
            match self.ast.kind(*spec).clone() {
                NodeKind::ImportDefault { local } => self.emit_expr(local, PREC_PRIMARY)?,
                NodeKind::ImportNamespace { local } => {
                    self.emit("*");
                    self.space();
                    self.word("as");
                    self.emit_expr(local, PREC_PRIMARY)?;
                }
                NodeKind::ImportNamed { imported, local } => {
                    if !named_open {
                        self.emit("{");
                        named_open = true;
                    } else {
                        self.emit(",");
                        self.space();
                    }
                    let local_name = match self.ast.kind(local) {
                        NodeKind::Ident { name } => name.clone(),
                        _ => return Err(GenError::new("bad import binding")),
                    };
                    if imported == local_name {
                        self.emit(&imported);
                    } else {
                        self.word(&imported);
                        self.word("as");
                        self.emit(&local_name);
                    }
                }
                _ => return Err(GenError::new("bad import specifier")),
            }
        }
        if named_open {
            self.emit("}");
        }
        self.needs_space = true;
        self.word("from");
        self.emit_expr(source, PREC_PRIMARY)?;
        self.semicolon();
        Ok(())
    }

    // =========================================================================
    // Functions and classes
    // =========================================================================

    fn emit_function(&mut self, parts: &FunctionParts) -> Result<(), GenError> {
        if parts.is_async {
            self.word("async");
        }
        self.emit("function");
        if parts.is_generator {
            self.emit("*");
        }
        self.needs_space = true;
        if let Some(id) = parts.id {
            self.emit_expr(id, PREC_PRIMARY)?;
        }
        self.emit_params(&parts.params)?;
        self.space();
        self.emit_stmt(parts.body)?;
        Ok(())
    }

    fn emit_params(&mut self, params: &[NodeId]) -> Result<(), GenError> {
        self.emit("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.emit(",");
                self.space();
            }
            self.emit_expr(*param, PREC_ASSIGN)?;
        }
        self.emit(")");
        Ok(())
    }

    fn emit_class(&mut self, parts: &ClassParts) -> Result<(), GenError> {
        self.emit("class");
        if let Some(id) = parts.id {
            self.needs_space = true;
            self.emit_expr(id, PREC_PRIMARY)?;
        }
        if let Some(super_class) = parts.super_class {
            self.needs_space = true;
            self.word("extends");
            self.emit_expr(super_class, PREC_CALL)?;
        }
        self.space();
        self.emit("{");
        self.indent += 1;
        for member in &parts.body {
            self.newline();
            self.emit_class_member(*member)?;
        }
        self.indent -= 1;
        self.newline();
        self.emit("}");
        Ok(())
    }

    fn emit_class_member(&mut self, id: NodeId) -> Result<(), GenError> {
        self.map_to(self.ast.span(id));
        match self.ast.kind(id).clone() {
            NodeKind::MethodDef { key, value, kind, computed, is_static } => {
                if is_static {
                    self.word("static");
                }
                let NodeKind::FunctionExpr(parts) = self.ast.kind(value).clone() else {
                    return Err(GenError::new("method value is not a function"));
                };
                if parts.is_async {
                    self.word("async");
                }
                if parts.is_generator {
                    self.emit("*");
                }
                match kind {
                    MethodKind::Get => self.word("get"),
                    MethodKind::Set => self.word("set"),
                    MethodKind::Method | MethodKind::Constructor => {}
                }
                self.emit_property_key(key, computed)?;
                self.emit_params(&parts.params)?;
                self.space();
                self.emit_stmt(parts.body)?;
            }
            NodeKind::PropertyDef { key, value, computed, is_static } => {
                if is_static {
                    self.word("static");
                }
                self.emit_property_key(key, computed)?;
                if let Some(value) = value {
                    self.space();
                    self.emit("=");
                    self.space();
                    self.emit_expr(value, PREC_ASSIGN)?;
                }
                self.semicolon();
            }
            NodeKind::StaticBlock { body } => {
                self.word("static");
                self.emit_block(&body)?;
            }
            other => {
                return Err(GenError::new(format!("cannot emit {other:?} as class member")))
            }
        }
        Ok(())
    }

    fn emit_property_key(&mut self, key: NodeId, computed: bool) -> Result<(), GenError> {
        if computed {
            self.emit("[");
            self.emit_expr(key, PREC_ASSIGN)?;
            self.emit("]");
            Ok(())
        } else {
            self.emit_expr(key, PREC_PRIMARY)
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr_prec(&self, id: NodeId) -> u8 {
        match self.ast.kind(id) {
            NodeKind::Sequence { .. } => PREC_SEQUENCE,
            NodeKind::Assign { .. }
            | NodeKind::Arrow { .. }
            | NodeKind::Yield { .. }
            | NodeKind::Conditional { .. } => PREC_ASSIGN,
            NodeKind::Binary { op, .. } => binary_prec(*op),
            NodeKind::Unary { .. } | NodeKind::Await { .. } => PREC_UNARY,
            NodeKind::Update { prefix, .. } => {
                if *prefix {
                    PREC_UNARY
                } else {
                    PREC_POSTFIX
                }
            }
            NodeKind::Call { .. }
            | NodeKind::New { .. }
            | NodeKind::Member { .. }
            | NodeKind::TaggedTemplate { .. }
            | NodeKind::ImportCall { .. } => PREC_CALL,
            _ => PREC_PRIMARY,
        }
    }

    fn emit_expr(&mut self, id: NodeId, min_prec: u8) -> Result<(), GenError> {
        if let Some(text) = self.ast.verbatim(id) {
            let text = text.to_string();
            self.map_to(self.ast.span(id));
            self.emit(&text);
            return Ok(());
        }

        let prec = self.expr_prec(id);
        if prec < min_prec {
            self.emit("(");
            self.emit_expr(id, PREC_SEQUENCE)?;
            self.emit(")");
            return Ok(());
        }

        self.map_to(self.ast.span(id));
        match self.ast.kind(id).clone() {
            NodeKind::Ident { name } => self.emit(&name),
            NodeKind::Null => self.emit("null"),
            NodeKind::Bool(true) => self.emit("true"),
            NodeKind::Bool(false) => self.emit("false"),
            NodeKind::Num(value) => {
                let text = format_number(value);
                self.emit(&text);
            }
            NodeKind::BigInt(text) => self.emit(&text),
            NodeKind::Str(value) => {
                let quoted = quote_string(&value);
                self.emit(&quoted);
            }
            NodeKind::Regex { pattern, flags } => {
                self.emit("/");
                self.push_raw(&pattern);
                self.emit("/");
                self.emit(&flags);
            }
            NodeKind::Template { quasis, exprs } => {
                self.emit("`");
                for (i, quasi) in quasis.iter().enumerate() {
                    let escaped = escape_template(quasi);
                    self.push_raw(&escaped);
                    if i < exprs.len() {
                        self.push_raw("${");
                        self.emit_expr(exprs[i], PREC_SEQUENCE)?;
                        self.emit("}");
                    }
                }
                self.emit("`");
            }
            NodeKind::TaggedTemplate { tag, quasi } => {
                self.emit_expr(tag, PREC_CALL)?;
                self.emit_expr(quasi, PREC_PRIMARY)?;
            }
            NodeKind::This => self.emit("this"),
            NodeKind::Super => self.emit("super"),
            NodeKind::Array { elements } => {
                self.emit("[");
                let len = elements.len();
                for (i, element) in elements.iter().enumerate() {
                    if let Some(element) = element {
                        self.emit_expr(*element, PREC_ASSIGN)?;
                    }
                    if i + 1 < len || element.is_none() {
                        self.emit(",");
                        if element.is_some() {
                            self.space();
                        }
                    }
                }
                self.emit("]");
            }
            NodeKind::Object { props } => self.emit_object(&props, false)?,
            NodeKind::ObjectPattern { props } => self.emit_object(&props, true)?,
            NodeKind::ArrayPattern { elements } => {
                self.emit("[");
                let len = elements.len();
                for (i, element) in elements.iter().enumerate() {
                    if let Some(element) = element {
                        self.emit_expr(*element, PREC_ASSIGN)?;
                    }
                    if i + 1 < len || element.is_none() {
                        self.emit(",");
                        if element.is_some() {
                            self.space();
                        }
                    }
                }
                self.emit("]");
            }
            NodeKind::RestElement { arg } => {
                self.emit("...");
                self.emit_expr(arg, PREC_ASSIGN)?;
            }
            NodeKind::AssignPattern { target, default } => {
                self.emit_expr(target, PREC_PRIMARY)?;
                self.space();
                self.emit("=");
                self.space();
                self.emit_expr(default, PREC_ASSIGN)?;
            }
            NodeKind::FunctionExpr(parts) => self.emit_function(&parts)?,
            NodeKind::ClassExpr(parts) => self.emit_class(&parts)?,
            NodeKind::Arrow { params, body, expression, is_async } => {
                if is_async {
                    self.word("async");
                }
                // Single plain-identifier params keep the short form.
                if params.len() == 1 && matches!(self.ast.kind(params[0]), NodeKind::Ident { .. })
                {
                    self.emit_expr(params[0], PREC_PRIMARY)?;
                } else {
                    self.emit_params(&params)?;
                }
                self.space();
                self.emit("=>");
                self.space();
                if expression {
                    if self.left_edge_is_object(body) {
                        self.emit("(");
                        self.emit_expr(body, PREC_ASSIGN)?;
                        self.emit(")");
                    } else {
                        self.emit_expr(body, PREC_ASSIGN)?;
                    }
                } else {
                    self.emit_stmt(body)?;
                }
            }
            NodeKind::Unary { op, arg } => {
                match op {
                    UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete => self.word(op.as_str()),
                    _ => {
                        self.emit(op.as_str());
                        // `- -x` and `+ +x` must not fuse into `--x` / `++x`.
                        if self.sign_conflicts(op, arg) {
                            self.push_raw(" ");
                        }
                    }
                }
                self.emit_expr(arg, PREC_UNARY)?;
            }
            NodeKind::Update { op, prefix, arg } => {
                if prefix {
                    self.emit(op.as_str());
                    self.emit_expr(arg, PREC_UNARY)?;
                } else {
                    self.emit_expr(arg, PREC_POSTFIX)?;
                    self.emit(op.as_str());
                }
            }
            NodeKind::Binary { op, left, right } => {
                let prec = binary_prec(op);
                // Left-associative: the right operand needs one level more.
                self.emit_expr(left, prec)?;
                match op {
                    BinaryOp::In | BinaryOp::Instanceof => {
                        self.needs_space = true;
                        self.word(op.as_str());
                    }
                    _ => {
                        self.space();
                        self.emit(op.as_str());
                        self.space();
                        // `a--b` lexes as a decrement; the operand's sign
                        // needs a separating space in compact mode.
                        if self.binary_sign_conflicts(op, right) {
                            self.push_raw(" ");
                        }
                    }
                }
                if op == BinaryOp::Pow {
                    self.emit_expr(right, prec)?;
                } else {
                    self.emit_expr(right, prec + 1)?;
                }
            }
            NodeKind::Assign { op, target, value } => {
                self.emit_expr(target, PREC_CALL)?;
                self.space();
                self.emit(op.as_str());
                self.space();
                self.emit_expr(value, PREC_ASSIGN)?;
            }
            NodeKind::Conditional { test, consequent, alternate } => {
                self.emit_expr(test, PREC_NULLISH)?;
                self.space();
                self.emit("?");
                self.space();
                self.emit_expr(consequent, PREC_ASSIGN)?;
                self.space();
                self.emit(":");
                self.space();
                self.emit_expr(alternate, PREC_ASSIGN)?;
            }
            NodeKind::Sequence { exprs } => {
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.emit(",");
                        self.space();
                    }
                    self.emit_expr(*expr, PREC_ASSIGN)?;
                }
            }
            NodeKind::Member { object, property, computed, optional } => {
                // Number literals would swallow the dot as a decimal point.
                if matches!(self.ast.kind(object), NodeKind::Num(_)) {
                    self.emit("(");
                    self.emit_expr(object, PREC_SEQUENCE)?;
                    self.emit(")");
                } else {
                    self.emit_expr(object, PREC_CALL)?;
                }
                if computed {
                    if optional {
                        self.emit("?.");
                    }
                    self.emit("[");
                    self.emit_expr(property, PREC_SEQUENCE)?;
                    self.emit("]");
                } else {
                    self.emit(if optional { "?." } else { "." });
                    self.emit_expr(property, PREC_PRIMARY)?;
                }
            }
            NodeKind::Call { callee, args, optional } => {
                self.emit_expr(callee, PREC_CALL)?;
                if optional {
                    self.emit("?.");
                }
                self.emit_args(&args)?;
            }
            NodeKind::New { callee, args } => {
                self.word("new");
                if self.callee_contains_call(callee) {
                    self.emit("(");
                    self.emit_expr(callee, PREC_SEQUENCE)?;
                    self.emit(")");
                } else {
                    self.emit_expr(callee, PREC_CALL)?;
                }
                self.emit_args(&args)?;
            }
            NodeKind::Spread { arg } => {
                self.emit("...");
                self.emit_expr(arg, PREC_ASSIGN)?;
            }
            NodeKind::Yield { arg, delegate } => {
                self.emit("yield");
                if delegate {
                    self.emit("*");
                }
                if let Some(arg) = arg {
                    self.needs_space = true;
                    self.emit_expr(arg, PREC_ASSIGN)?;
                }
            }
            NodeKind::Await { arg } => {
                self.word("await");
                self.emit_expr(arg, PREC_UNARY)?;
            }
            NodeKind::ImportCall { arg } => {
                self.emit("import(");
                self.emit_expr(arg, PREC_ASSIGN)?;
                self.emit(")");
            }
            NodeKind::MetaProperty { meta, property } => {
                self.emit(&meta);
                self.emit(".");
                self.emit(&property);
            }
            other => {
                return Err(GenError::new(format!(
                    "cannot emit {other:?} in expression position"
                )))
            }
        }
        Ok(())
    }

    fn emit_args(&mut self, args: &[NodeId]) -> Result<(), GenError> {
        self.emit("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.emit(",");
                self.space();
            }
            self.emit_expr(*arg, PREC_ASSIGN)?;
        }
        self.emit(")");
        Ok(())
    }

    fn emit_object(&mut self, props: &[NodeId], pattern: bool) -> Result<(), GenError> {
        self.emit("{");
        for (i, prop) in props.iter().enumerate() {
            if i > 0 {
                self.emit(",");
                self.space();
            }
            match self.ast.kind(*prop).clone() {
                NodeKind::Property { key, value, kind, computed, .. } => {
                    match kind {
                        PropertyKind::Get | PropertyKind::Set => {
                            let NodeKind::FunctionExpr(parts) = self.ast.kind(value).clone()
                            else {
                                return Err(GenError::new("accessor value is not a function"));
                            };
                            self.word(if kind == PropertyKind::Get { "get" } else { "set" });
                            self.emit_property_key(key, computed)?;
                            self.emit_params(&parts.params)?;
                            self.space();
                            self.emit_stmt(parts.body)?;
                        }
                        PropertyKind::Init => {
                            if self.is_shorthand(key, value, computed) {
                                self.emit_expr(value, PREC_ASSIGN)?;
                            } else if let NodeKind::FunctionExpr(parts) =
                                self.ast.kind(value).clone()
                            {
                                if parts.id.is_none() && self.ast.span(value) == self.ast.span(*prop)
                                {
                                    // Method shorthand keeps its compact form.
                                    if parts.is_async {
                                        self.word("async");
                                    }
                                    if parts.is_generator {
                                        self.emit("*");
                                    }
                                    self.emit_property_key(key, computed)?;
                                    self.emit_params(&parts.params)?;
                                    self.space();
                                    self.emit_stmt(parts.body)?;
                                } else {
                                    self.emit_property_key(key, computed)?;
                                    self.emit(":");
                                    self.space();
                                    self.emit_expr(value, PREC_ASSIGN)?;
                                }
                            } else {
                                self.emit_property_key(key, computed)?;
                                self.emit(":");
                                self.space();
                                self.emit_expr(value, PREC_ASSIGN)?;
                            }
                        }
                    }
                }
                NodeKind::Spread { arg } | NodeKind::RestElement { arg } => {
                    self.emit("...");
                    self.emit_expr(arg, PREC_ASSIGN)?;
                }
                other => {
                    let what = if pattern { "pattern property" } else { "object property" };
                    return Err(GenError::new(format!("cannot emit {other:?} as {what}")));
                }
            }
        }
        self.emit("}");
        Ok(())
    }

    /// Shorthand is purely cosmetic: it applies whenever the key identifier
    /// and the bound identifier agree, whatever the parser recorded.
    fn is_shorthand(&self, key: NodeId, value: NodeId, computed: bool) -> bool {
        if computed {
            return false;
        }
        let NodeKind::Ident { name: key_name } = self.ast.kind(key) else { return false };
        match self.ast.kind(value) {
            NodeKind::Ident { name } => name == key_name,
            NodeKind::AssignPattern { target, .. } => {
                matches!(self.ast.kind(*target), NodeKind::Ident { name } if name == key_name)
            }
            _ => false,
        }
    }

    /// Whether an expression statement would be misparsed without parens.
    fn stmt_needs_parens(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Object { .. }
            | NodeKind::ObjectPattern { .. }
            | NodeKind::FunctionExpr(_)
            | NodeKind::ClassExpr(_) => true,
            NodeKind::Binary { left, .. }
            | NodeKind::Assign { target: left, .. }
            | NodeKind::Conditional { test: left, .. }
            | NodeKind::Member { object: left, .. }
            | NodeKind::Call { callee: left, .. }
            | NodeKind::TaggedTemplate { tag: left, .. } => self.stmt_needs_parens(*left),
            NodeKind::Sequence { exprs } => {
                exprs.first().is_some_and(|first| self.stmt_needs_parens(*first))
            }
            NodeKind::Update { prefix: false, arg, .. } => self.stmt_needs_parens(*arg),
            _ => false,
        }
    }

    fn left_edge_is_object(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Object { .. } | NodeKind::ObjectPattern { .. } => true,
            NodeKind::Binary { left, .. }
            | NodeKind::Assign { target: left, .. }
            | NodeKind::Conditional { test: left, .. }
            | NodeKind::Member { object: left, .. }
            | NodeKind::Call { callee: left, .. } => self.left_edge_is_object(*left),
            NodeKind::Sequence { exprs } => {
                exprs.first().is_some_and(|first| self.left_edge_is_object(*first))
            }
            _ => false,
        }
    }

    fn binary_sign_conflicts(&self, op: BinaryOp, right: NodeId) -> bool {
        if !self.options.compact {
            return false;
        }
        match (op, self.ast.kind(right)) {
            (BinaryOp::Sub, NodeKind::Unary { op: UnaryOp::Minus, .. })
            | (BinaryOp::Add, NodeKind::Unary { op: UnaryOp::Plus, .. })
            | (BinaryOp::Sub, NodeKind::Update { op: UpdateOp::Decrement, prefix: true, .. })
            | (BinaryOp::Add, NodeKind::Update { op: UpdateOp::Increment, prefix: true, .. }) => {
                true
            }
            _ => false,
        }
    }

    fn sign_conflicts(&self, op: UnaryOp, arg: NodeId) -> bool {
        match (op, self.ast.kind(arg)) {
            (UnaryOp::Minus, NodeKind::Unary { op: UnaryOp::Minus, .. })
            | (UnaryOp::Plus, NodeKind::Unary { op: UnaryOp::Plus, .. })
            | (UnaryOp::Minus, NodeKind::Update { op: UpdateOp::Decrement, prefix: true, .. })
            | (UnaryOp::Plus, NodeKind::Update { op: UpdateOp::Increment, prefix: true, .. }) => {
                true
            }
            _ => false,
        }
    }

    fn callee_contains_call(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Call { .. } => true,
            NodeKind::Member { object, .. } => self.callee_contains_call(*object),
            _ => false,
        }
    }
}

/// Shortest reasonable decimal form for a number literal.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Quote a string with single quotes and conservative escaping.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn escape_template(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}
