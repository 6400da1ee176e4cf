//! Scope-aware identifier renaming.
//!
//! Three phases over the whole tree, run when the traversal reaches the
//! program node:
//! 1. **Collect**: build a scope tree and record every declared binding
//!    (`var` hoists to the nearest function scope).
//! 2. **Assign**: give each renameable binding a fresh `_0x` name.
//! 3. **Apply**: walk again resolving identifier references through the
//!    scope chain and rewriting them in place.
//!
//! Property names, object keys and labels are never touched. Scopes that
//! contain `eval()` or `with` keep all their names, since evaluated code
//! may refer to them. Top-level bindings are kept unless `renameGlobals`
//! is set, and even then a program with exports keeps its module scope
//! intact.
//!
//! Ignored subtrees are invisible to all three phases.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind, VarKind};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Function,
    Block,
    Catch,
}

#[derive(Debug)]
struct Scope {
    parent: Option<usize>,
    kind: ScopeKind,
    /// Declared names, in declaration order (kept deterministic).
    bindings: Vec<String>,
    renames: FxHashMap<String, String>,
    /// Set when the scope (or a descendant) contains `eval` or `with`.
    poisoned: bool,
}

#[derive(Debug, Default)]
struct ScopeTree {
    scopes: Vec<Scope>,
    /// Nodes that open a scope, mapped to it.
    scope_of: FxHashMap<NodeId, usize>,
}

impl ScopeTree {
    fn push(&mut self, kind: ScopeKind, parent: Option<usize>, opener: Option<NodeId>) -> usize {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent,
            kind,
            bindings: Vec::new(),
            renames: FxHashMap::default(),
            poisoned: false,
        });
        if let Some(node) = opener {
            self.scope_of.insert(node, id);
        }
        id
    }

    fn bind(&mut self, scope: usize, name: &str, hoist: bool) {
        let target = if hoist { self.hoist_target(scope) } else { scope };
        let scope = &mut self.scopes[target];
        if !scope.bindings.iter().any(|b| b == name) {
            scope.bindings.push(name.to_string());
        }
    }

    /// The nearest function or module scope, for `var` hoisting.
    fn hoist_target(&self, scope: usize) -> usize {
        let mut current = scope;
        loop {
            match self.scopes[current].kind {
                ScopeKind::Function | ScopeKind::Module => return current,
                _ => match self.scopes[current].parent {
                    Some(parent) => current = parent,
                    None => return current,
                },
            }
        }
    }

    /// Mark a scope and all its ancestors as un-renameable.
    fn poison(&mut self, scope: usize) {
        let mut current = Some(scope);
        while let Some(id) = current {
            self.scopes[id].poisoned = true;
            current = self.scopes[id].parent;
        }
    }

    /// Resolve a name through the chain; `Some` only when the owning scope
    /// renamed it.
    fn resolve(&self, scope: usize, name: &str) -> Option<String> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id];
            if s.bindings.iter().any(|b| b == name) {
                return s.renames.get(name).cloned();
            }
            current = s.parent;
        }
        None
    }
}

// =============================================================================
// Phase 1: collect scopes and bindings
// =============================================================================

struct Collector<'a> {
    ast: &'a Ast,
    tree: ScopeTree,
}

impl<'a> Collector<'a> {
    fn new(ast: &'a Ast) -> Self {
        let mut tree = ScopeTree::default();
        tree.push(ScopeKind::Module, None, Some(ast.root));
        Self { ast, tree }
    }

    fn walk(&mut self, node: NodeId, scope: usize) {
        if self.ast.is_ignored(node) {
            return;
        }
        match self.ast.kind(node).clone() {
            NodeKind::VarDecl { kind, decls } => {
                let hoist = kind == VarKind::Var;
                for decl in decls {
                    let NodeKind::VarDeclarator { id, init } = *self.ast.kind(decl) else {
                        continue;
                    };
                    self.bind_pattern(id, hoist, scope);
                    if let Some(init) = init {
                        self.walk(init, scope);
                    }
                }
            }
            NodeKind::FunctionDecl(parts) => {
                if let Some(id) = parts.id {
                    if let NodeKind::Ident { name } = self.ast.kind(id).clone() {
                        self.tree.bind(scope, &name, true);
                    }
                }
                self.walk_function(node, &parts.params, parts.body, None, scope);
            }
            NodeKind::FunctionExpr(parts) => {
                self.walk_function(node, &parts.params, parts.body, parts.id, scope);
            }
            NodeKind::Arrow { params, body, .. } => {
                let fs = self.tree.push(ScopeKind::Function, Some(scope), Some(node));
                for &param in &params {
                    self.bind_pattern(param, false, fs);
                }
                self.walk(body, fs);
            }
            NodeKind::ClassDecl(parts) => {
                if let Some(id) = parts.id {
                    if let NodeKind::Ident { name } = self.ast.kind(id).clone() {
                        self.tree.bind(scope, &name, false);
                    }
                }
                if let Some(super_class) = parts.super_class {
                    self.walk(super_class, scope);
                }
                for &member in &parts.body {
                    self.walk(member, scope);
                }
            }
            NodeKind::ClassExpr(parts) => {
                let cs = self.tree.push(ScopeKind::Block, Some(scope), Some(node));
                if let Some(id) = parts.id {
                    if let NodeKind::Ident { name } = self.ast.kind(id).clone() {
                        self.tree.bind(cs, &name, false);
                    }
                }
                if let Some(super_class) = parts.super_class {
                    self.walk(super_class, cs);
                }
                for &member in &parts.body {
                    self.walk(member, cs);
                }
            }
            NodeKind::Block { .. } | NodeKind::StaticBlock { .. } => {
                let bs = self.tree.push(ScopeKind::Block, Some(scope), Some(node));
                for child in self.ast.children(node) {
                    self.walk(child, bs);
                }
            }
            NodeKind::Catch { param, body } => {
                let cs = self.tree.push(ScopeKind::Catch, Some(scope), Some(node));
                if let Some(param) = param {
                    self.bind_pattern(param, false, cs);
                }
                self.walk(body, cs);
            }
            NodeKind::For { .. } | NodeKind::ForIn { .. } | NodeKind::ForOf { .. }
            | NodeKind::Switch { .. } => {
                let bs = self.tree.push(ScopeKind::Block, Some(scope), Some(node));
                for child in self.ast.children(node) {
                    self.walk(child, bs);
                }
            }
            NodeKind::With { .. } => {
                self.tree.poison(scope);
                for child in self.ast.children(node) {
                    self.walk(child, scope);
                }
            }
            NodeKind::Call { callee, .. } => {
                if matches!(self.ast.kind(callee), NodeKind::Ident { name } if name == "eval") {
                    self.tree.poison(scope);
                }
                for child in self.ast.children(node) {
                    self.walk(child, scope);
                }
            }
            NodeKind::ImportDecl { specifiers, .. } => {
                for spec in specifiers {
                    let local = match self.ast.kind(spec) {
                        NodeKind::ImportDefault { local }
                        | NodeKind::ImportNamespace { local }
                        | NodeKind::ImportNamed { local, .. } => *local,
                        _ => continue,
                    };
                    if let NodeKind::Ident { name } = self.ast.kind(local).clone() {
                        self.tree.bind(scope, &name, false);
                    }
                }
            }
            _ => {
                for child in self.ast.children(node) {
                    self.walk(child, scope);
                }
            }
        }
    }

    fn walk_function(
        &mut self,
        opener: NodeId,
        params: &[NodeId],
        body: NodeId,
        own_name: Option<NodeId>,
        scope: usize,
    ) {
        let fs = self.tree.push(ScopeKind::Function, Some(scope), Some(opener));
        if let Some(id) = own_name {
            if let NodeKind::Ident { name } = self.ast.kind(id) {
                self.tree.bind(fs, name, false);
            }
        }
        for &param in params {
            self.bind_pattern(param, false, fs);
        }
        self.walk(body, fs);
    }

    /// Bind every name in a pattern; defaults and computed keys are walked
    /// as ordinary expressions.
    fn bind_pattern(&mut self, node: NodeId, hoist: bool, scope: usize) {
        match self.ast.kind(node).clone() {
            NodeKind::Ident { name } => self.tree.bind(scope, &name, hoist),
            NodeKind::ArrayPattern { elements } => {
                for element in elements.into_iter().flatten() {
                    self.bind_pattern(element, hoist, scope);
                }
            }
            NodeKind::ObjectPattern { props } => {
                for prop in props {
                    match self.ast.kind(prop).clone() {
                        NodeKind::Property { key, value, computed, .. } => {
                            if computed {
                                self.walk(key, scope);
                            }
                            self.bind_pattern(value, hoist, scope);
                        }
                        NodeKind::RestElement { arg } => self.bind_pattern(arg, hoist, scope),
                        _ => {}
                    }
                }
            }
            NodeKind::RestElement { arg } => self.bind_pattern(arg, hoist, scope),
            NodeKind::AssignPattern { target, default } => {
                self.bind_pattern(target, hoist, scope);
                self.walk(default, scope);
            }
            // Member expressions appear as for-in/of heads; they bind
            // nothing.
            _ => {}
        }
    }
}

// =============================================================================
// Phase 3: apply renames
// =============================================================================

struct Renamer<'a> {
    ast: &'a mut Ast,
    tree: &'a ScopeTree,
}

impl Renamer<'_> {
    fn walk(&mut self, node: NodeId, scope: usize) {
        if self.ast.is_ignored(node) {
            return;
        }
        let scope = self.tree.scope_of.get(&node).copied().unwrap_or(scope);
        match self.ast.kind(node).clone() {
            NodeKind::Ident { name } => {
                if let Some(renamed) = self.tree.resolve(scope, &name) {
                    self.ast.set_kind(node, NodeKind::Ident { name: renamed });
                }
            }
            NodeKind::Member { object, property, computed, .. } => {
                self.walk(object, scope);
                if computed {
                    self.walk(property, scope);
                }
            }
            NodeKind::Property { key, value, computed, .. } => {
                if computed {
                    self.walk(key, scope);
                }
                self.walk(value, scope);
            }
            NodeKind::MethodDef { key, value, computed, .. } => {
                if computed {
                    self.walk(key, scope);
                }
                self.walk(value, scope);
            }
            NodeKind::PropertyDef { key, value, computed, .. } => {
                if computed {
                    self.walk(key, scope);
                }
                if let Some(value) = value {
                    self.walk(value, scope);
                }
            }
            NodeKind::MetaProperty { .. } => {}
            _ => {
                for child in self.ast.children(node) {
                    self.walk(child, scope);
                }
            }
        }
    }
}

// =============================================================================
// The transformer
// =============================================================================

pub struct IdentifierRenamer {
    rename_globals: bool,
    reserved: FxHashSet<String>,
}

impl IdentifierRenamer {
    pub fn new(rename_globals: bool, reserved_names: &[String]) -> Self {
        Self {
            rename_globals,
            reserved: reserved_names.iter().cloned().collect(),
        }
    }

    fn has_exports(ast: &Ast) -> bool {
        ast.program_body().iter().any(|&stmt| {
            matches!(
                ast.kind(stmt),
                NodeKind::ExportNamed { .. }
                    | NodeKind::ExportDefault { .. }
                    | NodeKind::ExportDecl { .. }
                    | NodeKind::ExportAll { .. }
            )
        })
    }

    fn assign(&self, tree: &mut ScopeTree, cx: &mut TransformContext, keep_module: bool) {
        let mut used: FxHashSet<String> = FxHashSet::default();
        for index in 0..tree.scopes.len() {
            let scope = &tree.scopes[index];
            if scope.poisoned {
                continue;
            }
            if scope.kind == ScopeKind::Module && keep_module {
                continue;
            }
            let bindings = scope.bindings.clone();
            for name in bindings {
                if self.reserved.contains(&name) {
                    continue;
                }
                let renamed = loop {
                    let ident_len = 4 + cx.prng.below(3);
                    let candidate = cx.prng.hex_ident(ident_len);
                    if used.insert(candidate.clone()) {
                        break candidate;
                    }
                };
                tree.scopes[index].renames.insert(name, renamed);
            }
        }
    }
}

impl Transformer for IdentifierRenamer {
    fn name(&self) -> TransformerName {
        TransformerName::IdentifierRenamer
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::RenameIdentifiers).then_some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        // The whole rename runs off the program node; everything below is
        // reached by the phase walkers rather than the engine.
        if node != ast.root {
            return Ok(VisitAction::Keep);
        }

        let mut collector = Collector::new(ast);
        for &stmt in &ast.program_body().to_vec() {
            collector.walk(stmt, 0);
        }
        let mut tree = collector.tree;

        let keep_module = !self.rename_globals || Self::has_exports(ast);
        self.assign(&mut tree, cx, keep_module);

        let mut renamer = Renamer { ast, tree: &tree };
        let body = renamer.ast.program_body().to_vec();
        for stmt in body {
            renamer.walk(stmt, 0);
        }
        Ok(VisitAction::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use murk_parser::{parse, Codegen, CodegenOptions};

    fn rename(source: &str, rename_globals: bool) -> String {
        let mut ast = parse(source).unwrap();
        let root = ast.root;
        let mut renamer = IdentifierRenamer::new(rename_globals, &[]);
        let mut cx = TransformContext::new(Options::default().with_seed(17));
        renamer
            .enter(NodeStage::RenameIdentifiers, &mut cx, &mut ast, root, None)
            .unwrap();
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        code
    }

    #[test]
    fn test_locals_renamed_globals_kept() {
        let code = rename("function f(longParam) { var inner = longParam; return inner; }", false);
        assert!(code.contains("function f("));
        assert!(!code.contains("longParam"));
        assert!(!code.contains("inner"));
    }

    #[test]
    fn test_top_level_renaming_opt_in() {
        let kept = rename("var myVariable = 1; use(myVariable);", false);
        assert!(kept.contains("myVariable"));

        let renamed = rename("var myVariable = 1; use(myVariable);", true);
        assert!(!renamed.contains("myVariable"));
        // The global `use` is a free reference and survives.
        assert!(renamed.contains("use("));
    }

    #[test]
    fn test_var_hoisting_consistent() {
        let code = rename(
            "function f() { if (c) { var hoisted = 1; } return hoisted; }",
            false,
        );
        assert!(!code.contains("hoisted"));
        // Both occurrences share one rename.
        let name = code.split("var ").nth(1).unwrap().split('=').next().unwrap().to_string();
        assert_eq!(code.matches(name.as_str()).count(), 2);
    }

    #[test]
    fn test_properties_and_globals_untouched() {
        let code = rename(
            "function f() { var x = 1; console.log(x); return { myProp: x }.myProp; }",
            false,
        );
        assert!(code.contains("console.log"));
        assert!(code.contains("myProp"));
        assert!(!code.contains("var x"));
    }

    #[test]
    fn test_eval_poisons_scope() {
        let code = rename("function f() { var secret = 1; eval('secret'); return secret; }", false);
        assert!(code.contains("secret"));
    }

    #[test]
    fn test_with_poisons_scope() {
        let code = rename("function f(o) { var a = 1; with (o) { use(a); } return a; }", false);
        assert!(code.contains("var a"));
    }

    #[test]
    fn test_shorthand_expands_on_rename() {
        let code = rename("function f() { let foo = 1; return { foo }; }", false);
        assert!(code.contains("{foo:_0x"));
    }

    #[test]
    fn test_destructuring_keys_kept_bindings_renamed() {
        let code = rename("function f(o) { const { alpha } = o; return alpha; }", false);
        assert!(code.contains("alpha:"));
        assert_eq!(code.matches("alpha").count(), 1);
    }

    #[test]
    fn test_exports_disable_global_rename() {
        let code = rename("var shared = 1; export { shared };", true);
        assert!(code.contains("shared"));
    }

    #[test]
    fn test_catch_param_renamed() {
        let code = rename("function f() { try { g(); } catch (err) { return err; } }", false);
        assert!(!code.contains("err"));
    }

    #[test]
    fn test_nested_scopes_independent() {
        let code = rename("function a() { var x = 1; return x; } function b() { var x = 2; return x; }", false);
        assert!(!code.contains("var x"));
    }
}
