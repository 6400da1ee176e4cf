//! String array extraction.
//!
//! Eligible string literals are pooled into one array declaration injected
//! after the program's directive prologue; each literal becomes an indexed
//! access into the pool. The pool is shuffled at stage end and every
//! recorded index access is rewritten to match, so the array order carries
//! no trace of source order.
//!
//! Ineligible positions: directive-prologue strings, non-computed property
//! keys, and import/export sources (all of which must stay literal).

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind, VarKind};
use rustc_hash::FxHashMap;

pub struct StringArrayTransformer {
    enabled: bool,
    threshold: f64,
    array_name: String,
    /// Pool of extracted values, in first-appearance order.
    items: Vec<String>,
    index_of: FxHashMap<String, usize>,
    /// Index nodes to rewrite after the stage-end shuffle.
    index_nodes: Vec<(NodeId, usize)>,
}

impl StringArrayTransformer {
    pub fn new(enabled: bool, threshold: f64) -> Self {
        Self {
            enabled,
            threshold,
            array_name: String::new(),
            items: Vec::new(),
            index_of: FxHashMap::default(),
            index_nodes: Vec::new(),
        }
    }

    fn eligible(ast: &Ast, node: NodeId, parent: Option<NodeId>) -> bool {
        let Some(parent) = parent else { return false };
        match ast.kind(parent) {
            // Directive prologues and plain string statements stay literal.
            NodeKind::ExprStmt { .. } => false,
            // Non-computed keys must stay literal; computed ones are fine.
            NodeKind::Property { key, computed, .. } => *computed || *key != node,
            NodeKind::MethodDef { key, computed, .. }
            | NodeKind::PropertyDef { key, computed, .. } => *computed || *key != node,
            NodeKind::ImportDecl { .. } | NodeKind::ExportNamed { .. }
            | NodeKind::ExportAll { .. } => false,
            _ => true,
        }
    }
}

impl Transformer for StringArrayTransformer {
    fn name(&self) -> TransformerName {
        TransformerName::StringArrayTransformer
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (self.enabled && stage == NodeStage::StringArray).then_some(Subscription::ENTER)
    }

    fn prepare(&mut self, _stage: NodeStage, cx: &mut TransformContext, _ast: &mut Ast) {
        self.array_name = cx.prng.hex_ident(6);
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let NodeKind::Str(value) = ast.kind(node) else {
            return Ok(VisitAction::Keep);
        };
        if !Self::eligible(ast, node, parent) {
            return Ok(VisitAction::Keep);
        }
        let value = value.clone();
        // First appearance decides; repeats always share the pool slot.
        let index = match self.index_of.get(&value) {
            Some(&index) => index,
            None => {
                if !cx.prng.chance(self.threshold) {
                    return Ok(VisitAction::Keep);
                }
                let index = self.items.len();
                self.items.push(value.clone());
                self.index_of.insert(value, index);
                index
            }
        };

        let object = ast.synth(NodeKind::Ident { name: self.array_name.clone() });
        let property = ast.synth(NodeKind::Num(index as f64));
        self.index_nodes.push((property, index));
        Ok(VisitAction::Replace(NodeKind::Member {
            object,
            property,
            computed: true,
            optional: false,
        }))
    }

    fn finalize(&mut self, _stage: NodeStage, cx: &mut TransformContext, ast: &mut Ast) {
        if self.items.is_empty() {
            return;
        }

        // Shuffle the pool and remap every recorded access.
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        cx.prng.shuffle(&mut order);
        let mut position = vec![0usize; order.len()];
        for (new_index, &old_index) in order.iter().enumerate() {
            position[old_index] = new_index;
        }
        for &(node, old_index) in &self.index_nodes {
            ast.set_kind(node, NodeKind::Num(position[old_index] as f64));
        }

        let elements: Vec<Option<NodeId>> = order
            .iter()
            .map(|&old_index| Some(ast.synth(NodeKind::Str(self.items[old_index].clone()))))
            .collect();
        let array = ast.synth(NodeKind::Array { elements });
        let ident = ast.synth(NodeKind::Ident { name: self.array_name.clone() });
        let declarator = ast.synth(NodeKind::VarDeclarator { id: ident, init: Some(array) });
        let decl = ast.synth(NodeKind::VarDecl { kind: VarKind::Var, decls: vec![declarator] });

        let mut body = ast.program_body().to_vec();
        let insert_at = body
            .iter()
            .take_while(|&&stmt| {
                matches!(ast.kind(stmt), NodeKind::ExprStmt { expr }
                    if matches!(ast.kind(*expr), NodeKind::Str(_)))
            })
            .count();
        body.insert(insert_at, decl);
        let root = ast.root;
        ast.set_kind(root, NodeKind::Program { body });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::visit::{replace, Flow, NodeVisitor};
    use murk_parser::{parse, Codegen, CodegenOptions};

    struct Solo<'a>(&'a mut StringArrayTransformer, &'a mut TransformContext);

    impl NodeVisitor for Solo<'_> {
        fn enter(
            &mut self,
            ast: &mut Ast,
            node: NodeId,
            parent: Option<NodeId>,
        ) -> Result<Flow, crate::error::Error> {
            match self.0.enter(NodeStage::StringArray, self.1, ast, node, parent).unwrap() {
                VisitAction::Replace(kind) => {
                    ast.set_kind(node, kind);
                    Ok(Flow::Continue)
                }
                _ => Ok(Flow::Continue),
            }
        }

        fn leave(
            &mut self,
            _ast: &mut Ast,
            _node: NodeId,
            _parent: Option<NodeId>,
        ) -> Result<Flow, crate::error::Error> {
            Ok(Flow::Continue)
        }
    }

    fn run(source: &str) -> String {
        let mut ast = parse(source).unwrap();
        let root = ast.root;
        let mut transformer = StringArrayTransformer::new(true, 1.0);
        let mut cx = TransformContext::new(Options::default().with_seed(11));
        transformer.prepare(NodeStage::StringArray, &mut cx, &mut ast);
        replace(&mut ast, root, &mut Solo(&mut transformer, &mut cx)).unwrap();
        transformer.finalize(NodeStage::StringArray, &mut cx, &mut ast);
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        code
    }

    #[test]
    fn test_strings_pooled_and_indexed() {
        let code = run("var a = 'one'; var b = 'two'; var c = 'one';");
        assert!(code.starts_with("var _0x"));
        assert!(code.contains("['one','two']") || code.contains("['two','one']"));
        // Literals replaced by indexed accesses.
        assert_eq!(code.matches("'one'").count(), 1);
        assert_eq!(code.matches("'two'").count(), 1);
    }

    #[test]
    fn test_directives_and_keys_kept() {
        let code = run("'use strict'; var o = { key: 'v' };");
        assert!(code.starts_with("'use strict';"));
        assert!(code.contains("{key:"));
    }

    #[test]
    fn test_pool_declared_after_directives() {
        let code = run("'use strict'; var a = 's';");
        let after = &code["'use strict';".len()..];
        assert!(after.starts_with("var _0x"));
    }
}
