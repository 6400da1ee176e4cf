//! Dead-code injection.
//!
//! Eligible blocks receive an `if` statement guarded by an opaque predicate
//! that compares two distinct random strings, so the branch body never
//! runs. The bogus body is synthesized from a small statement catalog with
//! randomized names and values; later stages obfuscate the dead code just
//! like live code, which is what makes it blend in.
//!
//! Only blocks that came from the source (non-empty span) are targets, so
//! injected bodies are never injected into again.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, BinaryOp, NodeId, NodeKind};

/// Upper bound on injections per call, so pathological inputs cannot grow
/// without limit.
const MAX_INJECTIONS: usize = 32;

pub struct DeadCodeInjector {
    threshold: f64,
    injected: usize,
}

impl DeadCodeInjector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, injected: 0 }
    }

    /// `'<a>' === '<b>'` with guaranteed-distinct operands.
    fn opaque_predicate(ast: &mut Ast, cx: &mut TransformContext) -> NodeId {
        let left = cx.prng.hex_string(5);
        let mut right = cx.prng.hex_string(5);
        if right == left {
            right.push('x');
        }
        let left = ast.synth(NodeKind::Str(left));
        let right = ast.synth(NodeKind::Str(right));
        ast.synth(NodeKind::Binary { op: BinaryOp::StrictEq, left, right })
    }

    /// One bogus statement from the catalog.
    fn bogus_stmt(ast: &mut Ast, cx: &mut TransformContext) -> NodeId {
        match cx.prng.below(3) {
            0 => {
                // var <name> = <number>;
                let ident = ast.synth(NodeKind::Ident { name: cx.prng.hex_ident(4) });
                let value = ast.synth(NodeKind::Num(cx.prng.below(0xffff) as f64));
                let declarator =
                    ast.synth(NodeKind::VarDeclarator { id: ident, init: Some(value) });
                ast.synth(NodeKind::VarDecl {
                    kind: murk_parser::VarKind::Var,
                    decls: vec![declarator],
                })
            }
            1 => {
                // console.log('<hex>');
                let console = ast.synth(NodeKind::Ident { name: "console".into() });
                let log = ast.synth(NodeKind::Ident { name: "log".into() });
                let callee = ast.synth(NodeKind::Member {
                    object: console,
                    property: log,
                    computed: false,
                    optional: false,
                });
                let arg = ast.synth(NodeKind::Str(cx.prng.hex_string(8)));
                let call =
                    ast.synth(NodeKind::Call { callee, args: vec![arg], optional: false });
                ast.synth(NodeKind::ExprStmt { expr: call })
            }
            _ => {
                // <name>(<number>);
                let callee = ast.synth(NodeKind::Ident { name: cx.prng.hex_ident(4) });
                let arg = ast.synth(NodeKind::Num(cx.prng.below(0xff) as f64));
                let call =
                    ast.synth(NodeKind::Call { callee, args: vec![arg], optional: false });
                ast.synth(NodeKind::ExprStmt { expr: call })
            }
        }
    }
}

impl Transformer for DeadCodeInjector {
    fn name(&self) -> TransformerName {
        TransformerName::DeadCodeInjector
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::DeadCodeInjection).then_some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let NodeKind::Block { body } = ast.kind(node) else {
            return Ok(VisitAction::Keep);
        };
        if body.is_empty() || ast.span(node).is_empty() || self.injected >= MAX_INJECTIONS {
            return Ok(VisitAction::Keep);
        }
        let mut body = body.clone();
        if !cx.prng.chance(self.threshold) {
            return Ok(VisitAction::Keep);
        }

        let test = Self::opaque_predicate(ast, cx);
        let count = 1 + cx.prng.below(3);
        let dead: Vec<NodeId> = (0..count).map(|_| Self::bogus_stmt(ast, cx)).collect();
        let dead_block = ast.synth(NodeKind::Block { body: dead });
        let guard = ast.synth(NodeKind::If { test, consequent: dead_block, alternate: None });

        let at = cx.prng.below(body.len() + 1);
        body.insert(at, guard);
        self.injected += 1;
        Ok(VisitAction::Replace(NodeKind::Block { body }))
    }
}
