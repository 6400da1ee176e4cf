//! Control-flow flattening.
//!
//! An eligible flat function body
//!
//! ```text
//! function f() { a(); b(); return c(); }
//! ```
//!
//! becomes a shuffled switch-dispatch loop:
//!
//! ```text
//! function f() {
//!   var _0xo = "1|2|0".split("|"), _0xi = 0;
//!   while (!![]) {
//!     switch (_0xo[_0xi++]) {
//!       case "0": return c();
//!       case "1": a(); continue;
//!       case "2": b(); continue;
//!     }
//!     break;
//!   }
//! }
//! ```
//!
//! The statement-to-case assignment is a random permutation; the order
//! string replays the original execution order. Bodies containing
//! declarations, loop-control statements or labels are left alone, as are
//! directive prologues (which stay ahead of the loop).

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind, UnaryOp, UpdateOp, VarKind};

pub struct ControlFlowFlattener {
    enabled: bool,
    threshold: f64,
}

impl ControlFlowFlattener {
    pub fn new(enabled: bool, threshold: f64) -> Self {
        Self { enabled, threshold }
    }

    fn flatten_safe(ast: &Ast, stmt: NodeId) -> bool {
        matches!(
            ast.kind(stmt),
            NodeKind::ExprStmt { .. }
                | NodeKind::VarDecl { .. }
                | NodeKind::Return { .. }
                | NodeKind::Throw { .. }
        )
    }

    /// `!![]`
    fn truthy(ast: &mut Ast) -> NodeId {
        let array = ast.synth(NodeKind::Array { elements: vec![] });
        let inner = ast.synth(NodeKind::Unary { op: UnaryOp::Not, arg: array });
        ast.synth(NodeKind::Unary { op: UnaryOp::Not, arg: inner })
    }

    fn flatten_body(&self, ast: &mut Ast, cx: &mut TransformContext, body_id: NodeId) {
        let NodeKind::Block { body } = ast.kind(body_id).clone() else { return };

        let prologue_len = body
            .iter()
            .take_while(|&&stmt| {
                matches!(ast.kind(stmt), NodeKind::ExprStmt { expr }
                    if matches!(ast.kind(*expr), NodeKind::Str(_)))
            })
            .count();
        let (prologue, rest) = body.split_at(prologue_len);
        if rest.len() < 2 || !rest.iter().all(|&stmt| Self::flatten_safe(ast, stmt)) {
            return;
        }

        // Assign each statement a random case label; the order string
        // replays original execution order.
        let mut labels: Vec<usize> = (0..rest.len()).collect();
        cx.prng.shuffle(&mut labels);
        let mut stmt_with_label = vec![0usize; rest.len()];
        for (stmt_index, &label) in labels.iter().enumerate() {
            stmt_with_label[label] = stmt_index;
        }
        let order = labels
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("|");

        let order_name = cx.prng.hex_ident(6);
        let counter_name = cx.prng.hex_ident(6);

        // var <o> = "<order>".split("|"), <i> = 0;
        let order_str = ast.synth(NodeKind::Str(order));
        let split_name = ast.synth(NodeKind::Ident { name: "split".into() });
        let split_member = ast.synth(NodeKind::Member {
            object: order_str,
            property: split_name,
            computed: false,
            optional: false,
        });
        let separator = ast.synth(NodeKind::Str("|".into()));
        let split_call = ast.synth(NodeKind::Call {
            callee: split_member,
            args: vec![separator],
            optional: false,
        });
        let order_ident = ast.synth(NodeKind::Ident { name: order_name.clone() });
        let order_declarator =
            ast.synth(NodeKind::VarDeclarator { id: order_ident, init: Some(split_call) });
        let counter_ident = ast.synth(NodeKind::Ident { name: counter_name.clone() });
        let zero = ast.synth(NodeKind::Num(0.0));
        let counter_declarator =
            ast.synth(NodeKind::VarDeclarator { id: counter_ident, init: Some(zero) });
        let driver_decl = ast.synth(NodeKind::VarDecl {
            kind: VarKind::Var,
            decls: vec![order_declarator, counter_declarator],
        });

        // switch (<o>[<i>++]) { case "<label>": … }
        let mut cases = Vec::with_capacity(rest.len());
        for (label, &stmt_index) in stmt_with_label.iter().enumerate() {
            let stmt = rest[stmt_index];
            let mut case_body = vec![stmt];
            if !matches!(ast.kind(stmt), NodeKind::Return { .. } | NodeKind::Throw { .. }) {
                case_body.push(ast.synth(NodeKind::Continue { label: None }));
            }
            let test = ast.synth(NodeKind::Str(label.to_string()));
            cases.push(ast.synth(NodeKind::SwitchCase { test: Some(test), body: case_body }));
        }
        let order_ref = ast.synth(NodeKind::Ident { name: order_name });
        let counter_ref = ast.synth(NodeKind::Ident { name: counter_name });
        let bump = ast.synth(NodeKind::Update {
            op: UpdateOp::Increment,
            prefix: false,
            arg: counter_ref,
        });
        let discriminant = ast.synth(NodeKind::Member {
            object: order_ref,
            property: bump,
            computed: true,
            optional: false,
        });
        let switch = ast.synth(NodeKind::Switch { discriminant, cases });
        let exit = ast.synth(NodeKind::Break { label: None });
        let loop_body = ast.synth(NodeKind::Block { body: vec![switch, exit] });
        let test = Self::truthy(ast);
        let dispatch = ast.synth(NodeKind::While { test, body: loop_body });

        let mut new_body = prologue.to_vec();
        new_body.push(driver_decl);
        new_body.push(dispatch);
        ast.set_kind(body_id, NodeKind::Block { body: new_body });
    }
}

impl Transformer for ControlFlowFlattener {
    fn name(&self) -> TransformerName {
        TransformerName::ControlFlowFlattener
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (self.enabled && stage == NodeStage::ControlFlowFlattening)
            .then_some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let body_id = match ast.kind(node) {
            NodeKind::FunctionDecl(parts) | NodeKind::FunctionExpr(parts) => parts.body,
            _ => return Ok(VisitAction::Keep),
        };
        if cx.prng.chance(self.threshold) {
            self.flatten_body(ast, cx, body_id);
        }
        Ok(VisitAction::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::visit::{replace, Flow, NodeVisitor};
    use murk_parser::{parse, Codegen, CodegenOptions};

    struct Solo<'a>(&'a mut ControlFlowFlattener, &'a mut TransformContext);

    impl NodeVisitor for Solo<'_> {
        fn enter(
            &mut self,
            ast: &mut Ast,
            node: NodeId,
            parent: Option<NodeId>,
        ) -> Result<Flow, crate::error::Error> {
            self.0
                .enter(NodeStage::ControlFlowFlattening, self.1, ast, node, parent)
                .unwrap();
            Ok(Flow::Continue)
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
        let mut flattener = ControlFlowFlattener::new(true, 1.0);
        let mut cx = TransformContext::new(Options::default().with_seed(21));
        replace(&mut ast, root, &mut Solo(&mut flattener, &mut cx)).unwrap();
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        code
    }

    #[test]
    fn test_flattens_flat_body() {
        let code = run("function f() { a(); b(); return c(); }");
        assert!(code.contains("switch("));
        assert!(code.contains(".split('|')"));
        assert!(code.contains("while(!![])"));
        assert!(code.contains("return c()"));
        assert!(code.contains("continue"));
    }

    #[test]
    fn test_declarations_block_flattening() {
        let code = run("function f() { a(); function g() {} b(); }");
        assert!(!code.contains("switch("));
    }

    #[test]
    fn test_short_bodies_left_alone() {
        let code = run("function f() { return 1; }");
        assert!(!code.contains("switch("));
    }

    #[test]
    fn test_directive_prologue_stays_first() {
        let code = run("function f() { 'use strict'; a(); b(); }");
        assert!(code.contains("{'use strict';var "));
    }

    #[test]
    fn test_execution_order_encoded() {
        // Whatever the shuffle, the order string must have one entry per
        // statement.
        let code = run("function f() { a(); b(); c(); }");
        let start = code.find("var _0x").unwrap();
        let quote = code[start..].find('\'').unwrap() + start + 1;
        let end = code[quote..].find('\'').unwrap() + quote;
        let order = &code[quote..end];
        let mut keys: Vec<&str> = order.split('|').collect();
        assert_eq!(keys.len(), 3);
        keys.sort_unstable();
        assert_eq!(keys, vec!["0", "1", "2"]);
    }
}
