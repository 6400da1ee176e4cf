//! The traversal engine.
//!
//! Depth-first, replacement-capable walk over the arena AST with an explicit
//! work stack, so deeply nested inputs cannot overflow the call stack.
//!
//! The engine makes three promises:
//! - every node whose subtree is not pruned gets exactly one enter and one
//!   leave per traversal;
//! - a node with the `ignored` flag set is never visited, nor is anything
//!   below it;
//! - a replacement applied during enter is what descent and leave observe,
//!   because replacement overwrites the node's arena slot in place.

use crate::error::Error;
use murk_parser::{Ast, NodeId, NodeKind};

/// What a transformer wants done with the current node.
#[derive(Debug, Clone, PartialEq)]
pub enum VisitAction {
    /// No change.
    Keep,
    /// Overwrite the node's kind in place (id and span are retained).
    Replace(NodeKind),
    /// Do not descend below this node. Its own leave hook still runs.
    SkipSubtree,
    /// Terminate the whole traversal.
    Abort,
}

/// Engine-level control flow after a fused callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Skip,
    Abort,
}

/// A fused enter/leave pair driving one traversal.
pub trait NodeVisitor {
    fn enter(&mut self, ast: &mut Ast, node: NodeId, parent: Option<NodeId>)
        -> Result<Flow, Error>;
    fn leave(&mut self, ast: &mut Ast, node: NodeId, parent: Option<NodeId>)
        -> Result<Flow, Error>;
}

enum Frame {
    Enter(NodeId, Option<NodeId>),
    Leave(NodeId, Option<NodeId>),
}

/// Walk the tree rooted at `root`, dispatching enter/leave on the visitor.
pub fn replace<V: NodeVisitor>(ast: &mut Ast, root: NodeId, visitor: &mut V) -> Result<(), Error> {
    let mut stack = vec![Frame::Enter(root, None)];
    let mut children = Vec::new();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node, parent) => {
                if ast.is_ignored(node) {
                    continue;
                }
                match visitor.enter(ast, node, parent)? {
                    Flow::Abort => return Ok(()),
                    Flow::Skip => {
                        stack.push(Frame::Leave(node, parent));
                    }
                    Flow::Continue => {
                        stack.push(Frame::Leave(node, parent));
                        // Children are read after enter so a replacement's
                        // subtree is the one descended into.
                        children.clear();
                        ast.push_children(node, &mut children);
                        for &child in children.iter().rev() {
                            stack.push(Frame::Enter(child, Some(node)));
                        }
                    }
                }
            }
            Frame::Leave(node, parent) => {
                if let Flow::Abort = visitor.leave(ast, node, parent)? {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use murk_parser::parse;
    use rustc_hash::FxHashMap;

    /// Counts enter/leave per node and optionally reacts at a chosen kind.
    struct Probe {
        enters: FxHashMap<NodeId, usize>,
        leaves: FxHashMap<NodeId, usize>,
        on_num_enter: Option<VisitAction>,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                enters: FxHashMap::default(),
                leaves: FxHashMap::default(),
                on_num_enter: None,
            }
        }
    }

    impl NodeVisitor for Probe {
        fn enter(
            &mut self,
            ast: &mut Ast,
            node: NodeId,
            _parent: Option<NodeId>,
        ) -> Result<Flow, Error> {
            *self.enters.entry(node).or_default() += 1;
            if matches!(ast.kind(node), NodeKind::Num(_)) {
                match self.on_num_enter.take() {
                    Some(VisitAction::Replace(kind)) => {
                        ast.set_kind(node, kind);
                        return Ok(Flow::Continue);
                    }
                    Some(VisitAction::SkipSubtree) => return Ok(Flow::Skip),
                    Some(VisitAction::Abort) => return Ok(Flow::Abort),
                    _ => {}
                }
            }
            Ok(Flow::Continue)
        }

        fn leave(
            &mut self,
            _ast: &mut Ast,
            node: NodeId,
            _parent: Option<NodeId>,
        ) -> Result<Flow, Error> {
            *self.leaves.entry(node).or_default() += 1;
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn test_every_node_visited_once() {
        let mut ast = parse("var a = 1; function f(x) { return x + a; }").unwrap();
        let root = ast.root;
        let mut probe = Probe::new();
        replace(&mut ast, root, &mut probe).unwrap();
        assert!(probe.enters.len() > 5);
        assert_eq!(probe.enters.len(), probe.leaves.len());
        assert!(probe.enters.values().all(|&n| n == 1));
        assert!(probe.leaves.values().all(|&n| n == 1));
    }

    #[test]
    fn test_ignored_subtree_unvisited() {
        let mut ast = parse("var a = 1; var b = 2;").unwrap();
        let root = ast.root;
        let second = ast.program_body()[1];
        ast.set_ignored(second, true);
        let ignored: Vec<NodeId> = {
            let mut all = vec![second];
            let mut i = 0;
            while i < all.len() {
                let mut kids = Vec::new();
                ast.push_children(all[i], &mut kids);
                all.extend(kids);
                i += 1;
            }
            all
        };
        let mut probe = Probe::new();
        replace(&mut ast, root, &mut probe).unwrap();
        for id in ignored {
            assert!(!probe.enters.contains_key(&id));
            assert!(!probe.leaves.contains_key(&id));
        }
    }

    #[test]
    fn test_replacement_visible_to_descent() {
        let mut ast = parse("1;").unwrap();
        let root = ast.root;
        let mut probe = Probe::new();
        // Replace the number with a call whose children must then be visited.
        let callee = ast.synth(NodeKind::Ident { name: "f".into() });
        probe.on_num_enter = Some(VisitAction::Replace(NodeKind::Call {
            callee,
            args: vec![],
            optional: false,
        }));
        replace(&mut ast, root, &mut probe).unwrap();
        assert_eq!(probe.enters.get(&callee), Some(&1));
    }

    #[test]
    fn test_skip_subtree_keeps_own_leave() {
        let mut ast = parse("f(1 + 2);").unwrap();
        let root = ast.root;
        let mut probe = Probe::new();
        probe.on_num_enter = Some(VisitAction::SkipSubtree);
        replace(&mut ast, root, &mut probe).unwrap();
        // The skipped node itself got enter and leave.
        let num = probe
            .enters
            .keys()
            .copied()
            .find(|&id| matches!(ast.kind(id), NodeKind::Num(_)))
            .unwrap();
        assert_eq!(probe.leaves.get(&num), Some(&1));
    }

    #[test]
    fn test_abort_terminates_walk() {
        let mut ast = parse("1; 2; 3;").unwrap();
        let root = ast.root;
        let mut probe = Probe::new();
        probe.on_num_enter = Some(VisitAction::Abort);
        replace(&mut ast, root, &mut probe).unwrap();
        // Only the program, the first statement and the first number ran.
        assert_eq!(probe.enters.len(), 3);
    }

    #[test]
    fn test_deeply_nested_tree_does_not_overflow() {
        // Built directly so the depth exercises the engine, not the parser.
        let mut ast = murk_parser::Ast::new(String::new());
        let mut expr = ast.synth(NodeKind::Num(1.0));
        for _ in 0..100_000 {
            expr = ast.synth(NodeKind::Unary { op: murk_parser::UnaryOp::Not, arg: expr });
        }
        let stmt = ast.synth(NodeKind::ExprStmt { expr });
        let root = ast.synth(NodeKind::Program { body: vec![stmt] });
        ast.root = root;
        let mut probe = Probe::new();
        replace(&mut ast, root, &mut probe).unwrap();
        assert_eq!(probe.enters.len(), 100_003);
    }
}
