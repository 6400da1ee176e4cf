//! Parent side-table maintenance.
//!
//! Active in every node stage, always in the first batch, so the parent
//! table is re-established after each stage that rewrites structure.
//! During a traversal the engine also passes the live parent to every hook;
//! the table serves lookups away from the current traversal position.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId};

#[derive(Debug, Default)]
pub struct Parentifier;

impl Parentifier {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for Parentifier {
    fn name(&self) -> TransformerName {
        TransformerName::Parentifier
    }

    fn subscription(&self, _stage: NodeStage) -> Option<Subscription> {
        Some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        _cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        ast.set_parent(node, parent);
        Ok(VisitAction::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::visit::{replace, Flow, NodeVisitor};
    use murk_parser::parse;

    struct Solo(Parentifier, TransformContext);

    impl NodeVisitor for Solo {
        fn enter(
            &mut self,
            ast: &mut Ast,
            node: NodeId,
            parent: Option<NodeId>,
        ) -> Result<Flow, crate::error::Error> {
            self.0.enter(NodeStage::Initializing, &mut self.1, ast, node, parent).unwrap();
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

    #[test]
    fn test_parents_recorded() {
        let mut ast = parse("var a = f(1);").unwrap();
        let root = ast.root;
        let mut solo = Solo(Parentifier::new(), TransformContext::new(Options::default()));
        replace(&mut ast, root, &mut solo).unwrap();

        assert_eq!(ast.parent(root), None);
        let stmt = ast.program_body()[0];
        assert_eq!(ast.parent(stmt), Some(root));
        for child in ast.children(stmt) {
            assert_eq!(ast.parent(child), Some(stmt));
        }
    }
}
