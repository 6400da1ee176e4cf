//! Dot member access to computed string access: `a.b` becomes `a["b"]`.
//!
//! Runs in the converting stage so the string-array stage later sees the
//! property names as ordinary string literals.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind};

#[derive(Debug, Default)]
pub struct MemberAccessConverter;

impl MemberAccessConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for MemberAccessConverter {
    fn name(&self) -> TransformerName {
        TransformerName::MemberAccessConverter
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::Converting).then_some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        _cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let NodeKind::Member { object, property, computed: false, optional } = *ast.kind(node)
        else {
            return Ok(VisitAction::Keep);
        };
        let NodeKind::Ident { name } = ast.kind(property) else {
            return Ok(VisitAction::Keep);
        };
        let name = name.clone();
        ast.set_kind(property, NodeKind::Str(name));
        Ok(VisitAction::Replace(NodeKind::Member {
            object,
            property,
            computed: true,
            optional,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use murk_parser::parse;

    #[test]
    fn test_dot_becomes_computed() {
        let mut ast = parse("a.b;").unwrap();
        let NodeKind::ExprStmt { expr } = *ast.kind(ast.program_body()[0]) else { panic!() };
        let mut converter = MemberAccessConverter::new();
        let mut cx = TransformContext::new(Options::default());
        let action = converter
            .enter(NodeStage::Converting, &mut cx, &mut ast, expr, None)
            .unwrap();
        let VisitAction::Replace(kind) = action else { panic!("expected replacement") };
        let NodeKind::Member { property, computed: true, .. } = kind else { panic!() };
        assert_eq!(ast.kind(property), &NodeKind::Str("b".into()));
    }

    #[test]
    fn test_computed_untouched() {
        let mut ast = parse("a['b'];").unwrap();
        let NodeKind::ExprStmt { expr } = *ast.kind(ast.program_body()[0]) else { panic!() };
        let mut converter = MemberAccessConverter::new();
        let mut cx = TransformContext::new(Options::default());
        let action = converter
            .enter(NodeStage::Converting, &mut cx, &mut ast, expr, None)
            .unwrap();
        assert_eq!(action, VisitAction::Keep);
    }
}
