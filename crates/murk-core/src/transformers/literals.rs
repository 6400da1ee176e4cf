//! Literal obfuscation in the converting stage.
//!
//! - `true` / `false` become `!![]` / `![]`.
//! - Non-negative integer literals are re-emitted as hex (`31` → `0x1f`)
//!   through the verbatim marker, leaving the numeric value in the tree.
//! - Template literals become string concatenation chains, so the
//!   string-array stage sees their pieces as plain literals.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp};

const HEX_LIMIT: f64 = 4_294_967_295.0;

#[derive(Debug, Default)]
pub struct LiteralConverter;

impl LiteralConverter {
    pub fn new() -> Self {
        Self
    }

    /// `![]` (false) or `!![]` (true).
    fn bool_kind(ast: &mut Ast, value: bool) -> NodeKind {
        let array = ast.synth(NodeKind::Array { elements: vec![] });
        if value {
            let inner = ast.synth(NodeKind::Unary { op: UnaryOp::Not, arg: array });
            NodeKind::Unary { op: UnaryOp::Not, arg: inner }
        } else {
            NodeKind::Unary { op: UnaryOp::Not, arg: array }
        }
    }

    /// Fold quasis and substitutions into `'' + a + '…' + b …`.
    fn concat_kind(ast: &mut Ast, quasis: &[String], exprs: &[NodeId]) -> NodeKind {
        if exprs.is_empty() {
            return NodeKind::Str(quasis.first().cloned().unwrap_or_default());
        }
        let mut acc = ast.synth(NodeKind::Str(quasis[0].clone()));
        for (i, &expr) in exprs.iter().enumerate() {
            acc = ast.synth(NodeKind::Binary { op: BinaryOp::Add, left: acc, right: expr });
            let quasi = &quasis[i + 1];
            if !quasi.is_empty() {
                let piece = ast.synth(NodeKind::Str(quasi.clone()));
                acc = ast.synth(NodeKind::Binary { op: BinaryOp::Add, left: acc, right: piece });
            }
        }
        ast.kind(acc).clone()
    }
}

impl Transformer for LiteralConverter {
    fn name(&self) -> TransformerName {
        TransformerName::LiteralConverter
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::MemberAccessConverter]
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
        parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        match ast.kind(node).clone() {
            NodeKind::Bool(value) => Ok(VisitAction::Replace(Self::bool_kind(ast, value))),
            NodeKind::Num(value) => {
                if value >= 0.0 && value.fract() == 0.0 && value <= HEX_LIMIT {
                    ast.set_verbatim(node, format!("0x{:x}", value as u64));
                }
                Ok(VisitAction::Keep)
            }
            NodeKind::Template { quasis, exprs } => {
                // Tagged templates receive the quasi object, not a string;
                // they must keep their literal.
                if parent.is_some_and(|p| {
                    matches!(ast.kind(p), NodeKind::TaggedTemplate { .. })
                }) {
                    return Ok(VisitAction::Keep);
                }
                Ok(VisitAction::Replace(Self::concat_kind(ast, &quasis, &exprs)))
            }
            _ => Ok(VisitAction::Keep),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use murk_parser::{parse, Codegen, CodegenOptions};

    fn convert_expr(source: &str) -> (Ast, NodeId, VisitAction) {
        let mut ast = parse(source).unwrap();
        let NodeKind::ExprStmt { expr } = *ast.kind(ast.program_body()[0]) else { panic!() };
        let mut converter = LiteralConverter::new();
        let mut cx = TransformContext::new(Options::default());
        let action = converter
            .enter(NodeStage::Converting, &mut cx, &mut ast, expr, None)
            .unwrap();
        (ast, expr, action)
    }

    #[test]
    fn test_booleans() {
        let (mut ast, expr, action) = convert_expr("true;");
        let VisitAction::Replace(kind) = action else { panic!() };
        ast.set_kind(expr, kind);
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        assert_eq!(code, "!![]");

        let (mut ast, expr, action) = convert_expr("false;");
        let VisitAction::Replace(kind) = action else { panic!() };
        ast.set_kind(expr, kind);
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        assert_eq!(code, "![]");
    }

    #[test]
    fn test_integer_goes_hex() {
        let (ast, expr, action) = convert_expr("31;");
        assert_eq!(action, VisitAction::Keep);
        assert_eq!(ast.verbatim(expr), Some("0x1f"));
    }

    #[test]
    fn test_float_untouched() {
        let (ast, expr, _) = convert_expr("1.5;");
        assert_eq!(ast.verbatim(expr), None);
    }

    #[test]
    fn test_template_to_concat() {
        let (mut ast, expr, action) = convert_expr("`a${x}b`;");
        let VisitAction::Replace(kind) = action else { panic!() };
        ast.set_kind(expr, kind);
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        assert_eq!(code, "'a'+x+'b'");
    }

    #[test]
    fn test_template_without_subs() {
        let (mut ast, expr, action) = convert_expr("`plain`;");
        let VisitAction::Replace(kind) = action else { panic!() };
        ast.set_kind(expr, kind);
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        assert_eq!(code, "'plain'");
    }
}
