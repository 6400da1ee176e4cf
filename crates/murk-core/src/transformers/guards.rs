//! Comment-directive guards.
//!
//! A `murk-disable` comment opens a disabled region and a `murk-enable`
//! comment closes it again; a disable with no matching enable runs to the
//! end of the file. Every node that starts inside a disabled region is
//! flagged ignored: no visitor in this or any later stage sees it or its
//! subtree, so the code survives obfuscation untouched.
//!
//! The regions are computed once per stage from the comment list, before
//! the traversal runs.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId};

const DISABLE_DIRECTIVE: &str = "murk-disable";
const ENABLE_DIRECTIVE: &str = "murk-enable";

#[derive(Debug, Default)]
pub struct ObfuscationGuards {
    /// Half-open disabled byte ranges, in source order.
    disabled: Vec<(u32, u32)>,
}

impl ObfuscationGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_disabled(&self, offset: u32) -> bool {
        self.disabled.iter().any(|&(start, end)| offset >= start && offset < end)
    }
}

impl Transformer for ObfuscationGuards {
    fn name(&self) -> TransformerName {
        TransformerName::ObfuscationGuards
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::Initializing).then_some(Subscription::ENTER)
    }

    fn prepare(&mut self, _stage: NodeStage, _cx: &mut TransformContext, ast: &mut Ast) {
        self.disabled.clear();
        let mut open: Option<u32> = None;
        for comment in &ast.comments {
            if comment.text.contains(ENABLE_DIRECTIVE) {
                if let Some(start) = open.take() {
                    self.disabled.push((start, comment.span.start));
                }
            } else if comment.text.contains(DISABLE_DIRECTIVE) && open.is_none() {
                open = Some(comment.span.end);
            }
        }
        if let Some(start) = open {
            self.disabled.push((start, u32::MAX));
        }
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        _cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let span = ast.span(node);
        if !span.is_empty() && self.is_disabled(span.start) {
            ast.set_ignored(node, true);
            return Ok(VisitAction::SkipSubtree);
        }
        Ok(VisitAction::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use murk_parser::parse;

    fn mark(source: &str) -> (Ast, Vec<NodeId>) {
        let mut ast = parse(source).unwrap();
        let body = ast.program_body().to_vec();
        let mut guards = ObfuscationGuards::new();
        let mut cx = TransformContext::new(Options::default());
        guards.prepare(NodeStage::Initializing, &mut cx, &mut ast);
        let root = ast.root;
        for &stmt in &body {
            guards
                .enter(NodeStage::Initializing, &mut cx, &mut ast, stmt, Some(root))
                .unwrap();
        }
        (ast, body)
    }

    #[test]
    fn test_directive_marks_node_ignored() {
        let (ast, body) =
            mark("var a = 1;\n/* murk-disable */\nfunction f() {}\nvar b = 2;");
        assert!(!ast.is_ignored(body[0]));
        assert!(ast.is_ignored(body[1]));
        // No enable directive: the region runs to the end of the file.
        assert!(ast.is_ignored(body[2]));
    }

    #[test]
    fn test_enable_closes_the_region() {
        let (ast, body) = mark(
            "var a = 1;\n/* murk-disable */\nfunction f() {}\n/* murk-enable */\nvar b = 2;",
        );
        assert!(!ast.is_ignored(body[0]));
        assert!(ast.is_ignored(body[1]));
        assert!(!ast.is_ignored(body[2]));
    }

    #[test]
    fn test_regions_can_reopen() {
        let (ast, body) = mark(
            "// murk-disable\na();\n// murk-enable\nb();\n// murk-disable\nc();",
        );
        assert!(ast.is_ignored(body[0]));
        assert!(!ast.is_ignored(body[1]));
        assert!(ast.is_ignored(body[2]));
    }

    #[test]
    fn test_stray_enable_is_inert() {
        let (ast, body) = mark("/* murk-enable */\nvar a = 1;");
        assert!(!ast.is_ignored(body[0]));
    }

    #[test]
    fn test_unrelated_comment_keeps_node() {
        let (ast, body) = mark("// just a note\nvar a = 1;");
        assert!(!ast.is_ignored(body[0]));
    }
}
