//! Escape-sequence encoding in the finalizing stage.
//!
//! Every string literal is re-emitted as a fully escaped `\x`/`\u` form
//! through the verbatim marker: `'get'` → `'\x67\x65\x74'`. Runs after the
//! string-array stage, so the extracted pool is encoded too.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind};

#[derive(Debug, Default)]
pub struct EscapeSequenceEncoder;

impl EscapeSequenceEncoder {
    pub fn new() -> Self {
        Self
    }
}

/// Quote `value` with every character escaped.
pub fn escape_all(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 4 + 2);
    out.push('\'');
    for c in value.chars() {
        let code = c as u32;
        if code < 0x100 {
            out.push_str(&format!("\\x{code:02x}"));
        } else if code <= 0xffff {
            out.push_str(&format!("\\u{code:04x}"));
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", *unit));
            }
        }
    }
    out.push('\'');
    out
}

impl Transformer for EscapeSequenceEncoder {
    fn name(&self) -> TransformerName {
        TransformerName::EscapeSequenceEncoder
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::Finalizing).then_some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        _cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        // Directive-position strings must keep their exact source text to
        // stay directives (`'\x75se strict'` enables nothing).
        if parent.is_some_and(|p| matches!(ast.kind(p), NodeKind::ExprStmt { .. })) {
            return Ok(VisitAction::Keep);
        }
        if ast.verbatim(node).is_none() {
            if let NodeKind::Str(value) = ast.kind(node) {
                let escaped = escape_all(value);
                ast.set_verbatim(node, escaped);
            }
        }
        Ok(VisitAction::Keep)
    }
}
