//! Property renaming (unsafe mode).
//!
//! Renames property keys globally and consistently: object literal keys,
//! class member keys, dot accesses and destructuring keys all move to the
//! same replacement name, so a self-contained program keeps working.
//! Programs that exchange objects with outside code will break; this is
//! inherently an opt-in pass.
//!
//! Built-in protocol names (prototype machinery, promise hooks, well-known
//! methods) and user-reserved names are never touched.

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind};
use rustc_hash::{FxHashMap, FxHashSet};

const BUILTIN_RESERVED: &[&str] = &[
    "apply",
    "arguments",
    "bind",
    "call",
    "catch",
    "constructor",
    "default",
    "done",
    "exports",
    "finally",
    "hasOwnProperty",
    "length",
    "message",
    "name",
    "next",
    "prototype",
    "then",
    "toString",
    "value",
    "valueOf",
    "__proto__",
];

pub struct PropertyRenamer {
    enabled: bool,
    reserved: FxHashSet<String>,
    renames: FxHashMap<String, String>,
}

impl PropertyRenamer {
    pub fn new(enabled: bool, reserved_names: &[String]) -> Self {
        let mut reserved: FxHashSet<String> =
            BUILTIN_RESERVED.iter().map(|s| (*s).to_string()).collect();
        reserved.extend(reserved_names.iter().cloned());
        Self { enabled, reserved, renames: FxHashMap::default() }
    }

    fn rename(&mut self, cx: &mut TransformContext, name: &str) -> Option<String> {
        if self.reserved.contains(name) {
            return None;
        }
        if let Some(renamed) = self.renames.get(name) {
            return Some(renamed.clone());
        }
        let renamed = cx.prng.hex_ident(4);
        self.renames.insert(name.to_string(), renamed.clone());
        Some(renamed)
    }

    /// Rename a non-computed key node (`Ident` or `Str`).
    fn rename_key(&mut self, cx: &mut TransformContext, ast: &mut Ast, key: NodeId) {
        let new_kind = match ast.kind(key) {
            NodeKind::Ident { name } => {
                self.rename(cx, name).map(|n| NodeKind::Ident { name: n })
            }
            NodeKind::Str(value) => self.rename(cx, value).map(NodeKind::Str),
            _ => None,
        };
        if let Some(kind) = new_kind {
            ast.set_kind(key, kind);
        }
    }
}

impl Transformer for PropertyRenamer {
    fn name(&self) -> TransformerName {
        TransformerName::PropertyRenamer
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::Parentifier]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (self.enabled && stage == NodeStage::RenameProperties).then_some(Subscription::ENTER)
    }

    fn enter(
        &mut self,
        _stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        match ast.kind(node).clone() {
            NodeKind::Property { key, computed: false, .. } => {
                // Shorthand properties stay correct: the generator expands
                // the shorthand once key and bound name diverge.
                self.rename_key(cx, ast, key);
            }
            NodeKind::MethodDef { key, computed: false, kind, .. } => {
                if kind != murk_parser::MethodKind::Constructor {
                    self.rename_key(cx, ast, key);
                }
            }
            NodeKind::PropertyDef { key, computed: false, .. } => {
                self.rename_key(cx, ast, key);
            }
            NodeKind::Member { property, computed: false, .. } => {
                if let NodeKind::Ident { name } = ast.kind(property).clone() {
                    if let Some(renamed) = self.rename(cx, &name) {
                        ast.set_kind(property, NodeKind::Ident { name: renamed });
                    }
                }
            }
            _ => {}
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

    struct Solo<'a>(&'a mut PropertyRenamer, &'a mut TransformContext);

    impl NodeVisitor for Solo<'_> {
        fn enter(
            &mut self,
            ast: &mut Ast,
            node: NodeId,
            parent: Option<NodeId>,
        ) -> Result<Flow, crate::error::Error> {
            self.0
                .enter(NodeStage::RenameProperties, self.1, ast, node, parent)
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
        let mut renamer = PropertyRenamer::new(true, &[]);
        let mut cx = TransformContext::new(Options::default().with_seed(3));
        replace(&mut ast, root, &mut Solo(&mut renamer, &mut cx)).unwrap();
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        code
    }

    #[test]
    fn test_consistent_rename_across_sites() {
        let code = run("var o = { speed: 1 }; f(o.speed); o.speed = 2;");
        assert!(!code.contains("speed"));
        // One rename used at all three sites.
        let renamed = code.split("_0x").nth(1).unwrap()[..4].to_string();
        assert_eq!(code.matches(&format!("_0x{renamed}")).count(), 3);
    }

    #[test]
    fn test_builtins_kept() {
        let code = run("a.prototype.go = 1; p.then(f); x.length;");
        assert!(code.contains("prototype"));
        assert!(code.contains("then"));
        assert!(code.contains("length"));
        assert!(!code.contains(".go"));
    }

    #[test]
    fn test_computed_keys_untouched() {
        let code = run("o[key]; var p = { [k]: 1 };");
        assert!(code.contains("o[key]"));
        assert!(code.contains("[k]:"));
    }

    #[test]
    fn test_user_reserved() {
        let mut ast = parse("o.api = 1;").unwrap();
        let root = ast.root;
        let mut renamer = PropertyRenamer::new(true, &["api".to_string()]);
        let mut cx = TransformContext::new(Options::default().with_seed(3));
        replace(&mut ast, root, &mut Solo(&mut renamer, &mut cx)).unwrap();
        let (code, _) = Codegen::new(&ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        assert_eq!(code, "o.api=1");
    }
}
