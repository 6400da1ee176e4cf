//! Statement merging for the simplifying stage.
//!
//! Two transformers, scheduled into consecutive batches:
//! - [`ExpressionStatementsMerger`] folds runs of adjacent expression
//!   statements into one sequence-expression statement;
//! - [`VariableDeclarationsMerger`] (depends on the former) merges adjacent
//!   declarations of the same kind.
//!
//! Both run on leave so nested bodies are merged before their containers,
//! and both skip the directive prologue (`"use strict"` must stay first and
//! alone).

use crate::error::TransformerError;
use crate::stage::NodeStage;
use crate::transformer::{Subscription, TransformContext, Transformer, TransformerName};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId, NodeKind};

/// Index of the first statement past the directive prologue.
fn after_directives(ast: &Ast, body: &[NodeId]) -> usize {
    body.iter()
        .take_while(|&&stmt| {
            matches!(ast.kind(stmt), NodeKind::ExprStmt { expr }
                if matches!(ast.kind(*expr), NodeKind::Str(_)))
        })
        .count()
}

fn statement_body(ast: &Ast, node: NodeId) -> Option<Vec<NodeId>> {
    match ast.kind(node) {
        NodeKind::Program { body } | NodeKind::Block { body } | NodeKind::StaticBlock { body } => {
            Some(body.clone())
        }
        _ => None,
    }
}

fn write_statement_body(ast: &mut Ast, node: NodeId, body: Vec<NodeId>) {
    let kind = match ast.kind(node) {
        NodeKind::Program { .. } => NodeKind::Program { body },
        NodeKind::Block { .. } => NodeKind::Block { body },
        NodeKind::StaticBlock { .. } => NodeKind::StaticBlock { body },
        _ => return,
    };
    ast.set_kind(node, kind);
}

#[derive(Debug, Default)]
pub struct ExpressionStatementsMerger;

impl ExpressionStatementsMerger {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for ExpressionStatementsMerger {
    fn name(&self) -> TransformerName {
        TransformerName::ExpressionStatementsMerger
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::Simplifying).then_some(Subscription::LEAVE)
    }

    fn leave(
        &mut self,
        _stage: NodeStage,
        _cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let Some(body) = statement_body(ast, node) else {
            return Ok(VisitAction::Keep);
        };
        let skip = after_directives(ast, &body);

        let mut merged: Vec<NodeId> = body[..skip].to_vec();
        let mut run: Vec<NodeId> = Vec::new();
        for &stmt in &body[skip..] {
            if matches!(ast.kind(stmt), NodeKind::ExprStmt { .. }) {
                run.push(stmt);
            } else {
                flush_run(ast, &mut merged, &mut run);
                merged.push(stmt);
            }
        }
        flush_run(ast, &mut merged, &mut run);

        if merged.len() != body.len() {
            write_statement_body(ast, node, merged);
        }
        Ok(VisitAction::Keep)
    }
}

/// Collapse a run of expression statements into the first of them.
fn flush_run(ast: &mut Ast, merged: &mut Vec<NodeId>, run: &mut Vec<NodeId>) {
    if run.len() < 2 {
        merged.append(run);
        return;
    }
    let mut exprs = Vec::new();
    for &stmt in run.iter() {
        let NodeKind::ExprStmt { expr } = *ast.kind(stmt) else { unreachable!() };
        // Existing sequences splice in flat.
        if let NodeKind::Sequence { exprs: inner } = ast.kind(expr) {
            exprs.extend_from_slice(inner);
        } else {
            exprs.push(expr);
        }
    }
    let seq = ast.synth(NodeKind::Sequence { exprs });
    let first = run[0];
    ast.set_kind(first, NodeKind::ExprStmt { expr: seq });
    merged.push(first);
    run.clear();
}

#[derive(Debug, Default)]
pub struct VariableDeclarationsMerger;

impl VariableDeclarationsMerger {
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for VariableDeclarationsMerger {
    fn name(&self) -> TransformerName {
        TransformerName::VariableDeclarationsMerger
    }

    fn dependencies(&self) -> &[TransformerName] {
        &[TransformerName::ExpressionStatementsMerger]
    }

    fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
        (stage == NodeStage::Simplifying).then_some(Subscription::LEAVE)
    }

    fn leave(
        &mut self,
        _stage: NodeStage,
        _cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        _parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        let Some(body) = statement_body(ast, node) else {
            return Ok(VisitAction::Keep);
        };

        let mut merged: Vec<NodeId> = Vec::new();
        for stmt in body.iter().copied() {
            if let NodeKind::VarDecl { kind, decls } = ast.kind(stmt).clone() {
                if let Some(&last) = merged.last() {
                    if let NodeKind::VarDecl { kind: last_kind, decls: last_decls } =
                        ast.kind(last).clone()
                    {
                        if last_kind == kind {
                            let mut combined = last_decls;
                            combined.extend_from_slice(&decls);
                            ast.set_kind(last, NodeKind::VarDecl { kind, decls: combined });
                            continue;
                        }
                    }
                }
            }
            merged.push(stmt);
        }

        if merged.len() != body.len() {
            write_statement_body(ast, node, merged);
        }
        Ok(VisitAction::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use murk_parser::{parse, Codegen, CodegenOptions};

    fn run_leave<T: Transformer>(transformer: &mut T, ast: &mut Ast) {
        let mut cx = TransformContext::new(Options::default());
        let root = ast.root;
        transformer
            .leave(NodeStage::Simplifying, &mut cx, ast, root, None)
            .unwrap();
    }

    fn emit(ast: &Ast) -> String {
        let (code, _) = Codegen::new(ast, CodegenOptions { compact: true, ..Default::default() })
            .generate()
            .unwrap();
        code
    }

    #[test]
    fn test_expression_statements_merge() {
        let mut ast = parse("a(); b(); c();").unwrap();
        run_leave(&mut ExpressionStatementsMerger::new(), &mut ast);
        assert_eq!(ast.program_body().len(), 1);
        assert_eq!(emit(&ast), "a(),b(),c()");
    }

    #[test]
    fn test_merge_respects_boundaries() {
        let mut ast = parse("a(); var x = 1; b(); c();").unwrap();
        run_leave(&mut ExpressionStatementsMerger::new(), &mut ast);
        assert_eq!(ast.program_body().len(), 3);
        assert_eq!(emit(&ast), "a();var x=1;b(),c()");
    }

    #[test]
    fn test_directives_not_merged() {
        let mut ast = parse("'use strict'; a(); b();").unwrap();
        run_leave(&mut ExpressionStatementsMerger::new(), &mut ast);
        assert_eq!(ast.program_body().len(), 2);
        assert_eq!(emit(&ast), "'use strict';a(),b()");
    }

    #[test]
    fn test_var_decls_merge_same_kind_only() {
        let mut ast = parse("var x = 1; var y = 2; let z = 3;").unwrap();
        run_leave(&mut VariableDeclarationsMerger::new(), &mut ast);
        assert_eq!(ast.program_body().len(), 2);
        assert_eq!(emit(&ast), "var x=1,y=2;let z=3");
    }

    #[test]
    fn test_existing_sequences_splice() {
        let mut ast = parse("a(), b(); c();").unwrap();
        run_leave(&mut ExpressionStatementsMerger::new(), &mut ast);
        assert_eq!(emit(&ast), "a(),b(),c()");
    }
}
