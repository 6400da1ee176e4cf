//! The stage driver.
//!
//! One obfuscation call runs:
//!
//! ```text
//! source ─ PreparingTransformers ─ parse ─ [node stages] ─ generate ─
//!          FinalizingTransformers ─ result
//! ```
//!
//! Each node stage asks the scheduler for batches over the stage's active
//! set and runs the traversal engine once per batch, with the batch's
//! visitors fused in catalog order. Optional stages are gated by
//! configuration; a program that is empty after the initializing stage
//! short-circuits the remaining node stages with a warning.

use crate::error::Error;
use crate::events::{Event, Logger, TracingLogger};
use crate::frontend;
use crate::options::Options;
use crate::schedule::{build_batches, Schedulable};
use crate::stage::{CodeStage, NodeStage};
use crate::transformer::{CodeTransformer, Subscription, TransformContext, Transformer};
use crate::transformers;
use crate::visit::{self, Flow, NodeVisitor, VisitAction};
use murk_parser::{Ast, NodeId};

/// The outcome of one call: obfuscated code plus the source map (empty
/// string when maps are disabled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationResult {
    pub code: String,
    pub map: String,
}

/// A configured obfuscator. Each `obfuscate` call builds fresh transformer
/// instances and a fresh PRNG, so calls are independent and a seeded call
/// is reproducible.
pub struct Obfuscator {
    options: Options,
    logger: Box<dyn Logger>,
}

impl Obfuscator {
    pub fn new(options: Options) -> Self {
        Self { options, logger: Box::new(TracingLogger) }
    }

    pub fn with_logger(options: Options, logger: Box<dyn Logger>) -> Self {
        Self { options, logger }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Obfuscate one source string.
    pub fn obfuscate(&self, source: &str) -> Result<ObfuscationResult, Error> {
        let mut cx = TransformContext::new(self.options.clone());
        self.logger.info(Event::Version, env!("CARGO_PKG_VERSION"));
        self.logger.info(Event::ObfuscationStarted, "");
        self.logger.info(Event::RandomGeneratorSeed, &cx.prng.seed().to_string());

        let mut code_transformers = transformers::code_transformers(&self.options);
        let mut node_transformers = transformers::node_transformers(&self.options);

        let source = self.run_code_stage(
            CodeStage::PreparingTransformers,
            &mut code_transformers,
            &mut cx,
            source.to_string(),
        )?;

        let mut ast = frontend::parse_source(&source)?;

        for &stage in &NodeStage::ORDER {
            if !self.stage_enabled(stage) {
                continue;
            }
            self.run_node_stage(stage, &mut node_transformers, &mut cx, &mut ast)?;
            if stage == NodeStage::Initializing && ast.program_body().is_empty() {
                self.logger.warn(Event::EmptySourceCode, "");
                break;
            }
        }

        let (code, map) = frontend::generate(&ast, &self.options)?;
        let code = self.run_code_stage(
            CodeStage::FinalizingTransformers,
            &mut code_transformers,
            &mut cx,
            code,
        )?;

        self.logger.success(Event::ObfuscationCompleted, "");
        Ok(ObfuscationResult { code, map })
    }

    fn stage_enabled(&self, stage: NodeStage) -> bool {
        match stage {
            NodeStage::DeadCodeInjection => self.options.dead_code_injection,
            NodeStage::RenameProperties => self.options.rename_properties,
            NodeStage::Simplifying => self.options.simplify,
            _ => true,
        }
    }

    fn run_node_stage(
        &self,
        stage: NodeStage,
        transformers: &mut [Box<dyn Transformer>],
        cx: &mut TransformContext,
        ast: &mut Ast,
    ) -> Result<(), Error> {
        self.logger.info(Event::NodeTransformationStage, stage.as_str());

        // Normalize: the active set is whoever contributes a visitor.
        let active: Vec<(usize, Subscription)> = transformers
            .iter()
            .enumerate()
            .filter_map(|(index, t)| t.subscription(stage).map(|sub| (index, sub)))
            .collect();
        if active.is_empty() {
            return Ok(());
        }

        let schedulables: Vec<Schedulable> = active
            .iter()
            .map(|&(index, _)| Schedulable {
                name: transformers[index].name(),
                deps: transformers[index].dependencies().to_vec(),
            })
            .collect();
        let batches = build_batches(&schedulables)?;

        for &(index, _) in &active {
            transformers[index].prepare(stage, cx, ast);
        }
        for batch in &batches {
            let members: Vec<(usize, Subscription)> =
                batch.iter().map(|&slot| active[slot]).collect();
            let mut fused = FusedVisitor { stage, cx, transformers, members: &members };
            let root = ast.root;
            visit::replace(ast, root, &mut fused)?;
        }
        for &(index, _) in &active {
            transformers[index].finalize(stage, cx, ast);
        }
        Ok(())
    }

    fn run_code_stage(
        &self,
        stage: CodeStage,
        transformers: &mut [Box<dyn CodeTransformer>],
        cx: &mut TransformContext,
        code: String,
    ) -> Result<String, Error> {
        self.logger.info(Event::CodeTransformationStage, stage.as_str());

        let active: Vec<usize> = transformers
            .iter()
            .enumerate()
            .filter_map(|(index, t)| t.active(stage).then_some(index))
            .collect();
        if active.is_empty() {
            return Ok(code);
        }

        let schedulables: Vec<Schedulable> = active
            .iter()
            .map(|&index| Schedulable {
                name: transformers[index].name(),
                deps: transformers[index].dependencies().to_vec(),
            })
            .collect();
        let batches = build_batches(&schedulables)?;

        // Within a batch, code transformers compose left to right.
        let mut code = code;
        for batch in &batches {
            for &slot in batch {
                let index = active[slot];
                let transformer = &mut transformers[index];
                code = transformer.transform(stage, cx, code).map_err(|err| {
                    Error::TransformerFailure {
                        stage: stage.to_string(),
                        transformer: transformer.name().to_string(),
                        message: err.message,
                    }
                })?;
            }
        }
        Ok(code)
    }
}

/// The fused visitor for one batch: runs each subscribed member in batch
/// order against the current node slot. Because a replacement overwrites
/// the slot in place, each member's output is the next member's input.
struct FusedVisitor<'a> {
    stage: NodeStage,
    cx: &'a mut TransformContext,
    transformers: &'a mut [Box<dyn Transformer>],
    members: &'a [(usize, Subscription)],
}

impl FusedVisitor<'_> {
    fn dispatch(
        &mut self,
        direction_enter: bool,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<Flow, Error> {
        for &(index, sub) in self.members {
            let wanted = if direction_enter { sub.enter } else { sub.leave };
            if !wanted {
                continue;
            }
            let transformer = &mut self.transformers[index];
            let action = if direction_enter {
                transformer.enter(self.stage, self.cx, ast, node, parent)
            } else {
                transformer.leave(self.stage, self.cx, ast, node, parent)
            };
            match action {
                Ok(VisitAction::Keep) => {}
                Ok(VisitAction::Replace(kind)) => ast.set_kind(node, kind),
                Ok(VisitAction::SkipSubtree) => return Ok(Flow::Skip),
                Ok(VisitAction::Abort) => return Ok(Flow::Abort),
                Err(err) => {
                    return Err(Error::TransformerFailure {
                        stage: self.stage.to_string(),
                        transformer: transformer.name().to_string(),
                        message: err.message,
                    })
                }
            }
        }
        Ok(Flow::Continue)
    }
}

impl NodeVisitor for FusedVisitor<'_> {
    fn enter(
        &mut self,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<Flow, Error> {
        self.dispatch(true, ast, node, parent)
    }

    fn leave(
        &mut self,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<Flow, Error> {
        self.dispatch(false, ast, node, parent)
    }
}

/// Obfuscate with a one-off [`Obfuscator`].
pub fn obfuscate(source: &str, options: Options) -> Result<ObfuscationResult, Error> {
    Obfuscator::new(options).obfuscate(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformerError;
    use crate::transformer::TransformerName;

    /// Fails on the first statement it sees.
    struct Exploder;

    impl Transformer for Exploder {
        fn name(&self) -> TransformerName {
            TransformerName::LiteralConverter
        }

        fn subscription(&self, stage: NodeStage) -> Option<Subscription> {
            (stage == NodeStage::Converting).then_some(Subscription::ENTER)
        }

        fn enter(
            &mut self,
            _stage: NodeStage,
            _cx: &mut TransformContext,
            ast: &mut Ast,
            node: murk_parser::NodeId,
            _parent: Option<murk_parser::NodeId>,
        ) -> Result<crate::visit::VisitAction, TransformerError> {
            if matches!(ast.kind(node), murk_parser::NodeKind::ExprStmt { .. }) {
                return Err(TransformerError::new("boom"));
            }
            Ok(crate::visit::VisitAction::Keep)
        }
    }

    #[test]
    fn test_transformer_failure_is_fatal_with_context() {
        let obfuscator = Obfuscator::new(Options::default());
        let mut cx = TransformContext::new(Options::default());
        let mut ast = frontend::parse_source("f();").unwrap();
        let mut failing: Vec<Box<dyn Transformer>> = vec![Box::new(Exploder)];

        let err = obfuscator
            .run_node_stage(NodeStage::Converting, &mut failing, &mut cx, &mut ast)
            .unwrap_err();
        let Error::TransformerFailure { stage, transformer, message } = err else {
            panic!("expected transformer failure");
        };
        assert_eq!(stage, "converting");
        assert_eq!(transformer, "literal-converter");
        assert_eq!(message, "boom");
    }

    #[test]
    fn test_inactive_stage_runs_no_batches() {
        let obfuscator = Obfuscator::new(Options::default());
        let mut cx = TransformContext::new(Options::default());
        let mut ast = frontend::parse_source("f();").unwrap();
        let mut failing: Vec<Box<dyn Transformer>> = vec![Box::new(Exploder)];

        // The exploder only subscribes to the converting stage; any other
        // stage has an empty active set and must not touch the tree.
        obfuscator
            .run_node_stage(NodeStage::Finalizing, &mut failing, &mut cx, &mut ast)
            .unwrap();
    }
}
