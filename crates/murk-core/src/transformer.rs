//! The transformer contract.
//!
//! A transformer is a named unit that participates in zero or more node
//! stages through enter/leave visitor hooks, declares soft dependencies on
//! other transformers, and may run prepare/finalize hooks once per stage.
//! Code transformers are the string-level analogue.
//!
//! Instances are created fresh for every obfuscation call; state that must
//! accumulate across a traversal lives in the instance, shared per-call
//! collaborators live in [`TransformContext`].

use crate::error::TransformerError;
use crate::options::Options;
use crate::rng::Prng;
use crate::stage::{CodeStage, NodeStage};
use crate::visit::VisitAction;
use murk_parser::{Ast, NodeId};

/// Stable names for every transformer in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformerName {
    Parentifier,
    ObfuscationGuards,
    HashbangOperator,
    DeadCodeInjector,
    ControlFlowFlattener,
    PropertyRenamer,
    MemberAccessConverter,
    LiteralConverter,
    IdentifierRenamer,
    StringArrayTransformer,
    ExpressionStatementsMerger,
    VariableDeclarationsMerger,
    EscapeSequenceEncoder,
}

impl TransformerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformerName::Parentifier => "parentifier",
            TransformerName::ObfuscationGuards => "obfuscation-guards",
            TransformerName::HashbangOperator => "hashbang-operator",
            TransformerName::DeadCodeInjector => "dead-code-injector",
            TransformerName::ControlFlowFlattener => "control-flow-flattener",
            TransformerName::PropertyRenamer => "property-renamer",
            TransformerName::MemberAccessConverter => "member-access-converter",
            TransformerName::LiteralConverter => "literal-converter",
            TransformerName::IdentifierRenamer => "identifier-renamer",
            TransformerName::StringArrayTransformer => "string-array",
            TransformerName::ExpressionStatementsMerger => "expression-statements-merger",
            TransformerName::VariableDeclarationsMerger => "variable-declarations-merger",
            TransformerName::EscapeSequenceEncoder => "escape-sequence-encoder",
        }
    }
}

impl std::fmt::Display for TransformerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which visitor directions a transformer takes in a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub enter: bool,
    pub leave: bool,
}

impl Subscription {
    pub const ENTER: Subscription = Subscription { enter: true, leave: false };
    pub const LEAVE: Subscription = Subscription { enter: false, leave: true };
    pub const BOTH: Subscription = Subscription { enter: true, leave: true };
}

/// Shared per-call collaborators, handed to every hook.
pub struct TransformContext {
    pub options: Options,
    pub prng: Prng,
}

impl TransformContext {
    pub fn new(options: Options) -> Self {
        let prng = Prng::from_seed(options.seed);
        Self { options, prng }
    }
}

/// An AST-level transformer.
#[allow(unused_variables)]
pub trait Transformer {
    fn name(&self) -> TransformerName;

    /// Transformers that must run in earlier batches of the same stage.
    /// Soft hints: names that are inactive for the stage are dropped.
    fn dependencies(&self) -> &[TransformerName] {
        &[]
    }

    /// The visitor this transformer contributes to `stage`, or `None` when
    /// it does not participate.
    fn subscription(&self, stage: NodeStage) -> Option<Subscription>;

    /// Called once per stage, before the stage's first traversal.
    fn prepare(&mut self, stage: NodeStage, cx: &mut TransformContext, ast: &mut Ast) {}

    /// Called once per stage, after the stage's last traversal.
    fn finalize(&mut self, stage: NodeStage, cx: &mut TransformContext, ast: &mut Ast) {}

    fn enter(
        &mut self,
        stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        Ok(VisitAction::Keep)
    }

    fn leave(
        &mut self,
        stage: NodeStage,
        cx: &mut TransformContext,
        ast: &mut Ast,
        node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<VisitAction, TransformerError> {
        Ok(VisitAction::Keep)
    }
}

/// A source-string transformer.
pub trait CodeTransformer {
    fn name(&self) -> TransformerName;

    fn dependencies(&self) -> &[TransformerName] {
        &[]
    }

    fn active(&self, stage: CodeStage) -> bool;

    fn transform(
        &mut self,
        stage: CodeStage,
        cx: &mut TransformContext,
        code: String,
    ) -> Result<String, TransformerError>;
}
