//! Pipeline stages.
//!
//! Node stages run over the AST between parse and generate; code stages run
//! over the raw source string before parsing and after generation.

/// AST-level stages, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStage {
    Initializing,
    Preparing,
    DeadCodeInjection,
    ControlFlowFlattening,
    RenameProperties,
    Converting,
    RenameIdentifiers,
    StringArray,
    Simplifying,
    Finalizing,
}

impl NodeStage {
    /// Canonical execution order. Optional stages are gated by the driver,
    /// never reordered.
    pub const ORDER: [NodeStage; 10] = [
        NodeStage::Initializing,
        NodeStage::Preparing,
        NodeStage::DeadCodeInjection,
        NodeStage::ControlFlowFlattening,
        NodeStage::RenameProperties,
        NodeStage::Converting,
        NodeStage::RenameIdentifiers,
        NodeStage::StringArray,
        NodeStage::Simplifying,
        NodeStage::Finalizing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStage::Initializing => "initializing",
            NodeStage::Preparing => "preparing",
            NodeStage::DeadCodeInjection => "dead-code-injection",
            NodeStage::ControlFlowFlattening => "control-flow-flattening",
            NodeStage::RenameProperties => "rename-properties",
            NodeStage::Converting => "converting",
            NodeStage::RenameIdentifiers => "rename-identifiers",
            NodeStage::StringArray => "string-array",
            NodeStage::Simplifying => "simplifying",
            NodeStage::Finalizing => "finalizing",
        }
    }
}

impl std::fmt::Display for NodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-string stages bracketing parse and generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeStage {
    PreparingTransformers,
    FinalizingTransformers,
}

impl CodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStage::PreparingTransformers => "preparing-transformers",
            CodeStage::FinalizingTransformers => "finalizing-transformers",
        }
    }
}

impl std::fmt::Display for CodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
