//! The transformer catalog.
//!
//! `node_transformers` and `code_transformers` return fresh instances for
//! one obfuscation call, in declaration order, which is the scheduler's tiebreak
//! order inside a batch. Factories capture the option flags a transformer
//! needs; per-call randomness arrives through the
//! [`TransformContext`](crate::transformer::TransformContext) handed to
//! every hook.

mod control_flow;
mod dead_code;
mod escape;
mod guards;
mod hashbang;
mod literals;
mod member_access;
mod parentify;
mod rename_identifiers;
mod rename_properties;
mod simplify;
mod string_array;

pub use control_flow::ControlFlowFlattener;
pub use dead_code::DeadCodeInjector;
pub use escape::EscapeSequenceEncoder;
pub use guards::ObfuscationGuards;
pub use hashbang::HashbangOperator;
pub use literals::LiteralConverter;
pub use member_access::MemberAccessConverter;
pub use parentify::Parentifier;
pub use rename_identifiers::IdentifierRenamer;
pub use rename_properties::PropertyRenamer;
pub use simplify::{ExpressionStatementsMerger, VariableDeclarationsMerger};
pub use string_array::StringArrayTransformer;

use crate::options::Options;
use crate::transformer::{CodeTransformer, Transformer};

/// The node-transformer catalog for one call, in declaration order.
pub fn node_transformers(options: &Options) -> Vec<Box<dyn Transformer>> {
    vec![
        Box::new(Parentifier::new()),
        Box::new(ObfuscationGuards::new()),
        Box::new(DeadCodeInjector::new(options.dead_code_injection_threshold)),
        Box::new(ControlFlowFlattener::new(
            options.control_flow_flattening,
            options.control_flow_flattening_threshold,
        )),
        Box::new(PropertyRenamer::new(options.rename_properties, &options.reserved_names)),
        Box::new(MemberAccessConverter::new()),
        Box::new(LiteralConverter::new()),
        Box::new(IdentifierRenamer::new(options.rename_globals, &options.reserved_names)),
        Box::new(StringArrayTransformer::new(
            options.string_array,
            options.string_array_threshold,
        )),
        Box::new(ExpressionStatementsMerger::new()),
        Box::new(VariableDeclarationsMerger::new()),
        Box::new(EscapeSequenceEncoder::new()),
    ]
}

/// The code-transformer catalog for one call.
pub fn code_transformers(_options: &Options) -> Vec<Box<dyn CodeTransformer>> {
    vec![Box::new(HashbangOperator::new())]
}
