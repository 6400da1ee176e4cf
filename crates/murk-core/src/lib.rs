//! murk-core: the staged transformation pipeline of the murk JavaScript
//! obfuscator.
//!
//! # Architecture
//!
//! The pipeline is three interlocking pieces:
//!
//! 1. **Scheduler** ([`schedule`]): groups the stage's active transformers
//!    into dependency-respecting batches and fuses each batch's visitors
//!    into a single traversal.
//! 2. **Traversal engine** ([`visit`]): iterative depth-first walk with
//!    per-node enter/leave dispatch, in-place replacement, subtree skipping
//!    and early termination.
//! 3. **Stage driver** ([`pipeline`]): sequences the code-level and
//!    node-level stages across one obfuscation call.
//!
//! The concrete transformers live in [`transformers`]; parsing and code
//! generation come from `murk-parser` behind thin façades.
//!
//! # Example
//!
//! ```
//! use murk_core::{obfuscate, Options};
//!
//! let result = obfuscate("var secret = 'value';", Options::default().with_seed(42)).unwrap();
//! assert!(!result.code.contains("'value'"));
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::match_same_arms)]

pub mod error;
pub mod events;
mod frontend;
pub mod options;
pub mod pipeline;
pub mod rng;
pub mod schedule;
pub mod stage;
pub mod transformer;
pub mod transformers;
pub mod visit;

pub use error::{Error, TransformerError};
pub use events::{Event, Level, LogEntry, Logger, MemoryLogger, TracingLogger};
pub use options::{Options, SourceMapSourcesMode};
pub use pipeline::{obfuscate, ObfuscationResult, Obfuscator};
pub use stage::{CodeStage, NodeStage};
pub use transformer::{
    CodeTransformer, Subscription, TransformContext, Transformer, TransformerName,
};
pub use visit::VisitAction;
