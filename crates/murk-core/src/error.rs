//! Pipeline error type.
//!
//! Every error is fatal for the current obfuscation call; a partial result
//! is never returned.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("parse error: {message} (line {line}, column {column})")]
    Parse { message: String, line: u32, column: u32 },

    #[error("code generation failed: {0}")]
    Generate(String),

    #[error("transformer dependency cycle: {}", participants.join(", "))]
    ScheduleCycle { participants: Vec<String> },

    #[error("transformer `{transformer}` failed during {stage}: {message}")]
    TransformerFailure { stage: String, transformer: String, message: String },
}

/// Failure raised inside a transformer hook. The pipeline wraps it into
/// [`Error::TransformerFailure`] with the stage and transformer name.
#[derive(Debug, Clone)]
pub struct TransformerError {
    pub message: String,
}

impl TransformerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for TransformerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransformerError {}

impl From<String> for TransformerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TransformerError {
    fn from(message: &str) -> Self {
        Self { message: message.to_string() }
    }
}
