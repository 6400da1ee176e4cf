//! Hashbang handling across the two code stages.
//!
//! The `#!…` line is stripped before parsing and stitched back onto the
//! final output, so `#!/usr/bin/env node` survives obfuscation verbatim.
//! One instance spans both stages of a call; the stripped line is carried
//! between them.

use crate::error::TransformerError;
use crate::stage::CodeStage;
use crate::transformer::{CodeTransformer, TransformContext, TransformerName};

#[derive(Debug, Default)]
pub struct HashbangOperator {
    hashbang: Option<String>,
}

impl HashbangOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodeTransformer for HashbangOperator {
    fn name(&self) -> TransformerName {
        TransformerName::HashbangOperator
    }

    fn active(&self, _stage: CodeStage) -> bool {
        true
    }

    fn transform(
        &mut self,
        stage: CodeStage,
        _cx: &mut TransformContext,
        code: String,
    ) -> Result<String, TransformerError> {
        match stage {
            CodeStage::PreparingTransformers => {
                if !code.starts_with("#!") {
                    return Ok(code);
                }
                let line_end = code.find('\n').unwrap_or(code.len());
                self.hashbang = Some(code[..line_end].to_string());
                Ok(code[line_end..].trim_start_matches('\n').to_string())
            }
            CodeStage::FinalizingTransformers => match &self.hashbang {
                Some(hashbang) => Ok(format!("{hashbang}\n{code}")),
                None => Ok(code),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    #[test]
    fn test_strip_and_restore() {
        let mut op = HashbangOperator::new();
        let mut cx = TransformContext::new(Options::default());
        let stripped = op
            .transform(
                CodeStage::PreparingTransformers,
                &mut cx,
                "#!/usr/bin/env node\nvar a = 1;".to_string(),
            )
            .unwrap();
        assert_eq!(stripped, "var a = 1;");
        let restored = op
            .transform(CodeStage::FinalizingTransformers, &mut cx, "var a=1".to_string())
            .unwrap();
        assert_eq!(restored, "#!/usr/bin/env node\nvar a=1");
    }

    #[test]
    fn test_no_hashbang_passthrough() {
        let mut op = HashbangOperator::new();
        let mut cx = TransformContext::new(Options::default());
        let out = op
            .transform(CodeStage::PreparingTransformers, &mut cx, "var a;".to_string())
            .unwrap();
        assert_eq!(out, "var a;");
        let out = op
            .transform(CodeStage::FinalizingTransformers, &mut cx, "var a".to_string())
            .unwrap();
        assert_eq!(out, "var a");
    }
}
