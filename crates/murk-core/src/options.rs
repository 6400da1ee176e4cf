//! Obfuscation options.
//!
//! Field names follow the JSON options file format (camelCase). Unknown
//! keys are collected into `extra` and passed through to transformers that
//! recognize them rather than rejected.

use serde::{Deserialize, Serialize};

/// How `sources` are recorded in an emitted source map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceMapSourcesMode {
    /// Embed the original source text in the map.
    #[default]
    SourcesContent,
    /// Record the source file name only.
    Sources,
}

/// Options recognized by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Collapse output whitespace.
    pub compact: bool,

    /// Rewrite eligible function bodies into switch-dispatch loops.
    pub control_flow_flattening: bool,
    /// Fraction of eligible function bodies to flatten.
    pub control_flow_flattening_threshold: f64,

    /// Inject opaque-predicate dead branches.
    pub dead_code_injection: bool,
    /// Fraction of eligible blocks to inject into.
    pub dead_code_injection_threshold: f64,

    /// Rename top-level bindings too. Off by default since it breaks
    /// consumers of the program's globals.
    pub rename_globals: bool,

    /// Globally rename property keys. Safe only for self-contained programs.
    pub rename_properties: bool,

    /// Names never renamed, in addition to the built-in reserved set.
    pub reserved_names: Vec<String>,

    /// PRNG seed. `0` draws a fresh seed from entropy.
    pub seed: u64,

    /// Run the simplifying stage (statement merging).
    pub simplify: bool,

    /// Emit a source map.
    pub source_map: bool,
    pub source_map_sources_mode: SourceMapSourcesMode,

    /// Extract string literals into a lookup array.
    pub string_array: bool,
    /// Fraction of eligible string literals to extract.
    pub string_array_threshold: f64,

    /// Name recorded as the map's source.
    pub input_file_name: String,

    /// Unrecognized options, passed through to transformers.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compact: true,
            control_flow_flattening: false,
            control_flow_flattening_threshold: 0.75,
            dead_code_injection: false,
            dead_code_injection_threshold: 0.4,
            rename_globals: false,
            rename_properties: false,
            reserved_names: Vec::new(),
            seed: 0,
            simplify: false,
            source_map: false,
            source_map_sources_mode: SourceMapSourcesMode::default(),
            string_array: true,
            string_array_threshold: 0.75,
            input_file_name: String::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Options {
    /// All optional passes off: parse and regenerate only.
    #[must_use]
    pub fn passthrough() -> Self {
        Self { string_array: false, ..Default::default() }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    #[must_use]
    pub fn with_source_map(mut self, source_map: bool) -> Self {
        self.source_map = source_map;
        self
    }

    #[must_use]
    pub fn with_simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    /// Whether a name is reserved from renaming.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_names.iter().any(|r| r == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.compact);
        assert!(options.string_array);
        assert!(!options.simplify);
        assert_eq!(options.seed, 0);
    }

    #[test]
    fn test_json_camel_case_and_passthrough() {
        let options: Options = serde_json::from_str(
            r#"{
                "compact": false,
                "deadCodeInjection": true,
                "sourceMapSourcesMode": "sources",
                "stringArrayEncoding": ["base64"]
            }"#,
        )
        .unwrap();
        assert!(!options.compact);
        assert!(options.dead_code_injection);
        assert_eq!(options.source_map_sources_mode, SourceMapSourcesMode::Sources);
        assert!(options.extra.contains_key("stringArrayEncoding"));
    }

    #[test]
    fn test_reserved_names() {
        let options = Options { reserved_names: vec!["keep".into()], ..Default::default() };
        assert!(options.is_reserved("keep"));
        assert!(!options.is_reserved("other"));
    }
}
