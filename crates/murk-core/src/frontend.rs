//! Parser and generator façades.
//!
//! Thin adapters between the pipeline and `murk-parser`: parse failures
//! gain 1-based line/column positions, and generator options are derived
//! from the obfuscation [`Options`].

use crate::error::Error;
use crate::options::{Options, SourceMapSourcesMode};
use murk_parser::{build_source_map, Ast, Codegen, CodegenOptions, LineIndex};

/// Parse a source string. Hashbangs are tolerated (the hashbang code
/// transformer normally strips them first), modules and top-level `return`
/// are accepted anywhere.
pub(crate) fn parse_source(source: &str) -> Result<Ast, Error> {
    murk_parser::parse(source).map_err(|err| {
        let loc = LineIndex::new(source).loc(err.span.start);
        Error::Parse { message: err.message, line: loc.line, column: loc.column }
    })
}

/// Generate code and (optionally) a source map from the tree.
///
/// The map string is empty when source maps are disabled; in
/// sources-content mode the original source is embedded in the map.
pub(crate) fn generate(ast: &Ast, options: &Options) -> Result<(String, String), Error> {
    let codegen_options = CodegenOptions {
        compact: options.compact,
        comments: !options.compact,
        source_map: options.source_map,
    };
    let (code, mappings) = Codegen::new(ast, codegen_options)
        .generate()
        .map_err(|err| Error::Generate(err.message))?;

    let map = if options.source_map {
        let source_name = if options.input_file_name.is_empty() {
            "source.js"
        } else {
            &options.input_file_name
        };
        let embed = options.source_map_sources_mode == SourceMapSourcesMode::SourcesContent;
        build_source_map(&mappings, &ast.source, source_name, &options.input_file_name, embed)
            .to_json()
    } else {
        String::new()
    };

    Ok((code, map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_has_position() {
        let err = parse_source("var a = 1;\nvar = 2;").unwrap_err();
        let Error::Parse { line, column, .. } = err else { panic!("expected parse error") };
        assert_eq!(line, 2);
        assert_eq!(column, 5);
    }

    #[test]
    fn test_generate_without_map() {
        let ast = parse_source("var a = 1;").unwrap();
        let (code, map) = generate(&ast, &Options::default()).unwrap();
        assert_eq!(code, "var a=1");
        assert_eq!(map, "");
    }

    #[test]
    fn test_generate_with_embedded_sources() {
        let ast = parse_source("var a = 1;").unwrap();
        let options = Options::default().with_source_map(true);
        let (_, map) = generate(&ast, &options).unwrap();
        let json: serde_json::Value = serde_json::from_str(&map).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["sourcesContent"][0], "var a = 1;");
    }

    #[test]
    fn test_generate_sources_mode() {
        let ast = parse_source("var a = 1;").unwrap();
        let options = Options {
            source_map: true,
            source_map_sources_mode: SourceMapSourcesMode::Sources,
            input_file_name: "in.js".to_string(),
            ..Default::default()
        };
        let (_, map) = generate(&ast, &options).unwrap();
        let json: serde_json::Value = serde_json::from_str(&map).unwrap();
        assert_eq!(json["sources"][0], "in.js");
        assert!(json.get("sourcesContent").is_none());
    }
}
