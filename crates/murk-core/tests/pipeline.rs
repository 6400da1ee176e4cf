//! End-to-end pipeline tests.
//!
//! These drive the public `obfuscate` entry point and assert on output
//! code, emitted source maps, and the event sequence captured by a
//! memory logger.

use murk_core::schedule::{build_batches, Schedulable};
use murk_core::{
    obfuscate, Error, Event, Level, MemoryLogger, Obfuscator, Options, SourceMapSourcesMode,
    TransformerName,
};
use murk_parser::{parse, NodeKind};

fn options_off() -> Options {
    Options::passthrough().with_seed(1)
}

fn all_on() -> Options {
    Options {
        control_flow_flattening: true,
        dead_code_injection: true,
        rename_properties: true,
        rename_globals: true,
        simplify: true,
        seed: 99,
        ..Options::default()
    }
}

#[test]
fn test_empty_input_short_circuits() {
    let logger = MemoryLogger::new();
    let handle = logger.handle();
    let obfuscator = Obfuscator::with_logger(options_off(), Box::new(logger));
    let result = obfuscator.obfuscate("").unwrap();
    assert_eq!(result.code, "");
    assert_eq!(result.map, "");

    let warnings = handle.events(Event::EmptySourceCode);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Level::Warn);

    // Only the initializing node stage ran.
    let stages: Vec<String> = handle
        .events(Event::NodeTransformationStage)
        .into_iter()
        .map(|e| e.detail)
        .collect();
    assert_eq!(stages, vec!["initializing"]);
}

#[test]
fn test_whitespace_and_comments_count_as_empty_body() {
    let logger = MemoryLogger::new();
    let handle = logger.handle();
    let obfuscator = Obfuscator::with_logger(options_off(), Box::new(logger));
    let result = obfuscator.obfuscate("  \n /* nothing here */ \n").unwrap();
    let ast = parse(&result.code).unwrap();
    assert!(ast.program_body().is_empty());
    assert_eq!(handle.events(Event::EmptySourceCode).len(), 1);
}

#[test]
fn test_passthrough_preserves_structure() {
    let result = obfuscate("var test = 31;", options_off()).unwrap();
    let ast = parse(&result.code).unwrap();
    let body = ast.program_body();
    assert_eq!(body.len(), 1);
    let NodeKind::VarDecl { decls, .. } = ast.kind(body[0]) else {
        panic!("expected a variable declaration, got {:?}", ast.kind(body[0]));
    };
    let NodeKind::VarDeclarator { id, init } = ast.kind(decls[0]) else {
        panic!("expected a declarator");
    };
    assert_eq!(ast.kind(*id), &NodeKind::Ident { name: "test".into() });
    assert_eq!(ast.kind(init.unwrap()), &NodeKind::Num(31.0));
}

#[test]
fn test_hashbang_preserved() {
    let result = obfuscate("#!/usr/bin/env node\nvar a=1;", options_off()).unwrap();
    assert!(result.code.starts_with("#!/usr/bin/env node\n"));
    // The rest is still a program.
    let rest = result.code.splitn(2, '\n').nth(1).unwrap();
    assert!(parse(rest).is_ok());
}

#[test]
fn test_schedule_cycle_is_fatal_and_named() {
    let items = [
        Schedulable {
            name: TransformerName::MemberAccessConverter,
            deps: vec![TransformerName::LiteralConverter],
        },
        Schedulable {
            name: TransformerName::LiteralConverter,
            deps: vec![TransformerName::MemberAccessConverter],
        },
    ];
    let err = build_batches(&items).unwrap_err();
    let Error::ScheduleCycle { participants } = err else { panic!("expected cycle") };
    assert!(participants.contains(&"literal-converter".to_string()));
    assert!(participants.contains(&"member-access-converter".to_string()));
}

#[test]
fn test_disable_directive_shields_region() {
    let source = "var visible = 'extractme';\n/* murk-disable */\nfunction keep(arg) { return 'plain' + arg; }\n/* murk-enable */\nvar tail = 'tailstring';\n";
    let options = Options { seed: 4, rename_globals: true, ..Options::default() };
    let result = obfuscate(source, options).unwrap();

    // The guarded function survives verbatim concerns: its string is not
    // pooled or escaped and its parameter keeps its name.
    assert!(result.code.contains("'plain'"));
    assert!(result.code.contains("keep(arg)") || result.code.contains("keep (arg)"));
    // Outside the guarded region, obfuscation happened on both sides of it.
    assert!(!result.code.contains("visible"));
    assert!(!result.code.contains("'extractme'"));
    assert!(!result.code.contains("tail"));
    assert!(!result.code.contains("'tailstring'"));
}

#[test]
fn test_stage_sequence_with_simplify() {
    let logger = MemoryLogger::new();
    let handle = logger.handle();
    let obfuscator =
        Obfuscator::with_logger(options_off().with_simplify(true), Box::new(logger));
    obfuscator.obfuscate("var x=1;var y=2;").unwrap();

    let stages: Vec<String> = handle
        .events(Event::NodeTransformationStage)
        .into_iter()
        .map(|e| e.detail)
        .collect();
    assert_eq!(
        stages,
        vec![
            "initializing",
            "preparing",
            "control-flow-flattening",
            "converting",
            "rename-identifiers",
            "string-array",
            "simplifying",
            "finalizing",
        ]
    );
    assert_eq!(stages.iter().filter(|s| *s == "simplifying").count(), 1);
}

#[test]
fn test_stage_sequence_all_optional_stages() {
    let logger = MemoryLogger::new();
    let handle = logger.handle();
    let obfuscator = Obfuscator::with_logger(all_on(), Box::new(logger));
    obfuscator.obfuscate("function f(){var a=1;var b=2;work(a+b);}").unwrap();

    let stages: Vec<String> = handle
        .events(Event::NodeTransformationStage)
        .into_iter()
        .map(|e| e.detail)
        .collect();
    assert_eq!(
        stages,
        vec![
            "initializing",
            "preparing",
            "dead-code-injection",
            "control-flow-flattening",
            "rename-properties",
            "converting",
            "rename-identifiers",
            "string-array",
            "simplifying",
            "finalizing",
        ]
    );

    let code_stages: Vec<String> = handle
        .events(Event::CodeTransformationStage)
        .into_iter()
        .map(|e| e.detail)
        .collect();
    assert_eq!(code_stages, vec!["preparing-transformers", "finalizing-transformers"]);
}

#[test]
fn test_seed_determinism() {
    let source = "function f(x){var acc=0;for(var i=0;i<x;i++){acc+=i;}return acc;}f(10);";
    let first = obfuscate(source, all_on()).unwrap();
    let second = obfuscate(source, all_on()).unwrap();
    assert_eq!(first.code, second.code);

    let other_seed = Options { seed: 100, ..all_on() };
    let third = obfuscate(source, other_seed).unwrap();
    assert_ne!(first.code, third.code);
}

#[test]
fn test_seed_logged() {
    let logger = MemoryLogger::new();
    let handle = logger.handle();
    let obfuscator = Obfuscator::with_logger(options_off().with_seed(1234), Box::new(logger));
    obfuscator.obfuscate("var a=1;").unwrap();
    let seeds = handle.events(Event::RandomGeneratorSeed);
    assert_eq!(seeds.len(), 1);
    assert_eq!(seeds[0].detail, "1234");
}

#[test]
fn test_output_reparses_with_everything_on() {
    let source = r#"
'use strict';
function greet(name) {
    var message = `hello ${name}`;
    console.log(message);
    return message.length;
}
var count = greet('world');
if (count > 3) { greet('again'); }
"#;
    let result = obfuscate(source, all_on()).unwrap();
    parse(&result.code).unwrap_or_else(|err| {
        panic!("obfuscated output failed to reparse: {err}\n{}", result.code)
    });
    // Obfuscation visibly happened.
    assert!(result.code.contains("_0x"));
    assert!(!result.code.contains("message"));
}

#[test]
fn test_string_array_extraction_end_to_end() {
    let options = Options { seed: 7, string_array_threshold: 1.0, ..Options::default() };
    let result = obfuscate("var a = 'first'; var b = 'second'; use(a, b);", options).unwrap();
    // Pool declaration plus indexed accesses; the escape encoder has
    // rewritten the pool contents to \x sequences.
    assert!(result.code.contains("var _0x"));
    assert!(result.code.contains("\\x66\\x69\\x72\\x73\\x74")); // 'first'
    assert!(!result.code.contains("'first'"));
    parse(&result.code).unwrap();
}

#[test]
fn test_source_map_modes() {
    let source = "var alpha = 1;\nvar beta = 2;\n";
    let embedded = Options::passthrough().with_seed(2).with_source_map(true);
    let result = obfuscate(source, embedded).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.map).unwrap();
    assert_eq!(json["version"], 3);
    assert_eq!(json["sourcesContent"][0], source);
    assert!(!json["mappings"].as_str().unwrap().is_empty());

    let named_only = Options {
        source_map: true,
        source_map_sources_mode: SourceMapSourcesMode::Sources,
        input_file_name: "app.js".to_string(),
        ..Options::passthrough().with_seed(2)
    };
    let result = obfuscate(source, named_only).unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.map).unwrap();
    assert_eq!(json["sources"][0], "app.js");
    assert!(json.get("sourcesContent").is_none());
}

#[test]
fn test_parse_error_surfaces_with_position() {
    let err = obfuscate("var a = 1;\nvar = 2;", options_off()).unwrap_err();
    let Error::Parse { line, column, .. } = err else { panic!("expected parse error") };
    assert_eq!(line, 2);
    assert_eq!(column, 5);
}

#[test]
fn test_simplify_merges_statements() {
    let result = obfuscate("var x=1;var y=2;", options_off().with_simplify(true)).unwrap();
    let ast = parse(&result.code).unwrap();
    assert_eq!(ast.program_body().len(), 1);
    let NodeKind::VarDecl { decls, .. } = ast.kind(ast.program_body()[0]) else {
        panic!("expected merged declaration");
    };
    assert_eq!(decls.len(), 2);
}

#[test]
fn test_control_flow_flattening_keeps_semantics_shape() {
    let options = Options {
        control_flow_flattening: true,
        control_flow_flattening_threshold: 1.0,
        string_array: false,
        seed: 31,
        ..Options::default()
    };
    let result = obfuscate("function f(){a();b();return c();}", options).unwrap();
    assert!(result.code.contains("switch"));
    assert!(result.code.contains("while"));
    parse(&result.code).unwrap();
}

#[test]
fn test_options_from_json_config() {
    let options: Options = serde_json::from_str(
        r#"{"compact": true, "simplify": true, "seed": 5, "stringArray": false}"#,
    )
    .unwrap();
    let result = obfuscate("var x = 1; var y = 2;", options).unwrap();
    let ast = parse(&result.code).unwrap();
    assert_eq!(ast.program_body().len(), 1);
}
