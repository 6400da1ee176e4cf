#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]

mod logging;

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use murk_core::{Obfuscator, Options};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "murk")]
#[command(author, version, about = "A JavaScript source-to-source obfuscator", long_about = None)]
struct Cli {
    /// Input file, or `-` for stdin.
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Output file; stdout when omitted.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// JSON options file; flags below override its values.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep whitespace in the output.
    #[arg(long)]
    no_compact: bool,

    /// PRNG seed (0 picks one and logs it).
    #[arg(long)]
    seed: Option<u64>,

    /// Emit a source map next to the output file.
    #[arg(long)]
    source_map: bool,

    /// Rewrite eligible function bodies into switch-dispatch loops.
    #[arg(long)]
    control_flow_flattening: bool,

    /// Inject opaque-predicate dead branches.
    #[arg(long)]
    dead_code_injection: bool,

    /// Globally rename property keys (self-contained programs only).
    #[arg(long)]
    rename_properties: bool,

    /// Rename top-level bindings too.
    #[arg(long)]
    rename_globals: bool,

    /// Run the simplifying stage.
    #[arg(long)]
    simplify: bool,

    /// Skip string-array extraction.
    #[arg(long)]
    no_string_array: bool,

    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted logs to stderr.
    #[arg(long, global = true)]
    json_logs: bool,
}

impl Cli {
    /// Resolve options: config file first, then flag overrides.
    fn options(&self) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .into_diagnostic()
                    .map_err(|err| miette!("cannot read config {}: {err}", path.display()))?;
                serde_json::from_str(&text)
                    .into_diagnostic()
                    .map_err(|err| miette!("cannot parse config {}: {err}", path.display()))?
            }
            None => Options::default(),
        };

        if self.no_compact {
            options.compact = false;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if self.source_map {
            options.source_map = true;
        }
        if self.control_flow_flattening {
            options.control_flow_flattening = true;
        }
        if self.dead_code_injection {
            options.dead_code_injection = true;
        }
        if self.rename_properties {
            options.rename_properties = true;
        }
        if self.rename_globals {
            options.rename_globals = true;
        }
        if self.simplify {
            options.simplify = true;
        }
        if self.no_string_array {
            options.string_array = false;
        }
        if options.input_file_name.is_empty() && self.input != Path::new("-") {
            options.input_file_name = self.input.display().to_string();
        }
        Ok(options)
    }

    fn read_input(&self) -> Result<String> {
        if self.input == Path::new("-") {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source).into_diagnostic()?;
            Ok(source)
        } else {
            std::fs::read_to_string(&self.input)
                .into_diagnostic()
                .map_err(|err| miette!("cannot read {}: {err}", self.input.display()))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    let options = cli.options()?;
    let source = cli.read_input()?;

    let result = Obfuscator::new(options)
        .obfuscate(&source)
        .map_err(|err| miette!("{err}"))?;

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &result.code)
                .into_diagnostic()
                .map_err(|err| miette!("cannot write {}: {err}", path.display()))?;
            if !result.map.is_empty() {
                let map_path = PathBuf::from(format!("{}.map", path.display()));
                std::fs::write(&map_path, &result.map)
                    .into_diagnostic()
                    .map_err(|err| miette!("cannot write {}: {err}", map_path.display()))?;
            }
        }
        None => {
            println!("{}", result.code);
        }
    }
    Ok(())
}
