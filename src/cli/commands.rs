//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::env;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

use testbed_core::{EntityType, Schema, Store};
use testbed_syntax::{Format, read_fixture};

use crate::config::HarnessConfig;
use crate::discovery::{FsTranscriptDiscovery, register_transcripts};
use crate::lifecycle::Controller;
use crate::loader::{LoadError, Loader, dump};
use crate::registry::Registry;
use crate::report::ConsoleReporter;

use super::{CliError, CliResult, ConfigArgs, ExitCode};

/// Options of the `test` command.
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub path: PathBuf,
    pub verbose: bool,
    pub exit_first: bool,
    pub filter: Option<String>,
    pub no_color: bool,
    pub config: ConfigArgs,
}

// ============================================================================
// Configuration and schema
// ============================================================================

/// Resolve config file, environment and `--fixture-dir` flags.
fn load_config(args: &ConfigArgs) -> CliResult<HarnessConfig> {
    let cwd = env::current_dir().map_err(|e| CliError::failure(format!("cannot read working directory: {e}")))?;
    let mut config = HarnessConfig::discover(args.config.as_deref(), &cwd)
        .map_err(|e| CliError::failure(format!("error: {e}")))?;
    if !args.fixture_dirs.is_empty() {
        // Flag dirs take precedence over configured ones, in the order given.
        let mut dirs = args.fixture_dirs.clone();
        dirs.append(&mut config.fixture_dirs);
        config = config.with_fixture_dirs(dirs);
    }
    tracing::debug!(fixture_dirs = ?config.fixture_dirs, "configuration resolved");
    Ok(config)
}

/// The declared schema, or when nothing is declared, every entity type named by a fixture in the search dirs.
fn build_schema(config: &HarnessConfig) -> CliResult<Schema> {
    let schema = config.schema().map_err(|e| CliError::failure(format!("error: {e}")))?;
    if !schema.is_empty() {
        return Ok(schema);
    }

    let mut schema = Schema::new();
    for dir in &config.fixture_dirs {
        for (path, format) in fixture_files(dir) {
            // Unreadable or malformed files are reported when a unit loads them.
            let Ok(text) = fs::read_to_string(&path) else { continue };
            let Ok(records) = read_fixture(&text, format) else { continue };
            for record in records {
                if !schema.contains(&record.entity) {
                    tracing::debug!(entity = %record.entity, path = %path.display(), "inferred entity type");
                    schema
                        .register(EntityType::new(record.entity))
                        .map_err(|e| CliError::failure(format!("error: {e}")))?;
                }
            }
        }
    }
    if schema.is_empty() {
        tracing::warn!("no entity types declared or found in fixture directories");
    }
    Ok(schema)
}

/// Fixture files directly inside `dir`, sorted.
fn fixture_files(dir: &Path) -> Vec<(PathBuf, Format)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<(PathBuf, Format)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let format = path.extension().and_then(|e| e.to_str()).and_then(Format::from_extension)?;
            Some((path, format))
        })
        .collect();
    files.sort();
    files
}

fn render_diagnostic(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    if handler.render_report(&mut out, diagnostic).is_err() {
        return diagnostic.to_string();
    }
    out
}

fn load_error(err: &LoadError) -> CliError {
    match err.diagnostic() {
        Some(diagnostic) => CliError::failure(render_diagnostic(&diagnostic).trim_end()),
        None => CliError::failure(format!("error: {err}")),
    }
}

// ============================================================================
// Commands
// ============================================================================

/// `testbed test`: discover transcripts under a path and run them.
pub fn run_tests(options: &TestOptions) -> CliResult<ExitCode> {
    // Flags only switch behavior on; the config file supplies the rest.
    let mut config = load_config(&options.config)?.with_filter(options.filter.clone());
    if options.verbose {
        config = config.with_verbose(true);
    }
    if options.exit_first {
        config = config.with_exit_first(true);
    }
    if options.no_color {
        config = config.with_color(false);
    }
    let color = config.color && io::stdout().is_terminal();

    let mut registry = Registry::new();
    let discovered = register_transcripts(&FsTranscriptDiscovery, &options.path, &mut registry)
        .map_err(|e| CliError::failure(format!("error: {e}")))?;
    for err in &discovered.errors {
        match err.diagnostic() {
            Some(diagnostic) => eprintln!("{}", render_diagnostic(&diagnostic).trim_end()),
            None => eprintln!("error: {err}"),
        }
    }

    if let Some(filter) = &config.filter {
        let dropped = registry.retain_matching(filter);
        tracing::debug!(filter = %filter, dropped, "keyword filter applied");
    }

    let mut store = Store::new(build_schema(&config)?);
    let mut controller = Controller::new(Loader::new(config.fixture_source())).with_exit_first(config.exit_first);
    let mut reporter = ConsoleReporter::stdout().with_color(color).with_verbose(config.verbose);
    let report = controller.run(&mut store, registry, &mut reporter);

    if !discovered.errors.is_empty() {
        return Err(CliError::failure(format!(
            "error: {} transcript file(s) could not be collected",
            discovered.errors.len()
        )));
    }
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// `testbed dump`: load fixtures into an empty store and print it.
pub fn dump_fixtures(
    fixtures: &[String],
    format: Format,
    entities: &[String],
    args: &ConfigArgs,
) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let mut store = Store::new(build_schema(&config)?);
    let loader = Loader::new(config.fixture_source());
    loader.load(&mut store, fixtures).map_err(|e| load_error(&e))?;

    let text = dump(&store, format, entities).map_err(|e| CliError::failure(format!("error: {e}")))?;
    print!("{text}");
    Ok(ExitCode::SUCCESS)
}

/// `testbed check`: parse and validate fixtures, then load them together to catch cross-fixture key clashes.
pub fn check_fixtures(fixtures: &[String], args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let loader = Loader::new(config.fixture_source());

    let mut total = 0;
    for name in fixtures {
        let fixture = loader.read(name, None).map_err(|e| load_error(&e))?;
        println!("{name}: {} records", fixture.records.len());
        total += fixture.records.len();
    }

    let mut store = Store::new(build_schema(&config)?);
    loader.load(&mut store, fixtures).map_err(|e| load_error(&e))?;
    println!("ok: {total} records in {} fixtures", fixtures.len());
    Ok(ExitCode::SUCCESS)
}
