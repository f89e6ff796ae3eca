//! CLI module for the testbed harness
//!
//! ## Commands
//!
//! - `test [path]` - Discover `*.transcript` files and run them (pytest-style output)
//! - `dump <fixture>...` - Load fixtures into a fresh store and print it in a fixture format
//! - `check <fixture>...` - Validate fixtures without running anything
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use testbed_syntax::Format;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Test discovery and fixture lifecycle harness
#[derive(Parser, Debug)]
#[command(name = "testbed")]
#[command(version = VERSION)]
#[command(about = "Test discovery and fixture lifecycle harness", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that touches fixtures.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file (default: ./testbed.json when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fixture search directory; repeatable, earlier wins
    #[arg(long = "fixture-dir", value_name = "DIR")]
    pub fixture_dirs: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run transcript tests (pytest-style)
    Test {
        /// Transcript file or directory
        #[arg(value_name = "PATH", default_value = ".")]
        path: PathBuf,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        exit_first: bool,
        /// Filter units by keyword
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Disable ANSI colors
        #[arg(long)]
        no_color: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Load fixtures and print the resulting store
    Dump {
        /// Fixture names (`polls`, `polls.json`, `polls.fixture`)
        #[arg(value_name = "FIXTURE", required = true)]
        fixtures: Vec<String>,
        /// Output format
        #[arg(long, value_name = "FORMAT", default_value = "json")]
        format: Format,
        /// Only dump these entity types; repeatable
        #[arg(long = "entity", value_name = "NAME")]
        entities: Vec<String>,
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Validate fixtures and print record counts
    Check {
        /// Fixture names
        #[arg(value_name = "FIXTURE", required = true)]
        fixtures: Vec<String>,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Test {
            path,
            verbose,
            exit_first,
            filter,
            no_color,
            config,
        } => commands::run_tests(&commands::TestOptions {
            path,
            verbose,
            exit_first,
            filter,
            no_color,
            config,
        }),
        Command::Dump {
            fixtures,
            format,
            entities,
            config,
        } => commands::dump_fixtures(&fixtures, format, &entities, &config),
        Command::Check { fixtures, config } => commands::check_fixtures(&fixtures, &config),
    }
}

// ============================================================================
// Tests
// ============================================================================
