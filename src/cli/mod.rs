//! CLI module for framerunner
//!
//! The binary drives the scheduler through a headless host loop, the same way an interactive host would drive it from
//! its frame clock.
//!
//! ## Commands
//!
//! - `demo` - Run the built-in demo catalog (pytest-style output)
//! - `list` - Print the demo group tree
//!
//! ## Modules
//!
//! - `demo` - Demo catalog and hooks
//! - `host` - Headless frame loop
//! - `reporter` - Console observer
//!
//! ## Design
//!
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod demo;
pub mod host;
pub mod reporter;

use std::fmt;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::RunnerConfig;
use crate::errors::RunnerError;
use crate::scheduler::Scheduler;
use crate::snapshot::render_tree;

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

impl From<RunnerError> for CliError {
    fn from(err: RunnerError) -> Self {
        CliError::failure(format!("{:?}", miette::Report::new(err)))
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

/// Frame-stepped test orchestration
#[derive(Parser, Debug)]
#[command(name = "framerunner")]
#[command(version = VERSION)]
#[command(about = "Frame-stepped test orchestration engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo catalog through a headless host loop
    Demo {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Only run tests whose path contains this substring
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Print the final snapshot as JSON instead of console output
        #[arg(long)]
        json: bool,
        /// Stop the run after this many ticks
        #[arg(long, value_name = "N", default_value_t = 10_000)]
        max_ticks: u64,
        /// Simulated frame length in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 16)]
        frame_ms: u64,
        /// Include tests that fail on purpose
        #[arg(long)]
        with_failures: bool,
    },

    /// Print the demo group tree
    List {
        /// Mark tests whose path contains this substring as selected
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
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
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Demo {
            verbose,
            stop_on_fail,
            filter,
            json,
            max_ticks,
            frame_ms,
            with_failures,
        } => {
            let config = RunnerConfig::new()
                .with_frame_delta(Duration::from_millis(frame_ms))
                .with_stop_on_fail(stop_on_fail);
            run_demo(DemoOptions {
                config,
                verbose,
                filter,
                json,
                max_ticks,
                with_failures,
            })
        }
        Command::List { filter } => list_demo(filter.as_deref()),
    }
}

/// Options for `framerunner demo`.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub config: RunnerConfig,
    pub verbose: bool,
    pub filter: Option<String>,
    pub json: bool,
    pub max_ticks: u64,
    pub with_failures: bool,
}

fn demo_scheduler(config: RunnerConfig, with_failures: bool) -> Scheduler {
    let mut scheduler = Scheduler::new(config).with_hooks(demo::hooks());
    let report = scheduler.ingest(demo::catalog(with_failures));
    for diagnostic in &report.diagnostics {
        eprintln!("{:?}", miette::Report::new(diagnostic.clone()));
    }
    scheduler
}

/// Run the demo catalog and report pytest-style.
pub fn run_demo(options: DemoOptions) -> CliResult<ExitCode> {
    let mut scheduler = demo_scheduler(options.config, options.with_failures);

    let selected = match options.filter.as_deref() {
        Some(pattern) => scheduler.catalog_mut().select_matching(pattern),
        None => {
            scheduler.catalog_mut().select_all();
            scheduler.catalog().selected_units().len()
        }
    };
    if selected == 0 {
        return Err(CliError::failure("No tests collected"));
    }

    if !options.json {
        scheduler.add_observer(reporter::ConsoleReporter::new(options.verbose));
    }
    let summary = host::drive(&mut scheduler, options.max_ticks)?;

    if options.json {
        let rendered = serde_json::to_string_pretty(&scheduler.snapshot())
            .map_err(|e| CliError::failure(format!("Error serializing snapshot: {}", e)))?;
        println!("{}", rendered);
    }

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Print the demo tree with selection marks.
pub fn list_demo(filter: Option<&str>) -> CliResult<ExitCode> {
    let mut scheduler = demo_scheduler(RunnerConfig::default(), true);
    if let Some(pattern) = filter {
        scheduler.catalog_mut().select_matching(pattern);
    }
    print!("{}", render_tree(scheduler.catalog()));
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Tests
// ============================================================================
