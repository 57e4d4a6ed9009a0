//! # spool-cli
//!
//! Command-line client for npm-compatible package registries.
//!
//! This is the main entry point for the `spool` binary. It parses the command
//! line, sets up logging and panic reporting, and dispatches to the command
//! handlers, which drive `spool-registry` with layered configuration.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use spool_core::error::{SpoolError, SpoolResult};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Publish and manage packages on npm-compatible registries
#[derive(Parser)]
#[command(name = "spool", version, about = "Publish and manage registry packages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Registry base URL, overriding every config file
    #[arg(long, global = true, value_name = "URL")]
    pub registry: Option<String>,

    /// Bearer token for the registry
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Number of retries for failed requests
    #[arg(long, global = true, value_name = "N")]
    pub retries: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a packed tarball
    Publish {
        /// Packed package tarball (.tgz)
        tarball: Utf8PathBuf,
        /// Directory holding package.json
        #[arg(long, default_value = ".")]
        dir: Utf8PathBuf,
        /// Dist-tag for the new version
        #[arg(long)]
        tag: Option<String>,
        /// public or restricted
        #[arg(long)]
        access: Option<String>,
    },
    /// Remove one published version (<name>@<version>)
    Unpublish { spec: String },
    /// Manage dist-tags
    DistTag {
        #[command(subcommand)]
        action: DistTagCommand,
    },
    /// Star a package
    Star { name: String },
    /// Remove your star from a package
    Unstar { name: String },
    /// Deprecate versions (<name>@<range>); an empty message un-deprecates
    Deprecate { spec: String, message: String },
    /// Show a package document
    View {
        name: String,
        /// Print the raw document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the user the registry associates with your credentials
    Whoami,
}

#[derive(Subcommand)]
pub enum DistTagCommand {
    /// Point a tag at a version (<name>@<version> <tag>)
    Add { spec: String, tag: String },
    /// Remove a tag
    Rm { name: String, tag: String },
    /// List tags
    Ls { name: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    debug!("Starting Spool CLI v{}", env!("CARGO_PKG_VERSION"));

    let formatter = ErrorFormatter::new(!cli.no_color);
    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        },
    }
}

fn run_cli(cli: Cli) -> SpoolResult<()> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| SpoolError::io("Failed to create async runtime".to_string(), e))?;

    rt.block_on(async move {
        let ctx = CommandContext::new(&cli)?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "spool={level},spool_cli={level},spool_config={level},spool_registry={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Spool encountered an unexpected error: {}", panic_info);
        eprintln!("Spool crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/spool-pm/spool/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
