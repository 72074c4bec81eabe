//! Via-gent CLI - sync a local project directory into a container directory.
//!
//! The CLI drives the same engine the browser workspace uses. A directory on
//! disk stands in for the container filesystem, so a pass can be run,
//! inspected and repeated from a terminal.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod progress;
mod theme;

use commands::{config, patterns, permission, sync};
use theme::Theme;

/// Via-gent - local workspace sync
#[derive(Parser)]
#[command(name = "viagent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a local directory into a container directory
    Sync {
        /// Local project directory
        source: PathBuf,

        /// Directory standing in for the container filesystem
        target: PathBuf,

        /// Also delete container entries that no longer exist locally
        #[arg(long)]
        full: bool,

        /// Extra exclusion pattern (repeatable)
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Start from the extended default exclusions
        #[arg(long)]
        extended: bool,

        /// File copies in flight
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Remember the directory and sync time under this project id
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Show or check exclusion patterns
    Patterns {
        /// Start from the extended default exclusions
        #[arg(long)]
        extended: bool,

        /// Validate a pattern instead of listing (repeatable)
        #[arg(long, value_name = "PATTERN")]
        check: Vec<String>,

        /// Report whether a path would be excluded (repeatable)
        #[arg(long = "test", value_name = "PATH")]
        test_paths: Vec<String>,
    },

    /// Show the permission state of a local directory
    Permission {
        /// Local directory
        dir: PathBuf,

        /// Save the directory reference for a project
        #[arg(long, value_name = "PROJECT")]
        remember: Option<String>,
    },

    /// Show the resolved configuration
    Config {
        /// Show only one section (sync, logging, storage)
        #[arg(short, long)]
        section: Option<String>,
    },
}

/// Output format shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Colored, human-readable output.
    Pretty,
    /// Machine-readable JSON on stdout.
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace_root = std::env::current_dir().ok();
    let resolved = viagent_config::Config::load(workspace_root.as_deref());

    // Set up logging from config, with --verbose override.
    let log_config = match resolved
        .as_ref()
        .ok()
        .map(|r| viagent_telemetry::LogConfig::from_section(&r.config.logging))
    {
        Some(Ok(mut lc)) => {
            if cli.verbose {
                "debug".clone_into(&mut lc.level);
            }
            lc.with_target(viagent_telemetry::LogTarget::Stderr)
        },
        _ => {
            let level = if cli.verbose { "debug" } else { "warn" };
            viagent_telemetry::LogConfig::new(level)
                .with_format(viagent_telemetry::LogFormat::Compact)
                .with_target(viagent_telemetry::LogTarget::Stderr)
        },
    };
    if let Err(e) = viagent_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let format = match cli.format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Pretty,
    };

    match cli.command {
        Commands::Sync {
            source,
            target,
            full,
            exclude,
            extended,
            concurrency,
            project,
        } => {
            let args = sync::SyncArgs {
                source,
                target,
                full,
                exclude,
                extended,
                concurrency,
                project,
            };
            sync::run_sync(args, &config_or_default(resolved), format).await
        },
        Commands::Patterns {
            extended,
            check,
            test_paths,
        } => patterns::run_patterns(
            &config_or_default(resolved),
            extended,
            &check,
            &test_paths,
            format,
        ),
        Commands::Permission { dir, remember } => {
            let cfg = config_or_default(resolved);
            permission::show_permission(&dir, remember.as_deref(), &cfg, format).await
        },
        // Only `config` fails on a broken config file.
        Commands::Config { section } => config::show_config(&resolved?, section.as_deref(), format),
    }
}

fn config_or_default(
    resolved: viagent_config::ConfigResult<viagent_config::ResolvedConfig>,
) -> viagent_config::Config {
    match resolved {
        Ok(r) => r.config,
        Err(e) => {
            eprintln!("{}", Theme::warning(&format!("Using default config: {e}")));
            viagent_config::Config::default()
        },
    }
}
