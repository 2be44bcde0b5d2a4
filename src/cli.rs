//! Command-line interface module for pkgtidy.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing
//! - Configuration loading and command-line overrides
//! - Running each operation on a background worker
//! - Rendering results

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::ExtractionBatch;
use crate::mapping::MappingManager;
use crate::output::{OutputFormatter, TaskOutput};
use crate::restore::RestoreManager;
use crate::sink::LogSink;
use crate::status::StatusReporter;
use crate::worker;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sorts extracted asset projects into categories and backs them up around
/// in-place extraction.
#[derive(Debug, Parser)]
#[command(name = "pkgtidy", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to .pkgtidyrc.toml, then ~/.config/pkgtidy/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append debug logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Move every project into a directory named after its declared type
    Classify {
        root: PathBuf,
        /// Create mapping links afterwards
        #[arg(long)]
        map: bool,
        /// Show what would be moved without moving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Create hidden links to every classified project at the root
    Map { root: PathBuf },
    /// Remove every link directly under the root
    Unmap { root: PathBuf },
    /// Show category counts and mapping links
    Status { root: PathBuf },
    /// Extract every package under INPUT, backing up first when in place
    Extract {
        input: PathBuf,
        /// Output root (defaults to INPUT, which extracts in place)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Do not back up projects before an in-place extraction
        #[arg(long)]
        no_backup: bool,
        /// Only look for packages directly in INPUT
        #[arg(long)]
        no_recursive: bool,
    },
    /// List batch backups, newest first
    Backups { root: PathBuf },
    /// Restore every project of a batch backup
    Restore {
        root: PathBuf,
        batch: String,
        /// Confirm that extracted files may be deleted
        #[arg(long)]
        yes: bool,
    },
}

/// Runs the parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use pkgtidy::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["pkgtidy", "status", "/wallpapers"]);
/// if let Err(e) = run(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify { root, map, dry_run } => {
            let mut classifier = Classifier::from_config(&config)?;
            if map || config.classify.create_mapping {
                classifier = classifier.with_mapping(MappingManager::default());
            }
            if dry_run {
                OutputFormatter::dry_run_notice("No changes will be made");
                run_task("classify", move |sink| classifier.dry_run(&root, sink))?;
                return Ok(());
            }

            let report = run_task("classify", move |sink| classifier.classify(&root, sink))?;
            if report.errors > 0 {
                OutputFormatter::warning(&format!(
                    "{} project(s) could not be moved. Please review errors above.",
                    report.errors
                ));
            }
        }
        Commands::Map { root } => {
            run_task("map", move |sink| {
                MappingManager::default().create_mappings(&root, sink)
            })?;
        }
        Commands::Unmap { root } => {
            run_task("unmap", move |sink| {
                MappingManager::default().remove_all_mappings(&root, sink)
            })?;
        }
        Commands::Status { root } => {
            let report = run_task("status", move |sink| {
                StatusReporter::default().list_status(&root, sink)
            })?;
            OutputFormatter::status_table(&report);
        }
        Commands::Extract {
            input,
            output,
            no_backup,
            no_recursive,
        } => {
            if no_backup {
                config.backup.auto_backup = false;
            }
            if no_recursive {
                config.extract.recursive = false;
            }
            let output = output.unwrap_or_else(|| input.clone());
            let batch = ExtractionBatch::from_config(&config)?;

            let summary = run_task("extract", {
                let output = output.clone();
                move |sink| batch.run(&input, &output, sink)
            })?;
            if let Some(batch) = &summary.batch {
                OutputFormatter::success(&format!(
                    "Backups saved as {}. Use 'pkgtidy restore {} {} --yes' to revert.",
                    batch.id,
                    output.display(),
                    batch.id
                ));
            }
        }
        Commands::Backups { root } => {
            let manager = RestoreManager::from_config(&config.backup);
            let ids = run_task("backups", move |_sink| manager.list_backups(&root))?;
            if ids.is_empty() {
                OutputFormatter::warning("No batch backups found");
            } else {
                OutputFormatter::header("BACKUPS");
                for id in ids {
                    println!("{}", id);
                }
            }
        }
        Commands::Restore { root, batch, yes } => {
            if !yes {
                return Err(Error::NotConfirmed {
                    operation: format!("Restoring {}", batch),
                });
            }
            let manager = RestoreManager::from_config(&config.backup);
            run_task("restore", move |sink| manager.restore_batch(&root, &batch, sink))?;
        }
    }

    Ok(())
}

/// Runs `job` on a background worker and renders its events until it finishes.
fn run_task<T, F>(name: &str, job: F) -> Result<T>
where
    F: FnOnce(&dyn LogSink) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = worker::spawn_task(&format!("pkgtidy-{}", name), job)?;
    let mut output = TaskOutput::new();
    let result = task.wait(|event| output.handle(event));
    output.finish();
    result?
}
