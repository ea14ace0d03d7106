//! Command-line interface for cleanup.
//!
//! Parses arguments, merges them over the loaded configuration and runs a
//! cleanup pass, a revert, or one of the maintenance commands.

use crate::config::CleanupConfig;
use crate::error::{CleanupError, CleanupResult};
use crate::file_category::ExtensionTable;
use crate::file_organizer::{CleanupOutcome, FileOrganizer, MoveOptions, Stats};
use crate::ledger::{FsLedger, RevertLedger};
use crate::output::{OutputFormatter, PassKind, PassProgress};
use crate::prompt::{Confirmer, TerminalConfirmer};
use crate::rules::RuleSet;
use crate::scanner::ScanOptions;
use crate::undo::{RevertOutcome, UndoManager};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Command-line arguments for cleanup
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "cleanup",
    version,
    about = "Organize files into category directories, with dry runs and revert",
    long_about = "Moves the files of a directory into category subdirectories chosen by extension, \
                  filename pattern, size or modification date. Every pass is recorded so it can be \
                  reverted later."
)]
pub struct CliArgs {
    /// Directory to organize
    #[arg(required_unless_present = "init_config")]
    pub directory: Option<PathBuf>,

    /// Show what would be done without moving anything
    #[arg(short = 'd', long, conflicts_with = "silent")]
    pub dry_run: bool,

    /// Ask before each move
    #[arg(short, long)]
    pub interactive: bool,

    /// Print nothing except errors
    #[arg(short, long)]
    pub silent: bool,

    /// Revert a previous pass instead of organizing
    #[arg(short, long)]
    pub revert: bool,

    /// Revert point to restore (defaults to the latest)
    #[arg(short, long, requires = "revert", value_name = "TIMESTAMP")]
    pub timestamp: Option<String>,

    /// List the revert points stored for the directory
    #[arg(long, conflicts_with = "revert")]
    pub list_reverts: bool,

    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write the log to this file
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Comma-separated globs; only matching files are organized
    #[arg(short = 'p', long = "pattern", value_delimiter = ',')]
    pub patterns: Vec<String>,

    /// Comma-separated globs of files to leave alone
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    pub excludes: Vec<String>,

    /// Scan subdirectories too
    #[arg(long)]
    pub recursive: bool,

    /// Worker threads for moving files
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub threads: Option<usize>,

    /// Stage each move through a quarantine directory
    #[arg(short, long)]
    pub quarantine: bool,

    /// Write an example configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    pub init_config: Option<PathBuf>,
}

impl CliArgs {
    /// Applies command-line overrides on top of `config`.
    ///
    /// Switches are OR'd with the configured values; `--threads` and the
    /// pattern lists replace the configured values only when given.
    pub fn merge_into(&self, mut config: CleanupConfig) -> CleanupConfig {
        config.recursive |= self.recursive;
        config.quarantine |= self.quarantine;
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if !self.patterns.is_empty() {
            config.include_patterns = self.patterns.clone();
        }
        if !self.excludes.is_empty() {
            config.exclude_patterns = self.excludes.clone();
        }
        config.threads = config.threads.max(1);
        config
    }
}

/// Runs the CLI with the on-disk ledger and terminal prompts.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use cleanup::cli::{CliArgs, run_cli};
///
/// let args = CliArgs::parse_from(["cleanup", "--dry-run", "/path/to/directory"]);
/// if let Err(e) = run_cli(&args) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(args: &CliArgs) -> CleanupResult<()> {
    let ledger = FsLedger::new()?;
    let cancel = Arc::new(AtomicBool::new(false));
    if !args.revert && !args.list_reverts {
        install_interrupt_handler(&cancel);
    }
    run_cli_with(args, &ledger, Arc::new(TerminalConfirmer), cancel)
}

/// Routes Ctrl-C into `cancel`, so a running pass stops handing out files
/// and still records the moves already made. A second Ctrl-C exits at once.
fn install_interrupt_handler(cancel: &Arc<AtomicBool>) {
    let cancel = Arc::clone(cancel);
    let installed = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        warn!("Interrupted, stopping after the files in progress");
    });
    if let Err(e) = installed {
        warn!(error = %e, "Could not install interrupt handler");
    }
}

/// Runs the CLI against the given ledger and confirmer.
///
/// A cleanup pass stops early once `cancel` is set; moves completed
/// before that are still recorded.
pub fn run_cli_with(
    args: &CliArgs,
    ledger: &dyn RevertLedger,
    confirmer: Arc<dyn Confirmer>,
    cancel: Arc<AtomicBool>,
) -> CleanupResult<()> {
    if let Some(path) = &args.init_config {
        CleanupConfig::example().save(path)?;
        if !args.silent {
            OutputFormatter::success(&format!(
                "Example configuration written to {}",
                path.display()
            ));
        }
        if args.directory.is_none() {
            return Ok(());
        }
    }

    let Some(directory) = &args.directory else {
        return Ok(());
    };
    let directory = absolute_dir(directory)?;

    if args.list_reverts {
        let points = ledger.list_passes(&directory)?;
        OutputFormatter::revert_points(&points);
        return Ok(());
    }

    if args.revert {
        return revert_directory(args, &directory, ledger);
    }

    let config = args.merge_into(CleanupConfig::load_or_default(args.config.as_deref()));
    organize_directory(args, &directory, &config, ledger, confirmer, cancel)
}

fn absolute_dir(directory: &Path) -> CleanupResult<PathBuf> {
    let directory = std::path::absolute(directory).map_err(|e| CleanupError::Io {
        path: directory.to_path_buf(),
        source: e,
    })?;
    if !directory.is_dir() {
        return Err(CleanupError::DirectoryNotFound(directory));
    }
    Ok(directory)
}

fn organize_directory(
    args: &CliArgs,
    directory: &Path,
    config: &CleanupConfig,
    ledger: &dyn RevertLedger,
    confirmer: Arc<dyn Confirmer>,
    cancel: Arc<AtomicBool>,
) -> CleanupResult<()> {
    if !args.silent {
        let verb = if args.dry_run { "Analyzing" } else { "Organizing" };
        OutputFormatter::info(&format!("{} contents of: {}", verb, directory.display()));
    }

    let scan_options = ScanOptions::new(
        config.recursive,
        &config.include_patterns,
        &config.exclude_patterns,
    );
    let options = MoveOptions {
        dry_run: args.dry_run,
        interactive: args.interactive,
        quarantine: config.quarantine,
        threads: config.threads,
        cancel,
    };
    let organizer = FileOrganizer::new(directory, RuleSet::compile(&config.rules), options)
        .with_confirmer(confirmer);

    let mut progress = PassProgress::new(PassKind::Cleanup, args.silent);
    let outcome = organizer.cleanup(
        &scan_options,
        &ExtensionTable::default(),
        ledger,
        &mut progress,
    )?;
    progress.finish();

    match outcome {
        CleanupOutcome::NothingToDo => {
            if !args.silent {
                OutputFormatter::info("No files found to organize.");
            }
        }
        CleanupOutcome::Completed {
            stats,
            timestamp,
            cancelled,
        } => {
            log_summary(&stats);
            if args.silent {
                return Ok(());
            }
            if !progress.category_counts().is_empty() {
                OutputFormatter::summary_table(progress.category_counts(), stats.success);
            }
            OutputFormatter::pass_summary(&stats);
            if cancelled {
                OutputFormatter::warning("Cancelled before all files were processed.");
            }
            if args.dry_run {
                OutputFormatter::dry_run_notice("No files were modified.");
            } else if let Some(timestamp) = timestamp {
                OutputFormatter::plain(&format!(
                    "Revert point {} saved. Use 'cleanup --revert {}' to undo.",
                    timestamp,
                    directory.display()
                ));
            }
        }
    }
    Ok(())
}

fn revert_directory(args: &CliArgs, directory: &Path, ledger: &dyn RevertLedger) -> CleanupResult<()> {
    if !args.silent {
        OutputFormatter::info(&format!("Reverting changes in: {}", directory.display()));
    }

    let mut progress = PassProgress::new(PassKind::Revert, args.silent);
    let outcome = UndoManager::revert(
        directory,
        ledger,
        args.timestamp.as_deref(),
        args.dry_run,
        &mut progress,
    )?;
    progress.finish();

    match outcome {
        RevertOutcome::NothingToDo { available } => {
            if !args.silent {
                OutputFormatter::warning("No revert information found for this directory.");
                OutputFormatter::revert_points(&available);
            }
        }
        RevertOutcome::Completed {
            stats,
            removed_dirs,
        } => {
            log_summary(&stats);
            if args.silent {
                return Ok(());
            }
            OutputFormatter::pass_summary(&stats);
            if !removed_dirs.is_empty() {
                OutputFormatter::plain(&format!(
                    "Removed {} empty director{}.",
                    removed_dirs.len(),
                    if removed_dirs.len() == 1 { "y" } else { "ies" }
                ));
            }
            if args.dry_run {
                OutputFormatter::dry_run_notice("No files were modified.");
            }
        }
    }
    Ok(())
}

fn log_summary(stats: &Stats) {
    info!(
        "{} succeeded, {} skipped, {} failed",
        stats.success, stats.skipped, stats.error
    );
}
