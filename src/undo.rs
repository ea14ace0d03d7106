//! Reverting cleanup passes.
//!
//! A revert loads one ledger snapshot for a directory and moves every
//! recorded file from `directory/category/name` back to `directory/name`,
//! then removes the directories left empty.

use crate::error::{CleanupError, CleanupResult};
use crate::file_organizer::{MoveResult, PassObserver, Stats};
use crate::ledger::{PassInfo, RevertEntry, RevertLedger};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// How a revert ended.
#[derive(Debug, Clone)]
pub enum RevertOutcome {
    /// The requested snapshot is missing or empty. Lists what is available.
    NothingToDo { available: Vec<PassInfo> },
    Completed {
        stats: Stats,
        /// Empty directories removed after the files were restored.
        removed_dirs: Vec<PathBuf>,
    },
}

/// Manages revert operations for cleanup passes.
pub struct UndoManager;

impl UndoManager {
    /// Reverts the snapshot `timestamp`, or the latest one when `None`.
    ///
    /// Every entry is restored independently; a file that is no longer at
    /// its recorded location counts as an error and the rest continue. A
    /// file already sitting at the original location is renamed to
    /// `<name>.bak.<YYYYmmdd-HHMMSS>` first.
    ///
    /// In dry-run mode nothing is moved or removed: entries whose file is
    /// present count as successes and missing ones as errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cleanup::ledger::FsLedger;
    /// use cleanup::undo::{RevertOutcome, UndoManager};
    /// use std::path::Path;
    ///
    /// let ledger = FsLedger::new().unwrap();
    /// match UndoManager::revert(Path::new("/path/to/dir"), &ledger, None, false, &mut ()) {
    ///     Ok(RevertOutcome::Completed { stats, .. }) => println!("Restored {} files", stats.success),
    ///     Ok(RevertOutcome::NothingToDo { available }) => println!("{} revert points", available.len()),
    ///     Err(e) => eprintln!("Revert failed: {}", e),
    /// }
    /// ```
    pub fn revert(
        directory: &Path,
        ledger: &dyn RevertLedger,
        timestamp: Option<&str>,
        dry_run: bool,
        observer: &mut dyn PassObserver,
    ) -> CleanupResult<RevertOutcome> {
        if !directory.is_dir() {
            return Err(CleanupError::DirectoryNotFound(directory.to_path_buf()));
        }

        let entries = ledger.load_pass(directory, timestamp)?;
        if entries.is_empty() {
            let available = ledger.list_passes(directory)?;
            info!(
                directory = %directory.display(),
                requested = timestamp.unwrap_or("latest"),
                available = available.len(),
                "No revert information found"
            );
            return Ok(RevertOutcome::NothingToDo { available });
        }

        let mut stats = Stats::default();
        observer.on_start(entries.len());
        // Last move first.
        for entry in entries.iter().rev() {
            let result = Self::restore_entry(directory, entry, dry_run);
            stats.record(&result);
            observer.on_result(&result);
        }

        let removed_dirs = if dry_run {
            Vec::new()
        } else {
            remove_empty_dirs(directory)
        };

        info!(
            succeeded = stats.success,
            skipped = stats.skipped,
            failed = stats.error,
            removed_dirs = removed_dirs.len(),
            "Revert finished"
        );

        Ok(RevertOutcome::Completed {
            stats,
            removed_dirs,
        })
    }

    fn restore_entry(directory: &Path, entry: &RevertEntry, dry_run: bool) -> MoveResult {
        let current = directory.join(&entry.category).join(&entry.name);
        let original = directory.join(&entry.name);
        let name = entry.name.clone();
        let category = entry.category.clone();

        if !current.is_file() {
            let message = format!("File not found at expected location {}", current.display());
            error!(file = %name, "{}", message);
            return MoveResult::Error {
                name,
                category,
                message,
            };
        }

        if dry_run {
            return MoveResult::WouldMove { name, category };
        }

        match Self::restore_file(&current, &original) {
            Ok(()) => {
                info!(file = %name, from = %category, "Restored {}", name);
                MoveResult::Success { name, category }
            }
            Err(message) => {
                error!(file = %name, "{}", message);
                MoveResult::Error {
                    name,
                    category,
                    message,
                }
            }
        }
    }

    /// Moves `current` back to `original`, backing up anything in the way.
    fn restore_file(current: &Path, original: &Path) -> Result<(), String> {
        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                format!("Could not create directory {}: {}", parent.display(), e)
            })?;
        }

        if original.exists() {
            let backup_path = Self::generate_backup_path(original);
            fs::rename(original, &backup_path)
                .map_err(|e| format!("Could not backup conflicting file: {}", e))?;
            warn!(
                conflict = %original.display(),
                backup = %backup_path.display(),
                "Backed up conflicting file"
            );
        }

        fs::rename(current, original).map_err(|e| format!("Failed to restore file: {}", e))
    }

    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let backup_name = format!("{}.bak.{}", filename, timestamp);

        match original_path.parent() {
            Some(parent) => parent.join(backup_name),
            None => PathBuf::from(backup_name),
        }
    }
}

/// Removes every empty directory below `root`, deepest first. `root`
/// itself is kept. Returns the removed paths.
fn remove_empty_dirs(root: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let dirs = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir());

    for entry in dirs {
        let path = entry.path();
        let is_empty = match fs::read_dir(path) {
            Ok(mut children) => children.next().is_none(),
            Err(_) => false,
        };
        if !is_empty {
            continue;
        }
        match fs::remove_dir(path) {
            Ok(()) => {
                info!(directory = %path.display(), "Removed empty directory");
                removed.push(path.to_path_buf());
            }
            Err(e) => warn!(directory = %path.display(), error = %e, "Could not remove directory"),
        }
    }
    removed
}
