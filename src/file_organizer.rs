//! Moving files into category directories.
//!
//! A cleanup pass scans the target directory, resolves each file's final
//! category through the configured rules, moves it into
//! `root/<category>/<name>` (optionally through a quarantine directory),
//! and finally records the successful moves in the revert ledger.
//!
//! Per-file failures never abort a pass; they are returned as
//! [`MoveResult::Error`] and counted in [`Stats`].

use crate::error::CleanupResult;
use crate::file_category::ExtensionTable;
use crate::ledger::{RevertEntry, RevertLedger};
use crate::prompt::{AlwaysConfirm, Confirmer};
use crate::rules::RuleSet;
use crate::scanner::{self, FileRecord, ScanOptions};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{error, info};

/// Staging directory used by quarantine mode, relative to the pass root.
pub const QUARANTINE_DIR: &str = ".cleanup_quarantine";

/// Errors from a single file move.
#[derive(Error, Debug)]
pub enum MoveError {
    /// Failed to create a category (or quarantine) directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to move a file.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The destination is already taken.
    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
}

/// Outcome of processing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResult {
    Success {
        name: String,
        category: String,
    },
    Skipped {
        name: String,
        category: String,
    },
    Error {
        name: String,
        category: String,
        message: String,
    },
    WouldMove {
        name: String,
        category: String,
    },
}

impl MoveResult {
    pub fn name(&self) -> &str {
        match self {
            MoveResult::Success { name, .. }
            | MoveResult::Skipped { name, .. }
            | MoveResult::Error { name, .. }
            | MoveResult::WouldMove { name, .. } => name,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            MoveResult::Success { category, .. }
            | MoveResult::Skipped { category, .. }
            | MoveResult::Error { category, .. }
            | MoveResult::WouldMove { category, .. } => category,
        }
    }
}

/// Aggregate counts for a pass. Dry-run moves count as successes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
}

impl Stats {
    pub fn record(&mut self, result: &MoveResult) {
        match result {
            MoveResult::Success { .. } | MoveResult::WouldMove { .. } => self.success += 1,
            MoveResult::Error { .. } => self.error += 1,
            MoveResult::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.error + self.skipped
    }
}

/// Receives progress from a running pass.
pub trait PassObserver {
    /// Called once, before any file is processed.
    fn on_start(&mut self, _total: usize) {}

    /// Called for every processed file, in completion order.
    fn on_result(&mut self, _result: &MoveResult) {}
}

impl PassObserver for () {}

/// Switches controlling how files are moved.
#[derive(Debug, Clone)]
pub struct MoveOptions {
    pub dry_run: bool,
    pub interactive: bool,
    pub quarantine: bool,
    /// Worker count; values above 1 enable parallel moves for
    /// non-interactive, non-dry-run passes.
    pub threads: usize,
    /// Set to stop processing files that have not started yet.
    pub cancel: Arc<AtomicBool>,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            interactive: false,
            quarantine: false,
            threads: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Result of the move phase.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub stats: Stats,
    /// Successful moves only, in completion order.
    pub revert_entries: Vec<RevertEntry>,
    /// True if cancellation left files unprocessed.
    pub cancelled: bool,
}

impl PassReport {
    fn absorb(&mut self, result: &MoveResult) {
        self.stats.record(result);
        if let MoveResult::Success { name, category } = result {
            self.revert_entries.push(RevertEntry::new(name, category));
        }
    }
}

/// How a cleanup pass ended.
#[derive(Debug, Clone)]
pub enum CleanupOutcome {
    /// No candidate files were found; nothing was touched.
    NothingToDo,
    Completed {
        stats: Stats,
        /// Ledger snapshot id, when one was written.
        timestamp: Option<String>,
        cancelled: bool,
    },
}

/// Organizes files by moving them into category subdirectories of `root`.
pub struct FileOrganizer {
    root: PathBuf,
    rules: RuleSet,
    options: MoveOptions,
    confirmer: Arc<dyn Confirmer>,
}

impl FileOrganizer {
    pub fn new(root: impl Into<PathBuf>, rules: RuleSet, options: MoveOptions) -> Self {
        Self {
            root: root.into(),
            rules,
            options,
            confirmer: Arc::new(AlwaysConfirm),
        }
    }

    /// Replaces the confirmer consulted in interactive mode.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    fn is_cancelled(&self) -> bool {
        self.options.cancel.load(Ordering::Relaxed)
    }

    /// Runs a full cleanup pass: scan, move, then record the successful
    /// moves in `ledger` (non-dry-run passes with at least one move only).
    ///
    /// # Errors
    ///
    /// Fails if the root is missing or unreadable, the worker pool cannot
    /// start, or the ledger snapshot cannot be written.
    pub fn cleanup(
        &self,
        scan_options: &ScanOptions,
        table: &ExtensionTable,
        ledger: &dyn RevertLedger,
        observer: &mut dyn PassObserver,
    ) -> CleanupResult<CleanupOutcome> {
        let records = scanner::scan(&self.root, scan_options, table)?;
        if records.is_empty() {
            info!(directory = %self.root.display(), "Nothing to do, no matching files found");
            return Ok(CleanupOutcome::NothingToDo);
        }

        let report = self.run_pass(records, observer)?;

        let timestamp = if self.options.dry_run || report.revert_entries.is_empty() {
            None
        } else {
            Some(ledger.record_pass(&self.root, &report.revert_entries)?)
        };

        info!(
            succeeded = report.stats.success,
            skipped = report.stats.skipped,
            failed = report.stats.error,
            timestamp = timestamp.as_deref().unwrap_or("-"),
            "Cleanup pass finished"
        );

        Ok(CleanupOutcome::Completed {
            stats: report.stats,
            timestamp,
            cancelled: report.cancelled,
        })
    }

    /// Processes `records`, sequentially or on a worker pool.
    ///
    /// Results are collected by the calling thread as workers finish, so
    /// only the caller touches the report and the observer.
    pub fn run_pass(
        &self,
        records: Vec<FileRecord>,
        observer: &mut dyn PassObserver,
    ) -> CleanupResult<PassReport> {
        let total = records.len();
        let parallel =
            self.options.threads > 1 && !self.options.dry_run && !self.options.interactive;
        let mut report = PassReport::default();
        observer.on_start(total);

        if parallel {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.options.threads)
                .thread_name(|i| format!("cleanup-worker-{}", i))
                .build()?;
            let (sender, receiver) = crossbeam_channel::unbounded::<MoveResult>();

            pool.in_place_scope(|scope| {
                for record in records {
                    let sender = sender.clone();
                    scope.spawn(move |_| {
                        if self.is_cancelled() {
                            return;
                        }
                        // The receiver outlives every worker.
                        let _ = sender.send(self.process(&record));
                    });
                }
                drop(sender);

                for result in receiver.iter() {
                    report.absorb(&result);
                    observer.on_result(&result);
                }
            });
        } else {
            for record in &records {
                if self.is_cancelled() {
                    break;
                }
                let result = self.process(record);
                report.absorb(&result);
                observer.on_result(&result);
            }
        }

        report.cancelled = report.stats.total() < total;
        if report.cancelled {
            info!(
                processed = report.stats.total(),
                total, "Pass cancelled before all files were processed"
            );
        }
        Ok(report)
    }

    /// Moves a single file into its category directory.
    ///
    /// Steps, in order: resolve the category, prepare the quarantine
    /// directory, ask for confirmation, stop here on dry runs, then move.
    pub fn process(&self, record: &FileRecord) -> MoveResult {
        let name = record.name.clone();
        let category = self.rules.evaluate(record);
        let target_path = self.root.join(&category).join(&record.name);

        let quarantine_path = if self.options.quarantine && !self.options.dry_run {
            let quarantine_dir = self.root.join(QUARANTINE_DIR);
            if let Err(e) = ensure_dir(&quarantine_dir) {
                return self.failed(name, category, e);
            }
            Some(quarantine_dir.join(&record.name))
        } else {
            None
        };

        if self.options.interactive
            && !self.options.dry_run
            && !self.confirmer.confirm(&name, &category)
        {
            info!(file = %name, category = %category, "Skipped by user");
            return MoveResult::Skipped { name, category };
        }

        if self.options.dry_run {
            return MoveResult::WouldMove { name, category };
        }

        match move_file(&record.path, &target_path, quarantine_path.as_deref()) {
            Ok(()) => {
                info!(file = %name, category = %category, "Moved {} to {} directory", name, category);
                MoveResult::Success { name, category }
            }
            Err(e) => self.failed(name, category, e),
        }
    }

    fn failed(&self, name: String, category: String, e: MoveError) -> MoveResult {
        error!(file = %name, category = %category, error = %e, "Error moving {}", name);
        MoveResult::Error {
            name,
            category,
            message: e.to_string(),
        }
    }
}

/// Creates `path` and its parents. A directory created concurrently by
/// another worker counts as success.
fn ensure_dir(path: &Path) -> Result<(), MoveError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(MoveError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), MoveError> {
    fs::rename(from, to).map_err(|e| MoveError::FileMoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })
}

/// Moves `source` to `target`, through `quarantine` when given. A failure
/// on the second hop leaves the file in quarantine.
fn move_file(source: &Path, target: &Path, quarantine: Option<&Path>) -> Result<(), MoveError> {
    if target.exists() {
        return Err(MoveError::DestinationExists(target.to_path_buf()));
    }
    if let Some(parent) = target.parent() {
        ensure_dir(parent)?;
    }

    match quarantine {
        Some(staging) => {
            if staging.exists() {
                return Err(MoveError::DestinationExists(staging.to_path_buf()));
            }
            if let Some(parent) = staging.parent() {
                ensure_dir(parent)?;
            }
            rename(source, staging)?;
            rename(staging, target)
        }
        None => rename(source, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::prompt::NeverConfirm;
    use crate::rules::{PatternMapping, Rule};
    use tempfile::TempDir;

    fn write(root: &Path, name: &str) -> FileRecord {
        let path = root.join(name);
        fs::write(&path, b"test content").expect("Failed to write test file");
        FileRecord {
            name: name.to_string(),
            path,
            category: ExtensionTable::default()
                .classify(name)
                .unwrap_or("Other")
                .to_string(),
        }
    }

    fn organizer(root: &Path, options: MoveOptions) -> FileOrganizer {
        FileOrganizer::new(root, RuleSet::default(), options)
    }

    #[test]
    fn test_process_creates_category_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let record = write(base_path, "test.txt");

        let result = organizer(base_path, MoveOptions::default()).process(&record);

        assert_eq!(
            result,
            MoveResult::Success {
                name: "test.txt".to_string(),
                category: "Documents".to_string()
            }
        );
        assert!(base_path.join("Documents").is_dir());
        assert!(base_path.join("Documents").join("test.txt").exists());
        assert!(!record.path.exists());
    }

    #[test]
    fn test_process_uses_existing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Images")).expect("Failed to create category directory");
        let record = write(base_path, "test.png");

        let result = organizer(base_path, MoveOptions::default()).process(&record);

        assert!(matches!(result, MoveResult::Success { .. }));
        assert!(base_path.join("Images").join("test.png").exists());
    }

    #[test]
    fn test_process_applies_rules() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let record = write(base_path, "server.log.txt");
        let rules = RuleSet::compile(&[Rule::Pattern {
            patterns: vec![PatternMapping::new("*.log*", "Logs")],
        }]);

        let result = FileOrganizer::new(base_path, rules, MoveOptions::default()).process(&record);

        assert_eq!(result.category(), "Logs");
        assert!(base_path.join("Logs").join("server.log.txt").exists());
    }

    #[test]
    fn test_dry_run_does_not_touch_filesystem() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let record = write(base_path, "report.pdf");
        let options = MoveOptions {
            dry_run: true,
            quarantine: true,
            interactive: true,
            ..Default::default()
        };

        let result = FileOrganizer::new(base_path, RuleSet::default(), options)
            .with_confirmer(Arc::new(NeverConfirm))
            .process(&record);

        assert!(matches!(result, MoveResult::WouldMove { .. }));
        assert!(record.path.exists());
        assert!(!base_path.join("Documents").exists());
        assert!(!base_path.join(QUARANTINE_DIR).exists());
    }

    #[test]
    fn test_interactive_decline_skips() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let record = write(base_path, "report.pdf");
        let options = MoveOptions {
            interactive: true,
            ..Default::default()
        };

        let result = FileOrganizer::new(base_path, RuleSet::default(), options)
            .with_confirmer(Arc::new(NeverConfirm))
            .process(&record);

        assert!(matches!(result, MoveResult::Skipped { .. }));
        assert!(record.path.exists());
        assert!(!base_path.join("Documents").exists());
    }

    #[test]
    fn test_quarantine_two_step_move() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let record = write(base_path, "song.mp3");
        let options = MoveOptions {
            quarantine: true,
            ..Default::default()
        };

        let result = organizer(base_path, options).process(&record);

        assert!(matches!(result, MoveResult::Success { .. }));
        assert!(base_path.join("Audio").join("song.mp3").exists());
        // The staging directory stays behind, empty.
        let quarantine = base_path.join(QUARANTINE_DIR);
        assert!(quarantine.is_dir());
        assert_eq!(fs::read_dir(quarantine).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_source_reports_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let record = FileRecord {
            name: "ghost.pdf".to_string(),
            path: base_path.join("ghost.pdf"),
            category: "Documents".to_string(),
        };

        let result = organizer(base_path, MoveOptions::default()).process(&record);

        match result {
            MoveResult::Error { message, .. } => assert!(message.contains("ghost.pdf")),
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Documents")).unwrap();
        fs::write(base_path.join("Documents").join("a.pdf"), b"keep me").unwrap();
        let record = write(base_path, "a.pdf");

        let result = organizer(base_path, MoveOptions::default()).process(&record);

        assert!(matches!(result, MoveResult::Error { .. }));
        assert!(record.path.exists());
        assert_eq!(
            fs::read(base_path.join("Documents").join("a.pdf")).unwrap(),
            b"keep me"
        );
    }

    #[test]
    fn test_leftover_quarantine_file_is_not_overwritten() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join(QUARANTINE_DIR)).unwrap();
        fs::write(base_path.join(QUARANTINE_DIR).join("a.pdf"), b"stranded").unwrap();
        let record = write(base_path, "a.pdf");
        let options = MoveOptions {
            quarantine: true,
            ..Default::default()
        };

        let result = organizer(base_path, options).process(&record);

        assert!(matches!(result, MoveResult::Error { .. }));
        assert!(record.path.exists());
        assert_eq!(
            fs::read(base_path.join(QUARANTINE_DIR).join("a.pdf")).unwrap(),
            b"stranded"
        );
        assert!(!base_path.join("Documents").join("a.pdf").exists());
    }

    #[test]
    fn test_parallel_pass_moves_everything() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let records: Vec<_> = (0..40)
            .map(|i| {
                let ext = ["pdf", "jpg", "mp3", "zip"][i % 4];
                write(base_path, &format!("file_{}.{}", i, ext))
            })
            .collect();
        let options = MoveOptions {
            threads: 4,
            ..Default::default()
        };

        let report = organizer(base_path, options)
            .run_pass(records, &mut ())
            .expect("Pass failed");

        assert_eq!(
            report.stats,
            Stats {
                success: 40,
                error: 0,
                skipped: 0
            }
        );
        assert_eq!(report.revert_entries.len(), 40);
        assert!(!report.cancelled);
        for dir in ["Documents", "Images", "Audio", "Archives"] {
            assert_eq!(fs::read_dir(base_path.join(dir)).unwrap().count(), 10);
        }
    }

    #[test]
    fn test_cancelled_pass_processes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let records = vec![write(base_path, "a.pdf"), write(base_path, "b.pdf")];
        let options = MoveOptions::default();
        options.cancel.store(true, Ordering::Relaxed);

        let report = organizer(base_path, options)
            .run_pass(records, &mut ())
            .expect("Pass failed");

        assert!(report.cancelled);
        assert_eq!(report.stats.total(), 0);
        assert!(report.revert_entries.is_empty());
        assert!(base_path.join("a.pdf").exists());
    }

    #[test]
    fn test_cancelled_parallel_pass_writes_no_snapshot() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        write(base_path, "a.pdf");
        let options = MoveOptions {
            threads: 2,
            ..Default::default()
        };
        options.cancel.store(true, Ordering::Relaxed);
        let ledger = MemoryLedger::new();

        let outcome = organizer(base_path, options)
            .cleanup(
                &ScanOptions::default(),
                &ExtensionTable::default(),
                &ledger,
                &mut (),
            )
            .expect("Pass failed");

        match outcome {
            CleanupOutcome::Completed {
                stats,
                timestamp,
                cancelled,
            } => {
                assert_eq!(stats.total(), 0);
                assert!(timestamp.is_none());
                assert!(cancelled);
            }
            other => panic!("Expected completed pass, got {:?}", other),
        }
        assert!(ledger.list_passes(base_path).unwrap().is_empty());
    }

    #[test]
    fn test_interrupted_pass_records_completed_moves() {
        // Raises the cancel flag as soon as the first file is done.
        struct Interrupt(Arc<AtomicBool>);
        impl PassObserver for Interrupt {
            fn on_result(&mut self, _result: &MoveResult) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            write(base_path, name);
        }
        let options = MoveOptions::default();
        let mut interrupt = Interrupt(Arc::clone(&options.cancel));
        let ledger = MemoryLedger::new();

        let outcome = organizer(base_path, options)
            .cleanup(
                &ScanOptions::default(),
                &ExtensionTable::default(),
                &ledger,
                &mut interrupt,
            )
            .expect("Pass failed");

        match outcome {
            CleanupOutcome::Completed {
                stats,
                timestamp,
                cancelled,
            } => {
                assert_eq!(stats.success, 1);
                assert!(timestamp.is_some());
                assert!(cancelled);
            }
            other => panic!("Expected completed pass, got {:?}", other),
        }
        let entries = ledger.load_pass(base_path, None).unwrap();
        assert_eq!(entries, vec![RevertEntry::new("a.pdf", "Documents")]);
        assert!(base_path.join("Documents").join("a.pdf").exists());
        assert!(base_path.join("b.pdf").exists());
        assert!(base_path.join("c.pdf").exists());
    }

    #[test]
    fn test_observer_sees_every_result() {
        struct Counter {
            total: usize,
            seen: usize,
        }
        impl PassObserver for Counter {
            fn on_start(&mut self, total: usize) {
                self.total = total;
            }
            fn on_result(&mut self, _result: &MoveResult) {
                self.seen += 1;
            }
        }

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let records = vec![write(base_path, "a.pdf"), write(base_path, "b.jpg")];
        let mut counter = Counter { total: 0, seen: 0 };

        organizer(base_path, MoveOptions::default())
            .run_pass(records, &mut counter)
            .expect("Pass failed");

        assert_eq!(counter.total, 2);
        assert_eq!(counter.seen, 2);
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("Images");
        ensure_dir(&dir).unwrap();
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
