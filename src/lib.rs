//! cleanup - organize a directory into category subdirectories
//!
//! Files are classified by extension and optionally re-classified by
//! filename pattern, size or modification date rules, then moved into
//! `<dir>/<category>/`. Every pass is recorded in a revert ledger so it can
//! be undone later, and several passes over the same directory can be
//! reverted independently.

pub mod cli;
pub mod config;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod ledger;
pub mod logging;
pub mod output;
pub mod prompt;
pub mod rules;
pub mod scanner;
pub mod undo;

pub use config::{CleanupConfig, FileFilter};
pub use error::{CleanupError, CleanupResult, ConfigError, LedgerError};
pub use file_category::{Category, ExtensionTable};
pub use file_organizer::{CleanupOutcome, FileOrganizer, MoveOptions, MoveResult, Stats};
pub use ledger::{FsLedger, MemoryLedger, PassInfo, RevertEntry, RevertLedger};
pub use prompt::{AlwaysConfirm, Confirmer, NeverConfirm, TerminalConfirmer};
pub use rules::{Rule, RuleSet};
pub use scanner::{FileRecord, ScanOptions, scan};
pub use undo::{RevertOutcome, UndoManager};

pub use cli::{CliArgs, run_cli};
