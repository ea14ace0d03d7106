//! Revert ledger: per-directory history of cleanup passes.
//!
//! Every non-dry-run pass that moved at least one file records a snapshot
//! identified by `(directory, timestamp)`. Timestamps are local wall-clock
//! seconds formatted as `YYYYmmddHHMMSS`, so lexicographic order is
//! chronological order. Snapshots are never overwritten: when two passes
//! land in the same second the later one is bumped forward.
//!
//! [`FsLedger`] stores snapshots as JSON files under the user's data
//! directory; [`MemoryLedger`] keeps them in memory.

use crate::error::LedgerError;
use chrono::{Local, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Format of snapshot identifiers.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What is needed to undo one move: the file was moved from
/// `directory/name` to `directory/category/name`.
///
/// Fields are declared in key order so serialized snapshots are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertEntry {
    #[serde(alias = "type")]
    pub category: String,
    pub name: String,
}

impl RevertEntry {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
        }
    }
}

/// A stored snapshot as listed for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassInfo {
    /// Snapshot identifier, `YYYYmmddHHMMSS`.
    pub timestamp: String,
    /// Human readable form, `YYYY-mm-dd HH:MM:SS`.
    pub date: String,
}

impl PassInfo {
    fn from_timestamp(timestamp: String) -> Option<Self> {
        let parsed = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            date: parsed.format(DISPLAY_FORMAT).to_string(),
            timestamp,
        })
    }
}

/// Storage for revert snapshots.
pub trait RevertLedger: Send + Sync {
    /// Stores a new snapshot for `directory` and returns its identifier.
    fn record_pass(&self, directory: &Path, entries: &[RevertEntry])
    -> Result<String, LedgerError>;

    /// Loads the snapshot with the given identifier, or the most recent one
    /// when `timestamp` is `None`. A missing snapshot yields an empty list.
    fn load_pass(
        &self,
        directory: &Path,
        timestamp: Option<&str>,
    ) -> Result<Vec<RevertEntry>, LedgerError>;

    /// Lists snapshots for `directory`, oldest first.
    fn list_passes(&self, directory: &Path) -> Result<Vec<PassInfo>, LedgerError>;
}

/// Picks the identifier for a new snapshot: the current second, or one
/// second past `latest` if the clock has not moved beyond it.
pub fn next_timestamp(latest: Option<&str>, now: NaiveDateTime) -> String {
    let latest = latest.and_then(|ts| NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok());
    let chosen = match latest {
        Some(latest) if now <= latest => latest + TimeDelta::seconds(1),
        _ => now,
    };
    chosen.format(TIMESTAMP_FORMAT).to_string()
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn directory_key(directory: &Path) -> String {
    directory.to_string_lossy().into_owned()
}

/// Snapshot files on disk, one JSON document per pass.
///
/// File names are `<key>_<timestamp>.json`, where the key is derived from
/// a BLAKE3 hash of the directory path. Writes go through a temporary file
/// in the same directory and are moved into place without clobbering, so
/// a snapshot is either complete or absent.
#[derive(Debug, Clone)]
pub struct FsLedger {
    root: PathBuf,
}

impl FsLedger {
    /// Uses `<data_dir>/cleanup/revert_info`.
    pub fn new() -> Result<Self, LedgerError> {
        let data_dir = dirs::data_dir().ok_or(LedgerError::NoDataDir)?;
        Ok(Self::with_root(data_dir.join("cleanup").join("revert_info")))
    }

    /// Stores snapshots under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_prefix(directory: &Path) -> String {
        let hash = blake3::hash(directory_key(directory).as_bytes());
        let hex = hash.to_hex();
        format!("{}_", &hex.as_str()[..32])
    }

    fn snapshot_path(&self, directory: &Path, timestamp: &str) -> PathBuf {
        self.root
            .join(format!("{}{}.json", Self::file_prefix(directory), timestamp))
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.root.clone(),
            source,
        }
    }

    /// Snapshot identifiers for `directory`, sorted ascending.
    fn timestamps(&self, directory: &Path) -> Result<Vec<String>, LedgerError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let prefix = Self::file_prefix(directory);
        let mut timestamps: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let timestamp = file_name.strip_prefix(&prefix)?.strip_suffix(".json")?;
                NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
                    .ok()
                    .map(|_| timestamp.to_string())
            })
            .collect();

        timestamps.sort();
        Ok(timestamps)
    }
}

impl RevertLedger for FsLedger {
    fn record_pass(
        &self,
        directory: &Path,
        entries: &[RevertEntry],
    ) -> Result<String, LedgerError> {
        fs::create_dir_all(&self.root).map_err(|e| self.io_error(e))?;

        let existing = self.timestamps(directory)?;
        let timestamp = next_timestamp(existing.last().map(String::as_str), now());

        let mut snapshot = BTreeMap::new();
        snapshot.insert(directory_key(directory), entries.to_vec());
        let json = serde_json::to_string_pretty(&snapshot)?;

        let mut temp = NamedTempFile::new_in(&self.root).map_err(|e| self.io_error(e))?;
        temp.write_all(json.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;

        let path = self.snapshot_path(directory, &timestamp);
        temp.persist_noclobber(&path)?;

        info!(
            directory = %directory.display(),
            timestamp = %timestamp,
            entries = entries.len(),
            snapshot = %path.display(),
            "Saved revert information"
        );
        Ok(timestamp)
    }

    fn load_pass(
        &self,
        directory: &Path,
        timestamp: Option<&str>,
    ) -> Result<Vec<RevertEntry>, LedgerError> {
        let timestamp = match timestamp {
            Some(ts) => ts.to_string(),
            None => match self.timestamps(directory)?.pop() {
                Some(latest) => latest,
                None => return Ok(Vec::new()),
            },
        };

        let path = self.snapshot_path(directory, &timestamp);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(snapshot = %path.display(), "No revert snapshot");
                return Ok(Vec::new());
            }
            Err(e) => return Err(LedgerError::Io { path, source: e }),
        };

        match serde_json::from_str::<BTreeMap<String, Vec<RevertEntry>>>(&content) {
            Ok(mut snapshot) => Ok(snapshot
                .remove(&directory_key(directory))
                .unwrap_or_default()),
            Err(e) => {
                // Unreadable snapshots are treated as absent.
                warn!(snapshot = %path.display(), error = %e, "Ignoring corrupt revert snapshot");
                Ok(Vec::new())
            }
        }
    }

    fn list_passes(&self, directory: &Path) -> Result<Vec<PassInfo>, LedgerError> {
        Ok(self
            .timestamps(directory)?
            .into_iter()
            .filter_map(PassInfo::from_timestamp)
            .collect())
    }
}

/// In-process ledger, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    passes: Mutex<HashMap<PathBuf, BTreeMap<String, Vec<RevertEntry>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RevertLedger for MemoryLedger {
    fn record_pass(
        &self,
        directory: &Path,
        entries: &[RevertEntry],
    ) -> Result<String, LedgerError> {
        let mut passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        let history = passes.entry(directory.to_path_buf()).or_default();
        let latest = history.keys().next_back().map(String::as_str);
        let timestamp = next_timestamp(latest, now());
        history.insert(timestamp.clone(), entries.to_vec());
        Ok(timestamp)
    }

    fn load_pass(
        &self,
        directory: &Path,
        timestamp: Option<&str>,
    ) -> Result<Vec<RevertEntry>, LedgerError> {
        let passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(history) = passes.get(directory) else {
            return Ok(Vec::new());
        };
        let entries = match timestamp {
            Some(ts) => history.get(ts),
            None => history.values().next_back(),
        };
        Ok(entries.cloned().unwrap_or_default())
    }

    fn list_passes(&self, directory: &Path) -> Result<Vec<PassInfo>, LedgerError> {
        let passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(passes
            .get(directory)
            .map(|history| {
                history
                    .keys()
                    .cloned()
                    .filter_map(PassInfo::from_timestamp)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(ts: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_next_timestamp_uses_clock_when_ahead() {
        assert_eq!(next_timestamp(None, at("20240101120000")), "20240101120000");
        assert_eq!(
            next_timestamp(Some("20240101115959"), at("20240101120000")),
            "20240101120000"
        );
    }

    #[test]
    fn test_next_timestamp_bumps_on_collision() {
        assert_eq!(
            next_timestamp(Some("20240101120000"), at("20240101120000")),
            "20240101120001"
        );
        assert_eq!(
            next_timestamp(Some("20240101235959"), at("20240101120000")),
            "20240102000000"
        );
    }

    #[test]
    fn test_pass_info_formats_date() {
        let info = PassInfo::from_timestamp("20231105093007".to_string()).unwrap();
        assert_eq!(info.date, "2023-11-05 09:30:07");
        assert!(PassInfo::from_timestamp("garbage".to_string()).is_none());
    }

    fn exercise_ledger(ledger: &dyn RevertLedger, directory: &Path) {
        assert!(ledger.list_passes(directory).unwrap().is_empty());
        assert!(ledger.load_pass(directory, None).unwrap().is_empty());

        let first = vec![RevertEntry::new("a.pdf", "Documents")];
        let second = vec![
            RevertEntry::new("b.jpg", "Images"),
            RevertEntry::new("c.mp3", "Audio"),
        ];
        let third = vec![RevertEntry::new("d.zip", "Archives")];

        let ts1 = ledger.record_pass(directory, &first).unwrap();
        let ts2 = ledger.record_pass(directory, &second).unwrap();
        let ts3 = ledger.record_pass(directory, &third).unwrap();
        assert!(ts1 < ts2 && ts2 < ts3);

        let passes = ledger.list_passes(directory).unwrap();
        let listed: Vec<_> = passes.iter().map(|p| p.timestamp.clone()).collect();
        assert_eq!(listed, vec![ts1.clone(), ts2.clone(), ts3.clone()]);

        assert_eq!(ledger.load_pass(directory, None).unwrap(), third);
        assert_eq!(ledger.load_pass(directory, Some(&ts1)).unwrap(), first);
        assert_eq!(ledger.load_pass(directory, Some(&ts2)).unwrap(), second);
        assert!(
            ledger
                .load_pass(directory, Some("19990101000000"))
                .unwrap()
                .is_empty()
        );

        let other = directory.join("elsewhere");
        assert!(ledger.list_passes(&other).unwrap().is_empty());
        assert!(ledger.load_pass(&other, None).unwrap().is_empty());
    }

    #[test]
    fn test_memory_ledger_history() {
        let ledger = MemoryLedger::new();
        exercise_ledger(&ledger, Path::new("/data/downloads"));
    }

    #[test]
    fn test_fs_ledger_history() {
        let store = TempDir::new().expect("Failed to create temp directory");
        let ledger = FsLedger::with_root(store.path().join("revert_info"));
        exercise_ledger(&ledger, Path::new("/data/downloads"));

        // Three snapshot files, no leftover temporaries.
        let files: Vec<_> = fs::read_dir(ledger.root())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.ends_with(".json")));
    }

    #[test]
    fn test_fs_ledger_snapshot_format() {
        let store = TempDir::new().expect("Failed to create temp directory");
        let ledger = FsLedger::with_root(store.path());
        let directory = Path::new("/data/downloads");

        let ts = ledger
            .record_pass(directory, &[RevertEntry::new("a.pdf", "Documents")])
            .unwrap();
        let path = ledger.snapshot_path(directory, &ts);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"/data/downloads": [{"category": "Documents", "name": "a.pdf"}]})
        );
    }

    #[test]
    fn test_fs_ledger_reads_legacy_type_field() {
        let store = TempDir::new().expect("Failed to create temp directory");
        let ledger = FsLedger::with_root(store.path());
        let directory = Path::new("/data/old");
        let path = ledger.snapshot_path(directory, "20200101000000");
        fs::write(
            &path,
            r#"{"/data/old": [{"name": "x.pdf", "type": "Documents"}]}"#,
        )
        .unwrap();

        assert_eq!(
            ledger.load_pass(directory, None).unwrap(),
            vec![RevertEntry::new("x.pdf", "Documents")]
        );
    }

    #[test]
    fn test_fs_ledger_corrupt_snapshot_is_empty() {
        let store = TempDir::new().expect("Failed to create temp directory");
        let ledger = FsLedger::with_root(store.path());
        let directory = Path::new("/data/bad");
        fs::write(ledger.snapshot_path(directory, "20200101000000"), "{not json").unwrap();

        assert!(ledger.load_pass(directory, None).unwrap().is_empty());
        assert_eq!(ledger.list_passes(directory).unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_directories_get_distinct_keys() {
        assert_ne!(
            FsLedger::file_prefix(Path::new("/a/b_c")),
            FsLedger::file_prefix(Path::new("/a_b/c"))
        );
    }
}
