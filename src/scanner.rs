//! Directory scanning.
//!
//! Produces the list of candidate files for a pass. Only files whose name
//! carries a known extension become candidates; everything else is left
//! where it is.

use crate::config::FileFilter;
use crate::error::{CleanupError, CleanupResult};
use crate::file_category::ExtensionTable;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A file selected for organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the scanned root. Equal to the bare file name in
    /// non-recursive scans.
    pub name: String,
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Destination category assigned so far.
    pub category: String,
}

/// Options controlling which files a scan yields.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub recursive: bool,
    pub filter: FileFilter,
}

impl ScanOptions {
    /// Builds scan options from raw include/exclude globs.
    pub fn new<S: AsRef<str>>(recursive: bool, include: &[S], exclude: &[S]) -> Self {
        Self {
            recursive,
            filter: FileFilter::new(include, exclude),
        }
    }
}

/// Scans `root` for files to organize.
///
/// In recursive mode the whole subtree is walked and each record's `name`
/// is its path relative to `root`. Include/exclude globs always apply to
/// the bare file name. Records are returned sorted by name.
///
/// # Errors
///
/// Returns [`CleanupError::DirectoryNotFound`] if `root` is not a directory
/// and [`CleanupError::Io`] if it cannot be listed.
pub fn scan(
    root: &Path,
    options: &ScanOptions,
    table: &ExtensionTable,
) -> CleanupResult<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(CleanupError::DirectoryNotFound(root.to_path_buf()));
    }

    let candidates = if options.recursive {
        walk_recursive(root)
    } else {
        list_direct(root)?
    };

    let mut records: Vec<FileRecord> = candidates
        .into_iter()
        .filter_map(|(name, path)| {
            let file_name = path.file_name()?.to_string_lossy().into_owned();
            if !options.filter.should_include(&file_name) {
                debug!(file = %name, "Filtered out by include/exclude patterns");
                return None;
            }
            let category = table.classify(&file_name)?.to_string();
            Some(FileRecord {
                name,
                path,
                category,
            })
        })
        .collect();

    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

fn list_direct(root: &Path) -> CleanupResult<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(root).map_err(|e| CleanupError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        if let Ok(file_type) = entry.file_type()
            && file_type.is_file()
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push((name, entry.path()));
        }
    }
    Ok(files)
}

fn walk_recursive(root: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let name = relative.to_string_lossy().into_owned();
            Some((name, entry.into_path()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, b"content").expect("Failed to write file");
    }

    fn names(records: &[FileRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_scan_missing_directory() {
        let result = scan(
            Path::new("/non/existent/path"),
            &ScanOptions::default(),
            &ExtensionTable::default(),
        );
        assert!(matches!(result, Err(CleanupError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_scan_non_recursive_skips_dirs_and_unknown() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(root, "report.pdf");
        touch(root, "image.jpg");
        touch(root, "README");
        touch(root, "nested/deep.txt");

        let records = scan(root, &ScanOptions::default(), &ExtensionTable::default()).unwrap();

        assert_eq!(names(&records), vec!["image.jpg", "report.pdf"]);
        assert_eq!(records[0].category, "Images");
        assert_eq!(records[1].category, "Documents");
        assert_eq!(records[1].path, root.join("report.pdf"));
    }

    #[test]
    fn test_scan_recursive_uses_relative_names() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(root, "top.pdf");
        touch(root, "a/b/deep.mp3");

        let options = ScanOptions::new::<&str>(true, &[], &[]);
        let records = scan(root, &options, &ExtensionTable::default()).unwrap();

        let deep = Path::new("a").join("b").join("deep.mp3");
        assert_eq!(records.len(), 2);
        let deep_record = records
            .iter()
            .find(|r| r.category == "Audio")
            .expect("deep file should be scanned");
        assert_eq!(Path::new(&deep_record.name), deep.as_path());
        assert_eq!(deep_record.path, root.join(&deep));
    }

    #[test]
    fn test_scan_include_and_exclude_match_bare_names() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        touch(root, "keep.txt");
        touch(root, "skip.txt");
        touch(root, "photo.jpg");
        touch(root, "sub/inner.txt");

        let options = ScanOptions::new(true, &["*.txt"], &["skip*"]);
        let records = scan(root, &options, &ExtensionTable::default()).unwrap();

        let mut found: Vec<String> = records
            .iter()
            .map(|r| {
                Path::new(&r.name)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        found.sort();
        assert_eq!(found, vec!["inner.txt", "keep.txt"]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let records = scan(
            temp_dir.path(),
            &ScanOptions::default(),
            &ExtensionTable::default(),
        )
        .unwrap();
        assert!(records.is_empty());
    }
}
