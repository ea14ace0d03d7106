//! Configuration loading and file filtering.
//!
//! Configuration may be written in TOML or JSON (chosen by file extension)
//! and carries the rule list plus defaults for the command-line switches:
//!
//! ```toml
//! quarantine = false
//! recursive = false
//! threads = 4
//! include_patterns = ["*.txt", "*.pdf"]
//! exclude_patterns = ["*.tmp", "~*"]
//!
//! [[rules]]
//! type = "extension"
//!
//! [[rules]]
//! type = "pattern"
//! patterns = { "*.log" = "Logs" }
//! ```
//!
//! A configuration that cannot be read or parsed never fails a pass:
//! [`CleanupConfig::load_or_default`] logs a warning and falls back to the
//! defaults.

use crate::error::ConfigError;
use crate::rules::{DateRange, PatternMapping, Rule, SizeRange};
use chrono::NaiveDate;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".cleanup.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Stage every move through the quarantine directory.
    pub quarantine: bool,
    /// Scan subdirectories.
    pub recursive: bool,
    /// Worker threads for the move phase.
    pub threads: usize,
    /// Only files matching one of these globs are organized.
    pub include_patterns: Vec<String>,
    /// Files matching any of these globs are left alone.
    pub exclude_patterns: Vec<String>,
    /// Classification rules, evaluated in order. Kept last so TOML output
    /// places the `[[rules]]` tables after the plain keys.
    pub rules: Vec<Rule>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            quarantine: false,
            recursive: false,
            threads: 1,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            rules: vec![Rule::Extension {
                description: Some("Default extension-based categorization".to_string()),
            }],
        }
    }
}

impl CleanupConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.cleanup.toml` in the current directory
    /// 3. Look for `cleanup/config.toml` in the user configuration directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the selected file cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::discover(config_path) {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Like [`CleanupConfig::load`], but degrades to the default
    /// configuration with a warning instead of failing.
    pub fn load_or_default(config_path: Option<&Path>) -> Self {
        match Self::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Could not load configuration, using default settings");
                Self::default()
            }
        }
    }

    fn discover(config_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = config_path {
            return Some(path.to_path_buf());
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("cleanup").join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Load configuration from a specific file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(path, &content)?;
        info!(path = %path.display(), rules = config.rules.len(), "Loaded configuration");
        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        };

        if is_json(path) {
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))
        } else {
            toml::from_str(content).map_err(|e| invalid(e.to_string()))
        }
    }

    /// Writes this configuration to `path`, as JSON or TOML depending on
    /// the extension. Parent directories are created as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// A configuration exercising every rule type, suitable as a template.
    pub fn example() -> Self {
        const MIB: u64 = 1024 * 1024;
        let year = |y: i32| {
            (
                NaiveDate::from_ymd_opt(y, 1, 1).unwrap_or_default(),
                NaiveDate::from_ymd_opt(y, 12, 31).unwrap_or_default(),
            )
        };
        let (start_2020, end_2020) = year(2020);
        let (start_2021, end_2021) = year(2021);

        Self {
            rules: vec![
                Rule::Extension {
                    description: Some("Default extension-based categorization".to_string()),
                },
                Rule::Pattern {
                    patterns: vec![
                        PatternMapping::new("*.txt", "text"),
                        PatternMapping::new("*.log", "logs"),
                        PatternMapping::new("backup*", "backups"),
                    ],
                },
                Rule::Size {
                    size_ranges: vec![
                        SizeRange {
                            min: 0,
                            max: Some(MIB),
                            category: Some("small_files".to_string()),
                        },
                        SizeRange {
                            min: MIB,
                            max: Some(100 * MIB),
                            category: Some("medium_files".to_string()),
                        },
                        SizeRange {
                            min: 100 * MIB,
                            max: None,
                            category: Some("large_files".to_string()),
                        },
                    ],
                },
                Rule::Date {
                    date_ranges: vec![
                        DateRange {
                            start: start_2020,
                            end: end_2020,
                            category: Some("2020_files".to_string()),
                        },
                        DateRange {
                            start: start_2021,
                            end: end_2021,
                            category: Some("2021_files".to_string()),
                        },
                    ],
                },
            ],
            quarantine: false,
            recursive: false,
            threads: 4,
            include_patterns: vec!["*.txt".into(), "*.pdf".into(), "*.jpg".into()],
            exclude_patterns: vec!["*.tmp".into(), "~*".into()],
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Compiled include/exclude globs matched against bare file names.
///
/// A file is kept when the include list is empty or one include glob
/// matches, and no exclude glob matches. Exclusion is checked last.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include_patterns: Vec<Pattern>,
    exclude_patterns: Vec<Pattern>,
}

impl FileFilter {
    /// Compiles the given globs. Globs that fail to parse are logged and
    /// dropped, so the remaining ones still apply.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Self {
        Self {
            include_patterns: compile_patterns(include),
            exclude_patterns: compile_patterns(exclude),
        }
    }

    /// Check if a file with this bare name should be organized.
    pub fn should_include(&self, file_name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self
                .include_patterns
                .iter()
                .any(|pattern| pattern.matches(file_name))
        {
            return false;
        }

        !self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches(file_name))
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<Pattern> {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .filter_map(|pattern| match Pattern::new(pattern) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                warn!(pattern, error = %e, "Ignoring invalid filter pattern");
                None
            }
        })
        .collect()
}
