//! User-defined classification rules.
//!
//! Rules refine the category assigned by the extension table. They are
//! evaluated in configured order and every matching rule overwrites the
//! category, so the last matching rule wins. Inside a single rule the
//! first matching entry (pattern, size range or date range) wins and the
//! rest of that rule is not consulted.
//!
//! Users defining overlapping rules may find the asymmetry surprising: a
//! broad `size` rule listed after a specific `pattern` rule overrides it.
//!
//! ```toml
//! [[rules]]
//! type = "pattern"
//! patterns = { "*.log" = "Logs", "backup*" = "Backups" }
//!
//! [[rules]]
//! type = "size"
//! size_ranges = [{ min = 104857600, category = "Large Files" }]
//!
//! [[rules]]
//! type = "date"
//! date_ranges = [{ start = "2020-01-01", end = "2020-12-31", category = "2020" }]
//! ```

use crate::scanner::FileRecord;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::fs::{self, Metadata};
use tracing::{debug, warn};

/// A single configured rule, tagged by `type` in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    /// Extension-based categorization. Already applied by the scanner, so
    /// evaluating it leaves the category untouched.
    Extension {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Case-insensitive glob patterns matched against the file name.
    Pattern {
        #[serde(default, with = "ordered_patterns")]
        patterns: Vec<PatternMapping>,
    },
    /// Byte size ranges, inclusive on both ends.
    Size {
        #[serde(default)]
        size_ranges: Vec<SizeRange>,
    },
    /// Modification date ranges, inclusive on both ends.
    Date {
        #[serde(default)]
        date_ranges: Vec<DateRange>,
    },
}

/// One `glob -> category` entry of a pattern rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMapping {
    pub pattern: String,
    pub category: String,
}

impl PatternMapping {
    pub fn new(pattern: &str, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            category: category.to_string(),
        }
    }
}

/// A size bucket. `max` of `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    #[serde(default)]
    pub min: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    /// Ranges without a category never match.
    #[serde(default, alias = "folder", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SizeRange {
    fn contains(&self, size: u64) -> bool {
        self.min <= size && self.max.is_none_or(|max| size <= max)
    }
}

/// A calendar date bucket compared against the local modification time.
///
/// Both bounds are taken at 00:00:00, so `end` only matches files modified
/// exactly at the start of that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default = "default_start_date")]
    pub start: NaiveDate,
    #[serde(default = "default_end_date")]
    pub end: NaiveDate,
    /// Ranges without a category never match.
    #[serde(default, alias = "folder", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl DateRange {
    fn contains(&self, modified: NaiveDateTime) -> bool {
        self.start.and_time(NaiveTime::MIN) <= modified
            && modified <= self.end.and_time(NaiveTime::MIN)
    }
}

fn default_start_date() -> NaiveDate {
    // NaiveDate's default is the Unix epoch date.
    NaiveDate::default()
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Rules compiled for repeated evaluation.
///
/// Glob patterns are parsed once; invalid ones are dropped with a warning
/// so a bad entry degrades a rule instead of failing the pass.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Extension,
    Pattern(Vec<(Pattern, String)>),
    Size(Vec<SizeRange>),
    Date(Vec<DateRange>),
}

const PATTERN_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl RuleSet {
    pub fn compile(rules: &[Rule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| match rule {
                Rule::Extension { .. } => CompiledRule::Extension,
                Rule::Pattern { patterns } => CompiledRule::Pattern(
                    patterns
                        .iter()
                        .filter_map(|mapping| match Pattern::new(&mapping.pattern) {
                            Ok(pattern) => Some((pattern, mapping.category.clone())),
                            Err(e) => {
                                warn!(pattern = %mapping.pattern, error = %e, "Ignoring invalid rule pattern");
                                None
                            }
                        })
                        .collect(),
                ),
                Rule::Size { size_ranges } => CompiledRule::Size(size_ranges.clone()),
                Rule::Date { date_ranges } => CompiledRule::Date(date_ranges.clone()),
            })
            .collect();

        Self { rules }
    }

    /// Returns the final category for `record`, starting from the category
    /// the scanner assigned.
    pub fn evaluate(&self, record: &FileRecord) -> String {
        let cached: OnceCell<Option<Metadata>> = OnceCell::new();
        let metadata = || {
            cached
                .get_or_init(|| match fs::metadata(&record.path) {
                    Ok(meta) => Some(meta),
                    Err(e) => {
                        debug!(path = %record.path.display(), error = %e, "Could not read metadata for rules");
                        None
                    }
                })
                .as_ref()
        };

        let mut category = record.category.clone();
        for rule in &self.rules {
            let matched = match rule {
                CompiledRule::Extension => None,
                CompiledRule::Pattern(patterns) => match_pattern(patterns, &record.name),
                CompiledRule::Size(ranges) => metadata().and_then(|m| match_size(ranges, m.len())),
                CompiledRule::Date(ranges) => metadata()
                    .and_then(|m| m.modified().ok())
                    .and_then(|modified| {
                        let modified = DateTime::<Local>::from(modified).naive_local();
                        match_date(ranges, modified)
                    }),
            };

            if let Some(new_category) = matched {
                category = new_category.to_string();
            }
        }

        category
    }
}

fn match_pattern<'a>(patterns: &'a [(Pattern, String)], name: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|(pattern, _)| pattern.matches_with(name, PATTERN_MATCH))
        .map(|(_, category)| category.as_str())
}

fn match_size(ranges: &[SizeRange], size: u64) -> Option<&str> {
    ranges
        .iter()
        .find(|range| range.category.is_some() && range.contains(size))
        .and_then(|range| range.category.as_deref())
}

fn match_date(ranges: &[DateRange], modified: NaiveDateTime) -> Option<&str> {
    ranges
        .iter()
        .find(|range| range.category.is_some() && range.contains(modified))
        .and_then(|range| range.category.as_deref())
}

/// Evaluates `rules` against `record` without keeping the compiled form.
pub fn evaluate(record: &FileRecord, rules: &[Rule]) -> String {
    RuleSet::compile(rules).evaluate(record)
}

/// (De)serializes pattern mappings as a map while keeping document order,
/// which decides the first matching pattern.
mod ordered_patterns {
    use super::PatternMapping;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(patterns: &[PatternMapping], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(patterns.len()))?;
        for mapping in patterns {
            map.serialize_entry(&mapping.pattern, &mapping.category)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<PatternMapping>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PatternsVisitor;

        impl<'de> Visitor<'de> for PatternsVisitor {
            type Value = Vec<PatternMapping>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of glob patterns to category names")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut patterns = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((pattern, category)) = access.next_entry::<String, String>()? {
                    patterns.push(PatternMapping { pattern, category });
                }
                Ok(patterns)
            }
        }

        deserializer.deserialize_map(PatternsVisitor)
    }
}
