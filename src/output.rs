//! Terminal rendering for passes and revert listings.
//!
//! Only what the user asked to see goes through here. Diagnostics belong to
//! `tracing`.

use crate::file_organizer::{MoveResult, PassObserver, Stats};
use crate::ledger::PassInfo;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// Stateless helpers for styled CLI output. Errors go to stderr, the rest
/// to stdout.
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Bar sized for one tick per processed file. Per-file lines are
    /// printed through [`ProgressBar::suspend`] so they do not tear it.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        let bar = ProgressBar::new(total);
        bar.set_style(style);
        bar
    }

    /// Prints moved-file counts per category directory, sorted by name,
    /// followed by a total row.
    ///
    /// ```no_run
    /// use cleanup::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let counts = HashMap::from([("Documents".to_string(), 2), ("Images".to_string(), 1)]);
    /// OutputFormatter::summary_table(&counts, 3);
    /// ```
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut rows: Vec<_> = category_counts.iter().collect();
        rows.sort_by_key(|&(category, _)| category);

        let width = rows
            .iter()
            .map(|(category, _)| category.len())
            .max()
            .unwrap_or(0)
            .max("Category".len());
        let rule = "-".repeat(width + 10);

        println!("{:<width$} | {}", "Category".bold(), "Files".bold());
        println!("{}", rule);
        for (category, count) in &rows {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(**count)
            );
        }
        println!("{}", rule);
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files)
        );
    }

    /// Any failure turns the totals line into a warning.
    pub fn pass_summary(stats: &Stats) {
        let line = format!(
            "{} succeeded, {} skipped, {} failed",
            stats.success, stats.skipped, stats.error
        );
        if stats.error > 0 {
            Self::warning(&line);
        } else {
            Self::success(&line);
        }
    }

    pub fn revert_points(points: &[PassInfo]) {
        if points.is_empty() {
            Self::info("No revert points available for this directory.");
            return;
        }
        Self::header("Available revert points:");
        for point in points {
            println!("  {}  ({})", point.timestamp.bold(), point.date);
        }
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Which kind of pass a [`PassProgress`] is rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Cleanup,
    Revert,
}

/// Renders pass progress: one line per file plus a progress bar.
///
/// Tallies successful moves per category for [`OutputFormatter::summary_table`].
/// A silent instance renders nothing but still counts.
pub struct PassProgress {
    kind: PassKind,
    silent: bool,
    bar: Option<ProgressBar>,
    category_counts: HashMap<String, usize>,
}

impl PassProgress {
    pub fn new(kind: PassKind, silent: bool) -> Self {
        Self {
            kind,
            silent,
            bar: None,
            category_counts: HashMap::new(),
        }
    }

    pub fn category_counts(&self) -> &HashMap<String, usize> {
        &self.category_counts
    }

    /// Clears the progress bar.
    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn render(&self, result: &MoveResult) {
        let name = result.name();
        let category = result.category();
        match (result, self.kind) {
            (MoveResult::Success { .. }, PassKind::Cleanup) => {
                OutputFormatter::success(&format!("Moved {} to {}", name, category))
            }
            (MoveResult::Success { .. }, PassKind::Revert) => {
                OutputFormatter::success(&format!("Moved back {} from {}", name, category))
            }
            (MoveResult::WouldMove { .. }, PassKind::Cleanup) => {
                OutputFormatter::dry_run_notice(&format!("Would move {} to {}", name, category))
            }
            (MoveResult::WouldMove { .. }, PassKind::Revert) => OutputFormatter::dry_run_notice(
                &format!("Will move back {} from {}", name, category),
            ),
            (MoveResult::Skipped { .. }, _) => {
                OutputFormatter::warning(&format!("Skipped {}", name))
            }
            (MoveResult::Error { message, .. }, _) => {
                OutputFormatter::error(&format!("Error with {}: {}", name, message))
            }
        }
    }
}

impl PassObserver for PassProgress {
    fn on_start(&mut self, total: usize) {
        if !self.silent {
            self.bar = Some(OutputFormatter::create_progress_bar(total as u64));
        }
    }

    fn on_result(&mut self, result: &MoveResult) {
        if matches!(
            result,
            MoveResult::Success { .. } | MoveResult::WouldMove { .. }
        ) {
            *self
                .category_counts
                .entry(result.category().to_string())
                .or_insert(0) += 1;
        }

        if self.silent {
            return;
        }
        match &self.bar {
            Some(bar) => {
                bar.suspend(|| self.render(result));
                bar.inc(1);
            }
            None => self.render(result),
        }
    }
}

impl Drop for PassProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
