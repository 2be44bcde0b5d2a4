//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: sink entries coming
//! from the background worker, the extraction progress bar, and the status
//! table. Operations never print; everything they report reaches the
//! terminal through this module.

use crate::sink::{Level, LogEntry};
use crate::status::StatusReport;
use crate::worker::TaskEvent;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (plain)
/// - Progress bars for batch operations
/// - The status summary table
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pkgtidy::output::OutputFormatter;
    /// OutputFormatter::success("Restored 3 project(s)");
    /// ```
    pub fn success(message: &str) {
        println!("{}", Self::format(&LogEntry::new(Level::Success, message)));
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{}", Self::format(&LogEntry::new(Level::Error, message)));
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{}", Self::format(&LogEntry::new(Level::Warning, message)));
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Renders one sink entry as a terminal line.
    pub fn format(entry: &LogEntry) -> String {
        match entry.level {
            Level::Info => entry.message.clone(),
            Level::Success => format!("{} {}", "✓".green(), entry.message),
            Level::Warning => format!("{} {}", "⚠".yellow(), entry.message.yellow()),
            Level::Error => format!("{} {}", "✗".red(), entry.message.red()),
        }
    }

    /// Creates and returns a progress bar for batch operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pkgtidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(12);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints the category table and totals of a status report.
    pub fn status_table(report: &StatusReport) {
        Self::header("SUMMARY");

        let mut rows: Vec<(&str, usize)> = report
            .categories
            .iter()
            .map(|c| (c.name.as_str(), c.projects))
            .collect();
        if let Some(unknown) = report.unknown {
            rows.push((crate::metadata::UNKNOWN_CATEGORY, unknown));
        }

        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max("Unmapped projects".len());

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Projects".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 12));
        for (name, count) in &rows {
            println!(
                "{:<width$} | {}",
                name,
                count.to_string().green(),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 12));

        let broken = report.broken_links();
        let links = if broken > 0 {
            format!("{} ({} broken)", report.mapping_links(), broken)
                .yellow()
                .to_string()
        } else {
            report.mapping_links().to_string()
        };
        println!(
            "{:<width$} | {}",
            "Total projects".bold(),
            report.total_projects().to_string().green().bold(),
            width = width
        );
        println!("{:<width$} | {}", "Mapping links".bold(), links, width = width);
        println!(
            "{:<width$} | {}",
            "Unmapped projects".bold(),
            report.unmapped_projects(),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

/// Renders the event stream of one background task.
///
/// Log entries are printed as they arrive. The first progress event
/// creates a progress bar; later entries are printed above it.
#[derive(Default)]
pub struct TaskOutput {
    progress: Option<ProgressBar>,
}

impl TaskOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Log(entry) => {
                let line = OutputFormatter::format(&entry);
                match (&self.progress, entry.level) {
                    (Some(pb), _) => pb.println(line),
                    (None, Level::Error) => eprintln!("{}", line),
                    (None, _) => println!("{}", line),
                }
            }
            TaskEvent::Progress { current, total } => {
                let pb = self
                    .progress
                    .get_or_insert_with(|| OutputFormatter::create_progress_bar(total as u64));
                pb.set_length(total as u64);
                pb.set_position(current as u64);
            }
        }
    }

    /// Clears the progress bar, if one was shown.
    pub fn finish(self) {
        if let Some(pb) = self.progress {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_keeps_message() {
        for level in [Level::Info, Level::Success, Level::Warning, Level::Error] {
            let line = OutputFormatter::format(&LogEntry::new(level, "Moved Foo"));
            assert!(line.contains("Moved Foo"));
        }
    }

    #[test]
    fn test_info_is_unstyled() {
        let line = OutputFormatter::format(&LogEntry::new(Level::Info, "plain text"));
        assert_eq!(line, "plain text");
    }

    #[test]
    fn test_progress_creates_bar_once() {
        let mut output = TaskOutput::new();
        output.handle(TaskEvent::Progress {
            current: 1,
            total: 3,
        });
        output.handle(TaskEvent::Progress {
            current: 2,
            total: 3,
        });

        let pb = output.progress.as_ref().expect("bar should exist");
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(3));
        output.finish();
    }
}
