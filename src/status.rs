//! Read-only summary of a classified root: how many projects each category
//! holds, which mapping links exist, and whether they still resolve.

use crate::error::Result;
use crate::fsops::{self, DirItem};
use crate::mapping::{self, link_target};
use crate::metadata::UNKNOWN_CATEGORY;
use crate::platform::{self, HiddenAttributeSetter};
use crate::sink::LogSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// OS-level visibility of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
    /// The platform has no hidden attribute, or it could not be read.
    Unknown,
}

impl Visibility {
    pub fn label(&self) -> &'static str {
        match self {
            Visibility::Hidden => "hidden",
            Visibility::Visible => "visible",
            Visibility::Unknown => "unknown",
        }
    }
}

impl From<Option<bool>> for Visibility {
    fn from(hidden: Option<bool>) -> Self {
        match hidden {
            Some(true) => Visibility::Hidden,
            Some(false) => Visibility::Visible,
            None => Visibility::Unknown,
        }
    }
}

/// Project count of one category directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub name: String,
    pub projects: usize,
}

/// One symbolic link directly under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub name: String,
    pub target: Option<PathBuf>,
    pub visibility: Visibility,
    /// The target does not resolve.
    pub broken: bool,
}

/// Snapshot of a root directory.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Categories other than `Unknown`, in name order.
    pub categories: Vec<CategoryCount>,
    /// Projects under `Unknown`, if that directory exists.
    pub unknown: Option<usize>,
    pub links: Vec<LinkStatus>,
}

impl StatusReport {
    pub fn total_projects(&self) -> usize {
        self.categories.iter().map(|c| c.projects).sum::<usize>() + self.unknown.unwrap_or(0)
    }

    pub fn mapping_links(&self) -> usize {
        self.links.len()
    }

    pub fn unmapped_projects(&self) -> usize {
        self.total_projects().saturating_sub(self.mapping_links())
    }

    pub fn broken_links(&self) -> usize {
        self.links.iter().filter(|l| l.broken).count()
    }
}

/// Computes [`StatusReport`]s.
#[derive(Clone)]
pub struct StatusReporter {
    hidden: Arc<dyn HiddenAttributeSetter>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(platform::hidden_attribute_setter())
    }
}

impl StatusReporter {
    pub fn new(hidden: Arc<dyn HiddenAttributeSetter>) -> Self {
        Self { hidden }
    }

    /// Summarizes `root` without modifying anything, and writes the summary
    /// to `sink`.
    pub fn list_status(&self, root: &Path, sink: &dyn LogSink) -> Result<StatusReport> {
        fsops::validate_root(root)?;
        sink.info(&format!("Status of {}", root.display()));

        let mut report = StatusReport::default();

        sink.info("Categories:");
        for category in mapping::mapping_categories(root)? {
            let projects = count_projects(&category.path);
            sink.info(&format!("  {}: {} project(s)", category.name, projects));
            report.categories.push(CategoryCount {
                name: category.name,
                projects,
            });
        }

        let unknown_dir = root.join(UNKNOWN_CATEGORY);
        if unknown_dir.is_dir() && !platform::is_symlink(&unknown_dir) {
            let projects = count_projects(&unknown_dir);
            sink.info(&format!("  {}: {} project(s)", UNKNOWN_CATEGORY, projects));
            report.unknown = Some(projects);
        }

        sink.info("Mapping links:");
        for item in fsops::list_dir(root)?
            .into_iter()
            .filter(DirItem::is_symlink)
        {
            let target = link_target(&item.path);
            let broken = !item.path.exists();
            let visibility = Visibility::from(self.hidden.is_hidden(&item.path));

            let target_label = target
                .as_ref()
                .map(|t| t.display().to_string())
                .unwrap_or_else(|| "?".to_string());
            let message = format!(
                "  {} ({}) -> {}{}",
                item.name,
                visibility.label(),
                target_label,
                if broken { " [broken]" } else { "" }
            );
            if broken {
                sink.warn(&message);
            } else {
                sink.info(&message);
            }

            report.links.push(LinkStatus {
                name: item.name,
                target,
                visibility,
                broken,
            });
        }

        sink.info(&format!("Total projects: {}", report.total_projects()));
        sink.info(&format!("Mapping links: {}", report.mapping_links()));
        sink.info(&format!("Unmapped projects: {}", report.unmapped_projects()));

        Ok(report)
    }
}

/// Counts the immediate subdirectories of `dir`. Unreadable directories count as empty.
fn count_projects(dir: &Path) -> usize {
    fsops::list_dir(dir)
        .map(|items| items.iter().filter(|item| item.is_dir()).count())
        .unwrap_or(0)
}
