//! Transparent mapping layer.
//!
//! After classification a project lives at `<root>/<Category>/<Name>`. The
//! mapping layer puts a hidden symbolic link `<root>/<Name>` pointing at the
//! relative path `<Category>/<Name>` next to the categories, so tools that
//! look for projects directly under the root keep finding them. Links are
//! disposable: removing them never touches project data.

use crate::error::{Error, Result};
use crate::fsops::{self, DirItem};
use crate::metadata::UNKNOWN_CATEGORY;
use crate::platform::{self, HiddenAttributeSetter};
use crate::sink::LogSink;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A link created by [`MappingManager::create_mappings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingLink {
    /// Project directory name, which is also the link name.
    pub name: String,
    pub category: String,
    /// Absolute location of the link.
    pub link: PathBuf,
    /// Relative target stored in the link.
    pub target: PathBuf,
    /// Whether the hidden attribute was applied.
    pub hidden: bool,
}

/// A project that did not get a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub name: String,
    pub reason: String,
}

/// Result of [`MappingManager::create_mappings`].
#[derive(Debug, Default)]
pub struct MappingReport {
    pub created: Vec<MappingLink>,
    pub skipped: Vec<SkippedItem>,
}

/// Creates and removes mapping links under a root directory.
#[derive(Clone)]
pub struct MappingManager {
    hidden: Arc<dyn HiddenAttributeSetter>,
}

impl Default for MappingManager {
    fn default() -> Self {
        Self::new(platform::hidden_attribute_setter())
    }
}

impl MappingManager {
    pub fn new(hidden: Arc<dyn HiddenAttributeSetter>) -> Self {
        Self { hidden }
    }

    /// Creates a hidden link at `<root>/<name>` for every project in every
    /// category except `Unknown`.
    ///
    /// An existing link with the same name is replaced so it always points
    /// at the project's current location. A real file or directory with
    /// that name is never touched; the project is skipped instead. When two
    /// categories hold a project with the same name, the first category (by
    /// name) wins. Per-project failures are recorded as skipped and do not
    /// stop the run.
    pub fn create_mappings(&self, root: &Path, sink: &dyn LogSink) -> Result<MappingReport> {
        fsops::validate_root(root)?;
        sink.info(&format!("Creating mapping links in {}", root.display()));

        let mut report = MappingReport::default();
        let mut claimed: HashMap<String, String> = HashMap::new();

        for category in mapping_categories(root)? {
            let projects = match fsops::list_dir(&category.path) {
                Ok(items) => items,
                Err(e) => {
                    sink.error(&e.to_string());
                    continue;
                }
            };

            for project in projects.into_iter().filter(DirItem::is_dir) {
                if let Some(owner) = claimed.get(&project.name) {
                    let reason = format!("name already mapped to {}/{}", owner, project.name);
                    sink.warn(&format!(
                        "Skipped {}/{}: {}",
                        category.name, project.name, reason
                    ));
                    report.skipped.push(SkippedItem {
                        name: project.name,
                        reason,
                    });
                    continue;
                }

                match self.map_project(root, &category.name, &project.name, sink) {
                    Ok(link) => {
                        claimed.insert(link.name.clone(), category.name.clone());
                        report.created.push(link);
                    }
                    Err(reason) => {
                        sink.warn(&format!("Skipped {}: {}", project.name, reason));
                        report.skipped.push(SkippedItem {
                            name: project.name,
                            reason,
                        });
                    }
                }
            }
        }

        if !report.created.is_empty() {
            sink.success(&format!(
                "Created {} hidden mapping link(s)",
                report.created.len()
            ));
        }
        if !report.skipped.is_empty() {
            sink.warn(&format!("Skipped {} item(s)", report.skipped.len()));
        }

        Ok(report)
    }

    /// Links one project. Returns the reason on failure.
    fn map_project(
        &self,
        root: &Path,
        category: &str,
        name: &str,
        sink: &dyn LogSink,
    ) -> std::result::Result<MappingLink, String> {
        let link = root.join(name);
        let target = Path::new(category).join(name);

        if fsops::path_occupied(&link) {
            if !platform::is_symlink(&link) {
                return Err("a real file or directory with this name exists".to_string());
            }
            platform::remove_symlink(&link).map_err(|source| {
                Error::LinkRemove {
                    link: link.clone(),
                    source,
                }
                .to_string()
            })?;
            debug!("Removed stale link {}", link.display());
        }

        platform::symlink_dir(&target, &link).map_err(|source| {
            Error::LinkCreate {
                link: link.clone(),
                target: target.clone(),
                source,
            }
            .to_string()
        })?;

        let hidden = match self.hidden.set_hidden(&link) {
            Ok(()) => true,
            Err(e) => {
                sink.warn(&format!("Cannot set hidden attribute on {}: {}", name, e));
                false
            }
        };

        debug!("Linked {} -> {}", link.display(), target.display());
        Ok(MappingLink {
            name: name.to_string(),
            category: category.to_string(),
            link,
            target,
            hidden,
        })
    }

    /// Deletes every symbolic link directly under `root`. Real directories
    /// are never touched. Returns the number of links removed.
    pub fn remove_all_mappings(&self, root: &Path, sink: &dyn LogSink) -> Result<usize> {
        fsops::validate_root(root)?;
        sink.info(&format!("Removing mapping links in {}", root.display()));

        let mut removed = 0;
        for item in fsops::list_dir(root)?
            .into_iter()
            .filter(DirItem::is_symlink)
        {
            match platform::remove_symlink(&item.path) {
                Ok(()) => {
                    debug!("Removed link {}", item.path.display());
                    removed += 1;
                }
                Err(source) => {
                    let err = Error::LinkRemove {
                        link: item.path.clone(),
                        source,
                    };
                    sink.error(&err.to_string());
                }
            }
        }

        sink.success(&format!("Removed {} mapping link(s)", removed));
        Ok(removed)
    }
}

/// Category directories eligible for mapping: real, non-hidden directories
/// other than `Unknown`.
pub(crate) fn mapping_categories(root: &Path) -> Result<Vec<DirItem>> {
    Ok(fsops::list_dir(root)?
        .into_iter()
        .filter(|item| item.is_dir() && item.name != UNKNOWN_CATEGORY && !item.name.starts_with('.'))
        .collect())
}

/// Returns the target of the link at `path`, if it is one.
pub fn link_target(path: &Path) -> Option<PathBuf> {
    fs::read_link(path).ok()
}
