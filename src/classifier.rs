//! Project classification.
//!
//! This module moves every unclassified project directory under a root into
//! a category subdirectory named after the `type` declared in the project's
//! descriptor. Classification is a move, never a copy, and it is best-effort:
//! a project that cannot be moved is counted and reported, and the run goes
//! on with the next one.
use crate::config::{Config, ScanFilter};
use crate::error::{Error, Result};
use crate::fsops::{self, DirItem};
use crate::mapping::{MappingManager, MappingReport};
use crate::metadata::{CategorySource, MetadataReader, UNKNOWN_CATEGORY};
use crate::sink::LogSink;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A project directory waiting to be classified.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory name.
    pub name: String,
    /// Current location.
    pub path: PathBuf,
}

/// Where one project goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    /// Original directory name.
    pub project: String,
    pub category: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// True if the destination got a `_N` suffix because the name was taken.
    pub renamed: bool,
}

/// Result of a classification run.
#[derive(Debug, Default)]
pub struct ClassifyReport {
    /// Moves that were performed.
    pub moves: Vec<PlannedMove>,
    /// Projects that could not be moved.
    pub errors: usize,
    /// Present when mapping was requested and ran.
    pub mapping: Option<MappingReport>,
}

impl ClassifyReport {
    pub fn classified(&self) -> usize {
        self.moves.len()
    }
}

/// Moves projects into category directories.
#[derive(Clone, Default)]
pub struct Classifier {
    filter: ScanFilter,
    reader: MetadataReader,
    mapping: Option<MappingManager>,
}

impl Classifier {
    pub fn new(filter: ScanFilter, reader: MetadataReader) -> Self {
        Self {
            filter,
            reader,
            mapping: None,
        }
    }

    /// Builds a classifier from configuration. Mapping is not enabled here;
    /// use [`with_mapping`](Self::with_mapping).
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.scan_filter()?,
            MetadataReader::new(config.classify.descriptor.clone()),
        ))
    }

    /// Runs `manager` over the root after any project was classified.
    pub fn with_mapping(mut self, manager: MappingManager) -> Self {
        self.mapping = Some(manager);
        self
    }

    /// Lists the top-level directories of `root` that are classification
    /// candidates, in name order. Symbolic links and category directories
    /// left by an earlier run are never candidates.
    pub fn candidates(&self, root: &Path) -> Result<Vec<Project>> {
        let dirs: Vec<DirItem> = fsops::list_dir(root)?
            .into_iter()
            .filter(|item| item.is_dir() && self.filter.should_include(&item.name))
            .collect();

        let declared: HashSet<String> = dirs
            .iter()
            .filter(|item| self.has_descriptor(&item.path))
            .map(|item| self.reader.resolve(&item.path).category)
            .collect();

        Ok(dirs
            .into_iter()
            .filter(|item| {
                let category = self.is_category_dir(&item.path, declared.contains(&item.name));
                if category {
                    debug!("Skipping category directory {}", item.name);
                }
                !category
            })
            .map(|DirItem { name, path, .. }| Project { name, path })
            .collect())
    }

    /// A category holds only project directories and has no descriptor of
    /// its own. Its children must carry descriptors unless another project
    /// at the root declares the directory's name as its type.
    fn is_category_dir(&self, dir: &Path, declared: bool) -> bool {
        if self.has_descriptor(dir) {
            return false;
        }
        let Ok(entries) = fs::read_dir(dir) else {
            return false;
        };

        let mut has_entries = false;
        for entry in entries.flatten() {
            has_entries = true;
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if !is_dir || !(declared || self.has_descriptor(&entry.path())) {
                return false;
            }
        }
        has_entries
    }

    fn has_descriptor(&self, dir: &Path) -> bool {
        dir.join(self.reader.descriptor_name()).is_file()
    }

    /// Fails when `<root>/<category>` is itself a project or a link to one,
    /// so a project is never moved inside another.
    fn check_category(&self, root: &Path, category: &str) -> Result<()> {
        let category_dir = root.join(category);
        if self.has_descriptor(&category_dir) {
            return Err(Error::CategoryIsProject {
                category: category.to_string(),
                path: category_dir,
            });
        }
        Ok(())
    }

    /// Computes where every candidate would go without touching the disk.
    ///
    /// Collision suffixes take earlier planned destinations into account, so
    /// the plan matches what [`classify`](Self::classify) does on an
    /// unchanged tree.
    pub fn plan(&self, root: &Path, sink: &dyn LogSink) -> Result<Vec<PlannedMove>> {
        fsops::validate_root(root)?;

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut plan = Vec::new();
        for project in self.candidates(root)? {
            let category = self.resolve_category(&project, sink);
            if let Err(e) = self.check_category(root, &category) {
                sink.error(&format!("Cannot classify {}: {}", project.name, e));
                continue;
            }
            let planned = plan_move(root, project, category, |path| {
                claimed.contains(path) || fsops::path_occupied(path)
            });
            claimed.insert(planned.destination.clone());
            plan.push(planned);
        }
        Ok(plan)
    }

    /// Prints the plan for `root` through the sink and returns it.
    pub fn dry_run(&self, root: &Path, sink: &dyn LogSink) -> Result<Vec<PlannedMove>> {
        sink.info(&format!("DRY RUN: analyzing {}", root.display()));
        let plan = self.plan(root, sink)?;

        if plan.is_empty() {
            sink.warn("No projects to classify");
            return Ok(plan);
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for planned in &plan {
            let destination_name = file_name(&planned.destination);
            if planned.renamed {
                sink.info(&format!(
                    "{} -> {}/{} (renamed)",
                    planned.project, planned.category, destination_name
                ));
            } else {
                sink.info(&format!("{} -> {}/", planned.project, planned.category));
            }
            *counts.entry(planned.category.as_str()).or_insert(0) += 1;
        }

        for (category, count) in counts {
            sink.info(&format!(
                "{}: {} {}",
                category,
                count,
                if count == 1 { "project" } else { "projects" }
            ));
        }
        sink.success(&format!(
            "Dry run complete: {} project(s) would be classified, nothing was moved",
            plan.len()
        ));
        Ok(plan)
    }

    /// Classifies every candidate under `root`.
    ///
    /// This function:
    /// 1. Validates the root and ensures `Unknown/` exists
    /// 2. Lists candidates, skipping reserved, hidden and excluded names
    /// 3. Resolves each candidate's category from its descriptor
    /// 4. Picks `<category>/<name>`, or the first free `<name>_N`
    /// 5. Moves the project; failures are counted and the run continues
    /// 6. Runs the mapping manager if one is attached and anything moved
    pub fn classify(&self, root: &Path, sink: &dyn LogSink) -> Result<ClassifyReport> {
        fsops::validate_root(root)?;
        sink.info(&format!("Classifying projects in {}", root.display()));

        let unknown_dir = root.join(UNKNOWN_CATEGORY);
        fs::create_dir_all(&unknown_dir).map_err(|e| Error::create_dir(&unknown_dir, e))?;

        let mut report = ClassifyReport::default();

        for project in self.candidates(root)? {
            let category = self.resolve_category(&project, sink);
            let name = project.name.clone();

            match self.move_project(root, project, category, sink) {
                Ok(planned) => {
                    sink.success(&format!("{} -> {}", name, planned.category));
                    report.moves.push(planned);
                }
                Err(e) => {
                    sink.error(&format!("Failed to classify {}: {}", name, e));
                    report.errors += 1;
                }
            }
        }

        sink.info(&format!(
            "Classified: {}, failed: {}",
            report.classified(),
            report.errors
        ));

        match (&self.mapping, report.classified()) {
            (Some(manager), n) if n > 0 => match manager.create_mappings(root, sink) {
                Ok(mapping) => report.mapping = Some(mapping),
                Err(e) => sink.error(&format!("Mapping failed: {}", e)),
            },
            (_, 0) => sink.warn("No projects to classify"),
            _ => {}
        }

        Ok(report)
    }

    fn resolve_category(&self, project: &Project, sink: &dyn LogSink) -> String {
        let resolution = self.reader.resolve(&project.path);
        if let CategorySource::Invalid(reason) = &resolution.source {
            sink.warn(&format!(
                "Cannot use {} of {}: {}; using {}",
                self.reader.descriptor_name(),
                project.name,
                reason,
                UNKNOWN_CATEGORY
            ));
        }
        resolution.category
    }

    fn move_project(
        &self,
        root: &Path,
        project: Project,
        category: String,
        sink: &dyn LogSink,
    ) -> Result<PlannedMove> {
        self.check_category(root, &category)?;
        let category_dir = root.join(&category);
        fs::create_dir_all(&category_dir).map_err(|e| Error::create_dir(&category_dir, e))?;

        let planned = plan_move(root, project, category, fsops::path_occupied);
        if planned.renamed {
            sink.warn(&format!(
                "{} already exists, renaming {} -> {}",
                planned.category_path().join(&planned.project).display(),
                planned.project,
                file_name(&planned.destination)
            ));
        }

        fs::rename(&planned.source, &planned.destination).map_err(|e| Error::Move {
            from: planned.source.clone(),
            to: planned.destination.clone(),
            source: e,
        })?;
        debug!(
            "Moved {} to {}",
            planned.source.display(),
            planned.destination.display()
        );

        Ok(planned)
    }
}

impl PlannedMove {
    fn category_path(&self) -> &Path {
        self.destination.parent().unwrap_or(&self.destination)
    }
}

fn plan_move(
    root: &Path,
    project: Project,
    category: String,
    is_taken: impl Fn(&Path) -> bool,
) -> PlannedMove {
    let category_dir = root.join(&category);
    let destination = fsops::first_free_path(&category_dir, &project.name, is_taken);
    let renamed = destination != category_dir.join(&project.name);

    PlannedMove {
        project: project.name,
        category,
        source: project.path,
        destination,
        renamed,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
