//! Batch backups taken before an in-place extraction.
//!
//! When extraction writes its output into the same tree it reads packages
//! from, every project is copied into
//! `<root>/.unified_backup/backup_<YYYYMMDD_HHMMSS>/<project>/` before the
//! extractor is allowed to touch it. [`RestoreManager`](crate::restore::RestoreManager)
//! later moves those copies back.

use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::fsops;
use crate::platform::{self, HiddenAttributeSetter};
use crate::sink::LogSink;
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Name of the reserved backup directory at the backup root.
pub const BACKUP_DIR_NAME: &str = ".unified_backup";

/// Prefix of every batch directory.
pub const BATCH_PREFIX: &str = "backup_";

/// Timestamp part of a batch id. Sorts chronologically as a string.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A batch directory created by [`BackupManager::prepare_backup_environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchBackup {
    /// Directory name, e.g. `backup_20250101_120000`.
    pub id: String,
    pub path: PathBuf,
}

/// Outcome of backing up one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectBackupReport {
    pub project: String,
    /// Top-level entries copied.
    pub copied: usize,
    /// Top-level entries that failed to copy.
    pub failed: usize,
    /// Whether a ProjectBackup directory exists in the batch afterwards.
    pub retained: bool,
    /// The project was already backed up earlier in this batch.
    pub already_present: bool,
}

impl ProjectBackupReport {
    /// True if every entry of the project is in the backup.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Returns `<root>/.unified_backup`.
pub fn backup_root(root: &Path) -> PathBuf {
    root.join(BACKUP_DIR_NAME)
}

/// True if `input_root` and `output_root` name the same directory.
pub fn is_in_place(input_root: &Path, output_root: &Path) -> bool {
    match (fs::canonicalize(input_root), fs::canonicalize(output_root)) {
        (Ok(input), Ok(output)) => input == output,
        _ => input_root.components().eq(output_root.components()),
    }
}

/// Creates batch directories and project snapshots.
#[derive(Clone)]
pub struct BackupManager {
    hidden: Arc<dyn HiddenAttributeSetter>,
    auto_backup: bool,
}

impl BackupManager {
    pub fn new(hidden: Arc<dyn HiddenAttributeSetter>, auto_backup: bool) -> Self {
        Self {
            hidden,
            auto_backup,
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(platform::hidden_attribute_setter(), config.auto_backup)
    }

    pub fn auto_backup(&self) -> bool {
        self.auto_backup
    }

    /// Creates a new batch directory for an extraction run writing to
    /// `output_root`.
    ///
    /// Returns `Ok(None)` without touching the disk unless the run is in
    /// place and auto-backup is enabled.
    pub fn prepare_backup_environment(
        &self,
        output_root: &Path,
        is_in_place: bool,
        sink: &dyn LogSink,
    ) -> Result<Option<BatchBackup>> {
        self.prepare_at(output_root, is_in_place, Local::now().naive_local(), sink)
    }

    /// Same as [`prepare_backup_environment`](Self::prepare_backup_environment)
    /// with an explicit clock reading.
    pub fn prepare_at(
        &self,
        output_root: &Path,
        is_in_place: bool,
        now: NaiveDateTime,
        sink: &dyn LogSink,
    ) -> Result<Option<BatchBackup>> {
        if !is_in_place || !self.auto_backup {
            return Ok(None);
        }
        fsops::validate_root(output_root)?;

        sink.warn(&format!(
            "In-place extraction: projects are backed up to {}/ first",
            BACKUP_DIR_NAME
        ));

        let root = backup_root(output_root);
        fs::create_dir_all(&root).map_err(|e| Error::create_dir(&root, e))?;
        if let Err(e) = self.hidden.set_hidden(&root) {
            sink.warn(&format!("Cannot hide {}: {}", BACKUP_DIR_NAME, e));
        }

        let base_id = format!("{}{}", BATCH_PREFIX, now.format(TIMESTAMP_FORMAT));
        let mut id = base_id.clone();
        let mut counter = 1usize;
        let path = loop {
            let candidate = root.join(&id);
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    id = format!("{}_{}", base_id, counter);
                    counter += 1;
                }
                Err(e) => return Err(Error::create_dir(&candidate, e)),
            }
        };

        sink.info(&format!("Created batch backup {}", id));
        Ok(Some(BatchBackup { id, path }))
    }

    /// Copies everything in `project_path` to `<batch>/<project_name>/`.
    ///
    /// A project that is already present in the batch is left alone, so a
    /// second package in the same directory cannot overwrite the original
    /// snapshot with extracted output. If nothing could be copied the empty
    /// backup directory is removed again. Per-entry copy failures are
    /// reported and counted; the remaining entries are still copied.
    pub fn backup_project(
        &self,
        project_path: &Path,
        project_name: &str,
        batch: &BatchBackup,
        sink: &dyn LogSink,
    ) -> Result<ProjectBackupReport> {
        if !project_path.is_dir() {
            return Err(Error::MissingProject {
                path: project_path.to_path_buf(),
            });
        }

        let mut report = ProjectBackupReport {
            project: project_name.to_string(),
            ..Default::default()
        };

        let destination = batch.path.join(project_name);
        if fsops::path_occupied(&destination) {
            sink.info(&format!(
                "{} is already backed up in {}",
                project_name, batch.id
            ));
            report.retained = true;
            report.already_present = true;
            return Ok(report);
        }

        let entries = fsops::list_dir(project_path)?;
        fs::create_dir(&destination).map_err(|e| Error::create_dir(&destination, e))?;
        sink.info(&format!("Backing up {}", project_name));

        for item in entries {
            // A package at the backup root would otherwise copy the backups into themselves.
            if item.name == BACKUP_DIR_NAME {
                continue;
            }
            match fsops::copy_entry(&item.path, &destination.join(&item.name)) {
                Ok(()) => report.copied += 1,
                Err(e) => {
                    sink.warn(&format!("Backup of {} failed: {}", item.name, e));
                    report.failed += 1;
                }
            }
        }

        if report.copied == 0 {
            if let Err(e) = fs::remove_dir_all(&destination) {
                debug!("Could not remove empty backup {}: {}", destination.display(), e);
            }
            sink.warn(&format!("Nothing to back up in {}, skipped", project_name));
        } else {
            report.retained = true;
            sink.success(&format!(
                "Backed up {} entr{} of {}",
                report.copied,
                if report.copied == 1 { "y" } else { "ies" },
                project_name
            ));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test_support::RecordingHidden;
    use crate::sink::{Level, MemorySink};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    fn manager() -> (BackupManager, Arc<RecordingHidden>) {
        let hidden = Arc::new(RecordingHidden::default());
        (BackupManager::new(hidden.clone(), true), hidden)
    }

    #[test]
    fn test_not_in_place_is_noop() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (manager, _) = manager();

        let batch = manager
            .prepare_at(temp_dir.path(), false, noon(), &MemorySink::new())
            .expect("Prepare failed");

        assert!(batch.is_none());
        assert!(!backup_root(temp_dir.path()).exists());
    }

    #[test]
    fn test_auto_backup_disabled_is_noop() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let manager = BackupManager::new(Arc::new(RecordingHidden::default()), false);

        let batch = manager
            .prepare_at(temp_dir.path(), true, noon(), &MemorySink::new())
            .expect("Prepare failed");

        assert!(batch.is_none());
        assert!(!backup_root(temp_dir.path()).exists());
    }

    #[test]
    fn test_prepare_creates_hidden_root_and_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (manager, hidden) = manager();

        let batch = manager
            .prepare_at(temp_dir.path(), true, noon(), &MemorySink::new())
            .expect("Prepare failed")
            .expect("batch should be created");

        assert_eq!(batch.id, "backup_20250314_123005");
        assert_eq!(
            batch.path,
            temp_dir.path().join(".unified_backup").join("backup_20250314_123005")
        );
        assert!(batch.path.is_dir());
        assert!(
            hidden
                .hidden
                .lock()
                .unwrap()
                .contains(&backup_root(temp_dir.path()))
        );
    }

    #[test]
    fn test_same_second_batches_get_suffix() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (manager, _) = manager();
        let sink = MemorySink::new();

        let ids: Vec<_> = (0..3)
            .map(|_| {
                manager
                    .prepare_at(temp_dir.path(), true, noon(), &sink)
                    .expect("Prepare failed")
                    .expect("batch should be created")
                    .id
            })
            .collect();

        assert_eq!(
            ids,
            vec![
                "backup_20250314_123005",
                "backup_20250314_123005_1",
                "backup_20250314_123005_2"
            ]
        );
    }

    #[test]
    fn test_backup_project_copies_everything() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let project = root.join("Foo");
        fs::create_dir_all(project.join("materials")).expect("Failed to create project");
        fs::write(project.join("a.tex"), "original").expect("Failed to write");
        fs::write(project.join("scene.pkg"), "package").expect("Failed to write");
        fs::write(project.join("materials").join("m.json"), "{}").expect("Failed to write");

        let (manager, _) = manager();
        let sink = MemorySink::new();
        let batch = manager
            .prepare_at(root, true, noon(), &sink)
            .unwrap()
            .unwrap();

        let report = manager
            .backup_project(&project, "Foo", &batch, &sink)
            .expect("Backup failed");

        assert_eq!(report.copied, 3);
        assert!(report.is_complete());
        assert!(report.retained);
        let saved = batch.path.join("Foo");
        assert_eq!(fs::read_to_string(saved.join("a.tex")).unwrap(), "original");
        assert!(saved.join("scene.pkg").is_file());
        assert!(saved.join("materials").join("m.json").is_file());
        assert!(project.join("a.tex").is_file(), "source must be kept");
    }

    #[test]
    fn test_empty_project_leaves_no_backup() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("Empty")).expect("Failed to create project");

        let (manager, _) = manager();
        let sink = MemorySink::new();
        let batch = manager
            .prepare_at(root, true, noon(), &sink)
            .unwrap()
            .unwrap();

        let report = manager
            .backup_project(&root.join("Empty"), "Empty", &batch, &sink)
            .expect("Backup failed");

        assert_eq!(report.copied, 0);
        assert!(!report.retained);
        assert!(!batch.path.join("Empty").exists());
        assert!(sink.contains(Level::Warning, "Nothing to back up in Empty"));
    }

    #[test]
    fn test_second_backup_of_same_project_is_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let project = root.join("Foo");
        fs::create_dir(&project).expect("Failed to create project");
        fs::write(project.join("a.tex"), "original").expect("Failed to write");

        let (manager, _) = manager();
        let sink = MemorySink::new();
        let batch = manager
            .prepare_at(root, true, noon(), &sink)
            .unwrap()
            .unwrap();
        manager
            .backup_project(&project, "Foo", &batch, &sink)
            .expect("Backup failed");

        fs::write(project.join("a.tex"), "extracted").expect("Failed to write");
        let second = manager
            .backup_project(&project, "Foo", &batch, &sink)
            .expect("Backup failed");

        assert!(second.already_present);
        assert_eq!(
            fs::read_to_string(batch.path.join("Foo").join("a.tex")).unwrap(),
            "original"
        );
    }

    #[test]
    fn test_backup_of_root_skips_backup_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("scene.pkg"), "package").expect("Failed to write");

        let (manager, _) = manager();
        let sink = MemorySink::new();
        let batch = manager
            .prepare_at(root, true, noon(), &sink)
            .unwrap()
            .unwrap();
        let report = manager
            .backup_project(root, "root", &batch, &sink)
            .expect("Backup failed");

        assert_eq!(report.copied, 1);
        assert!(!batch.path.join("root").join(BACKUP_DIR_NAME).exists());
    }

    #[test]
    fn test_missing_project_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (manager, _) = manager();
        let sink = MemorySink::new();
        let batch = manager
            .prepare_at(temp_dir.path(), true, noon(), &sink)
            .unwrap()
            .unwrap();

        let result = manager.backup_project(&temp_dir.path().join("Nope"), "Nope", &batch, &sink);
        assert!(matches!(result, Err(Error::MissingProject { .. })));
    }

    #[test]
    fn test_is_in_place() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("out")).expect("Failed to create dir");

        assert!(is_in_place(root, root));
        assert!(is_in_place(root, &root.join("out").join("..")));
        assert!(!is_in_place(root, &root.join("out")));
    }
}
