//! Restoring projects from a batch backup.
//!
//! Restore is the inverse of an in-place extraction run: for every project
//! in the selected batch, the extracted content is deleted from the live
//! project directory (package-source files excepted) and the backed-up
//! content is moved back.
use crate::backup::{BATCH_PREFIX, backup_root};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::fsops::{self, DirItem};
use crate::platform;
use crate::sink::LogSink;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Represents the result of a restore operation.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub batch_id: String,
    /// Projects whose backup was fully moved back and removed.
    pub restored_projects: Vec<String>,
    /// Projects that were not restored, with the reason. Their backups stay in the batch.
    pub skipped_projects: Vec<(String, String)>,
    /// Entries deleted from live project directories.
    pub deleted_entries: usize,
    /// Entries moved back from the batch.
    pub restored_entries: usize,
    /// Per-entry failures.
    pub failures: Vec<(PathBuf, String)>,
    /// The batch directory was removed afterwards.
    pub batch_removed: bool,
    /// `.unified_backup` was removed because it became empty.
    pub backup_root_removed: bool,
}

impl RestoreReport {
    fn new(batch_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            ..Default::default()
        }
    }

    /// Returns true if every project in the batch was restored.
    pub fn is_complete_success(&self) -> bool {
        self.skipped_projects.is_empty() && self.failures.is_empty() && self.batch_removed
    }
}

/// Lists and restores batch backups.
#[derive(Debug, Clone)]
pub struct RestoreManager {
    package_extension: String,
}

impl Default for RestoreManager {
    fn default() -> Self {
        Self::new("pkg")
    }
}

impl RestoreManager {
    /// `package_extension` names the package-source files that restore keeps.
    pub fn new(package_extension: impl Into<String>) -> Self {
        Self {
            package_extension: package_extension.into().trim_start_matches('.').to_lowercase(),
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(config.package_extension.as_str())
    }

    /// Returns the batch ids under `<root>/.unified_backup`, newest first.
    ///
    /// A root without backups yields an empty list.
    pub fn list_backups(&self, root: &Path) -> Result<Vec<String>> {
        fsops::validate_root(root)?;

        let backups = backup_root(root);
        if !backups.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fsops::list_dir(&backups)?
            .into_iter()
            .filter(|item| item.is_dir() && item.name.starts_with(BATCH_PREFIX))
            .map(|item| item.name)
            .collect();
        ids.sort_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    /// Restores every project in batch `batch_id` under `root`.
    ///
    /// # Returns
    ///
    /// Returns a `RestoreReport` describing what was restored, what was
    /// skipped and what failed. Returns an error before touching anything
    /// if the root is invalid or the batch does not exist.
    ///
    /// # Edge Cases Handled
    ///
    /// * **Live project missing**: skipped with a warning, its backup stays in the batch
    /// * **Package files**: never deleted; a backed-up duplicate of a kept package is discarded
    /// * **Partial failure**: a project backup is only removed once all of it was moved back,
    ///   and the batch is only removed once it is empty
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pkgtidy::restore::RestoreManager;
    /// use pkgtidy::sink::TracingSink;
    /// use std::path::Path;
    ///
    /// let manager = RestoreManager::default();
    /// let root = Path::new("/wallpapers");
    /// if let Some(newest) = manager.list_backups(root)?.first() {
    ///     let report = manager.restore_batch(root, newest, &TracingSink)?;
    ///     println!("Restored {} project(s)", report.restored_projects.len());
    /// }
    /// # Ok::<(), pkgtidy::Error>(())
    /// ```
    pub fn restore_batch(
        &self,
        root: &Path,
        batch_id: &str,
        sink: &dyn LogSink,
    ) -> Result<RestoreReport> {
        fsops::validate_root(root)?;

        let backups = backup_root(root);
        let batch_path = backups.join(batch_id);
        if !fsops::is_plain_name(batch_id)
            || !batch_path.is_dir()
            || platform::is_symlink(&batch_path)
        {
            return Err(Error::MissingBatch { path: batch_path });
        }

        sink.info(&format!("Restoring batch {}", batch_id));
        let mut report = RestoreReport::new(batch_id);

        let projects: Vec<DirItem> = fsops::list_dir(&batch_path)?
            .into_iter()
            .filter(DirItem::is_dir)
            .collect();
        if projects.is_empty() {
            sink.info(&format!("Batch {} holds no project backups", batch_id));
        }

        let total = projects.len();
        for (index, project) in projects.iter().enumerate() {
            self.restore_project(root, project, &mut report, sink);
            sink.progress(index + 1, total);
        }

        match fs::remove_dir(&batch_path) {
            Ok(()) => {
                report.batch_removed = true;
                debug!("Removed batch {}", batch_path.display());
            }
            Err(e) => sink.warn(&format!(
                "Batch {} was kept because it is not empty: {}",
                batch_id, e
            )),
        }

        if fsops::is_empty_dir(&backups) {
            match fs::remove_dir(&backups) {
                Ok(()) => report.backup_root_removed = true,
                Err(e) => debug!("Could not remove {}: {}", backups.display(), e),
            }
        }

        if report.is_complete_success() {
            sink.success(&format!(
                "Restored {} project(s) from {}",
                report.restored_projects.len(),
                batch_id
            ));
        } else {
            sink.warn(&format!(
                "Restored {} project(s) from {}, {} skipped, {} failure(s)",
                report.restored_projects.len(),
                batch_id,
                report.skipped_projects.len(),
                report.failures.len()
            ));
        }

        Ok(report)
    }

    /// Cleans up the live copy of one project, then moves its backup back.
    fn restore_project(
        &self,
        root: &Path,
        backup: &DirItem,
        report: &mut RestoreReport,
        sink: &dyn LogSink,
    ) {
        let name = &backup.name;
        let live = root.join(name);
        if !live.is_dir() {
            let err = Error::MissingProject { path: live };
            sink.warn(&format!("Skipped {}: {}", name, err));
            report
                .skipped_projects
                .push((name.clone(), "project directory not found".to_string()));
            return;
        }

        let live_items = match fsops::list_dir(&live) {
            Ok(items) => items,
            Err(e) => {
                sink.error(&e.to_string());
                report.skipped_projects.push((name.clone(), e.to_string()));
                return;
            }
        };

        let mut deleted = 0;
        for item in live_items {
            if self.is_package_file(&item) {
                continue;
            }
            match fsops::remove_entry(&item.path) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    sink.error(&e.to_string());
                    report.failures.push((item.path, e.to_string()));
                }
            }
        }
        report.deleted_entries += deleted;
        sink.info(&format!("Cleaned {} entr{} from {}", deleted, plural_y(deleted), name));

        let backup_items = match fsops::list_dir(&backup.path) {
            Ok(items) => items,
            Err(e) => {
                sink.error(&e.to_string());
                report.skipped_projects.push((name.clone(), e.to_string()));
                return;
            }
        };

        let mut restored = 0;
        for item in backup_items {
            let destination = live.join(&item.name);
            if fsops::path_occupied(&destination) {
                if self.is_package_file(&item) && !destination.is_dir() {
                    // The live package was kept during cleanup; drop the copy.
                    match fsops::remove_entry(&item.path) {
                        Ok(()) => restored += 1,
                        Err(e) => report.failures.push((item.path, e.to_string())),
                    }
                } else {
                    let reason = "destination already exists".to_string();
                    sink.warn(&format!("Kept backup of {}/{}: {}", name, item.name, reason));
                    report.failures.push((item.path, reason));
                }
                continue;
            }

            match fs::rename(&item.path, &destination) {
                Ok(()) => restored += 1,
                Err(source) => {
                    let err = Error::Move {
                        from: item.path.clone(),
                        to: destination,
                        source,
                    };
                    sink.error(&err.to_string());
                    report.failures.push((item.path, err.to_string()));
                }
            }
        }
        report.restored_entries += restored;

        if fsops::is_empty_dir(&backup.path) && fs::remove_dir(&backup.path).is_ok() {
            sink.success(&format!(
                "Restored {} entr{} of {}",
                restored,
                plural_y(restored),
                name
            ));
            report.restored_projects.push(name.clone());
        } else {
            sink.warn(&format!("Backup of {} was kept: not every entry was restored", name));
            report
                .skipped_projects
                .push((name.clone(), "partially restored".to_string()));
        }
    }

    /// True for non-directory entries named `*.<package extension>`, case-insensitively.
    pub fn is_package_file(&self, item: &DirItem) -> bool {
        !item.is_dir()
            && item
                .name
                .to_lowercase()
                .ends_with(&format!(".{}", self.package_extension))
    }
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 { "y" } else { "ies" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BACKUP_DIR_NAME;
    use crate::sink::{Level, MemorySink};
    use tempfile::TempDir;

    struct Tree {
        _temp_dir: TempDir,
        root: PathBuf,
    }

    impl Tree {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let root = temp_dir.path().to_path_buf();
            Self {
                _temp_dir: temp_dir,
                root,
            }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent");
            }
            fs::write(path, content).expect("Failed to write file");
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.root.join(rel)).expect("Failed to read file")
        }

        fn batch(&self, id: &str) -> PathBuf {
            self.root.join(BACKUP_DIR_NAME).join(id)
        }
    }

    #[test]
    fn test_list_backups_newest_first() {
        let tree = Tree::new();
        for id in [
            "backup_20240101_000000",
            "backup_20250101_000000",
            "backup_20250101_000000_1",
            "notes",
        ] {
            fs::create_dir_all(tree.batch(id)).expect("Failed to create batch");
        }
        tree.write(".unified_backup/backup_file", "not a batch");

        let ids = RestoreManager::default()
            .list_backups(&tree.root)
            .expect("Listing failed");

        assert_eq!(
            ids,
            vec![
                "backup_20250101_000000_1",
                "backup_20250101_000000",
                "backup_20240101_000000"
            ]
        );
    }

    #[test]
    fn test_list_backups_without_backup_dir() {
        let tree = Tree::new();
        let ids = RestoreManager::default()
            .list_backups(&tree.root)
            .expect("Listing failed");
        assert!(ids.is_empty());
    }

    #[test]
    fn test_restore_round_trip_keeps_package() {
        let tree = Tree::new();
        tree.write("Foo/a.tex", "extracted");
        tree.write("Foo/scene.pkg", "package");
        tree.write("Foo/materials/new.json", "{}");
        tree.write(".unified_backup/backup_20250101_120000/Foo/a.tex", "original");
        tree.write(".unified_backup/backup_20250101_120000/Foo/scene.pkg", "package");

        let sink = MemorySink::new();
        let report = RestoreManager::default()
            .restore_batch(&tree.root, "backup_20250101_120000", &sink)
            .expect("Restore failed");

        assert_eq!(tree.read("Foo/a.tex"), "original");
        assert_eq!(tree.read("Foo/scene.pkg"), "package");
        assert!(!tree.root.join("Foo/materials").exists());
        assert_eq!(report.restored_projects, vec!["Foo".to_string()]);
        assert_eq!(report.deleted_entries, 2);
        assert!(report.batch_removed);
        assert!(report.backup_root_removed);
        assert!(report.is_complete_success());
        assert!(!tree.root.join(BACKUP_DIR_NAME).exists());
    }

    #[test]
    fn test_conflict_keeps_project_backup_and_batch() {
        let tree = Tree::new();
        tree.write("Foo/x.pkg", "live package");
        tree.write("Foo/out.txt", "extracted");
        tree.write(".unified_backup/backup_1/Foo/a.tex", "original");
        tree.write(".unified_backup/backup_1/Foo/x.pkg/inner.txt", "not a package");

        let sink = MemorySink::new();
        let report = RestoreManager::default()
            .restore_batch(&tree.root, "backup_1", &sink)
            .expect("Restore failed");

        assert_eq!(tree.read("Foo/a.tex"), "original");
        assert_eq!(tree.read("Foo/x.pkg"), "live package");
        assert!(tree.batch("backup_1").join("Foo/x.pkg/inner.txt").is_file());
        assert!(report.restored_projects.is_empty());
        assert_eq!(
            report.skipped_projects,
            vec![("Foo".to_string(), "partially restored".to_string())]
        );
        assert_eq!(report.failures.len(), 1);
        assert!(!report.batch_removed);
        assert!(!report.is_complete_success());
        assert!(sink.contains(Level::Warning, "Kept backup of Foo/x.pkg"));
    }

    #[test]
    fn test_package_extension_is_case_insensitive() {
        let tree = Tree::new();
        tree.write("Foo/SCENE.PKG", "live package");
        tree.write("Foo/out.txt", "extracted");
        tree.write(".unified_backup/backup_1/Foo/a.tex", "original");

        RestoreManager::default()
            .restore_batch(&tree.root, "backup_1", &MemorySink::new())
            .expect("Restore failed");

        assert_eq!(tree.read("Foo/SCENE.PKG"), "live package");
        assert!(!tree.root.join("Foo/out.txt").exists());
        assert_eq!(tree.read("Foo/a.tex"), "original");
    }

    #[test]
    fn test_missing_batch_is_error_without_mutation() {
        let tree = Tree::new();
        tree.write("Foo/a.tex", "extracted");

        for id in ["backup_missing", "../Foo", ".."] {
            let result =
                RestoreManager::default().restore_batch(&tree.root, id, &MemorySink::new());
            assert!(matches!(result, Err(Error::MissingBatch { .. })), "{id}");
        }
        assert_eq!(tree.read("Foo/a.tex"), "extracted");
    }

    #[test]
    fn test_missing_live_project_keeps_backup() {
        let tree = Tree::new();
        tree.write(".unified_backup/backup_1/Gone/a.tex", "original");
        tree.write(".unified_backup/backup_1/Foo/a.tex", "original");
        tree.write("Foo/a.tex", "extracted");

        let sink = MemorySink::new();
        let report = RestoreManager::default()
            .restore_batch(&tree.root, "backup_1", &sink)
            .expect("Restore failed");

        assert_eq!(report.restored_projects, vec!["Foo".to_string()]);
        assert_eq!(report.skipped_projects.len(), 1);
        assert_eq!(report.skipped_projects[0].0, "Gone");
        assert!(!report.batch_removed);
        assert!(tree.batch("backup_1").join("Gone").join("a.tex").is_file());
        assert!(sink.contains(Level::Warning, "Skipped Gone"));
    }

    #[test]
    fn test_empty_batch_is_removed() {
        let tree = Tree::new();
        fs::create_dir_all(tree.batch("backup_1")).expect("Failed to create batch");
        fs::create_dir_all(tree.batch("backup_2")).expect("Failed to create batch");

        let report = RestoreManager::default()
            .restore_batch(&tree.root, "backup_1", &MemorySink::new())
            .expect("Restore failed");

        assert!(report.batch_removed);
        assert!(!report.backup_root_removed);
        assert!(!tree.batch("backup_1").exists());
        assert!(tree.batch("backup_2").is_dir());
    }

    #[test]
    fn test_custom_package_extension() {
        let tree = Tree::new();
        tree.write("Foo/scene.pkg", "extracted");
        tree.write("Foo/source.mpkg", "package");
        tree.write(".unified_backup/backup_1/Foo/a.tex", "original");

        RestoreManager::new(".mpkg")
            .restore_batch(&tree.root, "backup_1", &MemorySink::new())
            .expect("Restore failed");

        assert!(!tree.root.join("Foo/scene.pkg").exists());
        assert_eq!(tree.read("Foo/source.mpkg"), "package");
    }
}
