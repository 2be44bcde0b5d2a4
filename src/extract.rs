//! Package extraction batches.
//!
//! The extraction itself is done by an external program behind the
//! [`Extractor`] trait. This module finds the packages, derives where each
//! one is extracted to, and makes sure an in-place run snapshots every
//! project before the extractor is allowed to overwrite it.

use crate::backup::{self, BACKUP_DIR_NAME, BackupManager, BatchBackup};
use crate::config::{Config, ConfigError, ExtractConfig};
use crate::error::{Error, Result};
use crate::fsops;
use crate::sink::{Level, LogEntry, LogSink};
use std::ffi::OsStr;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;
use walkdir::WalkDir;

/// Finds every package file under `input_root`.
///
/// Matching is on the file extension, case-insensitively. Without
/// `recursive` only the root itself is searched. The backup directory and
/// symbolic links to directories are never entered. The result is sorted.
pub fn scan_packages(input_root: &Path, recursive: bool, extension: &str) -> Result<Vec<PathBuf>> {
    fsops::validate_root(input_root)?;
    let extension = extension.trim_start_matches('.');

    let walker = WalkDir::new(input_root)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(false)
        .sort_by_file_name();

    let mut packages = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| e.file_name() != OsStr::new(BACKUP_DIR_NAME))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let is_package = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if is_package {
            packages.push(entry.into_path());
        }
    }

    packages.sort();
    Ok(packages)
}

/// The project a package belongs to: the name of its parent directory.
pub fn project_name(package: &Path) -> Option<String> {
    package
        .parent()?
        .file_name()?
        .to_str()
        .map(str::to_string)
}

/// Extracts one package into a directory.
pub trait Extractor: Send + Sync {
    /// Extracts `package` into `output_dir`, which already exists.
    fn extract(&self, package: &Path, output_dir: &Path, sink: &dyn LogSink) -> Result<()>;
}

/// Runs an external program once per package.
///
/// `{package}` and `{output}` in the arguments are replaced with the
/// package path and the output directory. Everything the program writes is
/// forwarded to the sink line by line: stdout as info, stderr as warnings.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        let program = config.program.trim();
        if program.is_empty() {
            return Err(ConfigError::ConfigInvalid(
                "no extraction program configured ([extract] program)".to_string(),
            )
            .into());
        }
        Ok(Self::new(program, config.args.clone()))
    }

    /// Arguments for one invocation, with placeholders substituted.
    pub fn build_args(&self, package: &Path, output_dir: &Path) -> Vec<String> {
        let package = package.display().to_string();
        let output = output_dir.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{package}", &package).replace("{output}", &output))
            .collect()
    }
}

impl Extractor for CommandExtractor {
    fn extract(&self, package: &Path, output_dir: &Path, sink: &dyn LogSink) -> Result<()> {
        let args = self.build_args(package, output_dir);
        sink.info(&format!("Running {} {}", self.program.display(), args.join(" ")));

        let failure = |reason: String| Error::Extraction {
            package: package.to_path_buf(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failure(format!("cannot start {}: {}", self.program.display(), e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        thread::scope(|scope| {
            if let Some(stderr) = stderr {
                scope.spawn(move || forward_lines(stderr, Level::Warning, sink));
            }
            if let Some(stdout) = stdout {
                forward_lines(stdout, Level::Info, sink);
            }
        });

        let status = child
            .wait()
            .map_err(|e| failure(format!("cannot wait for {}: {}", self.program.display(), e)))?;
        if !status.success() {
            return Err(failure(format!("extractor exited with {}", status)));
        }
        Ok(())
    }
}

/// Copies each non-empty line of `reader` into the sink. Invalid UTF-8 is replaced.
fn forward_lines(reader: impl Read, level: Level, sink: &dyn LogSink) {
    for line in BufReader::new(reader).split(b'\n').map_while(|line| line.ok()) {
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            sink.append(LogEntry::new(level, format!("  {}", line)));
        }
    }
}

/// Result of [`ExtractionBatch::run`].
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Packages found.
    pub packages: usize,
    /// Packages extracted successfully.
    pub extracted: usize,
    /// Projects backed up into the batch.
    pub backed_up: usize,
    /// The batch created for an in-place run.
    pub batch: Option<BatchBackup>,
    /// Packages not extracted because their project could not be backed up.
    pub skipped: Vec<(PathBuf, String)>,
    /// Packages whose extraction failed.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn is_complete_success(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Backs up and extracts every package under an input root, one at a time.
pub struct ExtractionBatch {
    extractor: Box<dyn Extractor>,
    backup: BackupManager,
    package_extension: String,
    descriptor_name: String,
    recursive: bool,
}

impl ExtractionBatch {
    pub fn new(extractor: Box<dyn Extractor>, backup: BackupManager) -> Self {
        Self {
            extractor,
            backup,
            package_extension: "pkg".to_string(),
            descriptor_name: "project.json".to_string(),
            recursive: true,
        }
    }

    /// Builds a batch around the configured [`CommandExtractor`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = CommandExtractor::from_config(&config.extract)?;
        Ok(Self::new(
            Box::new(extractor),
            BackupManager::from_config(&config.backup),
        )
        .package_extension(&config.backup.package_extension)
        .descriptor_name(&config.classify.descriptor)
        .recursive(config.extract.recursive))
    }

    pub fn package_extension(mut self, extension: &str) -> Self {
        self.package_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn descriptor_name(mut self, name: &str) -> Self {
        self.descriptor_name = name.to_string();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Extracts every package under `input_root` into
    /// `<output_root>/<project name>`.
    ///
    /// If both roots are the same directory and auto-backup is on, a batch
    /// backup is created first; failing to create it aborts the run before
    /// any package is touched. Each project's output directory is then
    /// backed up before its package is extracted, and a package whose backup
    /// did not complete is skipped. Extraction failures only affect their
    /// own package.
    pub fn run(&self, input_root: &Path, output_root: &Path, sink: &dyn LogSink) -> Result<BatchSummary> {
        fsops::validate_root(input_root)?;
        fs::create_dir_all(output_root).map_err(|e| Error::create_dir(output_root, e))?;

        let packages = scan_packages(input_root, self.recursive, &self.package_extension)?;
        let mut summary = BatchSummary {
            packages: packages.len(),
            ..Default::default()
        };
        if packages.is_empty() {
            sink.warn(&format!(
                "No .{} files found in {}",
                self.package_extension,
                input_root.display()
            ));
            return Ok(summary);
        }
        sink.info(&format!(
            "Found {} .{} file(s)",
            packages.len(),
            self.package_extension
        ));

        let in_place = backup::is_in_place(input_root, output_root);
        if in_place && !self.backup.auto_backup() {
            sink.warn("In-place extraction with auto-backup disabled: nothing will be backed up");
        }
        summary.batch = self
            .backup
            .prepare_backup_environment(output_root, in_place, sink)?;

        let total = packages.len();
        for (index, package) in packages.iter().enumerate() {
            self.process_package(package, output_root, index, total, &mut summary, sink);
            sink.progress(index + 1, total);
        }

        if summary.is_complete_success() {
            sink.success(&format!("Extracted {} package(s)", summary.extracted));
        } else {
            sink.warn(&format!(
                "Extracted {} of {} package(s), {} skipped, {} failed",
                summary.extracted,
                total,
                summary.skipped.len(),
                summary.failed.len()
            ));
        }
        Ok(summary)
    }

    fn process_package(
        &self,
        package: &Path,
        output_root: &Path,
        index: usize,
        total: usize,
        summary: &mut BatchSummary,
        sink: &dyn LogSink,
    ) {
        let Some(name) = project_name(package) else {
            let reason = "package has no project directory".to_string();
            sink.error(&format!("{}: {}", package.display(), reason));
            summary.failed.push((package.to_path_buf(), reason));
            return;
        };
        sink.info(&format!("[{}/{}] Processing {}", index + 1, total, name));

        let output_dir = output_root.join(&name);

        if let Some(batch) = &summary.batch
            && output_dir.is_dir()
        {
            match self.backup.backup_project(&output_dir, &name, batch, sink) {
                Ok(report) if report.is_complete() => {
                    if report.retained && !report.already_present {
                        summary.backed_up += 1;
                    }
                }
                Ok(report) => {
                    let reason = format!("{} entries could not be backed up", report.failed);
                    sink.error(&format!("Skipped {}: {}", name, reason));
                    summary.skipped.push((package.to_path_buf(), reason));
                    return;
                }
                Err(e) => {
                    sink.error(&format!("Skipped {}: {}", name, e));
                    summary.skipped.push((package.to_path_buf(), e.to_string()));
                    return;
                }
            }
        }

        if let Err(e) = fs::create_dir_all(&output_dir) {
            let err = Error::create_dir(&output_dir, e);
            sink.error(&err.to_string());
            summary.failed.push((package.to_path_buf(), err.to_string()));
            return;
        }

        match self.extractor.extract(package, &output_dir, sink) {
            Ok(()) => {
                summary.extracted += 1;
                sink.success(&format!("Extracted {}", name));
            }
            Err(e) => {
                sink.error(&e.to_string());
                summary.failed.push((package.to_path_buf(), e.to_string()));
                return;
            }
        }

        self.copy_descriptor(package, &output_dir, sink);
    }

    /// Copies the project's descriptor next to the extracted output so the
    /// output tree can be classified.
    fn copy_descriptor(&self, package: &Path, output_dir: &Path, sink: &dyn LogSink) {
        let Some(project_dir) = package.parent() else {
            return;
        };
        let source = project_dir.join(&self.descriptor_name);
        if !source.is_file() || backup::is_in_place(project_dir, output_dir) {
            return;
        }
        if let Err(e) = fs::copy(&source, output_dir.join(&self.descriptor_name)) {
            sink.warn(&format!("Cannot copy {}: {}", self.descriptor_name, e));
        }
    }
}
