//! Error types for pkgtidy.
//!
//! Per-item failures inside a batch are caught at the item boundary and
//! reported through a [`LogSink`](crate::sink::LogSink); the variants here are
//! what those item helpers return, plus the pre-flight failures that stop an
//! operation before it touches the file system.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pkgtidy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reorganizing, mapping, backing up or restoring.
#[derive(Error, Debug)]
pub enum Error {
    /// No root directory was given.
    #[error("No root directory selected")]
    RootNotSelected,

    /// The root directory does not exist or is not a directory.
    #[error("Invalid root directory {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Failed to list a directory.
    #[error("Failed to read directory {}: {source}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to move a file or directory.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy a file or directory.
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a file or directory.
    #[error("Failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a mapping link.
    #[error("Failed to create link {} -> {}: {source}", link.display(), target.display())]
    LinkCreate {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to delete a mapping link.
    #[error("Failed to remove link {}: {source}", link.display())]
    LinkRemove {
        link: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A declared category names an existing project directory.
    #[error("Category {category} is the project {}", path.display())]
    CategoryIsProject { category: String, path: PathBuf },

    /// The requested batch backup does not exist.
    #[error("Batch backup not found: {}", path.display())]
    MissingBatch { path: PathBuf },

    /// A project directory expected by backup or restore does not exist.
    #[error("Project directory not found: {}", path.display())]
    MissingProject { path: PathBuf },

    /// The external extraction step failed for a package.
    #[error("Extraction of {} failed: {reason}", package.display())]
    Extraction { package: PathBuf, reason: String },

    /// A destructive command was not confirmed.
    #[error("{operation} changes files irreversibly; re-run with --yes to confirm")]
    NotConfirmed { operation: String },

    /// Configuration could not be loaded or compiled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The background worker thread could not be started.
    #[error("Failed to start background task '{name}': {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The background worker thread panicked.
    #[error("Background task '{name}' panicked")]
    WorkerPanicked { name: String },

    /// The log file could not be opened.
    #[error("Failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn remove(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Remove {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryRead {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_root_message_names_path() {
        let err = Error::InvalidRoot {
            path: PathBuf::from("/missing/root"),
            reason: "does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid root directory /missing/root: does not exist"
        );
    }

    #[test]
    fn test_io_source_is_chained() {
        let err = Error::remove(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert_eq!(source.to_string(), "denied");
    }
}
