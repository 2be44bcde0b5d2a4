//! pkgtidy - organizes trees of extracted asset projects
//!
//! This library sorts project directories into categories declared by their
//! sidecar descriptors, maintains a layer of hidden links that keeps sorted
//! projects reachable at their old location, and takes and restores batch
//! backups around in-place package extraction.

pub mod backup;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fsops;
pub mod logging;
pub mod mapping;
pub mod metadata;
pub mod output;
pub mod platform;
pub mod restore;
pub mod sink;
pub mod status;
pub mod worker;

pub use backup::{BackupManager, BatchBackup, ProjectBackupReport};
pub use classifier::{ClassifyReport, Classifier, PlannedMove};
pub use config::{Config, ConfigError, ScanFilter};
pub use error::{Error, Result};
pub use extract::{BatchSummary, CommandExtractor, ExtractionBatch, Extractor};
pub use mapping::{MappingManager, MappingReport};
pub use metadata::{MetadataReader, UNKNOWN_CATEGORY};
pub use platform::HiddenAttributeSetter;
pub use restore::{RestoreManager, RestoreReport};
pub use sink::{Level, LogEntry, LogSink, MemorySink, TracingSink};
pub use status::{StatusReport, StatusReporter};
