//! Progress sinks.
//!
//! Every long-running operation reports what it does through a [`LogSink`]
//! passed in by the caller instead of printing directly. The CLI hands in a
//! channel-backed sink owned by the background worker, tests hand in a
//! [`MemorySink`] and inspect the transcript afterwards.

use std::sync::Mutex;

/// Severity of a sink entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Neutral progress information.
    Info,
    /// A unit of work completed.
    Success,
    /// Something was skipped or resolved automatically.
    Warning,
    /// A unit of work failed; the surrounding batch continues.
    Error,
}

/// A single message appended to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Receives progress messages from an operation.
///
/// Implementors only provide [`append`](LogSink::append); the leveled helpers
/// and [`progress`](LogSink::progress) have default implementations.
pub trait LogSink: Send + Sync {
    /// Appends one message.
    fn append(&self, entry: LogEntry);

    fn info(&self, message: &str) {
        self.append(LogEntry::new(Level::Info, message));
    }

    fn success(&self, message: &str) {
        self.append(LogEntry::new(Level::Success, message));
    }

    fn warn(&self, message: &str) {
        self.append(LogEntry::new(Level::Warning, message));
    }

    fn error(&self, message: &str) {
        self.append(LogEntry::new(Level::Error, message));
    }

    /// Reports the position inside a batch (`current` of `total`).
    fn progress(&self, _current: usize, _total: usize) {}
}

/// Forwards entries to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, entry: LogEntry) {
        match entry.level {
            Level::Info | Level::Success => tracing::info!("{}", entry.message),
            Level::Warning => tracing::warn!("{}", entry.message),
            Level::Error => tracing::error!("{}", entry.message),
        }
    }
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything appended so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Returns the messages appended at `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message)
            .collect()
    }

    /// Returns true if any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn append(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_set_level() {
        let sink = MemorySink::new();
        sink.info("scanning");
        sink.warn("renamed");
        sink.error("failed");
        sink.success("done");

        let levels: Vec<_> = sink.entries().iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![Level::Info, Level::Warning, Level::Error, Level::Success]
        );
        assert!(sink.contains(Level::Warning, "renamed"));
        assert!(!sink.contains(Level::Error, "renamed"));
    }

    #[test]
    fn test_sink_is_object_safe() {
        let sink = MemorySink::new();
        let dyn_sink: &dyn LogSink = &sink;
        dyn_sink.info("through a trait object");
        dyn_sink.progress(1, 2);
        assert_eq!(sink.entries().len(), 1);
    }
}
