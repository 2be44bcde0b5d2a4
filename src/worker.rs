//! Background execution of one operation.
//!
//! Each command runs on its own named worker thread. The worker reports
//! through a [`LogSink`] that forwards every entry over an mpsc channel;
//! the foreground drains the channel with [`Task::wait`] and then joins the
//! thread for the operation's result. Only one task is expected to run
//! against a directory tree at a time.

use crate::error::{Error, Result};
use crate::sink::{LogEntry, LogSink};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// A message from a running task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Log(LogEntry),
    Progress { current: usize, total: usize },
}

/// Sink that sends every entry to the foreground.
pub struct ChannelSink {
    tx: Sender<TaskEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<TaskEvent>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn append(&self, entry: LogEntry) {
        // The receiver only goes away once the foreground stopped listening.
        let _ = self.tx.send(TaskEvent::Log(entry));
    }

    fn progress(&self, current: usize, total: usize) {
        let _ = self.tx.send(TaskEvent::Progress { current, total });
    }
}

/// A running background task.
pub struct Task<T> {
    name: String,
    handle: JoinHandle<T>,
    events: Receiver<TaskEvent>,
}

/// Starts `job` on a new thread named `name`.
pub fn spawn_task<T, F>(name: &str, job: F) -> Result<Task<T>>
where
    F: FnOnce(&dyn LogSink) -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let sink = ChannelSink::new(tx);
            job(&sink)
        })
        .map_err(|source| Error::WorkerSpawn {
            name: name.to_string(),
            source,
        })?;

    Ok(Task {
        name: name.to_string(),
        handle,
        events: rx,
    })
}

impl<T> Task<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Passes every event to `on_event` until the task finishes, then
    /// returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPanicked`] if the job panicked.
    pub fn wait(self, mut on_event: impl FnMut(TaskEvent)) -> Result<T> {
        // The channel closes when the job returns or unwinds and drops its sink.
        for event in self.events.iter() {
            on_event(event);
        }
        self.handle
            .join()
            .map_err(|_| Error::WorkerPanicked { name: self.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Level;

    #[test]
    fn test_events_arrive_in_order() {
        let task = spawn_task("test-events", |sink| {
            sink.info("starting");
            sink.progress(1, 2);
            sink.warn("halfway");
            sink.progress(2, 2);
            42
        })
        .expect("Failed to spawn task");

        let mut events = Vec::new();
        let result = task.wait(|event| events.push(event)).expect("Task failed");

        assert_eq!(result, 42);
        assert_eq!(
            events,
            vec![
                TaskEvent::Log(LogEntry::new(Level::Info, "starting")),
                TaskEvent::Progress {
                    current: 1,
                    total: 2
                },
                TaskEvent::Log(LogEntry::new(Level::Warning, "halfway")),
                TaskEvent::Progress {
                    current: 2,
                    total: 2
                },
            ]
        );
    }

    #[test]
    fn test_task_runs_on_named_thread() {
        let task = spawn_task("pkgtidy-named", |_sink| {
            thread::current().name().map(str::to_string)
        })
        .expect("Failed to spawn task");

        assert_eq!(task.name(), "pkgtidy-named");
        let name = task.wait(|_| {}).expect("Task failed");
        assert_eq!(name.as_deref(), Some("pkgtidy-named"));
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let task = spawn_task::<(), _>("test-panic", |sink| {
            sink.info("about to fail");
            panic!("worker failure");
        })
        .expect("Failed to spawn task");

        let mut seen = 0;
        let result: Result<()> = task.wait(|_| seen += 1);

        assert_eq!(seen, 1);
        assert!(matches!(result, Err(Error::WorkerPanicked { name }) if name == "test-panic"));
    }
}
