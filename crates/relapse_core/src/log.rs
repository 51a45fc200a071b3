//! Parsed execution logs.
//!
//! Entries are produced by an external parser and are immutable here.
//! Equality for diffing purposes uses only the (file, line) identity -
//! message text and timestamps are ignored, tolerating nondeterministic
//! message content between runs.

use crate::id::ProcessId;
use crate::record::InjectionRequestRecord;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// The (file, line) identity of a log statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file that emitted the entry
    pub file: String,
    /// Source line that emitted the entry
    pub line: u32,
}

impl SourceLocation {
    /// Create a new source location
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One parsed log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall clock timestamp of the entry
    pub timestamp: Timestamp,
    /// Name of the thread that emitted the entry
    pub thread: String,
    /// Source file that emitted the entry
    pub file: String,
    /// Source line that emitted the entry
    pub line: u32,
    /// Message text (ignored by the diff)
    pub message: String,
}

impl LogEntry {
    /// Create a new log entry
    #[must_use]
    pub fn new(timestamp: Timestamp, thread: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            timestamp,
            thread: thread.into(),
            file: file.into(),
            line,
            message: String::new(),
        }
    }

    /// Attach message text
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The (file, line) identity used for diffing
    #[must_use]
    pub fn identity(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line)
    }
}

/// One process's log: its ordered entries plus the injection-request
/// records the instrumentation wrote into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLog {
    /// Process the log belongs to
    pub process: ProcessId,
    /// Ordered log entries
    pub entries: Vec<LogEntry>,
    /// Historical injection-request firings recorded in this log
    pub injections: Vec<InjectionRequestRecord>,
}

impl ProcessLog {
    /// Create an empty process log
    #[must_use]
    pub fn new(process: ProcessId) -> Self {
        Self {
            process,
            entries: Vec::new(),
            injections: Vec::new(),
        }
    }

    /// Set the entries
    #[must_use]
    pub fn with_entries(mut self, entries: Vec<LogEntry>) -> Self {
        self.entries = entries;
        self
    }

    /// Set the injection records
    #[must_use]
    pub fn with_injections(mut self, injections: Vec<InjectionRequestRecord>) -> Self {
        self.injections = injections;
        self
    }

    /// Append an entry
    pub fn push_entry(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Timestamp of the first entry, if any
    #[must_use]
    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.entries.first().map(|e| e.timestamp)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One distributed run: per-process logs paired by index with the
/// corresponding run on the other side of a diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLog {
    /// Per-process logs, in process order
    pub processes: Vec<ProcessLog>,
}

impl RunLog {
    /// Create an empty run
    #[must_use]
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
        }
    }

    /// Add a process log
    #[must_use]
    pub fn with_process(mut self, log: ProcessLog) -> Self {
        self.processes.push(log);
        self
    }

    /// Number of processes in the run
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Total entry count across processes; the substitute penalty callers
    /// use for occurrences whose target event never happened
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.processes.iter().map(ProcessLog::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_message_and_time() {
        let a = LogEntry::new(Timestamp::from_millis(1), "T1", "worker.rs", 10)
            .with_message("attempt 1");
        let b = LogEntry::new(Timestamp::from_millis(99), "T1", "worker.rs", 10)
            .with_message("attempt 2");
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new("server.rs", 42);
        assert_eq!(format!("{}", loc), "server.rs:42");
    }

    #[test]
    fn test_process_log_first_timestamp() {
        let mut log = ProcessLog::new(ProcessId::from_raw(0));
        assert!(log.first_timestamp().is_none());

        log.push_entry(LogEntry::new(Timestamp::from_millis(500), "main", "a.rs", 1));
        log.push_entry(LogEntry::new(Timestamp::from_millis(900), "main", "a.rs", 2));
        assert_eq!(log.first_timestamp(), Some(Timestamp::from_millis(500)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_run_log_total_len() {
        let run = RunLog::new()
            .with_process(
                ProcessLog::new(ProcessId::from_raw(0)).with_entries(vec![
                    LogEntry::new(Timestamp::from_millis(1), "main", "a.rs", 1),
                ]),
            )
            .with_process(
                ProcessLog::new(ProcessId::from_raw(1)).with_entries(vec![
                    LogEntry::new(Timestamp::from_millis(2), "main", "b.rs", 1),
                    LogEntry::new(Timestamp::from_millis(3), "main", "b.rs", 2),
                ]),
            );
        assert_eq!(run.process_count(), 2);
        assert_eq!(run.total_len(), 3);
    }
}
