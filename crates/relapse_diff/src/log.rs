//! Whole-log diff: per-thread alignment composed across threads.

use crate::thread::ThreadDiff;
use indexmap::{IndexMap, IndexSet};
use relapse_core::{LogEntry, ProcessLog, SourceLocation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Diff of one process's full log between two runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDiff {
    bad_only: IndexSet<SourceLocation>,
}

impl LogDiff {
    /// Diff a good-run log against a bad-run log.
    ///
    /// Entries are partitioned by thread; each thread present in both logs
    /// is aligned with [`ThreadDiff`]. A bad-run thread that never appears
    /// in the good run has no possible alignment - an entirely novel thread
    /// is itself evidence of divergence - so every one of its entries is
    /// reported bad-only.
    #[must_use]
    pub fn compute(good: &ProcessLog, bad: &ProcessLog) -> Self {
        let good_threads = partition(&good.entries);
        let bad_threads = partition(&bad.entries);

        let mut bad_only = IndexSet::new();
        for (thread, bad_entries) in &bad_threads {
            match good_threads.get(thread) {
                Some(good_entries) => {
                    let diff = ThreadDiff::compute(good_entries, bad_entries);
                    for identity in diff.bad_only() {
                        bad_only.insert(identity.clone());
                    }
                }
                None => {
                    debug!(thread = %thread, entries = bad_entries.len(), "novel thread in bad run");
                    for entry in bad_entries {
                        bad_only.insert(entry.identity());
                    }
                }
            }
        }

        Self { bad_only }
    }

    /// Bad-run identities with no counterpart in the good run, first-seen
    /// order, deduplicated
    pub fn bad_only(&self) -> impl Iterator<Item = &SourceLocation> {
        self.bad_only.iter()
    }

    /// Whether the logs aligned completely
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.bad_only.is_empty()
    }

    /// Number of distinct bad-only identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.bad_only.len()
    }

    /// Whether the diff holds no identities
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bad_only.is_empty()
    }

    pub(crate) fn into_bad_only(self) -> IndexSet<SourceLocation> {
        self.bad_only
    }
}

fn partition(entries: &[LogEntry]) -> IndexMap<String, Vec<LogEntry>> {
    let mut threads: IndexMap<String, Vec<LogEntry>> = IndexMap::new();
    for entry in entries {
        threads
            .entry(entry.thread.clone())
            .or_default()
            .push(entry.clone());
    }
    threads
}
