//! Per-thread diff over (file, line) identities.

use crate::sequence::SequenceDiffEngine;
use relapse_core::{LogEntry, SourceLocation};
use serde::{Deserialize, Serialize};

/// Diff of one thread's entries between two logs.
///
/// Only the bad-only identities survive this layer; full entry detail is
/// intentionally discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDiff {
    bad_only: Vec<SourceLocation>,
}

impl ThreadDiff {
    /// Diff one thread's good entries against its bad entries
    #[must_use]
    pub fn compute(good: &[LogEntry], bad: &[LogEntry]) -> Self {
        let good_ids: Vec<SourceLocation> = good.iter().map(LogEntry::identity).collect();
        let bad_ids: Vec<SourceLocation> = bad.iter().map(LogEntry::identity).collect();

        let diff = SequenceDiffEngine::new().diff(&good_ids, &bad_ids);
        Self {
            bad_only: diff.bad_only,
        }
    }

    /// Bad-run identities with no counterpart in the good run
    #[must_use]
    pub fn bad_only(&self) -> &[SourceLocation] {
        &self.bad_only
    }

    /// Whether the thread aligned completely
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.bad_only.is_empty()
    }
}
