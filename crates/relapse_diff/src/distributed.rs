//! Cross-process diff: per-process log diffs combined by set union.

use crate::log::LogDiff;
use indexmap::IndexSet;
use relapse_core::{CoreError, CoreResult, RunLog, SourceLocation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Diff of one distributed run against another, paired by process index.
///
/// Per-process diffs are independent and combination is a set union, so an
/// identity recurring in several processes is reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedLogDiff {
    bad_only: IndexSet<SourceLocation>,
}

impl DistributedLogDiff {
    /// Diff a good run against a bad run.
    ///
    /// # Errors
    ///
    /// Returns an error if the runs have different process counts.
    pub fn compute(good: &RunLog, bad: &RunLog) -> CoreResult<Self> {
        if good.process_count() != bad.process_count() {
            return Err(CoreError::Validation {
                field: "processes".to_string(),
                reason: format!(
                    "good run has {} processes, bad run has {}",
                    good.process_count(),
                    bad.process_count()
                ),
            });
        }

        let mut bad_only = IndexSet::new();
        for (good_log, bad_log) in good.processes.iter().zip(&bad.processes) {
            let diff = LogDiff::compute(good_log, bad_log);
            debug!(process = %bad_log.process, identities = diff.len(), "process diff");
            bad_only.extend(diff.into_bad_only());
        }

        Ok(Self { bad_only })
    }

    /// The union of bad-only identities across processes, first-seen order
    pub fn bad_only(&self) -> impl Iterator<Item = &SourceLocation> {
        self.bad_only.iter()
    }

    /// Consume the diff into the ordered target list handed to the
    /// attribution pass; index in the returned list is the target index
    #[must_use]
    pub fn into_targets(self) -> Vec<SourceLocation> {
        self.bad_only.into_iter().collect()
    }

    /// Number of distinct bad-only identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.bad_only.len()
    }

    /// Whether the runs aligned completely
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bad_only.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relapse_core::{LogEntry, ProcessId, ProcessLog, Timestamp};

    fn entry(ms: i64, file: &str, line: u32) -> LogEntry {
        LogEntry::new(Timestamp::from_millis(ms), "main", file, line)
    }

    fn run(per_process: Vec<Vec<LogEntry>>) -> RunLog {
        let mut run = RunLog::new();
        for (idx, entries) in per_process.into_iter().enumerate() {
            run = run.with_process(
                ProcessLog::new(ProcessId::from_raw(idx as u32)).with_entries(entries),
            );
        }
        run
    }

    #[test]
    fn test_union_reports_shared_identity_once() {
        let good = run(vec![
            vec![entry(0, "a.rs", 1)],
            vec![entry(0, "a.rs", 1)],
        ]);
        let bad = run(vec![
            vec![entry(0, "a.rs", 1), entry(1, "err.rs", 7)],
            vec![entry(0, "a.rs", 1), entry(1, "err.rs", 7)],
        ]);

        let diff = DistributedLogDiff::compute(&good, &bad).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(
            diff.into_targets(),
            vec![SourceLocation::new("err.rs", 7)]
        );
    }

    #[test]
    fn test_distinct_identities_accumulate() {
        let good = run(vec![vec![], vec![]]);
        let bad = run(vec![
            vec![entry(0, "a.rs", 1)],
            vec![entry(0, "b.rs", 2)],
        ]);

        let diff = DistributedLogDiff::compute(&good, &bad).unwrap();
        assert_eq!(
            diff.into_targets(),
            vec![
                SourceLocation::new("a.rs", 1),
                SourceLocation::new("b.rs", 2),
            ]
        );
    }

    #[test]
    fn test_process_count_mismatch_rejected() {
        let good = run(vec![vec![]]);
        let bad = run(vec![vec![], vec![]]);

        let err = DistributedLogDiff::compute(&good, &bad).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_identical_runs_clean() {
        let entries = vec![vec![entry(0, "a.rs", 1)], vec![entry(0, "b.rs", 2)]];
        let diff =
            DistributedLogDiff::compute(&run(entries.clone()), &run(entries)).unwrap();
        assert!(diff.is_empty());
    }
}
