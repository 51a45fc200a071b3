//! Clock offset between two independently clocked runs.

use relapse_core::{CoreError, CoreResult, RunLog, TimeDelta, Timestamp};
use serde::{Deserialize, Serialize};

/// Scalar offset `bad_time - good_time` computed from the first entries of
/// the two runs, used to reproject good-run-relative timestamps onto the
/// bad run's clock.
///
/// In the distributed case the reference is the process whose good-run
/// first entry is latest - the latest-starting process is a stable anchor
/// across both runs - with the same process index read on the bad side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDifference {
    offset: TimeDelta,
}

impl TimeDifference {
    /// Create from a known offset
    #[must_use]
    pub const fn from_offset(offset: TimeDelta) -> Self {
        Self { offset }
    }

    /// Compute the offset between a good run and a bad run.
    ///
    /// # Errors
    ///
    /// Returns an error if either run has no log entries at the reference
    /// process.
    pub fn between(good: &RunLog, bad: &RunLog) -> CoreResult<Self> {
        let (reference, good_first) = good
            .processes
            .iter()
            .enumerate()
            .filter_map(|(idx, log)| log.first_timestamp().map(|t| (idx, t)))
            .max_by_key(|&(_, t)| t)
            .ok_or_else(|| CoreError::EmptyRun {
                run: "good".to_string(),
            })?;

        let bad_first = bad
            .processes
            .get(reference)
            .and_then(|log| log.first_timestamp())
            .ok_or_else(|| CoreError::EmptyRun {
                run: "bad".to_string(),
            })?;

        Ok(Self {
            offset: bad_first.delta_since(&good_first),
        })
    }

    /// The computed offset
    #[must_use]
    pub const fn offset(&self) -> TimeDelta {
        self.offset
    }

    /// Reproject a good-run timestamp onto the bad run's clock
    #[must_use]
    pub fn good_to_bad(&self, t: Timestamp) -> Timestamp {
        t + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relapse_core::{LogEntry, ProcessId, ProcessLog};

    fn run(first_timestamps: &[i64]) -> RunLog {
        let mut run = RunLog::new();
        for (idx, ms) in first_timestamps.iter().enumerate() {
            run = run.with_process(
                ProcessLog::new(ProcessId::from_raw(idx as u32)).with_entries(vec![
                    LogEntry::new(Timestamp::from_millis(*ms), "main", "a.rs", 1),
                ]),
            );
        }
        run
    }

    #[test]
    fn test_single_process_offset() {
        let diff = TimeDifference::between(&run(&[1_000]), &run(&[1_250])).unwrap();
        assert_eq!(diff.offset(), TimeDelta::from_millis(250));
        assert_eq!(
            diff.good_to_bad(Timestamp::from_millis(1_100)),
            Timestamp::from_millis(1_350)
        );
    }

    #[test]
    fn test_negative_offset() {
        let diff = TimeDifference::between(&run(&[2_000]), &run(&[1_400])).unwrap();
        assert!(diff.offset().is_negative());
        assert_eq!(
            diff.good_to_bad(Timestamp::from_millis(2_000)),
            Timestamp::from_millis(1_400)
        );
    }

    #[test]
    fn test_latest_starting_process_is_reference() {
        // Process 1 starts latest in the good run; its pair drives the offset.
        let good = run(&[100, 900, 500]);
        let bad = run(&[4_100, 1_000, 6_500]);

        let diff = TimeDifference::between(&good, &bad).unwrap();
        assert_eq!(diff.offset(), TimeDelta::from_millis(100));
    }

    #[test]
    fn test_empty_good_run_rejected() {
        let err = TimeDifference::between(&RunLog::new(), &run(&[1])).unwrap_err();
        assert_eq!(
            err,
            CoreError::EmptyRun {
                run: "good".to_string()
            }
        );
    }

    #[test]
    fn test_empty_bad_reference_rejected() {
        let good = run(&[100]);
        let bad = RunLog::new().with_process(ProcessLog::new(ProcessId::from_raw(0)));

        let err = TimeDifference::between(&good, &bad).unwrap_err();
        assert_eq!(
            err,
            CoreError::EmptyRun {
                run: "bad".to_string()
            }
        );
    }
}
