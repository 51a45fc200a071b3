//! Generic longest-common-subsequence alignment.

use serde::{Deserialize, Serialize};

/// Result of aligning a good sequence against a bad sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDiff<T> {
    /// Bad-run elements with no counterpart in the good run, in original order
    pub bad_only: Vec<T>,
    /// Number of matched pairs
    pub common: usize,
    /// Matched (good index, bad index) pairs, in original order
    pub matches: Vec<(usize, usize)>,
}

impl<T> SequenceDiff<T> {
    /// Whether the bad sequence aligned completely
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.bad_only.is_empty()
    }
}

/// Engine computing an optimal LCS alignment between two ordered sequences
pub struct SequenceDiffEngine;

impl SequenceDiffEngine {
    /// Create a new diff engine (unit struct)
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Align `good` against `bad` with O(|good|·|bad|) dynamic programming.
    ///
    /// Multiple optimal alignments can exist; reconstruction is made
    /// deterministic by a fixed precedence at equal scores: a common match
    /// wins over a bad-only step, and a bad-only step wins over a good-only
    /// step.
    #[must_use]
    pub fn diff<T: PartialEq + Clone>(&self, good: &[T], bad: &[T]) -> SequenceDiff<T> {
        let n = good.len();
        let m = bad.len();

        // score[i][j] = LCS length of good[i..] vs bad[j..]
        let mut score = vec![vec![0u32; m + 1]; n + 1];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                score[i][j] = if good[i] == bad[j] {
                    score[i + 1][j + 1] + 1
                } else {
                    score[i + 1][j].max(score[i][j + 1])
                };
            }
        }

        let mut matches = Vec::new();
        let mut bad_only = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < n && j < m {
            if good[i] == bad[j] && score[i][j] == score[i + 1][j + 1] + 1 {
                matches.push((i, j));
                i += 1;
                j += 1;
            } else if score[i][j] == score[i][j + 1] {
                bad_only.push(bad[j].clone());
                j += 1;
            } else {
                i += 1;
            }
        }
        while j < m {
            bad_only.push(bad[j].clone());
            j += 1;
        }

        SequenceDiff {
            common: matches.len(),
            bad_only,
            matches,
        }
    }
}

impl Default for SequenceDiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_sequences() {
        let engine = SequenceDiffEngine::new();
        let seq = vec![10, 20, 30, 40];
        let diff = engine.diff(&seq, &seq);

        assert!(diff.is_clean());
        assert_eq!(diff.common, 4);
        assert_eq!(diff.matches, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_single_insertion() {
        let engine = SequenceDiffEngine::new();
        let diff = engine.diff(&[1, 2, 3], &[1, 4, 2, 3]);

        assert_eq!(diff.bad_only, vec![4]);
        assert_eq!(diff.common, 3);
        assert_eq!(diff.matches, vec![(0, 0), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_empty_good() {
        let engine = SequenceDiffEngine::new();
        let diff = engine.diff(&[], &[1, 2]);

        assert_eq!(diff.bad_only, vec![1, 2]);
        assert_eq!(diff.common, 0);
        assert!(diff.matches.is_empty());
    }

    #[test]
    fn test_empty_bad() {
        let engine = SequenceDiffEngine::new();
        let diff = engine.diff(&[1, 2], &[]);

        assert!(diff.is_clean());
        assert_eq!(diff.common, 0);
    }

    #[test]
    fn test_disjoint_sequences() {
        let engine = SequenceDiffEngine::new();
        let diff = engine.diff(&[1, 2], &[3, 4]);

        assert_eq!(diff.bad_only, vec![3, 4]);
        assert_eq!(diff.common, 0);
    }

    #[test]
    fn test_tie_break_prefers_earliest_common() {
        // Both alignments of [1,1] vs [1] are optimal; the common-first
        // precedence pins the match to bad index 0.
        let engine = SequenceDiffEngine::new();
        let diff = engine.diff(&[1], &[1, 1]);

        assert_eq!(diff.matches, vec![(0, 0)]);
        assert_eq!(diff.bad_only, vec![1]);
    }

    #[test]
    fn test_repeated_elements() {
        let engine = SequenceDiffEngine::new();
        let diff = engine.diff(&[1, 2, 1, 2], &[2, 1, 2, 1]);

        // LCS length is 3; reconstruction is pinned by the precedence.
        assert_eq!(diff.common, 3);
        assert_eq!(diff.bad_only.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_self_diff_is_clean(seq in proptest::collection::vec(0u8..8, 0..32)) {
            let engine = SequenceDiffEngine::new();
            let diff = engine.diff(&seq, &seq);
            prop_assert!(diff.is_clean());
            prop_assert_eq!(diff.common, seq.len());
        }

        #[test]
        fn prop_counts_are_consistent(
            good in proptest::collection::vec(0u8..6, 0..24),
            bad in proptest::collection::vec(0u8..6, 0..24),
        ) {
            let engine = SequenceDiffEngine::new();
            let diff = engine.diff(&good, &bad);
            prop_assert_eq!(diff.common + diff.bad_only.len(), bad.len());
            prop_assert!(diff.common <= good.len());
        }

        #[test]
        fn prop_matches_are_strictly_increasing(
            good in proptest::collection::vec(0u8..6, 0..24),
            bad in proptest::collection::vec(0u8..6, 0..24),
        ) {
            let engine = SequenceDiffEngine::new();
            let diff = engine.diff(&good, &bad);
            for pair in diff.matches.windows(2) {
                prop_assert!(pair[0].0 < pair[1].0);
                prop_assert!(pair[0].1 < pair[1].1);
            }
            for (gi, bi) in &diff.matches {
                prop_assert_eq!(good[*gi], bad[*bi]);
            }
        }
    }
}
