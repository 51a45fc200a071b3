//! Points in the merged chronology.

use relapse_core::{CallSiteId, Occurrence, ProcessId, Timestamp};
use serde::{Deserialize, Serialize};

/// What a chronology point represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingKind {
    /// A historical injection-request firing
    Injection {
        /// Process the request fired in
        process: ProcessId,
        /// Call site that was reached
        call_site: CallSiteId,
        /// Occurrence ordinal of the firing
        occurrence: Occurrence,
    },
    /// A bad-run entry matching a target identity
    Critical {
        /// Index of the target event it matches
        target_index: usize,
    },
    /// Any other bad-run entry; an untagged anchor
    Log,
}

/// One point in the merged chronology, ordered by timestamp with ties
/// broken by insertion order (stable sort)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Position on the bad run's clock
    pub at: Timestamp,
    /// What happened
    pub kind: TimingKind,
}

impl Timing {
    /// An injection firing
    #[must_use]
    pub fn injection(
        at: Timestamp,
        process: ProcessId,
        call_site: CallSiteId,
        occurrence: Occurrence,
    ) -> Self {
        Self {
            at,
            kind: TimingKind::Injection {
                process,
                call_site,
                occurrence,
            },
        }
    }

    /// A bad-run entry matching target `target_index`
    #[must_use]
    pub fn critical(at: Timestamp, target_index: usize) -> Self {
        Self {
            at,
            kind: TimingKind::Critical { target_index },
        }
    }

    /// An untagged bad-run entry
    #[must_use]
    pub fn log(at: Timestamp) -> Self {
        Self {
            at,
            kind: TimingKind::Log,
        }
    }

    /// Whether this point is an injection firing
    #[must_use]
    pub fn is_injection(&self) -> bool {
        matches!(self.kind, TimingKind::Injection { .. })
    }

    /// The target index if this point is critical
    #[must_use]
    pub fn target_index(&self) -> Option<usize> {
        match self.kind {
            TimingKind::Critical { target_index } => Some(target_index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let inj = Timing::injection(
            Timestamp::from_millis(5),
            ProcessId::from_raw(0),
            CallSiteId::from_raw(1),
            Occurrence::first(),
        );
        assert!(inj.is_injection());
        assert_eq!(inj.target_index(), None);

        let crit = Timing::critical(Timestamp::from_millis(6), 2);
        assert!(!crit.is_injection());
        assert_eq!(crit.target_index(), Some(2));

        let log = Timing::log(Timestamp::from_millis(7));
        assert!(!log.is_injection());
        assert_eq!(log.target_index(), None);
    }

    #[test]
    fn test_stable_sort_keeps_insertion_order_on_ties() {
        let t = Timestamp::from_millis(10);
        let mut chronology = vec![Timing::critical(t, 0), Timing::log(t), Timing::critical(t, 1)];
        chronology.sort_by_key(|timing| timing.at);

        assert_eq!(chronology[0].target_index(), Some(0));
        assert_eq!(chronology[2].target_index(), Some(1));
    }
}
