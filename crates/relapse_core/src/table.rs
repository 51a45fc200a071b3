//! Time-priority table: the output artifact of the attribution pass.
//!
//! Built once per timeline invocation, read-only afterward. Maps each
//! candidate call site to per-occurrence distances against every target
//! event, plus per-process boundary counts for caller-side normalization.

use crate::id::{CallSiteId, ProcessId};
use crate::record::Occurrence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel distance for a target event that never occurred in the bad
/// run; callers substitute the full bad-run length as penalty
pub const MISSING_TARGET: i64 = -1;

/// Distances of one (process, occurrence) of a call site against the
/// target events it can explain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceDistances {
    /// Process the occurrence happened in
    pub process: ProcessId,
    /// Occurrence ordinal
    pub occurrence: Occurrence,
    /// Minimum distance per target event index
    pub by_target: BTreeMap<usize, i64>,
}

impl OccurrenceDistances {
    /// Create an empty record for one occurrence
    #[must_use]
    pub fn new(process: ProcessId, occurrence: Occurrence) -> Self {
        Self {
            process,
            occurrence,
            by_target: BTreeMap::new(),
        }
    }

    /// Minimum real distance across targets; `None` when every target was
    /// missing from the bad run
    #[must_use]
    pub fn utility(&self) -> Option<i64> {
        self.by_target
            .values()
            .copied()
            .filter(|d| *d != MISSING_TARGET)
            .min()
    }
}

/// Output artifact of one timeline attribution pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePriorityTable {
    /// Per call site, the scored occurrences
    distances: BTreeMap<CallSiteId, Vec<OccurrenceDistances>>,
    /// Per process, per call site: how many times the site fired
    /// historically across both runs
    boundaries: BTreeMap<ProcessId, BTreeMap<CallSiteId, u32>>,
}

impl TimePriorityTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a distance for (call site, process, occurrence) against a
    /// target index, keeping the minimum seen. A real distance replaces
    /// the missing-target sentinel.
    pub fn record_distance(
        &mut self,
        call_site: CallSiteId,
        process: ProcessId,
        occurrence: Occurrence,
        target_index: usize,
        distance: i64,
    ) {
        let slots = self.distances.entry(call_site).or_default();
        let idx = match slots
            .iter()
            .position(|s| s.process == process && s.occurrence == occurrence)
        {
            Some(idx) => idx,
            None => {
                slots.push(OccurrenceDistances::new(process, occurrence));
                slots.len() - 1
            }
        };
        let slot = &mut slots[idx];

        slot.by_target
            .entry(target_index)
            .and_modify(|existing| {
                if *existing == MISSING_TARGET || (distance != MISSING_TARGET && distance < *existing)
                {
                    *existing = distance;
                }
            })
            .or_insert(distance);
    }

    /// Increment the boundary count for (process, call site)
    pub fn record_boundary(&mut self, process: ProcessId, call_site: CallSiteId) {
        *self
            .boundaries
            .entry(process)
            .or_default()
            .entry(call_site)
            .or_insert(0) += 1;
    }

    /// Scored occurrences of one call site
    #[must_use]
    pub fn occurrences(&self, call_site: CallSiteId) -> &[OccurrenceDistances] {
        self.distances
            .get(&call_site)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All scored call sites, in id order
    pub fn call_sites(&self) -> impl Iterator<Item = CallSiteId> + '_ {
        self.distances.keys().copied()
    }

    /// Minimum real distance of one occurrence across all targets
    #[must_use]
    pub fn utility(
        &self,
        call_site: CallSiteId,
        process: ProcessId,
        occurrence: Occurrence,
    ) -> Option<i64> {
        self.occurrences(call_site)
            .iter()
            .find(|s| s.process == process && s.occurrence == occurrence)
            .and_then(OccurrenceDistances::utility)
    }

    /// Boundary count for (process, call site)
    #[must_use]
    pub fn boundary_count(&self, process: ProcessId, call_site: CallSiteId) -> u32 {
        self.boundaries
            .get(&process)
            .and_then(|sites| sites.get(&call_site))
            .copied()
            .unwrap_or(0)
    }

    /// Whether the table holds no scored occurrences
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> (CallSiteId, ProcessId, Occurrence) {
        (
            CallSiteId::from_raw(5),
            ProcessId::from_raw(0),
            Occurrence::from_raw(1),
        )
    }

    #[test]
    fn test_record_keeps_minimum() {
        let (cs, p, occ) = key();
        let mut table = TimePriorityTable::new();
        table.record_distance(cs, p, occ, 0, 7);
        table.record_distance(cs, p, occ, 0, 3);
        table.record_distance(cs, p, occ, 0, 9);

        assert_eq!(table.utility(cs, p, occ), Some(3));
    }

    #[test]
    fn test_real_distance_replaces_sentinel() {
        let (cs, p, occ) = key();
        let mut table = TimePriorityTable::new();
        table.record_distance(cs, p, occ, 1, MISSING_TARGET);
        assert_eq!(table.utility(cs, p, occ), None);

        table.record_distance(cs, p, occ, 1, 12);
        assert_eq!(table.utility(cs, p, occ), Some(12));
    }

    #[test]
    fn test_utility_spans_targets() {
        let (cs, p, occ) = key();
        let mut table = TimePriorityTable::new();
        table.record_distance(cs, p, occ, 0, 8);
        table.record_distance(cs, p, occ, 1, MISSING_TARGET);
        table.record_distance(cs, p, occ, 2, 4);

        assert_eq!(table.utility(cs, p, occ), Some(4));
    }

    #[test]
    fn test_boundary_counts() {
        let (cs, p, _) = key();
        let mut table = TimePriorityTable::new();
        assert_eq!(table.boundary_count(p, cs), 0);

        table.record_boundary(p, cs);
        table.record_boundary(p, cs);
        assert_eq!(table.boundary_count(p, cs), 2);
    }

    #[test]
    fn test_occurrences_separate_by_process() {
        let cs = CallSiteId::from_raw(5);
        let occ = Occurrence::from_raw(1);
        let mut table = TimePriorityTable::new();
        table.record_distance(cs, ProcessId::from_raw(0), occ, 0, 2);
        table.record_distance(cs, ProcessId::from_raw(1), occ, 0, 6);

        assert_eq!(table.occurrences(cs).len(), 2);
        assert_eq!(table.utility(cs, ProcessId::from_raw(1), occ), Some(6));
    }
}
