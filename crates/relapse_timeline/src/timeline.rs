//! Merged chronology and attribution scoring.

use crate::graph::PriorityGraph;
use crate::offset::TimeDifference;
use crate::timing::{Timing, TimingKind};
use relapse_core::{
    CallSiteId, CoreResult, Occurrence, RunLog, SourceLocation, TimePriorityTable, MISSING_TARGET,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Tunables of the attribution pass.
///
/// The backward penalty and the forward tie-break are empirical constants
/// carried over from observed behavior, not derived values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Reachability depth handed to the priority graph
    pub depth: u32,
    /// Multiplier applied to backward distances; explaining an event via a
    /// fault injected after it is penalized
    pub backward_penalty: i64,
}

impl TimelineConfig {
    /// Create a config with default tunables
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: 10,
            backward_penalty: 3,
        }
    }

    /// Set the reachability depth
    #[must_use]
    pub const fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set the backward penalty
    #[must_use]
    pub const fn with_backward_penalty(mut self, penalty: i64) -> Self {
        self.backward_penalty = penalty;
        self
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The merged chronology of one trial, ready for attribution.
///
/// Good-run injection records are reprojected onto the bad run's clock;
/// bad-run records are already on it. Bad-run entries matching a target
/// identity become critical points, all others become plain anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    config: TimelineConfig,
    chronology: Vec<Timing>,
    target_count: usize,
}

impl Timeline {
    /// Build the chronology for one trial.
    ///
    /// `targets` is the ordered divergence list from the distributed diff;
    /// its indices are the target event indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock offset cannot be computed.
    pub fn build(
        targets: &[SourceLocation],
        good: &RunLog,
        bad: &RunLog,
        config: TimelineConfig,
    ) -> CoreResult<Self> {
        let offset = TimeDifference::between(good, bad)?;

        let mut chronology = Vec::new();
        for log in &good.processes {
            let mut counters: HashMap<CallSiteId, u32> = HashMap::new();
            for record in &log.injections {
                let count = counters.entry(record.call_site).or_insert(0);
                *count += 1;
                chronology.push(Timing::injection(
                    offset.good_to_bad(record.timestamp),
                    log.process,
                    record.call_site,
                    Occurrence::from_raw(*count),
                ));
            }
        }
        for log in &bad.processes {
            let mut counters: HashMap<CallSiteId, u32> = HashMap::new();
            for record in &log.injections {
                let count = counters.entry(record.call_site).or_insert(0);
                *count += 1;
                chronology.push(Timing::injection(
                    record.timestamp,
                    log.process,
                    record.call_site,
                    Occurrence::from_raw(*count),
                ));
            }
        }
        for log in &bad.processes {
            for entry in &log.entries {
                let identity = entry.identity();
                match targets.iter().position(|t| *t == identity) {
                    Some(index) => chronology.push(Timing::critical(entry.timestamp, index)),
                    None => chronology.push(Timing::log(entry.timestamp)),
                }
            }
        }

        // Stable by construction: ties keep insertion order.
        chronology.sort_by_key(|timing| timing.at);
        debug!(points = chronology.len(), targets = targets.len(), "chronology built");

        Ok(Self {
            config,
            chronology,
            target_count: targets.len(),
        })
    }

    /// The merged chronology, sorted
    #[must_use]
    pub fn chronology(&self) -> &[Timing] {
        &self.chronology
    }

    /// Number of target events
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Indices of target events that never occurred in the bad run - the
    /// location-feedback list for trials that did not reproduce every
    /// symptom
    #[must_use]
    pub fn missing_targets(&self) -> Vec<usize> {
        let positions = self.critical_positions();
        (0..self.target_count)
            .filter(|&index| positions[index].is_empty())
            .collect()
    }

    /// Score every injection occurrence against every target event it can
    /// causally reach and emit the time-priority table.
    ///
    /// A target with no occurrence in the bad run yields the missing-target
    /// sentinel - expected for trials that failed to reproduce the symptom.
    /// A call site reachable for no target is skipped with a warning.
    #[must_use]
    pub fn attribute(&self, graph: &dyn PriorityGraph) -> TimePriorityTable {
        let reachable = self.reachable_sites(graph);
        let critical_positions = self.critical_positions();
        let prefix = self.anchor_prefix();

        let mut table = TimePriorityTable::new();
        for (position, timing) in self.chronology.iter().enumerate() {
            let TimingKind::Injection {
                process,
                call_site,
                occurrence,
            } = timing.kind
            else {
                continue;
            };

            table.record_boundary(process, call_site);

            let mut reached_any = false;
            for (index, sites) in reachable.iter().enumerate() {
                let Some(weight) = sites.get(&call_site).copied() else {
                    continue;
                };
                reached_any = true;

                let distance = self.occurrence_distance(
                    position,
                    &critical_positions[index],
                    &prefix,
                );
                if distance == MISSING_TARGET {
                    debug!(
                        call_site = %call_site,
                        target = index,
                        "target event absent from bad run; emitting sentinel"
                    );
                } else {
                    debug!(
                        call_site = %call_site,
                        occurrence = %occurrence,
                        target = index,
                        weight,
                        distance,
                        "scored occurrence"
                    );
                }
                table.record_distance(call_site, process, occurrence, index, distance);
            }

            if !reached_any {
                warn!(
                    call_site = %call_site,
                    process = %process,
                    "call site reaches no critical event; skipping"
                );
            }
        }

        table
    }

    /// Distance from the injection at `position` to its nearest bounding
    /// critical occurrences. Forward wins ties; the backward side carries
    /// the configured penalty.
    fn occurrence_distance(&self, position: usize, criticals: &[usize], prefix: &[usize]) -> i64 {
        let split = criticals.partition_point(|&p| p < position);
        let next = criticals[split..].first().copied();
        let prev = if split > 0 {
            Some(criticals[split - 1])
        } else {
            None
        };

        let forward = next.map(|n| (prefix[n] - prefix[position + 1]) as i64);
        let backward =
            prev.map(|p| (prefix[position] - prefix[p + 1]) as i64 * self.config.backward_penalty);

        match (forward, backward) {
            (Some(f), Some(b)) => {
                if f <= b {
                    f
                } else {
                    b
                }
            }
            (Some(f), None) => f,
            (None, Some(b)) => b,
            (None, None) => MISSING_TARGET,
        }
    }

    /// Reachable call sites with weights, per target index
    fn reachable_sites(&self, graph: &dyn PriorityGraph) -> Vec<HashMap<CallSiteId, f64>> {
        (0..self.target_count)
            .map(|index| {
                let mut sites = HashMap::new();
                graph.calculate_priorities(index, self.config.depth, &mut |site, weight| {
                    sites.insert(site, weight);
                });
                sites
            })
            .collect()
    }

    /// Sorted chronology positions of the critical points, per target index
    fn critical_positions(&self) -> Vec<Vec<usize>> {
        let mut positions = vec![Vec::new(); self.target_count];
        for (position, timing) in self.chronology.iter().enumerate() {
            if let Some(index) = timing.target_index() {
                positions[index].push(position);
            }
        }
        positions
    }

    /// `prefix[j]` = count of non-injection points among `chronology[0..j]`;
    /// the qualifying-event counter behind both distance directions
    fn anchor_prefix(&self) -> Vec<usize> {
        let mut prefix = Vec::with_capacity(self.chronology.len() + 1);
        prefix.push(0);
        for timing in &self.chronology {
            let last = *prefix.last().unwrap_or(&0);
            prefix.push(last + usize::from(!timing.is_injection()));
        }
        prefix
    }
}
