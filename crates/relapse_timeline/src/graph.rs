//! Reachability seam to the external priority graph.

use relapse_core::CallSiteId;

/// Black-box reachability relation derived from static analysis.
///
/// For a target event index, reports every call site that is a plausible
/// cause within `depth` hops, with an associated weight. The graph itself
/// is built by the out-of-scope instrumentation pass; this core only
/// consumes it.
pub trait PriorityGraph {
    /// Feed every call site reachable from target event `event_index`
    /// within `depth` hops into `sink`, with its weight.
    fn calculate_priorities(
        &self,
        event_index: usize,
        depth: u32,
        sink: &mut dyn FnMut(CallSiteId, f64),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair(usize, Vec<(CallSiteId, f64)>);

    impl PriorityGraph for Pair {
        fn calculate_priorities(
            &self,
            event_index: usize,
            _depth: u32,
            sink: &mut dyn FnMut(CallSiteId, f64),
        ) {
            if event_index == self.0 {
                for (site, weight) in &self.1 {
                    sink(*site, *weight);
                }
            }
        }
    }

    #[test]
    fn test_sink_collects_reachable_sites() {
        let graph = Pair(0, vec![(CallSiteId::from_raw(3), 0.5)]);

        let mut seen = Vec::new();
        graph.calculate_priorities(0, 4, &mut |site, weight| seen.push((site, weight)));
        assert_eq!(seen, vec![(CallSiteId::from_raw(3), 0.5)]);

        seen.clear();
        graph.calculate_priorities(1, 4, &mut |site, weight| seen.push((site, weight)));
        assert!(seen.is_empty());
    }
}
