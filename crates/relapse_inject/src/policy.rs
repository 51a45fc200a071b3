//! Per-trial injection policies.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use relapse_core::{CallSiteId, Occurrence};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Policy deciding whether a request wants to fire, before the trial-wide
/// single-grant gate is consulted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InjectionPolicy {
    /// Fire on a uniform draw below `probability`
    Random {
        /// Grant probability per request; 1.0 grants the first request,
        /// 0.0 grants none
        probability: f64,
    },
    /// Fire at the first (call site, occurrence) not attempted by a
    /// previous trial
    Exhaustive {
        /// Keys already attempted, loaded from prior descriptor files
        exclusions: HashSet<(CallSiteId, Occurrence)>,
    },
}

impl InjectionPolicy {
    /// A random policy with the given per-request probability
    #[must_use]
    pub fn random(probability: f64) -> Self {
        Self::Random { probability }
    }

    /// An exhaustive policy over an exclusion set
    #[must_use]
    pub fn exhaustive(exclusions: HashSet<(CallSiteId, Occurrence)>) -> Self {
        Self::Exhaustive { exclusions }
    }

    /// Whether the policy wants to fire for this request. One uniform draw
    /// is consumed per request under the random policy.
    #[must_use]
    pub fn wants_fire(
        &self,
        call_site: CallSiteId,
        occurrence: Occurrence,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        match self {
            Self::Random { probability } => rng.gen::<f64>() < *probability,
            Self::Exhaustive { exclusions } => !exclusions.contains(&(call_site, occurrence)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_random_certainty_bounds() {
        let always = InjectionPolicy::random(1.0);
        let never = InjectionPolicy::random(0.0);
        let mut rng = rng();

        for occ in 1..=100u32 {
            let key = (CallSiteId::from_raw(1), Occurrence::from_raw(occ));
            assert!(always.wants_fire(key.0, key.1, &mut rng));
            assert!(!never.wants_fire(key.0, key.1, &mut rng));
        }
    }

    #[test]
    fn test_random_is_reproducible() {
        let policy = InjectionPolicy::random(0.5);
        let draw = |seed: u64| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..32)
                .map(|i| {
                    policy.wants_fire(
                        CallSiteId::from_raw(1),
                        Occurrence::from_raw(i + 1),
                        &mut rng,
                    )
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(draw(7), draw(7));
    }

    #[test]
    fn test_exhaustive_skips_excluded_keys() {
        let mut exclusions = HashSet::new();
        exclusions.insert((CallSiteId::from_raw(5), Occurrence::from_raw(2)));
        let policy = InjectionPolicy::exhaustive(exclusions);
        let mut rng = rng();

        assert!(!policy.wants_fire(
            CallSiteId::from_raw(5),
            Occurrence::from_raw(2),
            &mut rng
        ));
        assert!(policy.wants_fire(
            CallSiteId::from_raw(5),
            Occurrence::from_raw(3),
            &mut rng
        ));
        assert!(policy.wants_fire(
            CallSiteId::from_raw(6),
            Occurrence::from_raw(2),
            &mut rng
        ));
    }
}
