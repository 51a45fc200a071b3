//! The per-process injection manager.

use crate::policy::InjectionPolicy;
use crate::store;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use relapse_core::{
    CallSiteId, CoreError, CoreResult, FaultKind, InjectionPointDescriptor, Occurrence, ProcessId,
    TrialId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

/// Static description of an instrumented call site, supplied by the
/// instrumentation pass on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteInfo {
    /// Call-site id
    pub id: CallSiteId,
    /// Enclosing class
    pub class_name: String,
    /// Enclosing method
    pub method_name: String,
    /// Call expression at the site
    pub invocation_name: String,
    /// Source line
    pub line: u32,
    /// Fault to raise on grant
    pub fault: FaultKind,
}

impl CallSiteInfo {
    /// Create a new call-site description
    #[must_use]
    pub fn new(
        id: CallSiteId,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        invocation_name: impl Into<String>,
        line: u32,
        fault: FaultKind,
    ) -> Self {
        Self {
            id,
            class_name: class_name.into(),
            method_name: method_name.into(),
            invocation_name: invocation_name.into(),
            line,
            fault,
        }
    }
}

/// Outcome of one injection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Fire: the call site raises this fault as a control-flow abort
    Grant(FaultKind),
    /// Continue normally
    Deny,
}

impl Decision {
    /// Whether the request was granted
    #[must_use]
    pub fn is_grant(&self) -> bool {
        matches!(self, Self::Grant(_))
    }

    /// The abort a granted call site raises; the sole observable side
    /// effect of a grant
    ///
    /// # Errors
    ///
    /// Always returns the injected fault when granted.
    pub fn raise(self) -> CoreResult<()> {
        match self {
            Self::Grant(fault) => Err(CoreError::FaultInjected {
                fault: fault.as_str().to_string(),
            }),
            Self::Deny => Ok(()),
        }
    }
}

/// Local decision logic guaranteeing zero or one grant per trial.
///
/// One explicit instance per process; in distributed mode the coordinator
/// holds the single shared instance for the whole trial. Occurrence
/// counters and the grant flag are atomics: worker threads of the system
/// under test hit `request` concurrently, and a coarse lock here would
/// serialize its hot path.
pub struct InjectionManager {
    trial: TrialId,
    policy: InjectionPolicy,
    rng: Mutex<ChaCha8Rng>,
    counters: RwLock<HashMap<(ProcessId, CallSiteId), Arc<AtomicU32>>>,
    granted: AtomicBool,
    finalized: AtomicBool,
    grant: Mutex<Option<InjectionPointDescriptor>>,
}

impl InjectionManager {
    /// Create a manager for one trial
    #[must_use]
    pub fn new(trial: TrialId, policy: InjectionPolicy, seed: u64) -> Self {
        Self {
            trial,
            policy,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            counters: RwLock::new(HashMap::new()),
            granted: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            grant: Mutex::new(None),
        }
    }

    /// Trial this manager belongs to
    #[must_use]
    pub fn trial(&self) -> TrialId {
        self.trial
    }

    /// Decide whether the fault fires at this request.
    ///
    /// The occurrence counter increments on every request, granted or not.
    /// A policy "yes" becomes a grant only if the trial-wide compare-and-
    /// swap wins; every later request in the trial is denied.
    pub fn request(&self, pid: ProcessId, site: &CallSiteInfo) -> Decision {
        let occurrence = self.next_occurrence(pid, site.id);
        self.decide_at(pid, occurrence, site)
    }

    /// Decide at a pre-counted occurrence.
    ///
    /// Distributed mode: each requesting process counts its own occurrences
    /// and forwards them with the remote call; the shared manager only
    /// arbitrates the grant.
    pub fn decide_at(
        &self,
        pid: ProcessId,
        occurrence: Occurrence,
        site: &CallSiteInfo,
    ) -> Decision {
        let wants_fire = {
            let mut rng = match self.rng.lock() {
                Ok(rng) => rng,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.policy.wants_fire(site.id, occurrence, &mut rng)
        };
        if !wants_fire {
            return Decision::Deny;
        }

        if self
            .granted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Decision::Deny;
        }

        self.record_grant(InjectionPointDescriptor::new(
            pid,
            site.id,
            occurrence,
            site.class_name.clone(),
            site.method_name.clone(),
            site.invocation_name.clone(),
            site.line,
            site.fault.clone(),
        ));
        info!(trial = %self.trial, pid = %pid, call_site = %site.id, occurrence = %occurrence, "fault granted");
        Decision::Grant(site.fault.clone())
    }

    /// Whether a grant has occurred this trial
    #[must_use]
    pub fn granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    /// The granted descriptor, if any
    #[must_use]
    pub fn grant_descriptor(&self) -> Option<InjectionPointDescriptor> {
        match self.grant.lock() {
            Ok(grant) => grant.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Current occurrence count for (process, call site)
    #[must_use]
    pub fn occurrence_count(&self, pid: ProcessId, call_site: CallSiteId) -> u32 {
        match self.counters.read() {
            Ok(counters) => counters
                .get(&(pid, call_site))
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0),
            Err(poisoned) => poisoned
                .into_inner()
                .get(&(pid, call_site))
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0),
        }
    }

    /// Serialize the granted descriptor (if any) to `dir`, exactly once.
    ///
    /// Safe to invoke from both the normal-completion path and a forced
    /// timeout path; only the first caller writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor file cannot be written.
    pub fn finalize(&self, dir: &Path) -> CoreResult<Option<PathBuf>> {
        if self
            .finalized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(None);
        }

        match self.grant_descriptor() {
            Some(descriptor) => {
                let path = store::write_descriptor(dir, self.trial, &descriptor)?;
                info!(trial = %self.trial, path = %path.display(), "trial descriptor written");
                Ok(Some(path))
            }
            None => {
                info!(trial = %self.trial, "trial ended with no grant");
                Ok(None)
            }
        }
    }

    fn next_occurrence(&self, pid: ProcessId, call_site: CallSiteId) -> Occurrence {
        let key = (pid, call_site);
        let counter = {
            let counters = match self.counters.read() {
                Ok(counters) => counters,
                Err(poisoned) => poisoned.into_inner(),
            };
            counters.get(&key).cloned()
        };
        let counter = match counter {
            Some(counter) => counter,
            None => {
                let mut counters = match self.counters.write() {
                    Ok(counters) => counters,
                    Err(poisoned) => poisoned.into_inner(),
                };
                counters.entry(key).or_default().clone()
            }
        };
        Occurrence::from_raw(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn record_grant(&self, descriptor: InjectionPointDescriptor) {
        let mut grant = match self.grant.lock() {
            Ok(grant) => grant,
            Err(poisoned) => poisoned.into_inner(),
        };
        assert!(
            grant.is_none(),
            "single-grant invariant violated: a second grant was recorded in trial {}",
            self.trial
        );
        *grant = Some(descriptor);
    }
}

impl std::fmt::Debug for InjectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionManager")
            .field("trial", &self.trial)
            .field("granted", &self.granted())
            .finish_non_exhaustive()
    }
}
