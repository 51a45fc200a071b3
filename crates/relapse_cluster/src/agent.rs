//! Instrumentation-facing entry point.
//!
//! Instrumented code calls [`InjectionAgent::request_injection`] at every
//! candidate statement about to execute. The decision seam behind it is
//! either the local in-process manager (single-process mode) or the remote
//! coordinator (distributed mode).

use crate::client::CoordinatorClient;
use async_trait::async_trait;
use relapse_core::{CallSiteId, CoreError, CoreResult, Occurrence, ProcessId};
use relapse_inject::{CallSiteInfo, InjectionManager};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::warn;

/// Decision seam behind the agent: exactly two operations
#[async_trait]
pub trait InjectionDecision: Send + Sync {
    /// Whether the fault fires at this call-site occurrence
    async fn inject(&self, site: &CallSiteInfo) -> bool;

    /// End the trial: finalize the descriptor artifact
    async fn shutdown(&self);
}

/// Per-process occurrence counters, incremented on every request
/// regardless of the decision outcome.
///
/// Lock-free on the hot path: the read lock is only contended against
/// first-visit insertion of a new call site.
#[derive(Debug, Default)]
pub struct OccurrenceLedger {
    counters: RwLock<HashMap<CallSiteId, Arc<AtomicU32>>>,
}

impl OccurrenceLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count this visit and return its occurrence, starting at 1
    pub fn next(&self, call_site: CallSiteId) -> Occurrence {
        let counter = {
            let counters = match self.counters.read() {
                Ok(counters) => counters,
                Err(poisoned) => poisoned.into_inner(),
            };
            counters.get(&call_site).cloned()
        };
        let counter = match counter {
            Some(counter) => counter,
            None => {
                let mut counters = match self.counters.write() {
                    Ok(counters) => counters,
                    Err(poisoned) => poisoned.into_inner(),
                };
                counters.entry(call_site).or_default().clone()
            }
        };
        Occurrence::from_raw(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Current count for a call site
    #[must_use]
    pub fn count(&self, call_site: CallSiteId) -> u32 {
        let counters = match self.counters.read() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters
            .get(&call_site)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

/// Single-process mode: the manager lives in this process
pub struct LocalDecision {
    pid: ProcessId,
    manager: Arc<InjectionManager>,
    trials_dir: PathBuf,
}

impl LocalDecision {
    /// Create a local decision seam
    #[must_use]
    pub fn new(pid: ProcessId, manager: Arc<InjectionManager>, trials_dir: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            manager,
            trials_dir: trials_dir.into(),
        }
    }
}

#[async_trait]
impl InjectionDecision for LocalDecision {
    async fn inject(&self, site: &CallSiteInfo) -> bool {
        self.manager.request(self.pid, site).is_grant()
    }

    async fn shutdown(&self) {
        if let Err(err) = self.manager.finalize(&self.trials_dir) {
            warn!(%err, "finalize failed");
        }
    }
}

/// Distributed mode: decisions are forwarded to the coordinator; this
/// process counts its own occurrences and sends them with each call
pub struct RemoteDecision {
    pid: ProcessId,
    ledger: OccurrenceLedger,
    client: Mutex<CoordinatorClient>,
}

impl RemoteDecision {
    /// Wrap an already connected client
    #[must_use]
    pub fn new(pid: ProcessId, client: CoordinatorClient) -> Self {
        Self {
            pid,
            ledger: OccurrenceLedger::new(),
            client: Mutex::new(client),
        }
    }
}

#[async_trait]
impl InjectionDecision for RemoteDecision {
    async fn inject(&self, site: &CallSiteInfo) -> bool {
        let occurrence = self.ledger.next(site.id);
        self.client
            .lock()
            .await
            .inject(self.pid, occurrence, site)
            .await
    }

    async fn shutdown(&self) {
        self.client.lock().await.shutdown().await;
    }
}

/// The entry point instrumented code calls on its hot path
pub struct InjectionAgent {
    decision: Box<dyn InjectionDecision>,
}

impl InjectionAgent {
    /// Create an agent over any decision seam
    #[must_use]
    pub fn new(decision: Box<dyn InjectionDecision>) -> Self {
        Self { decision }
    }

    /// Single-process agent backed by a local manager
    #[must_use]
    pub fn local(
        pid: ProcessId,
        manager: Arc<InjectionManager>,
        trials_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(Box::new(LocalDecision::new(pid, manager, trials_dir)))
    }

    /// Distributed agent backed by a connected coordinator client
    #[must_use]
    pub fn remote(pid: ProcessId, client: CoordinatorClient) -> Self {
        Self::new(Box::new(RemoteDecision::new(pid, client)))
    }

    /// Ask whether the fault fires here; on grant, returns the fault as a
    /// control-flow abort for the call site to raise.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FaultInjected`] when the request is granted.
    pub async fn request_injection(&self, site: &CallSiteInfo) -> CoreResult<()> {
        if self.decision.inject(site).await {
            return Err(CoreError::FaultInjected {
                fault: site.fault.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// End the trial: finalize the descriptor artifact exactly once
    pub async fn shutdown(&self) {
        self.decision.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use relapse_core::{FaultKind, TrialId};
    use relapse_inject::InjectionPolicy;

    fn site(id: u32) -> CallSiteInfo {
        CallSiteInfo::new(
            CallSiteId::from_raw(id),
            "org.example.Client",
            "send",
            "socket.write(frame)",
            88,
            FaultKind::new("java.net.SocketException"),
        )
    }

    #[test]
    fn test_ledger_counts_every_visit() {
        let ledger = OccurrenceLedger::new();
        let cs = CallSiteId::from_raw(1);

        assert_eq!(ledger.next(cs), Occurrence::from_raw(1));
        assert_eq!(ledger.next(cs), Occurrence::from_raw(2));
        assert_eq!(ledger.next(CallSiteId::from_raw(2)), Occurrence::from_raw(1));
        assert_eq!(ledger.count(cs), 2);
    }

    #[tokio::test]
    async fn test_local_agent_aborts_on_grant() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(InjectionManager::new(
            TrialId::new(),
            InjectionPolicy::random(1.0),
            1,
        ));
        let agent = InjectionAgent::local(ProcessId::from_raw(0), manager, dir.path());

        let err = agent.request_injection(&site(1)).await.unwrap_err();
        assert_eq!(
            err,
            CoreError::FaultInjected {
                fault: "java.net.SocketException".to_string()
            }
        );

        // The grant is spent; later sites continue normally.
        assert!(agent.request_injection(&site(2)).await.is_ok());

        agent.shutdown().await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_remote_agent_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(InjectionManager::new(
            TrialId::new(),
            InjectionPolicy::random(1.0),
            1,
        ));
        let coordinator = Coordinator::bind(
            CoordinatorConfig::new("127.0.0.1:0", dir.path()),
            Arc::clone(&manager),
        )
        .await
        .unwrap();
        let addr = coordinator.local_addr().unwrap();
        tokio::spawn(coordinator.run());

        let mut client = CoordinatorClient::new(addr.to_string());
        client.connect().await.unwrap();
        let agent = InjectionAgent::remote(ProcessId::from_raw(3), client);

        assert!(agent.request_injection(&site(1)).await.is_err());
        assert!(agent.request_injection(&site(1)).await.is_ok());
        assert!(manager.granted());

        let descriptor = manager.grant_descriptor().unwrap();
        assert_eq!(descriptor.pid, ProcessId::from_raw(3));
        assert_eq!(descriptor.occurrence, Occurrence::from_raw(1));
    }

    #[tokio::test]
    async fn test_remote_agent_denies_when_coordinator_gone() {
        // Client was never connected; every decision degrades to deny and
        // the system under test keeps running.
        let client = CoordinatorClient::new("127.0.0.1:1");
        let agent = InjectionAgent::remote(ProcessId::from_raw(0), client);

        for _ in 0..4 {
            assert!(agent.request_injection(&site(1)).await.is_ok());
        }
    }
}
