//! RELAPSE Distributed Injection Coordination
//!
//! Wraps the injection manager behind a remote decision call so that many
//! instrumented processes share one global grant. The coordinator process
//! holds the single shared manager and is the sole point of truth; there
//! is no distributed race in which two processes both believe they won.
//!
//! Remote decision calls are synchronous with no application-level retry
//! or timeout: an unreachable coordinator maps to "deny", since retrying
//! risks granting twice.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod client;
pub mod coordinator;
pub mod protocol;

pub use agent::{InjectionAgent, InjectionDecision, LocalDecision, OccurrenceLedger, RemoteDecision};
pub use client::{ClientState, CoordinatorClient, TransportError};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use protocol::{Request, Response};
