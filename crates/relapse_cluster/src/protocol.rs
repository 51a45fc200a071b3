//! Wire protocol between instrumented processes and the coordinator.
//!
//! Exactly two operations, one newline-delimited JSON message per line.

use relapse_core::{Occurrence, ProcessId};
use relapse_inject::CallSiteInfo;
use serde::{Deserialize, Serialize};

/// Request sent by an instrumented process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Ask whether the fault fires at this call-site occurrence
    Inject {
        /// Requesting process
        pid: ProcessId,
        /// Occurrence counted by the requesting process
        occurrence: Occurrence,
        /// Call-site description
        site: CallSiteInfo,
    },
    /// End the trial: finalize the shared manager and stop the coordinator
    Shutdown,
}

/// Response from the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    /// Decision for an inject request
    Decision {
        /// Whether the grant was won
        grant: bool,
    },
    /// Acknowledgement of shutdown
    Shutdown,
}
