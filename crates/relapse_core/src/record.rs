//! Injection descriptors and historical request records.
//!
//! A descriptor is created once per grant, serialized on trial exit, and
//! read back both as historical evidence and as an exclusion-set entry for
//! future trials. Its on-disk field names are part of the external
//! interface and must not change.

use crate::id::{CallSiteId, ProcessId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Ordinal count of times a call site has been reached within one trial,
/// per process. Starts at 1 and increments on every request regardless of
/// grant outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Occurrence(u32);

impl Occurrence {
    /// The first occurrence
    #[must_use]
    pub const fn first() -> Self {
        Self(1)
    }

    /// Create from raw value
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Occurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for Occurrence {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// The fault a granted call site raises, named by the class the
/// instrumentation pass registered for it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaultKind(String);

impl FaultKind {
    /// Create a new fault kind
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the fault class name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One attempted injection point, serialized at trial end.
///
/// Field names mirror the descriptor file format exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPointDescriptor {
    /// Process the grant happened in
    pub pid: ProcessId,
    /// Granted call site
    pub id: CallSiteId,
    /// Occurrence of the call site at grant time
    pub occurrence: Occurrence,
    /// Enclosing class of the call site
    #[serde(rename = "className")]
    pub class_name: String,
    /// Enclosing method of the call site
    #[serde(rename = "methodName")]
    pub method_name: String,
    /// Call expression at the site
    #[serde(rename = "invocationName")]
    pub invocation_name: String,
    /// Source line of the call site
    pub line: u32,
    /// Fault raised at the site
    #[serde(rename = "exceptionName")]
    pub exception_name: FaultKind,
}

impl InjectionPointDescriptor {
    /// Create a new descriptor
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        pid: ProcessId,
        id: CallSiteId,
        occurrence: Occurrence,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        invocation_name: impl Into<String>,
        line: u32,
        exception_name: FaultKind,
    ) -> Self {
        Self {
            pid,
            id,
            occurrence,
            class_name: class_name.into(),
            method_name: method_name.into(),
            invocation_name: invocation_name.into(),
            line,
            exception_name,
        }
    }

    /// Deduplication identity: (call site, occurrence), pid deliberately
    /// excluded to match the exclusion-set semantics of prior trials
    #[must_use]
    pub fn exclusion_key(&self) -> (CallSiteId, Occurrence) {
        (self.id, self.occurrence)
    }
}

/// A historical injection-request firing recorded in a prior run's log,
/// replayed into the attribution timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionRequestRecord {
    /// When the request fired
    pub timestamp: Timestamp,
    /// Thread that reached the call site
    pub thread: String,
    /// Call site that was reached
    pub call_site: CallSiteId,
    /// Line in the log file where the firing was recorded
    pub log_line: u32,
}

impl InjectionRequestRecord {
    /// Create a new record
    #[must_use]
    pub fn new(
        timestamp: Timestamp,
        thread: impl Into<String>,
        call_site: CallSiteId,
        log_line: u32,
    ) -> Self {
        Self {
            timestamp,
            thread: thread.into(),
            call_site,
            log_line,
        }
    }
}
