//! Core error types for RELAPSE.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Parse error (log or descriptor artifact)
    ParseError {
        /// What failed to parse
        message: String,
    },

    /// I/O error reading or writing a trial artifact
    Io {
        /// Underlying error message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed validation
        field: String,
        /// Why it failed
        reason: String,
    },

    /// Not found
    NotFound {
        /// Kind of entity
        kind: String,
        /// Entity id
        id: String,
    },

    /// Run contains no log entries where one was required
    EmptyRun {
        /// Which run ("good" or "bad")
        run: String,
    },

    /// Remote transport failure
    Transport {
        /// Underlying error message
        message: String,
    },

    /// The fault raised at a granted call site; the control-flow abort that
    /// is the sole observable side effect of a grant
    FaultInjected {
        /// Fault class name
        fault: String,
    },

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
            Self::Io { message } => write!(f, "I/O error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::EmptyRun { run } => write!(f, "{} run has no log entries", run),
            Self::Transport { message } => write!(f, "Transport failure: {}", message),
            Self::FaultInjected { fault } => write!(f, "Injected fault: {}", fault),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
