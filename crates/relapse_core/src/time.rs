//! Time types for RELAPSE.
//!
//! Log timestamps come from the wall clocks of independently started runs,
//! so differences between runs are signed: the bad run may have started
//! before or after the good run.

use serde::{Deserialize, Serialize};

/// Wall clock timestamp in milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create from milliseconds since the epoch
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get milliseconds since the epoch
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Get current timestamp (for artifact metadata only)
    #[allow(clippy::missing_panics_doc)]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards");
        Self(duration.as_millis() as i64)
    }

    /// Signed difference `self - earlier`
    #[must_use]
    pub const fn delta_since(&self, earlier: &Timestamp) -> TimeDelta {
        TimeDelta(self.0 - earlier.0)
    }

    /// Reproject by a signed offset
    #[must_use]
    pub const fn offset_by(&self, delta: TimeDelta) -> Self {
        Self(self.0 + delta.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl std::ops::Add<TimeDelta> for Timestamp {
    type Output = Timestamp;

    fn add(self, delta: TimeDelta) -> Timestamp {
        self.offset_by(delta)
    }
}

/// A signed offset between timestamps
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TimeDelta(i64);

impl TimeDelta {
    /// Zero offset
    pub const ZERO: TimeDelta = TimeDelta(0);

    /// Create from milliseconds
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Whether the offset is negative
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0 {
            write!(f, "+{}ms", self.0)
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}
