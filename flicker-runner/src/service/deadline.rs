//! Deadline tracker
//!
//! Wraps the invocation's absolute deadline. All checks are pure
//! computations over a clock reading; the `_at` variants take the reading
//! explicitly.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Absolute point in time at which the host kills the invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineTracker {
    deadline: DateTime<Utc>,
}

impl DeadlineTracker {
    pub fn new(deadline: DateTime<Utc>) -> Self {
        Self { deadline }
    }

    /// Builds a tracker from a Unix timestamp in milliseconds
    pub fn from_epoch_millis(millis: u64) -> Option<Self> {
        let millis = i64::try_from(millis).ok()?;
        DateTime::from_timestamp_millis(millis).map(Self::new)
    }

    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        let delta = TimeDelta::from_std(timeout).unwrap_or_else(|_| TimeDelta::days(1));
        Self::new(Utc::now() + delta)
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Time left before forced termination, zero once passed
    pub fn time_remaining(&self) -> Duration {
        self.time_remaining_at(Utc::now())
    }

    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Time left before the safety margin begins, zero once inside it
    pub fn remaining_before(&self, margin: Duration) -> Duration {
        self.remaining_before_at(Utc::now(), margin)
    }

    pub fn remaining_before_at(&self, now: DateTime<Utc>, margin: Duration) -> Duration {
        self.time_remaining_at(now).saturating_sub(margin)
    }

    /// True once `now >= deadline - margin`
    pub fn is_expiring_soon(&self, margin: Duration) -> bool {
        self.is_expiring_soon_at(Utc::now(), margin)
    }

    pub fn is_expiring_soon_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.time_remaining_at(now) <= margin
    }
}
