//! Completion signal types
//!
//! A runner is stopped by a queue message whose body equals the invocation's
//! virtual id, or by running out of time.

use chrono::{DateTime, Utc};
use std::fmt;

/// A message received from the completion queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub body: String,
    /// Handle required to acknowledge (delete) the message
    pub receipt_handle: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueueMessage {
    /// Returns true if this message is the completion signal for `virtual_id`
    ///
    /// Comparison is exact; anything else belongs to another invocation.
    pub fn is_signal_for(&self, virtual_id: &str) -> bool {
        self.body == virtual_id
    }
}

/// Why the completion poll loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// The matching completion message was received
    Signaled,

    /// The deadline safety margin was reached first
    TimedOut,
}

impl fmt::Display for PollExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollExit::Signaled => write!(f, "signaled"),
            PollExit::TimedOut => write!(f, "timed-out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: &str) -> QueueMessage {
        QueueMessage {
            message_id: None,
            body: body.to_string(),
            receipt_handle: Some("rh".to_string()),
            sent_at: None,
        }
    }

    #[test]
    fn test_signal_requires_exact_match() {
        assert!(message("abc123").is_signal_for("abc123"));
        assert!(!message("abc1234").is_signal_for("abc123"));
        assert!(!message(" abc123").is_signal_for("abc123"));
        assert!(!message("ABC123").is_signal_for("abc123"));
    }
}
