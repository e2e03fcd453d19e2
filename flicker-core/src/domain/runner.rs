//! Runner domain model
//!
//! Identity, registration tokens and the controller state machine for the
//! single runner managed by an invocation.

use chrono::{DateTime, Utc};
use std::fmt;

use super::invocation::LifecycleEvent;

/// One-time registration token issued by the control plane
///
/// Deliberately not `Clone`: each token is moved into exactly one configure
/// or remove call, so attach and detach can never share a token.
pub struct RegistrationToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl RegistrationToken {
    /// Creates a token from its raw value
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Raw token value, for passing to the agent CLI only
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Expiry reported by the control plane, if any
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Name under which the runner registers with the control plane
///
/// Reconfiguring under the same name replaces the previous registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerIdentity(String);

impl RunnerIdentity {
    /// Derives the identity for an invocation
    ///
    /// `run` invocations get `<prefix><request_id>`; `create` invocations
    /// always use the sentinel name.
    pub fn for_invocation(
        event: LifecycleEvent,
        request_id: &str,
        prefix: &str,
        sentinel: &str,
    ) -> Self {
        match event {
            LifecycleEvent::Create => Self(sentinel.to_string()),
            LifecycleEvent::Run => Self(format!("{}{}", prefix, request_id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of the runner process controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No registration made by this invocation yet
    Unconfigured,

    /// Registered with the control plane, process not started
    Configured,

    /// Agent process launched
    Running,

    /// Removal attempted; terminal
    Decommissioned,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Unconfigured => write!(f, "Unconfigured"),
            RunnerState::Configured => write!(f, "Configured"),
            RunnerState::Running => write!(f, "Running"),
            RunnerState::Decommissioned => write!(f, "Decommissioned"),
        }
    }
}
