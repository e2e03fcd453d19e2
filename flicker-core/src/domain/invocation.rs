//! Invocation domain types
//!
//! An invocation is one request to provision, run and tear down exactly one
//! runner. Its payload is immutable for the lifetime of the invocation.

use serde::{Deserialize, Serialize};

use super::sensitive::Sensitive;

/// Kind of lifecycle requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// Register the long-lived sentinel runner and stop after configuration
    Create,

    /// Register, start and supervise a runner until signaled or out of time
    Run,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::Create => write!(f, "create"),
            LifecycleEvent::Run => write!(f, "run"),
        }
    }
}

/// Payload of a single runner invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Queue carrying completion signals
    pub queue_url: String,

    /// Repository the runner registers against (e.g., "https://github.com/org/repo")
    pub repo_url: String,

    /// Repository full name used by the control-plane API (e.g., "org/repo")
    #[serde(rename = "repo_fullname")]
    pub repo_full_name: String,

    /// Credential for the control-plane API
    pub token: Sensitive<String>,

    /// Correlation id matched against completion message bodies
    pub virtual_id: String,

    /// Requested lifecycle
    pub event: LifecycleEvent,
}

impl InvocationRequest {
    /// Returns true for the create-only sentinel lifecycle
    pub fn is_create(&self) -> bool {
        self.event == LifecycleEvent::Create
    }
}
