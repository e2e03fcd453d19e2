//! Service layer
//!
//! Services hold the runner's local logic: tracking the deadline, staging
//! the agent installation, driving the agent process and reading its
//! diagnostics.

mod agent;
mod controller;
mod deadline;
mod diagnostics;
mod installer;

// Re-export traits
pub use agent::RunnerAgent;

// Re-export implementations
pub use agent::{ConfigureArgs, ScriptAgent};
#[cfg(test)]
pub use agent::{AgentError, AgentOutput};
pub use controller::{ControllerError, ProcessController};
pub use deadline::DeadlineTracker;
pub use installer::AgentInstaller;
