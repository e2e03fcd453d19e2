//! Process controller
//!
//! Drives the agent through `Unconfigured → Configured → Running →
//! Decommissioned`. Each transition consumes its own registration token.

use flicker_core::domain::runner::{RegistrationToken, RunnerState};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::agent::{AgentError, ConfigureArgs, RunnerAgent};
use super::diagnostics::{DiagnosticLog, read_diagnostic_logs};

/// Errors raised by controller transitions
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Runner configuration exited with {exit_code:?}: {output}\n{diagnostics}")]
    Configuration {
        exit_code: Option<i32>,
        output: String,
        /// Rendered agent diagnostics gathered after the failure
        diagnostics: String,
    },

    #[error("Runner removal exited with {exit_code:?}: {output}")]
    Removal {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Cannot {action} runner in state {state}")]
    InvalidState {
        action: &'static str,
        state: RunnerState,
    },

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// State machine around a single agent
pub struct ProcessController {
    agent: Arc<dyn RunnerAgent>,
    diag_dir: PathBuf,
    always_print_logs: bool,
    state: RunnerState,
}

impl ProcessController {
    /// # Arguments
    /// * `agent` - The agent entry points
    /// * `diag_dir` - The agent's diagnostics directory
    /// * `always_print_logs` - Dump diagnostics after successful configures too
    pub fn new(agent: Arc<dyn RunnerAgent>, diag_dir: PathBuf, always_print_logs: bool) -> Self {
        Self {
            agent,
            diag_dir,
            always_print_logs,
            state: RunnerState::Unconfigured,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// True if a registration left behind by an earlier invocation must be removed
    pub fn has_stale_registration(&self) -> bool {
        self.state == RunnerState::Unconfigured && self.agent.is_configured()
    }

    /// Removes a leftover local registration before configuring
    ///
    /// Having nothing to remove counts as success and the state stays
    /// `Unconfigured` either way.
    pub async fn clear_stale_registration(
        &mut self,
        token: RegistrationToken,
    ) -> Result<(), ControllerError> {
        if !self.has_stale_registration() {
            return Ok(());
        }

        info!("Removing runner in case one already exists");
        let output = self.agent.remove(token).await?;
        if !output.success() {
            return Err(ControllerError::Removal {
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }
        Ok(())
    }

    /// Registers the agent under `args.name`, replacing any previous holder
    pub async fn configure(
        &mut self,
        token: RegistrationToken,
        args: &ConfigureArgs,
    ) -> Result<(), ControllerError> {
        if self.state != RunnerState::Unconfigured {
            return Err(ControllerError::InvalidState {
                action: "configure",
                state: self.state,
            });
        }

        info!(
            "Configuring runner {} for {} (group: {})",
            args.name, args.repo_url, args.group
        );
        let output = self.agent.configure(args, token).await?;

        if !output.success() {
            warn!(
                "Runner configuration failed with {:?}: {}",
                output.exit_code,
                output.combined()
            );
            let logs = read_diagnostic_logs(&self.diag_dir).await;
            return Err(ControllerError::Configuration {
                exit_code: output.exit_code,
                output: output.combined(),
                diagnostics: DiagnosticLog::render(&logs),
            });
        }

        if self.always_print_logs {
            read_diagnostic_logs(&self.diag_dir).await;
        }

        self.state = RunnerState::Configured;
        info!("Runner {} configured", args.name);
        Ok(())
    }

    /// Launches the agent; its exit is never awaited
    pub fn start(&mut self) -> Result<(), ControllerError> {
        if self.state != RunnerState::Configured {
            return Err(ControllerError::InvalidState {
                action: "start",
                state: self.state,
            });
        }

        info!("Starting runner...");
        let pid = self.agent.start()?;
        self.state = RunnerState::Running;
        info!("Runner started (pid: {:?})", pid);
        Ok(())
    }

    /// Deregisters the agent with a freshly fetched token
    ///
    /// The controller is `Decommissioned` afterwards whatever the outcome;
    /// a second call is rejected.
    pub async fn decommission(&mut self, token: RegistrationToken) -> Result<(), ControllerError> {
        if self.state == RunnerState::Decommissioned {
            return Err(ControllerError::InvalidState {
                action: "decommission",
                state: self.state,
            });
        }

        info!("Removing runner...");
        self.state = RunnerState::Decommissioned;

        let output = self.agent.remove(token).await?;
        if !output.success() {
            warn!(
                "Unable to remove runner ({:?}): {}",
                output.exit_code,
                output.combined()
            );
            return Err(ControllerError::Removal {
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }

        info!("Runner removed");
        Ok(())
    }
}
