//! Runner lifecycle
//!
//! Sequences one invocation: token, staging, configure, start, wait for the
//! completion signal, decommission. Decommissioning after the poll loop is
//! attempted exactly once and always with its own token.

use flicker_client::ClientError;
use flicker_core::domain::invocation::InvocationRequest;
use flicker_core::domain::runner::RunnerIdentity;
use flicker_core::domain::signal::PollExit;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::repository::{CompletionQueue, TokenRepository};
use crate::scheduler::{CompletionPoller, PollSettings};
use crate::service::{
    AgentInstaller, ConfigureArgs, ControllerError, DeadlineTracker, ProcessController,
    RunnerAgent,
};

/// Unrecoverable lifecycle failures
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Unable to get runner registration token: {0}")]
    Registration(#[source] ClientError),

    #[error("Unable to copy runner: {0:#}")]
    Staging(anyhow::Error),

    #[error("Unable to configure runner: {0}")]
    Configuration(#[source] ControllerError),

    #[error("Unable to start runner: {0}")]
    Start(#[source] ControllerError),

    #[error("Unable to get token to remove runner: {0}")]
    TokenForRemoval(#[source] ClientError),

    #[error("Unable to remove runner: {0}")]
    Decommission(#[source] ControllerError),

    #[error("Runner lifecycle panicked: {0}")]
    Panicked(String),
}

impl LifecycleError {
    /// Short status line reported to the caller
    pub fn status(&self) -> &'static str {
        match self {
            LifecycleError::Registration(_) => "Unable to get runner registration token",
            LifecycleError::Staging(_) => "Unable to copy runner",
            LifecycleError::Configuration(_) => "Unable to configure runner",
            LifecycleError::Start(_) => "Unable to start runner",
            LifecycleError::TokenForRemoval(_) | LifecycleError::Decommission(_) => {
                "Unable to remove runner"
            }
            LifecycleError::Panicked(_) => "Runner lifecycle failed unexpectedly",
        }
    }
}

/// Successful end of a lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Sentinel runner registered; nothing started
    Created,

    /// Runner ran and was decommissioned
    Completed(PollExit),
}

impl LifecycleOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            LifecycleOutcome::Created => "Runner created",
            LifecycleOutcome::Completed(_) => "Complete!",
        }
    }
}

/// Runs invocations against shared collaborators
pub struct Lifecycle {
    config: Config,
    tokens: Arc<dyn TokenRepository>,
    queue: Arc<dyn CompletionQueue>,
    agent: Arc<dyn RunnerAgent>,
}

impl Lifecycle {
    pub fn new(
        config: Config,
        tokens: Arc<dyn TokenRepository>,
        queue: Arc<dyn CompletionQueue>,
        agent: Arc<dyn RunnerAgent>,
    ) -> Self {
        Self {
            config,
            tokens,
            queue,
            agent,
        }
    }

    /// Runs one complete lifecycle for `request`
    ///
    /// # Arguments
    /// * `request` - The invocation payload
    /// * `deadline` - When the host will kill the invocation
    /// * `request_id` - Host request id, used to name the runner
    pub async fn run(
        &self,
        request: &InvocationRequest,
        deadline: DeadlineTracker,
        request_id: &str,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        info!("Invocation {}: {:?}", request_id, request);

        info!("Getting runner token");
        let attach_token = self
            .tokens
            .fetch_token(&request.repo_full_name, &request.token)
            .await
            .map_err(|e| {
                error!("Unable to get runner registration token: {}", e);
                LifecycleError::Registration(e)
            })?;

        let installer = AgentInstaller::new(
            self.config.install_dir.clone(),
            self.config.scratch_dir.clone(),
            self.config.tool_cache_dir.clone(),
        );
        info!("Staging runner in {}", self.config.scratch_dir.display());
        installer.ensure_staged().await.map_err(|e| {
            error!("Unable to copy runner: {:#}", e);
            LifecycleError::Staging(e)
        })?;
        installer.ensure_tool_cache().await;

        let mut controller = ProcessController::new(
            Arc::clone(&self.agent),
            self.config.diag_dir(),
            self.config.always_print_logs,
        );
        self.clear_stale_registration(&mut controller, request).await;

        let identity = RunnerIdentity::for_invocation(
            request.event,
            request_id,
            &self.config.runner_name_prefix,
            &self.config.default_runner_name,
        );
        if request.is_create() {
            info!("Creating default runner {}", identity);
        }

        info!(
            "Configuring runner (Request: {}|RepoUrl: {}|RepoFullName: {}|QueueUrl: {})...",
            request_id, request.repo_url, request.repo_full_name, request.queue_url
        );
        let args = ConfigureArgs {
            repo_url: request.repo_url.clone(),
            name: identity,
            group: self.config.runner_group.clone(),
            labels: self.config.runner_labels.clone(),
            work_dir: self.config.work_dir.clone(),
        };
        controller
            .configure(attach_token, &args)
            .await
            .map_err(LifecycleError::Configuration)?;

        if request.is_create() {
            info!("This is a create event, stopping runner");
            return Ok(LifecycleOutcome::Created);
        }

        if let Err(e) = controller.start() {
            error!("Unable to start runner: {}", e);
            if let Err(cleanup) = self.decommission(&mut controller, request).await {
                warn!("{}", cleanup);
            }
            return Err(LifecycleError::Start(e));
        }

        let poller = CompletionPoller::new(
            Arc::clone(&self.queue),
            PollSettings::from(&self.config),
        );
        let exit = poller
            .wait_for_completion(&request.queue_url, &request.virtual_id, &deadline)
            .await;
        info!("Poll loop finished: {} (runner {})", exit, controller.state());

        self.decommission(&mut controller, request).await?;

        info!("Complete!");
        Ok(LifecycleOutcome::Completed(exit))
    }

    /// Best-effort removal after an unexpected failure
    ///
    /// Only acts when the agent still holds a local registration, so a
    /// runner that was already removed is not removed twice.
    pub async fn cleanup_after_failure(
        &self,
        request: &InvocationRequest,
    ) -> Result<(), LifecycleError> {
        if !self.agent.is_configured() {
            info!("No runner registration left to clean up");
            return Ok(());
        }

        warn!("Attempting to remove runner after unexpected failure");
        let mut controller =
            ProcessController::new(Arc::clone(&self.agent), self.config.diag_dir(), false);
        self.decommission(&mut controller, request).await
    }

    async fn clear_stale_registration(
        &self,
        controller: &mut ProcessController,
        request: &InvocationRequest,
    ) {
        if !controller.has_stale_registration() {
            return;
        }

        let token = match self
            .tokens
            .fetch_token(&request.repo_full_name, &request.token)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    "Unable to get token to remove stale runner, continuing anyway: {}",
                    e
                );
                return;
            }
        };

        if let Err(e) = controller.clear_stale_registration(token).await {
            warn!("Unable to remove runner, going to continue anyway: {}", e);
        }
    }

    /// Fetches a fresh token and removes the runner
    async fn decommission(
        &self,
        controller: &mut ProcessController,
        request: &InvocationRequest,
    ) -> Result<(), LifecycleError> {
        let detach_token = self
            .tokens
            .fetch_token(&request.repo_full_name, &request.token)
            .await
            .map_err(|e| {
                warn!("Unable to get token to remove runner: {}", e);
                LifecycleError::TokenForRemoval(e)
            })?;

        controller
            .decommission(detach_token)
            .await
            .map_err(LifecycleError::Decommission)
    }
}
