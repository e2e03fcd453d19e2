//! Flicker Runner
//!
//! Provisions one short-lived, self-registering runner per invocation and
//! tears it down again before the host's time limit.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Control-plane tokens and the completion queue
//! - Services: Deadline tracking, staging, agent process control, diagnostics
//! - Scheduler: The completion poll loop
//! - Lifecycle: Sequencing of one invocation, with its error taxonomy
//!
//! By default the binary serves Lambda invocations. `flicker-runner invoke`
//! runs a single lifecycle from a JSON file instead.

mod config;
mod handler;
mod lifecycle;
mod repository;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flicker_core::domain::invocation::InvocationRequest;
use lambda_runtime::{LambdaEvent, service_fn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::lifecycle::Lifecycle;
use crate::repository::{HttpTokenRepository, SqsCompletionQueue};
use crate::service::{DeadlineTracker, ScriptAgent};

#[derive(Parser)]
#[command(name = "flicker-runner")]
#[command(about = "Ephemeral self-registering runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve invocations from the Lambda runtime API (default)
    Serve,

    /// Run a single lifecycle locally
    Invoke {
        /// Path to the invocation JSON payload
        #[arg(long)]
        event: PathBuf,

        /// Seconds until the synthetic deadline
        #[arg(long, env = "FLICKER_TIMEOUT", default_value_t = 900)]
        timeout: u64,

        /// Request id used to name the runner (random by default)
        #[arg(long)]
        request_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Lambda captures stdout as-is, so skip colour codes there
    let in_lambda = std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flicker_runner=info,flicker_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_ansi(!in_lambda))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.validate()?;
    info!(
        "Loaded configuration: control_plane_url={}, scratch_dir={}",
        config.control_plane_url,
        config.scratch_dir.display()
    );

    let lifecycle = Arc::new(build_lifecycle(config).await?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting Flicker Runner");
            lambda_runtime::run(service_fn(
                move |event: LambdaEvent<InvocationRequest>| {
                    let lifecycle = Arc::clone(&lifecycle);
                    async move { handler::lambda_handler(lifecycle, event).await }
                },
            ))
            .await
            .map_err(|e| anyhow::anyhow!(e))
        }
        Command::Invoke {
            event,
            timeout,
            request_id,
        } => {
            let payload = std::fs::read_to_string(&event)
                .with_context(|| format!("Failed to read {}", event.display()))?;
            let request: InvocationRequest =
                serde_json::from_str(&payload).context("Failed to parse invocation payload")?;
            let request_id = request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let deadline = DeadlineTracker::after(Duration::from_secs(timeout));

            let status = handler::handle(lifecycle, request, deadline, request_id).await?;
            println!("{}", status);
            Ok(())
        }
    }
}

/// Wires the production repositories and agent into a lifecycle
async fn build_lifecycle(config: Config) -> Result<Lifecycle> {
    let tokens = Arc::new(HttpTokenRepository::new(
        &config.control_plane_url,
        config.http_timeout,
    )?);
    let queue = Arc::new(SqsCompletionQueue::from_env().await);
    let agent = Arc::new(ScriptAgent::new(
        config.scratch_dir.clone(),
        config.tool_cache_dir.clone(),
    ));

    Ok(Lifecycle::new(config, tokens, queue, agent))
}
