//! Invocation handler
//!
//! Adapts a host invocation to [`Lifecycle::run`]. The lifecycle runs in its
//! own task so that a panic anywhere inside it is caught here, followed by a
//! best-effort removal of the runner, and turned into a structured error.

use flicker_core::domain::invocation::InvocationRequest;
use lambda_runtime::LambdaEvent;
use std::any::Any;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::lifecycle::{Lifecycle, LifecycleError};
use crate::service::DeadlineTracker;

/// Runs one lifecycle and returns its status line
pub async fn handle(
    lifecycle: Arc<Lifecycle>,
    request: InvocationRequest,
    deadline: DeadlineTracker,
    request_id: String,
) -> Result<String, LifecycleError> {
    let task = {
        let lifecycle = Arc::clone(&lifecycle);
        let request = request.clone();
        tokio::spawn(async move { lifecycle.run(&request, deadline, &request_id).await })
    };

    match task.await {
        Ok(Ok(outcome)) => Ok(outcome.status().to_string()),
        Ok(Err(e)) => {
            error!("{}: {}", e.status(), e);
            Err(e)
        }
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                join_error.to_string()
            };
            error!("Recovered from panic: {}", reason);

            if let Err(e) = lifecycle.cleanup_after_failure(&request).await {
                warn!("Cleanup after panic failed: {}", e);
            }
            Err(LifecycleError::Panicked(reason))
        }
    }
}

/// Entry point for Lambda invocations
pub async fn lambda_handler(
    lifecycle: Arc<Lifecycle>,
    event: LambdaEvent<InvocationRequest>,
) -> Result<String, lambda_runtime::Error> {
    let (request, context) = event.into_parts();

    let deadline = DeadlineTracker::from_epoch_millis(context.deadline)
        .ok_or_else(|| lambda_runtime::Error::from("invocation deadline out of range"))?;
    info!(
        "Handling request {} (deadline {}, {:?} remaining)",
        context.request_id,
        deadline.deadline(),
        deadline.time_remaining()
    );

    let status = handle(lifecycle, request, deadline, context.request_id).await?;
    Ok(status)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{AgentCall, FakeAgent, FakeQueue, FakeTokens, message};
    use flicker_core::domain::invocation::LifecycleEvent;
    use flicker_core::domain::sensitive::Sensitive;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request() -> InvocationRequest {
        InvocationRequest {
            queue_url: "Q".to_string(),
            repo_url: "https://github.com/acme/widgets".to_string(),
            repo_full_name: "acme/widgets".to_string(),
            token: Sensitive::new("ghp_secret".to_string()),
            virtual_id: "abc123".to_string(),
            event: LifecycleEvent::Run,
        }
    }

    fn setup(agent: Arc<FakeAgent>, queue: FakeQueue) -> (TempDir, Arc<Lifecycle>) {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            install_dir: tmp.path().join("runner"),
            scratch_dir: tmp.path().join("scratch"),
            tool_cache_dir: tmp.path().join("toolcache"),
            max_wait_time: Duration::ZERO,
            ..Config::default()
        };
        // Pre-staged, so the missing install dir is never read
        std::fs::create_dir_all(&config.scratch_dir).unwrap();

        let lifecycle = Lifecycle::new(
            config,
            Arc::new(FakeTokens::default()),
            Arc::new(queue),
            agent,
        );
        (tmp, Arc::new(lifecycle))
    }

    #[tokio::test]
    async fn test_successful_run_returns_status() {
        let agent = Arc::new(FakeAgent::default());
        let (_tmp, lifecycle) = setup(
            agent.clone(),
            FakeQueue::scripted(vec![Ok(Some(message("abc123")))]),
        );

        let status = handle(
            lifecycle,
            request(),
            DeadlineTracker::after(Duration::from_secs(900)),
            "req-1".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(status, "Complete!");
        assert_eq!(agent.removals(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_runner_removed() {
        let agent = Arc::new(FakeAgent {
            panic_on_start: true,
            ..Default::default()
        });
        let (_tmp, lifecycle) = setup(agent.clone(), FakeQueue::default());

        let err = handle(
            lifecycle,
            request(),
            DeadlineTracker::after(Duration::from_secs(900)),
            "req-1".to_string(),
        )
        .await
        .unwrap_err();

        match err {
            LifecycleError::Panicked(reason) => assert_eq!(reason, "listener exploded"),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            agent.calls(),
            vec![
                AgentCall::Configure {
                    token: "tok-1".to_string(),
                    name: "lambda-req-1".to_string()
                },
                AgentCall::Remove {
                    token: "tok-2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new("owned".to_string())), "owned");
        assert_eq!(panic_message(Box::new(7u8)), "unknown panic");
    }
}
