//! Completion poller
//!
//! Long-polls the completion queue until a message whose body equals the
//! invocation's virtual id arrives, or until the deadline margin is reached.
//! Messages for other invocations are left unacknowledged so they become
//! visible to their owners again.

use flicker_core::domain::signal::{PollExit, QueueMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::repository::{CompletionQueue, ReceiveOptions};
use crate::service::DeadlineTracker;

/// Timing parameters of the poll loop
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Hidden time for a received message
    pub visibility_timeout: Duration,

    /// Longest single long poll
    pub max_wait_time: Duration,

    /// Time reserved before the deadline for teardown
    pub deadline_margin: Duration,

    /// Pause after a failed receive
    pub receive_error_backoff: Duration,
}

impl From<&Config> for PollSettings {
    fn from(config: &Config) -> Self {
        Self {
            visibility_timeout: config.visibility_timeout,
            max_wait_time: config.max_wait_time,
            deadline_margin: config.deadline_margin,
            receive_error_backoff: config.receive_error_backoff,
        }
    }
}

/// Waits for the completion signal of one invocation
pub struct CompletionPoller {
    queue: Arc<dyn CompletionQueue>,
    settings: PollSettings,
}

impl CompletionPoller {
    pub fn new(queue: Arc<dyn CompletionQueue>, settings: PollSettings) -> Self {
        Self { queue, settings }
    }

    /// Blocks until the runner should be stopped
    ///
    /// Receive errors never end the loop; missing the stop signal is worse
    /// than one failed poll.
    pub async fn wait_for_completion(
        &self,
        queue_url: &str,
        virtual_id: &str,
        deadline: &DeadlineTracker,
    ) -> PollExit {
        info!("Starting to listen for complete message on {}", queue_url);

        loop {
            let options = ReceiveOptions {
                wait_time: self.wait_window(deadline),
                visibility_timeout: self.settings.visibility_timeout,
            };

            match self.queue.receive(queue_url, options).await {
                Ok(Some(message)) if message.is_signal_for(virtual_id) => {
                    info!("Message received, closing runner");
                    self.acknowledge(queue_url, &message).await;
                    return PollExit::Signaled;
                }
                Ok(Some(message)) => {
                    debug!(
                        "Ignoring message {:?} meant for another invocation",
                        message.message_id
                    );
                }
                Ok(None) => debug!("No completion message this round"),
                Err(e) => {
                    warn!("{}", e);
                    let pause = self
                        .settings
                        .receive_error_backoff
                        .min(deadline.remaining_before(self.settings.deadline_margin));
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }

            if deadline.is_expiring_soon(self.settings.deadline_margin) {
                info!("Function is about to time out, decommissioning");
                return PollExit::TimedOut;
            }
        }
    }

    /// Long-poll window, clamped so a receive never runs into the margin
    fn wait_window(&self, deadline: &DeadlineTracker) -> Duration {
        self.settings
            .max_wait_time
            .min(deadline.remaining_before(self.settings.deadline_margin))
    }

    async fn acknowledge(&self, queue_url: &str, message: &QueueMessage) {
        let Some(receipt_handle) = message.receipt_handle.as_deref() else {
            warn!("Completion message has no receipt handle, cannot delete it");
            return;
        };

        if let Err(e) = self.queue.delete(queue_url, receipt_handle).await {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::QueueError;
    use crate::testing::{FakeQueue, message};
    use chrono::{TimeDelta, Utc};

    fn settings() -> PollSettings {
        PollSettings {
            visibility_timeout: Duration::from_secs(60),
            max_wait_time: Duration::ZERO,
            deadline_margin: Duration::from_secs(30),
            receive_error_backoff: Duration::ZERO,
        }
    }

    fn far_deadline() -> DeadlineTracker {
        DeadlineTracker::after(Duration::from_secs(900))
    }

    fn past_deadline() -> DeadlineTracker {
        DeadlineTracker::new(Utc::now() - TimeDelta::seconds(1))
    }

    #[tokio::test]
    async fn test_ignores_other_bodies_then_signals() {
        let queue = Arc::new(FakeQueue::scripted(vec![
            Ok(Some(message("xyz"))),
            Ok(Some(message("abc123"))),
        ]));
        let poller = CompletionPoller::new(queue.clone(), settings());

        let exit = poller
            .wait_for_completion("Q", "abc123", &far_deadline())
            .await;

        assert_eq!(exit, PollExit::Signaled);
        assert_eq!(queue.receive_count(), 2);
        assert_eq!(queue.deleted(), vec!["rh-abc123".to_string()]);
    }

    #[tokio::test]
    async fn test_keeps_polling_before_deadline() {
        let queue = Arc::new(FakeQueue::scripted(vec![
            Ok(None),
            Ok(None),
            Ok(Some(message("other"))),
            Ok(None),
            Ok(Some(message("abc123"))),
        ]));
        let poller = CompletionPoller::new(queue.clone(), settings());

        let exit = poller
            .wait_for_completion("Q", "abc123", &far_deadline())
            .await;

        assert_eq!(exit, PollExit::Signaled);
        assert_eq!(queue.receive_count(), 5);
    }

    #[tokio::test]
    async fn test_times_out_without_deleting_foreign_messages() {
        let queue = Arc::new(FakeQueue::scripted(vec![Ok(Some(message("xyz")))]));
        let poller = CompletionPoller::new(queue.clone(), settings());

        let exit = poller
            .wait_for_completion("Q", "abc123", &past_deadline())
            .await;

        assert_eq!(exit, PollExit::TimedOut);
        assert_eq!(queue.receive_count(), 1);
        assert!(queue.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_times_out_inside_margin() {
        let queue = Arc::new(FakeQueue::default());
        let poller = CompletionPoller::new(queue.clone(), settings());
        let deadline = DeadlineTracker::after(Duration::from_secs(10));

        let exit = poller.wait_for_completion("Q", "abc123", &deadline).await;

        assert_eq!(exit, PollExit::TimedOut);
        assert_eq!(queue.receive_count(), 1);
    }

    #[tokio::test]
    async fn test_receive_errors_do_not_stop_the_loop() {
        let queue = Arc::new(FakeQueue::scripted(vec![
            Err(QueueError::Receive("throttled".to_string())),
            Err(QueueError::Receive("throttled".to_string())),
            Ok(Some(message("abc123"))),
        ]));
        let poller = CompletionPoller::new(queue.clone(), settings());

        let exit = poller
            .wait_for_completion("Q", "abc123", &far_deadline())
            .await;

        assert_eq!(exit, PollExit::Signaled);
        assert_eq!(queue.receive_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_failure_still_signals() {
        let queue = Arc::new(FakeQueue {
            fail_delete: true,
            ..FakeQueue::scripted(vec![Ok(Some(message("abc123")))])
        });
        let poller = CompletionPoller::new(queue.clone(), settings());

        let exit = poller
            .wait_for_completion("Q", "abc123", &far_deadline())
            .await;

        assert_eq!(exit, PollExit::Signaled);
        assert_eq!(queue.deleted(), vec!["rh-abc123".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_window_clamped_to_margin() {
        let queue = Arc::new(FakeQueue::scripted(vec![Ok(Some(message("abc123")))]));
        let poller = CompletionPoller::new(
            queue.clone(),
            PollSettings {
                max_wait_time: Duration::from_secs(20),
                ..settings()
            },
        );
        let deadline = DeadlineTracker::after(Duration::from_secs(35));

        poller.wait_for_completion("Q", "abc123", &deadline).await;

        let receives = queue.receives.lock().unwrap();
        assert!(receives[0].wait_time <= Duration::from_secs(5));
        assert!(receives[0].wait_time >= Duration::from_secs(4));
        assert_eq!(receives[0].visibility_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_wait_window_uses_max_wait_far_from_deadline() {
        let poller = CompletionPoller::new(
            Arc::new(FakeQueue::default()),
            PollSettings {
                max_wait_time: Duration::from_secs(20),
                ..settings()
            },
        );
        assert_eq!(
            poller.wait_window(&far_deadline()),
            Duration::from_secs(20)
        );
        assert_eq!(poller.wait_window(&past_deadline()), Duration::ZERO);
    }
}
