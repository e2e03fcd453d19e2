//! Completion queue repository
//!
//! Receives and acknowledges completion signals. Messages that are received
//! but not deleted become visible again once their visibility timeout lapses.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use chrono::DateTime;
use flicker_core::domain::signal::QueueMessage;
use std::time::Duration;
use thiserror::Error;

/// SQS refuses long polls above 20 seconds
const MAX_WAIT_SECONDS: i32 = 20;

/// Errors talking to the completion queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Error while receiving messages: {0}")]
    Receive(String),

    #[error("Error while deleting message: {0}")]
    Delete(String),
}

/// Parameters of a single receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Long-poll window
    pub wait_time: Duration,

    /// How long a returned message stays hidden from other consumers
    pub visibility_timeout: Duration,
}

/// Repository trait for the completion signal queue
#[async_trait]
pub trait CompletionQueue: Send + Sync {
    /// Receives at most one message, waiting up to `options.wait_time`
    async fn receive(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Option<QueueMessage>, QueueError>;

    /// Acknowledges a message by its receipt handle
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;
}

/// SQS implementation of CompletionQueue
pub struct SqsCompletionQueue {
    client: Client,
}

impl SqsCompletionQueue {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS configuration
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl CompletionQueue for SqsCompletionQueue {
    async fn receive(
        &self,
        queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Option<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .visibility_timeout(whole_seconds(options.visibility_timeout))
            .wait_time_seconds(whole_seconds(options.wait_time).min(MAX_WAIT_SECONDS))
            .message_system_attribute_names(MessageSystemAttributeName::SentTimestamp)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(into_queue_message))
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

fn whole_seconds(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

fn into_queue_message(message: Message) -> QueueMessage {
    let sent_at = message
        .attributes
        .as_ref()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis);

    QueueMessage {
        message_id: message.message_id,
        body: message.body.unwrap_or_default(),
        receipt_handle: message.receipt_handle,
        sent_at,
    }
}
