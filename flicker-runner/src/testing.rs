//! Test doubles for the repository and agent traits

use async_trait::async_trait;
use flicker_client::ClientError;
use flicker_core::domain::runner::RegistrationToken;
use flicker_core::domain::sensitive::Sensitive;
use flicker_core::domain::signal::QueueMessage;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::repository::{CompletionQueue, QueueError, ReceiveOptions, TokenRepository};
use crate::service::{AgentError, AgentOutput, ConfigureArgs, RunnerAgent};

/// Issues `tok-1`, `tok-2`, ... or fails with the given status
#[derive(Default)]
pub struct FakeTokens {
    pub issued: AtomicUsize,
    pub fail_status: Option<u16>,
}

impl FakeTokens {
    pub fn failing(status: u16) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            fail_status: Some(status),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRepository for FakeTokens {
    async fn fetch_token(
        &self,
        _repo_full_name: &str,
        _credential: &Sensitive<String>,
    ) -> Result<RegistrationToken, ClientError> {
        if let Some(status) = self.fail_status {
            return Err(ClientError::api_error(status, "Internal Server Error"));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RegistrationToken::new(format!("tok-{}", n), None))
    }
}

pub fn message(body: &str) -> QueueMessage {
    QueueMessage {
        message_id: Some(format!("id-{}", body)),
        body: body.to_string(),
        receipt_handle: Some(format!("rh-{}", body)),
        sent_at: None,
    }
}

/// Replays scripted receive results, then returns empty receives
#[derive(Default)]
pub struct FakeQueue {
    pub script: Mutex<VecDeque<Result<Option<QueueMessage>, QueueError>>>,
    pub receives: Mutex<Vec<ReceiveOptions>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: bool,
}

impl FakeQueue {
    pub fn scripted(script: Vec<Result<Option<QueueMessage>, QueueError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn receive_count(&self) -> usize {
        self.receives.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionQueue for FakeQueue {
    async fn receive(
        &self,
        _queue_url: &str,
        options: ReceiveOptions,
    ) -> Result<Option<QueueMessage>, QueueError> {
        self.receives.lock().unwrap().push(options);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        if self.fail_delete {
            return Err(QueueError::Delete("AccessDenied".to_string()));
        }
        Ok(())
    }
}

/// A call recorded by [`FakeAgent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Configure { token: String, name: String },
    Start,
    Remove { token: String },
}

/// Records calls and simulates the local registration marker
#[derive(Default)]
pub struct FakeAgent {
    pub calls: Mutex<Vec<AgentCall>>,
    pub configured: AtomicBool,
    pub configure_exit: i32,
    pub remove_exit: i32,
    pub panic_on_start: bool,
}

impl FakeAgent {
    pub fn already_configured() -> Self {
        let agent = Self::default();
        agent.configured.store(true, Ordering::SeqCst);
        agent
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn removals(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, AgentCall::Remove { .. }))
            .count()
    }

    fn exit(code: i32) -> AgentOutput {
        AgentOutput {
            exit_code: Some(code),
            stdout: if code == 0 { "ok".to_string() } else { String::new() },
            stderr: if code == 0 {
                String::new()
            } else {
                "Http response code: NotFound".to_string()
            },
        }
    }
}

#[async_trait]
impl RunnerAgent for FakeAgent {
    async fn configure(
        &self,
        args: &ConfigureArgs,
        token: RegistrationToken,
    ) -> Result<AgentOutput, AgentError> {
        self.calls.lock().unwrap().push(AgentCall::Configure {
            token: token.expose().to_string(),
            name: args.name.to_string(),
        });
        if self.configure_exit == 0 {
            self.configured.store(true, Ordering::SeqCst);
        }
        Ok(Self::exit(self.configure_exit))
    }

    fn start(&self) -> Result<Option<u32>, AgentError> {
        if self.panic_on_start {
            panic!("listener exploded");
        }
        self.calls.lock().unwrap().push(AgentCall::Start);
        Ok(Some(4242))
    }

    async fn remove(&self, token: RegistrationToken) -> Result<AgentOutput, AgentError> {
        self.calls.lock().unwrap().push(AgentCall::Remove {
            token: token.expose().to_string(),
        });
        if self.remove_exit == 0 {
            self.configured.store(false, Ordering::SeqCst);
        }
        Ok(Self::exit(self.remove_exit))
    }

    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }
}
