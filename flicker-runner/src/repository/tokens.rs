//! Registration token repository
//!
//! Fetches one-time registration tokens from the control plane. Every call
//! issues a new token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use flicker_client::{ClientError, ControlPlaneClient};
use flicker_core::domain::runner::RegistrationToken;
use flicker_core::domain::sensitive::Sensitive;
use std::time::Duration;
use tracing::{debug, info};

/// Repository trait for registration tokens
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Requests a fresh registration token
    ///
    /// # Arguments
    /// * `repo_full_name` - Repository in `owner/name` form
    /// * `credential` - API credential, never logged
    async fn fetch_token(
        &self,
        repo_full_name: &str,
        credential: &Sensitive<String>,
    ) -> std::result::Result<RegistrationToken, ClientError>;
}

/// HTTP implementation of TokenRepository
pub struct HttpTokenRepository {
    client: ControlPlaneClient,
}

impl HttpTokenRepository {
    /// Creates a repository whose requests time out after `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client: ControlPlaneClient::with_client(base_url, http),
        })
    }
}

#[async_trait]
impl TokenRepository for HttpTokenRepository {
    async fn fetch_token(
        &self,
        repo_full_name: &str,
        credential: &Sensitive<String>,
    ) -> std::result::Result<RegistrationToken, ClientError> {
        info!(
            "Getting runner token from {}/repos/{}/actions/runners/registration-token",
            self.client.base_url(),
            repo_full_name
        );

        let token = self
            .client
            .fetch_registration_token(repo_full_name, credential.expose())
            .await?;
        debug!("Registration token expires at {:?}", token.expires_at());
        Ok(token)
    }
}
