//! Runner registration endpoints

use flicker_core::domain::runner::RegistrationToken;
use flicker_core::dto::registration::RegistrationTokenResponse;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use tracing::debug;

use crate::ControlPlaneClient;
use crate::error::{ClientError, Result};

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const CLIENT_USER_AGENT: &str = "lambda-github-runner";

impl ControlPlaneClient {
    /// Request a one-time runner registration token for a repository
    ///
    /// Only `201 Created` counts as success. There is no retry; the caller
    /// decides whether a failure aborts the lifecycle.
    ///
    /// # Arguments
    /// * `repo_full_name` - Repository in `owner/name` form
    /// * `credential` - API credential sent as `Authorization: token ...`
    pub async fn fetch_registration_token(
        &self,
        repo_full_name: &str,
        credential: &str,
    ) -> Result<RegistrationToken> {
        validate_full_name(repo_full_name)?;

        let url = format!(
            "{}/repos/{}/actions/runners/registration-token",
            self.base_url, repo_full_name
        );
        debug!("Requesting registration token from {}", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, ACCEPT_V3)
            .header(AUTHORIZATION, format!("token {}", credential))
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;

        let body: RegistrationTokenResponse =
            self.handle_response(response, StatusCode::CREATED).await?;

        Ok(body.into())
    }
}

fn validate_full_name(repo_full_name: &str) -> Result<()> {
    match repo_full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(ClientError::InvalidRequest(format!(
            "repository full name must be 'owner/name', got '{}'",
            repo_full_name
        ))),
    }
}
