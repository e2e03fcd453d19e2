//! Registration DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::runner::RegistrationToken;

/// Body returned by the control plane when a registration token is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationTokenResponse {
    /// Opaque one-time token
    pub token: String,

    /// When the control plane will stop accepting the token
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<RegistrationTokenResponse> for RegistrationToken {
    fn from(response: RegistrationTokenResponse) -> Self {
        RegistrationToken::new(response.token, response.expires_at)
    }
}
