//! Flicker control-plane client
//!
//! A small, typed HTTP client for the control-plane API that issues runner
//! registration tokens. Both attaching and detaching a runner start with a
//! call to [`ControlPlaneClient::fetch_registration_token`].
//!
//! # Example
//!
//! ```no_run
//! use flicker_client::ControlPlaneClient;
//!
//! # async fn example() -> flicker_client::Result<()> {
//! let client = ControlPlaneClient::new("https://api.github.com");
//! let token = client
//!     .fetch_registration_token("acme/widgets", "ghp_example")
//!     .await?;
//! println!("token expires at {:?}", token.expires_at());
//! # Ok(())
//! # }
//! ```

pub mod error;
mod registration;

pub use error::{ClientError, Result};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// Default control-plane base URL
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// HTTP client for the control-plane API
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    /// Base URL of the API (e.g., "https://api.github.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ControlPlaneClient {
    /// Create a new control-plane client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API (e.g., "https://api.github.com")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new control-plane client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use flicker_client::ControlPlaneClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = ControlPlaneClient::with_client("https://api.github.com", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the control plane
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the status code against `expected` and deserialize the JSON body
    ///
    /// Any other status, including other 2xx codes, is an error.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        expected: StatusCode,
    ) -> Result<T> {
        let status = response.status();

        if status != expected {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
