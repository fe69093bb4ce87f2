//! HTTP client for the logging service REST API

use crate::error::{CloudError, CloudResult};
use crate::types::{ApiError, ValidateKeyResponse};
use pipetrace_core::SinkRecord;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};

/// HTTP client for the logging service
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, timeout: Duration) -> CloudResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("pipetrace/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an API key to the owning user id
    pub async fn validate_api_key(&self, api_key: &str) -> CloudResult<String> {
        let url = format!("{}/v1/auth/validate", self.base_url);

        debug!("Validating API key");

        let response = self
            .client
            .post(&url)
            .header("X-API-Key", api_key)
            .send()
            .await?;

        let body: ValidateKeyResponse = self.check_status(response).await?.json().await?;
        Ok(body.user_id)
    }

    /// POST one event record as JSON
    pub async fn log_event(&self, url: &str, record: &SinkRecord) -> CloudResult<()> {
        let response = self.client.post(url).json(record).send().await?;
        self.check_status(response).await?;
        Ok(())
    }

    /// Map non-success statuses to errors
    async fn check_status(&self, response: reqwest::Response) -> CloudResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                let error = self.parse_error(response).await;
                error!("Authentication failed: {}", error.message);
                Err(CloudError::Auth(error.message))
            }
            StatusCode::FORBIDDEN => {
                let error = self.parse_error(response).await;
                if error.code == "invalid_api_key" {
                    Err(CloudError::InvalidApiKey)
                } else {
                    Err(CloudError::Auth(error.message))
                }
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {}s", retry_after);
                Err(CloudError::RateLimited(retry_after))
            }
            _ if status.is_server_error() => {
                let error = self.parse_error(response).await;
                error!("Server error {}: {}", status, error.message);
                Err(CloudError::server(status.as_u16(), error.message))
            }
            _ => {
                let error = self.parse_error(response).await;
                Err(CloudError::server(status.as_u16(), error.message))
            }
        }
    }

    async fn parse_error(&self, response: reqwest::Response) -> ApiError {
        response
            .json::<ApiError>()
            .await
            .unwrap_or_else(|_| ApiError::unknown())
    }
}
