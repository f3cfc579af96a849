use crate::failure_text;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use wabot_core::error::AppError;
use wabot_core::interfaces::RunnerApi;
use wabot_core::types::{QrStatus, RunnerAck, UpdateConfigRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the HTTP API every deployed runner exposes.
pub struct HttpRunner {
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn endpoint(base_url: &str, path: &str) -> String {
        format!("{}{path}", base_url.trim().trim_end_matches('/'))
    }

    async fn read<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T, AppError> {
        if !resp.status().is_success() {
            return Err(AppError::Runner(format!(
                "{what} failed ({})",
                failure_text(resp).await
            )));
        }
        resp.json()
            .await
            .map_err(|e| AppError::Runner(format!("{what}: unexpected response: {e}")))
    }
}

#[async_trait]
impl RunnerApi for HttpRunner {
    async fn fetch_status(&self, base_url: &str) -> Result<QrStatus, AppError> {
        let url = Self::endpoint(base_url, "/api/qr");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Runner(e.to_string()))?;
        let status: QrStatus = Self::read(resp, "Status poll").await?;
        debug!(%url, status = %status.status, "runner polled");
        Ok(status)
    }

    async fn push_config(
        &self,
        base_url: &str,
        request: &UpdateConfigRequest,
    ) -> Result<RunnerAck, AppError> {
        let resp = self
            .client
            .post(Self::endpoint(base_url, "/api/update-config"))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Runner(e.to_string()))?;
        Self::read(resp, "Config update").await
    }

    async fn logout(&self, base_url: &str) -> Result<RunnerAck, AppError> {
        let resp = self
            .client
            .post(Self::endpoint(base_url, "/api/logout"))
            .send()
            .await
            .map_err(|e| AppError::Runner(e.to_string()))?;
        Self::read(resp, "Logout").await
    }
}
