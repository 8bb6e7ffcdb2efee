use std::time::Duration;

use chess_core::{AnalysisResult, Job};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::error::WorkerError;

/// Acknowledgement for a submitted result
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAck {
    pub job_id: String,
    /// `recorded`, `duplicate` or `unknown`
    pub status: String,
}

/// HTTP client for the dispatcher's worker-facing routes.
#[derive(Clone)]
pub struct DispatcherClient {
    client: Client,
    base_url: String,
}

impl DispatcherClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WorkerError> {
        let client = Client::builder()
            .user_agent(concat!("analysis-worker/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Long-poll for the next job. `None` when the dispatcher had nothing within `wait`.
    pub async fn acquire(&self, wait: Duration) -> Result<Option<Job>, WorkerError> {
        let resp = self
            .client
            .get(format!("{}/api/jobs/next", self.base_url))
            .query(&[("timeout_ms", wait.as_millis() as u64)])
            .send()
            .await?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let resp = ensure_success(resp).await?;
        Ok(Some(resp.json::<Job>().await?))
    }

    pub async fn submit_result(&self, result: &AnalysisResult) -> Result<SubmitAck, WorkerError> {
        let resp = self
            .client
            .post(format!("{}/api/results", self.base_url))
            .json(result)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<SubmitAck>().await?)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, WorkerError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(WorkerError::Dispatcher { status, body })
}
