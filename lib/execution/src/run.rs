//! Starting workflow runs.

use crate::error::RunError;
use async_trait::async_trait;
use flowcanvas_core::{ExecutionId, WorkflowId};
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Starts executions of saved workflows.
#[async_trait]
pub trait RunClient: Send + Sync {
    /// Starts a run and returns its execution ID.
    async fn start_run(&self, workflow_id: WorkflowId) -> Result<ExecutionId, Report<RunError>>;
}

/// [`RunClient`] backed by the workflow HTTP API.
///
/// Runs are started with `POST {base_url}/workflows/{id}/run`.
#[derive(Debug, Clone)]
pub struct HttpRunClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRunClient {
    /// Request timeout for run calls.
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, Report<RunError>> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| RunError::RequestFailed {
                details: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn run_url(&self, workflow_id: WorkflowId) -> String {
        format!("{}/workflows/{}/run", self.base_url.trim_end_matches('/'), workflow_id)
    }
}

#[async_trait]
impl RunClient for HttpRunClient {
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    async fn start_run(&self, workflow_id: WorkflowId) -> Result<ExecutionId, Report<RunError>> {
        let url = self.run_url(workflow_id);
        let mut request = self.client.post(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, url = %url, "Run request failed");
            RunError::RequestFailed {
                details: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Run request rejected");
            return Err(RunError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body: JsonValue = response.json().await.map_err(|e| RunError::InvalidResponse {
            details: e.to_string(),
        })?;
        let execution_id = execution_id_from(&body)?;
        info!(execution_id = %execution_id, "Run started");
        Ok(execution_id)
    }
}

/// Extracts the execution ID from a run response.
///
/// Accepts `execution_id` or `executionId`, as a string or a number.
pub fn execution_id_from(body: &JsonValue) -> Result<ExecutionId, RunError> {
    let raw = body
        .get("execution_id")
        .or_else(|| body.get("executionId"))
        .ok_or_else(|| RunError::InvalidResponse {
            details: "missing execution_id".to_string(),
        })?;
    let id = match raw {
        JsonValue::String(s) if !s.is_empty() => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        other => {
            return Err(RunError::InvalidResponse {
                details: format!("unusable execution_id: {other}"),
            });
        }
    };
    Ok(ExecutionId::new(id))
}
