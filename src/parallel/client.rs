//! HTTP implementation of [`ResearchClient`] against the Parallel Task API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProviderError;
use super::{CitationGroup, PollOutcome, ResearchClient, ResearchOutput};
use crate::processor::Processor;

pub const DEFAULT_PARALLEL_API_URL: &str = "https://api.parallel.ai";

/// Parallel Task API client. Performs no retries; callers decide.
pub struct ParallelClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    input: &'a str,
    processor: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunStatus {
    run_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    output: RunOutput,
}

#[derive(Debug, Deserialize)]
struct RunOutput {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    basis: Vec<CitationGroup>,
}

impl ParallelClient {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, DEFAULT_PARALLEL_API_URL, Duration::from_secs(30))
    }

    /// Create a client against a specific base URL with a per-request timeout.
    pub fn with_base_url(
        api_key: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parallel-research-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn runs_url(&self) -> String {
        format!("{}/v1/tasks/runs", self.base_url)
    }

    fn run_url(&self, run_id: &str) -> String {
        format!("{}/{}", self.runs_url(), urlencoding::encode(run_id))
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ProviderError> {
        let response = request
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(ProviderError::http(status.as_u16(), body));
        }
        Ok(body)
    }

    async fn fetch_status(&self, run_id: &str) -> Result<RunStatus, ProviderError> {
        let body = self.send(self.client.get(self.run_url(run_id))).await?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::parse(format!("Failed to parse run status: {}, body: {}", e, body))
        })
    }

    async fn fetch_result(&self, run_id: &str) -> Result<ResearchOutput, ProviderError> {
        let url = format!("{}/result", self.run_url(run_id));
        let body = self.send(self.client.get(url)).await?;
        let parsed: RunResult = serde_json::from_str(&body).map_err(|e| {
            ProviderError::parse(format!("Failed to parse run result: {}, body: {}", e, body))
        })?;
        Ok(ResearchOutput {
            content: content_text(parsed.output.content),
            citations: parsed.output.basis,
        })
    }
}

/// Flatten the provider's `output.content`, which is a string for text
/// output and an object for structured output.
fn content_text(content: Value) -> String {
    match content {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Object(mut map) => match map.remove("output") {
            Some(Value::String(s)) => s,
            Some(other) => {
                map.insert("output".to_string(), other);
                Value::Object(map).to_string()
            }
            None => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    }
}

#[async_trait]
impl ResearchClient for ParallelClient {
    async fn submit(&self, query: &str, processor: Processor) -> Result<String, ProviderError> {
        let request = CreateRunRequest {
            input: query,
            processor: processor.as_str(),
        };
        let body = self
            .send(self.client.post(self.runs_url()).json(&request))
            .await?;
        let run: RunStatus = serde_json::from_str(&body).map_err(|e| {
            ProviderError::parse(format!("Failed to parse created run: {}, body: {}", e, body))
        })?;

        tracing::debug!(run_id = %run.run_id, status = %run.status, "Parallel run created");
        Ok(run.run_id)
    }

    async fn poll(&self, run_id: &str) -> Result<PollOutcome, ProviderError> {
        let run = self.fetch_status(run_id).await?;
        if run.is_active {
            return Ok(PollOutcome::Running { status: run.status });
        }

        if run.status == "completed" {
            return self.fetch_result(run_id).await.map(PollOutcome::Completed);
        }

        let reason = run
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("Research run ended with status '{}'", run.status));
        Ok(PollOutcome::Failed { reason })
    }
}
