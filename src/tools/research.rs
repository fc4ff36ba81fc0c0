//! Research submission tools: quick (blocking, lite tier) and deep (async).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::status::completed_response;
use super::{optional_str, required_str, to_pretty, Progress, Tool, ToolSettings};
use crate::error::{ResearchError, ResearchResult};
use crate::processor::Processor;
use crate::task::{TaskRegistry, TaskState};

/// Lite-tier research that waits for the answer.
///
/// Submits, then polls until the task finishes or the configured deadline
/// passes. On timeout the task stays registered and can still be checked
/// with `task_status`.
pub struct QuickResearch {
    registry: Arc<TaskRegistry>,
    settings: ToolSettings,
}

impl QuickResearch {
    pub fn new(registry: Arc<TaskRegistry>, settings: ToolSettings) -> Self {
        Self { registry, settings }
    }
}

#[async_trait]
impl Tool for QuickResearch {
    fn name(&self) -> &str {
        "quick_research"
    }

    fn description(&self) -> &str {
        "Quick research using the Lite processor (5-60s, $5 per 1,000 queries). Waits for the answer and returns it with citations. Use for fast, low-cost factual questions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Research question, e.g. \"What is OAuth 2.1?\""
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> ResearchResult<String> {
        self.execute_with_progress(args, Progress::default()).await
    }

    async fn execute_with_progress(
        &self,
        args: Value,
        progress: Progress,
    ) -> ResearchResult<String> {
        let query = required_str(&args, "query")?;
        let processor = Processor::Lite;
        let timeout = self.settings.quick_timeout;

        let task_id = self.registry.create(query, processor).await?;
        progress.report(0.1, "Quick research submitted");
        let deadline = Instant::now() + timeout;
        let timed_out = || ResearchError::Timeout {
            task_id: task_id.clone(),
            waited_secs: timeout.as_secs(),
        };

        loop {
            let snapshot = tokio::time::timeout_at(deadline, self.registry.refresh(&task_id))
                .await
                .map_err(|_| timed_out())??;

            match &snapshot.state {
                TaskState::Complete(output) => {
                    progress.report(1.0, "Complete");
                    return Ok(to_pretty(&completed_response(&snapshot, output)));
                }
                TaskState::Error(reason) => {
                    return Err(ResearchError::ResearchFailed {
                        task_id: task_id.clone(),
                        reason: reason.clone(),
                    });
                }
                TaskState::Running => {
                    let status = snapshot.provider_status.as_deref().unwrap_or("running");
                    progress.report(0.5, &format!("Researching... ({})", status));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(task_id = %task_id, waited_secs = timeout.as_secs(), "Quick research timed out");
                return Err(timed_out());
            }
            tokio::time::sleep_until(deadline.min(now + self.settings.poll_interval)).await;
        }
    }
}

/// Submit research on any tier and return immediately with a task id.
pub struct DeepResearch {
    registry: Arc<TaskRegistry>,
    settings: ToolSettings,
}

impl DeepResearch {
    pub fn new(registry: Arc<TaskRegistry>, settings: ToolSettings) -> Self {
        Self { registry, settings }
    }
}

#[async_trait]
impl Tool for DeepResearch {
    fn name(&self) -> &str {
        "deep_research"
    }

    fn description(&self) -> &str {
        "Start deep research with structured citations on the chosen processor tier. Returns a task_id immediately; poll it with task_status. Higher tiers are slower and more expensive: ask the user before using pro or above."
    }

    fn parameters_schema(&self) -> Value {
        let tiers: Vec<&str> = Processor::ALL.iter().map(|p| p.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Research question, e.g. \"Compare authentication approaches for microservices\""
                },
                "processor": {
                    "type": "string",
                    "enum": tiers,
                    "description": format!(
                        "Processor tier (default: {})",
                        self.settings.default_processor
                    )
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> ResearchResult<String> {
        let query = required_str(&args, "query")?;
        let processor = match optional_str(&args, "processor")? {
            Some(name) => name.parse::<Processor>().map_err(|e| {
                ResearchError::Validation(format!("{}; valid processors: {}", e, Processor::valid_names()))
            })?,
            None => self.settings.default_processor,
        };

        let task_id = self.registry.create(query, processor).await?;
        Ok(to_pretty(&json!({
            "status": "running",
            "task_id": task_id,
            "processor": processor,
            "estimated_time": processor.expected_duration(),
            "cost_per_1k_queries": processor.cost_display(),
            "message": format!(
                "Research started. Check progress with task_status using task_id '{}'.",
                task_id
            ),
        })))
    }
}
