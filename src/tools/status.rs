//! Task status and chunk retrieval tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, to_pretty, Tool};
use crate::error::{ResearchError, ResearchResult};
use crate::parallel::ResearchOutput;
use crate::task::{TaskRegistry, TaskSnapshot, TaskState};

/// Report the state of a research task, polling the provider if it is
/// still running.
pub struct TaskStatus {
    registry: Arc<TaskRegistry>,
}

impl TaskStatus {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for TaskStatus {
    fn name(&self) -> &str {
        "task_status"
    }

    fn description(&self) -> &str {
        "Check the status of a research task started with deep_research. Returns progress while running, the full result with citations when complete, or the failure reason. Large results return the first chunk plus the total chunk count; fetch the rest with get_research_chunk."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Task ID returned by deep_research"
                }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: Value) -> ResearchResult<String> {
        let task_id = required_str(&args, "task_id")?;
        let snapshot = self.registry.refresh(task_id).await?;

        let response = match &snapshot.state {
            TaskState::Running => running_response(&snapshot),
            TaskState::Complete(output) => completed_response(&snapshot, output),
            TaskState::Error(reason) => failed_response(&snapshot, reason),
        };
        Ok(to_pretty(&response))
    }
}

/// Return one chunk of an oversized research result.
pub struct GetResearchChunk {
    registry: Arc<TaskRegistry>,
}

impl GetResearchChunk {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for GetResearchChunk {
    fn name(&self) -> &str {
        "get_research_chunk"
    }

    fn description(&self) -> &str {
        "Retrieve one chunk of a large research result. Chunks are numbered from 1; task_status reports the total."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Task ID of a completed research task"
                },
                "chunk": {
                    "type": "integer",
                    "description": "Chunk number, starting at 1",
                    "minimum": 1
                }
            },
            "required": ["task_id", "chunk"]
        })
    }

    async fn execute(&self, args: Value) -> ResearchResult<String> {
        let task_id = required_str(&args, "task_id")?;
        let index = args
            .get("chunk")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                ResearchError::Validation("'chunk' must be an integer".to_string())
            })?;

        let view = self.registry.get_chunk(task_id, index).await?;
        Ok(to_pretty(&json!({
            "task_id": view.task_id,
            "chunk": view.chunk,
            "total_chunks": view.total_chunks,
            "position": format!("{}/{}", view.chunk, view.total_chunks),
            "content": view.content,
        })))
    }
}

pub(super) fn running_response(snapshot: &TaskSnapshot) -> Value {
    let expected = snapshot.processor.expected_duration();
    let message = if snapshot.elapsed > snapshot.processor.max_latency() {
        format!(
            "Research is taking longer than the usual {}. Check again later with task_status.",
            expected
        )
    } else {
        format!(
            "Research in progress (expected {}). Check again later with task_status.",
            expected
        )
    };

    json!({
        "status": "running",
        "task_id": snapshot.task_id,
        "processor": snapshot.processor,
        "run_id": snapshot.run_id,
        "provider_status": snapshot.provider_status,
        "created_at": snapshot.created_at.to_rfc3339(),
        "elapsed_seconds": snapshot.elapsed.as_secs(),
        "expected_duration": expected,
        "message": message,
    })
}

pub(super) fn completed_response(snapshot: &TaskSnapshot, output: &ResearchOutput) -> Value {
    let mut response = json!({
        "status": "complete",
        "task_id": snapshot.task_id,
        "processor": snapshot.processor,
        "run_id": snapshot.run_id,
        "query": snapshot.query,
        "created_at": snapshot.created_at.to_rfc3339(),
        "elapsed_seconds": snapshot.elapsed.as_secs(),
        "citations": output.citations,
    });

    match &snapshot.chunks {
        Some(chunks) => {
            let total = chunks.len();
            response["chunked"] = json!(true);
            response["chunk"] = json!(1);
            response["total_chunks"] = json!(total);
            response["content"] = json!(chunks.first().cloned().unwrap_or_default());
            response["message"] = json!(format!(
                "Result is too large for one message and was split into {} chunks. This is chunk 1/{}. Call get_research_chunk with task_id '{}' and chunk 2 through {} for the rest.",
                total, total, snapshot.task_id, total
            ));
        }
        None => {
            response["chunked"] = json!(false);
            response["content"] = json!(output.content);
        }
    }
    response
}

pub(super) fn failed_response(snapshot: &TaskSnapshot, reason: &str) -> Value {
    json!({
        "status": "error",
        "task_id": snapshot.task_id,
        "processor": snapshot.processor,
        "run_id": snapshot.run_id,
        "error": reason,
        "message": "Research permanently failed. Submit a new deep_research request to try again.",
    })
}
