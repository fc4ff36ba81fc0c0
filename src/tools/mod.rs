//! Research tools exposed over MCP.
//!
//! Each tool is a thin composition over the [`TaskRegistry`]:
//! - `quick_research`: lite tier, waits for the answer
//! - `deep_research`: any tier, returns a task id immediately
//! - `task_status`: refreshes a task and reports its state
//! - `get_research_chunk`: retrieves one slice of an oversized answer

mod research;
mod status;

pub use research::{DeepResearch, QuickResearch};
pub use status::{GetResearchChunk, TaskStatus};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ResearchError, ResearchResult};
use crate::processor::Processor;
use crate::task::TaskRegistry;

pub const DEFAULT_QUICK_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Run the tool; the returned string is sent to the caller verbatim.
    async fn execute(&self, args: Value) -> ResearchResult<String>;

    /// Run the tool, reporting progress along the way. Tools that finish
    /// quickly ignore `progress`.
    async fn execute_with_progress(
        &self,
        args: Value,
        _progress: Progress,
    ) -> ResearchResult<String> {
        self.execute(args).await
    }
}

type ProgressSink = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Handle for reporting progress (0.0 to 1.0) of a long-running tool call.
/// The default handle discards every report.
#[derive(Clone, Default)]
pub struct Progress {
    sink: Option<ProgressSink>,
}

impl Progress {
    pub fn new(sink: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn report(&self, progress: f64, message: &str) {
        if let Some(sink) = &self.sink {
            sink(progress, message);
        }
    }
}

/// Tool behavior that comes from configuration.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Tier used by `deep_research` when none is given.
    pub default_processor: Processor,
    /// Hard deadline for `quick_research`.
    pub quick_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            default_processor: Processor::default(),
            quick_timeout: DEFAULT_QUICK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Name-indexed set of the research tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(registry: Arc<TaskRegistry>, settings: ToolSettings) -> Self {
        let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
        let mut add = |tool: Arc<dyn Tool>| {
            tools.insert(tool.name().to_string(), tool);
        };

        add(Arc::new(QuickResearch::new(Arc::clone(&registry), settings.clone())));
        add(Arc::new(DeepResearch::new(Arc::clone(&registry), settings)));
        add(Arc::new(TaskStatus::new(Arc::clone(&registry))));
        add(Arc::new(GetResearchChunk::new(registry)));

        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tools sorted by name.
    pub fn list(&self) -> Vec<&Arc<dyn Tool>> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> ResearchResult<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ResearchError::Validation(format!("Missing '{}' argument", key)))
}

fn optional_str<'a>(args: &'a Value, key: &str) -> ResearchResult<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ResearchError::Validation(format!(
            "'{}' must be a string",
            key
        ))),
    }
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
