//! In-process registry of research tasks.
//!
//! The map is behind an async `RwLock` that is only held long enough to
//! insert, look up or evict entries. Each task has its own `Mutex`, so a
//! refresh serializes against other refreshes of the same task (one poll
//! in flight at a time) without blocking work on any other task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::task::{ChunkView, Task, TaskId, TaskSnapshot, TaskState};
use crate::chunk::ChunkPolicy;
use crate::error::{ResearchError, ResearchResult};
use crate::parallel::{PollOutcome, ResearchClient};
use crate::processor::Processor;

pub const DEFAULT_TASK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_TASKS: usize = 1_000;

/// Retention and chunking settings for a [`TaskRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub chunk_policy: ChunkPolicy,
    /// How long a finished task stays retrievable.
    pub task_ttl: Duration,
    pub max_tasks: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chunk_policy: ChunkPolicy::default(),
            task_ttl: DEFAULT_TASK_TTL,
            max_tasks: DEFAULT_MAX_TASKS,
        }
    }
}

pub struct TaskRegistry {
    client: Arc<dyn ResearchClient>,
    config: RegistryConfig,
    tasks: RwLock<HashMap<TaskId, Arc<Mutex<Task>>>>,
}

impl TaskRegistry {
    pub fn new(client: Arc<dyn ResearchClient>, config: RegistryConfig) -> Self {
        Self {
            client,
            config,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Submit a query and start tracking it. Nothing is recorded if the
    /// provider rejects the submission.
    pub async fn create(&self, query: &str, processor: Processor) -> ResearchResult<TaskId> {
        if query.trim().is_empty() {
            return Err(ResearchError::Validation("query must not be empty".to_string()));
        }

        self.evict_expired().await;
        self.ensure_capacity().await?;

        let run_id = self
            .client
            .submit(query, processor)
            .await
            .map_err(|e| {
                tracing::error!(processor = %processor, error = %e, "Research submission failed");
                ResearchError::Submission(e)
            })?;

        let task = Task::new(query.to_string(), processor, run_id);
        let task_id = task.id.clone();
        tracing::info!(
            task_id = %task_id,
            run_id = %task.run_id,
            processor = %processor,
            query_length = query.len(),
            "Research task created"
        );

        self.tasks
            .write()
            .await
            .insert(task_id.clone(), Arc::new(Mutex::new(task)));
        Ok(task_id)
    }

    async fn entry(&self, task_id: &str) -> ResearchResult<Arc<Mutex<Task>>> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| ResearchError::NotFound(task_id.to_string()))
    }

    /// Current state without contacting the provider.
    pub async fn get(&self, task_id: &str) -> ResearchResult<TaskSnapshot> {
        let entry = self.entry(task_id).await?;
        let task = entry.lock().await;
        Ok(task.snapshot(None))
    }

    /// Bring a task up to date. Terminal tasks are returned as stored;
    /// running tasks are polled exactly once.
    pub async fn refresh(&self, task_id: &str) -> ResearchResult<TaskSnapshot> {
        let entry = self.entry(task_id).await?;
        let mut task = entry.lock().await;

        if task.state.is_terminal() {
            return Ok(task.snapshot(None));
        }

        let outcome = match self.client.poll(&task.run_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    task_id = %task.id,
                    run_id = %task.run_id,
                    error = %e,
                    "Status check failed; task remains running"
                );
                return Err(ResearchError::Poll {
                    task_id: task.id.clone(),
                    source: e,
                });
            }
        };

        if let PollOutcome::Running { status } = outcome {
            tracing::debug!(
                task_id = %task.id,
                status = %status,
                elapsed_secs = task.elapsed().as_secs(),
                "Research still running"
            );
            return Ok(task.snapshot(Some(status)));
        }

        task.apply(outcome, &self.config.chunk_policy);
        let snapshot = task.snapshot(None);
        match &snapshot.state {
            TaskState::Error(reason) => tracing::error!(
                task_id = %snapshot.task_id,
                run_id = %snapshot.run_id,
                reason = %reason,
                "Research task failed"
            ),
            _ => tracing::info!(
                task_id = %snapshot.task_id,
                run_id = %snapshot.run_id,
                state = snapshot.state.as_str(),
                total_chunks = snapshot.total_chunks().unwrap_or(0),
                elapsed_secs = snapshot.elapsed.as_secs(),
                "Research task finished"
            ),
        }
        Ok(snapshot)
    }

    /// Fetch one chunk (1-based) of a completed, chunked result.
    pub async fn get_chunk(&self, task_id: &str, index: i64) -> ResearchResult<ChunkView> {
        let entry = self.entry(task_id).await?;
        let task = entry.lock().await;
        task.chunk(index)
    }

    /// Drop finished tasks idle longer than the TTL and running tasks that
    /// have gone unfinished past the TTL plus their tier's maximum latency.
    /// Returns how many were removed.
    pub async fn evict_expired(&self) -> usize {
        let ttl = self.config.task_ttl;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|id, entry| match entry.try_lock() {
            Ok(task) if task.is_expired(ttl) => {
                if !task.state.is_terminal() {
                    tracing::warn!(
                        task_id = %id,
                        run_id = %task.run_id,
                        elapsed_secs = task.elapsed().as_secs(),
                        "Evicting abandoned running task"
                    );
                }
                false
            }
            Ok(_) => true,
            // Busy tasks are being refreshed; keep them.
            Err(_) => true,
        });
        let evicted = before - tasks.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = tasks.len(), "Evicted expired research tasks");
        }
        evicted
    }

    /// Make room for one more task. Finished tasks go first, oldest result
    /// first; then the longest-running tasks. Only tasks in the middle of a
    /// refresh are never evicted.
    async fn ensure_capacity(&self) -> ResearchResult<()> {
        let capacity = self.config.max_tasks;
        let mut tasks = self.tasks.write().await;
        if tasks.len() < capacity {
            return Ok(());
        }

        // (still running, ordering instant) sorts finished tasks first.
        let mut candidates: Vec<((bool, tokio::time::Instant), TaskId)> = tasks
            .iter()
            .filter_map(|(id, entry)| {
                let task = entry.try_lock().ok()?;
                let key = match task.finished_at() {
                    Some(at) => (false, at),
                    None => (true, task.started_at()),
                };
                Some((key, id.clone()))
            })
            .collect();
        candidates.sort();

        let needed = tasks.len() + 1 - capacity;
        if candidates.len() < needed {
            tracing::warn!(capacity, "Task registry full of tasks being refreshed");
            return Err(ResearchError::Capacity { capacity });
        }
        for ((running, _), id) in candidates.into_iter().take(needed) {
            tasks.remove(&id);
            if running {
                tracing::warn!(task_id = %id, "Evicted oldest running task to make room");
            } else {
                tracing::debug!(task_id = %id, "Evicted finished task to make room");
            }
        }
        Ok(())
    }

    /// Periodically evict expired tasks until `shutdown` is cancelled.
    pub fn start_cleanup_task(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        self.evict_expired().await;
                    }
                }
            }
        })
    }
}
