//! A tracked research request and its lifecycle.
//!
//! A task starts `Running` once the provider has accepted the run and moves
//! to `Complete` or `Error` at most once. Terminal tasks are never mutated
//! again, so the first result observed is the one every later reader sees.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::chunk::ChunkPolicy;
use crate::error::{ResearchError, ResearchResult};
use crate::parallel::{PollOutcome, ResearchOutput};
use crate::processor::Processor;

/// Opaque task identifier (UUID v4 string).
pub type TaskId = String;

/// Lifecycle state of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Running,
    Complete(Arc<ResearchOutput>),
    /// Provider-reported failure.
    Error(String),
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub query: String,
    pub processor: Processor,
    pub created_at: DateTime<Utc>,
    pub run_id: String,
    pub state: TaskState,
    /// Present only for answers over the chunk threshold.
    pub chunks: Option<Arc<Vec<String>>>,
    started: Instant,
    finished: Option<Instant>,
}

/// Point-in-time copy of a task returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub query: String,
    pub processor: Processor,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// Time since submission, or until the terminal transition.
    pub elapsed: Duration,
    pub state: TaskState,
    /// Raw provider status from the latest poll, for running tasks.
    pub provider_status: Option<String>,
    pub chunks: Option<Arc<Vec<String>>>,
}

/// One retrieved chunk and its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkView {
    pub task_id: TaskId,
    pub chunk: usize,
    pub total_chunks: usize,
    pub content: String,
}

impl Task {
    pub fn new(query: String, processor: Processor, run_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query,
            processor,
            created_at: Utc::now(),
            run_id,
            state: TaskState::Running,
            chunks: None,
            started: Instant::now(),
            finished: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.finished {
            Some(finished) => finished.duration_since(self.started),
            None => self.started.elapsed(),
        }
    }

    /// Time spent in a terminal state, `None` while running.
    pub fn idle_for(&self) -> Option<Duration> {
        self.finished.map(|f| f.elapsed())
    }

    pub(crate) fn finished_at(&self) -> Option<Instant> {
        self.finished
    }

    pub(crate) fn started_at(&self) -> Instant {
        self.started
    }

    /// Whether the task has outlived `ttl`. Finished tasks count from the
    /// terminal transition. Running tasks count from submission and get the
    /// tier's maximum latency on top, after which they are treated as
    /// abandoned.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        match self.finished {
            Some(finished) => finished.elapsed() > ttl,
            None => self.started.elapsed() > ttl + self.processor.max_latency(),
        }
    }

    /// Apply a terminal poll outcome. Returns `false` (and changes nothing)
    /// if the task is already terminal or the outcome is `Running`.
    pub fn apply(&mut self, outcome: PollOutcome, policy: &ChunkPolicy) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        match outcome {
            PollOutcome::Running { .. } => return false,
            PollOutcome::Completed(output) => {
                self.chunks = policy.split(&output.content).map(Arc::new);
                self.state = TaskState::Complete(Arc::new(output));
            }
            PollOutcome::Failed { reason } => {
                self.state = TaskState::Error(reason);
            }
        }
        self.finished = Some(Instant::now());
        true
    }

    pub fn snapshot(&self, provider_status: Option<String>) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id.clone(),
            query: self.query.clone(),
            processor: self.processor,
            run_id: self.run_id.clone(),
            created_at: self.created_at,
            elapsed: self.elapsed(),
            state: self.state.clone(),
            provider_status,
            chunks: self.chunks.clone(),
        }
    }

    /// Fetch a chunk by 1-based index.
    pub fn chunk(&self, index: i64) -> ResearchResult<ChunkView> {
        if !matches!(self.state, TaskState::Complete(_)) {
            return Err(ResearchError::NotReady {
                task_id: self.id.clone(),
                state: self.state.as_str(),
            });
        }
        let chunks = self
            .chunks
            .as_ref()
            .ok_or_else(|| ResearchError::NoChunking(self.id.clone()))?;

        let total = chunks.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|i| (1..=total).contains(i))
            .ok_or_else(|| ResearchError::IndexOutOfRange {
                task_id: self.id.clone(),
                index,
                total,
            })?;

        Ok(ChunkView {
            task_id: self.id.clone(),
            chunk: position,
            total_chunks: total,
            content: chunks[position - 1].clone(),
        })
    }
}

impl TaskSnapshot {
    pub fn total_chunks(&self) -> Option<usize> {
        self.chunks.as_ref().map(|c| c.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::mock::completed;

    fn task() -> Task {
        Task::new("What is OAuth 2.1?".into(), Processor::Lite, "run_1".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_of_running_and_finished_tasks() {
        let ttl = Duration::from_secs(100);
        let mut running_task = task();
        let mut finished_task = task();

        tokio::time::advance(Duration::from_secs(50)).await;
        finished_task.apply(completed("done"), &ChunkPolicy::default());

        // Lite allows 60s of latency on top of the TTL for running tasks.
        tokio::time::advance(Duration::from_secs(101)).await;
        assert!(finished_task.is_expired(ttl));
        assert!(!running_task.is_expired(ttl));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(running_task.is_expired(ttl));

        running_task.apply(completed("late"), &ChunkPolicy::default());
        assert!(!running_task.is_expired(ttl));
    }

    #[test]
    fn test_first_terminal_outcome_wins() {
        let policy = ChunkPolicy::default();
        let mut t = task();
        assert!(t.apply(completed("first"), &policy));
        assert!(!t.apply(completed("second"), &policy));
        assert!(!t.apply(
            PollOutcome::Failed {
                reason: "late".into()
            },
            &policy
        ));
        match &t.state {
            TaskState::Complete(output) => assert_eq!(output.content, "first"),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_running_outcome_is_ignored() {
        let mut t = task();
        assert!(!t.apply(
            PollOutcome::Running {
                status: "queued".into()
            },
            &ChunkPolicy::default()
        ));
        assert_eq!(t.state, TaskState::Running);
        assert!(t.idle_for().is_none());
    }

    #[test]
    fn test_chunk_errors() {
        let policy = ChunkPolicy {
            max_chunk_tokens: 2,
            chars_per_token: 1,
        };
        let mut t = task();
        assert!(matches!(t.chunk(1), Err(ResearchError::NotReady { .. })));

        t.apply(completed("abcde"), &policy);
        assert_eq!(t.chunk(1).unwrap().content, "ab");
        assert_eq!(t.chunk(3).unwrap().content, "e");
        assert!(matches!(
            t.chunk(0),
            Err(ResearchError::IndexOutOfRange { total: 3, .. })
        ));
        assert!(matches!(
            t.chunk(-1),
            Err(ResearchError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            t.chunk(4),
            Err(ResearchError::IndexOutOfRange { .. })
        ));

        let mut small = task();
        small.apply(completed("ab"), &policy);
        assert!(matches!(small.chunk(1), Err(ResearchError::NoChunking(_))));
    }

    #[test]
    fn test_failed_task_is_not_ready_for_chunks() {
        let mut t = task();
        t.apply(
            PollOutcome::Failed {
                reason: "quota".into(),
            },
            &ChunkPolicy::default(),
        );
        assert_eq!(t.state, TaskState::Error("quota".into()));
        assert!(matches!(
            t.chunk(1),
            Err(ResearchError::NotReady { state: "error", .. })
        ));
    }
}
