//! Errors surfaced by the research tools.

use thiserror::Error;

use crate::parallel::ProviderError;

/// Every failure a tool invocation can report.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Research submission failed: {0}")]
    Submission(#[source] ProviderError),

    #[error("Could not check status of task '{task_id}': {source}. The task is still running; retry task_status later")]
    Poll {
        task_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Research task '{0}' not found")]
    NotFound(String),

    #[error("Research task '{task_id}' failed: {reason}")]
    ResearchFailed { task_id: String, reason: String },

    #[error("Research task '{task_id}' is not complete yet (state: {state})")]
    NotReady { task_id: String, state: &'static str },

    #[error("Result of task '{0}' was small enough to be returned whole; it has no chunks")]
    NoChunking(String),

    #[error("Chunk {index} is out of range for task '{task_id}' (valid: 1-{total})")]
    IndexOutOfRange {
        task_id: String,
        index: i64,
        total: usize,
    },

    #[error("Research task '{task_id}' did not finish within {waited_secs}s; check it later with task_status")]
    Timeout { task_id: String, waited_secs: u64 },

    #[error("Task registry is full ({capacity} tasks, all being checked right now); try again shortly")]
    Capacity { capacity: usize },
}

/// How the caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient; the same call may succeed later.
    RetryLater,
    /// The research itself failed; retrying the lookup won't help.
    Failed,
    /// The request was wrong; fix the arguments.
    InvalidRequest,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetryLater => "retry later",
            Self::Failed => "permanently failed",
            Self::InvalidRequest => "invalid request",
        }
    }
}

impl ResearchError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Submission(_) | Self::Poll { .. } | Self::Timeout { .. } | Self::Capacity { .. } => {
                Disposition::RetryLater
            }
            Self::ResearchFailed { .. } => Disposition::Failed,
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::NotReady { .. }
            | Self::NoChunking(_)
            | Self::IndexOutOfRange { .. } => Disposition::InvalidRequest,
        }
    }

    /// The task this error concerns, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Poll { task_id, .. }
            | Self::ResearchFailed { task_id, .. }
            | Self::NotReady { task_id, .. }
            | Self::IndexOutOfRange { task_id, .. }
            | Self::Timeout { task_id, .. } => Some(task_id),
            Self::NotFound(task_id) | Self::NoChunking(task_id) => Some(task_id),
            Self::Validation(_) | Self::Submission(_) | Self::Capacity { .. } => None,
        }
    }
}

pub type ResearchResult<T> = Result<T, ResearchError>;
