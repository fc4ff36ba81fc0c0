//! Scripted in-memory [`ResearchClient`] for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{PollOutcome, ProviderError, ResearchClient, ResearchOutput};
use crate::processor::Processor;

/// Client whose poll results are scripted per run. Runs are numbered
/// `run_1`, `run_2`, ... in submission order. Once a run's script is
/// exhausted its last outcome repeats; unscripted runs stay `Running`.
#[derive(Default)]
pub struct ScriptedClient {
    submissions: AtomicUsize,
    polls: AtomicUsize,
    fail_submit: Mutex<Option<ProviderError>>,
    scripts: Mutex<HashMap<String, VecDeque<Result<PollOutcome, ProviderError>>>>,
    last: Mutex<HashMap<String, Result<PollOutcome, ProviderError>>>,
    submitted: Mutex<Vec<(String, Processor)>>,
    poll_delay: Mutex<Option<Duration>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, run_id: &str, outcomes: Vec<Result<PollOutcome, ProviderError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(run_id.to_string(), outcomes.into());
    }

    pub fn complete_with(&self, run_id: &str, content: &str) {
        self.script(run_id, vec![Ok(completed(content))]);
    }

    pub fn fail_next_submit(&self, error: ProviderError) {
        *self.fail_submit.lock().unwrap() = Some(error);
    }

    pub fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = Some(delay);
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<(String, Processor)> {
        self.submitted.lock().unwrap().clone()
    }
}

pub fn completed(content: &str) -> PollOutcome {
    PollOutcome::Completed(ResearchOutput {
        content: content.to_string(),
        citations: Vec::new(),
    })
}

pub fn running() -> PollOutcome {
    PollOutcome::Running {
        status: "running".to_string(),
    }
}

#[async_trait]
impl ResearchClient for ScriptedClient {
    async fn submit(&self, query: &str, processor: Processor) -> Result<String, ProviderError> {
        if let Some(err) = self.fail_submit.lock().unwrap().take() {
            return Err(err);
        }
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted
            .lock()
            .unwrap()
            .push((query.to_string(), processor));
        Ok(format!("run_{}", n))
    }

    async fn poll(&self, run_id: &str) -> Result<PollOutcome, ProviderError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.poll_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(run_id)
            .and_then(|queue| queue.pop_front());
        let mut last = self.last.lock().unwrap();
        match next {
            Some(outcome) => {
                last.insert(run_id.to_string(), outcome.clone());
                outcome
            }
            None => last.get(run_id).cloned().unwrap_or_else(|| Ok(running())),
        }
    }
}
