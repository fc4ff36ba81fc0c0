//! Parallel Task API client.
//!
//! The [`ResearchClient`] trait isolates every provider interaction behind
//! two calls: `submit` starts a run, `poll` checks it once. Implementations
//! hold no per-run state and are shared across concurrent callers.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{ParallelClient, DEFAULT_PARALLEL_API_URL};
pub use error::{classify_http_status, ProviderError, ProviderErrorKind};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::processor::Processor;

/// A single source backing a research field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub excerpts: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Citations, confidence and reasoning for one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationGroup {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Provider confidence ("high", "medium", "low", or a numeric score)
    #[serde(default, deserialize_with = "confidence_as_string")]
    pub confidence: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A completed research answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub content: String,
    pub citations: Vec<CitationGroup>,
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Still queued or running on the provider; carries the raw status.
    Running { status: String },
    Completed(ResearchOutput),
    /// The provider finished the run unsuccessfully.
    Failed { reason: String },
}

/// Provider operations used by the task registry.
#[async_trait]
pub trait ResearchClient: Send + Sync {
    /// Start a research run and return the provider's run id.
    async fn submit(&self, query: &str, processor: Processor) -> Result<String, ProviderError>;

    /// Check a run once. Transport failures and unknown run ids are errors;
    /// a run the provider reports as failed is `Ok(PollOutcome::Failed)`.
    async fn poll(&self, run_id: &str) -> Result<PollOutcome, ProviderError>;
}

fn confidence_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_group_tolerates_missing_fields() {
        let group: CitationGroup = serde_json::from_str(r#"{"field": "summary"}"#).unwrap();
        assert_eq!(group.field.as_deref(), Some("summary"));
        assert!(group.citations.is_empty());
        assert!(group.confidence.is_none());
    }

    #[test]
    fn test_numeric_confidence() {
        let group: CitationGroup =
            serde_json::from_str(r#"{"field": "a", "confidence": 0.82, "citations": []}"#).unwrap();
        assert_eq!(group.confidence.as_deref(), Some("0.82"));

        let group: CitationGroup =
            serde_json::from_str(r#"{"field": "a", "confidence": "high"}"#).unwrap();
        assert_eq!(group.confidence.as_deref(), Some("high"));
    }
}
