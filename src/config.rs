//! Configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first (see the binary).
//! Only `PARALLEL_API_KEY` is required:
//! - `PARALLEL_API_URL` - API base URL (default: `https://api.parallel.ai`)
//! - `DEFAULT_PROCESSOR` - tier used by `deep_research` (default: `pro`)
//! - `PARALLEL_REQUEST_TIMEOUT_SECS` - per-request HTTP timeout (default: 30)
//! - `QUICK_RESEARCH_TIMEOUT_SECS` - `quick_research` deadline (default: 90)
//! - `PARALLEL_POLL_INTERVAL_SECS` - `quick_research` poll interval (default: 5)
//! - `TASK_TTL_SECS` - how long finished tasks stay retrievable (default: 86400)
//! - `MAX_TASKS` - registry capacity (default: 1000)
//! - `CHUNK_MAX_TOKENS` - chunking threshold and chunk size (default: 15000)
//! - `CHARS_PER_TOKEN` - token estimate divisor (default: 4)
//! - `LOG_DIR` - directory for JSON log files (default: none)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::chunk::{ChunkPolicy, DEFAULT_CHARS_PER_TOKEN, DEFAULT_MAX_CHUNK_TOKENS};
use crate::parallel::DEFAULT_PARALLEL_API_URL;
use crate::processor::Processor;
use crate::task::{RegistryConfig, DEFAULT_MAX_TASKS, DEFAULT_TASK_TTL};
use crate::tools::{ToolSettings, DEFAULT_POLL_INTERVAL, DEFAULT_QUICK_TIMEOUT};

/// Value shipped in `.env.example`; treated as unset.
const API_KEY_PLACEHOLDER: &str = "your_parallel_api_key_here";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PARALLEL_API_KEY is not set; get a key at https://platform.parallel.ai")]
    MissingApiKey,

    #[error("Invalid {var} '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub default_processor: Processor,
    pub request_timeout: Duration,
    pub quick_timeout: Duration,
    pub poll_interval: Duration,
    pub task_ttl: Duration,
    pub max_tasks: usize,
    pub chunk_policy: ChunkPolicy,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("PARALLEL_API_KEY")
            .filter(|k| k != API_KEY_PLACEHOLDER)
            .ok_or(ConfigError::MissingApiKey)?;

        let api_url = match get("PARALLEL_API_URL") {
            Some(raw) => {
                let parsed = url::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    var: "PARALLEL_API_URL",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid {
                        var: "PARALLEL_API_URL",
                        value: raw,
                        reason: "scheme must be http or https".to_string(),
                    });
                }
                raw.trim_end_matches('/').to_string()
            }
            None => DEFAULT_PARALLEL_API_URL.to_string(),
        };

        let default_processor = match get("DEFAULT_PROCESSOR") {
            Some(raw) => raw.parse::<Processor>().map_err(|e| ConfigError::Invalid {
                var: "DEFAULT_PROCESSOR",
                value: raw.clone(),
                reason: format!("{}; valid processors: {}", e, Processor::valid_names()),
            })?,
            None => Processor::default(),
        };

        let secs = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(get(var)
                .map(|raw| parse_positive(var, &raw))
                .transpose()?
                .map(Duration::from_secs)
                .unwrap_or(default))
        };
        let count = |var: &'static str, default: usize| -> Result<usize, ConfigError> {
            Ok(get(var)
                .map(|raw| parse_positive(var, &raw))
                .transpose()?
                .map(|n| n as usize)
                .unwrap_or(default))
        };

        Ok(Self {
            api_key,
            api_url,
            default_processor,
            request_timeout: secs("PARALLEL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT)?,
            quick_timeout: secs("QUICK_RESEARCH_TIMEOUT_SECS", DEFAULT_QUICK_TIMEOUT)?,
            poll_interval: secs("PARALLEL_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
            task_ttl: secs("TASK_TTL_SECS", DEFAULT_TASK_TTL)?,
            max_tasks: count("MAX_TASKS", DEFAULT_MAX_TASKS)?,
            chunk_policy: ChunkPolicy {
                max_chunk_tokens: count("CHUNK_MAX_TOKENS", DEFAULT_MAX_CHUNK_TOKENS)?,
                chars_per_token: count("CHARS_PER_TOKEN", DEFAULT_CHARS_PER_TOKEN)?,
            },
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            chunk_policy: self.chunk_policy,
            task_ttl: self.task_ttl,
            max_tasks: self.max_tasks,
        }
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            default_processor: self.default_processor,
            quick_timeout: self.quick_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("expected a positive integer")),
    }
}
