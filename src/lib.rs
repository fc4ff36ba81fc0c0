//! # Parallel Research
//!
//! An MCP server that lets an AI assistant run web research through the
//! Parallel Task API.
//!
//! This library provides:
//! - Four MCP tools: `quick_research`, `deep_research`, `task_status`
//!   and `get_research_chunk`
//! - A shared task registry that tracks submitted runs until they finish
//! - Token-aware chunking of answers too large for one message
//!
//! ## Architecture
//!
//! ```text
//!   stdin/stdout (JSON-RPC)
//!            │
//!            ▼
//!   ┌─────────────────┐      ┌──────────────────┐
//!   │    McpServer    │ ───▶ │   ToolRegistry   │
//!   └─────────────────┘      └────────┬─────────┘
//!                                     │
//!                                     ▼
//!                            ┌──────────────────┐
//!                            │   TaskRegistry   │──▶ ChunkPolicy
//!                            └────────┬─────────┘
//!                                     │ ResearchClient
//!                                     ▼
//!                            ┌──────────────────┐
//!                            │  ParallelClient  │──▶ api.parallel.ai
//!                            └──────────────────┘
//! ```
//!
//! ## Task Flow
//! 1. A tool submits a query and receives a provider run id
//! 2. The task is stored as `running`
//! 3. Each status check polls the provider once
//! 4. The first terminal outcome is kept; large answers are chunked then
//!
//! ## Modules
//! - `mcp`: JSON-RPC protocol types and the stdio server
//! - `tools`: the research tools
//! - `task`: task records and the registry
//! - `parallel`: the provider client
//! - `chunk`: text splitting
//! - `processor`: tier catalog

pub mod chunk;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod parallel;
pub mod processor;
pub mod task;
pub mod tools;

pub use config::{Config, ConfigError};
pub use error::{Disposition, ResearchError, ResearchResult};
pub use processor::Processor;
