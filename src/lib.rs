//! # Delve - Iterative Web Research Agent
//!
//! Delve turns a question into a researched answer with inline citations.
//! A run generates search queries, searches the web for all of them
//! concurrently, reflects on what it found, optionally searches again, and
//! finally writes an answer whose citation markers are replaced with
//! markdown links to the sources.
//!
//! ## Overview
//!
//! Delve can be used in two ways:
//!
//! 1. **As a standalone tool** - Run the `delve` binary (`delve ask`, `delve serve`)
//! 2. **As a library** - Embed [`ResearchCoordinator`] in your own Rust project
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use delve::{DelveConfig, ResearchCoordinator, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DelveConfig::load("delve.toml")?;
//!     let coordinator = ResearchCoordinator::from_config(&config)?;
//!
//!     let output = coordinator
//!         .run(&config.defaults, RunRequest::question("Who won the 2024 Tour de France?"))
//!         .await?;
//!     println!("{}", output.answer);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI API and compatible endpoints (default) |
//! | `ollama` | Ollama local inference (default) |
//! | `duckduckgo` | Keyless DuckDuckGo search via `daedra` (default) |
//!
//! ## Modules
//!
//! - [`research`] - The research graph: state, nodes, routers, coordinator
//! - [`llm`] - LLM client trait, providers and structured output
//! - [`search`] - Web search client trait and backends
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line parsing and terminal output
//! - [`types`] - Request/response types and error handling
//! - [`utils`] - `delve.toml` loading and hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Iterative research graph.
pub mod research;
/// Web search backends.
pub mod search;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use research::{EffectiveConfig, ResearchCoordinator, RunOutput, RunRequest};
pub use search::SearchClient;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigManager, DelveConfig};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// `delve.toml` with hot-reload support; each run snapshots it once
    pub config_manager: Arc<ConfigManager>,
    /// Research coordinator bound to the configured LLM and search backends
    pub coordinator: Arc<ResearchCoordinator>,
}
