//! Iterative Web Research
//!
//! A run turns a question into a cited answer:
//!
//! 1. **Query generation** - the LLM proposes a batch of search queries
//! 2. **Web research** - one worker per query searches the web concurrently;
//!    every result gets a citation marker `⟦<task>-<n>⟧`
//! 3. **Reflection** - the LLM judges the findings and the loop counter
//!    advances; the router either fans out another batch or stops
//! 4. **Finalization** - the LLM writes the answer and each marker it cites
//!    becomes a markdown link to its source
//!
//! # Architecture
//!
//! - [`coordinator::ResearchCoordinator`] - owns the run state and drives
//!   the stage loop
//! - [`nodes`] - the four stages, each returning a partial [`state::StateUpdate`]
//! - [`router`] - post-generation and post-reflection routing
//! - [`state`] - run state and the per-field reducer table
//! - [`config`] - per-run effective configuration and override resolution
//! - [`citation`] - marker minting and substitution
//!
//! # Usage
//!
//! ```ignore
//! use delve::research::coordinator::{ResearchCoordinator, RunRequest};
//!
//! let coordinator = ResearchCoordinator::new(llm, search);
//! let output = coordinator
//!     .run(&config.defaults, RunRequest::question("How do Rust async runtimes differ?"))
//!     .await?;
//!
//! println!("{}", output.answer);
//! for source in output.sources {
//!     println!("- {} {}", source.marker, source.url);
//! }
//! ```

/// Marker minting, finding blocks and link substitution.
pub mod citation;
/// Effective per-run configuration and override resolution.
pub mod config;
/// Stage loop, fan-out and join.
pub mod coordinator;
pub mod nodes;
pub mod prompts;
pub mod router;
pub mod state;

pub use config::EffectiveConfig;
pub use coordinator::{ResearchCoordinator, RunOutput, RunRequest};
pub use state::{Role, SourceRecord, Turn};
